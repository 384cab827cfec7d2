//! Demo application runner
//!
//! Echoes the question back, streaming it word by word, and cites the
//! previous exchange when there is one.

use async_trait::async_trait;
use parlance_core::{Application, ApplicationRunner, Reference, RunInput, RunOutput};
use std::time::Duration;
use tokio::sync::mpsc;

pub struct EchoRunner {
    delay: Duration,
}

impl EchoRunner {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

impl Default for EchoRunner {
    fn default() -> Self {
        Self::new(Duration::from_millis(40))
    }
}

#[async_trait]
impl ApplicationRunner for EchoRunner {
    async fn run(
        &self,
        app: &Application,
        input: RunInput,
        stream: mpsc::Sender<String>,
    ) -> anyhow::Result<RunOutput> {
        let name = app.display_name.as_deref().unwrap_or(&app.name);
        let answer = format!("[{}] You said: {}", name, input.question);

        if input.need_stream {
            for word in answer.split_inclusive(' ') {
                tokio::time::sleep(self.delay).await;
                if stream.send(word.to_string()).await.is_err() {
                    break;
                }
            }
        }

        let exchanges: Vec<(&str, &str)> = input.history.exchanges().collect();
        let references = match exchanges.last() {
            Some((query, previous)) => vec![Reference {
                question: query.to_string(),
                answer: previous.to_string(),
                score: 1.0,
                content: format!("{} earlier exchange(s)", exchanges.len()),
                ..Reference::default()
            }],
            None => Vec::new(),
        };

        Ok(RunOutput::new(answer).with_references(references))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parlance_core::ChatHistory;

    #[tokio::test]
    async fn test_streamed_chunks_rebuild_answer() {
        let runner = EchoRunner::new(Duration::ZERO);
        let (tx, mut rx) = mpsc::channel(32);
        let output = runner
            .run(
                &Application::new("echo", "default"),
                RunInput {
                    question: "What is KubeAGI?".to_string(),
                    need_stream: true,
                    history: ChatHistory::new(),
                },
                tx,
            )
            .await
            .unwrap();

        let mut streamed = String::new();
        while let Some(chunk) = rx.recv().await {
            streamed.push_str(&chunk);
        }
        assert_eq!(streamed, output.answer);
        assert_eq!(output.answer, "[echo] You said: What is KubeAGI?");
        assert!(output.references.is_empty());
    }

    #[tokio::test]
    async fn test_cites_previous_exchange() {
        let mut history = ChatHistory::new();
        history.add_user_message("q1");
        history.add_ai_message("a1");
        let (tx, _rx) = mpsc::channel(1);

        let output = EchoRunner::new(Duration::ZERO)
            .run(
                &Application::new("echo", "default"),
                RunInput {
                    question: "q2".to_string(),
                    need_stream: false,
                    history,
                },
                tx,
            )
            .await
            .unwrap();
        assert_eq!(output.references.len(), 1);
        assert_eq!(output.references[0].question, "q1");
        assert_eq!(output.references[0].answer, "a1");
    }
}
