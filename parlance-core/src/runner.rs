//! Application runner contract
//!
//! A runner executes an application's pipeline for one question. Streaming
//! output goes through the sender it is handed; the final answer and its
//! references come back in `RunOutput`.

use anyhow::Result;
use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::application::Application;
use crate::context::ChatHistory;
use crate::storage::Reference;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunInput {
    pub question: String,
    pub need_stream: bool,
    /// Prior exchanges of the conversation, oldest first
    pub history: ChatHistory,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RunOutput {
    pub answer: String,
    pub references: Vec<Reference>,
}

impl RunOutput {
    pub fn new(answer: impl Into<String>) -> Self {
        Self {
            answer: answer.into(),
            references: Vec::new(),
        }
    }

    pub fn with_references(mut self, references: Vec<Reference>) -> Self {
        self.references = references;
        self
    }
}

#[async_trait]
pub trait ApplicationRunner: Send + Sync {
    /// Run the application pipeline.
    ///
    /// Chunks sent on `stream` reach the caller in order. Runners that do not
    /// stream simply drop the sender.
    async fn run(
        &self,
        app: &Application,
        input: RunInput,
        stream: mpsc::Sender<String>,
    ) -> Result<RunOutput>;
}
