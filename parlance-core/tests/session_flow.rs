//! End-to-end chat sessions over a file-backed SQLite datasource

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::mpsc;

use config::{DatasourceSettings, StorageSettings};
use parlance_core::{
    AppMetadata, Application, ApplicationRunner, CancellationToken, Caller, ChatManager,
    ChatRequest, ConversationRequest, MessageId, MessageRequest, Reference, ResponseMode,
    RunInput, RunOutput, SettingsDiscovery, StaticApplications, StorageSelector,
};

/// Answers with the question and cites one source
struct CitingRunner;

#[async_trait]
impl ApplicationRunner for CitingRunner {
    async fn run(
        &self,
        _app: &Application,
        input: RunInput,
        stream: mpsc::Sender<String>,
    ) -> anyhow::Result<RunOutput> {
        let answer = format!("{} ({} earlier turns)", input.question, input.history.exchanges().count());
        if input.need_stream {
            stream.send(answer.clone()).await?;
        }
        Ok(RunOutput::new(answer).with_references(vec![Reference {
            file_name: "kubeagi.md".to_string(),
            page_number: 1,
            score: 0.5,
            ..Reference::default()
        }]))
    }
}

fn manager(settings: StorageSettings) -> ChatManager {
    ChatManager::new(
        StorageSelector::new(Arc::new(SettingsDiscovery::new(settings))),
        Arc::new(StaticApplications::new([Application::new("base-chat", "default")])),
        Arc::new(CitingRunner),
    )
}

fn app() -> AppMetadata {
    AppMetadata::new("base-chat", "default")
}

#[tokio::test]
async fn test_conversation_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let settings = StorageSettings {
        datasource: Some(DatasourceSettings::new(dir.path().join("chat.db"))),
    };
    let caller = Caller::user_named("alice");

    let conversation_id = {
        let manager = manager(settings.clone());
        assert_eq!(manager.storage().await.kind(), "sqlite");

        let resp = manager
            .app_run(
                &caller,
                ChatRequest::new_chat(app(), "What is KubeAGI?"),
                MessageId::from("m1"),
                None,
                CancellationToken::new(),
            )
            .await
            .unwrap();
        assert_eq!(resp.message, "What is KubeAGI? (0 earlier turns)");
        resp.conversation_id
    };

    // A fresh manager reads the same database
    let manager = manager(settings);
    let (tx, mut rx) = mpsc::channel(4);
    let resp = manager
        .app_run(
            &caller,
            ChatRequest::continue_chat(app(), conversation_id.clone(), "And arcadia?")
                .with_response_mode(ResponseMode::Streaming),
            MessageId::from("m2"),
            Some(tx),
            CancellationToken::new(),
        )
        .await
        .unwrap();
    assert_eq!(resp.message, "And arcadia? (1 earlier turns)");
    assert_eq!(rx.recv().await.as_deref(), Some("And arcadia? (1 earlier turns)"));

    let conversation = manager
        .list_messages(&caller, &ConversationRequest::new(app(), conversation_id.clone()))
        .await
        .unwrap();
    assert_eq!(conversation.messages.len(), 2);
    assert!(conversation.messages.iter().all(|m| m.is_answered()));

    let refs = manager
        .get_message_references(
            &caller,
            &MessageRequest::new(ConversationRequest::new(app(), conversation_id.clone()), "m2"),
        )
        .await
        .unwrap();
    assert_eq!(refs.len(), 1);
    assert_eq!(refs[0].file_name, "kubeagi.md");

    let listed = manager.list_conversations(&caller, &app()).await.unwrap();
    assert_eq!(listed.len(), 1);

    manager
        .delete_conversation(&caller, &conversation_id)
        .await
        .unwrap();
    assert!(manager.list_conversations(&caller, &app()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_unconfigured_datasource_uses_memory() {
    let manager = manager(StorageSettings::default());
    assert_eq!(manager.storage().await.kind(), "memory");

    let resp = manager
        .app_run(
            &Caller::anonymous(),
            ChatRequest::new_chat(app(), "hi"),
            MessageId::new(),
            None,
            CancellationToken::new(),
        )
        .await
        .unwrap();
    let listed = manager
        .list_conversations(&Caller::anonymous(), &app())
        .await
        .unwrap();
    assert_eq!(listed[0].id, resp.conversation_id);
}
