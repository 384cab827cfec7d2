//! ChatManager - runs chat turns against applications
//!
//! This is the main API of the crate. For one turn it:
//! - checks that the target application exists and is ready
//! - creates the conversation, or loads it under the caller's scope
//! - replays prior exchanges into the runner's history
//! - records the new question, runs the application and relays streamed output
//! - stores the answer and its references
//!
//! The read/delete operations apply the same scoping before touching storage.
//!
//! A new chat with a caller-given id replaces any stored conversation with
//! that id, whoever owned it. Last write wins here as everywhere else.

use chrono::Utc;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

use crate::application::{Application, ApplicationResolver};
use crate::auth::Caller;
use crate::context::{ChatHistory, ConversationContext};
use crate::error::{Error, Result};
use crate::request::{AppMetadata, ChatRequest, ChatResponse, ConversationRequest, MessageRequest};
use crate::runner::{ApplicationRunner, RunInput, RunOutput};
use crate::storage::{
    Conversation, ConversationId, ConversationStore, Message, MessageId, Reference, SearchOption,
    StorageSelector,
};

/// Capacity of the channel between the runner and the relay
pub const DEFAULT_STREAM_BUFFER: usize = 64;

pub struct ChatManager {
    selector: StorageSelector,
    applications: Arc<dyn ApplicationResolver>,
    runner: Arc<dyn ApplicationRunner>,
    stream_buffer: usize,
}

impl ChatManager {
    pub fn new(
        selector: StorageSelector,
        applications: Arc<dyn ApplicationResolver>,
        runner: Arc<dyn ApplicationRunner>,
    ) -> Self {
        Self {
            selector,
            applications,
            runner,
            stream_buffer: DEFAULT_STREAM_BUFFER,
        }
    }

    pub fn with_stream_buffer(mut self, capacity: usize) -> Self {
        self.stream_buffer = capacity.max(1);
        self
    }

    /// The chat storage, selected on first use
    pub async fn storage(&self) -> Arc<dyn ConversationStore> {
        self.selector.storage().await
    }

    /// Run one chat turn.
    ///
    /// Streamed chunks are forwarded to `stream` when given. Cancelling
    /// `cancel` abandons the run; the question stays recorded unanswered.
    pub async fn app_run(
        &self,
        caller: &Caller,
        req: ChatRequest,
        message_id: MessageId,
        stream: Option<mpsc::Sender<String>>,
        cancel: CancellationToken,
    ) -> Result<ChatResponse> {
        req.validate()?;
        if message_id.is_empty() {
            return Err(Error::validation("message id is required"));
        }

        let app = self.ready_application(&req.app).await?;
        let storage = self.storage().await;

        let (mut conversation, history) = if req.new_chat {
            let conversation_id = if req.conversation_id.is_empty() {
                ConversationId::new()
            } else {
                req.conversation_id.clone()
            };
            let conversation = Conversation::new(
                conversation_id,
                req.app.app_name.clone(),
                req.app.app_namespace.clone(),
                caller.user().map(str::to_string),
                req.debug,
            );
            (conversation, ChatHistory::new())
        } else {
            let mut options = vec![
                SearchOption::app_name(req.app.app_name.clone()),
                SearchOption::app_namespace(req.app.app_namespace.clone()),
                SearchOption::debug(req.debug),
            ];
            if let Some(user) = caller.user() {
                options.push(SearchOption::user(Some(user)));
            }
            let conversation = storage
                .find_existing_conversation(&req.conversation_id, &options)
                .await?;
            let history = conversation.replay_history();
            tracing::debug!(
                conversation_id = %conversation.id,
                history_len = history.len(),
                "replayed conversation history"
            );
            (conversation, history)
        };

        if conversation.contains_message(&message_id) {
            return Err(Error::validation(format!(
                "message {} already exists in conversation {}",
                message_id, conversation.id
            )));
        }
        conversation.push_message(Message::new(message_id.clone(), req.query.clone()));
        storage.update_conversation(&conversation).await?;

        tracing::info!(
            app_name = %req.app.app_name,
            app_namespace = %req.app.app_namespace,
            conversation_id = %conversation.id,
            "begin to run application"
        );
        let input = RunInput {
            question: req.query.clone(),
            need_stream: req.response_mode.is_streaming(),
            history,
        };
        let output = self.run_application(&app, input, stream, &cancel).await?;

        conversation.updated_at = Utc::now();
        if let Some(message) = conversation.last_message_mut() {
            message.complete(output.answer.clone(), output.references.clone());
        }
        if let Err(e) = storage.update_conversation(&conversation).await {
            tracing::warn!(
                conversation_id = %conversation.id,
                message_id = %message_id,
                error = %e,
                "failed to store answer"
            );
            return Err(e);
        }

        Ok(ChatResponse {
            conversation_id: conversation.id,
            message_id,
            message: output.answer,
            created_at: Utc::now(),
            references: output.references,
        })
    }

    /// Conversations of an application owned by the caller, newest first
    pub async fn list_conversations(
        &self,
        caller: &Caller,
        req: &AppMetadata,
    ) -> Result<Vec<Conversation>> {
        req.validate()?;
        let mut options = app_scope(req);
        options.push(user_scope(caller));
        self.storage().await.list_conversations(&options).await
    }

    /// Delete one of the caller's conversations. Unknown ids are not an error.
    pub async fn delete_conversation(
        &self,
        caller: &Caller,
        conversation_id: &ConversationId,
    ) -> Result<()> {
        if conversation_id.is_empty() {
            return Err(Error::validation("conversation id is required"));
        }
        let options = [
            SearchOption::ConversationId(conversation_id.clone()),
            user_scope(caller),
        ];
        self.storage().await.delete(&options).await
    }

    /// A conversation with all of its messages
    pub async fn list_messages(
        &self,
        caller: &Caller,
        req: &ConversationRequest,
    ) -> Result<Conversation> {
        req.validate()?;
        let mut options = app_scope(&req.app);
        options.push(user_scope(caller));
        self.storage()
            .await
            .find_existing_conversation(&req.conversation_id, &options)
            .await
    }

    /// References of one message. A message that cited nothing (or was never
    /// answered) is reported as not found.
    pub async fn get_message_references(
        &self,
        caller: &Caller,
        req: &MessageRequest,
    ) -> Result<Vec<Reference>> {
        req.validate()?;
        let mut options = app_scope(&req.conversation.app);
        options.push(user_scope(caller));
        let message = self
            .storage()
            .await
            .find_existing_message(&req.conversation.conversation_id, &req.message_id, &options)
            .await?;
        if message.references.is_empty() {
            return Err(Error::MessageNotFound {
                conversation_id: req.conversation.conversation_id.clone(),
                message_id: req.message_id.clone(),
            });
        }
        Ok(message.references)
    }

    async fn ready_application(&self, app: &AppMetadata) -> Result<Application> {
        let application = self
            .applications
            .get_application(&app.app_name, &app.app_namespace)
            .await?;
        if !application.is_ready() {
            return Err(Error::application_not_ready(&app.app_namespace, &app.app_name));
        }
        Ok(application)
    }

    async fn run_application(
        &self,
        app: &Application,
        input: RunInput,
        stream: Option<mpsc::Sender<String>>,
        cancel: &CancellationToken,
    ) -> Result<RunOutput> {
        let (tx, rx) = mpsc::channel(self.stream_buffer);

        let run = async {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(Error::Cancelled),
                result = self.runner.run(app, input, tx) => result.map_err(Error::Runner),
            }
        };
        let (result, relayed) = tokio::join!(run, relay_chunks(rx, stream, cancel.clone()));

        match &result {
            Ok(_) => tracing::debug!(app_name = %app.name, chunks = relayed, "application run finished"),
            Err(Error::Cancelled) => tracing::info!(app_name = %app.name, "application run cancelled"),
            Err(e) => tracing::error!(app_name = %app.name, error = %e, "application run failed"),
        }
        result
    }
}

fn app_scope(app: &AppMetadata) -> Vec<SearchOption> {
    vec![
        SearchOption::app_namespace(app.app_namespace.clone()),
        SearchOption::app_name(app.app_name.clone()),
    ]
}

/// Anonymous callers only reach conversations without an owner
fn user_scope(caller: &Caller) -> SearchOption {
    SearchOption::User(caller.user().map(str::to_string))
}

/// Forward runner chunks to the caller until the runner hangs up or the
/// request is cancelled. Returns the number of chunks delivered.
async fn relay_chunks(
    mut rx: mpsc::Receiver<String>,
    mut out: Option<mpsc::Sender<String>>,
    cancel: CancellationToken,
) -> usize {
    let mut relayed = 0;
    loop {
        let chunk = tokio::select! {
            _ = cancel.cancelled() => break,
            chunk = rx.recv() => match chunk {
                Some(chunk) => chunk,
                None => break,
            },
        };

        // Keep draining after the caller goes away so the runner never blocks
        let Some(sender) = &out else { continue };
        let delivered = tokio::select! {
            _ = cancel.cancelled() => break,
            sent = sender.send(chunk) => sent.is_ok(),
        };
        if delivered {
            relayed += 1;
        } else {
            tracing::debug!("stream receiver dropped, discarding remaining chunks");
            out = None;
        }
    }
    relayed
}
