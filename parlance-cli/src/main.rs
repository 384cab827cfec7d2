mod logging;
mod runner;

use clap::Parser;
use config::{PathManager, Settings, load_env_file};
use parlance_core::{
    AppMetadata, Application, CancellationToken, Caller, ChatManager, ChatRequest,
    ConversationId, ConversationRequest, MessageId, MessageRequest, ResponseMode,
    SettingsDiscovery, StaticApplications, StorageSelector,
};

use clap_derive::{Parser, ValueEnum};
use config::DatasourceSettings;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::runner::EchoRunner;

#[derive(Copy, Clone, ValueEnum, Debug, PartialEq, Eq)]
#[clap(rename_all = "lowercase")]
enum Mode {
    Blocking,
    Streaming,
}

impl From<Mode> for ResponseMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Blocking => ResponseMode::Blocking,
            Mode::Streaming => ResponseMode::Streaming,
        }
    }
}

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Application to chat with
    #[arg(long, env = "PARLANCE_APP", default_value = "base-chat")]
    app: String,

    #[arg(long, env = "PARLANCE_NAMESPACE", default_value = "default")]
    namespace: String,

    /// Authenticated user name; omit to chat anonymously
    #[arg(long, env = "PARLANCE_USER")]
    user: Option<String>,

    #[arg(long, value_enum, default_value_t = Mode::Streaming)]
    mode: Mode,

    /// Keep conversations apart from regular ones
    #[arg(long)]
    debug: bool,

    /// Settings file (defaults to the platform config directory)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Store conversations in the default database when no datasource is configured
    #[arg(long)]
    persist: bool,

    /// Data directory for the database and logs
    #[arg(long, env = "PARLANCE_DATA_DIR")]
    data_dir: Option<PathBuf>,

    /// Write the effective settings to the settings file and exit
    #[arg(long)]
    write_settings: bool,

    /// Log to stderr instead of the log file
    #[arg(long, short)]
    verbose: bool,
}

// Application state
struct AppState {
    manager: ChatManager,
    caller: Caller,
    app: AppMetadata,
    conversation_id: Option<ConversationId>,
    mode: Mode,
    debug: bool,
}

fn load_settings(args: &Args) -> anyhow::Result<Settings> {
    let mut settings = match &args.settings {
        Some(path) => Settings::load_from(path).map_err(anyhow::Error::msg)?.with_env_overrides(),
        None => Settings::load(),
    };
    if args.persist && settings.storage.datasource.is_none() {
        if let Some(path) = PathManager::db_path() {
            settings.storage.datasource = Some(DatasourceSettings::new(path));
        }
    }
    Ok(settings)
}

fn build_applications(settings: &Settings, args: &Args) -> StaticApplications {
    let mut applications = StaticApplications::from_settings(&settings.applications);
    // Nothing configured: the requested application is served by the echo runner
    if applications.is_empty() {
        applications.insert(Application::new(&args.app, &args.namespace));
    } else if settings.application(&args.app, &args.namespace).is_none() {
        eprintln!(
            "Warning: application {}/{} is not configured",
            args.namespace, args.app
        );
    }
    applications
}

async fn chat(state: &mut AppState, query: &str) -> anyhow::Result<()> {
    let req = match &state.conversation_id {
        Some(id) => ChatRequest::continue_chat(state.app.clone(), id.clone(), query),
        None => ChatRequest::new_chat(state.app.clone(), query),
    }
    .with_response_mode(state.mode.into())
    .with_debug(state.debug);

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                cancel.cancel();
            }
        })
    };

    let (stream, printer) = match state.mode {
        Mode::Streaming => {
            let (tx, mut rx) = mpsc::channel::<String>(32);
            let printer = tokio::spawn(async move {
                while let Some(chunk) = rx.recv().await {
                    print!("{}", chunk);
                    let _ = io::stdout().flush();
                }
                println!();
            });
            (Some(tx), Some(printer))
        }
        Mode::Blocking => (None, None),
    };

    let result = state
        .manager
        .app_run(&state.caller, req, MessageId::new(), stream, cancel)
        .await;
    interrupt.abort();
    if let Some(printer) = printer {
        let _ = printer.await;
    }

    let resp = result?;
    if state.mode == Mode::Blocking {
        println!("{}", resp.message);
    }
    if !resp.references.is_empty() {
        println!(
            "({} reference(s), /refs {} to show)",
            resp.references.len(),
            resp.message_id
        );
    }
    state.conversation_id = Some(resp.conversation_id);
    Ok(())
}

fn print_status_bar(state: &AppState) {
    let terminal_width: usize = 80;
    let user = state.caller.user().unwrap_or("anonymous");
    let conversation = state
        .conversation_id
        .as_ref()
        .map(|id| id.to_string())
        .unwrap_or_else(|| "new chat".to_string());
    let status = format!(
        " {}/{} • {} • {} ",
        state.app.app_namespace, state.app.app_name, user, conversation
    );
    let padding = terminal_width.saturating_sub(status.chars().count() + 2);
    let left_pad = padding / 2;
    let right_pad = padding - left_pad;

    println!("┌{}┐", "─".repeat(terminal_width - 2));
    println!("│{}{}{}│", " ".repeat(left_pad), status, " ".repeat(right_pad));
    println!("└{}┘", "─".repeat(terminal_width - 2));
}

// Slash command parsing and handling
mod commands {
    use super::*;

    pub enum Command {
        Quit,
        Help,
        New,
        List,
        History,
        Refs(MessageId),
        Delete,
    }

    pub enum CommandResult {
        Continue,
        Exit,
    }

    impl Command {
        pub fn parse(input: &str) -> Result<Self, String> {
            let Some(rest) = input.strip_prefix('/') else {
                return Err("Not a command".to_string());
            };

            let parts: Vec<&str> = rest.split_whitespace().collect();
            if parts.is_empty() {
                return Err("Empty command".to_string());
            }

            match parts[0] {
                "quit" | "exit" => Ok(Command::Quit),
                "help" => Ok(Command::Help),
                "new" => Ok(Command::New),
                "list" => Ok(Command::List),
                "history" => Ok(Command::History),
                "delete" => Ok(Command::Delete),
                "refs" => match parts.get(1) {
                    Some(id) => Ok(Command::Refs(MessageId::from(*id))),
                    None => Err("Usage: /refs <message-id>".to_string()),
                },
                _ => Err(format!(
                    "Unknown command: /{}. Type /help for available commands.",
                    parts[0]
                )),
            }
        }

        pub async fn execute(self, state: &mut AppState) -> anyhow::Result<CommandResult> {
            match self {
                Command::Quit => {
                    println!("Goodbye!");
                    return Ok(CommandResult::Exit);
                }
                Command::Help => print_help(),
                Command::New => {
                    state.conversation_id = None;
                    println!("Next message starts a new conversation.");
                }
                Command::List => {
                    let conversations = state
                        .manager
                        .list_conversations(&state.caller, &state.app)
                        .await?;
                    if conversations.is_empty() {
                        println!("No conversations yet.");
                    }
                    for conversation in conversations {
                        let title = conversation
                            .messages
                            .first()
                            .map(|m| m.query.as_str())
                            .unwrap_or("");
                        println!(
                            "{}  {}  {} message(s)  {}",
                            conversation.id,
                            conversation.updated_at.format("%Y-%m-%d %H:%M"),
                            conversation.messages.len(),
                            title
                        );
                    }
                }
                Command::History => {
                    let Some(id) = state.current_conversation() else {
                        println!("No conversation selected.");
                        return Ok(CommandResult::Continue);
                    };
                    let conversation = state.manager.list_messages(&state.caller, &id).await?;
                    for message in conversation.messages {
                        println!("[{}] > {}", message.id, message.query);
                        if message.is_answered() {
                            println!("  {}", message.answer);
                        } else {
                            println!("  (no answer)");
                        }
                    }
                }
                Command::Refs(message_id) => {
                    let Some(id) = state.current_conversation() else {
                        println!("No conversation selected.");
                        return Ok(CommandResult::Continue);
                    };
                    let refs = match state
                        .manager
                        .get_message_references(&state.caller, &MessageRequest::new(id, message_id))
                        .await
                    {
                        Ok(refs) => refs,
                        Err(e) if e.is_not_found() => {
                            println!("No references.");
                            return Ok(CommandResult::Continue);
                        }
                        Err(e) => return Err(e.into()),
                    };
                    for (i, r) in refs.iter().enumerate() {
                        println!("{}. [{:.2}] {} / {}", i + 1, r.score, r.question, r.answer);
                        if !r.content.is_empty() {
                            println!("   {}", r.content);
                        }
                    }
                }
                Command::Delete => {
                    let Some(id) = state.conversation_id.take() else {
                        println!("No conversation selected.");
                        return Ok(CommandResult::Continue);
                    };
                    state.manager.delete_conversation(&state.caller, &id).await?;
                    println!("Deleted conversation {}.", id);
                }
            }
            println!();
            Ok(CommandResult::Continue)
        }
    }

    impl AppState {
        fn current_conversation(&self) -> Option<ConversationRequest> {
            self.conversation_id
                .as_ref()
                .map(|id| ConversationRequest::new(self.app.clone(), id.clone()))
        }
    }

    fn print_help() {
        println!("Available commands:");
        println!("  /quit, /exit           - Exit the chat");
        println!("  /new                   - Start a new conversation");
        println!("  /list                  - List your conversations");
        println!("  /history               - Show messages of the current conversation");
        println!("  /refs <message-id>     - Show references of a message");
        println!("  /delete                - Delete the current conversation");
        println!("  /help                  - Show this help message");
        println!("  Ctrl+C                 - Cancel the running answer");
        println!("  Ctrl+D                 - Exit the chat");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    load_env_file();
    let args = Args::parse();

    if let Some(dir) = &args.data_dir {
        PathManager::set_data_dir(dir.clone());
    }
    if let Err(e) = PathManager::ensure_dirs_exist() {
        eprintln!("[parlance] Failed to create data directories: {}", e);
    }

    let settings = load_settings(&args)?;
    if args.write_settings {
        let saved = match &args.settings {
            Some(path) => settings.save_to(path),
            None => settings.save(),
        };
        saved.map_err(anyhow::Error::msg)?;
        println!("Settings written.");
        return Ok(());
    }
    let _log_guard = logging::init_logging(args.verbose, settings.log_filter.as_deref());

    let applications = build_applications(&settings, &args);
    let selector = StorageSelector::new(Arc::new(SettingsDiscovery::new(settings.storage.clone())));
    let manager = ChatManager::new(
        selector,
        Arc::new(applications),
        Arc::new(EchoRunner::default()),
    );
    tracing::info!(storage = manager.storage().await.kind(), "chat storage ready");

    let mut state = AppState {
        manager,
        caller: Caller::new(args.user.clone()),
        app: AppMetadata::new(&args.app, &args.namespace),
        conversation_id: None,
        mode: args.mode,
        debug: args.debug,
    };

    println!();
    println!("Type /help for commands, Ctrl+D or /quit to exit.");
    println!();

    let stdin = io::stdin();
    let mut lines = stdin.lock().lines();

    loop {
        print_status_bar(&state);
        print!("> ");
        io::stdout().flush()?;

        let line = match lines.next() {
            Some(Ok(line)) => line,
            Some(Err(e)) => {
                eprintln!("Error reading input: {}", e);
                break;
            }
            None => {
                println!();
                println!("Goodbye!");
                break;
            }
        };

        let input = line.trim();

        if input.is_empty() {
            continue;
        }

        // Try to parse as command
        if input.starts_with('/') {
            match commands::Command::parse(input) {
                Ok(cmd) => match cmd.execute(&mut state).await {
                    Ok(commands::CommandResult::Exit) => break,
                    Ok(commands::CommandResult::Continue) => continue,
                    Err(e) => {
                        eprintln!("Error: {}", e);
                        println!();
                        continue;
                    }
                },
                Err(err) => {
                    println!("{}", err);
                    println!();
                    continue;
                }
            }
        }

        // Regular message
        if let Err(e) = chat(&mut state, input).await {
            eprintln!("Error: {}", e);
        }

        println!();
    }

    Ok(())
}
