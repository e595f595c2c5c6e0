use anyhow::Context;
use nooverfit_config::load as load_config;
use nooverfit_pipeline::{CandidateFile, ConversationOrchestrator, Message, MessageRole};
use nooverfit_runtime::{telemetry, ClientServices};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::info;

#[derive(Debug, PartialEq, Eq)]
enum ConsoleCommand {
    Attach(Vec<String>),
    Remove(String),
    Clear,
    Files,
    Model(String),
    Models,
    Retry,
    History,
    New,
    Help,
    Quit,
    Prompt(String),
    Invalid(String),
}

impl ConsoleCommand {
    fn parse(line: &str) -> Self {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('/') else {
            return Self::Prompt(line.to_string());
        };

        let (name, args) = match rest.split_once(char::is_whitespace) {
            Some((name, args)) => (name, args.trim()),
            None => (rest, ""),
        };

        match (name, args) {
            ("attach" | "a", "") => Self::Invalid("usage: /attach <path> [path...]".into()),
            ("attach" | "a", paths) => {
                Self::Attach(paths.split_whitespace().map(str::to_string).collect())
            }
            ("remove" | "rm", "") => Self::Invalid("usage: /remove <id>".into()),
            ("remove" | "rm", id) => Self::Remove(id.to_string()),
            ("clear" | "cl", _) => Self::Clear,
            ("files" | "f", _) => Self::Files,
            ("model", "") => Self::Invalid("usage: /model <id>".into()),
            ("model", id) => Self::Model(id.to_string()),
            ("models" | "m", _) => Self::Models,
            ("retry" | "r", _) => Self::Retry,
            ("history", _) => Self::History,
            ("new", _) => Self::New,
            ("help" | "h", _) => Self::Help,
            ("quit" | "exit" | "q", _) => Self::Quit,
            (other, _) => Self::Invalid(format!("unknown command: /{other}")),
        }
    }
}

pub async fn run() -> anyhow::Result<()> {
    telemetry::init_tracing().context("failed to initialise tracing")?;

    info!("starting interactive console");

    let config = load_config().context("failed to load configuration")?;

    let services = ClientServices::initialise(&config)
        .await
        .context("failed to initialise client services")?;
    let orchestrator = services.orchestrator.clone();

    let _status = orchestrator.subscribe(|stage| {
        if let Some(label) = stage.label() {
            println!("  [{label}]");
        }
    });

    println!("NoOverfit Interactive Console");
    println!("Type a question, or '/help' for commands. Use Ctrl+C or '/quit' to exit");
    println!("---");
    if let Some(last) = orchestrator.messages().await.last() {
        print_message(last);
    }

    let stdin = tokio::io::stdin();
    let mut reader = BufReader::new(stdin);
    let mut line = String::new();

    loop {
        print!("> ");
        std::io::Write::flush(&mut std::io::stdout())?;

        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break;
        }
        if line.trim().is_empty() {
            continue;
        }

        match ConsoleCommand::parse(&line) {
            ConsoleCommand::Quit => {
                println!("Goodbye!");
                break;
            }
            ConsoleCommand::Help => print_help(),
            ConsoleCommand::Attach(paths) => attach(&orchestrator, paths).await,
            ConsoleCommand::Remove(id) => {
                if orchestrator.remove_attachment(&id).await {
                    println!("Removed {id}");
                } else {
                    println!("No staged file with id {id}");
                }
            }
            ConsoleCommand::Clear => {
                orchestrator.clear_attachments().await;
                println!("Staged files cleared");
            }
            ConsoleCommand::Files => print_files(&orchestrator).await,
            ConsoleCommand::Model(id) => match orchestrator.select_model(&id).await {
                Ok(()) => println!("Using {id}"),
                Err(error) => println!("{error}"),
            },
            ConsoleCommand::Models => {
                let selected = orchestrator.selected_model().await;
                for model in orchestrator.models() {
                    let marker = if model.id == selected { "*" } else { " " };
                    println!("{marker} {:<36} {}", model.id, model.name);
                }
            }
            ConsoleCommand::Retry => match orchestrator.last_failed_prompt().await {
                Some(prompt) => match orchestrator.retry(&prompt).await {
                    Ok(reply) => print_message(&reply),
                    Err(error) => println!("{error}"),
                },
                None => println!("Nothing to retry"),
            },
            ConsoleCommand::History => {
                for message in orchestrator.messages().await {
                    print_message(&message);
                }
            }
            ConsoleCommand::New => {
                orchestrator.new_session().await;
                println!("Started a new session");
            }
            ConsoleCommand::Prompt(text) => match orchestrator.send(&text).await {
                Ok(reply) => print_message(&reply),
                Err(error) => println!("{error}"),
            },
            ConsoleCommand::Invalid(message) => println!("{message}"),
        }
    }

    services.database.close().await;
    Ok(())
}

async fn attach(orchestrator: &ConversationOrchestrator, paths: Vec<String>) {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        match CandidateFile::from_path(&path).await {
            Ok(file) => files.push(file),
            Err(error) => println!("{error}"),
        }
    }
    if files.is_empty() {
        return;
    }

    match orchestrator.upload(files).await {
        Ok(outcome) => {
            for error in &outcome.errors {
                println!("  ! {error}");
            }
            print_files(orchestrator).await;
        }
        Err(error) => {
            for line in error.to_string().lines() {
                println!("  ! {line}");
            }
        }
    }
}

async fn print_files(orchestrator: &ConversationOrchestrator) {
    let attachments = orchestrator.attachments().await;
    if attachments.is_empty() {
        println!("No staged files");
        return;
    }
    for attachment in attachments {
        println!(
            "  {}  {} ({} bytes, {})",
            attachment.id, attachment.name, attachment.size, attachment.mime_type
        );
    }
}

fn print_message(message: &Message) {
    let author = match message.role {
        MessageRole::User => "you",
        MessageRole::Model => "nooverfit",
        MessageRole::System => "system",
    };
    println!("{author}: {}", message.text);
    if let Some(attachments) = message.attachments.as_ref().filter(|a| !a.is_empty()) {
        let names: Vec<&str> = attachments.iter().map(|a| a.name.as_str()).collect();
        println!("  attached: {}", names.join(", "));
    }
    if message.is_error {
        println!("  (type /retry to try again)");
    }
}

fn print_help() {
    println!("Available commands:");
    println!("  /attach, /a <paths>  - Stage files for the next question");
    println!("  /remove, /rm <id>    - Remove a staged file");
    println!("  /clear, /cl          - Remove all staged files");
    println!("  /files, /f           - List staged files");
    println!("  /model <id>          - Select a model");
    println!("  /models, /m          - List models");
    println!("  /retry, /r           - Retry the last failed question");
    println!("  /history             - Show the conversation");
    println!("  /new                 - Start a new session");
    println!("  /quit, /exit, /q     - Exit console");
    println!("Anything else is sent as a question.");
}
