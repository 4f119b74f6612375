use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use batchquery_chats::{
    render_conversation, render_logs, render_registry, ChatSession, ImageFile,
};
use batchquery_config::load as load_config;
use batchquery_runtime::{shutdown_signal, telemetry, ClientServices};
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "batchquery")]
#[command(about = "Ask one question about several images at once (console by default)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start interactive console (default)
    Console,
    /// Send a single batch and print the conversation
    Ask {
        /// Image to include; repeat for several images
        #[arg(long = "image", required = true)]
        images: Vec<PathBuf>,
        /// Question to ask; falls back to the configured default prompt
        #[arg(long)]
        prompt: Option<String>,
        /// Use the simulated responder even when a credential is configured
        #[arg(long)]
        mock: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command.unwrap_or(Commands::Console) {
        Commands::Console => run_console().await,
        Commands::Ask {
            images,
            prompt,
            mock,
        } => run_ask(&images, prompt, mock).await,
    }
}

async fn bootstrap() -> anyhow::Result<ClientServices> {
    telemetry::init_tracing().context("failed to initialise tracing")?;

    let config = load_config().context("failed to load configuration")?;

    ClientServices::initialise(&config)
        .await
        .context("failed to initialise client services")
}

/// Reads every path; unreadable files are counted as rejected selections.
async fn read_images<P: AsRef<Path>>(paths: &[P]) -> (Vec<ImageFile>, usize) {
    let mut files = Vec::with_capacity(paths.len());
    let mut rejected = 0;

    for path in paths {
        let path = path.as_ref();
        match ImageFile::read(path).await {
            Ok(file) => files.push(file),
            Err(error) => {
                warn!(path = %path.display(), %error, "skipping unreadable file");
                rejected += 1;
            }
        }
    }

    (files, rejected)
}

async fn run_ask(images: &[PathBuf], prompt: Option<String>, mock: bool) -> anyhow::Result<()> {
    let services = bootstrap().await?;
    let mut session = services.new_session();

    if mock {
        session.set_use_real_model(false);
    }
    if let Some(prompt) = prompt {
        session.set_prompt(prompt);
    }

    let (files, rejected) = read_images(images).await;
    let outcome = session.add_files(files, rejected);
    for error in &outcome.errors {
        eprintln!("! {error}");
    }

    let Some(summary) = session.submit(&services.orchestrator).await else {
        bail!("nothing to send: select at least one image and enter a prompt");
    };

    print!("{}", render_conversation(session.messages()));
    if let Some(banner) = session.banner() {
        eprintln!("! {banner}");
    }

    info!(
        answered = summary.answered,
        failed = summary.failed,
        unmatched = summary.unmatched,
        "batch finished"
    );
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum ConsoleCommand<'a> {
    Help,
    Add(Vec<&'a str>),
    Remove(&'a str),
    Images,
    Prompt(&'a str),
    Send,
    Ask(&'a str),
    Mode(Option<bool>),
    Logs,
    Dismiss,
    Quit,
    Usage(&'static str),
    Unknown(&'a str),
}

fn parse_command(input: &str) -> ConsoleCommand<'_> {
    let input = input.trim();
    if !input.starts_with('/') {
        return ConsoleCommand::Ask(input);
    }

    let (name, rest) = input
        .split_once(char::is_whitespace)
        .map(|(name, rest)| (name, rest.trim()))
        .unwrap_or((input, ""));

    match name {
        "/help" | "/h" => ConsoleCommand::Help,
        "/add" | "/a" if rest.is_empty() => ConsoleCommand::Usage("/add <path> [path...]"),
        "/add" | "/a" => ConsoleCommand::Add(rest.split_whitespace().collect()),
        "/remove" | "/rm" if rest.is_empty() => ConsoleCommand::Usage("/remove <n|id>"),
        "/remove" | "/rm" => ConsoleCommand::Remove(rest),
        "/images" | "/i" => ConsoleCommand::Images,
        "/prompt" | "/p" => ConsoleCommand::Prompt(rest),
        "/send" | "/s" => ConsoleCommand::Send,
        "/mode" | "/m" => match rest {
            "" => ConsoleCommand::Mode(None),
            "real" | "openai" => ConsoleCommand::Mode(Some(true)),
            "mock" => ConsoleCommand::Mode(Some(false)),
            _ => ConsoleCommand::Usage("/mode real|mock"),
        },
        "/logs" | "/l" => ConsoleCommand::Logs,
        "/dismiss" | "/d" => ConsoleCommand::Dismiss,
        "/quit" | "/exit" | "/q" => ConsoleCommand::Quit,
        other => ConsoleCommand::Unknown(other),
    }
}

fn print_help() {
    println!("Available commands:");
    println!("  /help, /h              - Show this help");
    println!("  /add, /a <paths>       - Select image files");
    println!("  /remove, /rm <n|id>    - Remove an image by position or id prefix");
    println!("  /images, /i            - List selected images");
    println!("  /prompt, /p <text>     - Set the prompt without sending");
    println!("  /send, /s              - Ask the prompt about every selected image");
    println!("  /mode, /m real|mock    - Choose the OpenAI or the simulated responder");
    println!("  /logs, /l              - Show the diagnostic log");
    println!("  /dismiss, /d           - Dismiss the current error banner");
    println!("  /quit, /exit, /q       - Exit console");
    println!("Any other text sets the prompt and sends it.");
}

fn print_mode(session: &ChatSession, services: &ClientServices) {
    let model = services
        .orchestrator
        .active_model()
        .unwrap_or_else(|| "simulated".to_string());
    println!("Mode: {} (model: {model})", session.mode().label());
    if session.use_real_model() && !services.orchestrator.has_credential() {
        println!("No OpenAI credential configured; batches use the simulated responder.");
    }
}

async fn send(session: &mut ChatSession, services: &ClientServices) {
    let start = session.messages().len();
    if !session.can_send() {
        if session.images().is_empty() {
            println!("Select at least one image with /add first.");
        } else if session.prompt().trim().is_empty() {
            println!("Enter a prompt first.");
        }
        return;
    }

    println!("Sending {} image(s)...", session.images().len());
    if let Some(summary) = session.submit(&services.orchestrator).await {
        print!("{}", render_conversation(&session.messages()[start..]));
        println!(
            "--- {} answered, {} failed",
            summary.answered,
            summary.failed + summary.unmatched
        );
    }
}

async fn run_console() -> anyhow::Result<()> {
    let services = bootstrap().await?;
    let mut session = services.new_session();

    info!("starting interactive console");

    println!("BatchQuery Interactive Console");
    println!("Add up to {} images with '/add', then type a question.", services.config.session.max_images);
    println!("Type '/help' for all commands. Use Ctrl+C or '/quit' to exit");
    print_mode(&session, &services);
    println!("Prompt: {}", session.prompt());
    println!("---");

    let stdin = tokio::io::stdin();
    let mut reader = BufReader::new(stdin);
    let mut line = String::new();
    let mut shown_banner: Option<String> = None;

    loop {
        print!("> ");
        std::io::Write::flush(&mut std::io::stdout())?;

        line.clear();
        let bytes_read = tokio::select! {
            read = reader.read_line(&mut line) => read?,
            _ = shutdown_signal() => {
                println!();
                break;
            }
        };
        if bytes_read == 0 {
            break; // EOF
        }

        if line.trim().is_empty() {
            continue;
        }

        match parse_command(&line) {
            ConsoleCommand::Quit => {
                println!("Goodbye!");
                break;
            }
            ConsoleCommand::Help => print_help(),
            ConsoleCommand::Add(paths) => {
                let (files, rejected) = read_images(paths.as_slice()).await;
                let outcome = session.add_files(files, rejected);
                if !outcome.added.is_empty() {
                    println!("Added {} image(s).", outcome.added.len());
                }
                print!(
                    "{}",
                    render_registry(session.images(), session.registry().max_images())
                );
            }
            ConsoleCommand::Remove(selector) => match session.remove_image(selector) {
                Ok(id) => {
                    println!("Removed image {id}.");
                    print!(
                        "{}",
                        render_registry(session.images(), session.registry().max_images())
                    );
                }
                Err(error) => println!("{error}"),
            },
            ConsoleCommand::Images => print!(
                "{}",
                render_registry(session.images(), session.registry().max_images())
            ),
            ConsoleCommand::Prompt("") => println!("Prompt: {}", session.prompt()),
            ConsoleCommand::Prompt(text) => {
                session.set_prompt(text);
                println!("Prompt set.");
            }
            ConsoleCommand::Send => send(&mut session, &services).await,
            ConsoleCommand::Ask(text) => {
                session.set_prompt(text);
                send(&mut session, &services).await;
            }
            ConsoleCommand::Mode(None) => print_mode(&session, &services),
            ConsoleCommand::Mode(Some(use_real_model)) => {
                session.set_use_real_model(use_real_model);
                print_mode(&session, &services);
            }
            ConsoleCommand::Logs => print!("{}", render_logs(session.logs())),
            ConsoleCommand::Dismiss => {
                session.dismiss_banner();
                shown_banner = None;
            }
            ConsoleCommand::Usage(usage) => println!("Usage: {usage}"),
            ConsoleCommand::Unknown(name) => {
                println!("Unknown command: {name}. Type '/help' for available commands.");
            }
        }

        let banner = session.banner().map(str::to_string);
        if banner != shown_banner {
            if let Some(message) = &banner {
                println!("! {message} (/dismiss to hide)");
            }
            shown_banner = banner;
        }
    }

    info!("console closed");
    Ok(())
}
