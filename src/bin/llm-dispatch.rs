use clap::{Parser, Subcommand};
use colored::*;
use llm_dispatch::builder::{DispatcherBuilder, LLMBackend};
use llm_dispatch::capability::Capability;
use llm_dispatch::dispatch::{DispatchResult, Dispatcher, RequestAssembler, SelectionMode};
use llm_dispatch::history::{Attachment, Session};
use llm_dispatch::store::{ConversationStore, Theme};
use llm_dispatch::tts::wav;
use rustyline::error::ReadlineError;
use rustyline::DefaultEditor;
use spinners::{Spinner, Spinners};
use std::io::{self, IsTerminal, Read, Write};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

/// Command line arguments for the dispatch CLI
#[derive(Parser)]
#[clap(
    name = "llm-dispatch",
    about = "Chat assistant backend: dispatch prompts to capabilities, with speech"
)]
struct CliArgs {
    #[command(subcommand)]
    command: Command,

    /// Backend provider (openai, huggingface)
    #[arg(long, global = true)]
    backend: Option<String>,

    /// API key for the provider
    #[arg(long, global = true)]
    api_key: Option<String>,

    /// Base URL for the API
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Chat model name
    #[arg(long, global = true)]
    model: Option<String>,

    /// Voice used for speech
    #[arg(long, global = true)]
    voice: Option<String>,

    /// Capability selection: "auto" or a capability name
    #[arg(long, global = true)]
    mode: Option<String>,

    /// Path of the conversation store
    #[arg(long, global = true)]
    store: Option<PathBuf>,

    /// Skip speech synthesis
    #[arg(long, global = true)]
    no_speech: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run the HTTP API
    Serve {
        #[arg(long, default_value = "127.0.0.1:3000")]
        addr: String,
        /// Bearer key clients must send
        #[arg(long, env = "LLM_DISPATCH_AUTH_KEY")]
        auth_key: Option<String>,
    },
    /// Interactive chat persisted in the store
    Chat {
        /// Start a new conversation instead of resuming the latest
        #[arg(long)]
        new: bool,
        /// Resume this conversation id
        #[arg(long)]
        conversation: Option<String>,
        /// Route every message to this capability
        #[arg(long)]
        capability: Option<String>,
    },
    /// One-shot dispatch
    Ask {
        /// Prompt (read from stdin when omitted and piped)
        prompt: Option<String>,
        /// Attach a text document
        #[arg(long)]
        file: Option<PathBuf>,
        #[arg(long)]
        capability: Option<String>,
        /// Write the spoken response as a WAV file
        #[arg(long)]
        audio_out: Option<PathBuf>,
    },
    /// Get or set custom instructions
    Instructions { value: Option<String> },
    /// Get or set the voice
    Voice { value: Option<String> },
    /// Get or set the theme (light, dark)
    Theme { value: Option<String> },
    /// List stored conversations
    List,
    /// Delete a stored conversation
    Delete { id: String },
}

fn open_store(args: &CliArgs) -> io::Result<ConversationStore> {
    match &args.store {
        Some(path) => ConversationStore::open(path),
        None => ConversationStore::open_default(),
    }
}

fn parse_capability(name: Option<&str>) -> Result<Option<Capability>, Box<dyn std::error::Error>> {
    name.map(Capability::from_str)
        .transpose()
        .map_err(|e| format!("Invalid capability: {e}").into())
}

/// Environment configuration overridden by command line flags and the stored voice.
fn build_dispatcher(
    args: &CliArgs,
    store: &ConversationStore,
) -> Result<Dispatcher, Box<dyn std::error::Error>> {
    let mut builder = DispatcherBuilder::from_env()?;

    if let Some(name) = &args.backend {
        let backend =
            LLMBackend::from_str(name).map_err(|e| format!("Invalid provider: {}", e))?;
        builder = builder.backend(backend);
        if args.api_key.is_none() {
            if let Ok(key) = std::env::var(backend.api_key_env()) {
                builder = builder.api_key(key);
            }
        }
    }
    if let Some(key) = &args.api_key {
        builder = builder.api_key(key);
    }
    if let Some(url) = &args.base_url {
        builder = builder.base_url(url);
    }
    if let Some(model) = &args.model {
        builder = builder.chat_model(model);
    }
    if let Some(voice) = args.voice.as_deref().or(store.voice()) {
        builder = builder.voice(voice);
    }
    if let Some(mode) = &args.mode {
        builder = builder.mode(SelectionMode::from_str(mode)?);
    }
    if args.no_speech {
        builder = builder.without_speech();
    }

    builder
        .build()
        .map_err(|e| format!("Failed to build dispatcher: {}", e).into())
}

fn read_attachment(path: &Path) -> io::Result<Attachment> {
    let text = std::fs::read_to_string(path)?;
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());
    let mime = match path.extension().and_then(|e| e.to_str()).map(str::to_lowercase) {
        Some(ext) if ext == "md" || ext == "markdown" => "text/markdown",
        Some(ext) if ext == "csv" => "text/csv",
        Some(ext) if ext == "json" => "application/json",
        Some(ext) if ext == "html" || ext == "htm" => "text/html",
        _ => "text/plain",
    };
    Ok(Attachment::new(name, text).with_mime(mime))
}

fn print_result(result: &DispatchResult) {
    if let Some(error) = &result.error {
        eprintln!("{} {}", "Error:".bright_red(), error);
        return;
    }
    let label = result
        .capability
        .map(|c| format!("> Assistant [{c}]:"))
        .unwrap_or_else(|| "> Assistant:".to_string());
    println!(
        "{} {}",
        label.bright_green(),
        result.response_text.as_deref().unwrap_or_default()
    );
    if let Some(content) = &result.structured_content {
        println!("{} {} bytes", "[image]".bright_blue(), content.len());
    }
    if result.audio_url.is_some() {
        println!("{}", "[audio ready]".bright_black());
    }
}

async fn run_chat(
    args: &CliArgs,
    new: bool,
    conversation: Option<&str>,
    capability: Option<&str>,
) -> Result<(), Box<dyn std::error::Error>> {
    let mut store = open_store(args)?;
    let dispatcher = Arc::new(build_dispatcher(args, &store)?);

    let state = match conversation {
        Some(id) => store
            .load(id)
            .ok_or_else(|| format!("No conversation with id {id}"))?,
        None if new => store.new_conversation(),
        None => store
            .list()
            .first()
            .and_then(|c| store.load(&c.id))
            .unwrap_or_else(|| store.new_conversation()),
    };
    let mut session = Session::resume(dispatcher, state);
    session.set_capability(parse_capability(capability)?);
    session.set_speak(!args.no_speech);

    println!("{}", "llm-dispatch - Interactive Chat".bright_cyan());
    println!("Conversation: {}", session.state().id.bright_green());
    println!(
        "{}",
        "Commands: /new, /clear, /attach <file> <prompt>, exit".bright_black()
    );
    println!("{}", "─".repeat(50).bright_black());

    let mut rl = DefaultEditor::new()?;

    loop {
        io::stdout().flush()?;
        let readline = rl.readline("> ");
        let line = match readline {
            Ok(line) => line,
            Err(ReadlineError::Interrupted) | Err(ReadlineError::Eof) => {
                println!("\n{}", "Goodbye!".bright_cyan());
                break;
            }
            Err(err) => {
                eprintln!("{} {:?}", "Error:".bright_red(), err);
                break;
            }
        };

        let trimmed = line.trim();
        if trimmed.eq_ignore_ascii_case("exit") {
            println!("{}", "Goodbye!".bright_cyan());
            break;
        }
        let _ = rl.add_history_entry(trimmed);

        let (prompt, attachment) = match trimmed {
            "/new" => {
                session.new_conversation();
                println!("New conversation: {}", session.state().id.bright_green());
                continue;
            }
            "/clear" => {
                session.clear_history();
                store.save(session.state())?;
                println!("{}", "History cleared".bright_black());
                continue;
            }
            _ => match trimmed.strip_prefix("/attach ") {
                Some(rest) => {
                    let (path, prompt) = rest.split_once(' ').unwrap_or((rest, ""));
                    match read_attachment(Path::new(path)) {
                        Ok(attachment) => (prompt.to_string(), Some(attachment)),
                        Err(e) => {
                            eprintln!("{} {}: {}", "Error:".bright_red(), path, e);
                            continue;
                        }
                    }
                }
                None => (trimmed.to_string(), None),
            },
        };

        let mut sp = Spinner::new(Spinners::Dots12, "Thinking...".bright_magenta().to_string());
        let result = session.submit(&prompt, attachment).await;
        sp.stop();
        print!("\r\x1B[K");

        print_result(&result);
        println!("{}", "─".repeat(50).bright_black());

        if let Err(e) = store.save(session.state()) {
            log::warn!("could not save conversation: {e}");
        }
    }

    Ok(())
}

async fn run_ask(
    args: &CliArgs,
    prompt: Option<String>,
    file: Option<&Path>,
    capability: Option<&str>,
    audio_out: Option<&Path>,
) -> Result<(), Box<dyn std::error::Error>> {
    let store = open_store(args)?;
    let dispatcher = build_dispatcher(args, &store)?;

    let prompt = match prompt {
        Some(p) => p,
        None if !io::stdin().is_terminal() => {
            let mut input = String::new();
            io::stdin().read_to_string(&mut input)?;
            input
        }
        None => String::new(),
    };

    let mut assembler = RequestAssembler::new(prompt)
        .custom_instructions(store.custom_instructions().map(str::to_owned))
        .voice(args.voice.clone().or_else(|| store.voice().map(str::to_owned)))
        .capability(parse_capability(capability)?)
        .speak(audio_out.is_some() && !args.no_speech);
    if let Some(path) = file {
        assembler = assembler.document_text(read_attachment(path)?.text);
    }

    let result = match assembler.build() {
        Ok(request) => dispatcher.dispatch(request).await,
        Err(e) => DispatchResult::failure(&e),
    };

    if let Some(error) = &result.error {
        eprintln!("{} {}", "Error:".bright_red(), error);
        return Ok(());
    }
    println!("{}", result.response_text.as_deref().unwrap_or_default());

    if let Some(path) = audio_out {
        match result.audio_url.as_deref().and_then(wav::from_data_uri) {
            Some(bytes) => {
                std::fs::write(path, bytes)?;
                eprintln!("{} {}", "Audio written to".bright_black(), path.display());
            }
            None => eprintln!("{}", "No audio was produced".bright_yellow()),
        }
    }
    Ok(())
}

/// Main entry point for the dispatch CLI
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    llm_dispatch::init_logging();
    let args = CliArgs::parse();

    match &args.command {
        Command::Serve { addr, auth_key } => {
            #[cfg(feature = "api")]
            {
                let store = open_store(&args)?;
                let mut server = llm_dispatch::api::Server::new(build_dispatcher(&args, &store)?);
                if let Some(key) = auth_key {
                    server = server.with_auth_key(key);
                }
                println!("Listening on {}", addr.bright_green());
                server.run(addr).await?;
            }
            #[cfg(not(feature = "api"))]
            {
                let _ = (addr, auth_key);
                return Err("The api feature is not enabled".into());
            }
        }
        Command::Chat {
            new,
            conversation,
            capability,
        } => run_chat(&args, *new, conversation.as_deref(), capability.as_deref()).await?,
        Command::Ask {
            prompt,
            file,
            capability,
            audio_out,
        } => {
            run_ask(
                &args,
                prompt.clone(),
                file.as_deref(),
                capability.as_deref(),
                audio_out.as_deref(),
            )
            .await?
        }
        Command::Instructions { value } => {
            let mut store = open_store(&args)?;
            match value {
                Some(value) => {
                    store.set_custom_instructions(value.as_str())?;
                    println!("{} Custom instructions saved.", "✓".bright_green());
                }
                None => match store.custom_instructions() {
                    Some(instructions) => println!("{}", instructions),
                    None => println!("{} No custom instructions set", "!".bright_yellow()),
                },
            }
        }
        Command::Voice { value } => {
            let mut store = open_store(&args)?;
            match value {
                Some(value) => {
                    store.set_voice(Some(value.clone()))?;
                    println!("{} Voice set to '{}'.", "✓".bright_green(), value);
                }
                None => match store.voice() {
                    Some(voice) => println!("{}", voice),
                    None => println!("{} No voice set", "!".bright_yellow()),
                },
            }
        }
        Command::Theme { value } => {
            let mut store = open_store(&args)?;
            match value {
                Some(value) => {
                    let theme = Theme::from_str(value)?;
                    store.set_theme(theme)?;
                    println!("{} Theme set to {}.", "✓".bright_green(), theme);
                }
                None => println!("{}", store.theme()),
            }
        }
        Command::List => {
            let store = open_store(&args)?;
            if store.list().is_empty() {
                println!("{} No conversations", "!".bright_yellow());
            }
            for record in store.list() {
                println!(
                    "{}  {}  {} ({} turns)",
                    record.id.bright_black(),
                    record.updated_at.format("%Y-%m-%d %H:%M"),
                    record.title.bright_green(),
                    record.messages.len()
                );
            }
        }
        Command::Delete { id } => {
            let mut store = open_store(&args)?;
            if store.delete(id)? {
                println!("{} Conversation '{}' has been deleted.", "✓".bright_green(), id);
            } else {
                println!("{} Conversation '{}' not found", "!".bright_yellow(), id);
            }
        }
    }

    Ok(())
}
