//! Hearth CLI - terminal chat with persistent, self-compacting memory

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, Parser, Subcommand};

use hearth_core::chat::{ChatEngine, new_session_id};
use hearth_core::compactor::{CompactionOutcome, MemoryCompactor};
use hearth_core::config::HearthConfig;
use hearth_core::events::{EventSink, NullEventSink, SqliteEventLog, record_best_effort};
use hearth_core::llm::client_from_config;
use hearth_core::store::{ConversationStore, Role, SqliteStore};

#[derive(Parser)]
#[command(name = "hearth")]
#[command(about = "Local chat with persistent, self-compacting memory", long_about = None)]
#[command(version)]
struct Cli {
    /// SQLite database path (overrides configuration)
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    /// Session identifier
    #[arg(long, global = true, env = "HEARTH_SESSION", default_value = "default")]
    session: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start an interactive chat (the default)
    Chat(ChatArgs),
    /// Delete the session's conversation history
    Clear,
    /// Show recent audit log events
    Logs {
        /// Number of events to show
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Export the session's audit log as JSONL
    Export {
        /// Output file (stdout if omitted)
        #[arg(long)]
        out: Option<PathBuf>,
    },
    /// Version information
    Version,
}

#[derive(Args, Default)]
struct ChatArgs {
    /// Model name
    #[arg(long)]
    model: Option<String>,

    /// Model server base URL
    #[arg(long)]
    base_url: Option<String>,

    /// Sampling temperature
    #[arg(long)]
    temperature: Option<f32>,

    /// Nucleus sampling cutoff
    #[arg(long)]
    top_p: Option<f32>,

    /// Sampling seed
    #[arg(long)]
    seed: Option<i64>,

    /// System prompt applied at runtime
    #[arg(long)]
    system_prompt: Option<String>,

    /// Compact once the conversation exceeds this many characters
    #[arg(long)]
    limit_chars: Option<usize>,

    /// Keep this many recent messages verbatim across compaction
    #[arg(long)]
    keep_last: Option<usize>,

    /// Disable automatic compaction of long conversations
    #[arg(long)]
    no_compact: bool,

    /// Disable audit logging
    #[arg(long)]
    no_log: bool,

    /// Start a fresh session under a random UUID
    #[arg(long)]
    new_session: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    let mut config = HearthConfig::load()?;
    if let Some(db) = cli.db {
        config.storage.db_path = db;
    }

    match cli.command.unwrap_or(Commands::Chat(ChatArgs::default())) {
        Commands::Chat(args) => run_chat(config, cli.session, args).await,
        Commands::Clear => {
            let store = SqliteStore::new(&config.storage.db_path)?;
            store.clear(&cli.session).await?;
            if config.logging.enabled {
                let events = SqliteEventLog::new(&config.storage.db_path)?;
                record_best_effort(&events, &cli.session, "chat_cleared", serde_json::json!({}))
                    .await;
            }
            println!("session '{}' cleared", cli.session);
            Ok(())
        }
        Commands::Logs { limit } => {
            let events = SqliteEventLog::new(&config.storage.db_path)?;
            for record in events.recent(&cli.session, limit).await? {
                println!("{} | {}", record.ts, record.event);
                println!("{}", record.payload);
            }
            Ok(())
        }
        Commands::Export { out } => {
            let events = SqliteEventLog::new(&config.storage.db_path)?;
            let data = events.export(&cli.session).await?;
            match out {
                Some(path) => {
                    std::fs::write(&path, data)?;
                    println!("wrote {}", path.display());
                }
                None => println!("{data}"),
            }
            Ok(())
        }
        Commands::Version => {
            println!("hearth {}", env!("CARGO_PKG_VERSION"));
            println!("hearth-core {}", hearth_core::VERSION);
            Ok(())
        }
    }
}

async fn run_chat(mut config: HearthConfig, session: String, args: ChatArgs) -> Result<()> {
    if let Some(model) = args.model {
        config.model.model = model;
    }
    if let Some(base_url) = args.base_url {
        config.model.base_url = Some(base_url);
    }
    if let Some(temperature) = args.temperature {
        config.model.temperature = temperature;
    }
    if let Some(top_p) = args.top_p {
        config.model.top_p = top_p;
    }
    if let Some(seed) = args.seed {
        config.model.seed = seed;
    }
    if let Some(system_prompt) = args.system_prompt {
        config.model.system_prompt = system_prompt;
    }
    if let Some(limit_chars) = args.limit_chars {
        config.compaction.settings.limit_chars = limit_chars;
    }
    if let Some(keep_last) = args.keep_last {
        config.compaction.settings.keep_last = keep_last;
    }
    config.validate()?;

    let session = if args.new_session {
        new_session_id()
    } else {
        session
    };

    let store = Arc::new(SqliteStore::new(&config.storage.db_path)?);
    let events: Arc<dyn EventSink> = if args.no_log || !config.logging.enabled {
        Arc::new(NullEventSink)
    } else {
        Arc::new(SqliteEventLog::new(&config.storage.db_path)?)
    };
    let client = Arc::new(client_from_config(&config.model));

    let mut engine = ChatEngine::new(store, client, events)
        .with_system_prompt(config.model.system_prompt.clone());
    if config.compaction.enabled && !args.no_compact {
        engine = engine.with_compactor(MemoryCompactor::new(config.compaction.settings.clone()));
    }

    println!(
        "hearth {} | session {} | model {}",
        env!("CARGO_PKG_VERSION"),
        session,
        config.model.model
    );
    println!("type a message; 'exit' to quit");
    println!();

    // Replay prior turns so the session picks up where it left off.
    for turn in engine.history(&session).await? {
        match turn.role {
            Role::User => println!("you> {}", turn.text),
            Role::Assistant => println!("{}\n", turn.text),
            Role::Other(_) => {}
        }
    }

    let stdin = io::stdin();
    loop {
        print!("you> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == "exit" || line == "quit" {
            break;
        }

        let reply = engine
            .send_streaming(&session, line, |chunk| {
                print!("{chunk}");
                let _ = io::stdout().flush();
            })
            .await?;
        println!();

        if let Some(error) = reply.error {
            eprintln!("llm error: {error}");
        }
        if let Some(CompactionOutcome::Compacted(report)) = reply.compaction {
            println!(
                "[memory] conversation compacted: {} -> {} chars, kept last {} messages",
                report.pre_chars, report.post_chars, report.kept_messages
            );
        }
        println!();
    }

    Ok(())
}
