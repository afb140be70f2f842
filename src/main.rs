//! # Classroom RAG CLI (`classroom-rag`)
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `classroom-rag init` | Create the SQLite key-value store |
//! | `classroom-rag chunk <file>` | Chunk a text file and print the chunks |
//! | `classroom-rag search <file> "<query>"` | Keyword top-K over a text file |
//! | `classroom-rag ask <page.json> "<question>"` | Answer a question about a scraped page |
//! | `classroom-rag courses --token <t>` | List Classroom courses |
//! | `classroom-rag cache <action>` | Inspect or edit the key-value store |
//! | `classroom-rag serve` | Start the HTTP endpoint for the extension |
//!
//! Text inputs accept `-` for stdin.

use anyhow::{Context, Result};
use clap::{ArgAction, Parser, Subcommand};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use classroom_rag::chunk::make_chunk_objects;
use classroom_rag::config::{load_config, Config};
use classroom_rag::context::{CoursePage, Mode};
use classroom_rag::handler::{handle_message, Message, Services, Session};
use classroom_rag::llm::GeminiClient;
use classroom_rag::retrieve::score_by_keyword;
use classroom_rag::storage::KvStore;
use classroom_rag_core::models::ChunkSource;

#[derive(Parser)]
#[command(
    name = "classroom-rag",
    about = "Chunk, retrieve, and answer questions about Google Classroom pages",
    version
)]
struct Cli {
    /// Path to configuration file (TOML). Missing file means defaults.
    #[arg(long, global = true, default_value = "./config/classroom.toml")]
    config: PathBuf,

    /// Increase log verbosity (-v debug, -vv trace). `RUST_LOG` overrides.
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the key-value store. Idempotent.
    Init,

    /// Chunk a text file using the configured chunk sizes.
    Chunk {
        /// Text file, or `-` for stdin.
        input: PathBuf,

        /// Print chunk records as JSON instead of plain text.
        #[arg(long)]
        json: bool,

        /// Course id used for chunk ids.
        #[arg(long, default_value = "local")]
        course_id: String,

        /// Source id used for chunk ids (defaults to the file stem).
        #[arg(long)]
        source_id: Option<String>,

        /// Title recorded on each chunk.
        #[arg(long)]
        title: Option<String>,
    },

    /// Rank a text file's chunks against a query by keyword score.
    Search {
        /// Text file, or `-` for stdin.
        input: PathBuf,

        query: String,

        /// Maximum results (defaults to `retrieval.top_k`).
        #[arg(long)]
        k: Option<usize>,
    },

    /// Answer a question about a scraped page (JSON as posted by the scraper).
    Ask {
        /// Page JSON file, or `-` for stdin.
        page: PathBuf,

        question: String,

        /// `explain` or `quiz`.
        #[arg(long, default_value = "explain")]
        mode: Mode,
    },

    /// List the signed-in user's Classroom courses.
    Courses {
        /// OAuth bearer token.
        #[arg(long, env = "CLASSROOM_TOKEN")]
        token: String,
    },

    /// Inspect or edit the key-value store.
    Cache {
        #[command(subcommand)]
        action: CacheAction,
    },

    /// Start the HTTP endpoint for the extension.
    Serve,
}

#[derive(Subcommand)]
enum CacheAction {
    /// Print the JSON value stored under a key.
    Get { key: String },
    /// Store a JSON value under a key.
    Set { key: String, value: String },
    /// Remove a key.
    Remove { key: String },
    /// Remove every key in the configured namespace.
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let config = load_config(&cli.config)?;

    match cli.command {
        Commands::Init => {
            KvStore::open(&config).await?;
            println!("Database initialized at {}", config.db.path.display());
        }
        Commands::Chunk {
            input,
            json,
            course_id,
            source_id,
            title,
        } => {
            let text = read_input(&input)?;
            let source_id = source_id.unwrap_or_else(|| default_source_id(&input));
            let chunks = make_chunk_objects(&ChunkSource {
                course_id,
                source_id,
                title,
                text,
                chunk_opts: config.chunking,
                ..Default::default()
            });
            if json {
                println!("{}", serde_json::to_string_pretty(&chunks)?);
            } else {
                for c in &chunks {
                    println!("--- {} ({} chars) ---", c.id, c.text.chars().count());
                    println!("{}", c.text);
                }
                println!("chunks: {}", chunks.len());
            }
        }
        Commands::Search { input, query, k } => {
            let text = read_input(&input)?;
            let chunks = make_chunk_objects(&ChunkSource {
                course_id: "local".to_string(),
                source_id: default_source_id(&input),
                text,
                chunk_opts: config.chunking,
                ..Default::default()
            });
            let k = k.unwrap_or(config.retrieval.top_k);
            let scored = score_by_keyword(&chunks, &query);
            if scored.is_empty() {
                println!("No results.");
            }
            for (i, s) in scored.iter().take(k).enumerate() {
                let snippet: String = s.chunk.text.chars().take(120).collect();
                println!("{}. [{}] {}", i + 1, s.score, s.chunk.id);
                println!("   {}", snippet.replace('\n', " "));
            }
        }
        Commands::Ask {
            page,
            question,
            mode,
        } => run_ask(config, &page, question, mode).await?,
        Commands::Courses { token } => {
            let courses = classroom_rag::classroom::fetch_courses(&config.classroom, &token).await?;
            for c in &courses {
                println!("{}\t{}", c.id, c.name);
            }
            println!("courses: {}", courses.len());
        }
        Commands::Cache { action } => {
            let store = KvStore::open(&config).await?;
            match action {
                CacheAction::Get { key } => match store.get_local(&key).await? {
                    Some(v) => println!("{}", serde_json::to_string_pretty(&v)?),
                    None => println!("(not set)"),
                },
                CacheAction::Set { key, value } => {
                    let value: serde_json::Value = serde_json::from_str(&value)
                        .with_context(|| format!("Value for '{}' is not valid JSON", key))?;
                    store.set_local(&key, &value).await?;
                    println!("set {}:{}", store.namespace(), key);
                }
                CacheAction::Remove { key } => {
                    let removed = store.remove_local(&key).await?;
                    println!("removed: {}", removed);
                }
                CacheAction::Clear => {
                    let removed = store.clear_namespace().await?;
                    println!("cleared {} keys from namespace '{}'", removed, store.namespace());
                }
            }
        }
        Commands::Serve => classroom_rag::server::run_server(config).await?,
    }

    Ok(())
}

async fn run_ask(config: Config, page_path: &Path, question: String, mode: Mode) -> Result<()> {
    let raw = read_input(page_path)?;
    let page: CoursePage = serde_json::from_str(&raw)
        .with_context(|| format!("Failed to parse page JSON: {}", page_path.display()))?;

    let config = Arc::new(config);
    let services = Services {
        store: KvStore::open(&config).await?,
        model: Arc::new(GeminiClient::new(&config.llm)?),
        config,
    };
    let session = Session::new();

    handle_message(
        &session,
        &services,
        Message::ClassroomData {
            data: Some(page.clone()),
            token: None,
        },
    )
    .await
    .into_result()?;

    let reply = handle_message(
        &session,
        &services,
        Message::Chat {
            mode,
            course_id: None,
            message: question,
            data: Some(page),
        },
    )
    .await
    .into_result()?;

    println!("{}", reply.answer.unwrap_or_default());
    let sources = reply.sources.unwrap_or_default();
    if !sources.is_empty() {
        println!("\nContext used:");
        for (i, s) in sources.iter().enumerate() {
            println!("#{} {}\n{}\n", i + 1, s.title, s.snippet);
        }
    }
    Ok(())
}

fn read_input(path: &Path) -> Result<String> {
    if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin()
            .read_to_string(&mut buf)
            .context("Failed to read stdin")?;
        return Ok(buf);
    }
    std::fs::read_to_string(path).with_context(|| format!("Failed to read {}", path.display()))
}

fn default_source_id(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty() && *s != "-")
        .unwrap_or("stdin")
        .to_string()
}

fn init_tracing(verbose: u8) {
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = match verbose {
        0 => "classroom_rag=info",
        1 => "classroom_rag=debug",
        _ => "classroom_rag=trace",
    };
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}
