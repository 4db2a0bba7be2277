//! # docchat CLI
//!
//! ```bash
//! docchat --config ./config/docchat.toml <command>
//! ```
//!
//! | Command | Description |
//! |---------|-------------|
//! | `docchat serve` | Start the browser UI |
//! | `docchat collections` | List collections known to the backend |
//! | `docchat ask` | Ask one question from the terminal |

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use docchat::backend::HttpBackend;
use docchat::chat;
use docchat::collections::{capitalize, fetch_collections, list_collections};
use docchat::config;
use docchat::server;
use docchat::session::Session;
use docchat::viewer::source_title;

/// docchat: a browser chat front-end for a RAG backend.
///
/// Settings come from the `--config` TOML file (optional), a `.env` file in
/// the working directory, and the `BACKEND_BASE_PATH` / `DOC_UPLOAD_DIR`
/// environment variables.
#[derive(Parser)]
#[command(name = "docchat", version, about = "Browser chat front-end for a RAG backend")]
struct Cli {
    /// Path to configuration file (TOML). Missing file means defaults.
    #[arg(long, global = true, default_value = "./config/docchat.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server on `[server].bind`.
    Serve,

    /// List collections.
    ///
    /// Without `--with-documents` the list is sorted by name; with it, each
    /// collection's documents are listed in backend order.
    Collections {
        #[arg(long)]
        with_documents: bool,
    },

    /// Ask a question against a collection or one of its documents.
    Ask {
        /// Collection name (case-insensitive).
        #[arg(long)]
        collection: String,

        /// Restrict the question to this document.
        #[arg(long)]
        document: Option<String>,

        prompt: String,
    },
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("docchat=info,tower_http=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Collections { with_documents } => {
            let backend = HttpBackend::new(&cfg.backend)?;
            let outcome = fetch_collections(&backend, with_documents).await;
            if let Some(err) = outcome.error() {
                eprintln!("warning: {}", err);
            }
            let Some(collections) = outcome.into_collections() else {
                bail!("document population failed");
            };

            println!("{:<24} ID", "COLLECTION");
            for c in &collections {
                println!("{:<24} {}", c.label, c.value);
                for doc in c.documents() {
                    println!("  - {}", doc.label);
                }
            }
        }
        Commands::Ask {
            collection,
            document,
            prompt,
        } => {
            let backend = HttpBackend::new(&cfg.backend)?;
            let collections = list_collections(&backend, document.is_some())
                .await
                .unwrap_or_default();

            let wanted = capitalize(&collection);
            let Some(selected) = collections.iter().find(|c| c.label == wanted) else {
                bail!("collection not found: {}", collection);
            };
            let doc = match document.as_deref() {
                Some(name) => match selected.find_document(name) {
                    Some(d) => Some(d),
                    None => bail!("document not found in {}: {}", selected.label, name),
                },
                None => None,
            };

            let mut session = Session::new();
            let reply = chat::ask(&backend, &mut session, selected, doc, &prompt).await;

            println!("{}", reply.text);
            if let Some(citations) = reply.citations {
                println!();
                println!("Sources:");
                for citation in &citations {
                    println!("  {}", source_title(citation));
                }
            }
        }
    }

    Ok(())
}
