//! Conforma command line: serve the REST/SSE API or run a one-shot analysis.

use std::collections::HashMap;
use std::io::Write;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::pin::pin;
use std::sync::Arc;

use anyhow::Context;
use clap::{Parser, Subcommand};
use futures::StreamExt;

use conforma_ai::{HashEmbedder, OllamaGenerator};
use conforma_core::{DocumentSelection, DocumentStore, Partition, Settings};
use conforma_pipeline::{run_analysis, stream_answer, AnalysisContext};
use conforma_server::AppState;
use conforma_store::MemoryStore;

#[derive(Parser)]
#[command(name = "conforma")]
#[command(version, about = "Compliance analysis over internal and regulatory documents")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the REST/SSE server with a fresh in-memory store.
    Serve {
        /// Listen address, overriding CONFORMA_SERVER_ADDR.
        #[arg(long)]
        addr: Option<SocketAddr>,
    },

    /// Ingest text files, run one analysis, and stream the answer to stdout.
    Analyze {
        /// Internal policy text files.
        #[arg(long = "internal", required = true)]
        internal: Vec<PathBuf>,

        /// Regulatory text files.
        #[arg(long = "regulatory", required = true)]
        regulatory: Vec<PathBuf>,

        /// The question to answer over the findings.
        message: String,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let settings = Settings::from_env();

    match cli.command {
        Commands::Serve { addr } => serve(settings, addr).await,
        Commands::Analyze {
            internal,
            regulatory,
            message,
        } => analyze(settings, &internal, &regulatory, &message).await,
    }
}

fn build_context(settings: &Settings) -> anyhow::Result<AnalysisContext> {
    let embedder = Arc::new(HashEmbedder::new(settings.embed_dim));
    let store = Arc::new(MemoryStore::new(embedder, &settings.pipeline)?);
    let generator = Arc::new(OllamaGenerator::new(settings)?);
    Ok(AnalysisContext::new(
        store,
        generator,
        settings.pipeline.clone(),
    ))
}

async fn serve(settings: Settings, addr: Option<SocketAddr>) -> anyhow::Result<()> {
    let addr = match addr {
        Some(addr) => addr,
        None => settings
            .server_addr
            .parse()
            .with_context(|| format!("invalid server address {:?}", settings.server_addr))?,
    };
    let ctx = build_context(&settings)?;
    conforma_server::serve(addr, AppState { ctx }).await?;
    Ok(())
}

async fn analyze(
    settings: Settings,
    internal: &[PathBuf],
    regulatory: &[PathBuf],
    message: &str,
) -> anyhow::Result<()> {
    let ctx = build_context(&settings)?;

    let internal = ingest(&ctx, Partition::Internal, internal).await?;
    let regulatory = ingest(&ctx, Partition::Regulatory, regulatory).await?;

    let mut result = Default::default();
    {
        let mut analysis = pin!(run_analysis(ctx.clone(), internal, regulatory));
        while let Some(event) = analysis.next().await {
            println!("{}\n", event.message);
            result = event.snapshot;
        }
    }

    let stream = stream_answer(&ctx, message, &result, &[]).await?;
    let mut stream = pin!(stream);
    let mut stdout = std::io::stdout();
    while let Some(fragment) = stream.next().await {
        let token = fragment?;
        stdout.write_all(token.as_bytes())?;
        stdout.flush()?;
    }
    println!();
    Ok(())
}

/// Upsert each file's text under its stem as document id; returns the
/// selection covering all of them.
async fn ingest(
    ctx: &AnalysisContext,
    partition: Partition,
    paths: &[PathBuf],
) -> anyhow::Result<DocumentSelection> {
    let mut ids = Vec::new();
    for path in paths {
        let doc_id = doc_id_for(path)?;
        let text = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("reading {}", path.display()))?;
        ctx.store
            .upsert(partition, &doc_id, &text, HashMap::new())
            .await
            .map_err(|e| anyhow::anyhow!("ingesting {}: {e}", path.display()))?;
        tracing::info!(doc_id = %doc_id, partition = %partition, "ingested");
        ids.push(doc_id);
    }
    Ok(DocumentSelection::new(ids))
}

fn doc_id_for(path: &Path) -> anyhow::Result<String> {
    path.file_stem()
        .and_then(|stem| stem.to_str())
        .map(str::to_string)
        .ok_or_else(|| anyhow::anyhow!("unusable file name: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn doc_id_is_the_file_stem() {
        assert_eq!(doc_id_for(Path::new("docs/hr_policy.txt")).unwrap(), "hr_policy");
        assert_eq!(doc_id_for(Path::new("gdpr.md")).unwrap(), "gdpr");
    }

    #[test]
    fn cli_parses_analyze() {
        let cli = Cli::try_parse_from([
            "conforma",
            "analyze",
            "--internal",
            "hr_policy.txt",
            "--regulatory",
            "gdpr.txt",
            "Are we compliant?",
        ])
        .unwrap();
        match cli.command {
            Commands::Analyze {
                internal,
                regulatory,
                message,
            } => {
                assert_eq!(internal, vec![PathBuf::from("hr_policy.txt")]);
                assert_eq!(regulatory, vec![PathBuf::from("gdpr.txt")]);
                assert_eq!(message, "Are we compliant?");
            }
            _ => panic!("expected analyze"),
        }
    }

    #[test]
    fn cli_parses_serve_with_addr() {
        let cli = Cli::try_parse_from(["conforma", "serve", "--addr", "0.0.0.0:9000"]).unwrap();
        match cli.command {
            Commands::Serve { addr } => {
                assert_eq!(addr, Some("0.0.0.0:9000".parse().unwrap()));
            }
            _ => panic!("expected serve"),
        }
    }
}
