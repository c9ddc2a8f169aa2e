mod args;
mod config;

use std::fs;
use std::io::Read;
use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use cover_core::error::AppError;
use cover_core::model::ModelRegistry;
use cover_core::profile::ProfileInput;
use cover_rag::corpus::load_text_dir;
use cover_rag::embeddings::OllamaEmbedder;
use cover_rag::graph::{ingest_chunks, ingest_policy_records, GraphStore, IngestOptions};
use cover_rag::llm::{Completer, OllamaCompleter};
use cover_rag::ollama::OllamaClient;
use cover_rag::orchestrator::{quote, Recommender};
use cover_rag::prompts::build_evidence_prompt;
use cover_rag::retrieve::HybridRetriever;
use cover_rag::vector::{EmbeddingSearch, IndexBuildInput, VectorIndex};
use serde::Serialize;
use serde_json::{json, Value};
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{error, info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use crate::args::{Cli, Command};
use crate::config::Config;

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_tracing();

    match run(cli) {
        Ok(value) => match serde_json::to_string_pretty(&value) {
            Ok(out) => {
                println!("{out}");
                ExitCode::SUCCESS
            }
            Err(e) => {
                error!(err = %e, "failed to encode output");
                ExitCode::FAILURE
            }
        },
        Err(e) => {
            error!(code = %e.code, stage = ?e.stage, "{e}");
            let body = serde_json::to_string_pretty(&json!({ "error": e }))
                .unwrap_or_else(|_| e.to_string());
            println!("{body}");
            ExitCode::FAILURE
        }
    }
}

/// Logs go to stderr so stdout stays machine-readable.
fn init_tracing() {
    fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run(cli: Cli) -> Result<Value, AppError> {
    let config = Config::load(cli.config.as_deref())?;

    match cli.command {
        Command::Ping => ping(&config),
        Command::Index { dir } => index(&config, &dir),
        Command::Ingest {
            limit,
            batch,
            job,
            resume,
        } => {
            let opts = IngestOptions {
                batch_size: batch.unwrap_or(config.ingest.batch_size),
                limit,
                job,
                resume,
            };
            let chunks = VectorIndex::open(config.storage.vector_dir.clone()).documents()?;
            if chunks.is_empty() {
                return Err(AppError::new(
                    "INGEST_INDEX_EMPTY",
                    "Vector index has no documents; run `index` first",
                )
                .with_details(format!("vector_dir={}", config.storage.vector_dir.display())));
            }
            let mut store = open_graph(&config)?;
            to_json(&ingest_chunks(&mut store, chunks, &opts)?)
        }
        Command::IngestRecords {
            csv,
            dataset,
            batch,
            job,
            resume,
        } => {
            let opts = IngestOptions {
                batch_size: batch.unwrap_or(config.ingest.batch_size),
                limit: None,
                job,
                resume,
            };
            let text = fs::read_to_string(&csv).map_err(|e| {
                AppError::new("INGEST_CSV_READ_FAILED", "Failed to read policy CSV")
                    .with_details(format!("path={}; err={}", csv.display(), e))
            })?;
            let mut store = open_graph(&config)?;
            to_json(&ingest_policy_records(&mut store, &text, &dataset, &opts)?)
        }
        Command::Query {
            q,
            kvec,
            kgraph,
            evidence_only,
        } => {
            let retriever = build_retriever(&config)?;
            let pack = retriever.retrieve(
                &q,
                kvec.unwrap_or(config.retrieval.k_vector),
                kgraph.unwrap_or(config.retrieval.k_graph),
            )?;
            if evidence_only {
                return Ok(json!({ "answer": null, "evidence": pack }));
            }
            let prompt = build_evidence_prompt(&q, &pack, None);
            let answer = match build_completer(&config)?.complete(&prompt, "English") {
                Ok(text) => Some(text),
                Err(e) => {
                    warn!(error = %e, "answer unavailable; returning evidence only");
                    None
                }
            };
            Ok(json!({ "answer": answer, "evidence": pack }))
        }
        Command::Recommend { profile } => {
            let input = read_profile(&profile)?;
            let recommender = Recommender::new(
                load_registry(&config)?,
                build_retriever(&config)?,
                build_completer(&config)?,
            )
            .with_retrieval_sizes(config.retrieval.k_vector, config.retrieval.k_graph);
            to_json(&recommender.recommend(&input)?)
        }
        Command::Quote { profile } => {
            let input = read_profile(&profile)?;
            to_json(&quote(&load_registry(&config)?, &input)?)
        }
    }
}

fn ping(config: &Config) -> Result<Value, AppError> {
    let client = OllamaClient::new(&config.ollama.base_url)?;
    client.health_check()?;

    let store = open_graph(config)?;
    store.ping()?;
    let counts = store.counts()?;

    let status = VectorIndex::open(config.storage.vector_dir.clone()).status()?;
    let registry = load_registry(config)?;
    info!(bundles = registry.len(), "all backends reachable");

    Ok(json!({
        "ollama": client.base_url(),
        "graph": counts,
        "vector_index": status,
        "model_bundles": registry.len(),
    }))
}

fn index(config: &Config, dir: &Path) -> Result<Value, AppError> {
    let chunks = load_text_dir(dir)?;
    let client = OllamaClient::new(&config.ollama.base_url)?;
    let updated_at = OffsetDateTime::now_utc().format(&Rfc3339).map_err(|e| {
        AppError::new("INTERNAL_TIME_FORMAT_FAILED", "Failed to format timestamp")
            .with_details(e.to_string())
    })?;
    let status = VectorIndex::open(config.storage.vector_dir.clone()).build_with_embedder(
        &chunks,
        &OllamaEmbedder::new(client),
        IndexBuildInput {
            model: config.ollama.embed_model.clone(),
            updated_at,
        },
    )?;
    to_json(&status)
}

fn open_graph(config: &Config) -> Result<GraphStore, AppError> {
    if let Some(parent) = config.storage.graph_db.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| {
                AppError::new("CONFIG_GRAPH_OPEN_FAILED", "Failed to create graph directory")
                    .with_details(format!("path={}; err={}", parent.display(), e))
            })?;
        }
    }
    GraphStore::open(&config.storage.graph_db)
}

/// Missing artifacts for any configured country fail here, before a request is served.
fn load_registry(config: &Config) -> Result<ModelRegistry, AppError> {
    let registry = ModelRegistry::load_dir(&config.storage.models_dir)?;
    registry.require(&config.countries()?)?;
    Ok(registry)
}

fn build_retriever(config: &Config) -> Result<HybridRetriever, AppError> {
    let client = OllamaClient::new(&config.ollama.base_url)?;
    let vectors = EmbeddingSearch::new(
        VectorIndex::open(config.storage.vector_dir.clone()),
        OllamaEmbedder::new(client),
    );
    Ok(HybridRetriever::new(Box::new(vectors), Box::new(open_graph(config)?)))
}

fn build_completer(config: &Config) -> Result<Box<dyn Completer>, AppError> {
    let client = OllamaClient::new(&config.ollama.base_url)?;
    Ok(Box::new(OllamaCompleter::new(client, config.ollama.llm_model.clone())))
}

fn read_profile(arg: &str) -> Result<ProfileInput, AppError> {
    let raw = if arg == "-" {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf).map_err(|e| {
            AppError::new("VALIDATION_PROFILE_UNREADABLE", "Failed to read profile from stdin")
                .with_details(e.to_string())
        })?;
        buf
    } else {
        fs::read_to_string(arg).map_err(|e| {
            AppError::new("VALIDATION_PROFILE_UNREADABLE", "Failed to read profile file")
                .with_details(format!("path={arg}; err={e}"))
        })?
    };
    serde_json::from_str(&raw).map_err(|e| {
        AppError::new("VALIDATION_PROFILE_INVALID", "Profile is not valid JSON")
            .with_details(e.to_string())
    })
}

fn to_json<T: Serialize>(value: &T) -> Result<Value, AppError> {
    serde_json::to_value(value).map_err(|e| {
        AppError::new("INTERNAL_JSON_ENCODE_FAILED", "Failed to encode output")
            .with_details(e.to_string())
    })
}
