use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Insurance tier recommendations grounded in policy documents.
#[derive(Parser, Debug)]
#[command(name = "coverwise", version, about, long_about = None)]
pub struct Cli {
    /// Configuration file (defaults to ./coverwise.toml when present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Check the Ollama server, graph database, vector index and model artifacts
    Ping,

    /// Chunk and embed a directory of policy documents into the vector index
    Index {
        /// Directory of .txt/.md documents
        #[arg(long)]
        dir: PathBuf,
    },

    /// Load indexed chunks into the knowledge graph
    Ingest {
        /// Stop after the batch that reaches this many chunks
        #[arg(long)]
        limit: Option<usize>,
        /// Chunks per transaction
        #[arg(long)]
        batch: Option<usize>,
        /// Checkpoint name for resumable runs
        #[arg(long)]
        job: Option<String>,
        /// Skip chunks already committed under --job
        #[arg(long, requires = "job")]
        resume: bool,
    },

    /// Load a tabular policy dataset into the knowledge graph
    IngestRecords {
        #[arg(long)]
        csv: PathBuf,
        /// Dataset name, used in policy node keys
        #[arg(long)]
        dataset: String,
        #[arg(long)]
        batch: Option<usize>,
        #[arg(long)]
        job: Option<String>,
        #[arg(long, requires = "job")]
        resume: bool,
    },

    /// Answer a free-form question from retrieved evidence
    Query {
        #[arg(long)]
        q: String,
        #[arg(long)]
        kvec: Option<usize>,
        #[arg(long)]
        kgraph: Option<usize>,
        /// Return the evidence pack without calling the language model
        #[arg(long)]
        evidence_only: bool,
    },

    /// Recommend a tier for a profile and explain it
    Recommend {
        /// Profile JSON file, or `-` for stdin
        #[arg(long)]
        profile: String,
    },

    /// Premium estimate and per-tier quote for a profile
    Quote {
        /// Profile JSON file, or `-` for stdin
        #[arg(long)]
        profile: String,
    },
}
