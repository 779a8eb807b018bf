//! Pogo
//!
//! Moves the artifacts of a HonSSH honeypot into a search index in three
//! idempotent phases, run periodically for every artifact kind:
//!
//! - **Scrape**: parse finished artifact files into a local SQLite staging
//!   store and mark each file done (`pogo scrape`)
//! - **Forward**: send staged rows to the index and record the document id
//!   each one received (`pogo forward`)
//! - **Prune**: delete done files and forwarded rows (`pogo prune`)
//!
//! `pogo run` performs all three, which is what a scheduled job normally
//! calls. `pogo status` shows the backlog of each phase.

#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod archive;
pub mod commands;
pub mod config;
pub mod error;
pub mod files;
pub mod geo;
pub mod index;
pub mod kind;
pub mod pipeline;
pub mod record;
pub mod store;

// Re-export commonly used types
pub use config::Settings;
pub use error::{Error, Result};
pub use kind::ArtifactKind;
pub use pipeline::Pipeline;
pub use record::Record;
pub use store::LocalDb;

use clap::{Parser, Subcommand};
use std::path::PathBuf;

/// Pogo - HonSSH artifact forwarder
#[derive(Parser, Debug)]
#[command(name = "pogo")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute (defaults to `run`)
    #[command(subcommand)]
    pub command: Option<Commands>,

    /// Configuration file read after the standard search path
    #[arg(short, long, global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Debug output
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Scrape, forward and prune every artifact kind
    Run,

    /// Stage pending artifact files in the local store
    Scrape {
        /// Only this kind (attempt, log, session-log, session-recording, session-download)
        #[arg(short, long)]
        kind: Option<ArtifactKind>,
    },

    /// Send staged rows to the search index
    Forward {
        /// Only this kind
        #[arg(short, long)]
        kind: Option<ArtifactKind>,
    },

    /// Delete done files and forwarded rows
    Prune {
        /// Only this kind
        #[arg(short, long)]
        kind: Option<ArtifactKind>,
    },

    /// Show pending and done files and staged rows per kind
    Status,

    /// Print the effective configuration
    ShowConfig,
}
