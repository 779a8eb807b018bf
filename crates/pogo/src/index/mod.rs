//! Search index access
//!
//! The pipeline only sees the [`DocumentIndex`] and [`IndexConnector`]
//! traits, so tests can count inserts without a server.

pub mod client;
pub mod mapping;

pub use client::{ElasticConnector, ElasticIndex};

use crate::error::Result;
use crate::kind::ArtifactKind;
use crate::record::Record;
use async_trait::async_trait;

/// An index ready to accept documents of one kind
#[async_trait]
pub trait DocumentIndex: Send + Sync {
    /// Store one record and return the id the index assigned to it
    async fn insert(&self, record: &Record) -> Result<String>;
}

/// Opens the index of a kind, creating it when absent
#[async_trait]
pub trait IndexConnector: Send + Sync {
    async fn connect(&self, kind: ArtifactKind) -> Result<Box<dyn DocumentIndex>>;
}
