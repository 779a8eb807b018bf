//! REST client for an Elasticsearch-compatible index

use crate::config::IndexSettings;
use crate::error::{Error, Result};
use crate::index::{mapping, DocumentIndex, IndexConnector};
use crate::kind::ArtifactKind;
use crate::record::Record;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, info};

/// One index on the server, holding the documents of one kind
#[derive(Debug)]
pub struct ElasticIndex {
    client: Client,
    base_url: String,
    index: String,
    kind: ArtifactKind,
}

impl ElasticIndex {
    /// Connect and make sure the index and its mapping exist
    pub async fn connect(settings: &IndexSettings, kind: ArtifactKind) -> Result<Self> {
        let client = Client::builder().timeout(settings.timeout()).build()?;

        let index = Self {
            client,
            base_url: settings.base_url(),
            index: settings.index_name(kind),
            kind,
        };
        index.ensure_index().await?;
        Ok(index)
    }

    pub fn name(&self) -> &str {
        &self.index
    }

    fn index_url(&self) -> String {
        format!("{}/{}", self.base_url, self.index)
    }

    async fn ensure_index(&self) -> Result<()> {
        let url = self.index_url();
        let status = self.client.head(&url).send().await?.status();

        if status == StatusCode::NOT_FOUND {
            self.client
                .put(&url)
                .json(&json!({ "mappings": { "properties": mapping::properties(self.kind) } }))
                .send()
                .await?
                .error_for_status()?;
            info!(index = %self.index, "Created index");
            return Ok(());
        }
        if !status.is_success() {
            return Err(Error::index(format!(
                "checking index '{}' returned {}",
                self.index, status
            )));
        }

        let current: Value = self
            .client
            .get(format!("{}/_mapping", url))
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if has_properties(&current) {
            debug!(index = %self.index, "Index mapping present");
            return Ok(());
        }

        self.client
            .put(format!("{}/_mapping", url))
            .json(&json!({ "properties": mapping::properties(self.kind) }))
            .send()
            .await?
            .error_for_status()?;
        info!(index = %self.index, "Added mapping to existing index");
        Ok(())
    }
}

/// Whether a `_mapping` response defines any field
///
/// The response is keyed by the concrete index name, which differs from the
/// requested name when an alias is used.
fn has_properties(response: &Value) -> bool {
    response
        .as_object()
        .map(|indices| {
            indices.values().any(|index| {
                index
                    .pointer("/mappings/properties")
                    .and_then(Value::as_object)
                    .map(|props| !props.is_empty())
                    .unwrap_or(false)
            })
        })
        .unwrap_or(false)
}

#[async_trait]
impl DocumentIndex for ElasticIndex {
    async fn insert(&self, record: &Record) -> Result<String> {
        if record.kind() != self.kind {
            return Err(Error::inconsistent(format!(
                "{} record offered to index '{}'",
                record.kind(),
                self.index
            )));
        }

        let response = self
            .client
            .post(format!("{}/_doc", self.index_url()))
            .json(&record.to_document())
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::index(format!(
                "index '{}' rejected document ({}): {}",
                self.index, status, body
            )));
        }

        let body: Value = response.json().await?;
        body.get("_id")
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .ok_or_else(|| {
                Error::index(format!("index '{}' returned no document id", self.index))
            })
    }
}

/// Opens [`ElasticIndex`] connections from the configured settings
#[derive(Debug, Clone)]
pub struct ElasticConnector {
    settings: IndexSettings,
}

impl ElasticConnector {
    pub fn new(settings: IndexSettings) -> Self {
        Self { settings }
    }
}

#[async_trait]
impl IndexConnector for ElasticConnector {
    async fn connect(&self, kind: ArtifactKind) -> Result<Box<dyn DocumentIndex>> {
        Ok(Box::new(ElasticIndex::connect(&self.settings, kind).await?))
    }
}
