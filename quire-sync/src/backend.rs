//! HTTP clients for the backend API and the direct data-store fallback.
//!
//! Backend API (bearer token):
//! - `POST {api}/documents/{id}/update`          `{content, title}` → `{success, document?}`
//! - `POST {api}/documents/{id}/create-revision` `{change_summary}` → checkpoint
//! - `GET  {api}/documents/{id}/revisions`       → `[checkpoint]` or `{revisions: [...]}`
//!
//! Data store (REST rows, `apikey` + bearer token):
//! - `PATCH {store}/rest/v1/document_content?document_id=eq.{id}`
//!   `{content, last_edited_by, updated_at}`
//! - `PATCH {store}/rest/v1/documents?id=eq.{id}` `{title, updated_at}`

use std::sync::Arc;

use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::config::SyncConfig;
use crate::persist::{PersistenceChain, PersistenceStrategy, StrategyError};
use crate::revision::{RevisionCheckpoint, RevisionError, RevisionService};
use crate::snapshot::Snapshot;

#[derive(Debug, Serialize)]
struct UpdateRequest<'a> {
    content: &'a Value,
    title: &'a str,
}

#[derive(Debug, Deserialize)]
pub struct UpdateResponse {
    pub success: bool,
    #[serde(default)]
    pub document: Option<Value>,
    #[serde(default)]
    pub error: Option<String>,
}

#[derive(Debug, Serialize)]
struct CreateRevisionRequest<'a> {
    change_summary: &'a str,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum RevisionListing {
    Bare(Vec<RevisionCheckpoint>),
    Wrapped { revisions: Vec<RevisionCheckpoint> },
}

/// Turn a non-2xx response into [`StrategyError::Status`].
async fn check_status(response: Response) -> Result<Response, StrategyError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(StrategyError::Status {
        status: status.as_u16(),
        body,
    })
}

fn http_client(config: &SyncConfig) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(config.request_timeout).build()
}

/// Client for the backend document API.
pub struct BackendClient {
    client: Client,
    base_url: String,
    token: String,
}

impl BackendClient {
    pub fn new(config: &SyncConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: http_client(config)?,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            token: config.access_token.clone(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn document_url(&self, document_id: Uuid, action: &str) -> String {
        format!("{}/documents/{}/{}", self.base_url, document_id, action)
    }

    pub async fn update_document(
        &self,
        snapshot: &Snapshot,
    ) -> Result<UpdateResponse, StrategyError> {
        let response = self
            .client
            .post(self.document_url(snapshot.document_id, "update"))
            .bearer_auth(&self.token)
            .json(&UpdateRequest {
                content: &snapshot.content,
                title: &snapshot.title,
            })
            .send()
            .await?;

        let body: UpdateResponse = check_status(response).await?.json().await?;
        if !body.success {
            return Err(StrategyError::Rejected(
                body.error
                    .unwrap_or_else(|| "update reported success=false".to_string()),
            ));
        }
        Ok(body)
    }
}

#[async_trait]
impl RevisionService for BackendClient {
    async fn create_revision(
        &self,
        document_id: Uuid,
        change_summary: &str,
    ) -> Result<RevisionCheckpoint, RevisionError> {
        let response = self
            .client
            .post(self.document_url(document_id, "create-revision"))
            .bearer_auth(&self.token)
            .json(&CreateRevisionRequest { change_summary })
            .send()
            .await?;
        Ok(check_status(response).await?.json().await?)
    }

    async fn list_revisions(
        &self,
        document_id: Uuid,
    ) -> Result<Vec<RevisionCheckpoint>, RevisionError> {
        let response = self
            .client
            .get(self.document_url(document_id, "revisions"))
            .bearer_auth(&self.token)
            .send()
            .await?;
        let listing: RevisionListing = check_status(response).await?.json().await?;
        Ok(match listing {
            RevisionListing::Bare(list) | RevisionListing::Wrapped { revisions: list } => list,
        })
    }
}

/// Primary path: the backend update endpoint.
pub struct ApiStrategy {
    client: Arc<BackendClient>,
}

impl ApiStrategy {
    pub fn new(client: Arc<BackendClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl PersistenceStrategy for ApiStrategy {
    fn name(&self) -> &'static str {
        "api"
    }

    async fn persist(&self, snapshot: &Snapshot) -> Result<(), StrategyError> {
        self.client.update_document(snapshot).await.map(|_| ())
    }
}

#[derive(Debug, Serialize)]
struct ContentRow<'a> {
    content: &'a Value,
    last_edited_by: Uuid,
    updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
struct MetadataRow<'a> {
    title: &'a str,
    updated_at: chrono::DateTime<chrono::Utc>,
}

/// Fallback path: write rows straight into the data store.
///
/// The content row decides the outcome; a failed metadata write is only
/// logged.
pub struct DirectStoreStrategy {
    client: Client,
    base_url: String,
    api_key: String,
    token: String,
}

impl DirectStoreStrategy {
    pub fn new(config: &SyncConfig) -> Result<Self, reqwest::Error> {
        Ok(Self {
            client: http_client(config)?,
            base_url: config.store_url.trim_end_matches('/').to_string(),
            api_key: config.store_key.clone(),
            token: config.access_token.clone(),
        })
    }

    async fn patch_row<T: Serialize + ?Sized>(
        &self,
        table: &str,
        filter: &str,
        row: &T,
    ) -> Result<(), StrategyError> {
        let response = self
            .client
            .patch(format!("{}/rest/v1/{}?{}", self.base_url, table, filter))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.token)
            .header("Prefer", "return=minimal")
            .json(row)
            .send()
            .await?;
        check_status(response).await.map(|_| ())
    }
}

#[async_trait]
impl PersistenceStrategy for DirectStoreStrategy {
    fn name(&self) -> &'static str {
        "direct-store"
    }

    async fn persist(&self, snapshot: &Snapshot) -> Result<(), StrategyError> {
        let now = chrono::Utc::now();
        let id = snapshot.document_id;

        self.patch_row(
            "document_content",
            &format!("document_id=eq.{id}"),
            &ContentRow {
                content: &snapshot.content,
                last_edited_by: snapshot.edited_by,
                updated_at: now,
            },
        )
        .await?;

        if let Err(e) = self
            .patch_row(
                "documents",
                &format!("id=eq.{id}"),
                &MetadataRow {
                    title: &snapshot.title,
                    updated_at: now,
                },
            )
            .await
        {
            log::warn!("Content for {id} stored but metadata update failed: {e}");
        }
        Ok(())
    }
}

/// The standard two-step chain: backend API, then direct store write.
pub fn default_chain(
    config: &SyncConfig,
    client: Arc<BackendClient>,
) -> Result<PersistenceChain, reqwest::Error> {
    Ok(PersistenceChain::new()
        .then(Arc::new(ApiStrategy::new(client)))
        .then(Arc::new(DirectStoreStrategy::new(config)?)))
}
