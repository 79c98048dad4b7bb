//! Argo CD API client

use async_trait::async_trait;
use reqwest::{header, Method};
use tracing::info;
use upstream_models::models::{Application, ApplicationStatus, SyncRequest};

use crate::errors::BotError;
use crate::http::client::HttpClient;

/// Deployment controller operations used by the sync step
#[async_trait]
pub trait ArgoExt: Send + Sync {
    /// Hand a raw GitHub push payload to Argo's webhook ingestion endpoint
    async fn forward_push(&self, payload: &[u8]) -> Result<(), BotError>;

    /// Request a sync of `app`
    async fn sync_application(&self, app: &str) -> Result<(), BotError>;

    /// Current status of `app`
    async fn application_status(&self, app: &str) -> Result<ApplicationStatus, BotError>;
}

/// Argo CD REST client
pub struct ArgoClient {
    http: HttpClient,
}

impl ArgoClient {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ArgoExt for ArgoClient {
    async fn forward_push(&self, payload: &[u8]) -> Result<(), BotError> {
        let request = self
            .http
            .request(Method::POST, "/api/webhook")
            .header("X-Github-Event", "push")
            .header(header::CONTENT_TYPE, "application/json")
            .body(payload.to_vec());
        let response = self.http.send(request).await?;
        info!("Push forwarded to argo: {}", response.status());
        Ok(())
    }

    async fn sync_application(&self, app: &str) -> Result<(), BotError> {
        let path = format!("/api/v1/applications/{}/sync", app);
        let _: serde_json::Value = self.http.post(&path, &SyncRequest::default()).await?;
        info!("Sync requested for {}", app);
        Ok(())
    }

    async fn application_status(&self, app: &str) -> Result<ApplicationStatus, BotError> {
        let path = format!("/api/v1/applications/{}", app);
        let application: Application = self.http.get(&path).await?;
        Ok(application.status)
    }
}
