//! Container registry client

use async_trait::async_trait;
use upstream_models::models::TagList;

use crate::errors::BotError;
use crate::http::client::HttpClient;

/// Image listing used by the artifact resolver
#[async_trait]
pub trait RegistryExt: Send + Sync {
    /// Tags published in the image repository named `repository`
    async fn list_tags(&self, repository: &str) -> Result<Vec<String>, BotError>;
}

/// OCI distribution API client
pub struct RegistryClient {
    http: HttpClient,
}

impl RegistryClient {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl RegistryExt for RegistryClient {
    async fn list_tags(&self, repository: &str) -> Result<Vec<String>, BotError> {
        let path = format!("/v2/{}/tags/list", repository);
        let list: TagList = self.http.get(&path).await?;
        Ok(list.tags.unwrap_or_default())
    }
}
