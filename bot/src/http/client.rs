//! HTTP client implementation

use std::time::Duration;

use reqwest::{header, Client, Method, RequestBuilder, Response};
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, error};

use crate::errors::BotError;
use crate::utils::truncate;

/// Bearer-authenticated JSON client for one upstream service
pub struct HttpClient {
    client: Client,
    service: &'static str,
    base_url: String,
    token: Option<SecretString>,
    accept: Option<&'static str>,
}

impl HttpClient {
    /// Create a new HTTP client
    pub fn new(
        service: &'static str,
        base_url: &str,
        token: Option<SecretString>,
    ) -> Result<Self, BotError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("deploybot/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            service,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            accept: None,
        })
    }

    /// Send `accept` as the Accept header on every request
    pub fn with_accept(mut self, accept: &'static str) -> Self {
        self.accept = Some(accept);
        self
    }

    /// Name used in logs and error summaries
    pub fn service(&self) -> &'static str {
        self.service
    }

    /// Start a request against `path`, with auth applied
    pub fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {} {}", self.service, method, url);

        let mut request = self.client.request(method, &url);
        if let Some(accept) = self.accept {
            request = request.header(header::ACCEPT, accept);
        }
        match &self.token {
            Some(token) => request.header(
                header::AUTHORIZATION,
                format!("Bearer {}", token.expose_secret()),
            ),
            None => request,
        }
    }

    /// Send a request, turning non-success statuses into `BotError::Upstream`
    pub async fn send(&self, request: RequestBuilder) -> Result<Response, BotError> {
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            error!(
                "{} request failed: {} - {}",
                self.service,
                status,
                truncate(&body, 500)
            );
            return Err(BotError::Upstream {
                service: self.service,
                status: status.as_u16(),
                body,
            });
        }

        Ok(response)
    }

    /// Make a GET request
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, BotError> {
        let response = self.send(self.request(Method::GET, path)).await?;
        Ok(response.json().await?)
    }

    /// Make a GET request with query parameters
    pub async fn get_with_query<T: DeserializeOwned, Q: Serialize + ?Sized>(
        &self,
        path: &str,
        query: &Q,
    ) -> Result<T, BotError> {
        let response = self
            .send(self.request(Method::GET, path).query(query))
            .await?;
        Ok(response.json().await?)
    }

    /// Make a POST request with a JSON body
    pub async fn post<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, BotError> {
        let response = self
            .send(self.request(Method::POST, path).json(body))
            .await?;
        Ok(response.json().await?)
    }

    /// Make a PUT request with a JSON body
    pub async fn put<T: DeserializeOwned, B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, BotError> {
        let response = self
            .send(self.request(Method::PUT, path).json(body))
            .await?;
        Ok(response.json().await?)
    }
}
