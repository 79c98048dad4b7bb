//! Slack Web API client

use async_trait::async_trait;
use tracing::{debug, warn};
use upstream_models::models::{PostMessageRequest, PostMessageResponse};

use crate::errors::BotError;
use crate::http::client::HttpClient;
use crate::models::deployment::ConversationContext;

/// Outbound chat used for narration
#[async_trait]
pub trait ChatExt: Send + Sync {
    /// Post `text` as a threaded reply in `context`
    async fn post_reply(&self, context: &ConversationContext, text: &str) -> Result<(), BotError>;
}

/// Slack client posting through `chat.postMessage`
pub struct SlackClient {
    http: HttpClient,
}

impl SlackClient {
    pub fn new(http: HttpClient) -> Self {
        Self { http }
    }
}

#[async_trait]
impl ChatExt for SlackClient {
    async fn post_reply(&self, context: &ConversationContext, text: &str) -> Result<(), BotError> {
        let body = PostMessageRequest {
            channel: context.channel.clone(),
            text: text.to_string(),
            thread_ts: Some(context.thread_ts.clone()),
            unfurl_links: false,
        };
        let response: PostMessageResponse = self.http.post("/chat.postMessage", &body).await?;

        if !response.ok {
            let reason = response.error.unwrap_or_else(|| "unknown_error".to_string());
            warn!("Slack rejected message to {}: {}", context.channel, reason);
            return Err(BotError::Upstream {
                service: self.http.service(),
                status: 200,
                body: reason,
            });
        }

        debug!("Posted reply to {} ({})", context.channel, context.thread_ts);
        Ok(())
    }
}
