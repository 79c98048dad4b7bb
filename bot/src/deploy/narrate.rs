//! Progress messages for a deployment's conversation

use tracing::{info, warn};

use crate::http::slack::ChatExt;
use crate::models::deployment::ConversationContext;

/// Posts progress into one conversation, or only logs it when there is none
pub struct Narrator<'a> {
    chat: &'a dyn ChatExt,
    context: Option<&'a ConversationContext>,
    application: &'a str,
}

impl<'a> Narrator<'a> {
    pub fn new(
        chat: &'a dyn ChatExt,
        context: Option<&'a ConversationContext>,
        application: &'a str,
    ) -> Self {
        Self {
            chat,
            context,
            application,
        }
    }

    /// Post `text`. A failed post is logged and otherwise ignored so the
    /// deployment carries on.
    pub async fn say(&self, text: &str) {
        let Some(context) = self.context else {
            info!(app = %self.application, "{}", text);
            return;
        };
        if let Err(e) = self.chat.post_reply(context, text).await {
            warn!(
                app = %self.application,
                channel = %context.channel,
                "Failed to post progress message: {}", e
            );
        }
    }
}
