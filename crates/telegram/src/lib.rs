use async_trait::async_trait;
use teloxide::prelude::*;
use tracing::{debug, warn};

use common::{BlogSettings, Notifier};

/// Posts run reports to a Telegram chat.
///
/// Delivery is best effort: a failed send is logged and never reaches the
/// caller. With blogging disabled every message only goes to the debug log.
pub struct Blogger {
    target: Option<(Bot, ChatId)>,
}

impl Blogger {
    pub fn new(settings: &BlogSettings) -> Self {
        let target = settings
            .enabled
            .then(|| (Bot::new(&settings.telegram_token), ChatId(settings.chat_id)));
        Self { target }
    }

    #[cfg(test)]
    fn disabled() -> Self {
        Self { target: None }
    }

    pub fn is_enabled(&self) -> bool {
        self.target.is_some()
    }
}

#[async_trait]
impl Notifier for Blogger {
    async fn notify(&self, message: &str) {
        let Some((bot, chat_id)) = &self.target else {
            debug!(message, "Blog disabled, message not sent");
            return;
        };
        if let Err(e) = bot.send_message(*chat_id, message).await {
            warn!(chat_id = ?chat_id, error = %e, "Failed to send Telegram message");
        }
    }
}
