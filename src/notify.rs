use std::time::Duration;

use log::{debug, warn};
use serde_json::json;

use crate::settings::TelegramSettings;

const SEND_TIMEOUT: Duration = Duration::from_secs(2);

/// Best-effort Telegram notifications for session lifecycle events.
///
/// Delivery is fire-and-forget: failures are logged and never surface to the
/// loops. With no bot token configured the notifier is a no-op.
#[derive(Clone)]
pub struct Notifier {
    client: reqwest::Client,
    telegram: Option<TelegramSettings>,
}

impl Notifier {
    pub fn new(telegram: Option<TelegramSettings>) -> Self {
        if telegram.is_none() {
            debug!("telegram not configured, notifications disabled");
        }
        let client = reqwest::Client::builder()
            .timeout(SEND_TIMEOUT)
            .build()
            .expect("reqwest client with static config");
        Self { client, telegram }
    }

    /// Queue a notification without waiting for delivery.
    pub fn send_background(&self, text: &str) {
        let notifier = self.clone();
        let text = text.to_string();
        tokio::spawn(async move {
            notifier.send(&text).await;
        });
    }

    /// Deliver a notification, waiting up to the request timeout. Used on
    /// shutdown where a spawned task would not get to run.
    pub async fn send(&self, text: &str) {
        let Some(telegram) = &self.telegram else {
            return;
        };
        let url = format!(
            "https://api.telegram.org/bot{}/sendMessage",
            telegram.bot_token
        );
        let body = json!({ "chat_id": telegram.chat_id, "text": text });
        match self.client.post(&url).json(&body).send().await {
            Ok(response) if response.status().is_success() => {}
            Ok(response) => warn!("telegram send failed: http {}", response.status()),
            Err(err) => warn!("telegram send error: {err}"),
        }
    }
}
