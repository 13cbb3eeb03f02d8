// src/notify/fcm.rs
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use tracing::debug;

use super::{PushMessage, PushTransport};
use crate::config::PushConfig;

/// Firebase Cloud Messaging transport. One attempt per message, no retry:
/// price persistence already succeeded by the time a push is queued, and a
/// bad token stays bad.
pub struct FcmTransport {
    endpoint: String,
    server_key: Option<String>,
    client: Client,
}

impl FcmTransport {
    pub fn new(cfg: &PushConfig) -> Result<Self> {
        let client = Client::builder()
            .user_agent("dealwatch/0.1 (+github.com/dealwatch/dealwatch)")
            .connect_timeout(Duration::from_secs(4))
            .timeout(Duration::from_secs(10))
            .build()
            .context("build fcm client")?;
        let server_key = Some(cfg.server_key.trim().to_string()).filter(|k| !k.is_empty());
        Ok(Self {
            endpoint: cfg.fcm_endpoint.clone(),
            server_key,
            client,
        })
    }
}

#[derive(Serialize)]
struct FcmPayload<'a> {
    to: &'a str,
    notification: FcmNotification<'a>,
}

#[derive(Serialize)]
struct FcmNotification<'a> {
    title: &'a str,
    body: &'a str,
}

#[async_trait]
impl PushTransport for FcmTransport {
    async fn send(&self, msg: &PushMessage) -> Result<()> {
        let Some(key) = &self.server_key else {
            debug!("FCM disabled (no FCM_SERVER_KEY)");
            return Ok(());
        };

        let payload = FcmPayload {
            to: &msg.token,
            notification: FcmNotification {
                title: &msg.title,
                body: &msg.body,
            },
        };

        self.client
            .post(&self.endpoint)
            .header("Authorization", format!("key={key}"))
            .json(&payload)
            .send()
            .await
            .context("fcm post")?
            .error_for_status()
            .context("fcm non-2xx")?;
        Ok(())
    }
}
