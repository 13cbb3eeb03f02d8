pub mod fanout;
pub mod fcm;
pub mod pool;

use anyhow::Result;
use async_trait::async_trait;

/// One push to one device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PushMessage {
    pub token: String,
    pub title: String,
    pub body: String,
}

/// Push transport collaborator. One attempt per message; retry policy, if
/// any, belongs to the transport's backend, not to callers.
#[async_trait]
pub trait PushTransport: Send + Sync {
    async fn send(&self, msg: &PushMessage) -> Result<()>;
}

pub use fanout::PriceDropNotifier;
pub use fcm::FcmTransport;
pub use pool::{PushHandle, PushPool};
