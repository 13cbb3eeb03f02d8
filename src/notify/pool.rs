// src/notify/pool.rs
//! Bounded worker pool for push delivery.
//!
//! Deliveries run detached from the update loop: `submit` never blocks and
//! never fails the caller, a slow or failing push only occupies one of the
//! pool's workers. The pool is owned by whoever built it and is shut down
//! explicitly — close the queue, join the workers.

use std::sync::Arc;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use super::{PushMessage, PushTransport};

/// Cloneable submit side of the pool. Cheap to pass around.
#[derive(Clone)]
pub struct PushHandle {
    tx: mpsc::Sender<PushMessage>,
}

impl PushHandle {
    /// Queue a push without waiting. A full queue drops the message with a
    /// warning; delivery here is best-effort by contract.
    pub fn submit(&self, msg: PushMessage) {
        if let Err(e) = self.tx.try_send(msg) {
            warn!(error = %e, "push queue full or closed, dropping notification");
        }
    }
}

pub struct PushPool {
    handle: PushHandle,
    workers: Vec<JoinHandle<()>>,
}

impl PushPool {
    pub fn new(transport: Arc<dyn PushTransport>, worker_count: usize, queue_depth: usize) -> Self {
        let (tx, rx) = mpsc::channel(queue_depth.max(1));
        let rx = Arc::new(Mutex::new(rx));

        let workers = (0..worker_count.max(1))
            .map(|worker| {
                let rx = Arc::clone(&rx);
                let transport = Arc::clone(&transport);
                tokio::spawn(async move {
                    loop {
                        // Hold the lock only while waiting for the next job.
                        let msg = { rx.lock().await.recv().await };
                        let Some(msg) = msg else { break };
                        if let Err(e) = transport.send(&msg).await {
                            warn!(worker, token = %mask_token(&msg.token), error = %e, "push delivery failed");
                        } else {
                            debug!(worker, token = %mask_token(&msg.token), "push delivered");
                        }
                    }
                })
            })
            .collect();

        Self {
            handle: PushHandle { tx },
            workers,
        }
    }

    pub fn handle(&self) -> PushHandle {
        self.handle.clone()
    }

    /// Close the queue and wait for in-flight deliveries to finish.
    pub async fn shutdown(self) {
        drop(self.handle);
        for worker in self.workers {
            let _ = worker.await;
        }
    }
}

// Tokens are credentials; never log them whole.
fn mask_token(token: &str) -> String {
    if token.chars().count() <= 8 {
        "***".to_string()
    } else {
        let prefix: String = token.chars().take(8).collect();
        format!("{prefix}…")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use async_trait::async_trait;
    use std::sync::Mutex as StdMutex;

    #[derive(Default)]
    struct Recording {
        sent: StdMutex<Vec<PushMessage>>,
    }

    #[async_trait]
    impl PushTransport for Recording {
        async fn send(&self, msg: &PushMessage) -> Result<()> {
            self.sent.lock().unwrap().push(msg.clone());
            Ok(())
        }
    }

    fn msg(token: &str) -> PushMessage {
        PushMessage {
            token: token.to_string(),
            title: "Price Dropped!".to_string(),
            body: "test".to_string(),
        }
    }

    #[tokio::test]
    async fn shutdown_drains_queued_messages() {
        let transport = Arc::new(Recording::default());
        let pool = PushPool::new(transport.clone(), 3, 16);
        let handle = pool.handle();

        for i in 0..10 {
            handle.submit(msg(&format!("token-{i:02}-abcdef")));
        }
        drop(handle);
        pool.shutdown().await;

        assert_eq!(transport.sent.lock().unwrap().len(), 10);
    }

    #[tokio::test]
    async fn submit_never_blocks_on_failing_transport() {
        struct Failing;

        #[async_trait]
        impl PushTransport for Failing {
            async fn send(&self, _msg: &PushMessage) -> Result<()> {
                anyhow::bail!("transport down")
            }
        }

        let pool = PushPool::new(Arc::new(Failing), 2, 4);
        let handle = pool.handle();
        handle.submit(msg("token-a-0123456789"));
        handle.submit(msg("token-b-0123456789"));
        drop(handle);
        // Failures are logged and dropped; shutdown still completes.
        pool.shutdown().await;
    }

    #[test]
    fn token_masking_keeps_prefix_only() {
        assert_eq!(mask_token("short"), "***");
        assert_eq!(mask_token("abcdefgh-rest-of-token"), "abcdefgh…");
    }
}
