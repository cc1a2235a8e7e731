//! Mock notifier for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::notify::{NotifyError, Notifier};

/// Records every notification as `(title, body)`.
#[derive(Debug, Default)]
pub struct MockNotifier {
    sent: Arc<RwLock<Vec<(String, String)>>>,
}

impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<(String, String)> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl Notifier for MockNotifier {
    async fn notify(&self, title: &str, body: &str) -> Result<(), NotifyError> {
        self.sent
            .write()
            .await
            .push((title.to_string(), body.to_string()));
        Ok(())
    }
}
