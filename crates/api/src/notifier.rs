//! Notification capability.

use std::sync::Arc;

use anyhow::{bail, Result};
use async_trait::async_trait;
use parking_lot::Mutex;

/// Delivers one human-readable message.
///
/// `send` completing successfully means the channel accepted the message;
/// callers await it before treating the message as delivered.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, text: &str) -> Result<()>;
}

#[async_trait]
impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    async fn send(&self, text: &str) -> Result<()> {
        (**self).send(text).await
    }
}

/// Keeps every message in memory. Optionally refuses sends.
#[derive(Debug, Default)]
pub struct RecordingNotifier {
    messages: Mutex<Vec<String>>,
    failing: Mutex<bool>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock() = failing;
    }

    pub fn messages(&self) -> Vec<String> {
        self.messages.lock().clone()
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, text: &str) -> Result<()> {
        if *self.failing.lock() {
            bail!("notification channel unavailable");
        }
        self.messages.lock().push(text.to_string());
        Ok(())
    }
}
