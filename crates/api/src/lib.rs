//! Outbound notification clients for the BOLD monitor.
//!
//! This crate provides:
//! - The [`Notifier`] capability
//! - A Slack incoming-webhook client
//! - An in-memory recorder for tests

mod notifier;
mod slack;

pub use notifier::{Notifier, RecordingNotifier};
pub use slack::SlackNotifier;
