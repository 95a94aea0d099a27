// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use async_trait::async_trait;
use thiserror::Error;

use hive_core::Notification;

/// Errors from notification delivery
#[derive(Debug, Error)]
pub enum NotifyError {
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Transport for surfacing a [`Notification`] to a human.
///
/// Implementations must not block indefinitely: the manager awaits each
/// delivery in turn and relies on transports enforcing their own timeouts.
#[async_trait]
pub trait Notifier: Send + Sync + 'static {
    /// Short transport name for logs ("desktop", "webhook", ...).
    fn name(&self) -> &str;

    /// Deliver a notification. Best effort; errors are aggregated by the
    /// manager, never fatal.
    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError>;
}

/// Desktop notification transport using notify-rust.
///
/// On macOS, `notify-rust` uses `mac-notification-sys` (Cocoa bindings) to
/// send notifications via the Notification Center. The first notification
/// triggers `ensure_application_set()` which runs an AppleScript to look up
/// a bundle identifier. In a daemon context without Automation permissions,
/// that AppleScript blocks forever. We pre-set the bundle identifier at
/// construction time to bypass the lookup entirely.
#[derive(Clone, Copy, Debug, Default)]
pub struct DesktopNotifier;

impl DesktopNotifier {
    pub fn new() -> Self {
        #[cfg(target_os = "macos")]
        {
            // Pre-set the application bundle identifier so mac-notification-sys
            // skips its NSAppleScript lookup (which blocks forever in daemon
            // processes that lack Automation permissions).
            let _ = mac_notification_sys::set_application("com.apple.Terminal");
        }
        Self
    }
}

#[async_trait]
impl Notifier for DesktopNotifier {
    fn name(&self) -> &str {
        "desktop"
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        let title = notification.title.clone();
        let message = notification.message.clone();
        // notify_rust::Notification::show() is synchronous on macOS.
        // Fire-and-forget on tokio's bounded blocking thread pool to avoid
        // blocking the async runtime while capping OS thread count.
        tokio::task::spawn_blocking(move || {
            match notify_rust::Notification::new().summary(&title).body(&message).show() {
                Ok(_) => {
                    tracing::debug!(%title, "desktop notification sent");
                }
                Err(e) => {
                    tracing::warn!(%title, error = %e, "desktop notification failed");
                }
            }
        });
        Ok(())
    }
}

/// Webhook transport posting the notification as JSON.
pub struct WebhookNotifier {
    url: String,
    client: reqwest::Client,
}

impl WebhookNotifier {
    pub fn new(url: impl Into<String>) -> Self {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self { url: url.into(), client }
    }
}

#[async_trait]
impl Notifier for WebhookNotifier {
    fn name(&self) -> &str {
        "webhook"
    }

    async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
        self.client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .and_then(|r| r.error_for_status())
            .map(|_| ())
            .map_err(|e| NotifyError::SendFailed(e.to_string()))
    }
}

#[cfg(any(test, feature = "test-support"))]
mod fake {
    use super::{NotifyError, Notifier};
    use async_trait::async_trait;
    use hive_core::Notification;
    use parking_lot::Mutex;
    use std::sync::Arc;

    /// Recording notifier for tests; optionally fails every delivery.
    #[derive(Clone, Default)]
    pub struct FakeNotifier {
        delivered: Arc<Mutex<Vec<Notification>>>,
        fail: bool,
    }

    impl FakeNotifier {
        pub fn new() -> Self {
            Self::default()
        }

        /// A notifier whose every delivery fails.
        pub fn failing() -> Self {
            Self { delivered: Arc::default(), fail: true }
        }

        /// All notifications delivered so far.
        pub fn delivered(&self) -> Vec<Notification> {
            self.delivered.lock().clone()
        }
    }

    #[async_trait]
    impl Notifier for FakeNotifier {
        fn name(&self) -> &str {
            "fake"
        }

        async fn deliver(&self, notification: &Notification) -> Result<(), NotifyError> {
            if self.fail {
                return Err(NotifyError::SendFailed("fake failure".into()));
            }
            self.delivered.lock().push(notification.clone());
            Ok(())
        }
    }
}

#[cfg(any(test, feature = "test-support"))]
pub use fake::FakeNotifier;

#[cfg(test)]
#[path = "notify_tests.rs"]
mod tests;
