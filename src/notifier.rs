//! Outbound notification seam
//!
//! The detection core only knows how to hand a subject, a body and a recipient
//! list to a [`Notifier`]. Recipients are opaque; an empty list is the
//! notifier's problem, not the caller's.

use anyhow::Result;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

#[async_trait]
pub trait Notifier: Send + Sync {
    /// Deliver one notification
    ///
    /// Returns `Err` with the reason when delivery failed, including when there
    /// are no recipients to deliver to.
    async fn send(&self, subject: &str, body: &str, recipients: &[String]) -> Result<()>;
}

#[async_trait]
impl<T: Notifier + ?Sized> Notifier for Arc<T> {
    async fn send(&self, subject: &str, body: &str, recipients: &[String]) -> Result<()> {
        (**self).send(subject, body, recipients).await
    }
}

/// Stand-in when no delivery channel could be configured; every send fails
#[derive(Debug, Clone)]
pub struct DisabledNotifier {
    reason: String,
}

impl DisabledNotifier {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Notifier for DisabledNotifier {
    async fn send(&self, subject: &str, _body: &str, _recipients: &[String]) -> Result<()> {
        anyhow::bail!("notifications disabled ({}); dropped '{}'", self.reason, subject)
    }
}

/// Alert recipient addresses, replaceable at runtime
#[derive(Debug, Clone, Default)]
pub struct Recipients {
    addresses: Arc<RwLock<Vec<String>>>,
}

impl Recipients {
    pub fn new(addresses: Vec<String>) -> Self {
        Self {
            addresses: Arc::new(RwLock::new(normalize(addresses))),
        }
    }

    pub async fn get(&self) -> Vec<String> {
        self.addresses.read().await.clone()
    }

    /// Replace the whole list; blank entries and duplicates are dropped
    pub async fn replace(&self, addresses: Vec<String>) -> Vec<String> {
        let normalized = normalize(addresses);
        *self.addresses.write().await = normalized.clone();
        normalized
    }
}

fn normalize(addresses: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(addresses.len());
    for address in addresses {
        let address = address.trim().to_string();
        if !address.is_empty() && !out.contains(&address) {
            out.push(address);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recipients_normalized() {
        let recipients = Recipients::new(vec![
            " ops@example.com ".to_string(),
            "".to_string(),
            "ops@example.com".to_string(),
            "watch@uscg.example".to_string(),
        ]);
        assert_eq!(
            recipients.get().await,
            vec!["ops@example.com".to_string(), "watch@uscg.example".to_string()]
        );
    }

    #[tokio::test]
    async fn test_disabled_notifier_always_fails() {
        let notifier = DisabledNotifier::new("SMTP_SERVER not set");
        let err = notifier
            .send("Route Deviation - 366998410", "<p>x</p>", &["ops@example.com".to_string()])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("SMTP_SERVER not set"));
    }

    #[tokio::test]
    async fn test_replace_is_visible_to_clones() {
        let recipients = Recipients::default();
        let shared = recipients.clone();
        assert!(shared.get().await.is_empty());
        recipients.replace(vec!["ops@example.com".to_string()]).await;
        assert_eq!(shared.get().await, vec!["ops@example.com".to_string()]);
    }
}
