//! Notifications fired when a visitor collects an item.
//!
//! Delivery is best effort: the caller spawns the notification and only
//! logs a failure. The mail transport itself is an external collaborator;
//! [`LogNotifier`] resolves the recipient and message from config and
//! settings and records the delivery in the log.

use anyhow::{bail, Result};
use async_trait::async_trait;
use tracing::info;

use crate::config::Config;
use crate::models::Web;
use crate::settings::Settings;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify_collected(&self, config: &Config, settings: &Settings, item: &Web)
        -> Result<()>;
}

/// A notification ready for a mail transport.
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub from: String,
    pub to: String,
    pub subject: String,
    pub html: String,
}

/// Builds the notification for a collected item. Settings' contact address
/// wins over the config address.
pub fn build_notification(config: &Config, settings: &Settings) -> Result<Notification> {
    let Some(mail) = &config.mail_config else {
        bail!("mail is not configured");
    };
    let to = if settings.email.is_empty() {
        config.email.clone()
    } else {
        settings.email.clone()
    };
    if to.is_empty() {
        bail!("no notification recipient configured");
    }
    Ok(Notification {
        from: mail.auth.user.clone(),
        to,
        subject: mail.title.clone(),
        html: mail.message.clone(),
    })
}

pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify_collected(
        &self,
        config: &Config,
        settings: &Settings,
        item: &Web,
    ) -> Result<()> {
        let note = build_notification(config, settings)?;
        info!(
            to = %note.to,
            from = %note.from,
            subject = %note.subject,
            url = %item.url,
            "collected item notification"
        );
        Ok(())
    }
}
