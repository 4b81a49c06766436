//! Mailbox verification code delivery boundary.
//!
//! The engine never sends email or push itself; the embedding application
//! plugs in whatever channel it has. Delivery is fire-and-forget from the
//! domain's point of view: the code is already stored on the child when
//! the notifier runs.

use anyhow::Result;
use async_trait::async_trait;
use log::info;

#[async_trait]
pub trait MailCodeNotifier: Send + Sync {
    async fn send_code(&self, parent_email: &str, child_name: &str, code: &str) -> Result<()>;
}

/// Notifier that only logs. The development default, and handy in demos
/// where the code has to be read off the console.
#[derive(Debug, Default)]
pub struct LogNotifier;

#[async_trait]
impl MailCodeNotifier for LogNotifier {
    async fn send_code(&self, parent_email: &str, child_name: &str, code: &str) -> Result<()> {
        info!(
            "📧 Mailbox verification code for {} (parent {}): {}",
            child_name, parent_email, code
        );
        Ok(())
    }
}
