use axum::async_trait;
use tracing::info;

/// Outbound mail delivery abstraction.
///
/// The auth flows only ever need fire-and-forget plain-text messages; how
/// they get delivered (SMTP, provider API) is the implementor's concern.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Local-dev sender that logs the message instead of delivering it.
#[derive(Clone, Debug, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        info!(to = %to, subject = %subject, body = %body, "mail send stub");
        Ok(())
    }
}
