use axum::async_trait;
use tracing::info;

/// Outbound notification boundary. Real delivery lives outside this service;
/// the forgot-password flow only needs a typed success/failure outcome.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()>;
}

/// Development mailer: logs the message instead of delivering it.
#[derive(Clone)]
pub struct DevMailer;

#[async_trait]
impl Mailer for DevMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> anyhow::Result<()> {
        info!(to = %to, subject = %subject, body_len = body.len(), "dev mailer: email logged, not sent");
        Ok(())
    }
}

/// Test double that always fails, for exercising the rollback path.
#[cfg(test)]
#[derive(Clone)]
pub struct FailingMailer;

#[cfg(test)]
#[async_trait]
impl Mailer for FailingMailer {
    async fn send(&self, _to: &str, _subject: &str, _body: &str) -> anyhow::Result<()> {
        anyhow::bail!("smtp unreachable")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn dev_mailer_always_succeeds() {
        DevMailer
            .send("a@x.com", "subject", "body")
            .await
            .expect("dev mailer should not fail");
    }

    #[tokio::test]
    async fn failing_mailer_surfaces_a_typed_error() {
        let err = FailingMailer
            .send("a@x.com", "subject", "body")
            .await
            .unwrap_err();
        assert!(err.to_string().contains("smtp"));
    }
}
