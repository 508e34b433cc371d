use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("mail delivery failed: {0}")]
    Delivery(String),
}

/// Collaborateur d'envoi d'emails (codes OTP, confirmations, liens de reset)
///
/// La mécanique SMTP est hors périmètre: l'implémentation fournie logge
/// les messages sortants (mode développement). Un échec d'envoi ne doit
/// jamais faire échouer la requête appelante - les appelants loggent et
/// continuent.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError>;
}

/// Mailer de développement: logge le message au lieu de l'envoyer
pub struct LogMailer {
    from: String,
}

impl LogMailer {
    pub fn new(from: &str) -> Self {
        Self {
            from: from.to_string(),
        }
    }
}

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), MailError> {
        info!(from = %self.from, to = %to, subject = %subject, "DEVELOPMENT MODE: email not sent");
        info!("Body: {}", body);
        Ok(())
    }
}
