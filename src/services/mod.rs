pub mod federated;
pub mod firebase;
pub mod mailer;
