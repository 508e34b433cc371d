use std::time::Duration;

use async_trait::async_trait;
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode, decode_header};
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

/// Endpoint JWK des clés publiques securetoken de Google
const JWK_URL: &str =
    "https://www.googleapis.com/service_accounts/v1/jwk/securetoken@system.gserviceaccount.com";

/// Identité externe vérifiée (assertion Firebase décodée)
#[derive(Debug, Clone)]
pub struct FirebaseIdentity {
    pub uid: String,
    pub email: Option<String>,
    pub name: Option<String>,
    pub email_verified: bool,
}

#[derive(Debug, Error)]
pub enum VerifyError {
    #[error("invalid identity assertion")]
    InvalidToken,
    #[error("identity provider unreachable: {0}")]
    Upstream(String),
}

/// Vérification d'une assertion d'identité externe
///
/// Chaque appel vérifie l'assertion contre les clés publiques courantes du
/// fournisseur - jamais de résultat de vérification mis en cache entre appels.
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify_id_token(&self, token: &str) -> Result<FirebaseIdentity, VerifyError>;
}

#[derive(Deserialize)]
struct JwkSet {
    keys: Vec<Jwk>,
}

#[derive(Deserialize)]
struct Jwk {
    kid: String,
    n: String,
    e: String,
}

#[derive(Deserialize)]
struct FirebaseClaims {
    sub: String,
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    email_verified: bool,
}

/// Vérificateur de tokens Firebase ID (RS256 contre les clés Google)
pub struct FirebaseVerifier {
    http: reqwest::Client,
    project_id: String,
}

impl FirebaseVerifier {
    pub fn new(project_id: &str) -> Self {
        // Timeout borné: l'appel au fournisseur d'identité ne doit pas bloquer
        // une requête indéfiniment. Construit une fois au démarrage.
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .expect("Failed to build the identity provider HTTP client");

        Self {
            http,
            project_id: project_id.to_string(),
        }
    }

    async fn fetch_jwks(&self) -> Result<JwkSet, VerifyError> {
        let response = self
            .http
            .get(JWK_URL)
            .send()
            .await
            .map_err(|e| VerifyError::Upstream(e.to_string()))?;

        response
            .json::<JwkSet>()
            .await
            .map_err(|e| VerifyError::Upstream(e.to_string()))
    }
}


#[async_trait]
impl IdentityVerifier for FirebaseVerifier {
    async fn verify_id_token(&self, token: &str) -> Result<FirebaseIdentity, VerifyError> {
        // 1. Lire le kid dans le header du token
        let header = decode_header(token).map_err(|e| {
            warn!(error = %e, "undecodable Firebase token header");
            VerifyError::InvalidToken
        })?;
        let kid = header.kid.ok_or(VerifyError::InvalidToken)?;

        // 2. Récupérer la clé publique correspondante chez Google
        let jwks = self.fetch_jwks().await?;
        let jwk = jwks
            .keys
            .iter()
            .find(|k| k.kid == kid)
            .ok_or(VerifyError::InvalidToken)?;

        let key = DecodingKey::from_rsa_components(&jwk.n, &jwk.e)
            .map_err(|_| VerifyError::InvalidToken)?;

        // 3. Vérifier signature, émetteur et audience
        let mut validation = Validation::new(Algorithm::RS256);
        validation.set_audience(&[&self.project_id]);
        validation.set_issuer(&[format!(
            "https://securetoken.google.com/{}",
            self.project_id
        )]);

        let data = decode::<FirebaseClaims>(token, &key, &validation).map_err(|e| {
            warn!(error = %e, "Firebase token verification failed");
            VerifyError::InvalidToken
        })?;

        info!(uid = %data.claims.sub, "Firebase token verified");

        Ok(FirebaseIdentity {
            uid: data.claims.sub,
            email: data.claims.email,
            name: data.claims.name,
            email_verified: data.claims.email_verified,
        })
    }
}
