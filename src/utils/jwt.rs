use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// TTL du token d'accès (heures)
pub const ACCESS_TOKEN_TTL_HOURS: i64 = 24;
/// TTL du refresh token (heures) - 30 jours
pub const REFRESH_TOKEN_TTL_HOURS: i64 = 720;
/// Seuil d'avertissement avant expiration (secondes)
const EXPIRY_WARNING_SECONDS: i64 = 300;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    pub sub: i32, // user_id
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

/// Raison de rejet d'un token, classifiée pour les logs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum TokenRejection {
    #[error("no token provided")]
    Absent,
    #[error("token is malformed")]
    Malformed,
    #[error("token signature mismatch")]
    SignatureMismatch,
    #[error("token expired")]
    Expired,
}

/// Émetteur/validateur de tokens de session
///
/// La clé secrète est injectée au démarrage (pas de variable globale),
/// ce qui permet aux tests de substituer une clé déterministe.
#[derive(Clone)]
pub struct TokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenService {
    pub fn new(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }

    /// Génère un token signé HS256 pour un utilisateur
    /// Claims: sub, email (optionnel), role (optionnel), iat, exp = now + ttl_hours
    pub fn issue(
        &self,
        user_id: i32,
        email: Option<&str>,
        role: Option<&str>,
        ttl_hours: i64,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id,
            email: email.map(str::to_string),
            role: role.map(str::to_string),
            iat: now.timestamp(),
            exp: (now + Duration::hours(ttl_hours)).timestamp(),
        };
        self.encode_claims(&claims)
    }

    /// Génère un refresh token longue durée (30 jours, sans claim de rôle)
    pub fn issue_refresh(
        &self,
        user_id: i32,
        email: Option<&str>,
    ) -> Result<String, jsonwebtoken::errors::Error> {
        self.issue(user_id, email, None, REFRESH_TOKEN_TTL_HOURS)
    }

    fn encode_claims(&self, claims: &Claims) -> Result<String, jsonwebtoken::errors::Error> {
        encode(&Header::default(), claims, &self.encoding)
    }

    /// Vérifie et décode un token présenté (avec ou sans préfixe "Bearer ")
    ///
    /// Ne panique jamais: tout échec retourne une raison classifiée.
    /// Les rejets pour signature/expiration sont loggés en warning;
    /// un token valide à moins de 5 minutes de l'expiration émet un
    /// avertissement mais reste accepté.
    pub fn validate(&self, raw: &str) -> Result<Claims, TokenRejection> {
        let token = strip_bearer(raw);
        if token.is_empty() {
            warn!("no token provided");
            return Err(TokenRejection::Absent);
        }

        // Pas de leeway: la limite d'expiration est exacte
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;

        match decode::<Claims>(token, &self.decoding, &validation) {
            Ok(data) => {
                let remaining = data.claims.exp - Utc::now().timestamp();
                if remaining < EXPIRY_WARNING_SECONDS {
                    warn!(remaining_seconds = remaining, "token is about to expire");
                }
                Ok(data.claims)
            }
            Err(e) => {
                use jsonwebtoken::errors::ErrorKind;
                let rejection = match e.kind() {
                    ErrorKind::ExpiredSignature => TokenRejection::Expired,
                    ErrorKind::InvalidSignature => TokenRejection::SignatureMismatch,
                    _ => TokenRejection::Malformed,
                };
                warn!(reason = %rejection, "token rejected");
                Err(rejection)
            }
        }
    }

    /// Extrait tous les claims d'un token, même expiré (usage diagnostic)
    /// La signature est toujours vérifiée, l'expiration non
    pub fn claims(&self, raw: &str) -> Option<Claims> {
        let token = strip_bearer(raw);
        if token.is_empty() {
            return None;
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;

        decode::<Claims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .ok()
    }

    /// Indique si un token est expiré: Some(true)/Some(false), None si indécodable
    pub fn is_expired(&self, raw: &str) -> Option<bool> {
        self.claims(raw)
            .map(|claims| claims.exp < Utc::now().timestamp())
    }
}

fn strip_bearer(raw: &str) -> &str {
    raw.strip_prefix("Bearer ").unwrap_or(raw).trim()
}
