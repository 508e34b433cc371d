use actix_web::{Error, FromRequest, HttpRequest, dev::Payload, web};
use futures::future::{Ready, ready};
use serde::{Deserialize, Serialize};

use crate::errors::ApiError;
use crate::utils::jwt::TokenService;

/// Utilisateur authentifié extrait du header Authorization
/// Utilisé comme extracteur dans les routes protégées
///
/// Tout rejet (token absent, malformé, signature invalide, expiré) produit
/// la même réponse 401 {"error": "Unauthorized"} - la raison précise part
/// dans les logs, pas chez le client.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub user_id: i32,
    pub email: Option<String>,
    pub role: Option<String>,
}

impl FromRequest for AuthUser {
    type Error = Error;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        // 1. Récupérer le TokenService injecté au démarrage
        let tokens = match req.app_data::<web::Data<TokenService>>() {
            Some(tokens) => tokens,
            None => {
                return ready(Err(ApiError::Internal(
                    "TokenService not configured".to_string(),
                )
                .into()));
            }
        };

        // 2. Extraire le header Authorization (absent => chaîne vide => rejet Absent)
        let header = req
            .headers()
            .get("Authorization")
            .and_then(|h| h.to_str().ok())
            .unwrap_or("");

        // 3. Valider le token (le préfixe "Bearer " est géré par le validateur)
        match tokens.validate(header) {
            Ok(claims) => ready(Ok(AuthUser {
                user_id: claims.sub,
                email: claims.email,
                role: claims.role,
            })),
            Err(_) => ready(Err(ApiError::Unauthorized.into())),
        }
    }
}

impl AuthUser {
    pub fn is_admin(&self) -> bool {
        self.role.as_deref() == Some("admin")
    }
}
