use std::env;
use tracing::warn;

/// Configuration du serveur HTTP
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Configuration JWT - la clé est lue une fois au démarrage puis
/// injectée dans le TokenService (pas de lecture d'env à chaque requête)
#[derive(Debug, Clone)]
pub struct JwtConfig {
    pub secret: String,
}

/// Configuration email (l'envoi réel est hors périmètre, voir services::mailer)
#[derive(Debug, Clone)]
pub struct EmailConfig {
    pub enabled: bool,
    pub from: String,
}

/// Configuration Firebase pour la vérification des tokens d'identité
#[derive(Debug, Clone)]
pub struct FirebaseConfig {
    pub project_id: String,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub jwt: JwtConfig,
    pub email: EmailConfig,
    pub firebase: FirebaseConfig,
}

impl Config {
    pub fn from_env() -> Self {
        let jwt_secret = env::var("JWT_SECRET").unwrap_or_else(|_| {
            warn!("JWT_SECRET not found in .env, using default (INSECURE)");
            "default-insecure-key-change-this".to_string()
        });

        Self {
            server: ServerConfig {
                host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
                port: env::var("PORT")
                    .ok()
                    .and_then(|p| p.parse().ok())
                    .unwrap_or(8080),
            },
            jwt: JwtConfig { secret: jwt_secret },
            email: EmailConfig {
                enabled: env::var("EMAIL_ENABLED")
                    .map(|v| v == "true" || v == "True" || v == "1")
                    .unwrap_or(false),
                from: env::var("EMAIL_FROM").unwrap_or_else(|_| "noreply@accverse.com".to_string()),
            },
            firebase: FirebaseConfig {
                project_id: env::var("FIREBASE_PROJECT_ID").unwrap_or_default(),
            },
        }
    }
}
