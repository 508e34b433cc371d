use std::sync::Arc;

use actix_web::{App, HttpServer, web};
use dotenv::dotenv;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod db;
mod errors;
mod middleware;
mod models;
mod routes;
mod services;
mod utils;

use config::Config;
use services::firebase::{FirebaseVerifier, IdentityVerifier};
use services::mailer::{LogMailer, Mailer};
use utils::jwt::TokenService;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .init();

    // 1. Configuration lue une fois au démarrage
    let config = Config::from_env();
    let host = config.server.host.clone();
    let port = config.server.port;

    // 2. Connexion BD
    let db = db::establish_connection()
        .await
        .expect("Failed to connect to database");
    info!("database connection established");

    // 3. Collaborateurs injectés dans les handlers
    let tokens = TokenService::new(&config.jwt.secret);
    let verifier: Arc<dyn IdentityVerifier> =
        Arc::new(FirebaseVerifier::new(&config.firebase.project_id));
    // Aucun transport SMTP n'est embarqué: les messages sortants sont loggés
    if config.email.enabled {
        warn!("EMAIL_ENABLED is set but no SMTP transport is configured, outgoing mail will be logged");
    }
    let mailer: Arc<dyn Mailer> = Arc::new(LogMailer::new(&config.email.from));

    info!(host = %host, port = port, "starting server");

    // `DatabaseConnection` n'est pas Clone lorsque la feature mock de
    // sea-orm est activée (builds de test): on partage le Data (Arc)
    let db = web::Data::new(db);
    HttpServer::new(move || {
        App::new()
            .app_data(db.clone())
            .app_data(web::Data::new(tokens.clone()))
            .app_data(web::Data::from(Arc::clone(&verifier)))
            .app_data(web::Data::from(Arc::clone(&mailer)))
            .configure(routes::configure_routes)
    })
    .bind((host, port))?
    .run()
    .await
}
