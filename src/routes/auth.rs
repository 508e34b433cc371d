use actix_web::{HttpResponse, get, post, web};
use chrono::{Duration, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, DatabaseConnection, EntityTrait, QueryFilter, Set,
    SqlErr, sea_query::OnConflict,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info};
use uuid::Uuid;
use validator::Validate;

use crate::errors::ApiError;
use crate::middleware::AuthUser;
use crate::models::email_verification::{
    self, Column as OtpColumn, Entity as EmailVerification,
};
use crate::models::users::{self, Column as UserColumn, Entity as Users};
use crate::routes::validate_dto;
use crate::services::firebase::{IdentityVerifier, VerifyError};
use crate::services::mailer::Mailer;
use crate::utils::jwt::{ACCESS_TOKEN_TTL_HOURS, TokenService};
use crate::utils::otp::{OTP_TTL_MINUTES, generate_otp};
use crate::utils::password;

// DTO pour l'inscription
#[derive(Deserialize, Validate)]
pub struct RegisterRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    #[serde(rename = "zipCode")]
    pub zip_code: Option<String>,
}

// DTO pour la connexion
#[derive(Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

#[derive(Deserialize, Validate)]
pub struct SendOtpRequest {
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
}

#[derive(Deserialize, Validate)]
pub struct VerifyOtpRequest {
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
    #[validate(length(min = 1, message = "OTP is required"))]
    pub otp: String,
}

// DTO pour l'authentification fédérée (assertion Firebase déjà émise côté client)
#[derive(Deserialize, Validate)]
pub struct GoogleAuthRequest {
    #[validate(length(min = 1, message = "Missing required fields"))]
    pub firebase_token: String,
    #[validate(email(message = "Missing required fields"))]
    pub email: String,
    #[validate(length(min = 1, message = "Missing required fields"))]
    pub firebase_uid: String,
    pub name: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct GoogleVerifyRequest {
    #[validate(length(min = 1, message = "Missing token"))]
    pub token: String,
}

#[derive(Deserialize, Validate)]
pub struct GoogleCompleteRequest {
    #[validate(length(min = 1, message = "Missing required fields"))]
    pub firebase_uid: String,
    #[validate(length(min = 1, message = "Missing required fields"))]
    pub firebase_token: String,
    #[validate(email(message = "Missing required fields"))]
    pub email: String,
    #[validate(length(min = 1, message = "Missing required fields"))]
    pub name: String,
    #[validate(length(min = 1, message = "Missing required fields"))]
    pub password: String,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub city: Option<String>,
    pub state: Option<String>,
    #[serde(rename = "zipCode")]
    pub zip_code: Option<String>,
}

#[derive(Deserialize)]
pub struct VerifyQuery {
    pub token: Option<String>,
}

#[derive(Deserialize, Validate)]
pub struct ResendVerificationRequest {
    #[validate(email(message = "A valid email is required"))]
    pub email: String,
}

#[derive(Deserialize, Validate)]
pub struct ResetRequest {
    #[validate(email(message = "Email is required"))]
    pub email: String,
}

#[derive(Deserialize, Validate)]
pub struct ResetCompleteRequest {
    #[validate(length(min = 1, message = "Token and new password are required"))]
    pub token: String,
    #[validate(length(min = 1, message = "Token and new password are required"))]
    pub password: String,
}

// Réponse après login / authentification fédérée
#[derive(Serialize)]
pub struct AuthResponse {
    pub message: String,
    pub token: String,
    pub user: users::Model,
}

fn issue_for(tokens: &TokenService, user: &users::Model) -> Result<String, ApiError> {
    tokens
        .issue(
            user.id,
            Some(&user.email),
            Some(&user.role),
            ACCESS_TOKEN_TTL_HOURS,
        )
        .map_err(|e| ApiError::Internal(format!("Failed to generate token: {}", e)))
}

// Adresse complète "rue, ville, état code" si les composants sont fournis
fn full_address(
    address: Option<&str>,
    city: Option<&str>,
    state: Option<&str>,
    zip_code: Option<&str>,
) -> Option<String> {
    let address = address.unwrap_or("");
    if city.is_some() || state.is_some() || zip_code.is_some() {
        Some(
            format!(
                "{}, {}, {} {}",
                address,
                city.unwrap_or(""),
                state.unwrap_or(""),
                zip_code.unwrap_or("")
            )
            .trim()
            .to_string(),
        )
    } else if address.is_empty() {
        None
    } else {
        Some(address.to_string())
    }
}

// L'échec d'envoi d'email est loggé mais ne fait jamais échouer la requête
async fn send_or_log(mailer: &dyn Mailer, to: &str, subject: &str, body: &str) {
    if let Err(e) = mailer.send(to, subject, body).await {
        error!(to = %to, error = %e, "failed to send email");
    }
}

fn map_verify_error(e: VerifyError) -> ApiError {
    match e {
        VerifyError::InvalidToken => ApiError::InvalidAssertion,
        VerifyError::Upstream(detail) => ApiError::Upstream(detail),
    }
}

/// POST /auth/register - Créer un compte (PUBLIC)
/// L'email doit avoir été prouvé au préalable via le flux OTP
#[post("/register")]
pub async fn register(
    body: web::Json<RegisterRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ApiError> {
    validate_dto(&*body)?;

    // 1. Pré-vérification de l'unicité (message 409 propre)
    let existing = Users::find()
        .filter(UserColumn::Email.eq(&body.email))
        .one(db.get_ref())
        .await?;
    if existing.is_some() {
        return Err(ApiError::Conflict("Email already registered".to_string()));
    }

    // 2. Hash du mot de passe
    let password_hash = password::hash_password(&body.password);

    // 3. Créer l'utilisateur (vérifié: la possession de l'email a été prouvée par OTP)
    let new_user = users::ActiveModel {
        name: Set(body.name.clone()),
        email: Set(body.email.clone()),
        password: Set(Some(password_hash)),
        phone: Set(body.phone.clone()),
        address: Set(full_address(
            body.address.as_deref(),
            body.city.as_deref(),
            body.state.as_deref(),
            body.zip_code.as_deref(),
        )),
        role: Set("client".to_string()),
        is_verified: Set(true),
        created_at: Set(Some(Utc::now())),
        updated_at: Set(Some(Utc::now())),
        ..Default::default()
    };

    // La contrainte unique reste le signal de conflit qui fait foi
    // (deux inscriptions concurrentes peuvent passer la pré-vérification)
    let user = match new_user.insert(db.get_ref()).await {
        Ok(user) => user,
        Err(e) => {
            if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                return Err(ApiError::Conflict("Email already registered".to_string()));
            }
            return Err(ApiError::Database(e));
        }
    };

    info!(user_id = user.id, "user registered");

    Ok(HttpResponse::Created().json(serde_json::json!({
        "message": "Registration successful.",
        "user_id": user.id
    })))
}

/// POST /auth/login - Se connecter (PUBLIC)
/// Message d'erreur identique pour email inconnu et mauvais mot de passe
#[post("/login")]
pub async fn login(
    body: web::Json<LoginRequest>,
    db: web::Data<DatabaseConnection>,
    tokens: web::Data<TokenService>,
) -> Result<HttpResponse, ApiError> {
    validate_dto(&*body)?;

    // 1. Trouver l'utilisateur
    let user = Users::find()
        .filter(UserColumn::Email.eq(&body.email))
        .one(db.get_ref())
        .await?
        .ok_or(ApiError::InvalidCredentials)?;

    // 2. Vérifier le mot de passe (compte purement fédéré => mêmes 401)
    let digest = user
        .password
        .as_deref()
        .ok_or(ApiError::InvalidCredentials)?;
    if !password::verify_password(&body.password, digest) {
        return Err(ApiError::InvalidCredentials);
    }

    // 3. Générer le JWT
    let token = issue_for(&tokens, &user)?;

    Ok(HttpResponse::Ok().json(AuthResponse {
        message: "Login successful".to_string(),
        token,
        user,
    }))
}

/// POST /auth/logout - Déconnexion côté client (PUBLIC)
/// Pas de révocation serveur: le token reste valide jusqu'à expiration naturelle
#[post("/logout")]
pub async fn logout() -> HttpResponse {
    info!("user logout");
    HttpResponse::Ok().json(serde_json::json!({
        "message": "Logged out successfully"
    }))
}

/// POST /auth/refresh-token - Renouveler un token encore valide (PROTÉGÉE)
#[post("/refresh-token")]
pub async fn refresh_token(
    auth_user: AuthUser,
    db: web::Data<DatabaseConnection>,
    tokens: web::Data<TokenService>,
) -> Result<HttpResponse, ApiError> {
    let user = Users::find_by_id(auth_user.user_id)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let token = issue_for(&tokens, &user)?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Token refreshed successfully",
        "token": token
    })))
}

/// POST /auth/send-otp - Envoyer un code de vérification pré-inscription (PUBLIC)
#[post("/send-otp")]
pub async fn send_otp(
    body: web::Json<SendOtpRequest>,
    db: web::Data<DatabaseConnection>,
    mailer: web::Data<dyn Mailer>,
) -> Result<HttpResponse, ApiError> {
    validate_dto(&*body)?;

    // 1. L'email ne doit pas déjà appartenir à un compte inscrit
    let existing = Users::find()
        .filter(UserColumn::Email.eq(&body.email))
        .one(db.get_ref())
        .await?;
    if existing.is_some() {
        return Err(ApiError::Conflict("Email already registered".to_string()));
    }

    // 2. Générer le code et l'upserter sur la clé unique email
    //    (le dernier code émis invalide le précédent)
    let otp = generate_otp();
    let record = email_verification::ActiveModel {
        email: Set(body.email.clone()),
        otp: Set(otp.clone()),
        created_at: Set(Utc::now()),
        is_verified: Set(false),
        ..Default::default()
    };

    EmailVerification::insert(record)
        .on_conflict(
            OnConflict::column(OtpColumn::Email)
                .update_columns([OtpColumn::Otp, OtpColumn::CreatedAt, OtpColumn::IsVerified])
                .to_owned(),
        )
        .exec(db.get_ref())
        .await?;

    // 3. Livraison du code (collaborateur externe)
    let body_text = format!(
        "Hi there,\n\nYour verification code is: {}\n\nThis code will expire in {} minutes.\n\nRegards,\nAccverse",
        otp, OTP_TTL_MINUTES
    );
    send_or_log(mailer.as_ref(), &body.email, "Your Verification Code", &body_text).await;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Verification code sent successfully"
    })))
}

/// POST /auth/verify-otp - Vérifier un code de vérification (PUBLIC)
#[post("/verify-otp")]
pub async fn verify_otp(
    body: web::Json<VerifyOtpRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ApiError> {
    validate_dto(&*body)?;

    // 1. Chercher le code pour cet email
    let record = EmailVerification::find()
        .filter(OtpColumn::Email.eq(&body.email))
        .filter(OtpColumn::Otp.eq(&body.otp))
        .one(db.get_ref())
        .await?
        .ok_or_else(|| {
            ApiError::Validation("Invalid or expired verification code".to_string())
        })?;

    // 2. Fenêtre de validité: 5 minutes après création
    let cutoff = Utc::now() - Duration::minutes(OTP_TTL_MINUTES);
    if record.created_at < cutoff {
        return Err(ApiError::Validation(
            "Invalid or expired verification code".to_string(),
        ));
    }

    // 3. Marquer l'email vérifié (flag consommé)
    let mut active: email_verification::ActiveModel = record.into();
    active.is_verified = Set(true);
    active.update(db.get_ref()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Email verified successfully"
    })))
}

/// POST /auth/google - Authentification fédérée (PUBLIC)
/// L'assertion est re-vérifiée auprès du fournisseur à chaque appel
#[post("/google")]
pub async fn google_auth(
    body: web::Json<GoogleAuthRequest>,
    db: web::Data<DatabaseConnection>,
    tokens: web::Data<TokenService>,
    verifier: web::Data<dyn IdentityVerifier>,
) -> Result<HttpResponse, ApiError> {
    validate_dto(&*body)?;

    // 1. Vérifier l'assertion Firebase et la correspondance d'uid
    let identity = verifier
        .verify_id_token(&body.firebase_token)
        .await
        .map_err(map_verify_error)?;
    if identity.uid != body.firebase_uid {
        return Err(ApiError::InvalidAssertion);
    }

    // 2. Résoudre l'identité vers un compte local
    use crate::services::federated::{FederatedResolution, resolve};
    match resolve(db.get_ref(), &body.firebase_uid, &body.email).await? {
        FederatedResolution::Existing(user) | FederatedResolution::Linked(user) => {
            let token = issue_for(&tokens, &user)?;
            Ok(HttpResponse::Ok().json(serde_json::json!({
                "token": token,
                "user": google_safe_user(&user),
                "isNewUser": false
            })))
        }
        FederatedResolution::NeedsRegistration => Ok(HttpResponse::Ok().json(serde_json::json!({
            "isNewUser": true,
            "message": "User not found. Please complete registration."
        }))),
    }
}

/// POST /auth/google/verify - Contrôle sans état d'une assertion Firebase (PUBLIC)
/// Aucun compte local n'est consulté ni créé: l'assertion est simplement
/// vérifiée et ses claims renvoyés
#[post("/google/verify")]
pub async fn google_verify(
    body: web::Json<GoogleVerifyRequest>,
    verifier: web::Data<dyn IdentityVerifier>,
) -> Result<HttpResponse, ApiError> {
    validate_dto(&*body)?;

    let identity = verifier
        .verify_id_token(&body.token)
        .await
        .map_err(map_verify_error)?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "valid": true,
        "user": {
            "uid": identity.uid,
            "email": identity.email,
            "name": identity.name.unwrap_or_default(),
            "email_verified": identity.email_verified
        }
    })))
}

/// POST /auth/google/complete-registration - Finaliser une inscription fédérée (PUBLIC)
#[post("/google/complete-registration")]
pub async fn google_complete_registration(
    body: web::Json<GoogleCompleteRequest>,
    db: web::Data<DatabaseConnection>,
    tokens: web::Data<TokenService>,
    verifier: web::Data<dyn IdentityVerifier>,
) -> Result<HttpResponse, ApiError> {
    validate_dto(&*body)?;

    // 1. Re-vérifier l'assertion (jamais de vérification mise en cache)
    let identity = verifier
        .verify_id_token(&body.firebase_token)
        .await
        .map_err(map_verify_error)?;
    if identity.uid != body.firebase_uid {
        return Err(ApiError::InvalidAssertion);
    }

    // 2. Refuser si un compte existe déjà pour cet uid ou cet email
    let existing = Users::find()
        .filter(
            Condition::any()
                .add(UserColumn::FirebaseUid.eq(&body.firebase_uid))
                .add(UserColumn::Email.eq(&body.email)),
        )
        .one(db.get_ref())
        .await?;
    if existing.is_some() {
        return Err(ApiError::Validation("User already exists".to_string()));
    }

    // 3. Créer le compte vérifié avec mot de passe hashé
    let password_hash = password::hash_password(&body.password);
    let new_user = users::ActiveModel {
        name: Set(body.name.clone()),
        email: Set(body.email.clone()),
        password: Set(Some(password_hash)),
        phone: Set(body.phone.clone()),
        address: Set(full_address(
            body.address.as_deref(),
            body.city.as_deref(),
            body.state.as_deref(),
            body.zip_code.as_deref(),
        )),
        role: Set("client".to_string()),
        is_verified: Set(true),
        firebase_uid: Set(Some(body.firebase_uid.clone())),
        created_at: Set(Some(Utc::now())),
        updated_at: Set(Some(Utc::now())),
        ..Default::default()
    };

    // Course entre résolution et finalisation: la contrainte unique tranche
    let user = match new_user.insert(db.get_ref()).await {
        Ok(user) => user,
        Err(e) => {
            if matches!(e.sql_err(), Some(SqlErr::UniqueConstraintViolation(_))) {
                return Err(ApiError::Validation("User already exists".to_string()));
            }
            return Err(ApiError::Database(e));
        }
    };

    let token = issue_for(&tokens, &user)?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "token": token,
        "user": google_safe_user(&user),
        "message": "Registration completed successfully"
    })))
}

fn google_safe_user(user: &users::Model) -> serde_json::Value {
    serde_json::json!({
        "id": user.id,
        "name": user.name,
        "email": user.email,
        "role": user.role,
        "provider": "google",
        "firebase_uid": user.firebase_uid,
        "is_verified": user.is_verified
    })
}

/// GET /auth/verify?token= - Vérification par lien (flux legacy, PUBLIC)
#[get("/verify")]
pub async fn verify_email(
    query: web::Query<VerifyQuery>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ApiError> {
    let token = query
        .token
        .as_deref()
        .filter(|t| !t.is_empty())
        .ok_or_else(|| ApiError::Validation("Verification token is required".to_string()))?;

    let user = Users::find()
        .filter(UserColumn::VerificationToken.eq(token))
        .one(db.get_ref())
        .await?
        .ok_or_else(|| ApiError::Validation("Invalid verification token".to_string()))?;

    let email = user.email.clone();
    let mut active: users::ActiveModel = user.into();
    active.is_verified = Set(true);
    active.verification_token = Set(None);
    active.update(db.get_ref()).await?;

    info!(email = %email, "user verified via link");

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Email verified successfully. You can now log in."
    })))
}

/// POST /auth/resend-verification - Renvoyer le lien de vérification (PUBLIC)
#[post("/resend-verification")]
pub async fn resend_verification(
    body: web::Json<ResendVerificationRequest>,
    db: web::Data<DatabaseConnection>,
    mailer: web::Data<dyn Mailer>,
) -> Result<HttpResponse, ApiError> {
    validate_dto(&*body)?;

    let user = Users::find()
        .filter(UserColumn::Email.eq(&body.email))
        .one(db.get_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let verification_token = Uuid::new_v4().to_string();
    let name = user.name.clone();
    let mut active: users::ActiveModel = user.into();
    active.verification_token = Set(Some(verification_token.clone()));
    active.update(db.get_ref()).await?;

    let verification_url = format!(
        "http://localhost:8080/verify?token={}&email={}",
        verification_token, body.email
    );
    let body_text = format!(
        "Hi {},\n\nPlease verify your account by clicking the link below:\n\n{}\n\nThis link will expire in 24 hours.\n\nRegards,\nAccverse",
        name, verification_url
    );
    send_or_log(mailer.as_ref(), &body.email, "Verify Your Account", &body_text).await;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Verification email sent successfully"
    })))
}

/// POST /auth/reset-password-request - Demander un reset de mot de passe (PUBLIC)
/// Réponse identique que l'email soit inscrit ou non (pas d'énumération)
#[post("/reset-password-request")]
pub async fn reset_password_request(
    body: web::Json<ResetRequest>,
    db: web::Data<DatabaseConnection>,
    mailer: web::Data<dyn Mailer>,
) -> Result<HttpResponse, ApiError> {
    validate_dto(&*body)?;

    let generic = serde_json::json!({
        "message": "If your email is registered, you will receive a reset link."
    });

    let user = match Users::find()
        .filter(UserColumn::Email.eq(&body.email))
        .one(db.get_ref())
        .await?
    {
        Some(user) => user,
        // Email inconnu: aucune écriture, même réponse
        None => return Ok(HttpResponse::Ok().json(generic)),
    };

    let reset_token = Uuid::new_v4().to_string();
    let expiry = Utc::now() + Duration::hours(24);
    info!(user_id = user.id, "generated password reset token");

    let name = user.name.clone();
    let mut active: users::ActiveModel = user.into();
    active.reset_token = Set(Some(reset_token.clone()));
    active.reset_token_expiry = Set(Some(expiry));
    active.update(db.get_ref()).await?;

    let reset_url = format!(
        "http://localhost:8080/forgot-password?token={}&expiry={}",
        reset_token,
        expiry.timestamp()
    );
    let body_text = format!(
        "Hi {},\n\nTo reset your password, please click the link below:\n\n{}\n\nThis link will expire in 24 hours.\n\nRegards,\nAccverse",
        name, reset_url
    );
    send_or_log(mailer.as_ref(), &body.email, "Reset Your Password", &body_text).await;

    Ok(HttpResponse::Ok().json(generic))
}

/// POST /auth/reset-password-complete - Finaliser le reset (PUBLIC)
/// Le token est à usage unique: effacé avec son expiry après succès
#[post("/reset-password-complete")]
pub async fn reset_password_complete(
    body: web::Json<ResetCompleteRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ApiError> {
    validate_dto(&*body)?;

    let user = Users::find()
        .filter(UserColumn::ResetToken.eq(&body.token))
        .one(db.get_ref())
        .await?
        .ok_or_else(|| ApiError::Validation("Invalid token".to_string()))?;

    if let Some(expiry) = user.reset_token_expiry {
        if expiry < Utc::now() {
            return Err(ApiError::Validation(
                "Token has expired. Please request a new password reset.".to_string(),
            ));
        }
    }

    let password_hash = password::hash_password(&body.password);
    let user_id = user.id;
    let mut active: users::ActiveModel = user.into();
    active.password = Set(Some(password_hash));
    active.reset_token = Set(None);
    active.reset_token_expiry = Set(None);
    active.updated_at = Set(Some(Utc::now()));
    active.update(db.get_ref()).await?;

    info!(user_id = user_id, "password reset successful");

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Password has been reset successfully. You can now log in."
    })))
}

pub fn auth_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .service(register)
            .service(login)
            .service(logout)
            .service(refresh_token)
            .service(send_otp)
            .service(verify_otp)
            .service(google_auth)
            .service(google_verify)
            .service(google_complete_registration)
            .service(verify_email)
            .service(resend_verification)
            .service(reset_password_request)
            .service(reset_password_complete),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::firebase::FirebaseIdentity;
    use crate::services::mailer::{LogMailer, MailError};
    use actix_web::{App, test};
    use async_trait::async_trait;
    use sea_orm::{DatabaseBackend, MockDatabase};
    use std::sync::Arc;

    struct StaticVerifier {
        identity: FirebaseIdentity,
    }

    #[async_trait]
    impl IdentityVerifier for StaticVerifier {
        async fn verify_id_token(&self, _token: &str) -> Result<FirebaseIdentity, VerifyError> {
            Ok(self.identity.clone())
        }
    }

    struct NullMailer;

    #[async_trait]
    impl Mailer for NullMailer {
        async fn send(&self, _to: &str, _subject: &str, _body: &str) -> Result<(), MailError> {
            Ok(())
        }
    }

    fn sample_user(id: i32, email: &str, password_digest: Option<String>) -> users::Model {
        users::Model {
            id,
            name: "Alice".to_string(),
            email: email.to_string(),
            password: password_digest,
            phone: None,
            address: None,
            role: "client".to_string(),
            is_verified: true,
            firebase_uid: None,
            verification_token: None,
            reset_token: None,
            reset_token_expiry: None,
            created_at: None,
            updated_at: None,
        }
    }

    async fn init_app(
        db: DatabaseConnection,
        verifier: Arc<dyn IdentityVerifier>,
    ) -> impl actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
    > {
        let mailer: Arc<dyn Mailer> = Arc::new(NullMailer);
        test::init_service(
            App::new()
                .app_data(web::Data::new(db))
                .app_data(web::Data::new(TokenService::new("test-secret")))
                .app_data(web::Data::from(mailer))
                .app_data(web::Data::from(verifier))
                .configure(auth_routes),
        )
        .await
    }

    fn noop_verifier() -> Arc<dyn IdentityVerifier> {
        Arc::new(StaticVerifier {
            identity: FirebaseIdentity {
                uid: "unused".to_string(),
                email: None,
                name: None,
                email_verified: false,
            },
        })
    }

    struct RejectingVerifier;

    #[async_trait]
    impl IdentityVerifier for RejectingVerifier {
        async fn verify_id_token(&self, _token: &str) -> Result<FirebaseIdentity, VerifyError> {
            Err(VerifyError::InvalidToken)
        }
    }

    #[actix_web::test]
    async fn test_login_success_returns_token() {
        let digest = password::hash_password("secret123");
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sample_user(1, "alice@example.com", Some(digest))]])
            .into_connection();

        let app = init_app(db, noop_verifier()).await;
        let req = test::TestRequest::post()
            .uri("/auth/login")
            .set_json(serde_json::json!({
                "email": "alice@example.com",
                "password": "secret123"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert!(body["token"].is_string());
        assert_eq!(body["user"]["email"], "alice@example.com");
        // le digest ne doit jamais être sérialisé
        assert!(body["user"].get("password").is_none());
    }

    #[actix_web::test]
    async fn test_login_wrong_password_and_unknown_email_same_shape() {
        let digest = password::hash_password("secret123");

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sample_user(1, "alice@example.com", Some(digest))]])
            .into_connection();
        let app = init_app(db, noop_verifier()).await;
        let req = test::TestRequest::post()
            .uri("/auth/login")
            .set_json(serde_json::json!({
                "email": "alice@example.com",
                "password": "wrong"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
        let wrong_password_body = test::read_body(resp).await;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<users::Model>::new()])
            .into_connection();
        let app = init_app(db, noop_verifier()).await;
        let req = test::TestRequest::post()
            .uri("/auth/login")
            .set_json(serde_json::json!({
                "email": "nobody@example.com",
                "password": "whatever"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
        let unknown_email_body = test::read_body(resp).await;

        // même corps au byte près: pas d'énumération de comptes possible
        assert_eq!(wrong_password_body, unknown_email_body);
    }

    #[actix_web::test]
    async fn test_register_duplicate_email_conflict() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sample_user(1, "taken@example.com", None)]])
            .into_connection();

        let app = init_app(db, noop_verifier()).await;
        let req = test::TestRequest::post()
            .uri("/auth/register")
            .set_json(serde_json::json!({
                "name": "Bob",
                "email": "taken@example.com",
                "password": "secret123"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 409);
    }

    #[actix_web::test]
    async fn test_send_otp_refused_for_registered_email() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sample_user(1, "taken@example.com", None)]])
            .into_connection();

        let app = init_app(db, noop_verifier()).await;
        let req = test::TestRequest::post()
            .uri("/auth/send-otp")
            .set_json(serde_json::json!({"email": "taken@example.com"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 409);
    }

    #[actix_web::test]
    async fn test_send_otp_upserts_on_unique_email() {
        // l'email n'appartient à aucun compte, puis INSERT ... ON CONFLICT
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<users::Model>::new()])
            .append_query_results([vec![email_verification::Model {
                id: 1,
                email: "new@example.com".to_string(),
                otp: "123456".to_string(),
                created_at: Utc::now(),
                is_verified: false,
            }]])
            .into_connection();
        // `DatabaseConnection` n'est pas Clone avec la feature mock; on
        // partage le mocker (Arc) pour relire le journal de transactions
        let log_handle = match &db {
            DatabaseConnection::MockDatabaseConnection(conn) => {
                DatabaseConnection::MockDatabaseConnection(Arc::clone(conn))
            }
            _ => unreachable!("mock connection expected"),
        };

        let app = init_app(db, noop_verifier()).await;
        let req = test::TestRequest::post()
            .uri("/auth/send-otp")
            .set_json(serde_json::json!({"email": "new@example.com"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);

        // la ré-émission doit écraser le code précédent: l'INSERT porte
        // un ON CONFLICT sur email qui réécrit otp, created_at et is_verified
        // le log Debug échappe les guillemets du SQL
        let statements = format!("{:?}", log_handle.into_transaction_log());
        assert!(statements.contains(r#"ON CONFLICT (\"email\") DO UPDATE"#));
        assert!(statements.contains(r#"\"otp\" = \"excluded\".\"otp\""#));
        assert!(statements.contains(r#"\"created_at\" = \"excluded\".\"created_at\""#));
        assert!(statements.contains(r#"\"is_verified\" = \"excluded\".\"is_verified\""#));
    }

    #[actix_web::test]
    async fn test_verify_otp_within_window_accepted() {
        let record = email_verification::Model {
            id: 1,
            email: "new@example.com".to_string(),
            otp: "123456".to_string(),
            created_at: Utc::now() - Duration::seconds(4 * 60 + 59),
            is_verified: false,
        };
        let mut consumed = record.clone();
        consumed.is_verified = true;

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![record]])
            .append_query_results([vec![consumed]])
            .into_connection();

        let app = init_app(db, noop_verifier()).await;
        let req = test::TestRequest::post()
            .uri("/auth/verify-otp")
            .set_json(serde_json::json!({"email": "new@example.com", "otp": "123456"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
    }

    #[actix_web::test]
    async fn test_verify_otp_after_window_rejected() {
        let record = email_verification::Model {
            id: 1,
            email: "new@example.com".to_string(),
            otp: "123456".to_string(),
            created_at: Utc::now() - Duration::seconds(5 * 60 + 1),
            is_verified: false,
        };

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![record]])
            .into_connection();

        let app = init_app(db, noop_verifier()).await;
        let req = test::TestRequest::post()
            .uri("/auth/verify-otp")
            .set_json(serde_json::json!({"email": "new@example.com", "otp": "123456"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }

    #[actix_web::test]
    async fn test_verify_otp_wrong_code_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<email_verification::Model>::new()])
            .into_connection();

        let app = init_app(db, noop_verifier()).await;
        let req = test::TestRequest::post()
            .uri("/auth/verify-otp")
            .set_json(serde_json::json!({"email": "new@example.com", "otp": "000000"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }

    #[actix_web::test]
    async fn test_reset_request_unknown_email_generic_and_no_write() {
        // un seul résultat de SELECT scripté, aucun exec: toute tentative
        // d'écriture ferait échouer la requête en 500
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<users::Model>::new()])
            .into_connection();

        let app = init_app(db, noop_verifier()).await;
        let req = test::TestRequest::post()
            .uri("/auth/reset-password-request")
            .set_json(serde_json::json!({"email": "nobody@example.com"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(
            body["message"],
            "If your email is registered, you will receive a reset link."
        );
    }

    #[actix_web::test]
    async fn test_reset_complete_expired_token_rejected() {
        let mut user = sample_user(1, "alice@example.com", None);
        user.reset_token = Some("reset-token".to_string());
        user.reset_token_expiry = Some(Utc::now() - Duration::hours(1));

        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![user]])
            .into_connection();

        let app = init_app(db, noop_verifier()).await;
        let req = test::TestRequest::post()
            .uri("/auth/reset-password-complete")
            .set_json(serde_json::json!({"token": "reset-token", "password": "newpass123"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }

    #[actix_web::test]
    async fn test_google_auth_new_identity_needs_registration() {
        let verifier: Arc<dyn IdentityVerifier> = Arc::new(StaticVerifier {
            identity: FirebaseIdentity {
                uid: "uid-999".to_string(),
                email: Some("new@example.com".to_string()),
                name: Some("New User".to_string()),
                email_verified: true,
            },
        });

        // pas de correspondance uid, pas de correspondance email
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<users::Model>::new()])
            .append_query_results([Vec::<users::Model>::new()])
            .into_connection();

        let app = init_app(db, verifier).await;
        let req = test::TestRequest::post()
            .uri("/auth/google")
            .set_json(serde_json::json!({
                "firebase_token": "assertion",
                "email": "new@example.com",
                "firebase_uid": "uid-999"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["isNewUser"], true);
    }

    #[actix_web::test]
    async fn test_google_auth_uid_mismatch_rejected() {
        let verifier: Arc<dyn IdentityVerifier> = Arc::new(StaticVerifier {
            identity: FirebaseIdentity {
                uid: "real-uid".to_string(),
                email: None,
                name: None,
                email_verified: false,
            },
        });

        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let app = init_app(db, verifier).await;
        let req = test::TestRequest::post()
            .uri("/auth/google")
            .set_json(serde_json::json!({
                "firebase_token": "assertion",
                "email": "x@example.com",
                "firebase_uid": "claimed-uid"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
    }

    #[actix_web::test]
    async fn test_google_complete_registration_once_then_conflict() {
        let verifier: Arc<dyn IdentityVerifier> = Arc::new(StaticVerifier {
            identity: FirebaseIdentity {
                uid: "uid-7".to_string(),
                email: Some("fresh@example.com".to_string()),
                name: None,
                email_verified: true,
            },
        });

        let mut created = sample_user(10, "fresh@example.com", Some("digest".to_string()));
        created.firebase_uid = Some("uid-7".to_string());

        // 1er appel: aucun compte, insertion réussie
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<users::Model>::new()])
            .append_query_results([vec![created.clone()]])
            .into_connection();

        let payload = serde_json::json!({
            "firebase_uid": "uid-7",
            "firebase_token": "assertion",
            "email": "fresh@example.com",
            "name": "Fresh User",
            "password": "secret123"
        });

        let app = init_app(db, Arc::clone(&verifier)).await;
        let req = test::TestRequest::post()
            .uri("/auth/google/complete-registration")
            .set_json(payload.clone())
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 201);

        // 2e appel: le compte existe désormais -> 400
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![created]])
            .into_connection();
        let app = init_app(db, verifier).await;
        let req = test::TestRequest::post()
            .uri("/auth/google/complete-registration")
            .set_json(payload)
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["error"], "User already exists");
    }

    #[actix_web::test]
    async fn test_google_verify_returns_claims_without_touching_accounts() {
        let verifier: Arc<dyn IdentityVerifier> = Arc::new(StaticVerifier {
            identity: FirebaseIdentity {
                uid: "uid-55".to_string(),
                email: Some("checked@example.com".to_string()),
                name: None,
                email_verified: true,
            },
        });

        // aucun résultat scripté: toute requête BD ferait échouer l'appel
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let app = init_app(db, verifier).await;
        let req = test::TestRequest::post()
            .uri("/auth/google/verify")
            .set_json(serde_json::json!({"token": "assertion"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);

        let body: serde_json::Value = test::read_body_json(resp).await;
        assert_eq!(body["valid"], true);
        assert_eq!(body["user"]["uid"], "uid-55");
        assert_eq!(body["user"]["email"], "checked@example.com");
        // le nom absent est renvoyé comme chaîne vide
        assert_eq!(body["user"]["name"], "");
        assert_eq!(body["user"]["email_verified"], true);
    }

    #[actix_web::test]
    async fn test_google_verify_bad_assertion_rejected() {
        let verifier: Arc<dyn IdentityVerifier> = Arc::new(RejectingVerifier);
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();

        let app = init_app(db, verifier).await;
        let req = test::TestRequest::post()
            .uri("/auth/google/verify")
            .set_json(serde_json::json!({"token": "forged"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
    }

    #[actix_web::test]
    async fn test_refresh_token_requires_auth() {
        let db = MockDatabase::new(DatabaseBackend::Postgres).into_connection();
        let app = init_app(db, noop_verifier()).await;
        let req = test::TestRequest::post()
            .uri("/auth/refresh-token")
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 401);
    }

    #[actix_web::test]
    async fn test_log_mailer_is_usable_as_trait_object() {
        let mailer: Arc<dyn Mailer> = Arc::new(LogMailer::new("noreply@accverse.com"));
        assert!(mailer.send("a@b.c", "subject", "body").await.is_ok());
    }
}
