use actix_web::{HttpResponse, get, put, web};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, Set};
use serde::Deserialize;
use validator::Validate;

use crate::errors::ApiError;
use crate::middleware::AuthUser;
use crate::models::users::{self, Entity as Users};
use crate::routes::validate_dto;

#[derive(Deserialize, Validate)]
pub struct UpdateProfileRequest {
    #[validate(length(min = 1, message = "Name is required"))]
    pub name: String,
    pub phone: Option<String>,
    pub address: Option<String>,
}

/// GET /user/me - Profil de l'utilisateur connecté (PROTÉGÉE)
#[get("/me")]
pub async fn get_profile(
    auth_user: AuthUser,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ApiError> {
    let user = Users::find_by_id(auth_user.user_id)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    // Les colonnes secrètes (digest, tokens) sont exclues par la sérialisation
    Ok(HttpResponse::Ok().json(serde_json::json!({ "user": user })))
}

/// PUT /user/me - Mettre à jour le profil (PROTÉGÉE)
#[put("/me")]
pub async fn update_profile(
    auth_user: AuthUser,
    body: web::Json<UpdateProfileRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ApiError> {
    validate_dto(&*body)?;

    let user = Users::find_by_id(auth_user.user_id)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".to_string()))?;

    let mut active: users::ActiveModel = user.into();
    active.name = Set(body.name.clone());
    if let Some(phone) = &body.phone {
        active.phone = Set(Some(phone.clone()));
    }
    if let Some(address) = &body.address {
        active.address = Set(Some(address.clone()));
    }
    active.updated_at = Set(Some(Utc::now()));
    let updated = active.update(db.get_ref()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Profile updated successfully",
        "user": updated
    })))
}

pub fn user_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/user")
            .service(get_profile)
            .service(update_profile),
    );
}
