use actix_web::{HttpResponse, delete, get, post, put, web};
use chrono::{NaiveDate, NaiveTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, ModelTrait, QueryFilter,
    QueryOrder, Set,
};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::errors::ApiError;
use crate::middleware::AuthUser;
use crate::models::calendar_events::{self, Column as EventColumn, Entity as CalendarEvents};
use crate::routes::validate_dto;

#[derive(Deserialize, Validate)]
pub struct CreateEventRequest {
    #[validate(length(min = 1, message = "Title is required"))]
    pub title: String,
    pub description: Option<String>,
    #[validate(length(min = 1, message = "Event date is required"))]
    pub event_date: String, // YYYY-MM-DD
    #[validate(length(min = 1, message = "Start time is required"))]
    pub start_time: String, // HH:MM
    #[validate(length(min = 1, message = "End time is required"))]
    pub end_time: String,
    pub location: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateEventRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
}

fn parse_date(raw: &str) -> Result<NaiveDate, ApiError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|_| ApiError::Validation("Invalid date format, expected YYYY-MM-DD".to_string()))
}

fn parse_time(raw: &str) -> Result<NaiveTime, ApiError> {
    NaiveTime::parse_from_str(raw, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(raw, "%H:%M:%S"))
        .map_err(|_| ApiError::Validation("Invalid time format, expected HH:MM".to_string()))
}

/// GET /calendar/events - Événements de l'utilisateur (PROTÉGÉE)
#[get("/events")]
pub async fn list_events(
    auth_user: AuthUser,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ApiError> {
    let events = CalendarEvents::find()
        .filter(EventColumn::UserId.eq(auth_user.user_id))
        .order_by_asc(EventColumn::EventDate)
        .order_by_asc(EventColumn::StartTime)
        .all(db.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "events": events })))
}

/// POST /calendar/events - Créer un événement (PROTÉGÉE)
#[post("/events")]
pub async fn create_event(
    auth_user: AuthUser,
    body: web::Json<CreateEventRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ApiError> {
    validate_dto(&*body)?;
    let event_date = parse_date(&body.event_date)?;
    let start_time = parse_time(&body.start_time)?;
    let end_time = parse_time(&body.end_time)?;

    if end_time <= start_time {
        return Err(ApiError::Validation(
            "End time must be after start time".to_string(),
        ));
    }

    let event = calendar_events::ActiveModel {
        user_id: Set(auth_user.user_id),
        title: Set(body.title.clone()),
        description: Set(body.description.clone()),
        event_date: Set(event_date),
        start_time: Set(start_time),
        end_time: Set(end_time),
        location: Set(body.location.clone()),
        created_at: Set(Some(Utc::now())),
        ..Default::default()
    }
    .insert(db.get_ref())
    .await?;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "message": "Event created successfully",
        "event": event
    })))
}

/// GET /calendar/sync - Synchronisation avec le calendrier externe (PROTÉGÉE)
/// L'intégration réelle n'est pas branchée: réponse simulée
#[get("/sync")]
pub async fn sync_calendar(auth_user: AuthUser) -> HttpResponse {
    info!(user_id = auth_user.user_id, "calendar sync requested");
    HttpResponse::Ok().json(serde_json::json!({
        "message": "Calendar synchronized successfully",
        "synced_events": 0
    }))
}

/// PUT /calendar/events/{id} - Modifier un événement (PROTÉGÉE, propriétaire ou admin)
#[put("/events/{id}")]
pub async fn update_event(
    auth_user: AuthUser,
    path: web::Path<i32>,
    body: web::Json<UpdateEventRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();

    let event = CalendarEvents::find_by_id(id)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound("Event not found".to_string()))?;
    if event.user_id != auth_user.user_id && !auth_user.is_admin() {
        return Err(ApiError::Forbidden);
    }

    let mut active: calendar_events::ActiveModel = event.into();
    if let Some(title) = &body.title {
        active.title = Set(title.clone());
    }
    if let Some(description) = &body.description {
        active.description = Set(Some(description.clone()));
    }
    if let Some(location) = &body.location {
        active.location = Set(Some(location.clone()));
    }
    let updated = active.update(db.get_ref()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Event updated successfully",
        "event": updated
    })))
}

/// DELETE /calendar/events/{id} - Supprimer un événement (PROTÉGÉE, propriétaire ou admin)
#[delete("/events/{id}")]
pub async fn delete_event(
    auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();

    let event = CalendarEvents::find_by_id(id)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound("Event not found".to_string()))?;
    if event.user_id != auth_user.user_id && !auth_user.is_admin() {
        return Err(ApiError::Forbidden);
    }

    event.delete(db.get_ref()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Event deleted successfully"
    })))
}

pub fn calendar_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/calendar")
            .service(list_events)
            .service(create_event)
            .service(sync_calendar)
            .service(update_event)
            .service(delete_event),
    );
}
