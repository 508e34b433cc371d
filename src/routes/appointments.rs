use actix_web::{HttpResponse, delete, get, post, put, web};
use chrono::{NaiveDate, NaiveTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::errors::ApiError;
use crate::middleware::AuthUser;
use crate::models::appointments::{self, Column as ApptColumn, Entity as Appointments};
use crate::models::services::Entity as Services;
use crate::models::users::Entity as Users;
use crate::routes::validate_dto;
use crate::services::mailer::Mailer;

// Créneaux réservables: un par heure, de 09:00 à 16:00 inclus
const FIRST_SLOT_HOUR: u32 = 9;
const LAST_SLOT_HOUR: u32 = 16;

#[derive(Deserialize, Validate)]
pub struct CreateAppointmentRequest {
    pub service_id: i32,
    #[validate(length(min = 1, message = "Date is required"))]
    pub date: String, // YYYY-MM-DD
    #[validate(length(min = 1, message = "Time is required"))]
    pub time: String, // HH:MM
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct UpdateAppointmentRequest {
    pub notes: Option<String>,
}

#[derive(Deserialize)]
pub struct AvailabilityQuery {
    pub date: String,
    #[allow(dead_code)]
    pub service_id: Option<i32>,
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

/// Créneaux horaires restants pour une journée, les réservations
/// non annulées occupant chacune leur heure
fn remaining_slots(booked: &[NaiveTime]) -> Vec<String> {
    (FIRST_SLOT_HOUR..=LAST_SLOT_HOUR)
        .filter_map(|hour| NaiveTime::from_hms_opt(hour, 0, 0))
        .filter(|slot| !booked.contains(slot))
        .map(|slot| slot.format("%H:%M").to_string())
        .collect()
}

async fn notify(mailer: &dyn Mailer, email: Option<&str>, subject: &str, body: &str) {
    if let Some(to) = email {
        if let Err(e) = mailer.send(to, subject, body).await {
            tracing::error!(to = %to, error = %e, "failed to send appointment email");
        }
    }
}

/// GET /appointments - Rendez-vous de l'utilisateur, du plus récent au plus ancien (PROTÉGÉE)
#[get("")]
pub async fn list_appointments(
    auth_user: AuthUser,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ApiError> {
    let rows = Appointments::find()
        .filter(ApptColumn::UserId.eq(auth_user.user_id))
        .order_by_desc(ApptColumn::AppointmentDate)
        .order_by_desc(ApptColumn::AppointmentTime)
        .find_also_related(Services)
        .all(db.get_ref())
        .await?;

    let appointments: Vec<serde_json::Value> = rows
        .into_iter()
        .map(|(appt, service)| {
            let mut value = serde_json::to_value(&appt).unwrap_or_default();
            if let Some(obj) = value.as_object_mut() {
                obj.insert(
                    "service_name".to_string(),
                    service
                        .map(|s| serde_json::Value::String(s.name))
                        .unwrap_or(serde_json::Value::Null),
                );
            }
            value
        })
        .collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({ "appointments": appointments })))
}

/// POST /appointments - Réserver un créneau (PROTÉGÉE)
#[post("")]
pub async fn create_appointment(
    auth_user: AuthUser,
    body: web::Json<CreateAppointmentRequest>,
    db: web::Data<DatabaseConnection>,
    mailer: web::Data<dyn Mailer>,
) -> Result<HttpResponse, ApiError> {
    validate_dto(&*body)?;
    let date = parse_date(&body.date)?;
    let time = parse_time(&body.time)?;

    // 1. Le service doit exister
    let service = Services::find_by_id(body.service_id)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound("Service not found".to_string()))?;

    // 2. Le créneau doit être libre (les rendez-vous annulés ne comptent pas)
    let taken = Appointments::find()
        .filter(ApptColumn::AppointmentDate.eq(date))
        .filter(ApptColumn::AppointmentTime.eq(time))
        .filter(ApptColumn::Status.ne("cancelled"))
        .one(db.get_ref())
        .await?;
    if taken.is_some() {
        return Err(ApiError::Conflict(
            "This time slot is already booked".to_string(),
        ));
    }

    // 3. Créer le rendez-vous en attente de confirmation
    let appointment = appointments::ActiveModel {
        user_id: Set(auth_user.user_id),
        service_id: Set(body.service_id),
        appointment_date: Set(date),
        appointment_time: Set(time),
        notes: Set(body.notes.clone()),
        status: Set("pending".to_string()),
        created_at: Set(Some(Utc::now())),
        ..Default::default()
    }
    .insert(db.get_ref())
    .await?;

    info!(
        appointment_id = appointment.id,
        user_id = auth_user.user_id,
        "appointment booked"
    );

    let body_text = format!(
        "Your appointment for {} on {} at {} has been received and is pending confirmation.",
        service.name, body.date, body.time
    );
    notify(
        mailer.as_ref(),
        auth_user.email.as_deref(),
        "Appointment Confirmation",
        &body_text,
    )
    .await;

    Ok(HttpResponse::Created().json(serde_json::json!({
        "message": "Appointment booked successfully",
        "appointment": appointment
    })))
}

/// GET /appointments/available?date=&service_id= - Créneaux libres (PROTÉGÉE)
#[get("/available")]
pub async fn available_slots(
    _auth_user: AuthUser,
    query: web::Query<AvailabilityQuery>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ApiError> {
    let date = parse_date(&query.date)?;

    let booked: Vec<NaiveTime> = Appointments::find()
        .filter(ApptColumn::AppointmentDate.eq(date))
        .filter(ApptColumn::Status.ne("cancelled"))
        .all(db.get_ref())
        .await?
        .into_iter()
        .map(|appt| appt.appointment_time)
        .collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "date": query.date,
        "available_slots": remaining_slots(&booked)
    })))
}

/// GET /appointments/{id} - Détail d'un rendez-vous (PROTÉGÉE)
#[get("/{id}")]
pub async fn appointment_details(
    auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();

    let (appointment, service) = Appointments::find_by_id(id)
        .find_also_related(Services)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound("Appointment not found".to_string()))?;

    if appointment.user_id != auth_user.user_id && !auth_user.is_admin() {
        return Err(ApiError::Forbidden);
    }

    let client = Users::find_by_id(appointment.user_id)
        .one(db.get_ref())
        .await?
        .map(|u| serde_json::json!({ "name": u.name, "email": u.email, "phone": u.phone }));

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "appointment": appointment,
        "service": service,
        "client": client
    })))
}

/// PUT /appointments/{id} - Modifier les notes d'un rendez-vous en attente (PROTÉGÉE)
#[put("/{id}")]
pub async fn update_appointment(
    auth_user: AuthUser,
    path: web::Path<i32>,
    body: web::Json<UpdateAppointmentRequest>,
    db: web::Data<DatabaseConnection>,
    mailer: web::Data<dyn Mailer>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();

    let appointment = Appointments::find_by_id(id)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound("Appointment not found".to_string()))?;

    if appointment.user_id != auth_user.user_id && !auth_user.is_admin() {
        return Err(ApiError::Forbidden);
    }
    // Seuls les rendez-vous en attente sont modifiables
    if appointment.status != "pending" {
        return Err(ApiError::Validation(
            "Only pending appointments can be updated".to_string(),
        ));
    }

    let mut active: appointments::ActiveModel = appointment.into();
    active.notes = Set(body.notes.clone());
    let updated = active.update(db.get_ref()).await?;

    notify(
        mailer.as_ref(),
        auth_user.email.as_deref(),
        "Appointment Updated",
        "Your appointment details have been updated.",
    )
    .await;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Appointment updated successfully",
        "appointment": updated
    })))
}

/// DELETE /appointments/{id} - Annuler un rendez-vous (PROTÉGÉE)
/// Annulation logique: le statut passe à 'cancelled', la ligne est conservée
#[delete("/{id}")]
pub async fn cancel_appointment(
    auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
    mailer: web::Data<dyn Mailer>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();

    let appointment = Appointments::find_by_id(id)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound("Appointment not found".to_string()))?;

    if appointment.user_id != auth_user.user_id && !auth_user.is_admin() {
        return Err(ApiError::Forbidden);
    }
    if appointment.status == "cancelled" || appointment.status == "completed" {
        return Err(ApiError::Validation(
            "This appointment can no longer be cancelled".to_string(),
        ));
    }

    let mut active: appointments::ActiveModel = appointment.into();
    active.status = Set("cancelled".to_string());
    active.update(db.get_ref()).await?;

    info!(appointment_id = id, "appointment cancelled");

    notify(
        mailer.as_ref(),
        auth_user.email.as_deref(),
        "Appointment Cancelled",
        "Your appointment has been cancelled.",
    )
    .await;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Appointment cancelled successfully"
    })))
}

pub fn appointment_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/appointments")
            .service(list_appointments)
            .service(create_appointment)
            // /available avant /{id} pour éviter la capture par le paramètre
            .service(available_slots)
            .service(appointment_details)
            .service(update_appointment)
            .service(cancel_appointment),
    );
}
