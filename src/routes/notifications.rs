use actix_web::{HttpResponse, get, post, put, web};
use chrono::Utc;
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
    sea_query::OnConflict,
};
use serde::Deserialize;

use crate::errors::ApiError;
use crate::middleware::AuthUser;
use crate::models::notification_preferences::{
    self, Column as PrefColumn, Entity as NotificationPreferences,
};
use crate::models::notifications::{Column as NotifColumn, Entity as Notifications};

#[derive(Deserialize)]
pub struct SettingsRequest {
    pub email_notifications: Option<bool>,
    pub sms_notifications: Option<bool>,
    pub appointment_reminders: Option<bool>,
    pub payment_notifications: Option<bool>,
}

/// GET /notifications - Notifications de l'utilisateur, les plus récentes d'abord (PROTÉGÉE)
#[get("")]
pub async fn list_notifications(
    auth_user: AuthUser,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ApiError> {
    let notifications = Notifications::find()
        .filter(NotifColumn::UserId.eq(auth_user.user_id))
        .order_by_desc(NotifColumn::CreatedAt)
        .all(db.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "notifications": notifications })))
}

/// PUT /notifications/{id}/read - Marquer une notification comme lue (PROTÉGÉE)
/// Le filtre inclut user_id: on ne peut pas marquer la notification d'autrui
#[put("/{id}/read")]
pub async fn mark_as_read(
    auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();

    let result = Notifications::update_many()
        .col_expr(NotifColumn::IsRead, sea_orm::sea_query::Expr::value(true))
        .filter(NotifColumn::Id.eq(id))
        .filter(NotifColumn::UserId.eq(auth_user.user_id))
        .exec(db.get_ref())
        .await?;

    if result.rows_affected == 0 {
        return Err(ApiError::NotFound("Notification not found".to_string()));
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Notification marked as read"
    })))
}

/// POST /notifications/settings - Préférences de notification (PROTÉGÉE)
/// Upsert sur la clé unique user_id: une ligne de préférences par utilisateur
#[post("/settings")]
pub async fn update_settings(
    auth_user: AuthUser,
    body: web::Json<SettingsRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ApiError> {
    let record = notification_preferences::ActiveModel {
        user_id: Set(auth_user.user_id),
        email_notifications: Set(body.email_notifications.unwrap_or(true)),
        sms_notifications: Set(body.sms_notifications),
        appointment_reminders: Set(body.appointment_reminders.unwrap_or(true)),
        payment_notifications: Set(body.payment_notifications.unwrap_or(true)),
        created_at: Set(Some(Utc::now())),
        updated_at: Set(Some(Utc::now())),
        ..Default::default()
    };

    NotificationPreferences::insert(record)
        .on_conflict(
            OnConflict::column(PrefColumn::UserId)
                .update_columns([
                    PrefColumn::EmailNotifications,
                    PrefColumn::SmsNotifications,
                    PrefColumn::AppointmentReminders,
                    PrefColumn::PaymentNotifications,
                    PrefColumn::UpdatedAt,
                ])
                .to_owned(),
        )
        .exec(db.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Notification settings updated"
    })))
}

pub fn notification_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/notifications")
            .service(list_notifications)
            .service(mark_as_read)
            .service(update_settings),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::jwt::TokenService;
    use actix_web::{App, test};
    use sea_orm::{DatabaseBackend, MockDatabase, MockExecResult};

    async fn init_app(
        db: sea_orm::DatabaseConnection,
    ) -> impl actix_web::dev::Service<
        actix_http::Request,
        Response = actix_web::dev::ServiceResponse,
        Error = actix_web::Error,
    > {
        test::init_service(
            App::new()
                .app_data(web::Data::new(db))
                .app_data(web::Data::new(TokenService::new("test-secret")))
                .configure(notification_routes),
        )
        .await
    }

    #[actix_web::test]
    async fn test_mark_as_read_nothing_matched_404() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 0,
            }])
            .into_connection();

        let tokens = TokenService::new("test-secret");
        let token = tokens.issue(7, None, None, 24).unwrap();

        let app = init_app(db).await;
        let req = test::TestRequest::put()
            .uri("/notifications/99/read")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);
    }

    #[actix_web::test]
    async fn test_mark_as_read_own_notification() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_exec_results([MockExecResult {
                last_insert_id: 0,
                rows_affected: 1,
            }])
            .into_connection();

        let tokens = TokenService::new("test-secret");
        let token = tokens.issue(7, None, None, 24).unwrap();

        let app = init_app(db).await;
        let req = test::TestRequest::put()
            .uri("/notifications/5/read")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
    }
}
