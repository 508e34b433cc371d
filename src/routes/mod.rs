pub mod appointments;
pub mod auth;
pub mod calendar;
pub mod health;
pub mod invoices;
pub mod knowledge;
pub mod notifications;
pub mod payments;
pub mod services;
pub mod tax_forms;
pub mod user;

use actix_web::web;
use validator::Validate;

use crate::errors::ApiError;

pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(health::health_check)
            .configure(auth::auth_routes)
            .configure(user::user_routes)
            .configure(appointments::appointment_routes)
            .configure(services::service_routes)
            .configure(payments::payment_routes)
            .configure(invoices::invoice_routes)
            .configure(notifications::notification_routes)
            .configure(calendar::calendar_routes)
            .configure(knowledge::content_routes)
            .configure(tax_forms::tax_solutions_routes),
    );
}

/// Valide un DTO et convertit la première erreur en réponse 400
pub(crate) fn validate_dto<T: Validate>(dto: &T) -> Result<(), ApiError> {
    dto.validate().map_err(|errors| {
        let message = errors
            .field_errors()
            .values()
            .flat_map(|field| field.iter())
            .filter_map(|err| err.message.as_ref().map(ToString::to_string))
            .next()
            .unwrap_or_else(|| "Validation error".to_string());
        ApiError::Validation(message)
    })
}
