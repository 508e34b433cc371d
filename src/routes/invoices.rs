use actix_web::{HttpResponse, get, post, web};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::errors::ApiError;
use crate::middleware::AuthUser;
use crate::models::invoice_items::{Column as ItemColumn, Entity as InvoiceItems};
use crate::models::invoices::{self, Column as InvoiceColumn, Entity as Invoices};
use crate::models::payments::{self, Column as PaymentColumn, Entity as Payments};
use crate::routes::validate_dto;

#[derive(Deserialize, Validate)]
pub struct PayInvoiceRequest {
    #[validate(length(min = 1, message = "Payment method is required"))]
    pub payment_method: String,
}

/// GET /invoices - Factures de l'utilisateur, les plus récentes d'abord (PROTÉGÉE)
#[get("")]
pub async fn list_invoices(
    auth_user: AuthUser,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ApiError> {
    let invoices = Invoices::find()
        .filter(InvoiceColumn::UserId.eq(auth_user.user_id))
        .order_by_desc(InvoiceColumn::CreatedAt)
        .all(db.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "invoices": invoices })))
}

/// GET /invoices/{id} - Détail d'une facture avec lignes et paiements (PROTÉGÉE)
#[get("/{id}")]
pub async fn invoice_details(
    auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();

    let invoice = Invoices::find_by_id(id)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound("Invoice not found".to_string()))?;

    if invoice.user_id != auth_user.user_id && !auth_user.is_admin() {
        return Err(ApiError::Forbidden);
    }

    let items = InvoiceItems::find()
        .filter(ItemColumn::InvoiceId.eq(id))
        .all(db.get_ref())
        .await?;
    let payments = Payments::find()
        .filter(PaymentColumn::InvoiceId.eq(id))
        .all(db.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "invoice": invoice,
        "items": items,
        "payments": payments
    })))
}

/// POST /invoices/{id}/pay - Régler une facture (PROTÉGÉE)
/// Enregistre un paiement 'completed' avec la référence INV-<id>-<horodatage>
/// puis passe la facture au statut 'paid'
#[post("/{id}/pay")]
pub async fn pay_invoice(
    auth_user: AuthUser,
    path: web::Path<i32>,
    body: web::Json<PayInvoiceRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ApiError> {
    validate_dto(&*body)?;
    let id = path.into_inner();

    // 1. La facture doit exister et appartenir à l'utilisateur (ou admin)
    let invoice = Invoices::find_by_id(id)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound("Invoice not found".to_string()))?;
    if invoice.user_id != auth_user.user_id && !auth_user.is_admin() {
        return Err(ApiError::Forbidden);
    }
    if invoice.status == "paid" {
        return Err(ApiError::Validation(
            "This invoice is already paid".to_string(),
        ));
    }

    // 2. Enregistrer le paiement au nom du propriétaire de la facture
    let reference = format!("INV-{}-{}", id, Utc::now().timestamp());
    let payment = payments::ActiveModel {
        user_id: Set(invoice.user_id),
        invoice_id: Set(Some(id)),
        amount: Set(invoice.total_amount),
        description: Set(Some(format!("Payment for invoice #{}", id))),
        payment_method: Set(body.payment_method.clone()),
        reference: Set(reference),
        transaction_id: Set(None),
        status: Set("completed".to_string()),
        created_at: Set(Some(Utc::now())),
        updated_at: Set(Some(Utc::now())),
        ..Default::default()
    }
    .insert(db.get_ref())
    .await?;

    // 3. Solder la facture
    let mut active: invoices::ActiveModel = invoice.into();
    active.status = Set("paid".to_string());
    active.updated_at = Set(Some(Utc::now()));
    active.update(db.get_ref()).await?;

    info!(invoice_id = id, payment_id = payment.id, "invoice paid");

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Invoice paid successfully",
        "payment": payment
    })))
}

pub fn invoice_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/invoices")
            .service(list_invoices)
            .service(invoice_details)
            .service(pay_invoice),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::jwt::TokenService;
    use actix_web::{App, test};
    use rust_decimal::Decimal;
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn sample_invoice(id: i32, user_id: i32, status: &str) -> invoices::Model {
        invoices::Model {
            id,
            user_id,
            total_amount: Decimal::new(25000, 2),
            status: status.to_string(),
            due_date: None,
            created_at: None,
            updated_at: None,
        }
    }

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
                .configure(invoice_routes),
        )
        .await
    }

    #[actix_web::test]
    async fn test_pay_already_paid_invoice_rejected() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sample_invoice(1, 7, "paid")]])
            .into_connection();

        let tokens = TokenService::new("test-secret");
        let token = tokens.issue(7, None, Some("client"), 24).unwrap();

        let app = init_app(db).await;
        let req = test::TestRequest::post()
            .uri("/invoices/1/pay")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .set_json(serde_json::json!({"payment_method": "card"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 400);
    }

    #[actix_web::test]
    async fn test_pay_other_users_invoice_forbidden() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sample_invoice(1, 42, "unpaid")]])
            .into_connection();

        let tokens = TokenService::new("test-secret");
        let token = tokens.issue(7, None, Some("client"), 24).unwrap();

        let app = init_app(db).await;
        let req = test::TestRequest::post()
            .uri("/invoices/1/pay")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .set_json(serde_json::json!({"payment_method": "card"}))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 403);
    }
}
