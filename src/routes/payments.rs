use actix_web::{HttpResponse, get, post, web};
use chrono::Utc;
use rust_decimal::Decimal;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use serde::Deserialize;
use tracing::info;
use validator::Validate;

use crate::errors::ApiError;
use crate::middleware::AuthUser;
use crate::models::invoices::{self, Entity as Invoices};
use crate::models::payments::{self, Column as PaymentColumn, Entity as Payments};
use crate::routes::validate_dto;

#[derive(Deserialize, Validate)]
pub struct CreatePaymentRequest {
    pub amount: Decimal,
    #[validate(length(min = 1, message = "Payment method is required"))]
    pub payment_method: String,
    pub description: Option<String>,
    pub invoice_id: Option<i32>,
}

// Callback du prestataire de paiement, identifié par la référence unique
#[derive(Deserialize, Validate)]
pub struct WebhookRequest {
    #[validate(length(min = 1, message = "Payment reference is required"))]
    pub reference: String,
    #[validate(length(min = 1, message = "Status is required"))]
    pub status: String,
    pub transaction_id: Option<String>,
}

async fn mark_invoice_paid(db: &DatabaseConnection, invoice_id: i32) -> Result<(), ApiError> {
    if let Some(invoice) = Invoices::find_by_id(invoice_id).one(db).await? {
        let mut active: invoices::ActiveModel = invoice.into();
        active.status = Set("paid".to_string());
        active.updated_at = Set(Some(Utc::now()));
        active.update(db).await?;
    }
    Ok(())
}

/// GET /payments - Paiements de l'utilisateur, les plus récents d'abord (PROTÉGÉE)
#[get("")]
pub async fn list_payments(
    auth_user: AuthUser,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ApiError> {
    let payments = Payments::find()
        .filter(PaymentColumn::UserId.eq(auth_user.user_id))
        .order_by_desc(PaymentColumn::CreatedAt)
        .all(db.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "payments": payments })))
}

/// POST /payments - Enregistrer un paiement (PROTÉGÉE)
/// Référence: PAY-<horodatage>-<user_id>. Si le paiement vise une facture,
/// celle-ci doit appartenir à l'utilisateur (un admin peut payer pour autrui)
#[post("")]
pub async fn create_payment(
    auth_user: AuthUser,
    body: web::Json<CreatePaymentRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ApiError> {
    validate_dto(&*body)?;

    // 1. Contrôle de propriété quand une facture est visée
    if let Some(invoice_id) = body.invoice_id {
        let invoice = Invoices::find_by_id(invoice_id)
            .one(db.get_ref())
            .await?
            .ok_or_else(|| ApiError::NotFound("Invoice not found".to_string()))?;
        if invoice.user_id != auth_user.user_id && !auth_user.is_admin() {
            return Err(ApiError::Forbidden);
        }
    }

    // 2. Enregistrer le paiement avec sa référence unique
    let reference = format!("PAY-{}-{}", Utc::now().timestamp(), auth_user.user_id);
    let payment = payments::ActiveModel {
        user_id: Set(auth_user.user_id),
        invoice_id: Set(body.invoice_id),
        amount: Set(body.amount),
        description: Set(body.description.clone()),
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

    // 3. Une facture payée directement passe au statut 'paid'
    if let Some(invoice_id) = body.invoice_id {
        mark_invoice_paid(db.get_ref(), invoice_id).await?;
    }

    info!(payment_id = payment.id, reference = %payment.reference, "payment recorded");

    Ok(HttpResponse::Created().json(serde_json::json!({
        "message": "Payment recorded successfully",
        "payment": payment
    })))
}

/// POST /payments/webhook - Callback du prestataire de paiement (PUBLIC)
#[post("/webhook")]
pub async fn payment_webhook(
    body: web::Json<WebhookRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ApiError> {
    validate_dto(&*body)?;

    // 1. Retrouver le paiement par sa référence
    let payment = Payments::find()
        .filter(PaymentColumn::Reference.eq(&body.reference))
        .one(db.get_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound("Payment not found".to_string()))?;

    let invoice_id = payment.invoice_id;

    // 2. Reporter le statut et l'identifiant de transaction du prestataire
    let mut active: payments::ActiveModel = payment.into();
    active.status = Set(body.status.clone());
    active.transaction_id = Set(body.transaction_id.clone());
    active.updated_at = Set(Some(Utc::now()));
    active.update(db.get_ref()).await?;

    // 3. Un paiement confirmé solde sa facture
    if body.status == "completed" {
        if let Some(invoice_id) = invoice_id {
            mark_invoice_paid(db.get_ref(), invoice_id).await?;
        }
    }

    info!(reference = %body.reference, status = %body.status, "payment webhook processed");

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "message": "Payment status updated"
    })))
}

/// GET /payments/{id} - Détail d'un paiement (PROTÉGÉE)
#[get("/{id}")]
pub async fn payment_details(
    auth_user: AuthUser,
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();

    let payment = Payments::find_by_id(id)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound("Payment not found".to_string()))?;

    if payment.user_id != auth_user.user_id && !auth_user.is_admin() {
        return Err(ApiError::Forbidden);
    }

    Ok(HttpResponse::Ok().json(serde_json::json!({ "payment": payment })))
}

pub fn payment_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/payments")
            .service(list_payments)
            .service(create_payment)
            // /webhook avant /{id} pour éviter la capture par le paramètre
            .service(payment_webhook)
            .service(payment_details),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::jwt::TokenService;
    use actix_web::{App, test};
    use sea_orm::{DatabaseBackend, MockDatabase};

    fn sample_payment(id: i32, user_id: i32) -> payments::Model {
        payments::Model {
            id,
            user_id,
            invoice_id: None,
            amount: Decimal::new(15000, 2),
            description: None,
            payment_method: "card".to_string(),
            reference: format!("PAY-1700000000-{}", user_id),
            transaction_id: None,
            status: "pending".to_string(),
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
                .configure(payment_routes),
        )
        .await
    }

    #[actix_web::test]
    async fn test_webhook_unknown_reference_404() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<payments::Model>::new()])
            .into_connection();

        let app = init_app(db).await;
        let req = test::TestRequest::post()
            .uri("/payments/webhook")
            .set_json(serde_json::json!({
                "reference": "PAY-0-0",
                "status": "completed"
            }))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);
    }

    #[actix_web::test]
    async fn test_payment_details_other_user_forbidden() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sample_payment(1, 42)]])
            .into_connection();

        let tokens = TokenService::new("test-secret");
        let token = tokens.issue(7, None, Some("client"), 24).unwrap();

        let app = init_app(db).await;
        let req = test::TestRequest::get()
            .uri("/payments/1")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 403);
    }

    #[actix_web::test]
    async fn test_payment_details_admin_bypass() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([vec![sample_payment(1, 42)]])
            .into_connection();

        let tokens = TokenService::new("test-secret");
        let token = tokens.issue(7, None, Some("admin"), 24).unwrap();

        let app = init_app(db).await;
        let req = test::TestRequest::get()
            .uri("/payments/1")
            .insert_header(("Authorization", format!("Bearer {}", token)))
            .to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 200);
    }
}
