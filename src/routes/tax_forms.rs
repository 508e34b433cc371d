use actix_web::{HttpResponse, get, post, web};
use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
};
use serde::Deserialize;
use tracing::{error, info};
use uuid::Uuid;
use validator::Validate;

use crate::errors::ApiError;
use crate::middleware::AuthUser;
use crate::models::engagement_letters;
use crate::models::notifications;
use crate::models::tax_form_files;
use crate::models::tax_form_templates::{
    Column as TemplateColumn, Entity as TaxFormTemplates,
};
use crate::models::tax_forms::{self, Entity as TaxForms};
use crate::models::users::{Column as UserColumn, Entity as Users};
use crate::routes::validate_dto;

// Soumission d'un formulaire fiscal multi-étapes. Le payload JSON est stocké
// tel quel; seuls les champs requis du type de formulaire sont contrôlés.
#[derive(Deserialize, Validate)]
pub struct SubmitFormRequest {
    #[serde(rename = "formType")]
    #[validate(length(min = 1, message = "Form type is required"))]
    pub form_type: String,
    #[serde(rename = "formData")]
    pub form_data: serde_json::Value,
    // Métadonnées des pièces jointes (le stockage physique est hors périmètre)
    pub files: Option<serde_json::Value>,
}

#[derive(Deserialize, Validate)]
pub struct CompletePaymentRequest {
    #[serde(rename = "formId")]
    #[validate(length(min = 1, message = "Missing required fields"))]
    pub form_id: String,
    #[serde(rename = "paymentStatus")]
    #[validate(length(min = 1, message = "Missing required fields"))]
    pub payment_status: String,
}

#[derive(Deserialize, Validate)]
pub struct SaveProgressRequest {
    #[serde(rename = "formId")]
    pub form_id: Option<String>,
    #[serde(rename = "formType")]
    #[validate(length(min = 1, message = "Missing form type"))]
    pub form_type: String,
    #[serde(rename = "formData")]
    pub form_data: serde_json::Value,
}

/// Champs requis selon le type de formulaire
fn required_fields(form_type: &str) -> &'static [&'static str] {
    match form_type {
        "engagement" => &[
            "date",
            "entityType",
            "streetAddress",
            "suburb",
            "state",
            "postcode",
            "signature",
        ],
        "smsf-establishment" => &["contactName", "email", "proposedFundName", "trusteeDeclaration"],
        "company-registration" => &[
            "preferredCompanyName",
            "registeredOfficeAddress",
            "businessActivity",
        ],
        "smsf" => &["firstName", "lastName", "signature"],
        "business" => &["entityName"],
        _ => &[],
    }
}

fn first_missing_field(form_type: &str, form_data: &serde_json::Value) -> Option<&'static str> {
    required_fields(form_type).iter().copied().find(|field| {
        match form_data.get(field) {
            None | Some(serde_json::Value::Null) => true,
            Some(serde_json::Value::String(s)) => s.is_empty(),
            Some(_) => false,
        }
    })
}

/// Libellé client affiché dans la notification aux admins
fn client_label(form_type: &str, form_data: &serde_json::Value) -> String {
    let text = |key: &str| {
        form_data
            .get(key)
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string()
    };
    match form_type {
        "engagement" => {
            let entity = form_data
                .get("entityType")
                .and_then(|v| v.as_str())
                .unwrap_or("unknown");
            format!("Client for {} entity", entity)
        }
        "smsf-establishment" => {
            let name = text("contactName");
            if name.is_empty() {
                "Unknown client".to_string()
            } else {
                name
            }
        }
        "company-registration" => {
            let name = form_data
                .get("preferredCompanyName")
                .and_then(|v| v.as_str())
                .unwrap_or("Unknown");
            format!("Company {}", name)
        }
        "smsf" => format!("{} {}", text("firstName"), text("lastName")),
        "business" => {
            let name = form_data
                .get("entityName")
                .and_then(|v| v.as_str())
                .unwrap_or("Unknown");
            format!("{} business", name)
        }
        _ => "Client".to_string(),
    }
}

fn fiscal_year_of(form_data: &serde_json::Value) -> Option<String> {
    form_data
        .get("fiscalYear")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

// Les admins sont prévenus de chaque soumission; un échec ici
// ne fait pas échouer la soumission elle-même
async fn notify_admins(
    db: &DatabaseConnection,
    form_type: &str,
    form_data: &serde_json::Value,
) -> Result<(), sea_orm::DbErr> {
    let admins = Users::find()
        .filter(UserColumn::Role.eq("admin"))
        .all(db)
        .await?;

    let pretty_type = form_type.replace('-', " ");
    let title = format!("New {} Form Submission", titlecase(&pretty_type));
    let message = format!(
        "{} has submitted a new {} form.",
        client_label(form_type, form_data),
        pretty_type
    );

    for admin in admins {
        notifications::ActiveModel {
            user_id: Set(admin.id),
            title: Set(title.clone()),
            message: Set(message.clone()),
            kind: Set("tax_form".to_string()),
            is_read: Set(false),
            created_at: Set(Some(Utc::now())),
            ..Default::default()
        }
        .insert(db)
        .await?;
    }
    Ok(())
}

fn titlecase(text: &str) -> String {
    text.split(' ')
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// GET /tax-solutions/templates - Gabarits de formulaires actifs (PUBLIC)
#[get("/templates")]
pub async fn list_templates(db: web::Data<DatabaseConnection>) -> Result<HttpResponse, ApiError> {
    let templates = TaxFormTemplates::find()
        .filter(TemplateColumn::IsActive.eq(true))
        .all(db.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "templates": templates })))
}

/// POST /tax-solutions/submit - Soumettre un formulaire (authentification FACULTATIVE)
/// La soumission anonyme est permise: user_id reste NULL
#[post("/submit")]
pub async fn submit_form(
    auth_user: Option<AuthUser>,
    body: web::Json<SubmitFormRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ApiError> {
    validate_dto(&*body)?;

    // 1. Champs requis selon le type de formulaire
    if let Some(field) = first_missing_field(&body.form_type, &body.form_data) {
        return Err(ApiError::Validation(format!(
            "Missing required field: {}",
            field
        )));
    }

    // 2. Enregistrer la soumission avec un id uuid généré côté serveur
    let form_id = Uuid::new_v4().to_string();
    tax_forms::ActiveModel {
        id: Set(form_id.clone()),
        user_id: Set(auth_user.as_ref().map(|u| u.user_id)),
        form_type: Set(Some(body.form_type.clone())),
        form_data: Set(body.form_data.clone()),
        fiscal_year_end: Set(fiscal_year_of(&body.form_data)),
        status: Set("submitted".to_string()),
        payment_status: Set(None),
        created_at: Set(Some(Utc::now())),
        updated_at: Set(Some(Utc::now())),
    }
    .insert(db.get_ref())
    .await?;

    // 3. Métadonnées des pièces jointes, une ligne pour toutes
    if let Some(files) = &body.files {
        let has_entries = files.as_array().map(|a| !a.is_empty()).unwrap_or(false);
        if has_entries {
            tax_form_files::ActiveModel {
                tax_form_id: Set(form_id.clone()),
                files: Set(files.clone()),
                form_type: Set(Some(body.form_type.clone())),
                ..Default::default()
            }
            .insert(db.get_ref())
            .await?;
        }
    }

    // 4. Notifier les admins (best effort)
    if let Err(e) = notify_admins(db.get_ref(), &body.form_type, &body.form_data).await {
        error!(error = %e, "failed to create admin notifications");
    }

    info!(form_id = %form_id, form_type = %body.form_type, "tax form submitted");

    Ok(HttpResponse::Created().json(serde_json::json!({
        "success": true,
        "message": "Form submitted successfully",
        "form_id": form_id
    })))
}

/// POST /tax-solutions/complete-payment - Reporter le statut de paiement (PUBLIC)
#[post("/complete-payment")]
pub async fn complete_payment(
    body: web::Json<CompletePaymentRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ApiError> {
    validate_dto(&*body)?;

    let form = TaxForms::find_by_id(body.form_id.clone())
        .one(db.get_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound("Form not found".to_string()))?;

    let mut active: tax_forms::ActiveModel = form.into();
    active.payment_status = Set(Some(body.payment_status.clone()));
    active.updated_at = Set(Some(Utc::now()));
    active.update(db.get_ref()).await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "message": "Payment status updated successfully"
    })))
}

/// POST /tax-solutions/save-engagement - Enregistrer une lettre d'engagement (auth FACULTATIVE)
/// Le payload JSON est conservé tel quel sous un id uuid
#[post("/save-engagement")]
pub async fn save_engagement(
    auth_user: Option<AuthUser>,
    body: web::Json<serde_json::Value>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ApiError> {
    let payload = body.into_inner();
    let is_empty = payload.is_null()
        || payload.as_object().map(|o| o.is_empty()).unwrap_or(false);
    if is_empty {
        return Err(ApiError::Validation(
            "No engagement letter data provided".to_string(),
        ));
    }

    let engagement_id = Uuid::new_v4().to_string();
    engagement_letters::ActiveModel {
        id: Set(engagement_id.clone()),
        user_id: Set(auth_user.as_ref().map(|u| u.user_id)),
        engagement_data: Set(payload),
        created_at: Set(Some(Utc::now())),
        updated_at: Set(Some(Utc::now())),
    }
    .insert(db.get_ref())
    .await?;

    info!(engagement_id = %engagement_id, "engagement letter saved");

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "id": engagement_id
    })))
}

/// POST /tax-solutions/save-progress - Sauvegarder un brouillon (auth FACULTATIVE)
/// Upsert par id de formulaire: le brouillon est réécrit à chaque sauvegarde
#[post("/save-progress")]
pub async fn save_progress(
    auth_user: Option<AuthUser>,
    body: web::Json<SaveProgressRequest>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ApiError> {
    validate_dto(&*body)?;

    // 1. Reprendre le brouillon existant s'il y en a un
    if let Some(form_id) = &body.form_id {
        if let Some(existing) = TaxForms::find_by_id(form_id.clone()).one(db.get_ref()).await? {
            let mut active: tax_forms::ActiveModel = existing.into();
            active.form_data = Set(body.form_data.clone());
            active.form_type = Set(Some(body.form_type.clone()));
            active.updated_at = Set(Some(Utc::now()));
            active.update(db.get_ref()).await?;

            return Ok(HttpResponse::Ok().json(serde_json::json!({
                "success": true,
                "form_id": form_id
            })));
        }
    }

    // 2. Sinon créer un nouveau brouillon
    let form_id = body
        .form_id
        .clone()
        .unwrap_or_else(|| Uuid::new_v4().to_string());
    tax_forms::ActiveModel {
        id: Set(form_id.clone()),
        user_id: Set(auth_user.as_ref().map(|u| u.user_id)),
        form_type: Set(Some(body.form_type.clone())),
        form_data: Set(body.form_data.clone()),
        fiscal_year_end: Set(fiscal_year_of(&body.form_data)),
        status: Set("draft".to_string()),
        payment_status: Set(None),
        created_at: Set(Some(Utc::now())),
        updated_at: Set(Some(Utc::now())),
    }
    .insert(db.get_ref())
    .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "success": true,
        "form_id": form_id
    })))
}

/// GET /tax-solutions/load-progress/{form_id} - Recharger un brouillon (auth FACULTATIVE)
#[get("/load-progress/{form_id}")]
pub async fn load_progress(
    path: web::Path<String>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ApiError> {
    let form_id = path.into_inner();

    let form = TaxForms::find_by_id(form_id)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound("Form not found".to_string()))?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "form_data": form.form_data,
        "form_type": form.form_type,
        "fiscal_year_end": form.fiscal_year_end,
        "status": form.status,
        "created_at": form.created_at,
        "updated_at": form.updated_at
    })))
}

pub fn tax_solutions_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/tax-solutions")
            .service(list_templates)
            .service(submit_form)
            .service(complete_payment)
            .service(save_engagement)
            .service(save_progress)
            .service(load_progress),
    );
}
