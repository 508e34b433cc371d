use actix_web::{HttpResponse, get, web};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter};

use crate::errors::ApiError;
use crate::models::service_categories::Entity as ServiceCategories;
use crate::models::services::{Column as ServiceColumn, Entity as Services};

/// GET /services - Catalogue des services actifs avec leur catégorie (PUBLIC)
#[get("")]
pub async fn list_services(db: web::Data<DatabaseConnection>) -> Result<HttpResponse, ApiError> {
    let rows = Services::find()
        .filter(ServiceColumn::IsActive.eq(true))
        .find_also_related(ServiceCategories)
        .all(db.get_ref())
        .await?;

    let services: Vec<serde_json::Value> = rows
        .into_iter()
        .map(|(service, category)| {
            let mut value = serde_json::to_value(&service).unwrap_or_default();
            if let Some(obj) = value.as_object_mut() {
                obj.insert(
                    "category_name".to_string(),
                    category
                        .map(|c| serde_json::Value::String(c.name))
                        .unwrap_or(serde_json::Value::Null),
                );
            }
            value
        })
        .collect();

    Ok(HttpResponse::Ok().json(serde_json::json!({ "services": services })))
}

/// GET /services/categories - Liste des catégories (PUBLIC)
#[get("/categories")]
pub async fn list_categories(db: web::Data<DatabaseConnection>) -> Result<HttpResponse, ApiError> {
    let categories = ServiceCategories::find().all(db.get_ref()).await?;
    Ok(HttpResponse::Ok().json(serde_json::json!({ "categories": categories })))
}

/// GET /services/{id} - Détail d'un service (PUBLIC)
#[get("/{id}")]
pub async fn service_details(
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();

    let (service, category) = Services::find_by_id(id)
        .find_also_related(ServiceCategories)
        .one(db.get_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound("Service not found".to_string()))?;

    Ok(HttpResponse::Ok().json(serde_json::json!({
        "service": service,
        "category": category
    })))
}

pub fn service_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/services")
            .service(list_services)
            // /categories avant /{id} pour éviter la capture par le paramètre
            .service(list_categories)
            .service(service_details),
    );
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{App, test};
    use sea_orm::{DatabaseBackend, MockDatabase};

    #[actix_web::test]
    async fn test_unknown_service_is_404() {
        let db = MockDatabase::new(DatabaseBackend::Postgres)
            .append_query_results([Vec::<crate::models::services::Model>::new()])
            .into_connection();

        let app = test::init_service(
            App::new()
                .app_data(web::Data::new(db))
                .configure(service_routes),
        )
        .await;

        let req = test::TestRequest::get().uri("/services/99").to_request();
        let resp = test::call_service(&app, req).await;
        assert_eq!(resp.status(), 404);
    }
}
