use actix_web::{HttpResponse, get, web};
use sea_orm::{ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder};

use crate::errors::ApiError;
use crate::models::knowledge_articles::{Column as ArticleColumn, Entity as KnowledgeArticles};

/// GET /content/knowledge-base - Articles publiés, les plus récents d'abord (PUBLIC)
#[get("/knowledge-base")]
pub async fn list_articles(db: web::Data<DatabaseConnection>) -> Result<HttpResponse, ApiError> {
    let articles = KnowledgeArticles::find()
        .filter(ArticleColumn::IsPublished.eq(true))
        .order_by_desc(ArticleColumn::CreatedAt)
        .all(db.get_ref())
        .await?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "articles": articles })))
}

/// GET /content/knowledge-base/{id} - Article publié (PUBLIC)
/// Un article dépublié est introuvable pour le client
#[get("/knowledge-base/{id}")]
pub async fn article_details(
    path: web::Path<i32>,
    db: web::Data<DatabaseConnection>,
) -> Result<HttpResponse, ApiError> {
    let id = path.into_inner();

    let article = KnowledgeArticles::find()
        .filter(ArticleColumn::Id.eq(id))
        .filter(ArticleColumn::IsPublished.eq(true))
        .one(db.get_ref())
        .await?
        .ok_or_else(|| ApiError::NotFound("Article not found".to_string()))?;

    Ok(HttpResponse::Ok().json(serde_json::json!({ "article": article })))
}

pub fn content_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/content")
            .service(list_articles)
            .service(article_details),
    );
}
