use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

// Lettres d'engagement signées depuis le site. Le payload est stocké en JSON
// tel quel; user_id reste NULL pour une soumission anonyme.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "engagement_letters")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String, // uuid v4 généré côté serveur

    pub user_id: Option<i32>,

    pub engagement_data: Json,

    pub created_at: Option<DateTimeUtc>,

    pub updated_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
