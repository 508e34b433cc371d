use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

// Métadonnées des pièces jointes déclarées par le client.
// Le stockage physique des fichiers est hors périmètre.
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tax_form_files")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub tax_form_id: String,
    pub files: Json, // [{file_name, file_type, file_size, field_name}, ...]
    pub form_type: Option<String>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::tax_forms::Entity",
        from = "Column::TaxFormId",
        to = "super::tax_forms::Column::Id"
    )]
    TaxForm,
}

impl Related<super::tax_forms::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::TaxForm.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
