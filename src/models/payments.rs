use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

// Référence: PAY-<horodatage>-<user_id> (création directe)
// ou INV-<invoice_id>-<horodatage> (paiement de facture)
#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "payments")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub user_id: i32,
    pub invoice_id: Option<i32>,
    pub amount: Decimal,
    pub description: Option<String>,
    pub payment_method: String,
    #[sea_orm(unique)]
    pub reference: String,
    pub transaction_id: Option<String>, // renseigné par le webhook gateway
    pub status: String,                 // 'pending', 'completed', 'failed'
    pub created_at: Option<DateTimeUtc>,
    pub updated_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(
        belongs_to = "super::users::Entity",
        from = "Column::UserId",
        to = "super::users::Column::Id"
    )]
    User,

    #[sea_orm(
        belongs_to = "super::invoices::Entity",
        from = "Column::InvoiceId",
        to = "super::invoices::Column::Id"
    )]
    Invoice,
}

impl Related<super::users::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::User.def()
    }
}

impl Related<super::invoices::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invoice.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
