use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "users")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,
    pub name: String,
    #[sea_orm(unique)]
    pub email: String,
    #[serde(skip_serializing)] // Format: pbkdf2:sha256:iterations$salt$hash
    pub password: Option<String>, // None pour les comptes purement fédérés
    pub phone: Option<String>,
    pub address: Option<String>,
    pub role: String, // 'client' ou 'admin'
    pub is_verified: bool,
    #[sea_orm(unique)]
    pub firebase_uid: Option<String>, // un uid externe lie au plus un compte
    #[serde(skip_serializing)]
    pub verification_token: Option<String>, // flux legacy de vérification par lien
    #[serde(skip_serializing)]
    pub reset_token: Option<String>, // usage unique, effacé après reset
    #[serde(skip_serializing)]
    pub reset_token_expiry: Option<DateTimeUtc>,
    pub created_at: Option<DateTimeUtc>,
    pub updated_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::appointments::Entity")]
    Appointments,

    #[sea_orm(has_many = "super::payments::Entity")]
    Payments,

    #[sea_orm(has_many = "super::invoices::Entity")]
    Invoices,

    #[sea_orm(has_many = "super::notifications::Entity")]
    Notifications,

    #[sea_orm(has_many = "super::calendar_events::Entity")]
    CalendarEvents,
}

impl Related<super::appointments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Appointments.def()
    }
}

impl Related<super::payments::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Payments.def()
    }
}

impl Related<super::invoices::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Invoices.def()
    }
}

impl Related<super::notifications::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Notifications.def()
    }
}

impl Related<super::calendar_events::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::CalendarEvents.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
