// ============================================================================
// MODÈLE : TAX FORMS
// ============================================================================
//
// Description:
//   Soumissions de formulaires fiscaux multi-étapes. Le payload complet du
//   formulaire est stocké en JSON tel quel (les champs varient selon le
//   type de formulaire: engagement, smsf, smsf-establishment,
//   company-registration, business, individual).
//
// Workflow:
//   1. POST /api/tax-solutions/save-progress : upsert par id (uuid) tant que
//      l'utilisateur remplit le formulaire
//   2. GET /api/tax-solutions/load-progress/<id> : recharge le brouillon
//   3. POST /api/tax-solutions/submit : validation des champs requis selon
//      le type, statut 'submitted', notification des admins
//   4. POST /api/tax-solutions/complete-payment : met à jour payment_status
//
// Points d'attention:
//   - id est un UUID v4 généré côté serveur (pas de SERIAL)
//   - user_id est optionnel: la soumission anonyme est permise
//
// ============================================================================

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "tax_forms")]
pub struct Model {
    #[sea_orm(primary_key, auto_increment = false)]
    pub id: String,

    pub user_id: Option<i32>,

    pub form_type: Option<String>,

    pub form_data: Json,

    pub fiscal_year_end: Option<String>,

    pub status: String, // 'draft' ou 'submitted'

    pub payment_status: Option<String>,

    pub created_at: Option<DateTimeUtc>,

    pub updated_at: Option<DateTimeUtc>,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {
    #[sea_orm(has_many = "super::tax_form_files::Entity")]
    Files,
}

impl Related<super::tax_form_files::Entity> for Entity {
    fn to() -> RelationDef {
        Relation::Files.def()
    }
}

impl ActiveModelBehavior for ActiveModel {}
