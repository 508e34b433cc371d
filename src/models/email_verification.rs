// ============================================================================
// MODÈLE : EMAIL VERIFICATION (codes OTP)
// ============================================================================
//
// Description:
//   Codes de vérification à 6 chiffres pour prouver la possession d'un email
//   AVANT inscription (pas de la 2FA générique).
//
// Colonnes de la table email_verification:
//   - id (INTEGER, PRIMARY KEY, SERIAL)
//   - email (VARCHAR, UNIQUE, NOT NULL) - au plus un code actif par email
//   - otp (VARCHAR, NOT NULL) - 6 chiffres
//   - created_at (TIMESTAMPTZ, NOT NULL)
//   - is_verified (BOOLEAN, DEFAULT FALSE) - flag consommé
//
// Workflow:
//   1. POST /api/auth/send-otp : refuse si l'email est déjà inscrit (409)
//   2. Upsert du code sur la clé unique email (le dernier code écrase l'ancien)
//   3. Envoi du code par email (collaborateur Mailer)
//   4. POST /api/auth/verify-otp : valide si code identique et créé il y a
//      moins de 5 minutes, puis is_verified = true
//
// Points d'attention:
//   - Un code expire 5 minutes après sa création
//   - L'upsert est atomique (contrainte unique sur email)
//   - Le flag is_verified n'est pas re-vérifié avant acceptation
//     (comportement observé, voir DESIGN.md)
//
// ============================================================================

use sea_orm::entity::prelude::*;
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, DeriveEntityModel, Serialize, Deserialize)]
#[sea_orm(table_name = "email_verification")]
pub struct Model {
    #[sea_orm(primary_key)]
    pub id: i32,

    #[sea_orm(unique)]
    pub email: String,

    pub otp: String,

    pub created_at: DateTimeUtc,

    pub is_verified: bool,
}

#[derive(Copy, Clone, Debug, EnumIter, DeriveRelation)]
pub enum Relation {}

impl ActiveModelBehavior for ActiveModel {}
