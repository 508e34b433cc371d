use chrono::Utc;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DbErr, EntityTrait, QueryFilter, Set,
};
use tracing::info;

use crate::models::users::{self, Entity as Users};

/// Résultat de la résolution d'une identité fédérée vers un compte local
///
/// Variante explicite plutôt que des booléens ad hoc: l'appelant est forcé
/// de traiter les trois issues.
#[derive(Debug)]
pub enum FederatedResolution {
    /// L'uid externe est déjà lié à un compte - login pur
    Existing(users::Model),
    /// Un compte existait avec le même email: l'uid externe vient d'y être
    /// lié et le compte marqué vérifié
    Linked(users::Model),
    /// Aucun compte: l'appelant doit collecter le profil complet avant création
    NeedsRegistration,
}

/// Résout une identité externe (déjà vérifiée auprès du fournisseur)
/// vers un compte local
pub async fn resolve(
    db: &DatabaseConnection,
    firebase_uid: &str,
    email: &str,
) -> Result<FederatedResolution, DbErr> {
    // 1. Compte déjà lié à cet uid externe ?
    if let Some(user) = Users::find()
        .filter(users::Column::FirebaseUid.eq(firebase_uid))
        .one(db)
        .await?
    {
        return Ok(FederatedResolution::Existing(user));
    }

    // 2. Compte existant avec le même email mais sans uid externe:
    //    lier et marquer vérifié (fusion compte mot de passe / identité fédérée)
    if let Some(user) = Users::find()
        .filter(users::Column::Email.eq(email))
        .one(db)
        .await?
    {
        let user_id = user.id;
        let mut active: users::ActiveModel = user.into();
        active.firebase_uid = Set(Some(firebase_uid.to_string()));
        active.is_verified = Set(true);
        active.updated_at = Set(Some(Utc::now()));
        let linked = active.update(db).await?;

        info!(user_id = user_id, "linked federated identity to existing account");
        return Ok(FederatedResolution::Linked(linked));
    }

    // 3. Aucun compte: inscription à compléter
    Ok(FederatedResolution::NeedsRegistration)
}
