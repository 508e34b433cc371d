// ============================================================================
// MODELS - MODULE PRINCIPAL
// ============================================================================
//
// Description:
//   Point d'entrée pour tous les modèles de données.
//   Chaque modèle correspond à une table PostgreSQL avec SeaORM.
//
// Liste des modules:
//   - health : Health check API
//   - users : Utilisateurs (auth classique + identité fédérée Google)
//   - email_verification : Codes OTP de vérification d'email (expire 5 min)
//   - appointments : Rendez-vous clients
//   - services / service_categories : Catalogue de services et tarifs
//   - payments : Paiements (références PAY-*/INV-*, webhook gateway)
//   - invoices / invoice_items : Factures et lignes de facture
//   - notifications / notification_preferences : Notifications in-app
//   - calendar_events : Événements calendrier utilisateur
//   - knowledge_articles : Base de connaissances publiée
//   - tax_forms / tax_form_files / tax_form_templates : Formulaires fiscaux
//   - engagement_letters : Lettres d'engagement (payload JSON)
//
// Points d'attention:
//   - Tous les modèles utilisent SeaORM (pas de SQL brut)
//   - Les colonnes sensibles (password, tokens) ne sont jamais sérialisées
//   - Les relations entre tables sont définies dans chaque modèle
//
// ============================================================================

pub mod appointments;
pub mod calendar_events;
pub mod email_verification;
pub mod engagement_letters;
pub mod health;
pub mod invoice_items;
pub mod invoices;
pub mod knowledge_articles;
pub mod notification_preferences;
pub mod notifications;
pub mod payments;
pub mod service_categories;
pub mod services;
pub mod tax_form_files;
pub mod tax_form_templates;
pub mod tax_forms;
pub mod users;
