//! Request and response schemas for the `/api/v1` REST backend.
//!
//! The backend speaks Spanish field names; the Rust side uses English names
//! and renames on the wire.

use serde::{Deserialize, Deserializer, Serialize};

use crate::domain::{
    ArticleId, PaymentId, PaymentMethod, PaymentStatus, PlanId, Role, SourceId, SubscriptionId,
    UserId,
};

/// Monetary columns come back either as JSON numbers or as decimal strings,
/// depending on how the backend serialised its `NUMERIC` values.
fn lenient_amount<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Amount {
        Number(f64),
        Text(String),
    }

    match Amount::deserialize(deserializer)? {
        Amount::Number(value) => Ok(value),
        Amount::Text(raw) => raw
            .trim()
            .parse::<f64>()
            .map_err(|err| serde::de::Error::custom(format!("invalid amount '{raw}': {err}"))),
    }
}

// ==================== auth ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginRequest {
    #[serde(rename = "nombre_usuario")]
    pub username: String,
    #[serde(rename = "contrasena")]
    pub password: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    #[serde(rename = "nombre_usuario")]
    pub username: String,
    pub email: String,
    #[serde(rename = "contrasena")]
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserProfile {
    pub id: UserId,
    #[serde(rename = "nombre_usuario")]
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default, rename = "rol")]
    pub role: Role,
    #[serde(default, rename = "fecha_creacion")]
    pub created_at: Option<String>,
    #[serde(default, rename = "activo")]
    pub active: Option<bool>,
}

/// Returned by both login and register.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthResponse {
    #[serde(rename = "usuario")]
    pub user: UserProfile,
    pub access_token: String,
    #[serde(default, rename = "mensaje")]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileResponse {
    #[serde(rename = "usuario")]
    pub user: UserProfile,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MessageResponse {
    #[serde(default, rename = "mensaje")]
    pub message: Option<String>,
}

// ==================== news ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    #[serde(default)]
    pub id: Option<ArticleId>,
    #[serde(rename = "titulo")]
    pub title: String,
    pub url: String,
    #[serde(default, rename = "resumen")]
    pub summary: Option<String>,
    #[serde(default, rename = "imagen_url")]
    pub image_url: Option<String>,
    #[serde(default, rename = "categoria")]
    pub category: Option<String>,
    #[serde(default, rename = "fuente")]
    pub source_name: Option<String>,
    #[serde(default, rename = "fuente_id")]
    pub source_id: Option<SourceId>,
    #[serde(default, rename = "fecha_publicacion")]
    pub published_at: Option<String>,
    #[serde(default, rename = "fecha_scraping")]
    pub scraped_at: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleListResponse {
    pub total: u64,
    #[serde(default, rename = "limite")]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
    #[serde(default, rename = "total_paginas")]
    pub total_pages: Option<u64>,
    #[serde(default, rename = "pagina_actual")]
    pub current_page: Option<u64>,
    #[serde(default, rename = "noticias")]
    pub articles: Vec<Article>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ArticleCountResponse {
    #[serde(rename = "total_noticias")]
    pub total: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategoriesResponse {
    #[serde(default, rename = "categorias")]
    pub categories: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchResponse {
    #[serde(default)]
    pub total: u64,
    #[serde(default, rename = "resultados")]
    pub results: Vec<Article>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KeywordSearchRequest {
    #[serde(rename = "palabras")]
    pub words: Vec<String>,
    #[serde(rename = "limite")]
    pub limit: u32,
}

// ==================== scraping ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapeResponse {
    #[serde(default, rename = "mensaje")]
    pub message: Option<String>,
    #[serde(default, rename = "total_noticias")]
    pub total: u64,
    #[serde(default, rename = "guardadas_en_bd")]
    pub persisted: bool,
    #[serde(default, rename = "noticias")]
    pub articles: Vec<Article>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScrapingQuota {
    #[serde(default)]
    pub plan: Option<String>,
    #[serde(default, rename = "limite_diario")]
    pub daily_limit: Option<i64>,
    #[serde(default, rename = "usado_hoy")]
    pub used_today: Option<i64>,
    #[serde(default, rename = "disponible")]
    pub available: Option<i64>,
    #[serde(default, rename = "puede_scrapear")]
    pub can_scrape: Option<bool>,
    #[serde(default, rename = "mensaje")]
    pub message: Option<String>,
}

// ==================== sources ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Source {
    pub id: SourceId,
    #[serde(rename = "nombre")]
    pub name: String,
    pub url: String,
    #[serde(default = "default_true", rename = "activo")]
    pub active: bool,
    #[serde(default)]
    pub user_id: Option<UserId>,
    #[serde(default, rename = "fecha_creacion")]
    pub created_at: Option<String>,
    #[serde(default, rename = "fecha_actualizacion")]
    pub updated_at: Option<String>,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceListResponse {
    #[serde(default)]
    pub total: u64,
    #[serde(default, rename = "fuentes")]
    pub sources: Vec<Source>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceResponse {
    #[serde(rename = "fuente")]
    pub source: Source,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NewSource {
    #[serde(rename = "nombre")]
    pub name: String,
    pub url: String,
}

/// Partial update; absent fields are left alone by the backend.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SourceUpdate {
    #[serde(default, rename = "nombre", skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, rename = "activo", skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
}

impl SourceUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.url.is_none() && self.active.is_none()
    }
}

// ==================== scheduler ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScheduledTask {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "intervalo_minutos")]
    pub interval_minutes: u32,
    #[serde(default, rename = "fuente_id")]
    pub source_id: Option<SourceId>,
    #[serde(default = "default_task_limit", rename = "limite")]
    pub limit: u32,
    #[serde(default = "default_true", rename = "activa")]
    pub active: bool,
    #[serde(default, rename = "proxima_ejecucion")]
    pub next_run: Option<String>,
}

fn default_task_limit() -> u32 {
    5
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewTask {
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "intervalo_minutos")]
    pub interval_minutes: u32,
    #[serde(rename = "fuente_id")]
    pub source_id: Option<SourceId>,
    #[serde(rename = "limite")]
    pub limit: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskListResponse {
    #[serde(default)]
    pub total: u64,
    #[serde(default, rename = "tareas")]
    pub tasks: Vec<ScheduledTask>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskResponse {
    #[serde(rename = "tarea")]
    pub task: ScheduledTask,
}

// ==================== plans and subscriptions ====================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: PlanId,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "precio", deserialize_with = "lenient_amount")]
    pub price: f64,
    /// `-1` means unlimited.
    #[serde(rename = "limite_fuentes")]
    pub source_limit: i64,
    #[serde(default, rename = "descripcion")]
    pub description: Option<String>,
    #[serde(default, rename = "activo")]
    pub active: Option<bool>,
}

impl Plan {
    pub fn has_unlimited_sources(&self) -> bool {
        self.source_limit < 0
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlansResponse {
    #[serde(default, rename = "planes")]
    pub plans: Vec<Plan>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Subscription {
    #[serde(default)]
    pub id: Option<SubscriptionId>,
    #[serde(default)]
    pub plan_id: Option<PlanId>,
    #[serde(default, rename = "plan_nombre")]
    pub plan_name: Option<String>,
    #[serde(default, rename = "fecha_inicio")]
    pub starts_at: Option<String>,
    #[serde(default, rename = "fecha_vencimiento")]
    pub expires_at: Option<String>,
    #[serde(default, rename = "activo")]
    pub active: Option<bool>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MyPlanResponse {
    #[serde(rename = "suscripcion")]
    pub subscription: Subscription,
    #[serde(default, rename = "limite_info")]
    pub limits: Option<serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePlanRequest {
    pub plan_id: PlanId,
    #[serde(rename = "pago_id")]
    pub payment_id: PaymentId,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChangePlanResponse {
    #[serde(rename = "suscripcion")]
    pub subscription: Subscription,
    #[serde(default, rename = "mensaje")]
    pub message: Option<String>,
}

// ==================== payments ====================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreatePaymentRequest {
    pub plan_id: PlanId,
    #[serde(rename = "metodo_pago")]
    pub method: PaymentMethod,
}

/// What the user must do next to finish a payment, per gateway.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "metodo", rename_all = "snake_case")]
pub enum PaymentCheckout {
    Yape {
        #[serde(rename = "pago_id")]
        payment_id: PaymentId,
        #[serde(default)]
        qr_data: serde_json::Value,
    },
    Paypal {
        #[serde(rename = "pago_id")]
        payment_id: PaymentId,
        approval_url: String,
        #[serde(rename = "payment_id")]
        gateway_payment_id: String,
    },
    Stripe {
        #[serde(rename = "pago_id")]
        payment_id: PaymentId,
        checkout_url: String,
        session_id: String,
    },
}

impl PaymentCheckout {
    pub fn payment_id(&self) -> PaymentId {
        match self {
            Self::Yape { payment_id, .. }
            | Self::Paypal { payment_id, .. }
            | Self::Stripe { payment_id, .. } => *payment_id,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyYapeRequest {
    #[serde(rename = "pago_id")]
    pub payment_id: PaymentId,
    #[serde(rename = "comprobante_img")]
    pub receipt_image: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerifyYapeResponse {
    #[serde(default, rename = "mensaje")]
    pub message: Option<String>,
    #[serde(rename = "pago_id")]
    pub payment_id: PaymentId,
    #[serde(rename = "estado")]
    pub status: PaymentStatus,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payment {
    pub id: PaymentId,
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub plan_id: PlanId,
    #[serde(default, rename = "plan_nombre")]
    pub plan_name: Option<String>,
    #[serde(rename = "metodo_pago")]
    pub method: PaymentMethod,
    #[serde(rename = "monto", deserialize_with = "lenient_amount")]
    pub amount: f64,
    #[serde(rename = "estado")]
    pub status: PaymentStatus,
    #[serde(default, rename = "referencia_pago")]
    pub reference: Option<String>,
    #[serde(default, rename = "fecha_pago")]
    pub paid_at: Option<String>,
    #[serde(default, rename = "nombre_usuario")]
    pub username: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentsResponse {
    #[serde(default, rename = "pagos")]
    pub payments: Vec<Payment>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plan_price_accepts_decimal_strings() {
        let plan: Plan = serde_json::from_str(
            r#"{"id":2,"nombre":"Pro","precio":"19.90","limite_fuentes":-1,"descripcion":null,"activo":true}"#,
        )
        .expect("plan");
        assert_eq!(plan.price, 19.9);
        assert!(plan.has_unlimited_sources());
    }

    #[test]
    fn checkout_is_selected_by_method_tag() {
        let checkout: PaymentCheckout = serde_json::from_str(
            r#"{"success":true,"metodo":"stripe","pago_id":9,"checkout_url":"https://pay.example/s","session_id":"cs_1"}"#,
        )
        .expect("checkout");
        assert_eq!(checkout.payment_id(), PaymentId(9));
        assert!(matches!(checkout, PaymentCheckout::Stripe { .. }));
    }

    #[test]
    fn source_update_skips_unset_fields() {
        let update = SourceUpdate {
            active: Some(false),
            ..SourceUpdate::default()
        };
        let json = serde_json::to_value(&update).expect("json");
        assert_eq!(json, serde_json::json!({ "activo": false }));
    }
}
