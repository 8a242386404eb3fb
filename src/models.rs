//! Database models and wire types
//!
//! Complete data model for the ShopPulse platform: connected shop records,
//! the append-only audit trail, the Shopify REST payloads consumed by the
//! aggregation pipeline, and the metrics summary returned to the dashboard.
//! Database models are designed for PostgreSQL with proper serialization support.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, Type};
use uuid::Uuid;

/// Connected shop management

/// One merchant's Shopify store linkage.
///
/// `shop_domain` is unique; reconnecting the same domain refreshes the token
/// and scope in place instead of creating a second row. Rows are never
/// deleted by normal flow so the audit trail keeps a stable reference.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Shop {
    pub id: Uuid,
    pub shop_domain: String,
    pub access_token: String,
    pub api_scope: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating or refreshing a shop record
#[derive(Debug, Clone)]
pub struct UpsertShopRequest {
    pub shop_domain: String,
    pub access_token: String,
    pub api_scope: String,
}

// Audit trail

/// Recorded audit actions, append-only
#[derive(Debug, Clone, Serialize, Deserialize, Type, PartialEq)]
#[sqlx(type_name = "audit_action", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    OauthSuccess,
    OauthFailure,
    MetricsFetch,
    ShopDisconnect,
}

/// Immutable audit event; write-once, no update or delete
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct AuditEvent {
    pub id: Uuid,
    pub actor: String,
    pub action: AuditAction,
    pub shop_id: Option<Uuid>,
    pub meta: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

// Shopify REST payloads (external, read-only)

/// Order as returned by the Shopify orders listing endpoint.
///
/// `total_price` arrives as a decimal string; the reducer is responsible for
/// parsing it defensively. `refunds` is filled in by the per-order refund
/// fetch and defaults to empty when the follow-up call fails.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopifyOrder {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub total_price: String,
    #[serde(default)]
    pub currency: String,
    pub financial_status: Option<String>,
    #[serde(default)]
    pub refunds: Vec<ShopifyRefund>,
}

/// Refund attached to an order
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopifyRefund {
    pub id: i64,
    pub created_at: DateTime<Utc>,
    pub total_refunded_set: Option<RefundedMoneySet>,
}

/// Money set wrapper used by the refunds payload
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefundedMoneySet {
    pub shop_money: Money,
}

/// Amount plus ISO currency code
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Money {
    pub amount: String,
    pub currency_code: String,
}

/// Envelope of the orders listing response
#[derive(Debug, Deserialize)]
pub struct OrdersEnvelope {
    #[serde(default)]
    pub orders: Vec<ShopifyOrder>,
}

/// Envelope of the per-order refunds response
#[derive(Debug, Deserialize)]
pub struct RefundsEnvelope {
    #[serde(default)]
    pub refunds: Vec<ShopifyRefund>,
}

// Metrics

/// Rolling 30-day analytics summary for one shop.
///
/// Serialized in the camelCase form the dashboard consumes. Every monetary
/// field is independently rounded to 2 decimal places.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct MetricsSummary {
    pub shop_id: String,
    pub from_date: String,
    pub to_date: String,
    pub orders_count: i64,
    pub gross_revenue: f64,
    pub currency: String,
    pub avg_order_value: f64,
    pub refunded_amount: f64,
    pub net_revenue: f64,
}

impl MetricsSummary {
    /// All-zero summary used when the upstream API is unreachable.
    ///
    /// Returned as a successful result; callers cannot distinguish it from a
    /// store with no orders in the window.
    pub fn zero(shop_id: &str, from_date: &str, to_date: &str, currency: &str) -> Self {
        Self {
            shop_id: shop_id.to_string(),
            from_date: from_date.to_string(),
            to_date: to_date.to_string(),
            orders_count: 0,
            gross_revenue: 0.0,
            currency: currency.to_string(),
            avg_order_value: 0.0,
            refunded_amount: 0.0,
            net_revenue: 0.0,
        }
    }
}

// API payloads

/// Request payload for beginning the OAuth flow
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConnectShopRequest {
    pub shop_domain: String,
}

/// Response carrying the provider authorize URL
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizeUrlResponse {
    pub oauth_url: String,
}

/// Query parameters delivered to the OAuth callback endpoint
#[derive(Debug, Clone, Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub shop: Option<String>,
    pub state: Option<String>,
}
