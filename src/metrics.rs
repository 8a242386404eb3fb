//! Metrics aggregation for connected shops
//!
//! Reduces a window of enriched orders into the dashboard summary: order
//! count, gross and net revenue, average order value, and refunded amount.
//! The reduction itself is a pure single pass; the surrounding service wires
//! it to storage, the date window, and the Shopify client, and degrades to an
//! all-zero summary when the upstream listing call fails.

use crate::{
    config::Config,
    database::Database,
    dates,
    error::{AppError, AppResult},
    models::{AuditAction, MetricsSummary, ShopifyOrder},
    shopify::ShopifyClient,
};
use rust_decimal::{prelude::ToPrimitive, Decimal, RoundingStrategy};
use serde_json::json;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Currency reported when no order supplies one
pub const FALLBACK_CURRENCY: &str = "CAD";

/// Aggregate figures produced by one pass over the order list
#[derive(Debug, Clone, PartialEq)]
pub struct OrderTotals {
    pub orders_count: i64,
    pub gross_revenue: f64,
    pub currency: String,
    pub avg_order_value: f64,
    pub refunded_amount: f64,
    pub net_revenue: f64,
}

impl OrderTotals {
    /// Attaches the echoed identifiers to form the wire summary
    pub fn into_summary(self, shop_id: &str, from_date: &str, to_date: &str) -> MetricsSummary {
        MetricsSummary {
            shop_id: shop_id.to_string(),
            from_date: from_date.to_string(),
            to_date: to_date.to_string(),
            orders_count: self.orders_count,
            gross_revenue: self.gross_revenue,
            currency: self.currency,
            avg_order_value: self.avg_order_value,
            refunded_amount: self.refunded_amount,
            net_revenue: self.net_revenue,
        }
    }
}

/// Rounds to 2 decimal places, half away from zero
fn round2(value: Decimal) -> f64 {
    value
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
        .to_f64()
        .unwrap_or(0.0)
}

/// Unparsable amounts count as zero, never abort the reduction
fn parse_amount(raw: &str) -> Decimal {
    raw.trim().parse().unwrap_or(Decimal::ZERO)
}

/// Folds the enriched order list into aggregate figures.
///
/// Single pass: prices accumulate into the gross total, refund amounts into
/// the refunded total, and the currency is overwritten by each order that
/// carries one (last write wins, no conversion). Every monetary output is
/// rounded independently. Deterministic for a given order list.
pub fn reduce_orders(orders: &[ShopifyOrder]) -> OrderTotals {
    let mut gross = Decimal::ZERO;
    let mut refunded = Decimal::ZERO;
    let mut currency = FALLBACK_CURRENCY.to_string();

    for order in orders {
        gross += parse_amount(&order.total_price);

        if !order.currency.is_empty() {
            currency = order.currency.clone();
        }

        for refund in &order.refunds {
            if let Some(set) = &refund.total_refunded_set {
                refunded += parse_amount(&set.shop_money.amount);
            }
        }
    }

    let orders_count = orders.len() as i64;
    let avg = if orders_count > 0 {
        gross / Decimal::from(orders_count)
    } else {
        Decimal::ZERO
    };

    OrderTotals {
        orders_count,
        gross_revenue: round2(gross),
        currency,
        avg_order_value: round2(avg),
        refunded_amount: round2(refunded),
        net_revenue: round2(gross - refunded),
    }
}

/// Orchestrates a metrics request from stored shop to wire summary
#[derive(Clone)]
pub struct MetricsService {
    config: Arc<Config>,
    database: Arc<Database>,
}

impl MetricsService {
    pub fn new(config: Arc<Config>, database: Arc<Database>) -> Self {
        Self { config, database }
    }

    /// Computes the rolling 30-day summary for a connected shop.
    ///
    /// An upstream listing failure degrades to the all-zero summary and is
    /// still reported as success; callers cannot tell it apart from a store
    /// with no orders. Either way one `metrics_fetch` audit event is written.
    pub async fn summarize(&self, shop_id: Uuid) -> AppResult<MetricsSummary> {
        let shop = self
            .database
            .get_shop_by_id(shop_id)
            .await?
            .ok_or_else(|| AppError::NotFound("Shop not found".to_string()))?;

        let (from_date, to_date) =
            dates::last_30_days_range(self.config.metrics.business_utc_offset_hours);
        debug!("Metrics window for shop {}: {} .. {}", shop.id, from_date, to_date);

        let client = ShopifyClient::new(&self.config, &shop.shop_domain, &shop.access_token);
        let shop_id_str = shop.id.to_string();

        let summary = match client.fetch_orders(&from_date, &to_date).await {
            Ok(orders) => reduce_orders(&orders).into_summary(&shop_id_str, &from_date, &to_date),
            Err(err) => {
                warn!("Falling back to zero metrics for shop {}: {}", shop.id, err);
                MetricsSummary::zero(&shop_id_str, &from_date, &to_date, FALLBACK_CURRENCY)
            }
        };

        self.database
            .create_audit_event(
                "server",
                AuditAction::MetricsFetch,
                Some(shop.id),
                json!({
                    "fromDate": from_date,
                    "toDate": to_date,
                    "ordersCount": summary.orders_count,
                }),
            )
            .await?;

        info!(
            "Metrics summary ready for shop {} ({} orders)",
            shop.id, summary.orders_count
        );

        Ok(summary)
    }

    /// Records a disconnect without deleting the shop row.
    ///
    /// History is preserved for traceability; only the audit event marks the
    /// store as disconnected.
    pub async fn disconnect(&self, shop_id: Uuid) -> AppResult<()> {
        self.database
            .create_audit_event(
                "server",
                AuditAction::ShopDisconnect,
                Some(shop_id),
                json!({ "timestamp": chrono::Utc::now().to_rfc3339() }),
            )
            .await?;

        info!("Recorded disconnect for shop {}", shop_id);
        Ok(())
    }
}
