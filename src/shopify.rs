//! Shopify Admin REST client
//!
//! Handles the two upstream surfaces this platform depends on: the OAuth
//! token endpoint and the orders/refunds REST resources. The order fetch is
//! a single listing call (one page, up to 250 orders) followed by a bounded
//! concurrent fan-out of per-order refund lookups.

use crate::{
    config::Config,
    models::{OrdersEnvelope, RefundsEnvelope, ShopifyOrder, ShopifyRefund},
};
use anyhow::{Context, Result};
use futures::stream::{self, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Header carrying the shop access token on REST calls
pub const ACCESS_TOKEN_HEADER: &str = "X-Shopify-Access-Token";

/// Errors surfaced by the Shopify client.
///
/// Token exchange failures carry no upstream detail; the cause is logged at
/// the call site and callers only see the taxonomy value. Order fetch
/// failures keep the upstream status and body when available.
#[derive(Debug, thiserror::Error)]
pub enum ShopifyError {
    #[error("failed to exchange authorization code for access token")]
    TokenExchangeFailed,

    #[error("failed to fetch orders from Shopify API (status {})", display_status(.status))]
    OrderFetchFailed {
        status: Option<u16>,
        body: Option<String>,
    },
}

fn display_status(status: &Option<u16>) -> String {
    status
        .map(|code| code.to_string())
        .unwrap_or_else(|| "unknown".to_string())
}

/// Token endpoint response: access token plus granted scope, verbatim
#[derive(Debug, Clone, Deserialize)]
pub struct AccessTokenResponse {
    pub access_token: String,
    pub scope: String,
}

#[derive(Serialize)]
struct TokenExchangeRequest<'a> {
    client_id: &'a str,
    client_secret: &'a str,
    code: &'a str,
}

/// Returns the token endpoint URL for a shop domain
pub fn token_endpoint(shop_domain: &str) -> String {
    format!("https://{}/admin/oauth/access_token", shop_domain)
}

/// Exchanges a one-time authorization code for an access token.
///
/// Issues a single POST with the application credentials; no retry. Any
/// network error or non-2xx response collapses to `TokenExchangeFailed`.
pub async fn exchange_code_for_token(
    http: &Client,
    client_id: &str,
    client_secret: &str,
    token_url: &str,
    code: &str,
) -> Result<AccessTokenResponse, ShopifyError> {
    let payload = TokenExchangeRequest {
        client_id,
        client_secret,
        code,
    };

    let response = http
        .post(token_url)
        .json(&payload)
        .send()
        .await
        .map_err(|err| {
            error!("Token exchange request failed: {}", err);
            ShopifyError::TokenExchangeFailed
        })?;

    if !response.status().is_success() {
        error!("Token exchange rejected with status {}", response.status());
        return Err(ShopifyError::TokenExchangeFailed);
    }

    response.json::<AccessTokenResponse>().await.map_err(|err| {
        error!("Failed to decode token exchange response: {}", err);
        ShopifyError::TokenExchangeFailed
    })
}

/// REST client bound to one shop and its access token
pub struct ShopifyClient {
    http: Client,
    base_url: String,
    access_token: String,
    api_version: String,
    refund_concurrency: usize,
}

impl ShopifyClient {
    /// Creates a client for a shop with the configured timeout and fan-out cap
    pub fn new(config: &Config, shop_domain: &str, access_token: &str) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.metrics.request_timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            http,
            base_url: format!("https://{}", shop_domain),
            access_token: access_token.to_string(),
            api_version: config.shopify.api_version.clone(),
            refund_concurrency: config.metrics.refund_fetch_concurrency,
        }
    }

    /// Points the client at a mock server instead of the shop domain
    #[cfg(test)]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn rest_url(&self, endpoint: &str) -> String {
        format!("{}/admin/api/{}/{}", self.base_url, self.api_version, endpoint)
    }

    /// Fetches all orders in the window, each enriched with its refunds.
    ///
    /// One listing call with `status=any` and `limit=250`; orders beyond the
    /// first page are out of scope and silently omitted. A listing failure
    /// aborts the fetch; a refund lookup failure only empties that order's
    /// refund list.
    pub async fn fetch_orders(
        &self,
        from_date: &str,
        to_date: &str,
    ) -> Result<Vec<ShopifyOrder>, ShopifyError> {
        let url = self.rest_url("orders.json");
        debug!("Fetching orders from {}", url);

        let response = self
            .http
            .get(&url)
            .header(ACCESS_TOKEN_HEADER, &self.access_token)
            .query(&[
                ("created_at_min", from_date),
                ("created_at_max", to_date),
                ("status", "any"),
                ("limit", "250"),
            ])
            .send()
            .await
            .map_err(|err| {
                error!("Orders listing request failed: {}", err);
                ShopifyError::OrderFetchFailed {
                    status: None,
                    body: None,
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.ok();
            error!("Orders listing rejected with status {}", status);
            return Err(ShopifyError::OrderFetchFailed {
                status: Some(status.as_u16()),
                body,
            });
        }

        let envelope: OrdersEnvelope = response.json().await.map_err(|err| {
            error!("Failed to decode orders listing: {}", err);
            ShopifyError::OrderFetchFailed {
                status: Some(status.as_u16()),
                body: None,
            }
        })?;

        info!("Fetched {} orders, enriching with refunds", envelope.orders.len());

        // Fan out the refund lookups with bounded concurrency. `buffered`
        // keeps listing order, which downstream currency selection relies on.
        let orders = stream::iter(envelope.orders)
            .map(|order| self.enrich_with_refunds(order))
            .buffered(self.refund_concurrency)
            .collect::<Vec<_>>()
            .await;

        Ok(orders)
    }

    async fn enrich_with_refunds(&self, order: ShopifyOrder) -> ShopifyOrder {
        match self.fetch_refunds(order.id).await {
            Ok(refunds) => ShopifyOrder { refunds, ..order },
            Err(err) => {
                warn!("Failed to fetch refunds for order {}: {}", order.id, err);
                ShopifyOrder {
                    refunds: Vec::new(),
                    ..order
                }
            }
        }
    }

    async fn fetch_refunds(&self, order_id: i64) -> Result<Vec<ShopifyRefund>> {
        let url = self.rest_url(&format!("orders/{}/refunds.json", order_id));

        let response = self
            .http
            .get(&url)
            .header(ACCESS_TOKEN_HEADER, &self.access_token)
            .send()
            .await
            .context("Refunds request failed")?
            .error_for_status()
            .context("Refunds request rejected")?;

        let envelope: RefundsEnvelope = response
            .json()
            .await
            .context("Failed to decode refunds payload")?;

        Ok(envelope.refunds)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MetricsConfig, ShopifyConfig};
    use httpmock::prelude::*;
    use serde_json::json;

    fn test_config() -> Config {
        Config {
            server_address: "127.0.0.1:0".to_string(),
            database_url: "postgres://test".to_string(),
            shopify: ShopifyConfig {
                api_key: "key123".to_string(),
                api_secret: "secret456".to_string(),
                scopes: "read_orders".to_string(),
                app_url: "https://app.example.com".to_string(),
                api_version: "2023-10".to_string(),
            },
            metrics: MetricsConfig {
                business_utc_offset_hours: 4,
                refund_fetch_concurrency: 4,
                request_timeout_secs: 5,
            },
        }
    }

    fn order_json(id: i64, total_price: &str) -> serde_json::Value {
        json!({
            "id": id,
            "created_at": "2025-07-10T12:00:00Z",
            "total_price": total_price,
            "currency": "USD",
            "financial_status": "paid"
        })
    }

    fn refund_json(id: i64, amount: &str) -> serde_json::Value {
        json!({
            "id": id,
            "created_at": "2025-07-12T09:30:00Z",
            "total_refunded_set": {
                "shop_money": { "amount": amount, "currency_code": "USD" }
            }
        })
    }

    #[tokio::test]
    async fn test_exchange_code_for_token() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(POST)
                .path("/admin/oauth/access_token")
                .json_body(json!({
                    "client_id": "key123",
                    "client_secret": "secret456",
                    "code": "authcode42"
                }));
            then.status(200).json_body(json!({
                "access_token": "shpat_token",
                "scope": "read_orders,read_products"
            }));
        });

        let http = Client::new();
        let token_url = format!("{}/admin/oauth/access_token", server.base_url());
        let token = exchange_code_for_token(&http, "key123", "secret456", &token_url, "authcode42")
            .await
            .unwrap();

        mock.assert();
        assert_eq!(token.access_token, "shpat_token");
        assert_eq!(token.scope, "read_orders,read_products");
    }

    #[tokio::test]
    async fn test_exchange_rejection_collapses_to_taxonomy_value() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(POST).path("/admin/oauth/access_token");
            then.status(401).json_body(json!({ "error": "invalid_request" }));
        });

        let http = Client::new();
        let token_url = format!("{}/admin/oauth/access_token", server.base_url());
        let result = exchange_code_for_token(&http, "key123", "secret456", &token_url, "bad").await;

        assert!(matches!(result, Err(ShopifyError::TokenExchangeFailed)));
    }

    #[tokio::test]
    async fn test_fetch_orders_enriches_each_order_with_refunds() {
        let server = MockServer::start();
        let listing = server.mock(|when, then| {
            when.method(GET)
                .path("/admin/api/2023-10/orders.json")
                .header(ACCESS_TOKEN_HEADER, "tok")
                .query_param("status", "any")
                .query_param("limit", "250")
                .query_param("created_at_min", "2025-07-08T00:00:00.000Z")
                .query_param("created_at_max", "2025-08-06T23:59:59.999Z");
            then.status(200)
                .json_body(json!({ "orders": [order_json(1001, "100.00"), order_json(1002, "150.00")] }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/admin/api/2023-10/orders/1001/refunds.json");
            then.status(200).json_body(json!({ "refunds": [] }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/admin/api/2023-10/orders/1002/refunds.json");
            then.status(200)
                .json_body(json!({ "refunds": [refund_json(9001, "25.00")] }));
        });

        let client = ShopifyClient::new(&test_config(), "my-store.myshopify.com", "tok")
            .with_base_url(server.base_url());
        let orders = client
            .fetch_orders("2025-07-08T00:00:00.000Z", "2025-08-06T23:59:59.999Z")
            .await
            .unwrap();

        listing.assert();
        assert_eq!(orders.len(), 2);
        // Listing order is preserved through the fan-out
        assert_eq!(orders[0].id, 1001);
        assert!(orders[0].refunds.is_empty());
        assert_eq!(orders[1].id, 1002);
        assert_eq!(orders[1].refunds.len(), 1);
        assert_eq!(
            orders[1].refunds[0]
                .total_refunded_set
                .as_ref()
                .unwrap()
                .shop_money
                .amount,
            "25.00"
        );
    }

    #[tokio::test]
    async fn test_listing_failure_aborts_with_status_and_body() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/admin/api/2023-10/orders.json");
            then.status(500).body("upstream exploded");
        });

        let client = ShopifyClient::new(&test_config(), "my-store.myshopify.com", "tok")
            .with_base_url(server.base_url());
        let result = client.fetch_orders("2025-07-08", "2025-08-06").await;

        match result {
            Err(ShopifyError::OrderFetchFailed { status, body }) => {
                assert_eq!(status, Some(500));
                assert_eq!(body.as_deref(), Some("upstream exploded"));
            }
            other => panic!("expected OrderFetchFailed, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_refund_failure_is_absorbed_per_order() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/admin/api/2023-10/orders.json");
            then.status(200)
                .json_body(json!({ "orders": [order_json(2001, "40.00"), order_json(2002, "60.00")] }));
        });
        server.mock(|when, then| {
            when.method(GET).path("/admin/api/2023-10/orders/2001/refunds.json");
            then.status(500).body("refund lookup down");
        });
        server.mock(|when, then| {
            when.method(GET).path("/admin/api/2023-10/orders/2002/refunds.json");
            then.status(200)
                .json_body(json!({ "refunds": [refund_json(9002, "10.00")] }));
        });

        let client = ShopifyClient::new(&test_config(), "my-store.myshopify.com", "tok")
            .with_base_url(server.base_url());
        let orders = client.fetch_orders("2025-07-08", "2025-08-06").await.unwrap();

        // The failing order degrades to an empty refund list; its neighbor
        // keeps its refunds and the batch still succeeds.
        assert_eq!(orders.len(), 2);
        assert!(orders[0].refunds.is_empty());
        assert_eq!(orders[1].refunds.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_orders_key_defaults_to_empty() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(GET).path("/admin/api/2023-10/orders.json");
            then.status(200).json_body(json!({}));
        });

        let client = ShopifyClient::new(&test_config(), "my-store.myshopify.com", "tok")
            .with_base_url(server.base_url());
        let orders = client.fetch_orders("2025-07-08", "2025-08-06").await.unwrap();

        assert!(orders.is_empty());
    }
}
