//! Shopify OAuth flow
//!
//! Covers the two halves of the authorization-code round trip: building the
//! provider authorize URL for a submitted shop domain, and completing the
//! callback by exchanging the code, upserting the shop record, and writing
//! the audit trail.

use crate::{
    config::Config,
    database::Database,
    error::{AppError, AppResult},
    models::{AuditAction, AuthorizeUrlResponse, UpsertShopRequest},
    security, shopify,
};
use reqwest::Client;
use serde_json::json;
use std::{sync::Arc, time::Duration};
use tracing::{debug, error, info};
use uuid::Uuid;

/// Canonical suffix every shop domain must carry
const SHOP_DOMAIN_SUFFIX: &str = ".myshopify.com";

/// Normalizes a user-submitted domain to `<name>.myshopify.com`.
///
/// Strips the protocol and trailing slashes and dedupes the canonical
/// suffix. Case is preserved; the provider treats domains case-insensitively
/// and the stored value mirrors what the merchant typed.
pub fn normalize_shop_domain(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_scheme = trimmed
        .strip_prefix("https://")
        .or_else(|| trimmed.strip_prefix("http://"))
        .unwrap_or(trimmed);
    let without_slash = without_scheme.trim_end_matches('/');
    let bare = without_slash
        .strip_suffix(SHOP_DOMAIN_SUFFIX)
        .unwrap_or(without_slash);

    format!("{}{}", bare, SHOP_DOMAIN_SUFFIX)
}

/// Generates the random state parameter for one authorize round trip
fn generate_state() -> String {
    Uuid::new_v4().simple().to_string()
}

/// Builds the provider authorize redirect URL for a normalized shop domain
pub fn authorize_url(config: &Config, shop_domain: &str) -> String {
    let params = [
        ("client_id", config.shopify.api_key.clone()),
        ("scope", config.shopify.scopes.clone()),
        ("redirect_uri", config.shopify.redirect_uri()),
        ("state", generate_state()),
    ];

    let query = serde_urlencoded::to_string(params)
        .expect("authorize query parameters always serialize");

    format!("https://{}/admin/oauth/authorize?{}", shop_domain, query)
}

/// Service handling the OAuth begin and callback operations
#[derive(Clone)]
pub struct OauthService {
    config: Arc<Config>,
    database: Arc<Database>,
    http: Client,
}

impl OauthService {
    pub fn new(config: Arc<Config>, database: Arc<Database>) -> Self {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.metrics.request_timeout_secs))
            .build()
            .expect("Failed to create HTTP client");

        Self {
            config,
            database,
            http,
        }
    }

    /// Validates and normalizes the submitted domain, returning the
    /// authorize URL the browser should be sent to.
    pub fn begin(&self, raw_domain: &str) -> AppResult<AuthorizeUrlResponse> {
        if raw_domain.trim().is_empty() {
            return Err(AppError::Validation("Shop domain is required".to_string()));
        }

        let shop_domain = normalize_shop_domain(raw_domain);
        info!("Initiating Shopify OAuth for {}", shop_domain);

        Ok(AuthorizeUrlResponse {
            oauth_url: authorize_url(&self.config, &shop_domain),
        })
    }

    /// Completes the OAuth round trip for a callback.
    ///
    /// The token exchange strictly precedes the shop upsert. On success the
    /// shop record is created or refreshed in place and an `oauth_success`
    /// event is appended; on failure the cause is logged redacted, an
    /// `oauth_failure` event is appended, and only the taxonomy error leaves
    /// this method.
    pub async fn handle_callback(&self, code: &str, shop: &str, state: &str) -> AppResult<Uuid> {
        debug!("Processing OAuth callback for {} (state {})", shop, state);

        let token_url = shopify::token_endpoint(shop);
        let exchange = shopify::exchange_code_for_token(
            &self.http,
            &self.config.shopify.api_key,
            &self.config.shopify.api_secret,
            &token_url,
            code,
        )
        .await;

        match exchange {
            Ok(token) => {
                let granted = security::redact(&json!({
                    "shop": shop,
                    "accessToken": token.access_token,
                    "scope": token.scope,
                }));
                debug!("Token exchange succeeded: {}", granted);

                let record = self
                    .database
                    .upsert_shop(UpsertShopRequest {
                        shop_domain: shop.to_string(),
                        access_token: token.access_token,
                        api_scope: token.scope.clone(),
                    })
                    .await?;

                self.database
                    .create_audit_event(
                        "server",
                        AuditAction::OauthSuccess,
                        Some(record.id),
                        json!({ "shop": shop, "scope": token.scope }),
                    )
                    .await?;

                info!("Connected shop {} ({})", shop, record.id);
                Ok(record.id)
            }
            Err(err) => {
                error!("OAuth callback failed for {}: {}", shop, err);

                self.database
                    .create_audit_event(
                        "server",
                        AuditAction::OauthFailure,
                        None,
                        json!({ "error": "Token exchange failed", "shop": shop }),
                    )
                    .await?;

                Err(AppError::Shopify(err))
            }
        }
    }
}
