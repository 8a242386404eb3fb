//! Database operations and connection management
//!
//! Provides the persistence layer for the ShopPulse platform: PostgreSQL
//! connection pooling, migrations, connected-shop upserts and lookups, and
//! the append-only audit trail.

use anyhow::{Context, Result};
use chrono::Utc;
use sqlx::postgres::{PgPool, PgPoolOptions};
use std::time::Duration;
use tracing::info;
use uuid::Uuid;

use crate::models::{AuditAction, AuditEvent, Shop, UpsertShopRequest};

/// Main database service with connection pooling
pub struct Database {
    pool: PgPool,
}

impl Database {
    /// Creates a new database connection with optimized pool settings
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .acquire_timeout(Duration::from_secs(30))
            .connect(database_url)
            .await
            .context("Failed to connect to database")?;

        info!("Connected to database with {} max connections", max_connections);

        Ok(Self { pool })
    }

    /// Runs pending database migrations
    pub async fn migrate(&self) -> Result<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .context("Failed to run database migrations")?;

        info!("Database migrations completed successfully");
        Ok(())
    }

    /// Verifies database connectivity
    pub async fn health_check(&self) -> Result<()> {
        sqlx::query_scalar::<_, i32>("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("Database health check failed")?;
        Ok(())
    }

    // === Connected shops ===

    /// Creates or refreshes the shop record for a domain.
    ///
    /// The domain is the unique key: reconnecting updates the token and scope
    /// in place and returns the same row id. Atomicity comes from the
    /// database upsert, no application-level locking.
    pub async fn upsert_shop(&self, request: UpsertShopRequest) -> Result<Shop> {
        let now = Utc::now();

        let shop = sqlx::query_as::<_, Shop>(
            r#"
            INSERT INTO shops (shop_domain, access_token, api_scope, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (shop_domain) DO UPDATE SET
                access_token = EXCLUDED.access_token,
                api_scope = EXCLUDED.api_scope,
                updated_at = EXCLUDED.updated_at
            RETURNING id, shop_domain, access_token, api_scope, created_at, updated_at
            "#,
        )
        .bind(&request.shop_domain)
        .bind(&request.access_token)
        .bind(&request.api_scope)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .context("Failed to upsert shop")?;

        info!("Upserted shop {} (ID: {})", shop.shop_domain, shop.id);
        Ok(shop)
    }

    /// Retrieves a shop by its unique ID
    pub async fn get_shop_by_id(&self, shop_id: Uuid) -> Result<Option<Shop>> {
        let shop = sqlx::query_as::<_, Shop>(
            r#"
            SELECT id, shop_domain, access_token, api_scope, created_at, updated_at
            FROM shops WHERE id = $1
            "#,
        )
        .bind(shop_id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to get shop by ID")?;

        Ok(shop)
    }

    // === Audit trail ===

    /// Appends one immutable audit event
    pub async fn create_audit_event(
        &self,
        actor: &str,
        action: AuditAction,
        shop_id: Option<Uuid>,
        meta: serde_json::Value,
    ) -> Result<AuditEvent> {
        let now = Utc::now();

        let event = sqlx::query_as::<_, AuditEvent>(
            r#"
            INSERT INTO audit_log (actor, action, shop_id, meta, created_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING id, actor, action, shop_id, meta, created_at
            "#,
        )
        .bind(actor)
        .bind(action)
        .bind(shop_id)
        .bind(meta)
        .bind(now)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create audit event")?;

        Ok(event)
    }

    /// Lists the most recent audit events for a shop
    pub async fn list_audit_events(&self, shop_id: Uuid, limit: i64) -> Result<Vec<AuditEvent>> {
        let events = sqlx::query_as::<_, AuditEvent>(
            r#"
            SELECT id, actor, action, shop_id, meta, created_at
            FROM audit_log
            WHERE shop_id = $1
            ORDER BY created_at DESC
            LIMIT $2
            "#,
        )
        .bind(shop_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await
        .context("Failed to list audit events")?;

        Ok(events)
    }
}
