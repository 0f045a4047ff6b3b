//! Warehouse SQL adapter: load-validation history and company permalinks.
//!
//! Connections come from a pool sized to the sub-investigator parallelism,
//! so each executing probe holds its own connection for the duration of the
//! query and connection identity is never shared across tasks.

use async_trait::async_trait;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::Row;

use lt_domain::ParamBag;
use lt_ports::{DataSource, ProbeError, ProbePayload};

use super::{int_param, str_param};

#[derive(Debug, Clone)]
pub struct WarehouseConfig {
    pub database_url: String,
    pub max_connections: u32,
}

impl WarehouseConfig {
    pub fn from_env() -> Option<Self> {
        let database_url = std::env::var("WAREHOUSE_DATABASE_URL").ok()?;
        let max_connections = std::env::var("WAREHOUSE_MAX_CONNECTIONS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);
        Some(Self {
            database_url,
            max_connections,
        })
    }
}

pub struct WarehouseSource {
    pool: PgPool,
}

impl WarehouseSource {
    /// Connect lazily: the pool establishes connections on first use, so
    /// construction never blocks service start.
    pub fn connect(config: &WarehouseConfig) -> Result<Self, sqlx::Error> {
        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .connect_lazy(&config.database_url)?;
        Ok(Self { pool })
    }

    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn load_validation(&self, params: &ParamBag) -> Result<ProbePayload, ProbeError> {
        let tracking_id = int_param(params, "tracking_id");
        let load_number = str_param(params, "load_number");

        let rows = sqlx::query(
            "SELECT failure_class, error_message, file_name, occurred_at \
             FROM load_validation_attempts \
             WHERE ($1::bigint IS NULL OR tracking_id = $1) \
               AND ($2::text IS NULL OR load_number = $2) \
             ORDER BY occurred_at DESC \
             LIMIT 100",
        )
        .bind(tracking_id)
        .bind(load_number)
        .fetch_all(&self.pool)
        .await
        .map_err(to_probe_error)?;

        if rows.is_empty() {
            return Ok(ProbePayload::NotFound);
        }

        let mut counts: std::collections::BTreeMap<String, u64> = Default::default();
        let mut latest_error: Option<String> = None;
        let mut latest_file: Option<String> = None;
        for row in &rows {
            let class: String = row.try_get("failure_class").map_err(to_probe_error)?;
            *counts.entry(class).or_insert(0) += 1;
            if latest_error.is_none() {
                latest_error = row.try_get("error_message").ok();
                latest_file = row.try_get("file_name").ok();
            }
        }

        Ok(ProbePayload::Found(serde_json::json!({
            "failed_validations": rows.len(),
            "counts_by_class": counts,
            "latest_error": latest_error,
            "latest_file": latest_file,
        })))
    }

    async fn company_permalink(&self, params: &ParamBag) -> Result<ProbePayload, ProbeError> {
        let company_name =
            str_param(params, "company_name").ok_or_else(|| ProbeError::InvalidParams {
                reason: "company_name required".to_string(),
            })?;

        let rows = sqlx::query(
            "SELECT permalink, display_name \
             FROM companies \
             WHERE display_name ILIKE '%' || $1 || '%' \
             LIMIT 20",
        )
        .bind(company_name)
        .fetch_all(&self.pool)
        .await
        .map_err(to_probe_error)?;

        let permalinks: Vec<serde_json::Value> = rows
            .iter()
            .map(|row| {
                Ok(serde_json::json!({
                    "permalink": row.try_get::<String, _>("permalink").map_err(to_probe_error)?,
                    "display_name": row.try_get::<String, _>("display_name").map_err(to_probe_error)?,
                }))
            })
            .collect::<Result<_, ProbeError>>()?;

        // Zero matches is a real answer here (used to avoid false-negative
        // filtering downstream), so it is a found payload, not NotFound.
        Ok(ProbePayload::Found(serde_json::json!({
            "query": company_name,
            "permalinks": permalinks,
        })))
    }
}

fn to_probe_error(e: sqlx::Error) -> ProbeError {
    match e {
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed => ProbeError::Connection {
            message: e.to_string(),
        },
        sqlx::Error::Io(_) => ProbeError::Connection {
            message: e.to_string(),
        },
        other => ProbeError::Backend {
            message: other.to_string(),
        },
    }
}

#[async_trait]
impl DataSource for WarehouseSource {
    fn name(&self) -> &str {
        "warehouse"
    }

    fn capabilities(&self) -> Vec<String> {
        vec![
            "warehouse-load-validation".to_string(),
            "warehouse-company-permalink".to_string(),
        ]
    }

    async fn invoke(
        &self,
        capability: &str,
        params: &ParamBag,
    ) -> Result<ProbePayload, ProbeError> {
        match capability {
            "warehouse-load-validation" => self.load_validation(params).await,
            "warehouse-company-permalink" => self.company_permalink(params).await,
            other => Err(ProbeError::InvalidParams {
                reason: format!("unknown capability {other}"),
            }),
        }
    }
}
