//! Address Repository
//!
//! Publishes a job's externally reachable addresses to the shared
//! `execution_order` table, keyed by client and frequency. The table is
//! owned by another system; rows are updated, never created.

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::MySqlPool;
use tracing::{debug, info, warn};

/// Addresses under which a job can be reached
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobAddresses {
    /// `host:vnc_node_port`
    pub container_ip: String,
    /// `http://host:web_node_port`
    pub browser_container_ip: String,
}

impl JobAddresses {
    pub fn new(host_ip: &str, vnc_node_port: u16, web_node_port: u16) -> Self {
        Self {
            container_ip: format!("{}:{}", host_ip, vnc_node_port),
            browser_container_ip: format!("http://{}:{}", host_ip, web_node_port),
        }
    }
}

#[async_trait]
pub trait AddressStore: Send + Sync {
    async fn update_addresses(
        &self,
        client_id: &str,
        frequency: &str,
        addresses: &JobAddresses,
    ) -> Result<()>;
}

pub struct MySqlAddressStore {
    pool: MySqlPool,
}

impl MySqlAddressStore {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AddressStore for MySqlAddressStore {
    async fn update_addresses(
        &self,
        client_id: &str,
        frequency: &str,
        addresses: &JobAddresses,
    ) -> Result<()> {
        let result = sqlx::query(
            r#"
            UPDATE execution_order
            SET container_ip = ?, browser_container_ip = ?
            WHERE client_id = ? AND frequency = ?
            "#,
        )
        .bind(&addresses.container_ip)
        .bind(&addresses.browser_container_ip)
        .bind(client_id)
        .bind(frequency)
        .execute(&self.pool)
        .await
        .with_context(|| {
            format!(
                "Failed to update addresses for client {} frequency {}",
                client_id, frequency
            )
        })?;

        if result.rows_affected() == 0 {
            warn!(
                "No execution order for client {} frequency {}; addresses not recorded",
                client_id, frequency
            );
        } else {
            info!(
                "Recorded addresses {} / {} for client {} frequency {}",
                addresses.container_ip, addresses.browser_container_ip, client_id, frequency
            );
        }

        Ok(())
    }
}

/// Used when no database is configured
pub struct DisabledAddressStore;

#[async_trait]
impl AddressStore for DisabledAddressStore {
    async fn update_addresses(
        &self,
        client_id: &str,
        frequency: &str,
        addresses: &JobAddresses,
    ) -> Result<()> {
        debug!(
            "Address store disabled, skipping {} for client {} frequency {}",
            addresses.container_ip, client_id, frequency
        );
        Ok(())
    }
}
