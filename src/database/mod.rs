pub mod connection;
pub mod operations;

use async_trait::async_trait;
use log::info;
use tokio::sync::OnceCell;
use tokio::time::Duration;

use crate::error::StoreError;
use crate::models::TimeSeriesPoint;

pub use connection::{connect_with_retry, create_ssl_connector, ConnectionSettings};
pub use operations::{ensure_schema, insert_points};

/// Destination of time-series points
#[async_trait]
pub trait PointStore: Send + Sync {
    /// Write every point of one request in a single flush
    async fn write(&self, points: &[TimeSeriesPoint]) -> Result<(), StoreError>;
}

/// PostgreSQL-backed point store
#[derive(Debug)]
pub struct PostgresStore {
    settings: ConnectionSettings,
    connect_retries: usize,
    retry_wait: Duration,
    schema_ready: OnceCell<()>,
}

impl PostgresStore {
    pub fn new(
        database_url: &str,
        connect_retries: usize,
        retry_wait: Duration,
    ) -> Result<Self, StoreError> {
        Ok(PostgresStore {
            settings: ConnectionSettings::parse(database_url)?,
            connect_retries,
            retry_wait,
            schema_ready: OnceCell::new(),
        })
    }
}

#[async_trait]
impl PointStore for PostgresStore {
    async fn write(&self, points: &[TimeSeriesPoint]) -> Result<(), StoreError> {
        let client =
            connect_with_retry(&self.settings, self.connect_retries, self.retry_wait).await?;

        self.schema_ready
            .get_or_try_init(|| async {
                ensure_schema(&client).await?;
                info!("Ensured sensor_points table exists");
                Ok::<(), StoreError>(())
            })
            .await?;

        insert_points(&client, points).await?;
        Ok(())
    }
}
