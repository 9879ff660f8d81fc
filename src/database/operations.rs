/// Database operations for storing time-series points
use futures_util::future::try_join_all;
use log::debug;
use tokio_postgres::Client;

use crate::models::{FieldValue, TimeSeriesPoint};

const CREATE_POINTS_TABLE: &str = "CREATE TABLE IF NOT EXISTS sensor_points (
    time TIMESTAMPTZ NOT NULL,
    measurement TEXT NOT NULL,
    device_id TEXT NOT NULL,
    device_display_name TEXT NOT NULL,
    value_float DOUBLE PRECISION,
    value_text TEXT,
    longitude DOUBLE PRECISION NOT NULL,
    latitude DOUBLE PRECISION NOT NULL
)";

const INSERT_POINT: &str = "INSERT INTO sensor_points(time, measurement, device_id, device_display_name, value_float, value_text, longitude, latitude)
     VALUES ($1, $2, $3, $4, $5, $6, $7, $8)";

/// Create the points table if it does not exist yet
pub async fn ensure_schema(client: &Client) -> Result<(), tokio_postgres::Error> {
    client.batch_execute(CREATE_POINTS_TABLE).await
}

/// Insert all points of one request
///
/// Inserts are pipelined on the one connection and are not wrapped in a
/// transaction: rows accepted before a failing row stay written.
///
/// # Returns
/// Number of rows inserted
pub async fn insert_points(
    client: &Client,
    points: &[TimeSeriesPoint],
) -> Result<u64, tokio_postgres::Error> {
    let statement = client.prepare(INSERT_POINT).await?;

    let inserts = points.iter().map(|point| {
        let (value_float, value_text) = match &point.value {
            FieldValue::Float(v) => (Some(*v), None),
            FieldValue::Text(s) => (None, Some(s.as_str())),
        };
        let statement = &statement;
        async move {
            client
                .execute(
                    statement,
                    &[
                        &point.timestamp,
                        &point.measurement,
                        &point.tags.device_id,
                        &point.tags.device_display_name,
                        &value_float,
                        &value_text,
                        &point.longitude,
                        &point.latitude,
                    ],
                )
                .await
        }
    });

    let rows: u64 = try_join_all(inserts).await?.into_iter().sum();
    debug!("Inserted {} row(s) into sensor_points", rows);
    Ok(rows)
}
