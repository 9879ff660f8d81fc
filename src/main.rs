use log::{error, info, warn};
use serde::Deserialize;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

use lora_sensor_etl::auth::StaticTokenAuthenticator;
use lora_sensor_etl::config::IngestConfig;
use lora_sensor_etl::database::PostgresStore;
use lora_sensor_etl::error::IngestError;
use lora_sensor_etl::ingest::Ingestor;
use lora_sensor_etl::points::AllowedFields;
use lora_sensor_etl::registry::StaticRegistry;
use lora_sensor_etl::service::{IngestService, Reply};

/// One line of input: the uplink body and its authorization header
#[derive(Debug, Deserialize)]
struct UplinkRequest {
    #[serde(default)]
    authorization: String,
    body: serde_json::Value,
}

async fn main_loop(config: IngestConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!("Starting uplink ingestion service");

    let store = PostgresStore::new(
        &config.database_url,
        config.connect_retries,
        config.retry_wait,
    )?;
    let service = IngestService::new(
        Arc::new(StaticTokenAuthenticator::new(config.api_tokens.clone())),
        Arc::new(StaticRegistry::new(config.devices.clone())),
        Ingestor::new(
            Arc::new(store),
            AllowedFields::default(),
            config.write_timeout,
        ),
    );

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdout = tokio::io::stdout();
    let mut handled: u64 = 0;

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }

        let reply = match serde_json::from_str::<UplinkRequest>(&line) {
            Ok(request) => service.handle(&request.authorization, &request.body).await,
            Err(e) => {
                warn!("Unreadable request line: {}", e);
                Reply::from(&IngestError::MalformedRequest(e.to_string()))
            }
        };

        let mut out = serde_json::to_string(&reply)?;
        out.push('\n');
        stdout.write_all(out.as_bytes()).await?;
        stdout.flush().await?;
        handled += 1;
    }

    info!("Input closed after {} request(s)", handled);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .format_timestamp_secs()
        .init();

    // Load configuration
    let config = match IngestConfig::from_env() {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    // Run main loop or wait for shutdown signal
    tokio::select! {
        result = main_loop(config) => {
            match result {
                Ok(_) => info!("Program completed successfully"),
                Err(e) => error!("Fatal error: {}", e),
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Program terminated by user. Exiting gracefully.");
        }
    }

    Ok(())
}
