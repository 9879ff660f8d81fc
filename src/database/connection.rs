use log::{error, warn};
use openssl::ssl::{SslConnector, SslMethod};
use postgres_openssl::MakeTlsConnector;
use tokio::time::Duration;
use tokio_postgres::{Client, NoTls};
use url::Url;

use crate::error::StoreError;

/// Connection string split into the libpq part and the TLS root certificate
#[derive(Debug, Clone, PartialEq)]
pub struct ConnectionSettings {
    pub url: String,
    pub sslrootcert: Option<String>,
}

impl ConnectionSettings {
    /// Parse a `postgres://` URL, lifting out the `sslrootcert` query
    /// parameter. When it is present the connection uses TLS.
    pub fn parse(database_url: &str) -> Result<Self, StoreError> {
        let url = Url::parse(database_url)
            .map_err(|e| StoreError::ConnectionAborted(format!("URL parse error: {}", e)))?;

        let mut sslrootcert = None;
        let mut clean_params = Vec::new();
        for (key, value) in url.query_pairs() {
            if key == "sslrootcert" {
                sslrootcert = Some(value.to_string());
            } else {
                clean_params.push((key.into_owned(), value.into_owned()));
            }
        }

        let mut clean_url = url.clone();
        clean_url.set_query(None);
        if !clean_params.is_empty() {
            let query = clean_params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&");
            clean_url.set_query(Some(&query));
        }

        Ok(ConnectionSettings {
            url: clean_url.to_string(),
            sslrootcert,
        })
    }
}

pub fn create_ssl_connector(sslrootcert_path: &str) -> Result<MakeTlsConnector, StoreError> {
    let mut builder = SslConnector::builder(SslMethod::tls())
        .map_err(|e| StoreError::ConnectionAborted(format!("SSL builder error: {}", e)))?;

    builder
        .set_ca_file(sslrootcert_path)
        .map_err(|e| StoreError::ConnectionAborted(format!("Error loading CA cert: {}", e)))?;

    Ok(MakeTlsConnector::new(builder.build()))
}

async fn connect(settings: &ConnectionSettings) -> Result<Client, StoreError> {
    let client = match &settings.sslrootcert {
        Some(path) => {
            let connector = create_ssl_connector(path)?;
            let (client, connection) = tokio_postgres::connect(&settings.url, connector).await?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    error!("Connection error: {}", e);
                }
            });
            client
        }
        None => {
            let (client, connection) = tokio_postgres::connect(&settings.url, NoTls).await?;
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    error!("Connection error: {}", e);
                }
            });
            client
        }
    };
    Ok(client)
}

/// Open a client, retrying connection failures.
///
/// Only connection establishment is retried; statements executed on the
/// returned client are not.
pub async fn connect_with_retry(
    settings: &ConnectionSettings,
    retries: usize,
    wait: Duration,
) -> Result<Client, StoreError> {
    let attempts = retries + 1;
    let mut last_error = StoreError::ConnectionAborted("no connection attempt made".into());

    for attempt in 0..attempts {
        match connect(settings).await {
            Ok(client) => return Ok(client),
            Err(e) => {
                warn!("Attempt {}: connection error: {}", attempt + 1, e);
                last_error = e;
            }
        }

        if attempt < attempts - 1 {
            tokio::time::sleep(wait).await;
        }
    }

    error!("Giving up after {} connection attempts", attempts);
    Err(last_error)
}
