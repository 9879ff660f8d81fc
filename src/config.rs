use log::{debug, info, warn};
use std::collections::HashMap;
use std::env;
use std::time::Duration;

use crate::error::ConfigError;
use crate::models::{DeviceInfo, LocationCandidate};

const DEFAULT_WRITE_TIMEOUT_SECS: u64 = 10;
const DEFAULT_CONNECT_RETRIES: usize = 3;
const DEFAULT_RETRY_WAIT_SECS: u64 = 2;

#[derive(Debug, Clone)]
pub struct IngestConfig {
    pub database_url: String,
    pub api_tokens: Vec<String>,
    pub devices: HashMap<String, DeviceInfo>,
    pub write_timeout: Duration,
    pub connect_retries: usize,
    pub retry_wait: Duration,
}

impl IngestConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load environment variables
        dotenv::dotenv().ok();

        let database_url =
            env::var("DATABASE_URL").map_err(|_| ConfigError::Missing("DATABASE_URL"))?;

        let api_tokens = parse_tokens(&env::var("API_TOKENS").unwrap_or_default());
        if api_tokens.is_empty() {
            return Err(ConfigError::Invalid {
                name: "API_TOKENS",
                reason: "at least one token is required".into(),
            });
        }

        let devices = match env::var("DEVICES") {
            Ok(devices) => {
                debug!("Found DEVICES: '{}'", devices);
                parse_devices(&devices)?
            }
            Err(_) => {
                // Fallback to individual environment variables
                debug!("DEVICES environment variable not found, trying individual variables");
                devices_from_indexed_vars(env::vars())?
            }
        };

        info!("Total devices loaded: {}", devices.len());
        for (eui, device) in &devices {
            debug!("Device: {} -> {}", eui, device.display_name);
        }
        if devices.is_empty() {
            warn!("No devices configured; every device will use its EUI as display name");
        }

        Ok(IngestConfig {
            database_url,
            api_tokens,
            devices,
            write_timeout: Duration::from_secs(parse_number(
                "WRITE_TIMEOUT_SECS",
                env::var("WRITE_TIMEOUT_SECS").ok(),
                DEFAULT_WRITE_TIMEOUT_SECS,
            )?),
            connect_retries: parse_number(
                "DB_CONNECT_RETRIES",
                env::var("DB_CONNECT_RETRIES").ok(),
                DEFAULT_CONNECT_RETRIES,
            )?,
            retry_wait: Duration::from_secs(parse_number(
                "DB_RETRY_WAIT_SECS",
                env::var("DB_RETRY_WAIT_SECS").ok(),
                DEFAULT_RETRY_WAIT_SECS,
            )?),
        })
    }
}

/// Split a comma-separated token list, dropping blanks
pub fn parse_tokens(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|token| !token.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse `eui=Display Name@lat:lon,eui=Other Name,...`
///
/// The location suffix is optional. EUIs are stored lowercase.
pub fn parse_devices(raw: &str) -> Result<HashMap<String, DeviceInfo>, ConfigError> {
    let mut devices = HashMap::new();

    for pair in raw.split(',') {
        let pair = pair.trim();
        if pair.is_empty() {
            continue;
        }
        let Some((eui, rest)) = pair.split_once('=') else {
            warn!("Failed to split device entry: '{}'", pair);
            continue;
        };
        let (eui, rest) = (eui.trim(), rest.trim());
        if eui.is_empty() || rest.is_empty() {
            continue;
        }
        devices.insert(eui.to_lowercase(), parse_device(rest)?);
    }

    Ok(devices)
}

fn parse_device(raw: &str) -> Result<DeviceInfo, ConfigError> {
    let (name, location) = match raw.rsplit_once('@') {
        Some((name, location)) => (name.trim(), Some(parse_location(location.trim())?)),
        None => (raw, None),
    };
    Ok(DeviceInfo {
        display_name: name.to_string(),
        location: location.unwrap_or_else(|| LocationCandidate::new(0.0, 0.0)),
    })
}

fn parse_location(raw: &str) -> Result<LocationCandidate, ConfigError> {
    let invalid = || ConfigError::Invalid {
        name: "DEVICES",
        reason: format!("location '{}' is not lat:lon", raw),
    };
    let (lat, lon) = raw.split_once(':').ok_or_else(invalid)?;
    let latitude: f64 = lat.trim().parse().map_err(|_| invalid())?;
    let longitude: f64 = lon.trim().parse().map_err(|_| invalid())?;
    Ok(LocationCandidate::new(longitude, latitude))
}

/// Collect `DEVICE_<N>_EUI` / `DEVICE_<N>_NAME` / `DEVICE_<N>_LOCATION`
fn devices_from_indexed_vars<I>(vars: I) -> Result<HashMap<String, DeviceInfo>, ConfigError>
where
    I: IntoIterator<Item = (String, String)>,
{
    let vars: HashMap<String, String> = vars.into_iter().collect();
    let mut devices = HashMap::new();

    for (key, eui) in &vars {
        let Some(index) = key
            .strip_prefix("DEVICE_")
            .and_then(|s| s.strip_suffix("_EUI"))
        else {
            continue;
        };
        let Some(name) = vars.get(&format!("DEVICE_{}_NAME", index)) else {
            continue;
        };
        let location = match vars.get(&format!("DEVICE_{}_LOCATION", index)) {
            Some(location) => parse_location(location)?,
            None => LocationCandidate::new(0.0, 0.0),
        };
        devices.insert(
            eui.trim().to_lowercase(),
            DeviceInfo {
                display_name: name.clone(),
                location,
            },
        );
    }

    Ok(devices)
}

fn parse_number<T: std::str::FromStr>(
    name: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match raw {
        None => Ok(default),
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid {
            name,
            reason: format!("'{}' is not a number", raw),
        }),
    }
}
