use log::{info, warn};
use thiserror::Error;

use crate::{
    error::GeocodeError,
    geocoder::Geocoder,
    model::AppConfig,
    scheduler::{RefreshOutcome, RefreshScheduler},
    store::ConfigStore,
};

/// Values entered in the setup dialog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupRequest {
    pub api_key: String,
    pub zip_code: String,
}

#[derive(Debug, Error)]
pub enum SetupError {
    #[error("an API key is required")]
    MissingApiKey,

    #[error("'{0}' is not a valid ZIP code")]
    InvalidZip(String),

    #[error(transparent)]
    Geocode(#[from] GeocodeError),

    #[error("failed to save configuration: {0:#}")]
    Store(#[from] anyhow::Error),
}

impl SetupError {
    /// Whether the user can fix this by editing the form and retrying.
    pub fn is_correctable(&self) -> bool {
        !matches!(self, SetupError::Store(_))
    }
}

fn validate(request: &SetupRequest) -> Result<(String, String), SetupError> {
    let api_key = request.api_key.trim();
    if api_key.is_empty() {
        return Err(SetupError::MissingApiKey);
    }

    let zip = request.zip_code.trim();
    if zip.len() != 5 || !zip.chars().all(|c| c.is_ascii_digit()) {
        return Err(SetupError::InvalidZip(zip.to_string()));
    }

    Ok((api_key.to_string(), zip.to_string()))
}

/// Resolve the ZIP code and persist the configuration.
///
/// Nothing is written unless the lookup succeeds.
pub async fn save_config(
    store: &dyn ConfigStore,
    geocoder: &dyn Geocoder,
    request: &SetupRequest,
) -> Result<AppConfig, SetupError> {
    let (api_key, zip_code) = validate(request)?;

    let place = geocoder.resolve(&zip_code).await.inspect_err(|err| {
        warn!("Geocoding failed for ZIP {zip_code}: {err}");
    })?;

    let config = AppConfig {
        api_key,
        zip_code,
        latitude: place.latitude,
        longitude: place.longitude,
        city_name: place.city_name,
        state_abbr: place.state_abbr,
    };
    store.set(&config)?;

    info!("Configuration updated: {} ({})", config.location_label(), config.zip_code);
    Ok(config)
}

/// The "save & sync" action: persist, repoint the scheduler, fetch right away.
pub async fn save_and_sync(
    store: &dyn ConfigStore,
    geocoder: &dyn Geocoder,
    scheduler: &RefreshScheduler,
    request: &SetupRequest,
) -> Result<AppConfig, SetupError> {
    let config = save_config(store, geocoder, request).await?;

    scheduler.reconfigure(&config);
    match scheduler.sync_now() {
        Ok(_) => info!("Immediate sync started after configuration change"),
        Err(RefreshOutcome::Skipped) => {
            info!("Sync already in flight; the new configuration is fetched when it finishes")
        }
        Err(outcome) => warn!("Immediate sync not started: {outcome:?}"),
    }

    Ok(config)
}
