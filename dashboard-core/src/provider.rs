use crate::{
    config::Settings,
    error::FetchError,
    model::{FetchTarget, WeatherSnapshot},
    provider::openweather::OpenWeatherClient,
};
use async_trait::async_trait;
use std::{fmt::Debug, sync::Arc};

pub mod openweather;

/// Source of weather snapshots.
///
/// One call returns current conditions, the daily forecast and active alerts
/// for a single location.
#[async_trait]
pub trait WeatherClient: Send + Sync + Debug {
    async fn fetch(&self, target: &FetchTarget) -> Result<WeatherSnapshot, FetchError>;
}

/// Construct the weather client described by the runtime settings.
pub fn client_from_settings(settings: &Settings) -> anyhow::Result<Arc<dyn WeatherClient>> {
    let client = OpenWeatherClient::new(
        settings.units,
        settings.language.clone(),
        settings.request_timeout(),
    )?;

    Ok(Arc::new(client))
}
