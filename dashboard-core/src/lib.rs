//! Core library for the weather dashboard.
//!
//! This crate defines:
//! - Runtime settings and the persisted user configuration
//! - The OpenWeather client and ZIP code geocoder
//! - Snapshot publication, sync status and the refresh scheduler
//! - Frame rendering and the scrolling alert ticker
//!
//! It is used by `weather-dashboard`, but the scheduler and renderer have no
//! terminal dependencies and can drive other front ends.

pub mod assets;
pub mod config;
pub mod error;
pub mod geocoder;
pub mod logging;
pub mod model;
pub mod provider;
pub mod render;
pub mod scheduler;
pub mod setup;
pub mod snapshot;
pub mod status;
pub mod store;
pub mod ticker;

#[cfg(test)]
mod test_support;

pub use config::Settings;
pub use error::{ErrorKind, FetchError, GeocodeError};
pub use model::{AppConfig, Units, WeatherSnapshot};
pub use provider::WeatherClient;
pub use scheduler::{RefreshOutcome, RefreshScheduler};
pub use snapshot::SnapshotStore;
pub use status::SyncStatus;
