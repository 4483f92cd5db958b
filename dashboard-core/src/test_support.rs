//! Fixtures and fakes shared by the unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, FixedOffset, TimeZone};
use std::sync::{
    Mutex,
    atomic::{AtomicUsize, Ordering},
};
use tokio::sync::Notify;

use crate::{
    error::{ErrorKind, FetchError, GeocodeError},
    geocoder::{Geocoder, Place},
    model::{
        AppConfig, Condition, CurrentConditions, DailyForecast, FetchTarget, Units,
        WeatherSnapshot,
    },
    provider::WeatherClient,
};

pub(crate) fn sample_config() -> AppConfig {
    AppConfig {
        api_key: "KEY".into(),
        zip_code: "62701".into(),
        latitude: 39.799,
        longitude: -89.644,
        city_name: "Springfield".into(),
        state_abbr: Some("IL".into()),
    }
}

fn base_time() -> DateTime<FixedOffset> {
    FixedOffset::west_opt(6 * 3600)
        .expect("valid offset")
        .with_ymd_and_hms(2024, 5, 1, 12, 0, 0)
        .single()
        .expect("valid time")
}

fn day(index: i64) -> DailyForecast {
    let noon = base_time() + Duration::days(index);
    DailyForecast {
        date: noon.date_naive(),
        high: 75.0 + index as f64,
        low: 55.0,
        day_temp: 70.0,
        night_temp: 58.0,
        feels_like_day: 69.0,
        humidity_pct: 40,
        clouds_pct: 20,
        sunrise: noon - Duration::hours(6),
        sunset: noon + Duration::hours(8),
        condition: Condition::Rain,
        is_daytime: true,
        description: "Light rain".to_string(),
        summary: Some(format!("Rain on day {index}")),
    }
}

/// A complete snapshot; `timezone` doubles as an identity marker in tests.
pub(crate) fn sample_snapshot(timezone: &str) -> WeatherSnapshot {
    let now = base_time();
    WeatherSnapshot {
        timezone: timezone.to_string(),
        units: Units::Imperial,
        current: CurrentConditions {
            observed_at: now,
            temperature: 71.6,
            feels_like: 70.2,
            humidity_pct: 45,
            dew_point: 48.9,
            wind_speed: 8.4,
            uv_index: 3.2,
            visibility: 10.0,
            sunrise: Some(now - Duration::hours(6)),
            sunset: Some(now + Duration::hours(8)),
            condition: Condition::Clear,
            description: "Clear sky".to_string(),
            is_daytime: true,
        },
        daily: [day(0), day(1), day(2), day(3), day(4)],
        alerts: Vec::new(),
        fetched_at: now,
    }
}

/// Weather client that counts calls and replays a fixed outcome.
///
/// When gated, each call waits for [`FakeClient::release`] before returning.
#[derive(Debug)]
pub(crate) struct FakeClient {
    calls: AtomicUsize,
    outcome: Mutex<Option<ErrorKind>>,
    gated: bool,
    gate: Notify,
}

impl FakeClient {
    pub(crate) fn ok() -> Self {
        Self { calls: AtomicUsize::new(0), outcome: Mutex::new(None), gated: false, gate: Notify::new() }
    }

    pub(crate) fn gated() -> Self {
        Self { gated: true, ..Self::ok() }
    }

    pub(crate) fn failing(kind: ErrorKind) -> Self {
        Self { outcome: Mutex::new(Some(kind)), ..Self::ok() }
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub(crate) fn release(&self) {
        self.gate.notify_one();
    }

    pub(crate) fn succeed_from_now_on(&self) {
        if let Ok(mut outcome) = self.outcome.lock() {
            *outcome = None;
        }
    }
}

#[async_trait]
impl WeatherClient for FakeClient {
    async fn fetch(&self, target: &FetchTarget) -> Result<WeatherSnapshot, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.gated {
            self.gate.notified().await;
        }

        let failure = self.outcome.lock().ok().and_then(|o| *o).map(|kind| match kind {
            ErrorKind::Auth => FetchError::Auth { status: 401 },
            ErrorKind::RateLimited => FetchError::RateLimited,
            ErrorKind::Transient => FetchError::Transient("connection refused".to_string()),
            ErrorKind::Parse => FetchError::Parse("expected 5 daily entries, got 4".to_string()),
        });

        match failure {
            Some(err) => Err(err),
            None => Ok(sample_snapshot(&format!("{:.2},{:.2}", target.latitude, target.longitude))),
        }
    }
}

/// Geocoder that knows a single ZIP code.
#[derive(Debug)]
pub(crate) struct FakeGeocoder;

#[async_trait]
impl Geocoder for FakeGeocoder {
    async fn resolve(&self, zip_code: &str) -> Result<Place, GeocodeError> {
        match zip_code {
            "62701" => Ok(Place {
                latitude: 39.799,
                longitude: -89.644,
                city_name: "Springfield".to_string(),
                state_abbr: Some("IL".to_string()),
            }),
            other => Err(GeocodeError::NotFound(other.to_string())),
        }
    }
}
