use chrono::{DateTime, FixedOffset, NaiveDate};
use serde::{Deserialize, Serialize};

/// Number of forecast days carried by every snapshot.
pub const FORECAST_DAYS: usize = 5;

/// Unit system used for both the provider request and display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Units {
    #[default]
    Imperial,
    Metric,
}

impl Units {
    /// Value of the provider's `units` query parameter.
    pub fn as_query(&self) -> &'static str {
        match self {
            Units::Imperial => "imperial",
            Units::Metric => "metric",
        }
    }

    pub fn speed_label(&self) -> &'static str {
        match self {
            Units::Imperial => "mph",
            Units::Metric => "km/h",
        }
    }

    pub fn distance_label(&self) -> &'static str {
        match self {
            Units::Imperial => "mi",
            Units::Metric => "km",
        }
    }

    /// Converts a provider visibility in metres to the display distance.
    pub fn visibility_from_metres(&self, metres: f64) -> f64 {
        match self {
            Units::Imperial => metres / 1609.34,
            Units::Metric => metres / 1000.0,
        }
    }

    /// Converts a provider wind speed to the display speed.
    ///
    /// Imperial responses are already in mph; metric responses are in m/s.
    pub fn wind_from_provider(&self, speed: f64) -> f64 {
        match self {
            Units::Imperial => speed,
            Units::Metric => speed * 3.6,
        }
    }
}

/// Simplified weather condition categories, one per icon family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Condition {
    Clear,
    FewClouds,
    ScatteredClouds,
    BrokenClouds,
    ShowerRain,
    Rain,
    Thunderstorm,
    Snow,
    Mist,
    Unknown,
}

impl Condition {
    /// Maps a provider weather id (e.g. `500` light rain) to a condition.
    pub fn from_code(code: u16) -> Self {
        match code {
            200..=232 => Condition::Thunderstorm,
            300..=321 => Condition::ShowerRain,
            500..=504 => Condition::Rain,
            511 => Condition::Snow,
            520..=531 => Condition::ShowerRain,
            600..=622 => Condition::Snow,
            701..=781 => Condition::Mist,
            800 => Condition::Clear,
            801 => Condition::FewClouds,
            802 => Condition::ScatteredClouds,
            803 | 804 => Condition::BrokenClouds,
            _ => Condition::Unknown,
        }
    }

    pub const fn all() -> &'static [Condition] {
        &[
            Condition::Clear,
            Condition::FewClouds,
            Condition::ScatteredClouds,
            Condition::BrokenClouds,
            Condition::ShowerRain,
            Condition::Rain,
            Condition::Thunderstorm,
            Condition::Snow,
            Condition::Mist,
            Condition::Unknown,
        ]
    }
}

/// Condition plus day/night flag; the unit of asset selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConditionKey {
    pub condition: Condition,
    pub is_daytime: bool,
}

impl ConditionKey {
    pub fn new(condition: Condition, is_daytime: bool) -> Self {
        Self { condition, is_daytime }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CurrentConditions {
    pub observed_at: DateTime<FixedOffset>,
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity_pct: u8,
    pub dew_point: f64,
    pub wind_speed: f64,
    pub uv_index: f64,
    pub visibility: f64,
    pub sunrise: Option<DateTime<FixedOffset>>,
    pub sunset: Option<DateTime<FixedOffset>>,
    pub condition: Condition,
    pub description: String,
    pub is_daytime: bool,
}

impl CurrentConditions {
    pub fn key(&self) -> ConditionKey {
        ConditionKey::new(self.condition, self.is_daytime)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DailyForecast {
    pub date: NaiveDate,
    pub high: f64,
    pub low: f64,
    pub day_temp: f64,
    pub night_temp: f64,
    pub feels_like_day: f64,
    pub humidity_pct: u8,
    pub clouds_pct: u8,
    pub sunrise: DateTime<FixedOffset>,
    pub sunset: DateTime<FixedOffset>,
    pub condition: Condition,
    pub is_daytime: bool,
    pub description: String,
    /// Provider's free-text summary of the day, when it sends one.
    pub summary: Option<String>,
}

impl DailyForecast {
    pub fn key(&self) -> ConditionKey {
        ConditionKey::new(self.condition, self.is_daytime)
    }

    /// Full text shown when hovering the day's forecast box.
    pub fn tooltip(&self) -> String {
        let mut text = format!(
            "{}\nDay: {:.0}° (Feels: {:.0}°)\nNight: {:.0}°\nClouds: {}%",
            self.description, self.day_temp, self.feels_like_day, self.night_temp, self.clouds_pct,
        );
        if let Some(summary) = self.summary.as_deref().filter(|s| !s.is_empty()) {
            text.push('\n');
            text.push_str(summary);
        }
        text
    }
}

/// Everything captured by one successful poll.
///
/// Shared behind an `Arc` and never mutated; a newer poll replaces it whole.
#[derive(Debug, Clone, PartialEq)]
pub struct WeatherSnapshot {
    /// IANA timezone name reported by the provider, e.g. `America/Chicago`.
    pub timezone: String,
    pub units: Units,
    pub current: CurrentConditions,
    pub daily: [DailyForecast; FORECAST_DAYS],
    pub alerts: Vec<String>,
    pub fetched_at: DateTime<FixedOffset>,
}

impl WeatherSnapshot {
    /// Human-readable place derived from the timezone (`America/New_York` -> `New York`).
    pub fn timezone_label(&self) -> String {
        self.timezone
            .rsplit('/')
            .next()
            .unwrap_or("Local")
            .replace('_', " ")
    }
}

/// Persisted user configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub api_key: String,
    pub zip_code: String,
    pub latitude: f64,
    pub longitude: f64,
    pub city_name: String,
    pub state_abbr: Option<String>,
}

impl AppConfig {
    /// Display label for the location, e.g. `Springfield, IL`.
    pub fn location_label(&self) -> String {
        match self.state_abbr.as_deref() {
            Some(state) if !state.is_empty() => format!("{}, {}", self.city_name, state),
            _ => self.city_name.clone(),
        }
    }

    pub fn fetch_target(&self) -> FetchTarget {
        FetchTarget {
            latitude: self.latitude,
            longitude: self.longitude,
            api_key: self.api_key.clone(),
        }
    }
}

/// Coordinates and credentials for one weather request.
#[derive(Debug, Clone, PartialEq)]
pub struct FetchTarget {
    pub latitude: f64,
    pub longitude: f64,
    pub api_key: String,
}
