use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use log::debug;
use reqwest::{Client, StatusCode};
use serde::Deserialize;
use std::time::Duration;

use crate::{
    error::FetchError,
    model::{
        Condition, CurrentConditions, DailyForecast, FORECAST_DAYS, FetchTarget, Units,
        WeatherSnapshot,
    },
};

use super::WeatherClient;

const DEFAULT_BASE_URL: &str = "https://api.openweathermap.org";

/// OpenWeather One Call 3.0 client.
#[derive(Debug, Clone)]
pub struct OpenWeatherClient {
    http: Client,
    base_url: String,
    units: Units,
    language: String,
}

impl OpenWeatherClient {
    pub fn new(units: Units, language: String, timeout: Duration) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| anyhow::anyhow!("Failed to build HTTP client: {err}"))?;

        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
            units,
            language,
        })
    }

    /// Point the client at another host serving the same API.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn onecall_url(&self) -> String {
        format!("{}/data/3.0/onecall", self.base_url.trim_end_matches('/'))
    }
}

#[async_trait]
impl WeatherClient for OpenWeatherClient {
    async fn fetch(&self, target: &FetchTarget) -> Result<WeatherSnapshot, FetchError> {
        let lat = target.latitude.to_string();
        let lon = target.longitude.to_string();

        debug!("Requesting One Call data for {lat},{lon}");

        let res = self
            .http
            .get(self.onecall_url())
            .query(&[
                ("lat", lat.as_str()),
                ("lon", lon.as_str()),
                ("appid", target.api_key.as_str()),
                ("units", self.units.as_query()),
                ("lang", self.language.as_str()),
                ("exclude", "minutely,hourly"),
            ])
            .send()
            .await?;

        let status = res.status();
        let body = res.text().await?;

        classify_status(status, &body)?;

        parse_onecall(&body, self.units, Utc::now())
    }
}

/// Map a non-success HTTP status to the matching error.
pub fn classify_status(status: StatusCode, body: &str) -> Result<(), FetchError> {
    if status.is_success() {
        return Ok(());
    }

    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            Err(FetchError::Auth { status: status.as_u16() })
        }
        StatusCode::TOO_MANY_REQUESTS => Err(FetchError::RateLimited),
        _ => Err(FetchError::Transient(format!(
            "request failed with status {}: {}",
            status,
            truncate_body(body),
        ))),
    }
}

/// Normalize a One Call response body into a snapshot.
///
/// The request is made in the display unit system, so temperatures pass
/// through unchanged; visibility, metric wind and timestamps are converted.
pub fn parse_onecall(
    body: &str,
    units: Units,
    fetched_at: DateTime<Utc>,
) -> Result<WeatherSnapshot, FetchError> {
    let parsed: OcResponse = serde_json::from_str(body)
        .map_err(|err| FetchError::Parse(format!("invalid One Call JSON: {err}")))?;

    let offset = FixedOffset::east_opt(parsed.timezone_offset).ok_or_else(|| {
        FetchError::Parse(format!("invalid timezone offset {}", parsed.timezone_offset))
    })?;

    let current = parsed
        .current
        .ok_or_else(|| FetchError::Parse("response has no current conditions".to_string()))?;
    let current = map_current(current, units, offset)?;

    let mut raw_daily = parsed.daily;
    if raw_daily.len() < FORECAST_DAYS {
        return Err(FetchError::Parse(format!(
            "expected {FORECAST_DAYS} daily entries, got {}",
            raw_daily.len()
        )));
    }
    raw_daily.sort_by_key(|d| d.dt);

    let days = raw_daily
        .into_iter()
        .take(FORECAST_DAYS)
        .map(|d| map_daily(d, offset))
        .collect::<Result<Vec<_>, _>>()?;
    let daily: [DailyForecast; FORECAST_DAYS] = days.try_into().map_err(|v: Vec<_>| {
        FetchError::Parse(format!("expected {FORECAST_DAYS} daily entries, got {}", v.len()))
    })?;

    let alerts = parsed.alerts.into_iter().map(format_alert).collect();

    Ok(WeatherSnapshot {
        timezone: parsed.timezone,
        units,
        current,
        daily,
        alerts,
        fetched_at: fetched_at.with_timezone(&offset),
    })
}

fn map_current(
    raw: OcCurrent,
    units: Units,
    offset: FixedOffset,
) -> Result<CurrentConditions, FetchError> {
    let observed_at = to_local(raw.dt, offset)?;
    let sunrise = raw.sunrise.map(|ts| to_local(ts, offset)).transpose()?;
    let sunset = raw.sunset.map(|ts| to_local(ts, offset)).transpose()?;
    let weather = raw.weather.first();

    let is_daytime = daytime_flag(weather, raw.dt, raw.sunrise, raw.sunset);
    let (condition, description) = describe(weather);

    Ok(CurrentConditions {
        observed_at,
        temperature: raw.temp,
        feels_like: raw.feels_like,
        humidity_pct: raw.humidity,
        dew_point: raw.dew_point,
        wind_speed: units.wind_from_provider(raw.wind_speed),
        uv_index: raw.uvi,
        visibility: units.visibility_from_metres(raw.visibility),
        sunrise,
        sunset,
        condition,
        description,
        is_daytime,
    })
}

fn map_daily(raw: OcDaily, offset: FixedOffset) -> Result<DailyForecast, FetchError> {
    let at = to_local(raw.dt, offset)?;
    let weather = raw.weather.first();
    let is_daytime = daytime_flag(weather, raw.dt, Some(raw.sunrise), Some(raw.sunset));
    let (condition, description) = describe(weather);

    Ok(DailyForecast {
        date: at.date_naive(),
        high: raw.temp.max,
        low: raw.temp.min,
        day_temp: raw.temp.day,
        night_temp: raw.temp.night,
        feels_like_day: raw.feels_like.day,
        humidity_pct: raw.humidity,
        clouds_pct: raw.clouds,
        sunrise: to_local(raw.sunrise, offset)?,
        sunset: to_local(raw.sunset, offset)?,
        condition,
        is_daytime,
        description,
        summary: raw.summary,
    })
}

fn describe(weather: Option<&OcWeather>) -> (Condition, String) {
    match weather {
        Some(w) => (Condition::from_code(w.id), capitalize(&w.description)),
        None => (Condition::Unknown, "Unknown".to_string()),
    }
}

/// The icon suffix (`01d` / `01n`) wins; otherwise compare against sunrise/sunset.
fn daytime_flag(
    weather: Option<&OcWeather>,
    dt: i64,
    sunrise: Option<i64>,
    sunset: Option<i64>,
) -> bool {
    let icon = weather.map(|w| w.icon.as_str()).unwrap_or_default();
    if icon.ends_with('n') {
        return false;
    }
    if icon.ends_with('d') {
        return true;
    }

    match (sunrise, sunset) {
        (Some(rise), Some(set)) => rise <= dt && dt < set,
        _ => true,
    }
}

fn format_alert(alert: OcAlert) -> String {
    let event = alert.event.unwrap_or_else(|| "Alert".to_string());
    let description = alert.description.replace('\n', " ");
    format!("*** {}: {} ***", event.to_uppercase(), description.trim())
}

fn to_local(ts: i64, offset: FixedOffset) -> Result<DateTime<FixedOffset>, FetchError> {
    DateTime::<Utc>::from_timestamp(ts, 0)
        .map(|utc| utc.with_timezone(&offset))
        .ok_or_else(|| FetchError::Parse(format!("timestamp {ts} out of range")))
}

fn capitalize(text: &str) -> String {
    let mut chars = text.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 200;
    if body.len() > MAX {
        let cut = (0..=MAX).rev().find(|i| body.is_char_boundary(*i)).unwrap_or(0);
        format!("{}...", &body[..cut])
    } else {
        body.to_string()
    }
}

#[derive(Debug, Deserialize)]
struct OcWeather {
    id: u16,
    description: String,
    #[serde(default)]
    icon: String,
}

#[derive(Debug, Deserialize)]
struct OcCurrent {
    dt: i64,
    sunrise: Option<i64>,
    sunset: Option<i64>,
    temp: f64,
    feels_like: f64,
    humidity: u8,
    dew_point: f64,
    #[serde(default)]
    uvi: f64,
    #[serde(default)]
    visibility: f64,
    wind_speed: f64,
    #[serde(default)]
    weather: Vec<OcWeather>,
}

#[derive(Debug, Deserialize)]
struct OcDailyTemp {
    day: f64,
    min: f64,
    max: f64,
    night: f64,
}

#[derive(Debug, Deserialize)]
struct OcDailyFeelsLike {
    day: f64,
}

#[derive(Debug, Deserialize)]
struct OcDaily {
    dt: i64,
    sunrise: i64,
    sunset: i64,
    summary: Option<String>,
    temp: OcDailyTemp,
    feels_like: OcDailyFeelsLike,
    humidity: u8,
    #[serde(default)]
    clouds: u8,
    #[serde(default)]
    weather: Vec<OcWeather>,
}

#[derive(Debug, Deserialize)]
struct OcAlert {
    event: Option<String>,
    #[serde(default)]
    description: String,
}

#[derive(Debug, Deserialize)]
struct OcResponse {
    #[serde(default)]
    timezone: String,
    #[serde(default)]
    timezone_offset: i32,
    current: Option<OcCurrent>,
    #[serde(default)]
    daily: Vec<OcDaily>,
    #[serde(default)]
    alerts: Vec<OcAlert>,
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::{Value, json};
    use tokio::{
        io::{AsyncReadExt, AsyncWriteExt},
        net::TcpListener,
        task::JoinHandle,
    };

    const DAY: i64 = 86_400;
    const BASE: i64 = 1_700_000_000;

    fn daily_entry(index: i64) -> Value {
        let dt = BASE + index * DAY;
        json!({
            "dt": dt,
            "sunrise": dt - 20_000,
            "sunset": dt + 15_000,
            "summary": format!("Day {index} summary"),
            "temp": { "day": 70.0 + index as f64, "min": 55.0, "max": 75.0, "night": 58.0 },
            "feels_like": { "day": 69.0, "night": 57.0 },
            "humidity": 40,
            "clouds": 20,
            "weather": [{ "id": 500, "main": "Rain", "description": "light rain", "icon": "10d" }]
        })
    }

    /// One Call body with `days` daily entries and the given alerts.
    pub(crate) fn onecall_body(days: i64, alerts: Value) -> String {
        let daily: Vec<Value> = (0..days).map(daily_entry).collect();
        json!({
            "lat": 39.8,
            "lon": -89.6,
            "timezone": "America/Chicago",
            "timezone_offset": -21_600,
            "current": {
                "dt": BASE,
                "sunrise": BASE - 20_000,
                "sunset": BASE + 15_000,
                "temp": 71.6,
                "feels_like": 70.2,
                "humidity": 45,
                "dew_point": 48.9,
                "uvi": 3.2,
                "visibility": 16093.4,
                "wind_speed": 8.4,
                "weather": [{ "id": 800, "main": "Clear", "description": "clear sky", "icon": "01d" }]
            },
            "daily": daily,
            "alerts": alerts
        })
        .to_string()
    }

    fn fetched_at() -> DateTime<Utc> {
        DateTime::<Utc>::from_timestamp(BASE + 60, 0).expect("valid timestamp")
    }

    #[test]
    fn parses_current_conditions() {
        let snap = parse_onecall(&onecall_body(8, json!([])), Units::Imperial, fetched_at())
            .expect("body should parse");

        assert_eq!(snap.timezone, "America/Chicago");
        assert_eq!(snap.timezone_label(), "Chicago");
        assert_eq!(snap.current.condition, Condition::Clear);
        assert_eq!(snap.current.description, "Clear sky");
        assert!(snap.current.is_daytime);
        assert!((snap.current.visibility - 10.0).abs() < 0.01);
        assert_eq!(snap.fetched_at.offset().local_minus_utc(), -21_600);
    }

    #[test]
    fn truncates_daily_to_five_in_order() {
        let snap = parse_onecall(&onecall_body(8, json!([])), Units::Imperial, fetched_at())
            .expect("body should parse");

        assert_eq!(snap.daily.len(), FORECAST_DAYS);
        for pair in snap.daily.windows(2) {
            assert!(pair[0].date < pair[1].date);
        }
        assert_eq!(snap.daily[0].summary.as_deref(), Some("Day 0 summary"));
        assert_eq!(snap.daily[0].condition, Condition::Rain);
    }

    #[test]
    fn unordered_daily_entries_are_sorted() {
        let mut body: Value =
            serde_json::from_str(&onecall_body(6, json!([]))).expect("fixture is JSON");
        body["daily"].as_array_mut().expect("daily array").reverse();

        let snap = parse_onecall(&body.to_string(), Units::Imperial, fetched_at())
            .expect("body should parse");

        assert_eq!(snap.daily[0].summary.as_deref(), Some("Day 0 summary"));
        assert_eq!(snap.daily[4].summary.as_deref(), Some("Day 4 summary"));
    }

    #[test]
    fn four_daily_entries_is_a_parse_error() {
        let err = parse_onecall(&onecall_body(4, json!([])), Units::Imperial, fetched_at())
            .unwrap_err();

        assert!(matches!(err, FetchError::Parse(_)));
        assert!(err.to_string().contains("got 4"));
    }

    #[test]
    fn missing_current_is_a_parse_error() {
        let body = json!({ "timezone": "UTC", "timezone_offset": 0, "daily": [] }).to_string();
        let err = parse_onecall(&body, Units::Imperial, fetched_at()).unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }

    #[test]
    fn non_json_body_is_a_parse_error() {
        let err = parse_onecall("<html>oops</html>", Units::Metric, fetched_at()).unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)));
    }

    #[test]
    fn alerts_are_flattened_to_ticker_text() {
        let alerts = json!([
            { "sender_name": "NWS", "event": "Flood Watch", "description": "Heavy rain\nexpected" }
        ]);
        let snap = parse_onecall(&onecall_body(5, alerts), Units::Imperial, fetched_at())
            .expect("body should parse");

        assert_eq!(snap.alerts, vec!["*** FLOOD WATCH: Heavy rain expected ***".to_string()]);
    }

    #[test]
    fn night_icon_marks_current_as_night() {
        let mut body: Value =
            serde_json::from_str(&onecall_body(5, json!([]))).expect("fixture is JSON");
        body["current"]["weather"][0]["icon"] = json!("01n");

        let snap = parse_onecall(&body.to_string(), Units::Imperial, fetched_at())
            .expect("body should parse");
        assert!(!snap.current.is_daytime);
    }

    #[test]
    fn metric_response_converts_wind_and_visibility() {
        let snap = parse_onecall(&onecall_body(5, json!([])), Units::Metric, fetched_at())
            .expect("body should parse");

        assert!((snap.current.wind_speed - 8.4 * 3.6).abs() < 1e-9);
        assert!((snap.current.visibility - 16.0934).abs() < 1e-6);
    }

    #[test]
    fn status_classification() {
        assert!(classify_status(StatusCode::OK, "").is_ok());
        assert!(matches!(
            classify_status(StatusCode::UNAUTHORIZED, ""),
            Err(FetchError::Auth { status: 401 })
        ));
        assert!(matches!(
            classify_status(StatusCode::FORBIDDEN, ""),
            Err(FetchError::Auth { status: 403 })
        ));
        assert!(matches!(
            classify_status(StatusCode::TOO_MANY_REQUESTS, ""),
            Err(FetchError::RateLimited)
        ));
        assert!(matches!(
            classify_status(StatusCode::BAD_GATEWAY, "upstream down"),
            Err(FetchError::Transient(_))
        ));
    }

    #[test]
    fn truncate_body_respects_char_boundaries() {
        let body = "é".repeat(150);
        let truncated = truncate_body(&body);
        assert!(truncated.ends_with("..."));
        assert!(truncated.len() <= 203);
    }

    /// Serve one canned HTTP response on a local port.
    ///
    /// The handle resolves to the request head the client sent.
    async fn serve_once(status_line: &'static str, body: String) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.expect("accept");
            let mut buf = vec![0u8; 8192];
            let n = socket.read(&mut buf).await.expect("read request");
            let response = format!(
                "HTTP/1.1 {status_line}\r\nContent-Type: application/json\r\n\
                 Content-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.expect("write response");
            let _ = socket.shutdown().await;
            String::from_utf8_lossy(&buf[..n]).into_owned()
        });

        (format!("http://{addr}"), server)
    }

    fn client_for(base_url: &str, timeout: Duration) -> OpenWeatherClient {
        OpenWeatherClient::new(Units::Imperial, "en".to_string(), timeout)
            .expect("client builds")
            .with_base_url(base_url)
    }

    fn target() -> FetchTarget {
        FetchTarget { latitude: 39.8, longitude: -89.6, api_key: "KEY".to_string() }
    }

    #[tokio::test]
    async fn fetch_sends_onecall_query_and_parses_body() {
        let (url, server) = serve_once("200 OK", onecall_body(8, json!([]))).await;

        let snap = client_for(&url, Duration::from_secs(5)).fetch(&target()).await.expect("fetch");
        assert_eq!(snap.daily.len(), FORECAST_DAYS);
        assert_eq!(snap.timezone, "America/Chicago");

        let request = server.await.expect("server task");
        let request_line = request.lines().next().unwrap_or_default();
        assert!(request_line.starts_with("GET /data/3.0/onecall?"), "{request_line}");
        assert!(request_line.contains("appid=KEY"));
        assert!(request_line.contains("units=imperial"));
        assert!(request_line.contains("exclude=minutely%2Chourly"));
    }

    #[tokio::test]
    async fn unauthorized_response_is_auth_error() {
        let (url, _server) = serve_once("401 Unauthorized", r#"{"cod":401}"#.to_string()).await;

        let err = client_for(&url, Duration::from_secs(5)).fetch(&target()).await.unwrap_err();
        assert!(matches!(err, FetchError::Auth { status: 401 }), "{err:?}");
    }

    #[tokio::test]
    async fn too_many_requests_is_rate_limited() {
        let (url, _server) = serve_once("429 Too Many Requests", "{}".to_string()).await;

        let err = client_for(&url, Duration::from_secs(5)).fetch(&target()).await.unwrap_err();
        assert!(matches!(err, FetchError::RateLimited), "{err:?}");
    }

    #[tokio::test]
    async fn success_with_wrong_shape_is_parse_error() {
        let (url, _server) = serve_once("200 OK", "{}".to_string()).await;

        let err = client_for(&url, Duration::from_secs(5)).fetch(&target()).await.unwrap_err();
        assert!(matches!(err, FetchError::Parse(_)), "{err:?}");
    }

    #[tokio::test]
    async fn hung_server_times_out_as_transient() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let url = format!("http://{}", listener.local_addr().expect("local addr"));
        let _server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.expect("accept");
            tokio::time::sleep(Duration::from_secs(30)).await;
            drop(socket);
        });

        let err = client_for(&url, Duration::from_millis(200)).fetch(&target()).await.unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Transient);
        assert_eq!(err.to_string(), "weather service unreachable: request timed out");
    }
}
