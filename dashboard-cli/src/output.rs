//! Plain-text rendering of a snapshot for `show`.

use std::fmt::Write;

use chrono::{DateTime, FixedOffset};
use dashboard_core::WeatherSnapshot;

fn clock(time: Option<DateTime<FixedOffset>>) -> String {
    time.map(|t| t.format("%H:%M").to_string()).unwrap_or_else(|| "--:--".to_string())
}

pub fn summary(location: &str, snapshot: &WeatherSnapshot) -> String {
    let current = &snapshot.current;
    let units = snapshot.units;
    let location = if location.is_empty() { snapshot.timezone_label() } else { location.to_string() };

    let mut out = String::new();
    let _ = writeln!(out, "{location} ({})", snapshot.timezone);
    let _ = writeln!(
        out,
        "Now: {:.0}° {} (feels {:.0}°)",
        current.temperature, current.description, current.feels_like
    );
    let _ = writeln!(
        out,
        "Humidity {}%  Dew point {:.0}°  Wind {:.0} {}  UV {:.1}  Visibility {:.1} {}",
        current.humidity_pct,
        current.dew_point,
        current.wind_speed,
        units.speed_label(),
        current.uv_index,
        current.visibility,
        units.distance_label(),
    );
    let _ = writeln!(out, "Sunrise {}  Sunset {}", clock(current.sunrise), clock(current.sunset));
    let _ = writeln!(out);

    for day in &snapshot.daily {
        let _ = writeln!(
            out,
            "{}  H {:>3.0}°  L {:>3.0}°  {:>3}%  {}",
            day.date.format("%a %m/%d"),
            day.high,
            day.low,
            day.humidity_pct,
            day.description
        );
    }

    for alert in &snapshot.alerts {
        let _ = writeln!(out, "\n{alert}");
    }

    let _ = writeln!(
        out,
        "\nObserved {} (fetched {})",
        current.observed_at.format("%Y-%m-%d %H:%M"),
        snapshot.fetched_at.format("%H:%M")
    );
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use dashboard_core::{Units, provider::openweather::parse_onecall};

    const BASE: i64 = 1_700_000_000;

    fn body(alerts: &str) -> String {
        let daily: Vec<String> = (0..5)
            .map(|i| {
                let dt = BASE + i * 86_400;
                format!(
                    r#"{{"dt":{dt},"sunrise":{},"sunset":{},"temp":{{"day":70,"min":55,"max":{},"night":58}},
                    "feels_like":{{"day":69}},"humidity":40,"clouds":20,
                    "weather":[{{"id":500,"description":"light rain","icon":"10d"}}]}}"#,
                    dt - 20_000,
                    dt + 15_000,
                    75 + i
                )
            })
            .collect();

        format!(
            r#"{{"timezone":"America/Chicago","timezone_offset":-21600,
            "current":{{"dt":{BASE},"sunrise":{},"sunset":{},"temp":71.6,"feels_like":70.2,"humidity":45,
            "dew_point":48.9,"uvi":3.2,"visibility":16093.4,"wind_speed":8.4,
            "weather":[{{"id":800,"description":"clear sky","icon":"01d"}}]}},
            "daily":[{}],"alerts":{alerts}}}"#,
            BASE - 20_000,
            BASE + 15_000,
            daily.join(",")
        )
    }

    fn snapshot(alerts: &str) -> WeatherSnapshot {
        let fetched_at = chrono::DateTime::<Utc>::from_timestamp(BASE, 0).expect("timestamp");
        parse_onecall(&body(alerts), Units::Imperial, fetched_at).expect("fixture parses")
    }

    #[test]
    fn summary_lists_current_and_five_days() {
        let text = summary("Springfield, IL", &snapshot("[]"));

        assert!(text.starts_with("Springfield, IL (America/Chicago)\n"));
        assert!(text.contains("Now: 72° Clear sky (feels 70°)"));
        assert!(text.contains("mph"));
        assert_eq!(text.lines().filter(|l| l.contains(" H ")).count(), 5);
        assert!(!text.contains("***"));
        assert!(text.ends_with("Observed 2023-11-14 16:13 (fetched 16:13)\n"), "{text}");
    }

    #[test]
    fn summary_appends_alerts_and_falls_back_to_timezone() {
        let text = summary("", &snapshot(r#"[{"event":"Flood Watch","description":"Rising water"}]"#));

        assert!(text.starts_with("Chicago (America/Chicago)\n"));
        assert!(text.contains("*** FLOOD WATCH"));
    }
}
