//! OpenWeather client — current conditions and forward geocoding.
//!
//! <https://openweathermap.org/current>

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ConnectorError;

const CURRENT_URL: &str = "https://api.openweathermap.org/data/2.5/weather";
const GEOCODE_URL: &str = "https://api.openweathermap.org/geo/1.0/direct";

/// Current conditions for a city, reshaped from the raw API response.
/// Temperatures are integer-rounded; the rest is passed through.
#[derive(Debug, Clone, Serialize)]
pub struct CurrentWeather {
    /// "City, CC"
    pub location: String,
    pub temperature: i64,
    pub feels_like: i64,
    pub temp_min: i64,
    pub temp_max: i64,
    pub humidity: f64,
    pub pressure: f64,
    pub wind_speed: f64,
    pub wind_direction: f64,
    /// Meters; the API omits it for some stations.
    pub visibility: Option<f64>,
    /// Cloudiness, %.
    pub cloud_cover: f64,
    /// Condition group name, e.g. "Clouds".
    pub conditions: String,
    /// Human-readable condition, e.g. "scattered clouds".
    pub description: String,
    /// Icon code, e.g. "03d".
    pub icon: String,
    pub captured_at: DateTime<Utc>,
}

/// A geocoded city. `None` from `geocode` means "not found" — callers cannot
/// distinguish a miss from an upstream failure.
#[derive(Debug, Clone, Deserialize)]
pub struct GeoLocation {
    pub name: String,
    #[serde(default)]
    pub country: String,
    #[serde(rename = "lat")]
    pub latitude: f64,
    #[serde(rename = "lon")]
    pub longitude: f64,
}

pub struct WeatherClient {
    api_key: Option<String>,
    http: reqwest::Client,
}

impl WeatherClient {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            api_key,
            http: reqwest::Client::new(),
        }
    }

    fn require_api_key(&self) -> Result<&str, ConnectorError> {
        self.api_key
            .as_deref()
            .ok_or_else(|| ConnectorError::Config("OPENWEATHER_API_KEY is not set".into()))
    }

    /// Fetch current conditions for a named city.
    pub async fn fetch_current(
        &self,
        city: &str,
        units: &str,
    ) -> Result<CurrentWeather, ConnectorError> {
        let api_key = self.require_api_key()?;

        let resp = self
            .http
            .get(CURRENT_URL)
            .query(&[("q", city), ("units", units), ("appid", api_key)])
            .send()
            .await
            .map_err(|e| ConnectorError::Upstream(format!("Weather fetch failed: {e}")))?;

        match resp.status() {
            reqwest::StatusCode::NOT_FOUND => {
                return Err(ConnectorError::NotFound(format!("City '{city}'")));
            }
            reqwest::StatusCode::UNAUTHORIZED => {
                return Err(ConnectorError::Config(
                    "weather API key was rejected".into(),
                ));
            }
            status if !status.is_success() => {
                let body = resp.text().await.unwrap_or_default();
                return Err(ConnectorError::Upstream(format!(
                    "Weather fetch failed ({status}): {body}"
                )));
            }
            _ => {}
        }

        let raw: ApiResponse = resp
            .json()
            .await
            .map_err(|e| ConnectorError::Upstream(format!("Invalid weather response: {e}")))?;
        Ok(map_current(raw))
    }

    /// Resolve a city name to coordinates. Failures are logged and swallowed.
    pub async fn geocode(&self, city: &str) -> Option<GeoLocation> {
        let api_key = match self.require_api_key() {
            Ok(key) => key,
            Err(e) => {
                warn!("Geocoding skipped: {e}");
                return None;
            }
        };

        let resp = self
            .http
            .get(GEOCODE_URL)
            .query(&[("q", city), ("limit", "1"), ("appid", api_key)])
            .send()
            .await;

        let resp = match resp {
            Ok(r) if r.status().is_success() => r,
            Ok(r) => {
                warn!("Geocoding '{city}' returned {}", r.status());
                return None;
            }
            Err(e) => {
                warn!("Geocoding '{city}' failed: {e}");
                return None;
            }
        };

        match resp.json::<Vec<GeoLocation>>().await {
            Ok(mut hits) if !hits.is_empty() => Some(hits.remove(0)),
            Ok(_) => None,
            Err(e) => {
                warn!("Invalid geocoding response for '{city}': {e}");
                None
            }
        }
    }
}

// ── Raw API response ────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApiResponse {
    name: String,
    #[serde(default)]
    sys: ResponseSys,
    main: ResponseMain,
    #[serde(default)]
    wind: ResponseWind,
    #[serde(default)]
    clouds: ResponseClouds,
    #[serde(default)]
    weather: Vec<ResponseCondition>,
    visibility: Option<f64>,
    #[serde(rename = "dt")]
    timestamp: i64,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseSys {
    #[serde(default)]
    country: String,
}

#[derive(Debug, Deserialize)]
struct ResponseMain {
    temp: f64,
    feels_like: f64,
    temp_min: f64,
    temp_max: f64,
    pressure: f64,
    humidity: f64,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseWind {
    #[serde(default)]
    speed: f64,
    #[serde(default)]
    deg: f64,
}

#[derive(Debug, Default, Deserialize)]
struct ResponseClouds {
    #[serde(default)]
    all: f64,
}

#[derive(Debug, Deserialize)]
struct ResponseCondition {
    main: String,
    description: String,
    icon: String,
}

fn map_current(raw: ApiResponse) -> CurrentWeather {
    let condition = raw.weather.into_iter().next();
    let location = if raw.sys.country.is_empty() {
        raw.name
    } else {
        format!("{}, {}", raw.name, raw.sys.country)
    };

    CurrentWeather {
        location,
        temperature: raw.main.temp.round() as i64,
        feels_like: raw.main.feels_like.round() as i64,
        temp_min: raw.main.temp_min.round() as i64,
        temp_max: raw.main.temp_max.round() as i64,
        humidity: raw.main.humidity,
        pressure: raw.main.pressure,
        wind_speed: raw.wind.speed,
        wind_direction: raw.wind.deg,
        visibility: raw.visibility,
        cloud_cover: raw.clouds.all,
        conditions: condition.as_ref().map(|c| c.main.clone()).unwrap_or_default(),
        description: condition
            .as_ref()
            .map(|c| c.description.clone())
            .unwrap_or_default(),
        icon: condition.map(|c| c.icon).unwrap_or_default(),
        captured_at: Utc.timestamp_opt(raw.timestamp, 0).single().unwrap_or_else(Utc::now),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const AUSTIN: &str = r#"{
        "coord": {"lon": -97.74, "lat": 30.27},
        "weather": [{"id": 801, "main": "Clouds", "description": "few clouds", "icon": "02d"}],
        "base": "stations",
        "main": {"temp": 22.5, "feels_like": 23.1, "temp_min": 20.4, "temp_max": 25.6, "pressure": 1013, "humidity": 65},
        "visibility": 10000,
        "wind": {"speed": 3.5, "deg": 180, "gust": 5.2},
        "clouds": {"all": 20},
        "dt": 1705500000,
        "sys": {"type": 2, "id": 2000, "country": "US", "sunrise": 1705490000, "sunset": 1705530000},
        "timezone": -21600,
        "id": 4671654,
        "name": "Austin",
        "cod": 200
    }"#;

    #[test]
    fn test_map_current_from_real_response() {
        let raw: ApiResponse = serde_json::from_str(AUSTIN).unwrap();
        let current = map_current(raw);

        assert_eq!(current.location, "Austin, US");
        assert_eq!(current.temperature, 23);
        assert_eq!(current.feels_like, 23);
        assert_eq!(current.temp_min, 20);
        assert_eq!(current.temp_max, 26);
        assert!((0.0..=100.0).contains(&current.humidity));
        assert_eq!(current.pressure, 1013.0);
        assert_eq!(current.wind_speed, 3.5);
        assert_eq!(current.wind_direction, 180.0);
        assert_eq!(current.visibility, Some(10000.0));
        assert_eq!(current.cloud_cover, 20.0);
        assert_eq!(current.conditions, "Clouds");
        assert_eq!(current.description, "few clouds");
        assert_eq!(current.icon, "02d");
        assert_eq!(current.captured_at.timestamp(), 1705500000);
    }

    #[test]
    fn test_map_current_without_optional_blocks() {
        let raw: ApiResponse = serde_json::from_str(
            r#"{
                "name": "Nowhere",
                "main": {"temp": -0.4, "feels_like": -3.6, "temp_min": -1.0, "temp_max": 0.2, "pressure": 990, "humidity": 80},
                "dt": 1705500000
            }"#,
        )
        .unwrap();
        let current = map_current(raw);

        assert_eq!(current.location, "Nowhere");
        assert_eq!(current.temperature, 0);
        assert_eq!(current.feels_like, -4);
        assert!(current.visibility.is_none());
        assert_eq!(current.cloud_cover, 0.0);
        assert_eq!(current.conditions, "");
        assert_eq!(current.icon, "");
    }

    #[test]
    fn test_geolocation_parse() {
        let hits: Vec<GeoLocation> = serde_json::from_str(
            r#"[{"name": "London", "lat": 51.5073, "lon": -0.1276, "country": "GB", "state": "England"}]"#,
        )
        .unwrap();
        assert_eq!(hits[0].name, "London");
        assert_eq!(hits[0].country, "GB");
        assert!((hits[0].latitude - 51.5073).abs() < 1e-9);
    }
}
