//! Weather-station operations — a cached, write-through proxy over the
//! platform's entity and feed APIs.
//!
//! Entity objects returned by the platform are treated as opaque JSON; the
//! cache holds whatever the platform returned. The cache is trusted only
//! while non-empty — it never expires, and disconnect drops it.

pub mod geo;

use chrono::Utc;
use serde_json::{json, Value};

use crate::error::ConnectorError;
use crate::platform::LegionApi;
use crate::store::ConnectorStore;
use crate::weather::{CurrentWeather, WeatherClient};

use geo::geodetic_to_ecef;

pub const STATION_CATEGORY: &str = "sensors";
pub const STATION_TYPE: &str = "weather-station";
pub const WEATHER_FEED_NAME: &str = "weather-observations";

const WEATHER_FEED_DESCRIPTION: &str =
    "Current weather readings pushed by the weather connector";
const FEED_CATEGORY: &str = "MESSAGE";
const FEED_CONTENT_TYPE: &str = "application/json";

/// Cached list if non-empty, otherwise a remote search (cached on return).
pub async fn list_stations(
    store: &dyn ConnectorStore,
    api: &LegionApi,
    token: &str,
    org_id: &str,
) -> Result<Vec<Value>, ConnectorError> {
    let cached = store.cached_stations(org_id).await;
    if !cached.is_empty() {
        return Ok(cached);
    }

    let stations = api
        .search_entities(token, STATION_CATEGORY, STATION_TYPE)
        .await?;
    store.cache_stations(org_id, stations.clone()).await;
    Ok(stations)
}

/// Geocode the city, create the sensor entity, attach its ECEF location, and
/// make sure the shared weather feed exists.
pub async fn create_station(
    store: &dyn ConnectorStore,
    api: &LegionApi,
    weather: &WeatherClient,
    token: &str,
    org_id: &str,
    city: &str,
) -> Result<Value, ConnectorError> {
    let geo = weather
        .geocode(city)
        .await
        .ok_or_else(|| ConnectorError::NotFound(format!("City '{city}'")))?;

    let entity = api
        .create_entity(
            token,
            &json!({
                "name": format!("Weather Station - {}", geo.name),
                "category": STATION_CATEGORY,
                "type": STATION_TYPE,
                "metadata": {
                    "city": geo.name,
                    "country": geo.country,
                    "latitude": geo.latitude,
                    "longitude": geo.longitude,
                    "capabilities": ["temperature", "humidity", "pressure", "wind", "conditions"],
                },
            }),
        )
        .await?;

    if let Some(id) = entity.get("id").and_then(Value::as_str) {
        let point = geodetic_to_ecef(geo.latitude, geo.longitude, 0.0);
        api.set_entity_location(
            token,
            id,
            &json!({
                "point": { "x": point.x, "y": point.y, "z": point.z },
                "timestamp": Utc::now(),
            }),
        )
        .await?;
    }

    store.append_station(org_id, entity.clone()).await;
    ensure_feed_definition(store, api, token, org_id).await?;

    Ok(entity)
}

/// Fetch current weather for the station's city and push it into the shared
/// feed. Returns the pushed reading.
pub async fn update_station_weather(
    store: &dyn ConnectorStore,
    api: &LegionApi,
    weather: &WeatherClient,
    token: &str,
    org_id: &str,
    station_id: &str,
) -> Result<Value, ConnectorError> {
    let station = find_station(store, api, token, org_id, station_id).await?;

    let city = station
        .pointer("/metadata/city")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ConnectorError::BadRequest(format!(
                "station '{station_id}' has no city in its metadata"
            ))
        })?;

    let current = weather.fetch_current(city, "metric").await?;
    let reading = build_reading(&current);

    let definition = ensure_feed_definition(store, api, token, org_id).await?;
    let definition_id = definition
        .get("id")
        .and_then(Value::as_str)
        .ok_or_else(|| {
            ConnectorError::Internal("feed definition has no id".into())
        })?;

    api.push_feed_message(
        token,
        definition_id,
        &json!({
            "entity_id": station_id,
            "definition_id": definition_id,
            "data": reading,
            "timestamp": Utc::now(),
        }),
    )
    .await?;

    Ok(reading)
}

/// Delete the remote entity, then drop it from the cache. Not transactional:
/// a failure after the remote delete leaves the cache to self-correct on the
/// next empty-cache refetch.
pub async fn delete_station(
    store: &dyn ConnectorStore,
    api: &LegionApi,
    token: &str,
    org_id: &str,
    station_id: &str,
) -> Result<(), ConnectorError> {
    api.delete_entity(token, station_id).await?;
    store.remove_station(org_id, station_id).await;
    Ok(())
}

/// Cache lookup by entity id, falling back to a remote fetch (cached on hit).
async fn find_station(
    store: &dyn ConnectorStore,
    api: &LegionApi,
    token: &str,
    org_id: &str,
    station_id: &str,
) -> Result<Value, ConnectorError> {
    let cached = store.cached_stations(org_id).await;
    if let Some(station) = cached
        .into_iter()
        .find(|entity| entity.get("id").and_then(Value::as_str) == Some(station_id))
    {
        return Ok(station);
    }

    let station = api.get_entity(token, station_id).await?;
    store.append_station(org_id, station.clone()).await;
    Ok(station)
}

/// Find-or-create the shared weather feed definition for an organization,
/// cached under `{org_id}-{feed name}`.
async fn ensure_feed_definition(
    store: &dyn ConnectorStore,
    api: &LegionApi,
    token: &str,
    org_id: &str,
) -> Result<Value, ConnectorError> {
    let key = feed_cache_key(org_id);
    if let Some(definition) = store.get_feed_definition(&key).await {
        return Ok(definition);
    }

    let found = api.find_feed_definitions(token, WEATHER_FEED_NAME).await?;
    let definition = match found.into_iter().next() {
        Some(definition) => definition,
        None => {
            api.create_feed_definition(
                token,
                &json!({
                    "name": WEATHER_FEED_NAME,
                    "description": WEATHER_FEED_DESCRIPTION,
                    "category": FEED_CATEGORY,
                    "content_type": FEED_CONTENT_TYPE,
                }),
            )
            .await?
        }
    };

    store.put_feed_definition(&key, definition.clone()).await;
    Ok(definition)
}

pub fn feed_cache_key(org_id: &str) -> String {
    format!("{org_id}-{WEATHER_FEED_NAME}")
}

/// Shape a reading the way the feed consumers expect it.
pub fn build_reading(current: &CurrentWeather) -> Value {
    json!({
        "temperature": current.temperature,
        "feels_like": current.feels_like,
        "humidity": current.humidity,
        "pressure": current.pressure,
        "visibility": current.visibility,
        "wind_speed": current.wind_speed,
        "wind_direction": current.wind_direction,
        "weather_condition": current.conditions,
        "weather_description": current.description,
        "cloud_cover": current.cloud_cover,
        "timestamp": current.captured_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample_current() -> CurrentWeather {
        CurrentWeather {
            location: "Austin, US".into(),
            temperature: 23,
            feels_like: 23,
            temp_min: 20,
            temp_max: 26,
            humidity: 65.0,
            pressure: 1013.0,
            wind_speed: 3.5,
            wind_direction: 180.0,
            visibility: Some(10000.0),
            cloud_cover: 20.0,
            conditions: "Clouds".into(),
            description: "few clouds".into(),
            icon: "02d".into(),
            captured_at: Utc.timestamp_opt(1705500000, 0).unwrap(),
        }
    }

    #[test]
    fn test_reading_mirrors_condition_description() {
        let reading = build_reading(&sample_current());
        assert_eq!(reading["weather_description"], "few clouds");
        assert_eq!(reading["weather_condition"], "Clouds");
        assert_eq!(reading["temperature"], 23);
        assert_eq!(reading["cloud_cover"], 20.0);
        assert_eq!(reading["wind_direction"], 180.0);
    }

    #[test]
    fn test_feed_cache_key_shape() {
        assert_eq!(feed_cache_key("org-1"), "org-1-weather-observations");
    }
}
