//! Open-Meteo forecast client.
//!
//! A single GET against the forecast endpoint with `timezone=auto`, so every
//! timestamp in the response is local to the requested coordinates. A failed
//! request is reported as no forecast at all.

use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::cancellable;

/// Default Open-Meteo forecast endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.open-meteo.com/v1/forecast";

const HOURLY_VARIABLES: &str = "temperature_2m,precipitation,precipitation_probability,wind_speed_10m";
const CURRENT_VARIABLES: &str = "temperature_2m,precipitation,rain,showers,snowfall,wind_speed_10m";
const DAILY_VARIABLES: &str = "weather_code,precipitation_sum,snowfall_sum";

/// Conditions at the time of the request.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CurrentWeather {
    /// Air temperature at 2 m, °C.
    pub temperature: Option<f64>,
    /// Wind speed at 10 m, km/h.
    pub wind_speed: Option<f64>,
    /// Total precipitation, mm.
    pub precipitation: Option<f64>,
    pub rain: Option<f64>,
    pub showers: Option<f64>,
    /// Snowfall, cm.
    pub snowfall: Option<f64>,
}

/// One hour of the forecast.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct HourlyPoint {
    pub time: NaiveDateTime,
    pub temperature: Option<f64>,
    pub precipitation: Option<f64>,
    /// Probability of precipitation, percent.
    pub precipitation_probability: Option<f64>,
    pub wind_speed: Option<f64>,
}

/// One day of the forecast.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DailySummary {
    pub date: NaiveDate,
    /// WMO weather interpretation code.
    pub weather_code: Option<u8>,
    /// Precipitation sum, mm.
    pub precipitation_sum: Option<f64>,
    /// Snowfall sum, cm.
    pub snowfall_sum: Option<f64>,
}

impl DailySummary {
    /// Returns a short description of the day's weather.
    pub fn description(&self) -> &'static str {
        self.weather_code.map(wmo_description).unwrap_or("unknown")
    }
}

/// A parsed forecast. Sections missing from the response stay empty.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct WeatherForecast {
    /// IANA timezone the timestamps are expressed in.
    pub timezone: Option<String>,
    pub current: Option<CurrentWeather>,
    pub hourly: Vec<HourlyPoint>,
    pub daily: Vec<DailySummary>,
}

/// Describes a WMO weather interpretation code.
pub fn wmo_description(code: u8) -> &'static str {
    match code {
        0 => "clear sky",
        1 => "mainly clear",
        2 => "partly cloudy",
        3 => "overcast",
        45 | 48 => "fog",
        51 | 53 | 55 => "drizzle",
        56 | 57 => "freezing drizzle",
        61 => "light rain",
        63 => "rain",
        65 => "heavy rain",
        66 | 67 => "freezing rain",
        71 => "light snow",
        73 => "snow",
        75 => "heavy snow",
        77 => "snow grains",
        80..=82 => "rain showers",
        85 | 86 => "snow showers",
        95 => "thunderstorm",
        96 | 99 => "thunderstorm with hail",
        _ => "unknown",
    }
}

/// Client for the Open-Meteo forecast API.
#[derive(Debug, Clone)]
pub struct WeatherClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl WeatherClient {
    /// Default request timeout in seconds.
    pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

    /// Creates a client against the public endpoint.
    pub fn new(timeout: Duration) -> ProviderResult<Self> {
        let http_client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(format!("dayboard/{}", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| ProviderError::internal("failed to create HTTP client").with_source(e))?;

        Ok(Self {
            http_client,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Builder method to point the client at another endpoint.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    /// Fetches a forecast, returning `None` on any failure.
    pub async fn forecast(
        &self,
        latitude: f64,
        longitude: f64,
        forecast_days: u8,
        cancel: &CancellationToken,
    ) -> Option<WeatherForecast> {
        match cancellable(
            cancel,
            "weather forecast",
            self.try_forecast(latitude, longitude, forecast_days),
        )
        .await
        {
            Ok(forecast) => Some(forecast),
            Err(e) => {
                warn!("weather forecast unavailable: {}", e);
                None
            }
        }
    }

    /// Fetches a forecast, reporting why it failed.
    pub async fn try_forecast(
        &self,
        latitude: f64,
        longitude: f64,
        forecast_days: u8,
    ) -> ProviderResult<WeatherForecast> {
        let response = self
            .http_client
            .get(&self.base_url)
            .query(&[
                ("latitude", latitude.to_string()),
                ("longitude", longitude.to_string()),
                ("hourly", HOURLY_VARIABLES.to_string()),
                ("current", CURRENT_VARIABLES.to_string()),
                ("daily", DAILY_VARIABLES.to_string()),
                ("forecast_days", forecast_days.to_string()),
                ("timezone", "auto".to_string()),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::network("weather request failed").with_source(e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(
                ProviderError::from_status(status.as_u16(), &body, None).with_provider("weather")
            );
        }

        let body = response
            .text()
            .await
            .map_err(|e| ProviderError::network("failed to read response").with_source(e))?;
        let raw: ApiForecast = serde_json::from_str(&body).map_err(|e| {
            ProviderError::invalid_response("failed to parse forecast").with_source(e)
        })?;

        let forecast = raw.into_forecast();
        debug!(
            hours = forecast.hourly.len(),
            days = forecast.daily.len(),
            "fetched weather forecast"
        );
        Ok(forecast)
    }
}

#[derive(Debug, Deserialize)]
struct ApiForecast {
    timezone: Option<String>,
    current: Option<ApiCurrent>,
    hourly: Option<ApiHourly>,
    daily: Option<ApiDaily>,
}

#[derive(Debug, Deserialize)]
struct ApiCurrent {
    temperature_2m: Option<f64>,
    wind_speed_10m: Option<f64>,
    precipitation: Option<f64>,
    rain: Option<f64>,
    showers: Option<f64>,
    snowfall: Option<f64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiHourly {
    time: Vec<String>,
    temperature_2m: Vec<Option<f64>>,
    precipitation: Vec<Option<f64>>,
    precipitation_probability: Vec<Option<f64>>,
    wind_speed_10m: Vec<Option<f64>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiDaily {
    time: Vec<String>,
    weather_code: Vec<Option<u8>>,
    precipitation_sum: Vec<Option<f64>>,
    snowfall_sum: Vec<Option<f64>>,
}

/// Reads the `i`-th element of a parallel array, tolerating short arrays.
fn at(values: &[Option<f64>], i: usize) -> Option<f64> {
    values.get(i).copied().flatten()
}

impl ApiForecast {
    fn into_forecast(self) -> WeatherForecast {
        let current = self.current.map(|c| CurrentWeather {
            temperature: c.temperature_2m,
            wind_speed: c.wind_speed_10m,
            precipitation: c.precipitation,
            rain: c.rain,
            showers: c.showers,
            snowfall: c.snowfall,
        });

        let hourly = self
            .hourly
            .map(|h| {
                h.time
                    .iter()
                    .enumerate()
                    .filter_map(|(i, t)| {
                        let time = NaiveDateTime::parse_from_str(t, "%Y-%m-%dT%H:%M").ok()?;
                        Some(HourlyPoint {
                            time,
                            temperature: at(&h.temperature_2m, i),
                            precipitation: at(&h.precipitation, i),
                            precipitation_probability: at(&h.precipitation_probability, i),
                            wind_speed: at(&h.wind_speed_10m, i),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        let daily = self
            .daily
            .map(|d| {
                d.time
                    .iter()
                    .enumerate()
                    .filter_map(|(i, t)| {
                        let date = NaiveDate::parse_from_str(t, "%Y-%m-%d").ok()?;
                        Some(DailySummary {
                            date,
                            weather_code: d.weather_code.get(i).copied().flatten(),
                            precipitation_sum: at(&d.precipitation_sum, i),
                            snowfall_sum: at(&d.snowfall_sum, i),
                        })
                    })
                    .collect()
            })
            .unwrap_or_default();

        WeatherForecast {
            timezone: self.timezone,
            current,
            hourly,
            daily,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> WeatherClient {
        WeatherClient::new(Duration::from_secs(5))
            .unwrap()
            .with_base_url(format!("{}/v1/forecast", server.uri()))
    }

    fn sample() -> serde_json::Value {
        json!({
            "latitude": 52.52,
            "longitude": 13.41,
            "timezone": "Europe/Berlin",
            "current": {
                "time": "2025-10-27T14:00",
                "temperature_2m": 13.4,
                "wind_speed_10m": 21.6,
                "precipitation": 0.0,
                "rain": 0.0,
                "showers": 0.0,
                "snowfall": 0.0
            },
            "hourly": {
                "time": ["2025-10-27T00:00", "2025-10-27T01:00"],
                "temperature_2m": [9.1, 8.7],
                "precipitation": [0.0, 0.2],
                "precipitation_probability": [5, 40],
                "wind_speed_10m": [10.2, null]
            },
            "daily": {
                "time": ["2025-10-27", "2025-10-28"],
                "weather_code": [3, 61],
                "precipitation_sum": [0.2, 4.5],
                "snowfall_sum": [0.0, 0.0]
            }
        })
    }

    #[tokio::test]
    async fn parses_every_section() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/v1/forecast"))
            .and(query_param("latitude", "52.52"))
            .and(query_param("longitude", "13.41"))
            .and(query_param("forecast_days", "2"))
            .and(query_param("timezone", "auto"))
            .and(query_param("daily", DAILY_VARIABLES))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample()))
            .expect(1)
            .mount(&server)
            .await;

        let forecast = client(&server)
            .forecast(52.52, 13.41, 2, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(forecast.timezone.as_deref(), Some("Europe/Berlin"));
        let current = forecast.current.unwrap();
        assert_eq!(current.temperature, Some(13.4));
        assert_eq!(current.wind_speed, Some(21.6));

        assert_eq!(forecast.hourly.len(), 2);
        assert_eq!(forecast.hourly[1].precipitation_probability, Some(40.0));
        assert_eq!(forecast.hourly[1].wind_speed, None);

        assert_eq!(forecast.daily.len(), 2);
        assert_eq!(forecast.daily[1].weather_code, Some(61));
        assert_eq!(forecast.daily[1].description(), "light rain");
        assert_eq!(forecast.daily[0].precipitation_sum, Some(0.2));
    }

    #[tokio::test]
    async fn missing_sections_stay_empty() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "timezone": "UTC" })))
            .mount(&server)
            .await;

        let forecast = client(&server)
            .forecast(0.0, 0.0, 1, &CancellationToken::new())
            .await
            .unwrap();

        assert!(forecast.current.is_none());
        assert!(forecast.hourly.is_empty());
        assert!(forecast.daily.is_empty());
    }

    #[tokio::test]
    async fn error_status_gives_no_forecast() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(400).set_body_json(json!({ "error": true, "reason": "bad latitude" })),
            )
            .mount(&server)
            .await;

        let client = client(&server);
        assert!(
            client
                .forecast(999.0, 0.0, 1, &CancellationToken::new())
                .await
                .is_none()
        );
        let err = client.try_forecast(999.0, 0.0, 1).await.unwrap_err();
        assert_eq!(err.provider(), Some("weather"));
    }

    #[tokio::test]
    async fn cancelled_request_gives_no_forecast() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(sample()))
            .mount(&server)
            .await;
        let cancel = CancellationToken::new();
        cancel.cancel();

        assert!(client(&server).forecast(1.0, 1.0, 1, &cancel).await.is_none());
    }

    #[test]
    fn wmo_codes() {
        assert_eq!(wmo_description(0), "clear sky");
        assert_eq!(wmo_description(81), "rain showers");
        assert_eq!(wmo_description(99), "thunderstorm with hail");
        assert_eq!(wmo_description(42), "unknown");
    }
}
