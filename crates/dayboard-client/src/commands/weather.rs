//! Weather command.

use std::time::Duration;

use dayboard_providers::weather::{WeatherClient, WeatherForecast};
use tokio_util::sync::CancellationToken;

use crate::cli::WeatherArgs;
use crate::config::{ClientConfig, WeatherSettings};
use crate::error::{ClientError, ClientResult};
use crate::render;

/// Show the forecast for the configured or given location.
pub async fn forecast(
    args: &WeatherArgs,
    config: &ClientConfig,
    cancel: &CancellationToken,
) -> ClientResult<()> {
    let (latitude, longitude) = coordinates(args, &config.weather)?;
    let days = args.days.unwrap_or(config.weather.forecast_days);

    let mut client = WeatherClient::new(Duration::from_secs(WeatherClient::DEFAULT_TIMEOUT_SECS))?;
    if let Some(base_url) = &config.weather.base_url {
        client = client.with_base_url(base_url);
    }

    let forecast = client.forecast(latitude, longitude, days, cancel).await;
    print!("{}", output(forecast.as_ref(), args.json)?);
    Ok(())
}

/// Resolves the location, flags taking precedence over the config file.
pub fn coordinates(args: &WeatherArgs, settings: &WeatherSettings) -> ClientResult<(f64, f64)> {
    let latitude = args.latitude.or(settings.latitude);
    let longitude = args.longitude.or(settings.longitude);

    let (Some(latitude), Some(longitude)) = (latitude, longitude) else {
        return Err(ClientError::Config(
            "a location is required: pass --latitude and --longitude or set them under [weather]"
                .to_string(),
        ));
    };

    if !(-90.0..=90.0).contains(&latitude) {
        return Err(ClientError::Config(format!(
            "latitude {} is outside -90..=90",
            latitude
        )));
    }
    if !(-180.0..=180.0).contains(&longitude) {
        return Err(ClientError::Config(format!(
            "longitude {} is outside -180..=180",
            longitude
        )));
    }

    Ok((latitude, longitude))
}

fn output(forecast: Option<&WeatherForecast>, json: bool) -> ClientResult<String> {
    match (forecast, json) {
        (Some(forecast), true) => render::json(forecast),
        (Some(forecast), false) => Ok(render::weather(forecast)),
        (None, true) => Ok("null\n".to_string()),
        (None, false) => Ok("Weather unavailable\n".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn settings(latitude: Option<f64>, longitude: Option<f64>) -> WeatherSettings {
        WeatherSettings {
            latitude,
            longitude,
            ..WeatherSettings::default()
        }
    }

    #[test]
    fn flags_override_config() {
        let args = WeatherArgs {
            latitude: Some(-33.87),
            ..WeatherArgs::default()
        };
        let coords = coordinates(&args, &settings(Some(47.37), Some(8.54))).unwrap();
        assert_eq!(coords, (-33.87, 8.54));
    }

    #[test]
    fn missing_location_is_a_config_error() {
        let err = coordinates(&WeatherArgs::default(), &settings(Some(47.0), None)).unwrap_err();
        assert!(matches!(err, ClientError::Config(_)));
    }

    #[test]
    fn out_of_range_coordinates_are_rejected() {
        assert!(coordinates(&WeatherArgs::default(), &settings(Some(91.0), Some(0.0))).is_err());
        assert!(coordinates(&WeatherArgs::default(), &settings(Some(0.0), Some(-181.0))).is_err());
    }

    #[test]
    fn unavailable_forecast_output() {
        assert_eq!(output(None, false).unwrap(), "Weather unavailable\n");
        assert_eq!(output(None, true).unwrap(), "null\n");
    }
}
