//! ==============================================================================
//! client.rs - external sensor service boundary
//! ==============================================================================
//!
//! purpose:
//!     the farm's sensor service is an external collaborator. this module is
//!     the only place that knows how to talk to it:
//!     - GET  {base_url}/sensors   -> { success, sensors: [...] }
//!     - POST {base_url}/irrigate  { sensor_id } -> { success, message }
//!
//! relationships:
//!     - used by: sync.rs (fetch + fallback, irrigation dispatch)
//!     - decodes: domain.rs (SensorsResponse, IrrigateResponse)
//!
//! the SensorService trait is the seam: the host runs HttpSensorService,
//! tests swap in a fake.
//!
//! ==============================================================================

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::domain::{IrrigateRequest, IrrigateResponse, LiveReading, SensorsResponse};

#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("sensor service unreachable: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("sensor service answered http {0}")]
    Status(u16),
    #[error("sensor service reported failure: {0}")]
    Rejected(String),
    #[error("sensor service sent an unreadable body: {0}")]
    Decode(String),
}

/// the two calls the dashboard makes to the outside world
pub trait SensorService: Send + Sync + 'static {
    /// current readings; Err for transport, status and success:false
    fn fetch_sensors(&self) -> impl Future<Output = Result<Vec<LiveReading>, ServiceError>> + Send;

    /// ask the service to irrigate the parcel behind `sensor_id`
    fn irrigate(&self, sensor_id: &str) -> impl Future<Output = Result<IrrigateResponse, ServiceError>> + Send;
}

/// reqwest-backed client
#[derive(Clone)]
pub struct HttpSensorService {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSensorService {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, ServiceError> {
        let mut builder = reqwest::Client::builder();
        if let Some(t) = timeout {
            builder = builder.timeout(t);
        }
        Ok(Self {
            client: builder.build().map_err(ServiceError::Transport)?,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }
}

impl SensorService for HttpSensorService {
    async fn fetch_sensors(&self) -> Result<Vec<LiveReading>, ServiceError> {
        let response = self
            .client
            .get(self.url("sensors"))
            .send()
            .await
            .map_err(ServiceError::Transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Status(status.as_u16()));
        }
        let body = response.text().await.map_err(ServiceError::Transport)?;
        parse_sensors(&body)
    }

    async fn irrigate(&self, sensor_id: &str) -> Result<IrrigateResponse, ServiceError> {
        let response = self
            .client
            .post(self.url("irrigate"))
            .json(&IrrigateRequest {
                sensor_id: sensor_id.to_string(),
            })
            .send()
            .await
            .map_err(ServiceError::Transport)?;
        let status = response.status();
        if !status.is_success() {
            return Err(ServiceError::Status(status.as_u16()));
        }
        let body = response.text().await.map_err(ServiceError::Transport)?;
        let reply: IrrigateResponse =
            serde_json::from_str(&body).map_err(|e| ServiceError::Decode(e.to_string()))?;
        if !reply.success {
            return Err(ServiceError::Rejected(reply.message));
        }
        Ok(reply)
    }
}

/// decode a /sensors body, success:false is an error
pub fn parse_sensors(body: &str) -> Result<Vec<LiveReading>, ServiceError> {
    let parsed: SensorsResponse =
        serde_json::from_str(body).map_err(|e| ServiceError::Decode(e.to_string()))?;
    if !parsed.success {
        return Err(ServiceError::Rejected("success: false".to_string()));
    }
    Ok(parsed.sensors)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_sensors_ok() {
        let body = r#"{"success":true,"sensors":[{"id":"S1","cellId":"C5","needsWater":true,"temperature":28,"humidity":40,"soil_moisture":15}]}"#;
        let readings = parse_sensors(body).unwrap();
        assert_eq!(readings.len(), 1);
        assert_eq!(readings[0].id, "S1");
    }

    #[test]
    fn test_parse_sensors_rejected_and_malformed() {
        assert!(matches!(
            parse_sensors(r#"{"success":false,"error":"x"}"#),
            Err(ServiceError::Rejected(_))
        ));
        assert!(matches!(parse_sensors("<html>"), Err(ServiceError::Decode(_))));
        assert!(matches!(
            parse_sensors(r#"{"success":true,"sensors":[{"id":"S1"}]}"#),
            Err(ServiceError::Decode(_))
        ));
    }

    #[test]
    fn test_base_url_is_normalized() {
        let svc = HttpSensorService::new("http://localhost:5000/api/", None).unwrap();
        assert_eq!(svc.url("sensors"), "http://localhost:5000/api/sensors");
    }

    #[tokio::test]
    async fn test_unreachable_service_is_transport_error() {
        // port 9 (discard) on localhost is closed on test machines
        let svc = HttpSensorService::new("http://127.0.0.1:9/api", Some(Duration::from_secs(2))).unwrap();
        assert!(matches!(svc.fetch_sensors().await, Err(ServiceError::Transport(_))));
    }
}
