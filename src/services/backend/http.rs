use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use serde_json::{json, Value};
use tokio::sync::RwLock;

use super::{AppointmentRequest, BackendError, BackendResult, BookingBackend, CreatedAppointment};
use crate::models::catalog::{DaySlots, Garage, ServiceOperation, Vehicle};

pub struct HttpBackend {
    base_url: String,
    email: String,
    password: String,
    client: reqwest::Client,
    token: RwLock<Option<String>>,
}

impl HttpBackend {
    pub fn new(base_url: String, email: String, password: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .unwrap_or_default();
        Self {
            base_url,
            email,
            password,
            client,
            token: RwLock::new(None),
        }
    }

    async fn login(&self) -> BackendResult<String> {
        let resp = self
            .client
            .post(format!("{}/login_check", self.base_url))
            .json(&json!({ "email": self.email, "password": self.password }))
            .send()
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;

        if !resp.status().is_success() {
            return Err(BackendError::Auth);
        }

        let data: Value = resp
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        let token = data["token"]
            .as_str()
            .ok_or(BackendError::Auth)?
            .to_string();

        *self.token.write().await = Some(token.clone());
        tracing::debug!("backend authentication refreshed");
        Ok(token)
    }

    async fn bearer(&self) -> BackendResult<String> {
        if let Some(token) = self.token.read().await.clone() {
            return Ok(token);
        }
        self.login().await
    }

    /// Sends a request with the cached token, re-authenticating once on 401.
    async fn send_authed(&self, build: impl Fn(&str) -> reqwest::RequestBuilder) -> BackendResult<reqwest::Response> {
        let token = self.bearer().await?;
        let resp = build(&token)
            .send()
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))?;

        if resp.status() != StatusCode::UNAUTHORIZED {
            return Ok(resp);
        }

        let token = self.login().await?;
        build(&token)
            .send()
            .await
            .map_err(|e| BackendError::Unavailable(e.to_string()))
    }

    async fn get_json(&self, path: String) -> BackendResult<Value> {
        let url = format!("{}{}", self.base_url, path);
        let resp = self
            .send_authed(|token| self.client.get(&url).bearer_auth(token))
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(BackendError::Rejected(format!("{status} on {path}")));
        }
        resp.json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))
    }
}

fn value_to_id(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn parse_operation(value: &Value) -> Option<ServiceOperation> {
    Some(ServiceOperation {
        id: value_to_id(&value["id"])?,
        name: value["name"].as_str()?.to_string(),
        price: value["price"].as_f64(),
    })
}

fn parse_garage(value: &Value) -> Option<Garage> {
    let address = match (value["address"].as_str(), value["city"].as_str()) {
        (Some(address), Some(city)) => format!("{address}, {city}"),
        (Some(address), None) => address.to_string(),
        (None, Some(city)) => city.to_string(),
        (None, None) => String::new(),
    };
    Some(Garage {
        id: value_to_id(&value["id"])?,
        name: value["name"].as_str()?.to_string(),
        address,
    })
}

fn parse_day_slots(value: &Value) -> Option<DaySlots> {
    Some(DaySlots {
        date: value["date"].as_str()?.to_string(),
        slots: value["slots"]
            .as_array()?
            .iter()
            .filter_map(|s| s.as_str().map(|t| t.to_string()))
            .collect(),
    })
}

#[async_trait]
impl BookingBackend for HttpBackend {
    async fn vehicle_by_plate(&self, plate: &str) -> BackendResult<Option<Vehicle>> {
        let url = format!("{}/vehicules/{}", self.base_url, plate);
        let resp = self
            .send_authed(|token| self.client.get(&url).bearer_auth(token))
            .await?;

        match resp.status() {
            StatusCode::NOT_FOUND => return Ok(None),
            status if !status.is_success() => {
                return Err(BackendError::Rejected(format!("{status} on /vehicules")));
            }
            _ => {}
        }

        let data: Value = resp
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        let vehicle = Vehicle {
            id: value_to_id(&data["id"])
                .ok_or_else(|| BackendError::Decode("vehicle without id".to_string()))?,
            brand: data["brand"].as_str().unwrap_or_default().to_string(),
            model: data["model"].as_str().unwrap_or_default().to_string(),
        };
        Ok(Some(vehicle))
    }

    async fn operations(&self, category_id: Option<&str>) -> BackendResult<Vec<ServiceOperation>> {
        let path = match category_id {
            Some(id) => format!("/operations/{id}"),
            None => "/operations".to_string(),
        };
        let data = self.get_json(path).await?;

        let list = data
            .as_array()
            .ok_or_else(|| BackendError::Decode("operations is not a list".to_string()))?;
        Ok(list.iter().filter_map(parse_operation).collect())
    }

    async fn garages(&self) -> BackendResult<Vec<Garage>> {
        let data = self.get_json("/garages".to_string()).await?;

        let list = data["garages"]
            .as_array()
            .or_else(|| data.as_array())
            .ok_or_else(|| BackendError::Decode("garages is not a list".to_string()))?;
        Ok(list.iter().filter_map(parse_garage).collect())
    }

    async fn availabilities(
        &self,
        garage_id: &str,
        date: &str,
        page: u32,
    ) -> BackendResult<Vec<DaySlots>> {
        // Endpoint name is misspelled on the backend side.
        let path = format!(
            "/appointments/avaibilities?garage_id={garage_id}&date={date}&page={page}"
        );
        let data = self.get_json(path).await?;

        let list = data["availabilities"]
            .as_array()
            .ok_or_else(|| BackendError::Decode("availabilities is not a list".to_string()))?;
        Ok(list.iter().filter_map(parse_day_slots).collect())
    }

    async fn create_appointment(
        &self,
        request: &AppointmentRequest,
    ) -> BackendResult<CreatedAppointment> {
        let url = format!("{}/appointments", self.base_url);
        let resp = self
            .send_authed(|token| self.client.post(&url).bearer_auth(token).json(request))
            .await?;

        let status = resp.status();
        if !status.is_success() {
            return Err(BackendError::Rejected(format!("{status} on /appointments")));
        }

        let data: Value = resp
            .json()
            .await
            .map_err(|e| BackendError::Decode(e.to_string()))?;

        let id = value_to_id(&data["id"])
            .ok_or_else(|| BackendError::Decode("appointment without id".to_string()))?;
        Ok(CreatedAppointment { id })
    }
}
