pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::catalog::{DaySlots, Garage, ServiceOperation, Vehicle};

/// Collaborator failures, consumed by exhaustive matching in the engine.
/// Nothing here ever reaches an end user as-is.
#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("backend authentication failed")]
    Auth,

    #[error("backend rejected the request: {0}")]
    Rejected(String),

    #[error("unexpected backend response: {0}")]
    Decode(String),
}

pub type BackendResult<T> = Result<T, BackendError>;

#[derive(Debug, Clone, Serialize)]
pub struct AppointmentRequest {
    /// ISO 8601 datetime, e.g. `2026-05-22T10:00:00`.
    pub date: String,
    pub vehicule_id: String,
    pub garage_id: String,
    pub operations: Vec<String>,
    pub notes: String,
    pub status: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreatedAppointment {
    pub id: String,
}

#[async_trait]
pub trait BookingBackend: Send + Sync {
    /// `Ok(None)` means the plate is unknown (404), not a failure.
    async fn vehicle_by_plate(&self, plate: &str) -> BackendResult<Option<Vehicle>>;

    async fn operations(&self, category_id: Option<&str>) -> BackendResult<Vec<ServiceOperation>>;

    async fn garages(&self) -> BackendResult<Vec<Garage>>;

    async fn availabilities(
        &self,
        garage_id: &str,
        date: &str,
        page: u32,
    ) -> BackendResult<Vec<DaySlots>>;

    async fn create_appointment(
        &self,
        request: &AppointmentRequest,
    ) -> BackendResult<CreatedAppointment>;
}
