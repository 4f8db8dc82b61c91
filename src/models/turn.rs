use serde::{Deserialize, Serialize};

use crate::models::session::BookingStep;

/// Fields the completion service may extract from a user message. Every field
/// defaults to absent/false so a partially-filled payload is always usable.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ExtractedFields {
    pub license_plate: Option<String>,
    pub vehicle_validated: bool,
    pub service_id: Option<String>,
    pub service_name: Option<String>,
    pub service_validated: bool,
    pub garage_id: Option<String>,
    pub garage_name: Option<String>,
    pub garage_validated: bool,
    pub slot_date: Option<String>,
    pub slot_time: Option<String>,
    pub final_confirmed: bool,
}

/// One normalized completion, consumed immediately to update the session.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedTurnResponse {
    pub message: String,
    /// `None` means "no proposed change".
    pub proposed_step: Option<BookingStep>,
    pub extracted: ExtractedFields,
}
