use serde::{Deserialize, Serialize};

use crate::models::catalog::{DaySlots, Garage, ServiceOperation};

/// Number of history entries kept per session (user and assistant combined).
pub const HISTORY_WINDOW: usize = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BookingStep {
    AwaitingIntent,
    AwaitingPlate,
    ValidatingVehicle,
    ChoosingService,
    ValidatingService,
    ChoosingGarage,
    ValidatingGarage,
    ChoosingSlot,
    FinalConfirmation,
    Completed,
}

impl BookingStep {
    /// Numeric value exposed on the session-facing API.
    pub fn index(self) -> u8 {
        match self {
            BookingStep::AwaitingIntent => 1,
            BookingStep::AwaitingPlate => 2,
            BookingStep::ValidatingVehicle => 3,
            BookingStep::ChoosingService => 4,
            BookingStep::ValidatingService => 5,
            BookingStep::ChoosingGarage => 6,
            BookingStep::ValidatingGarage => 7,
            BookingStep::ChoosingSlot => 8,
            BookingStep::FinalConfirmation => 9,
            BookingStep::Completed => 10,
        }
    }

    pub fn from_index(n: u8) -> Option<Self> {
        match n {
            1 => Some(BookingStep::AwaitingIntent),
            2 => Some(BookingStep::AwaitingPlate),
            3 => Some(BookingStep::ValidatingVehicle),
            4 => Some(BookingStep::ChoosingService),
            5 => Some(BookingStep::ValidatingService),
            6 => Some(BookingStep::ChoosingGarage),
            7 => Some(BookingStep::ValidatingGarage),
            8 => Some(BookingStep::ChoosingSlot),
            9 => Some(BookingStep::FinalConfirmation),
            10 => Some(BookingStep::Completed),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            BookingStep::AwaitingIntent => "awaiting_intent",
            BookingStep::AwaitingPlate => "awaiting_plate",
            BookingStep::ValidatingVehicle => "validating_vehicle",
            BookingStep::ChoosingService => "choosing_service",
            BookingStep::ValidatingService => "validating_service",
            BookingStep::ChoosingGarage => "choosing_garage",
            BookingStep::ValidatingGarage => "validating_garage",
            BookingStep::ChoosingSlot => "choosing_slot",
            BookingStep::FinalConfirmation => "final_confirmation",
            BookingStep::Completed => "completed",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VehicleRecord {
    pub license_plate: Option<String>,
    pub brand: Option<String>,
    pub model: Option<String>,
    pub external_id: Option<String>,
    pub confirmed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServiceRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub price: Option<f64>,
    pub confirmed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GarageRecord {
    pub id: Option<String>,
    pub name: Option<String>,
    pub address: Option<String>,
    pub confirmed: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppointmentRecord {
    /// ISO 8601 date (YYYY-MM-DD).
    pub date: Option<String>,
    /// 24h HH:MM.
    pub time: Option<String>,
    pub confirmed: bool,
    pub created_id: Option<String>,
}

/// Snapshot of the last message only, never accumulated.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Sentiment {
    pub urgent: bool,
    pub frustrated: bool,
    pub positive: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone)]
pub struct BookingSession {
    pub step: BookingStep,
    pub vehicle: VehicleRecord,
    pub service: ServiceRecord,
    pub garage: GarageRecord,
    pub appointment: AppointmentRecord,
    pub turn_count: u32,
    pub sentiment: Sentiment,
    pub history: Vec<HistoryEntry>,
    /// Backend catalogs fetched once per session, capped when presented.
    pub available_services: Vec<ServiceOperation>,
    pub available_garages: Vec<Garage>,
    pub available_slots: Vec<DaySlots>,
}

impl Default for BookingSession {
    fn default() -> Self {
        Self::new()
    }
}

impl BookingSession {
    pub fn new() -> Self {
        Self {
            step: BookingStep::AwaitingIntent,
            vehicle: VehicleRecord::default(),
            service: ServiceRecord::default(),
            garage: GarageRecord::default(),
            appointment: AppointmentRecord::default(),
            turn_count: 0,
            sentiment: Sentiment::default(),
            history: Vec::new(),
            available_services: Vec::new(),
            available_garages: Vec::new(),
            available_slots: Vec::new(),
        }
    }

    /// Full field wipe back to `AwaitingIntent`.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Moves one step forward when the current stage's gating condition holds.
    /// Returns whether a transition fired.
    pub fn advance(&mut self) -> bool {
        let next = match self.step {
            BookingStep::AwaitingIntent => Some(BookingStep::AwaitingPlate),
            BookingStep::AwaitingPlate if self.vehicle.license_plate.is_some() => {
                Some(BookingStep::ValidatingVehicle)
            }
            BookingStep::ValidatingVehicle if self.vehicle.confirmed => {
                Some(BookingStep::ChoosingService)
            }
            BookingStep::ChoosingService
                if self.service.id.is_some() && self.service.name.is_some() =>
            {
                Some(BookingStep::ValidatingService)
            }
            BookingStep::ValidatingService if self.service.confirmed => {
                Some(BookingStep::ChoosingGarage)
            }
            BookingStep::ChoosingGarage
                if self.garage.id.is_some() && self.garage.name.is_some() =>
            {
                Some(BookingStep::ValidatingGarage)
            }
            BookingStep::ValidatingGarage if self.garage.confirmed => {
                Some(BookingStep::ChoosingSlot)
            }
            BookingStep::ChoosingSlot
                if self.appointment.date.is_some() && self.appointment.time.is_some() =>
            {
                Some(BookingStep::FinalConfirmation)
            }
            BookingStep::FinalConfirmation
                if self.appointment.confirmed && self.appointment.created_id.is_some() =>
            {
                Some(BookingStep::Completed)
            }
            _ => None,
        };

        match next {
            Some(step) => {
                self.step = step;
                true
            }
            None => false,
        }
    }

    /// Explicit correction: move back to `target` and drop every confirmation
    /// at that stage and after it. Data belonging to stages strictly after the
    /// target is wiped so it gets collected again.
    pub fn go_back_to(&mut self, target: BookingStep) {
        if target >= self.step {
            return;
        }

        if target <= BookingStep::AwaitingPlate {
            self.vehicle = VehicleRecord::default();
        } else if target <= BookingStep::ValidatingVehicle {
            self.vehicle.confirmed = false;
        }

        if target <= BookingStep::ChoosingService {
            self.service = ServiceRecord::default();
        } else if target <= BookingStep::ValidatingService {
            self.service.confirmed = false;
        }

        if target <= BookingStep::ChoosingGarage {
            self.garage = GarageRecord::default();
        } else if target <= BookingStep::ValidatingGarage {
            self.garage.confirmed = false;
        }

        if target <= BookingStep::ChoosingSlot {
            self.appointment = AppointmentRecord::default();
        } else if target <= BookingStep::FinalConfirmation {
            self.appointment.confirmed = false;
        }

        self.step = target;
    }

    /// All identifying fields needed to place the booking are present.
    pub fn ready_for_booking(&self) -> bool {
        self.vehicle.license_plate.is_some()
            && self.service.id.is_some()
            && self.garage.id.is_some()
            && self.appointment.date.is_some()
            && self.appointment.time.is_some()
    }

    pub fn push_history(&mut self, role: &str, content: &str) {
        self.history.push(HistoryEntry {
            role: role.to_string(),
            content: content.to_string(),
        });
        if self.history.len() > HISTORY_WINDOW {
            let excess = self.history.len() - HISTORY_WINDOW;
            self.history.drain(..excess);
        }
    }

    /// French recap of everything collected so far, shown before the final
    /// confirmation prompt.
    pub fn summary(&self) -> String {
        let mut out = String::from("Récapitulatif de votre rendez-vous :\n");

        match (&self.vehicle.brand, &self.vehicle.model, &self.vehicle.license_plate) {
            (Some(brand), Some(model), Some(plate)) => {
                out.push_str(&format!("- Véhicule : {brand} {model} ({plate})\n"));
            }
            (_, _, Some(plate)) => {
                out.push_str(&format!("- Véhicule : {plate}\n"));
            }
            _ => {}
        }

        if let Some(name) = &self.service.name {
            match self.service.price {
                Some(price) => out.push_str(&format!("- Service : {name} ({price}€)\n")),
                None => out.push_str(&format!("- Service : {name}\n")),
            }
        }

        if let Some(name) = &self.garage.name {
            match &self.garage.address {
                Some(address) => out.push_str(&format!("- Garage : {name} ({address})\n")),
                None => out.push_str(&format!("- Garage : {name}\n")),
            }
        }

        if let Some(date) = &self.appointment.date {
            match &self.appointment.time {
                Some(time) => out.push_str(&format!("- Date : {date} à {time}\n")),
                None => out.push_str(&format!("- Date : {date}\n")),
            }
        }

        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_with_vehicle() -> BookingSession {
        let mut s = BookingSession::new();
        s.vehicle.license_plate = Some("AB-123-CD".to_string());
        s.vehicle.confirmed = true;
        s.step = BookingStep::ChoosingService;
        s
    }

    #[test]
    fn test_advance_requires_stage_data() {
        let mut s = BookingSession::new();
        assert!(s.advance());
        assert_eq!(s.step, BookingStep::AwaitingPlate);

        // No plate yet: stuck.
        assert!(!s.advance());

        s.vehicle.license_plate = Some("AB-123-CD".to_string());
        assert!(s.advance());
        assert_eq!(s.step, BookingStep::ValidatingVehicle);

        // Not confirmed yet: stuck.
        assert!(!s.advance());
        s.vehicle.confirmed = true;
        assert!(s.advance());
        assert_eq!(s.step, BookingStep::ChoosingService);
    }

    #[test]
    fn test_confirmed_implies_populated_on_happy_path() {
        let mut s = session_with_vehicle();
        s.service.id = Some("1".to_string());
        s.service.name = Some("Service Huile Moteur".to_string());
        s.service.confirmed = true;
        assert!(s.vehicle.confirmed && s.vehicle.license_plate.is_some());
        assert!(s.service.confirmed && s.service.id.is_some() && s.service.name.is_some());
    }

    #[test]
    fn test_go_back_cascades_confirmations() {
        let mut s = session_with_vehicle();
        s.service.id = Some("1".to_string());
        s.service.name = Some("Service Huile Moteur".to_string());
        s.service.confirmed = true;
        s.garage.id = Some("4".to_string());
        s.garage.name = Some("ALTITUDE 69 LYON".to_string());
        s.garage.confirmed = true;
        s.appointment.date = Some("2026-05-22".to_string());
        s.appointment.time = Some("10:00".to_string());
        s.step = BookingStep::FinalConfirmation;

        s.go_back_to(BookingStep::ChoosingService);

        assert_eq!(s.step, BookingStep::ChoosingService);
        assert!(s.service.id.is_none());
        assert!(!s.service.confirmed);
        assert!(s.garage.id.is_none());
        assert!(!s.garage.confirmed);
        assert!(s.appointment.date.is_none());
        // The vehicle stage sits before the target and survives intact.
        assert!(s.vehicle.confirmed);
        assert_eq!(s.vehicle.license_plate.as_deref(), Some("AB-123-CD"));
    }

    #[test]
    fn test_go_back_ignores_forward_targets() {
        let mut s = session_with_vehicle();
        s.go_back_to(BookingStep::FinalConfirmation);
        assert_eq!(s.step, BookingStep::ChoosingService);
        assert!(s.vehicle.confirmed);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut s = session_with_vehicle();
        s.turn_count = 7;
        s.push_history("user", "bonjour");

        s.reset();
        let first = format!("{:?}", s);
        s.reset();
        let second = format!("{:?}", s);

        assert_eq!(first, second);
        assert_eq!(s.step, BookingStep::AwaitingIntent);
        assert_eq!(s.turn_count, 0);
        assert!(s.history.is_empty());
        assert!(s.vehicle.license_plate.is_none());
    }

    #[test]
    fn test_history_window_is_bounded() {
        let mut s = BookingSession::new();
        for i in 0..40 {
            s.push_history("user", &format!("message {i}"));
        }
        assert_eq!(s.history.len(), HISTORY_WINDOW);
        assert_eq!(s.history[0].content, "message 20");
        assert_eq!(s.history.last().unwrap().content, "message 39");
    }

    #[test]
    fn test_step_index_round_trip() {
        for n in 1..=10u8 {
            let step = BookingStep::from_index(n).unwrap();
            assert_eq!(step.index(), n);
        }
        assert!(BookingStep::from_index(0).is_none());
        assert!(BookingStep::from_index(11).is_none());
    }

    #[test]
    fn test_ready_for_booking() {
        let mut s = session_with_vehicle();
        assert!(!s.ready_for_booking());
        s.service.id = Some("1".to_string());
        s.garage.id = Some("4".to_string());
        s.appointment.date = Some("2026-05-22".to_string());
        s.appointment.time = Some("10:00".to_string());
        assert!(s.ready_for_booking());
    }
}
