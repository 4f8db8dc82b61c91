pub mod catalog;
pub mod session;
pub mod turn;

pub use catalog::{DaySlots, Garage, ServiceOperation, Vehicle};
pub use session::{
    AppointmentRecord, BookingSession, BookingStep, GarageRecord, HistoryEntry, Sentiment,
    ServiceRecord, VehicleRecord,
};
pub use turn::{ExtractedFields, NormalizedTurnResponse};
