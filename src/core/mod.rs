pub mod availability;
pub mod booking;
pub mod closure;
pub mod engine;
pub mod locks;
pub mod overview;
pub mod slot_calendar;
pub mod time_normalizer;

pub use crate::domain::model::{
    Appointment, CalendarSlot, ClosureRecord, CustomerDetails, DaySchedule, ProviderId, SlotState,
    SlotStatus, TimeOfDay,
};
pub use crate::domain::ports::{InsertOutcome, RelocateOutcome, Store};
pub use crate::utils::error::Result;
