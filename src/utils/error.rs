use crate::domain::model::{CalendarSlot, ProviderId, TimeOfDay};
use chrono::NaiveDate;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// 引擎對外提供的操作，用來判斷持久層失敗時能否重試
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    GetDaySchedule,
    Reserve,
    UpdateReservation,
    Cancel,
    CloseSlot,
    OpenSlot,
    CloseDay,
    OpenDay,
    Lookup,
}

impl Operation {
    /// 關閉/開放與唯讀操作可以安全重試；預約類操作必須重新檢查可用性
    pub fn is_idempotent(&self) -> bool {
        !matches!(
            self,
            Operation::Reserve | Operation::UpdateReservation | Operation::Cancel
        )
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::GetDaySchedule => "get_day_schedule",
            Operation::Reserve => "reserve",
            Operation::UpdateReservation => "update_reservation",
            Operation::Cancel => "cancel",
            Operation::CloseSlot => "close_slot",
            Operation::OpenSlot => "open_slot",
            Operation::CloseDay => "close_day",
            Operation::OpenDay => "open_day",
            Operation::Lookup => "lookup",
        };
        f.write_str(name)
    }
}

/// 持久層自身的錯誤，進入引擎後會包成 `SchedulingError::StoreFailure`
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("snapshot I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("snapshot encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Error, Debug)]
pub enum SchedulingError {
    #[error("{time} is not a bookable slot on {date}")]
    InvalidSlotTime { date: NaiveDate, time: TimeOfDay },

    #[error("Slot {slot} is already booked")]
    SlotUnavailable { slot: CalendarSlot },

    #[error("Slot {slot} is closed ({})", .reason.as_deref().unwrap_or("no reason given"))]
    SlotClosed {
        slot: CalendarSlot,
        reason: Option<String>,
    },

    #[error("Every slot of provider {provider_id} on {date} is closed")]
    DayFullyClosed {
        provider_id: ProviderId,
        date: NaiveDate,
    },

    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    #[error("Slot {slot} is both booked ({appointment_id}) and closed ({closure_id})")]
    DataIntegrityConflict {
        slot: CalendarSlot,
        appointment_id: Uuid,
        closure_id: Uuid,
    },

    #[error("Store failure during {operation}: {source}")]
    StoreFailure {
        operation: Operation,
        #[source]
        source: StoreError,
    },

    #[error("Invalid {field} '{value}': {reason}")]
    InvalidInput {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Configuration error: {message}")]
    ConfigError { message: String },

    #[error("Invalid configuration value for {field}: '{value}' ({reason})")]
    InvalidConfigValueError {
        field: String,
        value: String,
        reason: String,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, SchedulingError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    Availability,
    NotFound,
    Integrity,
    Storage,
    Configuration,
    System,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    Low,
    Medium,
    High,
    Critical,
}

impl SchedulingError {
    pub fn not_found(entity: &'static str, id: impl fmt::Display) -> Self {
        SchedulingError::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    pub fn store(operation: Operation, source: StoreError) -> Self {
        SchedulingError::StoreFailure { operation, source }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            SchedulingError::InvalidSlotTime { .. } | SchedulingError::InvalidInput { .. } => {
                ErrorCategory::Validation
            }
            SchedulingError::SlotUnavailable { .. }
            | SchedulingError::SlotClosed { .. }
            | SchedulingError::DayFullyClosed { .. } => ErrorCategory::Availability,
            SchedulingError::NotFound { .. } => ErrorCategory::NotFound,
            SchedulingError::DataIntegrityConflict { .. } => ErrorCategory::Integrity,
            SchedulingError::StoreFailure { .. } => ErrorCategory::Storage,
            SchedulingError::ConfigError { .. }
            | SchedulingError::InvalidConfigValueError { .. } => ErrorCategory::Configuration,
            SchedulingError::IoError(_) | SchedulingError::SerializationError(_) => {
                ErrorCategory::System
            }
        }
    }

    pub fn severity(&self) -> ErrorSeverity {
        match self.category() {
            ErrorCategory::Validation | ErrorCategory::Availability | ErrorCategory::NotFound => {
                ErrorSeverity::High
            }
            ErrorCategory::Integrity => ErrorSeverity::Low,
            ErrorCategory::Storage => {
                if self.is_retryable() {
                    ErrorSeverity::Medium
                } else {
                    ErrorSeverity::High
                }
            }
            ErrorCategory::Configuration | ErrorCategory::System => ErrorSeverity::Critical,
        }
    }

    /// 只有冪等操作的持久層失敗可以直接重試
    pub fn is_retryable(&self) -> bool {
        match self {
            SchedulingError::StoreFailure { operation, .. } => operation.is_idempotent(),
            _ => false,
        }
    }

    /// 呼叫端可據此顯示「請選擇其他時間」
    pub fn is_slot_taken(&self) -> bool {
        matches!(
            self,
            SchedulingError::SlotUnavailable { .. }
                | SchedulingError::SlotClosed { .. }
                | SchedulingError::DayFullyClosed { .. }
        )
    }

    pub fn recovery_suggestion(&self) -> String {
        match self {
            SchedulingError::InvalidSlotTime { .. } => {
                "Pick one of the times listed in the day schedule".to_string()
            }
            SchedulingError::SlotUnavailable { .. } | SchedulingError::SlotClosed { .. } => {
                "Pick another time; the schedule shows which slots are still open".to_string()
            }
            SchedulingError::DayFullyClosed { .. } => "Pick another day".to_string(),
            SchedulingError::NotFound { .. } => {
                "Reload the schedule; the record may have been removed already".to_string()
            }
            SchedulingError::DataIntegrityConflict { .. } => {
                "Open the slot or move the appointment so only one record remains".to_string()
            }
            SchedulingError::StoreFailure { operation, .. } => {
                if operation.is_idempotent() {
                    format!("Retry {} once the store is reachable", operation)
                } else {
                    format!(
                        "Check the day schedule again before repeating {}",
                        operation
                    )
                }
            }
            SchedulingError::InvalidInput { field, .. } => format!("Correct the {} value", field),
            SchedulingError::ConfigError { .. }
            | SchedulingError::InvalidConfigValueError { .. } => {
                "Check the configuration file".to_string()
            }
            SchedulingError::IoError(_) => "Check file paths and permissions".to_string(),
            SchedulingError::SerializationError(_) => {
                "Check that the data file is valid JSON".to_string()
            }
        }
    }

    pub fn user_friendly_message(&self) -> String {
        match self {
            SchedulingError::InvalidSlotTime { date, time } => {
                format!("{} is not an appointment time on {}", time, date)
            }
            SchedulingError::SlotUnavailable { slot } => format!(
                "{} on {} is already taken",
                slot.time_of_day, slot.date
            ),
            SchedulingError::SlotClosed { slot, reason } => match reason {
                Some(reason) => format!(
                    "{} on {} is closed: {}",
                    slot.time_of_day, slot.date, reason
                ),
                None => format!("{} on {} is closed", slot.time_of_day, slot.date),
            },
            SchedulingError::DayFullyClosed { date, .. } => {
                format!("No appointments are taken on {}", date)
            }
            SchedulingError::NotFound { entity, .. } => format!("The {} does not exist", entity),
            SchedulingError::StoreFailure { .. } => {
                "The booking data could not be reached".to_string()
            }
            other => other.to_string(),
        }
    }
}

/// 把 `StoreResult` 轉成帶有操作名稱的 `Result`
pub trait StoreContext<T> {
    fn during(self, operation: Operation) -> Result<T>;
}

impl<T> StoreContext<T> for StoreResult<T> {
    fn during(self, operation: Operation) -> Result<T> {
        self.map_err(|source| SchedulingError::store(operation, source))
    }
}
