use crate::utils::error::SchedulingError;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

const MINUTES_PER_DAY: u32 = 24 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProviderId(pub u32);

impl fmt::Display for ProviderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// 擁有自己行事曆的店員 (理髮師)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Provider {
    pub id: ProviderId,
    pub name: String,
}

/// 牆上時鐘的時刻，精確到分鐘，顯示為補零的 `HH:mm`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimeOfDay {
    minutes: u16,
}

impl TimeOfDay {
    pub const MIDNIGHT: TimeOfDay = TimeOfDay { minutes: 0 };

    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        if hour >= 24 || minute >= 60 {
            return None;
        }
        Self::from_minutes(hour * 60 + minute)
    }

    pub fn from_minutes(minutes: u32) -> Option<Self> {
        if minutes >= MINUTES_PER_DAY {
            return None;
        }
        Some(Self {
            minutes: minutes as u16,
        })
    }

    /// 秒數直接捨去，不做四捨五入
    pub fn from_naive_time(time: NaiveTime) -> Self {
        Self {
            minutes: (time.hour() * 60 + time.minute()) as u16,
        }
    }

    pub fn hour(&self) -> u32 {
        u32::from(self.minutes) / 60
    }

    pub fn minute(&self) -> u32 {
        u32::from(self.minutes) % 60
    }

    pub fn minutes_since_midnight(&self) -> u32 {
        u32::from(self.minutes)
    }

    pub fn checked_add_minutes(&self, minutes: u32) -> Option<Self> {
        Self::from_minutes(self.minutes_since_midnight().checked_add(minutes)?)
    }

    pub fn to_naive_time(&self) -> NaiveTime {
        NaiveTime::from_hms_opt(self.hour(), self.minute(), 0).unwrap_or(NaiveTime::MIN)
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour(), self.minute())
    }
}

impl FromStr for TimeOfDay {
    type Err = SchedulingError;

    /// 接受 `H:mm`、`HH:mm` 與 `HH:mm:ss`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| SchedulingError::InvalidInput {
            field: "time_of_day".to_string(),
            value: s.to_string(),
            reason: reason.to_string(),
        };

        let parts: Vec<&str> = s.trim().split(':').collect();
        if parts.len() != 2 && parts.len() != 3 {
            return Err(invalid("expected HH:mm"));
        }

        let all_digits = |p: &str| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit());
        if !all_digits(parts[0]) || parts[0].len() > 2 {
            return Err(invalid("hour must be one or two digits"));
        }
        if !all_digits(parts[1]) || parts[1].len() != 2 {
            return Err(invalid("minute must be two digits"));
        }
        if let Some(seconds) = parts.get(2) {
            if !all_digits(seconds) || seconds.len() != 2 {
                return Err(invalid("seconds must be two digits"));
            }
        }

        let hour: u32 = parts[0].parse().map_err(|_| invalid("hour is not a number"))?;
        let minute: u32 = parts[1]
            .parse()
            .map_err(|_| invalid("minute is not a number"))?;

        TimeOfDay::new(hour, minute).ok_or_else(|| invalid("time is out of range"))
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

/// 可預約單位的結構性鍵值：三個欄位完全相同才視為同一個時段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CalendarSlot {
    pub provider_id: ProviderId,
    pub date: NaiveDate,
    pub time_of_day: TimeOfDay,
}

impl CalendarSlot {
    pub fn new(provider_id: ProviderId, date: NaiveDate, time_of_day: TimeOfDay) -> Self {
        Self {
            provider_id,
            date,
            time_of_day,
        }
    }

    /// 由當地牆上時間建立時段，直接取用年月日時分欄位
    pub fn from_local(provider_id: ProviderId, local: NaiveDateTime) -> Self {
        Self {
            provider_id,
            date: local.date(),
            time_of_day: TimeOfDay::from_naive_time(local.time()),
        }
    }

    pub fn starts_at(&self) -> NaiveDateTime {
        self.date.and_time(self.time_of_day.to_naive_time())
    }
}

impl fmt::Display for CalendarSlot {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "provider {} @ {} {}",
            self.provider_id, self.date, self.time_of_day
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CustomerDetails {
    pub customer_name: String,
    pub phone: String,
}

impl CustomerDetails {
    pub fn new(customer_name: impl Into<String>, phone: impl Into<String>) -> Self {
        Self {
            customer_name: customer_name.into().trim().to_string(),
            phone: phone.into().trim().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Appointment {
    pub id: Uuid,
    pub provider_id: ProviderId,
    /// 店內當地時間，不帶時區
    pub starts_at: NaiveDateTime,
    pub customer_name: String,
    pub phone: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Appointment {
    pub fn new(slot: &CalendarSlot, details: CustomerDetails) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            provider_id: slot.provider_id,
            starts_at: slot.starts_at(),
            customer_name: details.customer_name,
            phone: details.phone,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn slot(&self) -> CalendarSlot {
        CalendarSlot::from_local(self.provider_id, self.starts_at)
    }

    pub fn details(&self) -> CustomerDetails {
        CustomerDetails {
            customer_name: self.customer_name.clone(),
            phone: self.phone.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClosureRecord {
    pub id: Uuid,
    pub provider_id: ProviderId,
    pub starts_at: NaiveDateTime,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl ClosureRecord {
    pub fn new(slot: &CalendarSlot, reason: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            provider_id: slot.provider_id,
            starts_at: slot.starts_at(),
            reason: reason
                .map(|r| r.trim().to_string())
                .filter(|r| !r.is_empty()),
            created_at: Utc::now(),
        }
    }

    pub fn slot(&self) -> CalendarSlot {
        CalendarSlot::from_local(self.provider_id, self.starts_at)
    }
}

/// 單一時段的分類結果
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", content = "record", rename_all = "snake_case")]
pub enum SlotStatus {
    Open,
    Booked(Appointment),
    Closed(ClosureRecord),
}

impl SlotStatus {
    pub fn state(&self) -> SlotState {
        match self {
            SlotStatus::Open => SlotState::Open,
            SlotStatus::Booked(_) => SlotState::Booked,
            SlotStatus::Closed(_) => SlotState::Closed,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SlotState {
    Open,
    Booked,
    Closed,
}

impl fmt::Display for SlotState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SlotState::Open => "OPEN",
            SlotState::Booked => "BOOKED",
            SlotState::Closed => "CLOSED",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecordKind {
    Appointment,
    Closure,
}

/// 分類時發現但不致中斷流程的資料問題
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum IntegrityWarning {
    /// 同一時段同時存在預約與關閉紀錄
    BookedAndClosed {
        slot: CalendarSlot,
        appointment_id: Uuid,
        closure_id: Uuid,
    },
    /// 紀錄的時間不在當日的標準時段內
    OffGrid {
        kind: RecordKind,
        id: Uuid,
        provider_id: ProviderId,
        starts_at: NaiveDateTime,
    },
    /// 同一時段有多筆相同種類的紀錄，只採用第一筆
    Duplicate {
        kind: RecordKind,
        slot: CalendarSlot,
        kept: Uuid,
        ignored: Uuid,
    },
}

impl IntegrityWarning {
    pub fn to_error(&self) -> Option<SchedulingError> {
        match self {
            IntegrityWarning::BookedAndClosed {
                slot,
                appointment_id,
                closure_id,
            } => Some(SchedulingError::DataIntegrityConflict {
                slot: *slot,
                appointment_id: *appointment_id,
                closure_id: *closure_id,
            }),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AppointmentSummary {
    pub id: Uuid,
    pub customer_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ScheduleEntry {
    pub time_of_day: TimeOfDay,
    pub status: SlotState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub appointment: Option<AppointmentSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DaySchedule {
    pub provider_id: ProviderId,
    pub date: NaiveDate,
    pub entries: Vec<ScheduleEntry>,
    pub warnings: Vec<IntegrityWarning>,
}

impl DaySchedule {
    pub fn entry(&self, time: TimeOfDay) -> Option<&ScheduleEntry> {
        self.entries.iter().find(|e| e.time_of_day == time)
    }

    pub fn count(&self, state: SlotState) -> usize {
        self.entries.iter().filter(|e| e.status == state).count()
    }

    pub fn is_fully_closed(&self) -> bool {
        !self.entries.is_empty() && self.count(SlotState::Closed) == self.entries.len()
    }

    /// 把顧客姓名遮成縮寫並拿掉電話，給未登入的訪客看
    pub fn masked(mut self) -> Self {
        for entry in &mut self.entries {
            if let Some(summary) = entry.appointment.as_mut() {
                summary.customer_name = mask_name(&summary.customer_name);
                summary.phone = None;
            }
        }
        self
    }

    /// 第一個「同時預約又關閉」的衝突會轉成錯誤
    pub fn ensure_consistent(&self) -> Result<(), SchedulingError> {
        match self.warnings.iter().find_map(IntegrityWarning::to_error) {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// "Ahmet Yılmaz" -> "A. Y."
pub fn mask_name(full_name: &str) -> String {
    full_name
        .split_whitespace()
        .take(2)
        .filter_map(|part| part.chars().next())
        .map(|initial| format!("{}.", initial))
        .collect::<Vec<_>>()
        .join(" ")
}

/// 需要更新的欄位；`None` 代表維持原值
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateRequest {
    pub date: Option<NaiveDate>,
    pub time_of_day: Option<TimeOfDay>,
    pub customer_name: Option<String>,
    pub phone: Option<String>,
}

impl UpdateRequest {
    pub fn moves_slot(&self) -> bool {
        self.date.is_some() || self.time_of_day.is_some()
    }
}

/// 月曆上每一天的負載
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DayLoad {
    Empty,
    Low,
    Medium,
    Full,
    Closed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DayOverview {
    pub date: NaiveDate,
    pub load: DayLoad,
    pub booked: usize,
    pub closed: usize,
    pub open: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_time_of_day_parse_and_display() {
        assert_eq!("9:30".parse::<TimeOfDay>().unwrap().to_string(), "09:30");
        assert_eq!("10:15".parse::<TimeOfDay>().unwrap().to_string(), "10:15");
        assert_eq!("20:45:00".parse::<TimeOfDay>().unwrap().to_string(), "20:45");
        assert!("24:00".parse::<TimeOfDay>().is_err());
        assert!("10:5".parse::<TimeOfDay>().is_err());
        assert!("10h15".parse::<TimeOfDay>().is_err());
        assert!("".parse::<TimeOfDay>().is_err());
    }

    #[test]
    fn test_time_of_day_arithmetic() {
        let t = TimeOfDay::new(9, 30).unwrap();
        assert_eq!(t.checked_add_minutes(45).unwrap().to_string(), "10:15");
        assert!(TimeOfDay::new(23, 30).unwrap().checked_add_minutes(45).is_none());
    }

    #[test]
    fn test_calendar_slot_structural_equality() {
        let a = CalendarSlot::new(ProviderId(1), date(2025, 4, 15), TimeOfDay::new(10, 15).unwrap());
        let b = CalendarSlot::from_local(
            ProviderId(1),
            date(2025, 4, 15).and_hms_opt(10, 15, 42).unwrap(),
        );
        let other_provider = CalendarSlot { provider_id: ProviderId(2), ..a };
        assert_eq!(a, b);
        assert_ne!(a, other_provider);
    }

    #[test]
    fn test_time_of_day_serializes_as_string() {
        let json = serde_json::to_string(&TimeOfDay::new(9, 30).unwrap()).unwrap();
        assert_eq!(json, "\"09:30\"");
        let back: TimeOfDay = serde_json::from_str("\"14:00\"").unwrap();
        assert_eq!(back, TimeOfDay::new(14, 0).unwrap());
    }

    #[test]
    fn test_mask_name() {
        assert_eq!(mask_name("Ahmet Yılmaz"), "A. Y.");
        assert_eq!(mask_name("Cem"), "C.");
        assert_eq!(mask_name("  "), "");
        assert_eq!(mask_name("Ömer Faruk Demir"), "Ö. F.");
    }

    #[test]
    fn test_closure_reason_is_trimmed() {
        let slot = CalendarSlot::new(ProviderId(1), date(2025, 4, 15), TimeOfDay::new(11, 0).unwrap());
        assert_eq!(ClosureRecord::new(&slot, Some("   ".into())).reason, None);
        assert_eq!(
            ClosureRecord::new(&slot, Some(" holiday ".into())).reason.as_deref(),
            Some("holiday")
        );
    }
}
