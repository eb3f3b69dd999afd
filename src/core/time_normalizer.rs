use crate::domain::model::{CalendarSlot, ProviderId, TimeOfDay};
use crate::utils::error::{Result, SchedulingError};
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, Utc};
use chrono_tz::Tz;

pub const DEFAULT_TIMEZONE: Tz = chrono_tz::Europe::Istanbul;

const NAIVE_FORMATS: [&str; 6] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
];

/// 呼叫端可能送來的各種日期時間寫法
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RawSlotInput<'a> {
    /// `2025-04-15`，時間視為 00:00
    DateOnly(&'a str),
    /// `2025-04-15T10:15`、`2025-04-15 10:15:00`，或帶時區的 `2025-04-15T07:15:00Z`
    Combined(&'a str),
    Separate { date: &'a str, time: &'a str },
    Timestamp(DateTime<Utc>),
    EpochMillis(i64),
    /// 已經是店內當地時間
    Local(NaiveDateTime),
}

/// 把各種輸入轉成 `CalendarSlot`。不帶時區的輸入直接取年月日時分欄位；
/// 帶時區或時間戳記的輸入先換算到店內固定時區，再取欄位。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeNormalizer {
    zone: Tz,
}

impl Default for TimeNormalizer {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEZONE)
    }
}

impl TimeNormalizer {
    pub fn new(zone: Tz) -> Self {
        Self { zone }
    }

    pub fn zone(&self) -> Tz {
        self.zone
    }

    pub fn to_calendar_slot(
        &self,
        provider_id: ProviderId,
        input: RawSlotInput<'_>,
    ) -> Result<CalendarSlot> {
        let local = self.to_local(input)?;
        Ok(CalendarSlot::from_local(provider_id, local))
    }

    pub fn to_local(&self, input: RawSlotInput<'_>) -> Result<NaiveDateTime> {
        match input {
            RawSlotInput::DateOnly(raw) => Ok(Self::parse_date(raw)?.and_time(TimeOfDay::MIDNIGHT.to_naive_time())),
            RawSlotInput::Combined(raw) => self.parse_combined(raw),
            RawSlotInput::Separate { date, time } => {
                let date = Self::parse_date(date)?;
                let time = Self::parse_time_of_day(time)?;
                Ok(date.and_time(time.to_naive_time()))
            }
            RawSlotInput::Timestamp(instant) => Ok(self.local_from_instant(instant)),
            RawSlotInput::EpochMillis(millis) => {
                let instant = DateTime::<Utc>::from_timestamp_millis(millis).ok_or_else(|| {
                    SchedulingError::InvalidInput {
                        field: "timestamp".to_string(),
                        value: millis.to_string(),
                        reason: "timestamp is out of range".to_string(),
                    }
                })?;
                Ok(self.local_from_instant(instant))
            }
            RawSlotInput::Local(local) => Ok(local),
        }
    }

    pub fn local_from_instant(&self, instant: DateTime<Utc>) -> NaiveDateTime {
        instant.with_timezone(&self.zone).naive_local()
    }

    pub fn today(&self) -> NaiveDate {
        self.local_from_instant(Utc::now()).date()
    }

    pub fn parse_date(raw: &str) -> Result<NaiveDate> {
        NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|e| SchedulingError::InvalidInput {
            field: "date".to_string(),
            value: raw.to_string(),
            reason: format!("expected YYYY-MM-DD ({})", e),
        })
    }

    pub fn parse_time_of_day(raw: &str) -> Result<TimeOfDay> {
        raw.parse()
    }

    fn parse_combined(&self, raw: &str) -> Result<NaiveDateTime> {
        let trimmed = raw.trim();

        if let Ok(with_offset) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(self.local_from_offset(with_offset));
        }
        // RFC 3339 要求秒數，`2025-04-15T10:15+03:00` 這種寫法另外處理
        if let Ok(with_offset) = DateTime::parse_from_str(trimmed, "%Y-%m-%dT%H:%M%#z") {
            return Ok(self.local_from_offset(with_offset));
        }

        if let Some(local) = NAIVE_FORMATS
            .iter()
            .find_map(|format| NaiveDateTime::parse_from_str(trimmed, format).ok())
        {
            return Ok(local);
        }

        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            return Ok(date.and_time(TimeOfDay::MIDNIGHT.to_naive_time()));
        }

        Err(SchedulingError::InvalidInput {
            field: "date_time".to_string(),
            value: raw.to_string(),
            reason: "expected YYYY-MM-DDTHH:mm[:ss][offset]".to_string(),
        })
    }

    fn local_from_offset(&self, value: DateTime<FixedOffset>) -> NaiveDateTime {
        value.with_timezone(&self.zone).naive_local()
    }
}
