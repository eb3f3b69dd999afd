use crate::domain::model::TimeOfDay;
use crate::utils::error::{Result, SchedulingError};
use crate::utils::validation::{validate_range, Validate};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// 營業時間：從 `start` 起每 `interval_minutes` 一個時段，最後一個時段必須早於 `end`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkingHours {
    pub start: TimeOfDay,
    pub end: TimeOfDay,
    pub interval_minutes: u32,
}

impl Default for WorkingHours {
    /// 09:30 - 21:00，每 45 分鐘，共 16 個時段
    fn default() -> Self {
        Self {
            start: TimeOfDay::from_minutes(9 * 60 + 30).unwrap_or(TimeOfDay::MIDNIGHT),
            end: TimeOfDay::from_minutes(21 * 60).unwrap_or(TimeOfDay::MIDNIGHT),
            interval_minutes: 45,
        }
    }
}

impl WorkingHours {
    pub fn new(start: TimeOfDay, end: TimeOfDay, interval_minutes: u32) -> Result<Self> {
        let hours = Self {
            start,
            end,
            interval_minutes,
        };
        hours.validate()?;
        Ok(hours)
    }
}

impl Validate for WorkingHours {
    fn validate(&self) -> Result<()> {
        validate_range("working_hours.interval_minutes", self.interval_minutes, 1, 24 * 60)?;
        if self.start >= self.end {
            return Err(SchedulingError::InvalidConfigValueError {
                field: "working_hours.end".to_string(),
                value: self.end.to_string(),
                reason: format!("End must be after start ({})", self.start),
            });
        }
        Ok(())
    }
}

/// 產生每天固定的可預約時段。與星期幾無關，公休日由上層決定
#[derive(Debug, Clone)]
pub struct SlotCalendar {
    hours: WorkingHours,
}

impl Default for SlotCalendar {
    fn default() -> Self {
        Self {
            hours: WorkingHours::default(),
        }
    }
}

impl SlotCalendar {
    pub fn new(hours: WorkingHours) -> Result<Self> {
        hours.validate()?;
        Ok(Self { hours })
    }

    pub fn working_hours(&self) -> &WorkingHours {
        &self.hours
    }

    pub fn generate_daily_slots(&self, _date: NaiveDate) -> Vec<TimeOfDay> {
        let mut slots = Vec::new();
        let mut current = Some(self.hours.start);

        while let Some(time) = current {
            if time >= self.hours.end {
                break;
            }
            slots.push(time);
            current = time.checked_add_minutes(self.hours.interval_minutes);
        }

        slots
    }

    pub fn slot_count(&self, date: NaiveDate) -> usize {
        self.generate_daily_slots(date).len()
    }

    pub fn contains(&self, date: NaiveDate, time: TimeOfDay) -> bool {
        self.generate_daily_slots(date).contains(&time)
    }

    /// 不在標準時段內就回傳 `InvalidSlotTime`
    pub fn require(&self, date: NaiveDate, time: TimeOfDay) -> Result<()> {
        if self.contains(date, time) {
            Ok(())
        } else {
            Err(SchedulingError::InvalidSlotTime { date, time })
        }
    }
}
