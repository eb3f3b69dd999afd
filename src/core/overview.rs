use crate::domain::model::DayLoad;
use crate::utils::error::{Result, SchedulingError};
use chrono::{Datelike, NaiveDate};

/// 一個月的每一天
pub fn month_days(year: i32, month: u32) -> Result<Vec<NaiveDate>> {
    let first = NaiveDate::from_ymd_opt(year, month, 1).ok_or_else(|| SchedulingError::InvalidInput {
        field: "month".to_string(),
        value: format!("{}-{:02}", year, month),
        reason: "expected a valid year and month (1-12)".to_string(),
    })?;

    Ok(first
        .iter_days()
        .take_while(|d| d.month() == month)
        .collect())
}

/// 依預約比例決定月曆上的負載：0 為空，未滿一半為低，未滿為中，滿為滿。
/// 公休日或所有時段都關閉時為 `Closed`；沒有空位但有預約時視為滿。
pub fn classify_load(booked: usize, closed: usize, total: usize, weekday_closed: bool) -> DayLoad {
    if weekday_closed || total == 0 || closed == total {
        return DayLoad::Closed;
    }
    if booked == 0 {
        return DayLoad::Empty;
    }
    if booked + closed >= total {
        return DayLoad::Full;
    }

    let fullness = booked as f64 / total as f64;
    if fullness < 0.5 {
        DayLoad::Low
    } else if fullness < 1.0 {
        DayLoad::Medium
    } else {
        DayLoad::Full
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_month_days() {
        assert_eq!(month_days(2025, 4).unwrap().len(), 30);
        assert_eq!(month_days(2024, 2).unwrap().len(), 29);
        assert_eq!(month_days(2025, 2).unwrap().len(), 28);
        assert!(month_days(2025, 13).is_err());
    }

    #[test]
    fn test_classify_load() {
        assert_eq!(classify_load(0, 0, 16, false), DayLoad::Empty);
        assert_eq!(classify_load(3, 0, 16, false), DayLoad::Low);
        assert_eq!(classify_load(8, 0, 16, false), DayLoad::Medium);
        assert_eq!(classify_load(16, 0, 16, false), DayLoad::Full);
        assert_eq!(classify_load(1, 15, 16, false), DayLoad::Full);
        assert_eq!(classify_load(0, 16, 16, false), DayLoad::Closed);
        assert_eq!(classify_load(4, 0, 16, true), DayLoad::Closed);
        assert_eq!(classify_load(0, 3, 16, false), DayLoad::Empty);
    }
}
