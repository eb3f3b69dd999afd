use crate::core::availability::AvailabilityIndex;
use crate::core::booking::BookingCoordinator;
use crate::core::closure::ClosureManager;
use crate::core::locks::DayLocks;
use crate::core::overview::{classify_load, month_days};
use crate::core::slot_calendar::{SlotCalendar, WorkingHours};
use crate::core::time_normalizer::{TimeNormalizer, DEFAULT_TIMEZONE};
use crate::domain::model::{
    Appointment, CalendarSlot, ClosureRecord, CustomerDetails, DayOverview, DaySchedule, Provider,
    ProviderId, SlotState, TimeOfDay, UpdateRequest,
};
use crate::domain::ports::Store;
use crate::utils::error::{Operation, Result, SchedulingError, StoreContext};
use chrono::{Datelike, NaiveDate, NaiveTime, Weekday};
use chrono_tz::Tz;
use std::sync::Arc;
use uuid::Uuid;

/// 引擎執行時需要的設定
#[derive(Debug, Clone, PartialEq)]
pub struct EngineSettings {
    pub working_hours: WorkingHours,
    pub timezone: Tz,
    /// 公休日：不接受預約，月曆上顯示為關閉
    pub closed_weekdays: Vec<Weekday>,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            working_hours: WorkingHours::default(),
            timezone: DEFAULT_TIMEZONE,
            closed_weekdays: Vec::new(),
        }
    }
}

/// 給呼叫端 (HTTP handler、CLI) 使用的門面
#[derive(Clone)]
pub struct SchedulingEngine {
    store: Arc<dyn Store>,
    settings: EngineSettings,
    normalizer: TimeNormalizer,
    availability: AvailabilityIndex,
    booking: BookingCoordinator,
    closures: ClosureManager,
}

impl SchedulingEngine {
    pub fn new(store: Arc<dyn Store>, settings: EngineSettings) -> Result<Self> {
        let calendar = SlotCalendar::new(settings.working_hours)?;
        let locks = Arc::new(DayLocks::new());
        let availability = AvailabilityIndex::new(store.clone(), calendar);
        let booking = BookingCoordinator::new(
            store.clone(),
            availability.clone(),
            locks.clone(),
            settings.closed_weekdays.clone(),
        );
        let closures = ClosureManager::new(store.clone(), availability.clone(), locks);

        tracing::debug!(
            "Scheduling engine ready: {}-{} every {} minutes, zone {}",
            settings.working_hours.start,
            settings.working_hours.end,
            settings.working_hours.interval_minutes,
            settings.timezone
        );

        Ok(Self {
            store,
            normalizer: TimeNormalizer::new(settings.timezone),
            settings,
            availability,
            booking,
            closures,
        })
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn normalizer(&self) -> &TimeNormalizer {
        &self.normalizer
    }

    pub fn calendar(&self) -> &SlotCalendar {
        self.availability.calendar()
    }

    pub async fn providers(&self) -> Result<Vec<Provider>> {
        self.store.providers().await.during(Operation::Lookup)
    }

    pub async fn get_day_schedule(&self, provider_id: ProviderId, date: NaiveDate) -> Result<DaySchedule> {
        self.availability
            .require_provider(Operation::GetDaySchedule, provider_id)
            .await?;
        let day = self.availability.classify(provider_id, date).await?;
        Ok(day.into_schedule())
    }

    /// 顧客姓名遮成縮寫、不含電話
    pub async fn public_day_schedule(
        &self,
        provider_id: ProviderId,
        date: NaiveDate,
    ) -> Result<DaySchedule> {
        Ok(self.get_day_schedule(provider_id, date).await?.masked())
    }

    pub async fn appointment_at(&self, slot: &CalendarSlot) -> Result<Option<Appointment>> {
        self.store
            .find_appointment(slot)
            .await
            .during(Operation::Lookup)
    }

    pub async fn reserve(
        &self,
        provider_id: ProviderId,
        date: NaiveDate,
        time_of_day: TimeOfDay,
        details: CustomerDetails,
    ) -> Result<Appointment> {
        self.booking
            .reserve(provider_id, date, time_of_day, details)
            .await
    }

    pub async fn update_reservation(
        &self,
        appointment_id: Uuid,
        request: UpdateRequest,
    ) -> Result<Appointment> {
        self.booking.update(appointment_id, request).await
    }

    pub async fn cancel(&self, appointment_id: Uuid) -> Result<()> {
        self.booking.cancel(appointment_id).await
    }

    pub async fn close_slot(
        &self,
        provider_id: ProviderId,
        date: NaiveDate,
        time_of_day: TimeOfDay,
        reason: Option<String>,
    ) -> Result<Option<ClosureRecord>> {
        self.closures
            .close_slot(provider_id, date, time_of_day, reason)
            .await
    }

    pub async fn open_slot(
        &self,
        provider_id: ProviderId,
        date: NaiveDate,
        time_of_day: TimeOfDay,
    ) -> Result<bool> {
        self.closures.open_slot(provider_id, date, time_of_day).await
    }

    pub async fn close_day(
        &self,
        provider_id: ProviderId,
        date: NaiveDate,
        reason: Option<String>,
    ) -> Result<usize> {
        self.closures.close_day(provider_id, date, reason).await
    }

    pub async fn open_day(&self, provider_id: ProviderId, date: NaiveDate) -> Result<usize> {
        self.closures.open_day(provider_id, date).await
    }

    pub async fn month_overview(
        &self,
        provider_id: ProviderId,
        year: i32,
        month: u32,
    ) -> Result<Vec<DayOverview>> {
        self.availability
            .require_provider(Operation::GetDaySchedule, provider_id)
            .await?;

        let mut overview = Vec::new();
        for date in month_days(year, month)? {
            let day = self.availability.classify(provider_id, date).await?;
            let booked = day.count(SlotState::Booked);
            let closed = day.count(SlotState::Closed);
            let weekday_closed = self.settings.closed_weekdays.contains(&date.weekday());
            overview.push(DayOverview {
                date,
                load: classify_load(booked, closed, day.len(), weekday_closed),
                booked,
                closed,
                open: day.count(SlotState::Open),
            });
        }
        Ok(overview)
    }

    /// 包含 `from` 與 `to` 兩天
    pub async fn appointments_in_range(
        &self,
        provider_id: Option<ProviderId>,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<Vec<Appointment>> {
        if to < from {
            return Err(SchedulingError::InvalidInput {
                field: "to".to_string(),
                value: to.to_string(),
                reason: format!("must not be before {}", from),
            });
        }
        let end_of_day = NaiveTime::from_hms_opt(23, 59, 59).unwrap_or(NaiveTime::MIN);
        self.store
            .find_appointments_between(provider_id, from.and_time(NaiveTime::MIN), to.and_time(end_of_day))
            .await
            .during(Operation::Lookup)
    }
}
