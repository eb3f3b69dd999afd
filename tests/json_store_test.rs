use barber_slots::domain::model::{CustomerDetails, ProviderId, SlotState, TimeOfDay};
use barber_slots::domain::ports::Store;
use barber_slots::utils::error::Operation;
use barber_slots::{JsonFileStore, SchedulingEngine, SchedulingError, ShopConfig};
use chrono::NaiveDate;
use std::sync::Arc;
use tempfile::TempDir;

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 4, 15).unwrap()
}

fn t(s: &str) -> TimeOfDay {
    s.parse().unwrap()
}

fn shop_config(data_path: &str) -> ShopConfig {
    ShopConfig::from_toml_str(&format!(
        r#"
[venue]
name = "Makas Berber"
timezone = "Europe/Istanbul"
closed_weekdays = ["Sun"]

[working_hours]
start = "09:30"
end = "20:45"
interval_minutes = 45

[store]
path = "{}"

[[providers]]
id = 1
name = "Mehmet"
"#,
        data_path
    ))
    .unwrap()
}

async fn open_engine(config: &ShopConfig) -> SchedulingEngine {
    let store = JsonFileStore::open(config.store_path()).await.unwrap();
    store.seed_providers(config.providers.clone()).await.unwrap();
    SchedulingEngine::new(Arc::new(store), config.engine_settings().unwrap()).unwrap()
}

#[tokio::test]
async fn test_schedule_survives_reopen() {
    let temp_dir = TempDir::new().unwrap();
    let data_path = temp_dir.path().join("nested/schedule.json");
    let config = shop_config(data_path.to_str().unwrap());

    let appointment = {
        let engine = open_engine(&config).await;
        // 20:45 為結束時間時只有 15 個時段
        assert_eq!(engine.get_day_schedule(ProviderId(1), day()).await.unwrap().entries.len(), 15);

        let appointment = engine
            .reserve(
                ProviderId(1),
                day(),
                t("10:15"),
                CustomerDetails::new("Ayşe Kaya", "05321234567"),
            )
            .await
            .unwrap();
        engine
            .close_slot(ProviderId(1), day(), t("13:15"), Some("lunch".into()))
            .await
            .unwrap();
        appointment
    };
    assert!(data_path.exists());

    let engine = open_engine(&config).await;
    let schedule = engine.get_day_schedule(ProviderId(1), day()).await.unwrap();
    let booked = schedule.entry(t("10:15")).unwrap();
    assert_eq!(booked.status, SlotState::Booked);
    assert_eq!(booked.appointment.as_ref().unwrap().id, appointment.id);
    assert_eq!(schedule.entry(t("13:15")).unwrap().reason.as_deref(), Some("lunch"));
    assert_eq!(engine.providers().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_closed_weekday_from_config_blocks_reservations() {
    let temp_dir = TempDir::new().unwrap();
    let data_path = temp_dir.path().join("schedule.json");
    let engine = open_engine(&shop_config(data_path.to_str().unwrap())).await;

    // 2025-04-13 is a Sunday
    let sunday = NaiveDate::from_ymd_opt(2025, 4, 13).unwrap();
    let result = engine
        .reserve(
            ProviderId(1),
            sunday,
            t("10:15"),
            CustomerDetails::new("Ali Veli", "05321234567"),
        )
        .await;
    assert!(matches!(
        result,
        Err(barber_slots::SchedulingError::DayFullyClosed { .. })
    ));
}

#[tokio::test]
async fn test_corrupt_file_is_reported() {
    let temp_dir = TempDir::new().unwrap();
    let data_path = temp_dir.path().join("schedule.json");
    std::fs::write(&data_path, "{ not json").unwrap();

    assert!(JsonFileStore::open(&data_path).await.is_err());
}

#[tokio::test]
async fn test_no_op_writes_do_not_create_file() {
    let temp_dir = TempDir::new().unwrap();
    let data_path = temp_dir.path().join("schedule.json");
    let store = JsonFileStore::open(&data_path).await.unwrap();

    assert_eq!(store.delete_closures(ProviderId(1), day(), None).await.unwrap(), 0);
    assert!(!data_path.exists());
}

fn failed_operation(result: barber_slots::Result<impl std::fmt::Debug>) -> Operation {
    match result {
        Err(SchedulingError::StoreFailure { operation, .. }) => operation,
        other => panic!("expected a store failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_failed_disk_write_leaves_schedule_and_file_untouched() {
    let temp_dir = TempDir::new().unwrap();
    let data_path = temp_dir.path().join("schedule.json");
    let config = shop_config(data_path.to_str().unwrap());
    let engine = open_engine(&config).await;
    engine
        .close_slot(ProviderId(1), day(), t("13:15"), Some("lunch".into()))
        .await
        .unwrap();

    let schedule_before = engine.get_day_schedule(ProviderId(1), day()).await.unwrap();
    let file_before = std::fs::read(&data_path).unwrap();

    // 暫存檔的位置被目錄佔住，之後每次寫檔都會失敗
    let blocker = temp_dir.path().join("schedule.json.tmp");
    std::fs::create_dir(&blocker).unwrap();

    let customer = CustomerDetails::new("Ayşe Kaya", "05321234567");
    let reserved = engine.reserve(ProviderId(1), day(), t("10:15"), customer.clone()).await;
    assert_eq!(failed_operation(reserved), Operation::Reserve);
    let closed = engine.close_day(ProviderId(1), day(), Some("holiday".into())).await;
    assert_eq!(failed_operation(closed), Operation::CloseDay);
    let opened = engine.open_day(ProviderId(1), day()).await;
    assert_eq!(failed_operation(opened), Operation::OpenDay);

    let schedule_after = engine.get_day_schedule(ProviderId(1), day()).await.unwrap();
    assert_eq!(schedule_after, schedule_before);
    assert_eq!(schedule_after.entry(t("10:15")).unwrap().status, SlotState::Open);
    assert_eq!(schedule_after.entry(t("13:15")).unwrap().status, SlotState::Closed);
    assert_eq!(std::fs::read(&data_path).unwrap(), file_before);

    // 寫檔恢復後重試得到完整的結果
    std::fs::remove_dir(&blocker).unwrap();
    let appointment = engine
        .reserve(ProviderId(1), day(), t("10:15"), customer)
        .await
        .unwrap();
    assert_eq!(
        engine.close_day(ProviderId(1), day(), Some("holiday".into())).await.unwrap(),
        13
    );

    let reopened = open_engine(&config).await;
    let schedule = reopened.get_day_schedule(ProviderId(1), day()).await.unwrap();
    assert_eq!(schedule.entry(t("10:15")).unwrap().appointment.as_ref().unwrap().id, appointment.id);
    assert_eq!(schedule.count(SlotState::Closed), 14);
}
