use barber_slots::domain::model::{
    CalendarSlot, CustomerDetails, Provider, ProviderId, SlotState, TimeOfDay, UpdateRequest,
};
use barber_slots::utils::error::SchedulingError;
use barber_slots::{EngineSettings, InMemoryStore, SchedulingEngine};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;

const P: ProviderId = ProviderId(1);

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 4, 15).unwrap()
}

fn t(s: &str) -> TimeOfDay {
    s.parse().unwrap()
}

fn setup() -> (Arc<InMemoryStore>, SchedulingEngine) {
    let store = Arc::new(InMemoryStore::with_providers([Provider {
        id: P,
        name: "Mehmet".into(),
    }]));
    let engine = SchedulingEngine::new(store.clone(), EngineSettings::default()).unwrap();
    (store, engine)
}

async fn assert_one_appointment_per_slot(store: &InMemoryStore) {
    let snapshot = store.snapshot().await;
    let mut per_slot: HashMap<CalendarSlot, usize> = HashMap::new();
    for appointment in &snapshot.appointments {
        *per_slot.entry(appointment.slot()).or_default() += 1;
    }
    assert!(
        per_slot.values().all(|&count| count == 1),
        "double booking: {:?}",
        per_slot
    );
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_reserves_have_exactly_one_winner() {
    let (store, engine) = setup();

    let mut handles = Vec::new();
    for i in 0..16 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            engine
                .reserve(
                    P,
                    day(),
                    t("10:15"),
                    CustomerDetails::new(format!("Customer {}", i), "05321234567"),
                )
                .await
        }));
    }

    let mut winners = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(_) => winners += 1,
            Err(e) => assert!(
                matches!(e, SchedulingError::SlotUnavailable { .. }),
                "unexpected error {:?}",
                e
            ),
        }
    }

    assert_eq!(winners, 1);
    assert_eq!(store.appointment_count().await, 1);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_interleaved_updates_and_cancels_never_double_book() {
    let (store, engine) = setup();
    let sources = ["09:30", "10:15", "11:00", "11:45", "12:30", "13:15"];

    let mut ids = Vec::new();
    for time in sources {
        let appointment = engine
            .reserve(P, day(), t(time), CustomerDetails::new("Ali Veli", "05321234567"))
            .await
            .unwrap();
        ids.push(appointment.id);
    }

    let mut handles = Vec::new();
    for (i, id) in ids.iter().copied().enumerate() {
        let mover = engine.clone();
        handles.push(tokio::spawn(async move {
            if i % 3 == 2 {
                mover.cancel(id).await.map(|_| ())
            } else {
                // 大家搶同一個目標時段
                mover
                    .update_reservation(
                        id,
                        UpdateRequest {
                            time_of_day: Some(t("18:30")),
                            ..Default::default()
                        },
                    )
                    .await
                    .map(|_| ())
            }
        }));
        let reserver = engine.clone();
        handles.push(tokio::spawn(async move {
            reserver
                .reserve(P, day(), t("18:30"), CustomerDetails::new("Can Demir", "05321234567"))
                .await
                .map(|_| ())
        }));
    }

    let mut moved_or_reserved = 0;
    for handle in handles {
        match handle.await.unwrap() {
            Ok(()) => moved_or_reserved += 1,
            Err(e) => assert!(
                matches!(e, SchedulingError::SlotUnavailable { .. }),
                "unexpected error {:?}",
                e
            ),
        }
    }
    // 兩個取消一定成功，外加搶到 18:30 的那一個
    assert_eq!(moved_or_reserved, 3);

    assert_one_appointment_per_slot(&store).await;
    let schedule = engine.get_day_schedule(P, day()).await.unwrap();
    assert_eq!(schedule.entry(t("18:30")).unwrap().status, SlotState::Booked);
    assert!(schedule.warnings.is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reserve_racing_close_day_leaves_consistent_day() {
    for _ in 0..10 {
        let (_, engine) = setup();

        let closer = {
            let engine = engine.clone();
            tokio::spawn(async move { engine.close_day(P, day(), Some("holiday".into())).await })
        };
        let booker = {
            let engine = engine.clone();
            tokio::spawn(async move {
                engine
                    .reserve(P, day(), t("15:30"), CustomerDetails::new("Ali Veli", "05321234567"))
                    .await
            })
        };

        let closed = closer.await.unwrap().unwrap();
        let booked = booker.await.unwrap();
        let schedule = engine.get_day_schedule(P, day()).await.unwrap();
        assert!(schedule.warnings.is_empty());

        match booked {
            Ok(_) => {
                assert_eq!(closed, 15);
                assert_eq!(schedule.entry(t("15:30")).unwrap().status, SlotState::Booked);
                assert_eq!(schedule.count(SlotState::Closed), 15);
            }
            Err(e) => {
                assert!(matches!(e, SchedulingError::DayFullyClosed { .. }), "{:?}", e);
                assert_eq!(closed, 16);
                assert!(schedule.is_fully_closed());
            }
        }
    }
}
