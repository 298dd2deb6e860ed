use anyhow::Result;
use booking_access::core::{AccessDecision, StoreTier, TimeSlot};
use booking_access::{
    BookingRequest, HttpReservationStore, LocalReservationStore, ReservationService,
    ScheduleConfig, StorePolicy,
};
use chrono::{NaiveDate, TimeZone, Utc};
use httpmock::prelude::*;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

fn day() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 10, 3).unwrap()
}

fn fast_policy() -> StorePolicy {
    StorePolicy {
        timeout: Duration::from_secs(2),
        retry_attempts: 0,
        retry_delay: Duration::from_millis(1),
    }
}

fn reservation_json(id: &str, start: &str, end: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "subjectId": "uai123456",
        "classId": "gim",
        "startInstant": start,
        "endInstant": end
    })
}

#[tokio::test]
async fn test_booking_through_http_primary() -> Result<()> {
    let server = MockServer::start();

    let list_mock = server.mock(|when, then| {
        when.method(GET)
            .path("/reservations")
            .query_param("subjectId", "uai123456")
            .query_param("date", "2025-10-03");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!([]));
    });
    let create_mock = server.mock(|when, then| {
        when.method(POST).path("/reservations");
        then.status(201)
            .header("Content-Type", "application/json")
            .json_body(reservation_json(
                "srv-7",
                "2025-10-03T07:00:00Z",
                "2025-10-03T08:00:00Z",
            ));
    });

    let primary = Arc::new(HttpReservationStore::new(&server.base_url()));
    let service = ReservationService::new(ScheduleConfig::default(), primary)?.with_policy(fast_policy());

    let booking = service
        .book(BookingRequest::new("uai123456", "gim", day(), TimeSlot::new(7, 0)))
        .await?;

    list_mock.assert();
    create_mock.assert();
    assert_eq!(booking.reservation.id, "srv-7");
    assert_eq!(booking.stored_in, StoreTier::Primary);
    assert_eq!(
        booking.token.text,
        format!(
            "UAI|uai123456|gim|{}|{}|CS{:02}",
            1759474800,
            1759478400,
            booking.token.checksum
        )
    );

    // Gimnasio scenario: 07:00-08:00 with 10 minutes of grace
    let at = |h, m, s| Utc.with_ymd_and_hms(2025, 10, 3, h, m, s).unwrap();
    let reservation = &booking.reservation;
    assert_eq!(service.check_access_now(reservation, at(6, 50, 0))?, AccessDecision::Allowed);
    assert_eq!(service.check_access_now(reservation, at(6, 49, 59))?, AccessDecision::Denied);
    assert_eq!(service.check_access_now(reservation, at(8, 10, 0))?, AccessDecision::Allowed);
    assert_eq!(service.check_access_now(reservation, at(8, 10, 1))?, AccessDecision::Denied);
    Ok(())
}

#[tokio::test]
async fn test_overlap_against_primary_listing_never_writes() -> Result<()> {
    let server = MockServer::start();

    server.mock(|when, then| {
        when.method(GET).path("/reservations");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!([reservation_json(
                "srv-1",
                "2025-10-03T07:00:00Z",
                "2025-10-03T08:00:00Z"
            )]));
    });
    let create_mock = server.mock(|when, then| {
        when.method(POST).path("/reservations");
        then.status(201);
    });

    let primary = Arc::new(HttpReservationStore::new(&server.base_url()));
    let service = ReservationService::new(ScheduleConfig::default(), primary)?.with_policy(fast_policy());

    let err = service
        .book(BookingRequest::new("uai123456", "gim", day(), TimeSlot::new(7, 30)))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "OVERLAPPING_RESERVATION");
    create_mock.assert_hits(0);
    Ok(())
}

#[tokio::test]
async fn test_primary_down_with_fallback_commits_locally() -> Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.any_request();
        then.status(503);
    });

    let temp_dir = TempDir::new()?;
    let schedule = ScheduleConfig::default();
    let fallback = Arc::new(LocalReservationStore::new(temp_dir.path(), schedule.classes.clone()));
    let primary = Arc::new(HttpReservationStore::new(&server.base_url()));
    let service = ReservationService::new(schedule, primary)?
        .with_fallback(fallback.clone())
        .with_policy(fast_policy());

    let booking = service
        .book(BookingRequest::new("uai123456", "gim", day(), TimeSlot::new(7, 0)))
        .await?;

    assert_eq!(booking.stored_in, StoreTier::Fallback);
    assert_eq!(booking.reservation.id, "local-uai123456-20251003-1");
    assert!(temp_dir.path().join("uai123456_2025-10-03.json").exists());

    // the fallback now knows about the reservation, so an overlap is caught
    let err = service
        .book(BookingRequest::new("uai123456", "pis", day(), TimeSlot::new(7, 30)))
        .await
        .unwrap_err();
    assert_eq!(err.code(), "OVERLAPPING_RESERVATION");
    Ok(())
}

#[tokio::test]
async fn test_primary_unreachable_without_fallback_fails() -> Result<()> {
    let primary = Arc::new(HttpReservationStore::new("http://127.0.0.1:9"));
    let service = ReservationService::new(ScheduleConfig::default(), primary)?.with_policy(fast_policy());

    let err = service
        .book(BookingRequest::new("uai123456", "gim", day(), TimeSlot::new(7, 0)))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "STORE_UNAVAILABLE");
    assert!(err.is_transient());
    Ok(())
}

#[tokio::test]
async fn test_store_conflict_does_not_fall_back() -> Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/reservations");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!([]));
    });
    server.mock(|when, then| {
        when.method(POST).path("/reservations");
        then.status(409).body("booked from another device");
    });

    let temp_dir = TempDir::new()?;
    let fallback = Arc::new(LocalReservationStore::new(temp_dir.path(), vec![]));
    let primary = Arc::new(HttpReservationStore::new(&server.base_url()));
    let service = ReservationService::new(ScheduleConfig::default(), primary)?
        .with_fallback(fallback)
        .with_policy(fast_policy());

    let err = service
        .book(BookingRequest::new("uai123456", "gim", day(), TimeSlot::new(7, 0)))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "OVERLAPPING_RESERVATION");
    assert!(err.to_string().contains("another device"));
    assert!(!temp_dir.path().join("uai123456_2025-10-03.json").exists());
    Ok(())
}

#[tokio::test]
async fn test_write_failure_on_primary_uses_fallback() -> Result<()> {
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/reservations");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!([]));
    });
    server.mock(|when, then| {
        when.method(POST).path("/reservations");
        then.status(500);
    });

    let temp_dir = TempDir::new()?;
    let fallback = Arc::new(LocalReservationStore::new(temp_dir.path(), vec![]));
    let primary = Arc::new(HttpReservationStore::new(&server.base_url()));
    let service = ReservationService::new(ScheduleConfig::default(), primary)?
        .with_fallback(fallback)
        .with_policy(fast_policy());

    let booking = service
        .book(BookingRequest::new("uai123456", "yog", day(), TimeSlot::new(17, 0)))
        .await?;

    assert_eq!(booking.stored_in, StoreTier::Fallback);
    assert_eq!(booking.reservation.class_id, "yog");
    Ok(())
}

#[tokio::test]
async fn test_primary_read_is_retried() -> Result<()> {
    let server = MockServer::start();
    let failing = server.mock(|when, then| {
        when.method(GET).path("/classes");
        then.status(502);
    });

    let primary = Arc::new(HttpReservationStore::new(&server.base_url()));
    let service = ReservationService::new(ScheduleConfig::default(), primary)?.with_policy(StorePolicy {
        retry_attempts: 2,
        ..fast_policy()
    });

    let classes = service.load_catalog().await;

    failing.assert_hits(3);
    assert_eq!(classes, ScheduleConfig::default().classes);
    Ok(())
}

#[tokio::test]
async fn test_outage_booking_in_fallback_blocks_later_overlap() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let schedule = ScheduleConfig::default();
    let fallback = Arc::new(LocalReservationStore::new(temp_dir.path(), schedule.classes.clone()));

    // committed while the primary was down
    let outage = ReservationService::new(
        schedule.clone(),
        Arc::new(HttpReservationStore::new("http://127.0.0.1:9")),
    )?
    .with_fallback(fallback.clone())
    .with_policy(fast_policy());
    let booking = outage
        .book(BookingRequest::new("uai123456", "gim", day(), TimeSlot::new(7, 0)))
        .await?;
    assert_eq!(booking.stored_in, StoreTier::Fallback);

    // primary is back and knows nothing about it
    let server = MockServer::start();
    server.mock(|when, then| {
        when.method(GET).path("/reservations");
        then.status(200)
            .header("Content-Type", "application/json")
            .json_body(serde_json::json!([]));
    });
    let create_mock = server.mock(|when, then| {
        when.method(POST).path("/reservations");
        then.status(201);
    });
    let recovered = ReservationService::new(
        schedule,
        Arc::new(HttpReservationStore::new(&server.base_url())),
    )?
    .with_fallback(fallback)
    .with_policy(fast_policy());

    let err = recovered
        .book(BookingRequest::new("uai123456", "pis", day(), TimeSlot::new(7, 30)))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "OVERLAPPING_RESERVATION");
    create_mock.assert_hits(0);
    Ok(())
}
