use anyhow::Result;
use booking_access::core::access_codec::{decode, decode_any, decode_hex, encode};
use booking_access::core::{AccessDecision, TimeSlot};
use booking_access::{AccessReader, BookingRequest, LocalReservationStore, ReservationService, ScheduleConfig};
use chrono::{DateTime, NaiveDate, Utc};
use std::sync::Arc;
use tempfile::TempDir;

/// Cross-implementation conformance vector.
const CONFORMANCE_TEXT: &str = "UAI|uai123456|gim|1759482000|1759485600|CS145";
const CONFORMANCE_HEX: &str = "5541497c7561693132333435367c67696d7c313735393438323030307c313735393438353630307c4353313435";

fn epoch(secs: i64) -> DateTime<Utc> {
    DateTime::from_timestamp(secs, 0).unwrap()
}

#[test]
fn test_conformance_vector_is_reproducible() -> Result<()> {
    let first = encode("uai123456", "gim", epoch(1759482000), epoch(1759485600))?;
    let second = encode("uai123456", "gim", epoch(1759482000), epoch(1759485600))?;

    assert_eq!(first, second);
    assert_eq!(first.text, CONFORMANCE_TEXT);
    assert_eq!(first.hex, CONFORMANCE_HEX);
    assert_eq!(decode(CONFORMANCE_TEXT)?, first.fields);
    assert_eq!(decode_hex(CONFORMANCE_HEX)?, first.fields);
    Ok(())
}

#[test]
fn test_reader_accepts_both_forms() -> Result<()> {
    let reader = AccessReader::new(10)?;
    let inside = epoch(1759482000 - 10 * 60);

    assert_eq!(reader.verify(CONFORMANCE_TEXT, inside)?, AccessDecision::Allowed);
    assert_eq!(reader.verify(CONFORMANCE_HEX, inside)?, AccessDecision::Allowed);
    assert_eq!(
        reader.verify(CONFORMANCE_HEX, epoch(1759482000 - 10 * 60 - 1))?,
        AccessDecision::Denied
    );
    Ok(())
}

#[test]
fn test_tampered_hex_is_rejected() {
    // last digit of the start epoch changed from 0x30 ('0') to 0x31 ('1')
    let tampered = CONFORMANCE_HEX.replacen("3438323030307c", "3438323030317c", 1);
    assert_ne!(tampered, CONFORMANCE_HEX);

    let err = decode_any(&tampered).unwrap_err();
    assert_eq!(err.code(), "CHECKSUM_MISMATCH");
}

#[tokio::test]
async fn test_booked_token_is_accepted_by_reader() -> Result<()> {
    let temp_dir = TempDir::new()?;
    let schedule = ScheduleConfig::default();
    let store = Arc::new(LocalReservationStore::new(temp_dir.path(), schedule.classes.clone()));
    let service = ReservationService::new(schedule, store)?;

    let date = NaiveDate::from_ymd_opt(2025, 10, 3).unwrap();
    let booking = service
        .book(BookingRequest::new("uai123456", "gim", date, TimeSlot::new(9, 0)))
        .await?;

    // 09:00Z-10:00Z is the conformance interval
    assert_eq!(booking.token.text, CONFORMANCE_TEXT);
    assert_eq!(booking.token.hex, CONFORMANCE_HEX);

    let reader = AccessReader::new(service.schedule().grace_minutes)?;
    for (now, expected) in [
        (1759481400, AccessDecision::Allowed),
        (1759481399, AccessDecision::Denied),
        (1759486200, AccessDecision::Allowed),
        (1759486201, AccessDecision::Denied),
    ] {
        assert_eq!(reader.verify(&booking.token.hex, epoch(now))?, expected);
        assert_eq!(service.check_access_now(&booking.reservation, epoch(now))?, expected);
    }
    Ok(())
}
