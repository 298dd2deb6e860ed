//! Booking orchestration.
//!
//! A booking attempt walks
//! `Idle -> Validating -> (Rejected | Persisting) -> (Committed | Failed)`.
//! Overlap checking runs locally against the subject's reservations for the
//! day; only a conflict-free candidate is submitted to a store. Attempts for
//! the same subject and date are serialized so the check-then-write sequence
//! cannot race with itself inside one process.

use crate::config::{ScheduleConfig, StorePolicy};
use crate::core::access_codec::{self, encode_reservation};
use crate::core::conflict::first_overlap;
use crate::core::time_window::{compute_access_window, compute_end, is_on_grid};
use crate::domain::model::{
    AccessDecision, Booking, ClassDefinition, NewReservation, Reservation, StoreTier, TimeSlot,
};
use crate::domain::ports::{ReservationStore, StoreError, StoreResult};
use crate::utils::error::{BookingError, ErrorCategory, Result};
use crate::utils::validation::{require_input, Validate};
use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use chrono_tz::Tz;
use std::collections::HashMap;
use std::future::Future;
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BookingState {
    Idle,
    Validating,
    Rejected,
    Persisting,
    Committed,
    Failed,
}

impl BookingState {
    pub fn can_transition_to(self, next: BookingState) -> bool {
        use BookingState::*;
        matches!(
            (self, next),
            (Idle, Validating)
                | (Validating, Rejected)
                | (Validating, Failed)
                | (Validating, Persisting)
                | (Persisting, Rejected)
                | (Persisting, Committed)
                | (Persisting, Failed)
        )
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            BookingState::Rejected | BookingState::Committed | BookingState::Failed
        )
    }

    /// Terminal state an attempt ends in when it stops with `error`.
    pub fn terminal_for(error: &BookingError) -> BookingState {
        match error.category() {
            ErrorCategory::Infrastructure => BookingState::Failed,
            _ => BookingState::Rejected,
        }
    }
}

#[derive(Debug, Clone)]
pub struct BookingRequest {
    pub subject_id: String,
    pub class_id: Option<String>,
    pub date: NaiveDate,
    pub start: TimeSlot,
    /// Overrides the class's default session length.
    pub duration_minutes: Option<i64>,
}

impl BookingRequest {
    pub fn new(subject_id: &str, class_id: &str, date: NaiveDate, start: TimeSlot) -> Self {
        Self {
            subject_id: subject_id.to_string(),
            class_id: Some(class_id.to_string()),
            date,
            start,
            duration_minutes: None,
        }
    }

    pub fn with_duration(mut self, minutes: i64) -> Self {
        self.duration_minutes = Some(minutes);
        self
    }
}

struct Attempt {
    state: BookingState,
    subject_id: String,
}

impl Attempt {
    fn new(subject_id: &str) -> Self {
        Self {
            state: BookingState::Idle,
            subject_id: subject_id.to_string(),
        }
    }

    fn advance(&mut self, next: BookingState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "invalid booking transition {:?} -> {:?}",
            self.state,
            next
        );
        tracing::debug!(
            subject = %self.subject_id,
            "booking state {:?} -> {:?}",
            self.state,
            next
        );
        self.state = next;
    }

    fn stop(&mut self, error: &BookingError) {
        let next = BookingState::terminal_for(error);
        self.advance(next);
        match next {
            BookingState::Failed => tracing::warn!(
                subject = %self.subject_id,
                code = error.code(),
                "booking failed: {}",
                error
            ),
            _ => tracing::info!(
                subject = %self.subject_id,
                code = error.code(),
                "booking rejected: {}",
                error
            ),
        }
    }
}

/// Per (subject, date) async mutexes.
#[derive(Default)]
struct KeyedLocks {
    inner: StdMutex<HashMap<(String, NaiveDate), Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    fn handle(&self, subject_id: &str, date: NaiveDate) -> Arc<Mutex<()>> {
        let mut map = self.inner.lock().unwrap_or_else(|p| p.into_inner());
        // drop locks nobody is holding or waiting on
        map.retain(|_, lock| Arc::strong_count(lock) > 1);
        map.entry((subject_id.to_string(), date))
            .or_default()
            .clone()
    }
}

/// Stateless access check: is `now` inside the reservation's grace-expanded window?
pub fn check_access_now(
    reservation: &Reservation,
    now: DateTime<Utc>,
    grace_minutes: i64,
) -> Result<AccessDecision> {
    let window = compute_access_window(
        reservation.start_instant,
        reservation.end_instant,
        grace_minutes,
    )?;
    Ok(if window.contains(now) {
        AccessDecision::Allowed
    } else {
        AccessDecision::Denied
    })
}

pub struct ReservationService {
    schedule: ScheduleConfig,
    timezone: Tz,
    policy: StorePolicy,
    primary: Arc<dyn ReservationStore>,
    fallback: Option<Arc<dyn ReservationStore>>,
    catalog: RwLock<Vec<ClassDefinition>>,
    locks: KeyedLocks,
}

impl ReservationService {
    pub fn new(schedule: ScheduleConfig, primary: Arc<dyn ReservationStore>) -> Result<Self> {
        schedule.validate()?;
        let timezone = schedule.tz()?;
        let catalog = RwLock::new(schedule.classes.clone());

        Ok(Self {
            schedule,
            timezone,
            policy: StorePolicy::default(),
            primary,
            fallback: None,
            catalog,
            locks: KeyedLocks::default(),
        })
    }

    pub fn with_fallback(mut self, fallback: Arc<dyn ReservationStore>) -> Self {
        self.fallback = Some(fallback);
        self
    }

    pub fn with_policy(mut self, policy: StorePolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn schedule(&self) -> &ScheduleConfig {
        &self.schedule
    }

    pub fn slots(&self) -> Result<Vec<TimeSlot>> {
        self.schedule.slots()
    }

    pub async fn classes(&self) -> Vec<ClassDefinition> {
        self.catalog.read().await.clone()
    }

    /// Refreshes the class catalog: primary store, then fallback, then the
    /// configured defaults. Returns the catalog now in effect.
    pub async fn load_catalog(&self) -> Vec<ClassDefinition> {
        let loaded = match self.read_primary(|| self.primary.list_classes()).await {
            Ok(classes) if !classes.is_empty() => Some(classes),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Primary store could not list classes: {}", e);
                match &self.fallback {
                    Some(fallback) => self
                        .guarded(fallback.list_classes())
                        .await
                        .ok()
                        .filter(|c| !c.is_empty()),
                    None => None,
                }
            }
        };

        let classes = loaded.unwrap_or_else(|| self.schedule.classes.clone());
        tracing::info!("Class catalog loaded with {} classes", classes.len());
        *self.catalog.write().await = classes.clone();
        classes
    }

    pub fn check_access_now(
        &self,
        reservation: &Reservation,
        now: DateTime<Utc>,
    ) -> Result<AccessDecision> {
        check_access_now(reservation, now, self.schedule.grace_minutes)
    }

    pub async fn book(&self, request: BookingRequest) -> Result<Booking> {
        let mut attempt = Attempt::new(&request.subject_id);
        attempt.advance(BookingState::Validating);

        match self.run(&mut attempt, request).await {
            Ok(booking) => {
                attempt.advance(BookingState::Committed);
                tracing::info!(
                    subject = %booking.reservation.subject_id,
                    "booking committed: {} ({:?} store)",
                    booking.reservation.id,
                    booking.stored_in
                );
                Ok(booking)
            }
            Err(e) => {
                attempt.stop(&e);
                Err(e)
            }
        }
    }

    async fn run(&self, attempt: &mut Attempt, request: BookingRequest) -> Result<Booking> {
        let subject_id =
            require_input("subject id", Some(request.subject_id.as_str()))?.to_string();
        let class_id = require_input("class", request.class_id.as_deref())?.to_string();
        access_codec::validate_field("subject_id", &subject_id)?;
        access_codec::validate_field("class_id", &class_id)?;

        let class = self
            .catalog
            .read()
            .await
            .iter()
            .find(|c| c.id == class_id)
            .cloned()
            .ok_or_else(|| BookingError::UnknownClass {
                class_id: class_id.clone(),
            })?;

        let (start, end) = self.candidate_interval(&request, &class)?;

        let lock = self.locks.handle(&subject_id, request.date);
        let _guard = lock.lock().await;

        let existing = self.load_existing(&subject_id, request.date).await?;
        let intervals: Vec<_> = existing.iter().map(Reservation::interval).collect();
        if let Some(index) = first_overlap(start, end, &intervals) {
            let clash = &existing[index];
            return Err(BookingError::OverlappingReservation {
                detail: format!(
                    "{} ({} {} - {})",
                    clash.id,
                    clash.class_id,
                    clash.start_instant.with_timezone(&self.timezone).format("%H:%M"),
                    clash.end_instant.with_timezone(&self.timezone).format("%H:%M")
                ),
            });
        }

        attempt.advance(BookingState::Persisting);
        let candidate = NewReservation {
            subject_id,
            class_id,
            start_instant: start,
            end_instant: end,
        };
        let (reservation, stored_in) = self.persist(candidate).await?;
        let token = encode_reservation(&reservation)?;

        Ok(Booking {
            reservation,
            token,
            stored_in,
        })
    }

    fn candidate_interval(
        &self,
        request: &BookingRequest,
        class: &ClassDefinition,
    ) -> Result<(DateTime<Utc>, DateTime<Utc>)> {
        let schedule = &self.schedule;
        if !is_on_grid(
            request.start,
            schedule.day_start(),
            schedule.day_end(),
            schedule.slot_minutes,
        ) {
            return Err(BookingError::InvalidSlot {
                start: request.start.to_string(),
            });
        }

        let local = request
            .start
            .to_naive_time()
            .map(|time| request.date.and_time(time))
            .and_then(|naive| self.timezone.from_local_datetime(&naive).earliest())
            .ok_or_else(|| BookingError::InvalidSlot {
                start: format!("{} {}", request.date, request.start),
            })?;
        let start = local.with_timezone(&Utc);

        let duration = request
            .duration_minutes
            .unwrap_or(i64::from(class.duration_minutes));
        let end = compute_end(start, duration)?;
        Ok((start, end))
    }

    async fn load_existing(&self, subject_id: &str, date: NaiveDate) -> Result<Vec<Reservation>> {
        let primary_err = match self
            .read_primary(|| self.primary.list_reservations(subject_id, date))
            .await
        {
            Ok(existing) => return Ok(self.merge_fallback(existing, subject_id, date).await),
            Err(e) => e,
        };

        let Some(fallback) = &self.fallback else {
            return Err(BookingError::StoreUnavailable {
                message: primary_err.to_string(),
            });
        };

        tracing::warn!(
            "Primary store '{}' unavailable ({}), reading from fallback '{}'",
            self.primary.name(),
            primary_err,
            fallback.name()
        );
        self.guarded(fallback.list_reservations(subject_id, date))
            .await
            .map_err(|e| BookingError::StoreUnavailable {
                message: format!("primary: {}; fallback: {}", primary_err, e),
            })
    }

    /// Reservations committed to the fallback during an outage stay visible
    /// to the overlap check after the primary recovers. A failing fallback
    /// read does not block the booking.
    async fn merge_fallback(
        &self,
        mut existing: Vec<Reservation>,
        subject_id: &str,
        date: NaiveDate,
    ) -> Vec<Reservation> {
        let Some(fallback) = &self.fallback else {
            return existing;
        };
        match self.guarded(fallback.list_reservations(subject_id, date)).await {
            Ok(extra) => {
                for reservation in extra {
                    if !existing.iter().any(|r| r.id == reservation.id) {
                        existing.push(reservation);
                    }
                }
            }
            Err(e) => tracing::warn!(
                "Fallback store '{}' could not be read ({}), checking primary only",
                fallback.name(),
                e
            ),
        }
        existing
    }

    async fn persist(&self, candidate: NewReservation) -> Result<(Reservation, StoreTier)> {
        // writes are not retried: a timed-out create may still have landed
        let primary_err = match self
            .guarded(self.primary.create_reservation(candidate.clone()))
            .await
        {
            Ok(reservation) => return Ok((reservation, StoreTier::Primary)),
            Err(StoreError::Conflict(detail)) => {
                return Err(BookingError::OverlappingReservation { detail })
            }
            Err(e) => e,
        };

        let Some(fallback) = &self.fallback else {
            return Err(BookingError::PersistenceUnavailable {
                message: primary_err.to_string(),
            });
        };

        tracing::warn!(
            "Primary store '{}' rejected write ({}), persisting to fallback '{}'",
            self.primary.name(),
            primary_err,
            fallback.name()
        );
        match self.guarded(fallback.create_reservation(candidate)).await {
            Ok(reservation) => Ok((reservation, StoreTier::Fallback)),
            Err(StoreError::Conflict(detail)) => {
                Err(BookingError::OverlappingReservation { detail })
            }
            Err(e) => Err(BookingError::PersistenceUnavailable {
                message: format!("primary: {}; fallback: {}", primary_err, e),
            }),
        }
    }

    /// Applies the store timeout; an elapsed timer counts as `Unavailable`.
    async fn guarded<T>(&self, call: impl Future<Output = StoreResult<T>>) -> StoreResult<T> {
        match tokio::time::timeout(self.policy.timeout, call).await {
            Ok(result) => result,
            Err(_) => Err(StoreError::Unavailable(format!(
                "timed out after {:?}",
                self.policy.timeout
            ))),
        }
    }

    /// Primary-store read with bounded retry on `Unavailable`.
    async fn read_primary<T, F, Fut>(&self, call: F) -> StoreResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = StoreResult<T>>,
    {
        let mut attempt = 0;
        loop {
            match self.guarded(call()).await {
                Err(StoreError::Unavailable(reason)) if attempt < self.policy.retry_attempts => {
                    attempt += 1;
                    tracing::debug!(
                        "Primary store read failed ({}), retry {}/{}",
                        reason,
                        attempt,
                        self.policy.retry_attempts
                    );
                    tokio::time::sleep(self.policy.retry_delay).await;
                }
                result => return result,
            }
        }
    }
}
