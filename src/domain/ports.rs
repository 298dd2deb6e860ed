use crate::domain::model::{ClassDefinition, NewReservation, Reservation};
use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

/// Failures a reservation store may report.
///
/// `Conflict` is a definite rejection and is never retried or routed to a
/// fallback store; `Unavailable` covers transport errors, timeouts and
/// unexpected responses.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("store rejected the reservation: {0}")]
    Conflict(String),

    #[error("store unavailable: {0}")]
    Unavailable(String),
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[async_trait]
pub trait ReservationStore: Send + Sync {
    /// Short label used in logs.
    fn name(&self) -> &str;

    async fn list_classes(&self) -> StoreResult<Vec<ClassDefinition>>;

    /// Reservations for one subject on one calendar date.
    async fn list_reservations(
        &self,
        subject_id: &str,
        date: NaiveDate,
    ) -> StoreResult<Vec<Reservation>>;

    async fn create_reservation(&self, candidate: NewReservation) -> StoreResult<Reservation>;
}
