pub mod access_codec;
pub mod conflict;
pub mod service;
pub mod time_window;

pub use crate::domain::model::{
    AccessDecision, AccessToken, AccessWindow, Booking, ClassDefinition, NewReservation,
    Reservation, StoreTier, TimeSlot, TokenFields,
};
pub use crate::domain::ports::{ReservationStore, StoreError, StoreResult};
pub use crate::utils::error::Result;
