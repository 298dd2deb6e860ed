pub mod adapters;
pub mod config;
pub mod core;
pub mod domain;
pub mod utils;

#[cfg(feature = "cli")]
pub use config::cli::Cli;

pub use adapters::{HttpReservationStore, LocalReservationStore};
pub use config::{ScheduleConfig, StorePolicy, TomlConfig};
pub use core::access_codec::AccessReader;
pub use core::service::{check_access_now, BookingRequest, BookingState, ReservationService};
pub use utils::error::{BookingError, Result};
