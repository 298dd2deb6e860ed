// Adapters layer: concrete reservation stores behind the `ReservationStore` port.

pub mod http_store;
pub mod local_store;

pub use http_store::HttpReservationStore;
pub use local_store::LocalReservationStore;
