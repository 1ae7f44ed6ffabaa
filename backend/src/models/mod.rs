//! Domain types shared by the stores, the statistics engine and the HTTP layer.

pub mod flight;
pub mod ingest;
pub mod time;

pub use flight::{snapshot_key, DailySnapshot, FlightKey, FlightRecord, FlightStatus, FlightType};
pub use ingest::{normalize_batch, parse_timestamp, RawFlight};
pub use time::{Clock, FixedClock, SharedClock, SystemClock};
