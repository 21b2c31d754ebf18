// File: ./src/client/mod.rs
pub mod calendar;
pub mod core;
pub mod middleware;

pub use crate::client::calendar::{CalendarClient, ConnectionStatus, EventSyncResult, SyncAction};
pub use crate::client::core::RemoteStore;
