// src/lib.rs
//! Client-side synchronization for the TradeLab paper-trading dashboard:
//! session, watchlist, polled quotes, the selected symbol's chart and a
//! debounced symbol search, all kept consistent against the REST backend.
pub mod api;
pub mod auth;
pub mod chart;
pub mod cli;
pub mod config;
pub mod dashboard;
pub mod error;
pub mod health;
pub mod models;
pub mod quotes;
pub mod search;
pub mod session;
pub mod stream;
pub mod watchlist;

#[cfg(test)]
pub(crate) mod testing;

pub use api::{ApiClient, Backend};
pub use config::Config;
pub use dashboard::{Action, Dashboard, Snapshot};
pub use error::{ClientError, Result};
pub use session::{Route, SessionMode, SessionStore};
