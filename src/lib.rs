//! Mention tally
//!
//! Counts how often members of a guild are mentioned in a fixed set of chat
//! channels and keeps the running totals in a spreadsheet, one row per
//! (display name, handle) pair and one count column per monitored channel.
//!
//! ```text
//! gateway message ──► RealtimeDispatcher ─┐
//!                                         ├─► MentionEngine ──► SheetReconciler ──► TabularStore
//! control button ──► HistoricalWalker ────┘   (extract + aggregate)   (read, match/append, write)
//! ```
//!
//! The chat side is reached through [`pipeline::gateway::ChatGateway`] and the
//! spreadsheet through [`sheets::TabularStore`]; the serenity and Google Sheets
//! implementations live in [`discord`] and [`sheets::client`].

pub mod bootstrap;
pub mod config;
pub mod discord;
pub mod error;
pub mod keepalive;
pub mod pipeline;
pub mod sheets;
pub mod throttle;

pub use config::{AppConfig, RuntimeConfig, TallyConfig};
pub use error::TallyError;
