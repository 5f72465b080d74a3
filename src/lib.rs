/// Event Koi - campus event listing with admin moderation
///
/// Organizers submit events, admins moderate them, users browse, register
/// and favorite events, and admins handle reports, warnings and bans. Every
/// admin action is recorded in an append-only audit log.

pub mod account;
pub mod admin;
pub mod api;
pub mod auth;
pub mod config;
pub mod context;
pub mod db;
pub mod error;
pub mod events;
pub mod jobs;
pub mod metrics;
pub mod rate_limit;
pub mod server;

pub use context::AppContext;
pub use error::{KoiError, KoiResult};
