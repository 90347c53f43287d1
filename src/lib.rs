//! HN mail gateway library.
//!
//! Polls the Hacker News search API, rebuilds the discussions behind recent
//! activity, and hands every item not yet delivered to a local mail
//! delivery agent as an email.

pub mod api;
pub mod config;
pub mod constants;
pub mod db;
pub mod error;
pub mod item;
pub mod mda;
pub mod message;
pub mod sync;
