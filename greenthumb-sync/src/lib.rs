//! `GreenThumb` sync: calendar task REST client, local task cache, and a
//! reconnecting push channel that keeps the cache current.

pub mod api;
pub mod cache;
pub mod channel;
pub mod client;
pub mod config;
pub mod notify;
