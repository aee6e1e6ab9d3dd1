//! Portal Server
//!
//! Moderation and access-control core for the community portal forum:
//! post lifecycle, category ordering, user sanctions and a tamper-evident
//! moderation log.

pub mod api;
pub mod audit;
pub mod auth;
pub mod config;
pub mod db;
pub mod moderation;
pub mod permissions;
pub mod store;
