//! Data layer module
//!
//! Handles all data persistence and caching:
//! - SQLite database operations
//! - Dashboard result cache (memory or Redis)

mod cache;
mod database;
mod models;

pub use cache::{
    CacheError, CacheResult, CacheStore, MemoryCache, RedisCache, get_json, set_json,
};
pub use database::Database;
pub use models::*;
