pub mod analytics;
pub mod api;
pub mod config;
pub mod cursor;
pub mod models;
pub mod redirect;
pub mod slug;
pub mod storage;
