pub mod access;
pub mod auth;
pub mod config;
pub mod error;
pub mod images;
pub mod lane_manager;
pub mod storage;
pub mod timeline;
pub mod users;
