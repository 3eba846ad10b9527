// Library exports for Yatube
// The binary and the integration tests both build on these modules

pub mod access;
pub mod auth;
pub mod cache;
pub mod config;
pub mod db;
pub mod error;
pub mod extractors;
pub mod feed;
pub mod forms;
pub mod mail;
pub mod media;
pub mod paginator;
pub mod routes;
pub mod state;
