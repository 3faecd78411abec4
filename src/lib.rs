pub mod common;
pub mod config;
pub mod download;
pub mod error;
pub mod extract;
pub mod ratelimit;
pub mod report;
pub mod sources;
