pub mod config;
pub mod humanize;
pub mod logs;
pub mod server;
