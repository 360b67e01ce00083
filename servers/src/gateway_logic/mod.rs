pub mod config;
pub mod downstream;
pub mod feed;
pub mod logger;
