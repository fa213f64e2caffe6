pub mod api;
pub mod config;
pub mod db;
pub mod detector;
pub mod error;
pub mod fetcher;
pub mod jobs;
pub mod notify;
pub mod parser;
pub mod sink;
pub mod types;
