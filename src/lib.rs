pub mod candle_utils;
pub mod commands;
pub mod config;
pub mod error;
pub mod features;
pub mod http_client;
pub mod market_data;
pub mod models;
pub mod persistence;
pub mod pipeline;
pub mod report;
pub mod trainer;
