pub mod catalog;
pub mod compare;
pub mod config;
pub mod filter;
pub mod generator;
pub mod logging;
pub mod pivot;
pub mod report;
pub mod sample;
pub mod session;
pub mod stats;
pub mod stream;
pub mod sweep;
