pub mod catalog;
pub mod config;
pub mod credits;
pub mod engine;
pub mod errors;
pub mod judge;
pub mod model;
pub mod providers;
pub mod report;
pub mod storage;
