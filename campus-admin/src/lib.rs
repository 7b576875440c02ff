pub mod config;
pub mod dtos;
pub mod guards;
pub mod models;
pub mod observability;
pub mod services;
pub mod startup;
pub mod storage;

pub use startup::Console;
