pub mod accounts;
pub mod backend;
pub mod config;
pub mod error;
pub mod models;
pub mod performance;
pub mod strategies;
#[cfg(test)]
pub mod test_helpers;
