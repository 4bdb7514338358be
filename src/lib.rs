pub mod config;
pub mod error;
pub mod history;
pub mod replicate;
pub mod routes;
