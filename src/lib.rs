pub mod app;
pub mod collision;
pub mod config;
pub mod constants;
pub mod error;
pub mod maps;
pub mod protocol;
pub mod pursuit;
pub mod registry;
pub mod relay;
pub mod session;
pub mod store;
pub mod types;
