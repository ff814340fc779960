pub mod bootstrap;
#[path = "config/mod.rs"]
pub mod config_mod;
pub use config_mod as config;
pub mod csv;
pub mod documents;
pub mod llm_clients;
pub mod playwright;
pub mod releases;
pub mod response;
pub mod security;
pub mod storage;
pub mod templates;
