pub mod alert;
pub mod capture;
pub mod case;
pub mod error;
pub mod llm_config;
pub mod release;
pub mod transaction;
