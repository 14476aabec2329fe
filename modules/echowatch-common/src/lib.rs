pub mod config;
pub mod error;
pub mod text;
pub mod types;
pub mod week;

pub use config::Config;
pub use error::FetchError;
pub use types::*;
