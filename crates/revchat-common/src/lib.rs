pub mod errors;
pub mod id;

pub use errors::{ConfigError, RevchatError};
pub use id::new_id;

pub type Result<T> = std::result::Result<T, RevchatError>;
