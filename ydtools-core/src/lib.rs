pub mod daemon_config;
pub mod error;
pub mod paths;
pub mod settings;
pub mod store;
pub mod value_set;

pub use daemon_config::DaemonConfig;
pub use error::ConfigError;
pub use settings::AppSettings;
pub use store::{ConfigFormat, ConfigStore, Value};
pub use value_set::{Shape, ValueSet};
