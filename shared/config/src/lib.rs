mod config;
mod load;

pub use config::*;
pub use load::{get, init, load_time, ConfigError};

#[cfg(feature = "testing")]
pub use load::init_for_testing;
