pub mod batchload_toml;
pub mod config;
pub mod credentials;
pub mod logger;
pub mod memory;

pub use batchload_toml::{
    BatchloadToml, apply_file_to_config, load_batchload_toml, parse_batchload_toml,
};
pub use config::*;
pub use credentials::{ConnectParams, collect_connect_params, get_db_path, get_passphrase};
pub use logger::setup_logging;
pub use memory::{MemoryProbe, memory_delta_kb};
