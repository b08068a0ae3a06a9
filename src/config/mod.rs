//! Configuration management
//!
//! Node settings (addresses, data directory, proof-of-work parameters and
//! peers), read from an optional TOML file with environment overrides.

pub mod settings;

pub use settings::Settings;
