//! Analysis configuration
//!
//! Two levels, as in the rest of the pipeline:
//! - Preset: one-liner defaults (`PdgConfig::from_preset(Preset::Fast)`)
//! - Builder / YAML: override individual fields
//!
//! ```rust,ignore
//! use codegraph_pdg::config::{PdgConfig, Preset};
//!
//! let config = PdgConfig::from_preset(Preset::Thorough).parallel(false);
//! let config = PdgConfig::from_yaml_str("preset: fast\nprimitive_formals: true\n")?;
//! ```

pub mod error;
pub mod pdg_config;
pub mod preset;
pub mod validation;

pub use error::{ConfigError, ConfigResult};
pub use pdg_config::PdgConfig;
pub use preset::Preset;
pub use validation::Validatable;
