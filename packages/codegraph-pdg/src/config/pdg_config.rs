//! Dependence-graph construction settings

use super::error::{ConfigError, ConfigResult};
use super::preset::Preset;
use super::validation::Validatable;
use serde::{Deserialize, Serialize};

/// PDG engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PdgConfig {
    /// Preset the remaining fields were derived from
    pub preset: Preset,

    /// Analyze each driver wave on the rayon pool (default: true)
    pub parallel: bool,

    /// Worker threads for parallel waves (0 = 75% of cores)
    pub worker_threads: usize,

    /// Block visits allowed per procedure before giving up (1..=10_000_000)
    pub max_fixpoint_iterations: usize,

    /// Stop a procedure on the first broken invariant, including duplicate
    /// edge emission (default: on in debug builds)
    pub strict_invariants: bool,

    /// Reuse a dominating block's PC at reconvergence points (default: true)
    pub post_dominance_restoration: bool,

    /// Give primitive-typed parameters summary formal nodes (default: false)
    pub primitive_formals: bool,

    /// Stop scheduling after this many procedures (0 = unlimited)
    pub max_procedures: usize,
}

impl PdgConfig {
    /// Validate configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.max_fixpoint_iterations == 0 || self.max_fixpoint_iterations > 10_000_000 {
            return Err(ConfigError::range_with_hint(
                "max_fixpoint_iterations",
                self.max_fixpoint_iterations,
                1,
                10_000_000,
                "Each procedure needs at least one block visit",
            ));
        }
        if self.worker_threads > 1024 {
            return Err(ConfigError::range_with_hint(
                "worker_threads",
                self.worker_threads,
                0,
                1024,
                "Use 0 to size the pool from the core count",
            ));
        }
        Ok(())
    }

    /// Builder: Set parallel
    pub fn parallel(mut self, v: bool) -> Self {
        self.parallel = v;
        self
    }

    /// Builder: Set worker_threads
    pub fn worker_threads(mut self, v: usize) -> Self {
        self.worker_threads = v;
        self
    }

    /// Builder: Set max_fixpoint_iterations
    pub fn max_fixpoint_iterations(mut self, v: usize) -> Self {
        self.max_fixpoint_iterations = v;
        self
    }

    /// Builder: Set strict_invariants
    pub fn strict_invariants(mut self, v: bool) -> Self {
        self.strict_invariants = v;
        self
    }

    /// Builder: Set post_dominance_restoration
    pub fn post_dominance_restoration(mut self, v: bool) -> Self {
        self.post_dominance_restoration = v;
        self
    }

    /// Builder: Set primitive_formals
    pub fn primitive_formals(mut self, v: bool) -> Self {
        self.primitive_formals = v;
        self
    }

    /// Builder: Set max_procedures
    pub fn max_procedures(mut self, v: usize) -> Self {
        self.max_procedures = v;
        self
    }

    /// Create from preset
    pub fn from_preset(preset: Preset) -> Self {
        match preset {
            Preset::Fast => Self {
                preset,
                parallel: true,
                worker_threads: 0,
                max_fixpoint_iterations: 10_000,
                strict_invariants: false,
                post_dominance_restoration: true,
                primitive_formals: false,
                max_procedures: 0,
            },
            Preset::Balanced | Preset::Custom => Self {
                preset,
                parallel: true,
                worker_threads: 0,
                max_fixpoint_iterations: 100_000,
                strict_invariants: cfg!(debug_assertions),
                post_dominance_restoration: true,
                primitive_formals: false,
                max_procedures: 0,
            },
            Preset::Thorough => Self {
                preset,
                parallel: true,
                worker_threads: 0,
                max_fixpoint_iterations: 1_000_000,
                strict_invariants: true,
                post_dominance_restoration: true,
                primitive_formals: true,
                max_procedures: 0,
            },
        }
    }

    /// Parse YAML; a `preset` key selects the base, other keys override it
    pub fn from_yaml_str(yaml: &str) -> ConfigResult<Self> {
        let value: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        let preset = match value.get("preset").and_then(|p| p.as_str()) {
            Some(name) => Preset::from_str(name)?,
            None => Preset::Balanced,
        };

        let mut merged = serde_yaml::to_value(Self::from_preset(preset))?;
        if let (serde_yaml::Value::Mapping(base), serde_yaml::Value::Mapping(overrides)) =
            (&mut merged, value)
        {
            for (key, v) in overrides {
                base.insert(key, v);
            }
        }
        let config: Self = serde_yaml::from_value(merged)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_yaml_file(path: impl AsRef<std::path::Path>) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path)?;
        Self::from_yaml_str(&text)
    }

    /// Effective pool size
    pub fn effective_threads(&self) -> usize {
        if self.worker_threads > 0 {
            self.worker_threads
        } else {
            (num_cpus::get() * 3 / 4).max(1)
        }
    }
}

impl Default for PdgConfig {
    fn default() -> Self {
        Self::from_preset(Preset::Balanced)
    }
}

impl Validatable for PdgConfig {
    fn validate(&self) -> ConfigResult<()> {
        PdgConfig::validate(self)
    }

    fn config_name(&self) -> &'static str {
        "PdgConfig"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_presets_validate() {
        for preset in [Preset::Fast, Preset::Balanced, Preset::Thorough, Preset::Custom] {
            assert!(PdgConfig::from_preset(preset).validate().is_ok());
        }
        assert!(PdgConfig::from_preset(Preset::Thorough).primitive_formals);
    }

    #[test]
    fn test_range_rejected() {
        let err = PdgConfig::default().max_fixpoint_iterations(0).validate().unwrap_err();
        assert!(matches!(err, ConfigError::Range { .. }));
    }

    #[test]
    fn test_yaml_overrides_preset() {
        let config = PdgConfig::from_yaml_str("preset: fast\nprimitive_formals: true\nparallel: false\n").unwrap();
        assert_eq!(config.preset, Preset::Fast);
        assert_eq!(config.max_fixpoint_iterations, 10_000);
        assert!(config.primitive_formals);
        assert!(!config.parallel);
    }

    #[test]
    fn test_yaml_errors() {
        assert!(matches!(
            PdgConfig::from_yaml_str("preset: turbo\n"),
            Err(ConfigError::UnknownPreset(_))
        ));
        assert!(matches!(
            PdgConfig::from_yaml_str("max_fixpoint_iterations: 0\n"),
            Err(ConfigError::Range { .. })
        ));
    }

    #[test]
    fn test_effective_threads() {
        assert_eq!(PdgConfig::default().worker_threads(3).effective_threads(), 3);
        assert!(PdgConfig::default().effective_threads() >= 1);
    }
}
