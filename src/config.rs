use std::path::PathBuf;

pub const DEFAULT_SEED: u64 = 42;
pub const DEFAULT_SAMPLES: usize = 1000;
pub const DEFAULT_TREES: usize = 100;
pub const DEFAULT_MIN_TIER_SAMPLES: usize = 250;
pub const DEFAULT_MODEL_DIR: &str = "model";

/// Parameters of one training run. Two runs with equal configs produce
/// parameter-identical models.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingConfig {
    pub seed: u64,
    pub samples: usize,
    pub trees: usize,
    /// Minimum samples per risk tier; 0 disables tier coverage draws.
    pub min_tier_samples: usize,
    pub max_depth: Option<usize>,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            seed: DEFAULT_SEED,
            samples: DEFAULT_SAMPLES,
            trees: DEFAULT_TREES,
            min_tier_samples: DEFAULT_MIN_TIER_SAMPLES,
            max_depth: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub model_dir: PathBuf,
    pub training: TrainingConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            model_dir: PathBuf::from(DEFAULT_MODEL_DIR),
            training: TrainingConfig::default(),
        }
    }
}
