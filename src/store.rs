//! Trained model lifecycle.
//!
//! The forest and its scaler form one versioned pair: both artifacts carry
//! the `run_id` of the training run that produced them and are only accepted
//! together. Anything missing, unreadable or mismatched means "no model" and
//! triggers a fresh training run that replaces both files.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::{Settings, TrainingConfig};
use crate::error::{PersistenceWarning, RiskError, RiskResult};
use crate::forest::{ForestParams, RandomForest};
use crate::models::{RiskLevel, FEATURE_NAMES};
use crate::scaler::StandardScaler;
use crate::synth::{self, SeededRandom};

pub const FOREST_ARTIFACT: &str = "risk_forest.json";
pub const SCALER_ARTIFACT: &str = "risk_scaler.json";

#[derive(Debug, Clone, PartialEq)]
pub struct TrainedModel {
    pub run_id: Uuid,
    pub scaler: StandardScaler,
    pub forest: RandomForest,
}

impl TrainedModel {
    /// Synthesize data, fit the scaler, then fit the forest on scaled rows.
    pub fn train(config: &TrainingConfig) -> RiskResult<Self> {
        let started = Instant::now();
        let samples = synth::training_set(config)?;
        let rows: Vec<Vec<f64>> = samples.iter().map(|s| s.features.to_vec()).collect();
        let labels: Vec<usize> = samples.iter().map(|s| s.label.index()).collect();

        let scaler = StandardScaler::fit(&FEATURE_NAMES, &rows)?;
        let scaled = rows
            .iter()
            .map(|row| scaler.transform(row))
            .collect::<RiskResult<Vec<_>>>()
            .map_err(|e| RiskError::ModelUnavailable(e.to_string()))?;

        let params = ForestParams {
            trees: config.trees,
            max_depth: config.max_depth,
        };
        let mut rng = SeededRandom::new(config.seed);
        let forest = RandomForest::fit(
            &FEATURE_NAMES,
            &scaled,
            &labels,
            RiskLevel::ALL.len(),
            &params,
            &mut rng,
        )?;

        let model = Self {
            run_id: Uuid::new_v4(),
            scaler,
            forest,
        };
        info!(
            run_id = %model.run_id,
            samples = samples.len(),
            trees = config.trees,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "trained dropout risk model"
        );
        Ok(model)
    }

    /// Feature order and count must agree between scaler and forest.
    pub fn check_consistency(&self) -> Result<(), String> {
        let expected: Vec<&str> = FEATURE_NAMES.to_vec();
        if self.scaler.feature_names != expected {
            return Err(format!(
                "scaler features {:?} differ from {:?}",
                self.scaler.feature_names, expected
            ));
        }
        if self.forest.feature_names != self.scaler.feature_names {
            return Err(format!(
                "forest features {:?} differ from scaler features {:?}",
                self.forest.feature_names, self.scaler.feature_names
            ));
        }
        if self.scaler.variances.len() != self.scaler.means.len() {
            return Err("scaler means and variances differ in length".to_string());
        }
        if self.forest.n_classes != RiskLevel::ALL.len() {
            return Err(format!(
                "forest has {} classes, expected {}",
                self.forest.n_classes,
                RiskLevel::ALL.len()
            ));
        }
        Ok(())
    }
}

#[derive(Serialize, Deserialize)]
struct ForestArtifact {
    run_id: Uuid,
    forest: RandomForest,
}

#[derive(Serialize, Deserialize)]
struct ScalerArtifact {
    run_id: Uuid,
    scaler: StandardScaler,
}

/// A shared trained pair plus any persistence problem from creating it.
#[derive(Debug, Clone)]
pub struct ModelHandle {
    pub model: Arc<TrainedModel>,
    pub warning: Option<PersistenceWarning>,
}

pub trait ModelRepository: Send + Sync {
    /// Cached pair, else load from storage, else train and persist.
    fn get_or_create(&self) -> RiskResult<ModelHandle>;

    /// Drop the cached pair and go back to storage.
    fn reload(&self) -> RiskResult<ModelHandle>;

    /// Train a new pair and replace the stored one.
    fn retrain(&self) -> RiskResult<ModelHandle>;
}

/// Artifacts in a directory, cached for the life of the repository.
///
/// The whole check/train/persist sequence runs under one lock, so concurrent
/// first callers train once and all observe the same pair.
pub struct FileModelRepository {
    dir: PathBuf,
    config: TrainingConfig,
    state: Mutex<Option<ModelHandle>>,
}

impl FileModelRepository {
    pub fn new(dir: impl Into<PathBuf>, config: TrainingConfig) -> Self {
        Self {
            dir: dir.into(),
            config,
            state: Mutex::new(None),
        }
    }

    pub fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.model_dir.clone(), settings.training.clone())
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn forest_path(&self) -> PathBuf {
        self.dir.join(FOREST_ARTIFACT)
    }

    pub fn scaler_path(&self) -> PathBuf {
        self.dir.join(SCALER_ARTIFACT)
    }

    fn load(&self) -> Result<TrainedModel, String> {
        let forest: ForestArtifact = read_artifact(&self.forest_path())?;
        let scaler: ScalerArtifact = read_artifact(&self.scaler_path())?;
        if forest.run_id != scaler.run_id {
            return Err(format!(
                "artifacts come from different runs ({} vs {})",
                forest.run_id, scaler.run_id
            ));
        }
        let model = TrainedModel {
            run_id: forest.run_id,
            scaler: scaler.scaler,
            forest: forest.forest,
        };
        model.check_consistency()?;
        Ok(model)
    }

    fn persist(&self, model: &TrainedModel) -> Result<(), PersistenceWarning> {
        let warning = |reason: String| PersistenceWarning {
            path: self.dir.clone(),
            reason,
        };
        fs::create_dir_all(&self.dir).map_err(|e| warning(e.to_string()))?;

        let forest = ForestArtifact {
            run_id: model.run_id,
            forest: model.forest.clone(),
        };
        let scaler = ScalerArtifact {
            run_id: model.run_id,
            scaler: model.scaler.clone(),
        };
        let forest_tmp = temp_path(&self.forest_path());
        let scaler_tmp = temp_path(&self.scaler_path());

        // A crash between the renames leaves mismatched run ids, which load rejects.
        let written = write_json(&forest_tmp, &forest)
            .and_then(|()| write_json(&scaler_tmp, &scaler))
            .and_then(|()| rename(&scaler_tmp, &self.scaler_path()))
            .and_then(|()| rename(&forest_tmp, &self.forest_path()));
        if let Err(reason) = written {
            for tmp in [&forest_tmp, &scaler_tmp] {
                if tmp.is_file() {
                    let _ = fs::remove_file(tmp);
                }
            }
            return Err(warning(reason));
        }
        debug!(dir = %self.dir.display(), run_id = %model.run_id, "persisted model artifacts");
        Ok(())
    }

    fn train_and_persist(&self) -> RiskResult<ModelHandle> {
        let model = TrainedModel::train(&self.config)?;
        let warning = match self.persist(&model) {
            Ok(()) => None,
            Err(warning) => {
                warn!(%warning, "continuing with unsaved model");
                Some(warning)
            }
        };
        Ok(ModelHandle {
            model: Arc::new(model),
            warning,
        })
    }

    fn load_or_train(&self) -> RiskResult<ModelHandle> {
        match self.load() {
            Ok(model) => {
                debug!(run_id = %model.run_id, dir = %self.dir.display(), "loaded model artifacts");
                Ok(ModelHandle {
                    model: Arc::new(model),
                    warning: None,
                })
            }
            Err(reason) => {
                info!(dir = %self.dir.display(), %reason, "no usable model artifacts, training");
                self.train_and_persist()
            }
        }
    }
}

impl ModelRepository for FileModelRepository {
    fn get_or_create(&self) -> RiskResult<ModelHandle> {
        let mut state = self.state.lock();
        if let Some(handle) = state.as_ref() {
            return Ok(handle.clone());
        }
        let handle = self.load_or_train()?;
        *state = Some(handle.clone());
        Ok(handle)
    }

    fn reload(&self) -> RiskResult<ModelHandle> {
        let mut state = self.state.lock();
        *state = None;
        let handle = self.load_or_train()?;
        *state = Some(handle.clone());
        Ok(handle)
    }

    fn retrain(&self) -> RiskResult<ModelHandle> {
        let mut state = self.state.lock();
        let handle = self.train_and_persist()?;
        *state = Some(handle.clone());
        Ok(handle)
    }
}

fn read_artifact<T: DeserializeOwned>(path: &Path) -> Result<T, String> {
    let bytes = fs::read(path).map_err(|e| match e.kind() {
        io::ErrorKind::NotFound => format!("{} is missing", path.display()),
        _ => format!("cannot read {}: {e}", path.display()),
    })?;
    serde_json::from_slice(&bytes).map_err(|e| format!("cannot parse {}: {e}", path.display()))
}

fn temp_path(path: &Path) -> PathBuf {
    path.with_extension("json.tmp")
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<(), String> {
    let json = serde_json::to_vec(value).map_err(|e| e.to_string())?;
    fs::write(path, json).map_err(|e| format!("cannot write {}: {e}", path.display()))
}

fn rename(from: &Path, to: &Path) -> Result<(), String> {
    fs::rename(from, to).map_err(|e| format!("cannot move {} into place: {e}", to.display()))
}
