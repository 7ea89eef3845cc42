//! Dropout risk scoring for students.
//!
//! Synthesizes a labelled training set, trains a random forest with a
//! feature scaler, and turns five academic/behavioural signals into a risk
//! tier, a confidence score and ordered recommendations.

pub mod config;
pub mod counsel;
pub mod error;
pub mod forest;
pub mod models;
pub mod predictor;
pub mod recommend;
pub mod report;
pub mod scaler;
pub mod store;
pub mod synth;

pub use config::{Settings, TrainingConfig};
pub use error::{PersistenceWarning, RiskError, RiskResult};
pub use models::{AssessmentRecord, RiskAssessment, RiskLevel, StudentObservation};
pub use predictor::{AssessmentOutcome, PredictionResponse, RiskPredictor};
pub use store::{FileModelRepository, ModelHandle, ModelRepository, TrainedModel};
