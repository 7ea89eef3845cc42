use chrono::Utc;
use serde::Serialize;
use uuid::Uuid;

use crate::error::{PersistenceWarning, RiskError, RiskResult};
use crate::models::{AssessmentRecord, RiskAssessment, RiskLevel, StudentObservation};
use crate::recommend;
use crate::store::{ModelRepository, TrainedModel};

/// Run one observation through a trained pair.
pub fn score(model: &TrainedModel, observation: &StudentObservation) -> RiskResult<RiskAssessment> {
    model.check_consistency().map_err(RiskError::Inference)?;
    let scaled = model.scaler.transform(&observation.features())?;
    let (class, probabilities) = model.forest.predict(&scaled)?;

    let risk_level = RiskLevel::from_index(class)
        .ok_or_else(|| RiskError::Inference(format!("classifier returned unknown class {class}")))?;
    let confidence = probabilities[class];
    if !(0.0..=1.0).contains(&confidence) {
        return Err(RiskError::Inference(format!(
            "class probability {confidence} outside 0..=1"
        )));
    }

    Ok(RiskAssessment {
        risk_level,
        risk_score: (confidence * 100.0).round() as u8,
    })
}

/// Response body handed back to the request layer.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PredictionResponse {
    pub risk_level: RiskLevel,
    pub risk_score: u8,
    pub recommendations: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct AssessmentOutcome {
    pub name: String,
    pub observation: StudentObservation,
    pub assessment: RiskAssessment,
    pub recommendations: Vec<String>,
    /// Set when the model in use could not be saved.
    pub warning: Option<PersistenceWarning>,
}

impl AssessmentOutcome {
    pub fn response(&self) -> PredictionResponse {
        PredictionResponse {
            risk_level: self.assessment.risk_level,
            risk_score: self.assessment.risk_score,
            recommendations: self.recommendations.clone(),
        }
    }

    /// Values for the caller's record log.
    pub fn to_record(&self) -> AssessmentRecord {
        AssessmentRecord {
            id: Uuid::new_v4(),
            name: self.name.clone(),
            observation: self.observation,
            risk_level: self.assessment.risk_level,
            risk_score: self.assessment.risk_score,
            recommendations: self.recommendations.clone(),
            recorded_at: Utc::now(),
        }
    }
}

pub struct RiskPredictor<R> {
    repository: R,
}

impl<R: ModelRepository> RiskPredictor<R> {
    pub fn new(repository: R) -> Self {
        Self { repository }
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    /// Validation runs before the model store is touched.
    pub fn predict(&self, observation: &StudentObservation) -> RiskResult<RiskAssessment> {
        self.predict_with_warning(observation).map(|(assessment, _)| assessment)
    }

    /// Full request: tier, confidence and recommendations for a named student.
    pub fn assess(&self, name: &str, observation: StudentObservation) -> RiskResult<AssessmentOutcome> {
        let name = name.trim();
        if name.is_empty() {
            return Err(RiskError::Validation {
                field: "name",
                value: String::new(),
                expected: "a non-empty student name",
            });
        }
        let (assessment, warning) = self.predict_with_warning(&observation)?;
        Ok(AssessmentOutcome {
            name: name.to_string(),
            observation,
            recommendations: recommend::recommend(&observation, assessment.risk_level),
            assessment,
            warning,
        })
    }

    fn predict_with_warning(
        &self,
        observation: &StudentObservation,
    ) -> RiskResult<(RiskAssessment, Option<PersistenceWarning>)> {
        observation.validate()?;
        let handle = self.repository.get_or_create()?;
        let assessment = score(&handle.model, observation)?;
        Ok((assessment, handle.warning))
    }
}
