use std::sync::Arc;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};

use crate::{
    backend::{GenerationRequest, LanguageModel},
    error::{MedsafeError, Result},
    models::{AnalysisInteraction, AnalysisResult, DosageStatus, Medication},
    prompts::{analysis_prompt, analysis_schema},
};

/// Structured prescription analysis: one schema-constrained request per call.
#[derive(Clone)]
pub struct PrescriptionAnalyzer {
    model: Arc<dyn LanguageModel>,
}

impl PrescriptionAnalyzer {
    pub fn new(model: Arc<dyn LanguageModel>) -> Self {
        Self { model }
    }

    /// Analyze raw prescription text.
    ///
    /// Every remote or parse failure collapses into
    /// [`MedsafeError::AnalysisFailed`]; the cause is only logged.
    pub async fn analyze(&self, prescription: &str) -> Result<AnalysisResult> {
        if prescription.trim().is_empty() {
            return Err(MedsafeError::InvalidInput(
                "Please enter prescription text to analyze.".to_string(),
            ));
        }

        info!(
            model = self.model.name(),
            input_len = prescription.len(),
            "Starting prescription analysis"
        );

        let request =
            GenerationRequest::prompt(analysis_prompt(prescription)).with_schema(analysis_schema());

        let generation = self.model.generate(request).await.map_err(|e| {
            error!(error = %e, "Error analyzing prescription text");
            MedsafeError::AnalysisFailed
        })?;

        let result: AnalysisResult =
            serde_json::from_str(generation.text.trim()).map_err(|e| {
                error!(error = %e, "Analysis response did not match the declared schema");
                MedsafeError::AnalysisFailed
            })?;

        info!(
            medications = result.medications.len(),
            interactions = result.interactions.len(),
            "Prescription analysis completed"
        );

        Ok(result)
    }
}

/// A medication whose dosage verdict is in the closed status set.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct VerifiedMedication {
    #[serde(flatten)]
    pub medication: Medication,
    pub status: DosageStatus,
}

/// A medication whose verdict could not be trusted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FlaggedMedication {
    #[serde(flatten)]
    pub medication: Medication,
    pub reason: String,
}

/// An [`AnalysisResult`] split into what a renderer may show as a verdict
/// and what it must flag.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisReport {
    pub summary: String,
    pub interactions: Vec<AnalysisInteraction>,
    pub medications: Vec<VerifiedMedication>,
    pub flagged: Vec<FlaggedMedication>,
}

impl AnalysisReport {
    pub fn from_result(result: AnalysisResult) -> Self {
        let mut medications = Vec::new();
        let mut flagged = Vec::new();

        for medication in result.medications {
            match medication.dosage_status() {
                Some(status) => medications.push(VerifiedMedication { medication, status }),
                None => {
                    let reason = unverified_reason(&medication);
                    warn!(medication = %medication.name, reason = %reason, "Dosage verdict not trusted");
                    flagged.push(FlaggedMedication { medication, reason });
                }
            }
        }

        Self {
            summary: result.summary,
            interactions: result.interactions,
            medications,
            flagged,
        }
    }

    pub fn is_fully_verified(&self) -> bool {
        self.flagged.is_empty()
    }
}

fn unverified_reason(medication: &Medication) -> String {
    match medication.dosage_analysis.as_ref().map(|analysis| &analysis.status) {
        None => "Missing dosage analysis".to_string(),
        Some(Value::Null) => "Missing dosage status".to_string(),
        Some(Value::String(status)) => format!(
            "Unrecognized dosage status '{status}'; expected Correct, Warning or Incorrect"
        ),
        Some(other) => format!("Dosage status is not text: {other}"),
    }
}
