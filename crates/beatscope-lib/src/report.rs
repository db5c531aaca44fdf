use crate::pipeline::AnalysisOutcome;
use crate::signal::Anomaly;
use serde::{Deserialize, Serialize};

/// Anomaly as presented to a reader, with a severity message.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnomalyReport {
    pub start_time: f64,
    pub end_time: f64,
    pub anomaly_score: f64,
    pub message: String,
}

impl From<&Anomaly> for AnomalyReport {
    fn from(anomaly: &Anomaly) -> Self {
        Self {
            start_time: anomaly.start_time,
            end_time: anomaly.end_time,
            anomaly_score: anomaly.score,
            message: severity_message(anomaly.score),
        }
    }
}

/// Response body for a successful analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalysisReport {
    pub success: bool,
    pub sampling_rate: u32,
    pub duration: f64,
    /// Filtered samples.
    pub data_points: Vec<f64>,
    pub peaks: Vec<usize>,
    pub p_waves: Vec<usize>,
    pub q_waves: Vec<usize>,
    pub s_waves: Vec<usize>,
    pub t_waves: Vec<usize>,
    pub anomalies: Vec<AnomalyReport>,
    pub processing_time_ms: u64,
}

impl AnalysisReport {
    pub fn from_outcome(outcome: AnalysisOutcome, processing_time_ms: u64) -> Self {
        let detection = outcome.detection;
        Self {
            success: true,
            sampling_rate: outcome.sampling_rate,
            duration: outcome.duration,
            data_points: outcome.filtered.data_points,
            peaks: detection.peaks.indices,
            p_waves: detection.landmarks.p,
            q_waves: detection.landmarks.q,
            s_waves: detection.landmarks.s,
            t_waves: detection.landmarks.t,
            anomalies: detection.anomalies.iter().map(AnomalyReport::from).collect(),
            processing_time_ms,
        }
    }
}

/// Response body for a failed analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorReport {
    pub success: bool,
    pub error: String,
}

impl ErrorReport {
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            success: false,
            error: error.into(),
        }
    }
}

/// Human-readable band for an anomaly score.
pub fn severity_message(score: f64) -> String {
    if (0.8..=1.0).contains(&score) {
        format!(
            "This segment is irregular with {}% probability.",
            (score * 100.0).floor() as u32
        )
    } else if (0.5..0.8).contains(&score) {
        "Irregular pattern observed.".to_string()
    } else {
        "Minor fluctuation detected.".to_string()
    }
}
