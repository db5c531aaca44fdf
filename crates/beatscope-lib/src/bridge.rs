//! Contract for an optional external analyzer whose output may replace parts
//! of the locally computed result.

use crate::error::BridgeError;
use crate::signal::{Anomaly, FilteredData, PeakSet, WaveformData};
use serde::{Deserialize, Serialize};

/// Something that can independently analyze a waveform, typically out of process.
pub trait ExternalAnalyzer: Send + Sync {
    fn analyze(&self, waveform: &WaveformData) -> Result<BridgeOutput, BridgeError>;
}

/// Response of an external analyzer. Every field is optional; absent fields
/// leave the local result as it is.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filtered_data: Option<FilteredData>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub peaks: Option<PeakSet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub anomalies: Option<Vec<Anomaly>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl BridgeOutput {
    /// Names of the fields this response overrides.
    pub fn overridden_fields(&self) -> Vec<&'static str> {
        let mut fields = Vec::new();
        if self.filtered_data.is_some() {
            fields.push("filtered_data");
        }
        if self.peaks.is_some() {
            fields.push("peaks");
        }
        if self.anomalies.is_some() {
            fields.push("anomalies");
        }
        fields
    }

    /// Reject responses that report an error or do not fit the request.
    ///
    /// Filtered data must match the waveform's length and rate, peaks must be
    /// strictly increasing and inside the buffer, anomaly scores must lie in
    /// `[0, 1]` with ordered, finite bounds.
    pub fn validate(self, waveform: &WaveformData) -> Result<Self, BridgeError> {
        if let Some(message) = &self.error {
            return Err(BridgeError::Reported(message.clone()));
        }
        if let Some(filtered) = &self.filtered_data {
            if filtered.len() != waveform.len() {
                return Err(BridgeError::Invalid(format!(
                    "filtered_data has {} samples, expected {}",
                    filtered.len(),
                    waveform.len()
                )));
            }
            if filtered.sampling_rate != waveform.sampling_rate() {
                return Err(BridgeError::Invalid(format!(
                    "filtered_data sampling rate {}Hz does not match {}Hz",
                    filtered.sampling_rate,
                    waveform.sampling_rate()
                )));
            }
            if filtered.data_points.iter().any(|v| !v.is_finite()) {
                return Err(BridgeError::Invalid(
                    "filtered_data contains non-finite samples".into(),
                ));
            }
        }
        if let Some(peaks) = &self.peaks {
            if !peaks.is_well_formed(waveform.len()) {
                return Err(BridgeError::Invalid(
                    "peaks must be strictly increasing indices inside the recording".into(),
                ));
            }
        }
        if let Some(anomalies) = &self.anomalies {
            let bad = anomalies.iter().any(|a| {
                !(0.0..=1.0).contains(&a.score)
                    || !a.start_time.is_finite()
                    || !a.end_time.is_finite()
                    || a.start_time > a.end_time
            });
            if bad {
                return Err(BridgeError::Invalid(
                    "anomalies must have ordered bounds and scores in [0, 1]".into(),
                ));
            }
        }
        Ok(self)
    }
}

/// The three overridable outputs of the local pipeline.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalOutputs {
    pub filtered: FilteredData,
    pub peaks: PeakSet,
    pub anomalies: Vec<Anomaly>,
}

/// Per-field merge: each field present in `bridged` replaces the local one.
pub fn merge(local: LocalOutputs, bridged: BridgeOutput) -> LocalOutputs {
    LocalOutputs {
        filtered: bridged.filtered_data.unwrap_or(local.filtered),
        peaks: bridged.peaks.unwrap_or(local.peaks),
        anomalies: bridged.anomalies.unwrap_or(local.anomalies),
    }
}
