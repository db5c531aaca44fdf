use crate::{
    bridge::{merge, ExternalAnalyzer, LocalOutputs},
    config::PipelineConfig,
    detectors::{
        ecg::{detect_r_peaks_with_config, smooth_with_config, DetectorConfig},
        landmarks::detect_landmarks_with_config,
    },
    error::AnalysisError,
    io::wav::parse_wav,
    metrics::rhythm::score_anomalies_with_config,
    signal::{DetectionResult, FilteredData, WaveformData},
};
use log::{debug, info, warn};
use std::io::{Cursor, Read, Seek};

/// Everything one analysis produces.
#[derive(Debug, Clone, PartialEq)]
pub struct AnalysisOutcome {
    pub sampling_rate: u32,
    pub duration: f64,
    pub length: usize,
    pub filtered: FilteredData,
    pub detection: DetectionResult,
    /// Fields taken from the external analyzer; empty when local results were used.
    pub bridged_fields: Vec<&'static str>,
}

/// Parse → smooth → detect peaks → score rhythm, with an optional external
/// analyzer whose output is merged over the local result field by field.
pub struct AnalysisPipeline {
    detector: DetectorConfig,
    bridge_enabled: bool,
    analyzer: Option<Box<dyn ExternalAnalyzer>>,
}

impl AnalysisPipeline {
    pub fn new(config: &PipelineConfig) -> Self {
        Self {
            detector: config.detector,
            bridge_enabled: config.bridge.enabled,
            analyzer: None,
        }
    }

    /// Attach the analyzer consulted when the bridge is enabled.
    pub fn with_analyzer(mut self, analyzer: Box<dyn ExternalAnalyzer>) -> Self {
        self.analyzer = Some(analyzer);
        self
    }

    pub fn detector(&self) -> &DetectorConfig {
        &self.detector
    }

    pub fn analyze_bytes(&self, bytes: &[u8]) -> Result<AnalysisOutcome, AnalysisError> {
        self.analyze_reader(&mut Cursor::new(bytes))
    }

    pub fn analyze_reader<R: Read + Seek>(
        &self,
        source: &mut R,
    ) -> Result<AnalysisOutcome, AnalysisError> {
        let waveform = parse_wav(source)?;
        self.analyze(&waveform)
    }

    pub fn analyze(&self, waveform: &WaveformData) -> Result<AnalysisOutcome, AnalysisError> {
        let local = self.run_local(waveform)?;
        let (outputs, bridged_fields) = self.apply_bridge(waveform, local);
        let landmarks =
            detect_landmarks_with_config(&outputs.filtered, &outputs.peaks, &self.detector);
        debug!(
            "landmarks: {} P, {} Q, {} S, {} T",
            landmarks.p.len(),
            landmarks.q.len(),
            landmarks.s.len(),
            landmarks.t.len()
        );

        Ok(AnalysisOutcome {
            sampling_rate: waveform.sampling_rate(),
            duration: waveform.duration(),
            length: waveform.len(),
            filtered: outputs.filtered,
            detection: DetectionResult {
                peaks: outputs.peaks,
                landmarks,
                anomalies: outputs.anomalies,
            },
            bridged_fields,
        })
    }

    /// Filter, peak detection and anomaly scoring without the external analyzer.
    /// Recordings carrying NaN or infinite samples are rejected.
    pub fn run_local(&self, waveform: &WaveformData) -> Result<LocalOutputs, AnalysisError> {
        if let Some(idx) = waveform.data_points().iter().position(|v| !v.is_finite()) {
            return Err(AnalysisError::InvalidSignal(format!(
                "sample {} is not a finite number",
                idx
            )));
        }
        let filtered = smooth_with_config(waveform, &self.detector);
        let peaks = detect_r_peaks_with_config(&filtered, &self.detector);
        let anomalies = score_anomalies_with_config(&filtered, &peaks, &self.detector);
        debug!(
            "local pipeline: {} samples, {} peaks, {} anomalies",
            filtered.len(),
            peaks.len(),
            anomalies.len()
        );
        Ok(LocalOutputs {
            filtered,
            peaks,
            anomalies,
        })
    }

    // Any bridge failure leaves the local outputs untouched.
    fn apply_bridge(
        &self,
        waveform: &WaveformData,
        local: LocalOutputs,
    ) -> (LocalOutputs, Vec<&'static str>) {
        if !self.bridge_enabled {
            return (local, Vec::new());
        }
        let Some(analyzer) = self.analyzer.as_ref() else {
            warn!("external analyzer enabled but none configured; using local results");
            return (local, Vec::new());
        };
        match analyzer
            .analyze(waveform)
            .and_then(|out| out.validate(waveform))
        {
            Ok(bridged) => {
                let fields = bridged.overridden_fields();
                info!("external analyzer overrides: {:?}", fields);
                (merge(local, bridged), fields)
            }
            Err(err) => {
                warn!("external analyzer fallback: {}", err);
                (local, Vec::new())
            }
        }
    }
}

impl Default for AnalysisPipeline {
    fn default() -> Self {
        Self::new(&PipelineConfig::default())
    }
}
