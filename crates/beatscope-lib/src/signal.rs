use crate::error::FormatError;
use serde::{Deserialize, Serialize};

/// Sampling rates accepted from the recording device (Hz).
pub const SUPPORTED_SAMPLE_RATES: [u32; 2] = [5_000, 10_000];

/// Decoded single-channel recording.
///
/// Only constructible through [`WaveformData::new`] (or deserialization, which
/// goes through the same checks), so `length` and `duration` always agree with
/// `data_points` and the rate is one of [`SUPPORTED_SAMPLE_RATES`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawWaveform")]
pub struct WaveformData {
    sampling_rate: u32,
    duration: f64,
    data_points: Vec<f64>,
    length: usize,
}

#[derive(Deserialize)]
struct RawWaveform {
    sampling_rate: u32,
    #[serde(default)]
    data_points: Vec<f64>,
}

impl TryFrom<RawWaveform> for WaveformData {
    type Error = FormatError;

    fn try_from(raw: RawWaveform) -> Result<Self, Self::Error> {
        WaveformData::new(raw.sampling_rate, raw.data_points)
    }
}

impl WaveformData {
    pub fn new(sampling_rate: u32, data_points: Vec<f64>) -> Result<Self, FormatError> {
        if !SUPPORTED_SAMPLE_RATES.contains(&sampling_rate) {
            return Err(FormatError::SampleRate {
                rate: sampling_rate,
            });
        }
        let length = data_points.len();
        Ok(Self {
            sampling_rate,
            duration: length as f64 / sampling_rate as f64,
            data_points,
            length,
        })
    }

    pub fn sampling_rate(&self) -> u32 {
        self.sampling_rate
    }
    /// Sampling rate as a float, for time conversions.
    pub fn fs(&self) -> f64 {
        self.sampling_rate as f64
    }
    /// Recording length in seconds.
    pub fn duration(&self) -> f64 {
        self.duration
    }
    pub fn data_points(&self) -> &[f64] {
        &self.data_points
    }
    pub fn len(&self) -> usize {
        self.length
    }
    pub fn is_empty(&self) -> bool {
        self.length == 0
    }
}

/// Smoothed samples; always the same length as the waveform they came from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilteredData {
    pub sampling_rate: u32,
    pub data_points: Vec<f64>,
}

impl FilteredData {
    pub fn fs(&self) -> f64 {
        self.sampling_rate as f64
    }
    pub fn len(&self) -> usize {
        self.data_points.len()
    }
    pub fn is_empty(&self) -> bool {
        self.data_points.is_empty()
    }
}

/// Accepted R-peak sample indices, strictly increasing.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PeakSet {
    pub indices: Vec<usize>,
}

impl PeakSet {
    pub fn from_indices(indices: Vec<usize>) -> Self {
        Self { indices }
    }
    pub fn len(&self) -> usize {
        self.indices.len()
    }
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }
    pub fn as_slice(&self) -> &[usize] {
        &self.indices
    }
    /// True when indices strictly increase and all fall inside a buffer of `len` samples.
    pub fn is_well_formed(&self, len: usize) -> bool {
        self.indices.windows(2).all(|w| w[0] < w[1])
            && self.indices.last().map_or(true, |&last| last < len)
    }
}

/// RR intervals (seconds)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RRSeries {
    pub rr: Vec<f64>,
}

impl RRSeries {
    pub fn from_peaks(peaks: &PeakSet, fs: f64) -> Self {
        let rr = peaks
            .indices
            .windows(2)
            .map(|w| (w[1] as f64 - w[0] as f64) / fs)
            .collect();
        Self { rr }
    }

    pub fn mean(&self) -> f64 {
        if self.rr.is_empty() {
            return 0.0;
        }
        self.rr.iter().sum::<f64>() / self.rr.len() as f64
    }

    /// Population standard deviation around [`RRSeries::mean`].
    pub fn std_dev(&self) -> f64 {
        if self.rr.is_empty() {
            return 0.0;
        }
        let mean = self.mean();
        let variance =
            self.rr.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / self.rr.len() as f64;
        variance.sqrt()
    }
}

/// P, Q, S and T landmark indices, each sorted and deduplicated.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LandmarkSet {
    #[serde(rename = "p_waves")]
    pub p: Vec<usize>,
    #[serde(rename = "q_waves")]
    pub q: Vec<usize>,
    #[serde(rename = "s_waves")]
    pub s: Vec<usize>,
    #[serde(rename = "t_waves")]
    pub t: Vec<usize>,
}

/// One irregular RR interval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anomaly {
    pub start_time: f64,
    pub end_time: f64,
    /// Severity in `[0, 1]`.
    #[serde(alias = "anomaly_score")]
    pub score: f64,
}

/// Terminal output of the detection stages.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionResult {
    pub peaks: PeakSet,
    #[serde(flatten)]
    pub landmarks: LandmarkSet,
    pub anomalies: Vec<Anomaly>,
}
