use crate::signal::{FilteredData, PeakSet, WaveformData};
use log::debug;
use serde::{Deserialize, Serialize};

/// Tunable parameters for smoothing, R-peak, landmark and rhythm detection.
///
/// Defaults are the values the analysis is calibrated for; a config file only
/// needs to name the fields it changes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Moving-average length in samples.
    pub smoothing_window: usize,
    /// Fraction of the way from the mean to the maximum where the peak threshold sits.
    pub threshold_ratio: f64,
    /// Minimum distance between accepted R-peaks (seconds).
    pub refractory_s: f64,
    /// Q/S search reach on either side of an R-peak (seconds).
    pub qs_window_s: f64,
    /// P search reach before Q (seconds).
    pub p_window_s: f64,
    /// T search reach after S (seconds).
    pub t_window_s: f64,
    /// RR deviation, in standard deviations, beyond which an interval is flagged.
    pub anomaly_sigma: f64,
    /// Deviation, in standard deviations, at which the anomaly score saturates.
    pub score_sigma: f64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            smoothing_window: 5,
            threshold_ratio: 0.7,
            refractory_s: 0.4,
            qs_window_s: 0.05,
            p_window_s: 0.2,
            t_window_s: 0.4,
            anomaly_sigma: 2.0,
            score_sigma: 3.0,
        }
    }
}

/// Convert a span in seconds to a whole number of samples, rounding down.
pub(crate) fn seconds_to_samples(seconds: f64, fs: f64) -> usize {
    // 0.05 * 5000.0 lands a hair above 250; absorb representation error either way.
    (seconds * fs + 1e-9).floor().max(0.0) as usize
}

/// Smooth a waveform with the default moving-average window.
pub fn smooth(waveform: &WaveformData) -> FilteredData {
    smooth_with_config(waveform, &DetectorConfig::default())
}

/// Smooth a waveform with a trailing simple moving average.
///
/// Signals no longer than the window pass through untouched. Otherwise the
/// first `window - 1` positions repeat the first full-window average so the
/// output keeps the input length.
pub fn smooth_with_config(waveform: &WaveformData, cfg: &DetectorConfig) -> FilteredData {
    FilteredData {
        sampling_rate: waveform.sampling_rate(),
        data_points: moving_average(waveform.data_points(), cfg.smoothing_window),
    }
}

fn moving_average(data: &[f64], win: usize) -> Vec<f64> {
    if win <= 1 || data.len() <= win {
        return data.to_vec();
    }
    let averages: Vec<f64> = data
        .windows(win)
        .map(|w| w.iter().sum::<f64>() / win as f64)
        .collect();
    let mut out = Vec::with_capacity(data.len());
    out.resize(win - 1, averages[0]);
    out.extend(averages);
    out
}

/// Detect R-peaks with the default threshold and refractory period.
pub fn detect_r_peaks(filtered: &FilteredData) -> PeakSet {
    detect_r_peaks_with_config(filtered, &DetectorConfig::default())
}

/// Detect R-peaks as strict local maxima above an adaptive threshold.
///
/// The threshold is `mean + threshold_ratio * (max - mean)` over the whole
/// buffer. Candidates are taken left to right and a candidate closer than the
/// refractory distance to the last accepted peak is dropped, even when it is
/// taller.
pub fn detect_r_peaks_with_config(filtered: &FilteredData, cfg: &DetectorConfig) -> PeakSet {
    let data = &filtered.data_points;
    if data.len() < 3 {
        return PeakSet::default();
    }

    let mean = data.iter().sum::<f64>() / data.len() as f64;
    let max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let threshold = mean + cfg.threshold_ratio * (max - mean);
    let refractory = (cfg.refractory_s * filtered.fs()).round().max(0.0) as usize;

    let mut peaks: Vec<usize> = Vec::new();
    for i in 1..data.len() - 1 {
        let y = data[i];
        if y <= threshold || y <= data[i - 1] || y <= data[i + 1] {
            continue;
        }
        match peaks.last() {
            Some(&last) if i - last < refractory => {}
            _ => peaks.push(i),
        }
    }

    debug!(
        "peak threshold {:.3} (mean {:.3}, max {:.3}), refractory {} samples: {} peaks",
        threshold,
        mean,
        max,
        refractory,
        peaks.len()
    );
    PeakSet::from_indices(peaks)
}
