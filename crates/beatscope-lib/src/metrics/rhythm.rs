use crate::detectors::ecg::DetectorConfig;
use crate::signal::{Anomaly, FilteredData, PeakSet, RRSeries};

/// Summary of the RR-interval distribution behind an anomaly scan.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RhythmStats {
    pub n: usize,
    pub mean_rr: f64,
    pub std_rr: f64,
}

pub fn rhythm_stats(rr: &RRSeries) -> RhythmStats {
    RhythmStats {
        n: rr.rr.len(),
        mean_rr: rr.mean(),
        std_rr: rr.std_dev(),
    }
}

/// Score irregular RR intervals with the default thresholds.
pub fn score_anomalies(filtered: &FilteredData, peaks: &PeakSet) -> Vec<Anomaly> {
    score_anomalies_with_config(filtered, peaks, &DetectorConfig::default())
}

/// Flag RR intervals that deviate from the mean by more than
/// `anomaly_sigma` standard deviations.
///
/// The score ramps linearly with the deviation and saturates at 1.0 once it
/// reaches `score_sigma` standard deviations. A perfectly regular rhythm
/// (zero spread) never produces anomalies.
pub fn score_anomalies_with_config(
    filtered: &FilteredData,
    peaks: &PeakSet,
    cfg: &DetectorConfig,
) -> Vec<Anomaly> {
    if peaks.len() < 2 {
        return Vec::new();
    }
    let fs = filtered.fs();
    let rr = RRSeries::from_peaks(peaks, fs);
    let stats = rhythm_stats(&rr);
    if stats.std_rr <= 0.0 {
        return Vec::new();
    }

    let indices = peaks.as_slice();
    let last_sample = filtered.len().saturating_sub(1);
    rr.rr
        .iter()
        .enumerate()
        .filter_map(|(idx, &interval)| {
            let deviation = (interval - stats.mean_rr).abs();
            if deviation <= cfg.anomaly_sigma * stats.std_rr {
                return None;
            }
            let start_idx = indices[idx];
            let end_idx = indices.get(idx + 1).copied().unwrap_or(last_sample);
            Some(Anomaly {
                start_time: start_idx as f64 / fs,
                end_time: end_idx as f64 / fs,
                score: (deviation / (cfg.score_sigma * stats.std_rr)).min(1.0),
            })
        })
        .collect()
}
