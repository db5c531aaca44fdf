use crate::detectors::ecg::{seconds_to_samples, DetectorConfig};
use crate::signal::{FilteredData, LandmarkSet, PeakSet};
use std::ops::Range;

/// Landmarks found around a single R-peak.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BeatLandmarks {
    pub r: usize,
    pub p: Option<usize>,
    pub q: Option<usize>,
    pub s: Option<usize>,
    pub t: Option<usize>,
}

/// Locate landmarks for every peak with the default search windows.
pub fn detect_landmarks(filtered: &FilteredData, peaks: &PeakSet) -> LandmarkSet {
    detect_landmarks_with_config(filtered, peaks, &DetectorConfig::default())
}

/// Locate P/Q/S/T landmarks for every peak and collect them per wave type,
/// sorted and deduplicated (neighbouring beats may share a search window).
pub fn detect_landmarks_with_config(
    filtered: &FilteredData,
    peaks: &PeakSet,
    cfg: &DetectorConfig,
) -> LandmarkSet {
    let mut set = LandmarkSet::default();
    for &r in peaks.as_slice() {
        let beat = beat_landmarks(filtered, r, cfg);
        set.p.extend(beat.p);
        set.q.extend(beat.q);
        set.s.extend(beat.s);
        set.t.extend(beat.t);
    }
    for wave in [&mut set.p, &mut set.q, &mut set.s, &mut set.t] {
        wave.sort_unstable();
        wave.dedup();
    }
    set
}

/// Search the windows around one R-peak.
///
/// Window conventions, in samples, all clipped to the buffer:
/// - Q: minimum in `[r - qs, r)`
/// - S: minimum in `(r, r + qs]`
/// - P: maximum in `[q - p, q)`, only when Q was found
/// - T: maximum in `(s, s + t]`, only when S was found
pub fn beat_landmarks(filtered: &FilteredData, r: usize, cfg: &DetectorConfig) -> BeatLandmarks {
    let data = &filtered.data_points;
    let fs = filtered.fs();
    let qs = seconds_to_samples(cfg.qs_window_s, fs);
    let p_reach = seconds_to_samples(cfg.p_window_s, fs);
    let t_reach = seconds_to_samples(cfg.t_window_s, fs);

    let q = argmin(data, before(r, qs));
    let s = argmin(data, after(r, qs, data.len()));
    let p = q.and_then(|q| argmax(data, before(q, p_reach)));
    let t = s.and_then(|s| argmax(data, after(s, t_reach, data.len())));

    BeatLandmarks { r, p, q, s, t }
}

/// Half-open `[anchor - reach, anchor)`.
fn before(anchor: usize, reach: usize) -> Range<usize> {
    anchor.saturating_sub(reach)..anchor
}

/// `(anchor, anchor + reach]` as a half-open range, clipped to `len`.
fn after(anchor: usize, reach: usize, len: usize) -> Range<usize> {
    let end = anchor.saturating_add(reach).saturating_add(1).min(len);
    anchor.saturating_add(1)..end
}

// Ties go to the leftmost index.
fn argmin(data: &[f64], window: Range<usize>) -> Option<usize> {
    extreme(data, window, |candidate, best| candidate < best)
}

fn argmax(data: &[f64], window: Range<usize>) -> Option<usize> {
    extreme(data, window, |candidate, best| candidate > best)
}

fn extreme(data: &[f64], window: Range<usize>, better: impl Fn(f64, f64) -> bool) -> Option<usize> {
    let end = window.end.min(data.len());
    if window.start >= end {
        return None;
    }
    let mut best = window.start;
    for i in window.start + 1..end {
        if better(data[i], data[best]) {
            best = i;
        }
    }
    Some(best)
}
