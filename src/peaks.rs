//! Sparse feature-point extraction: logarithmic non-maximum suppression
//! followed by a percentile threshold.

use crate::dsp::{histogram_percentile, Magnitudes};

/// The larger neighborhood used for the percentile threshold is this many
/// times wider (per axis) than the NMS neighborhood.
const PERCENTILE_WINDOW_MULTIPLIER: usize = 3;

/// An extracted feature point: integer `(frame, bin)` coordinates. Its
/// amplitude is discarded once the two-stage selection is done.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Peak {
    pub frame: usize,
    pub bin: usize,
}

/// Frequency-axis NMS half-width for bin `f`: grows logarithmically.
fn freq_half_width(bin: usize, alpha: f32) -> usize {
    let w = (alpha * (1.0 + bin as f32).ln()).floor();
    (w as usize).max(1)
}

/// Tie-break priority key: earlier time, then higher frequency, wins.
fn priority_key(frame: usize, bin: usize) -> (usize, isize) {
    (frame, -(bin as isize))
}

fn is_local_max(m: &Magnitudes, t: usize, f: usize, time_half: usize, freq_half: usize) -> bool {
    let value = m.get(t, f);
    let t_start = t.saturating_sub(time_half);
    let t_end = (t + time_half + 1).min(m.frames());
    let f_start = f.saturating_sub(freq_half);
    let f_end = (f + freq_half + 1).min(m.bins());

    let current_key = priority_key(t, f);

    for nt in t_start..t_end {
        for nf in f_start..f_end {
            if nt == t && nf == f {
                continue;
            }
            let neighbor = m.get(nt, nf);
            if neighbor > value {
                return false;
            }
            if neighbor == value && priority_key(nt, nf) < current_key {
                return false;
            }
        }
    }
    true
}

fn neighborhood_values(m: &Magnitudes, t: usize, f: usize, time_half: usize, freq_half: usize) -> Vec<f32> {
    let t_start = t.saturating_sub(time_half);
    let t_end = (t + time_half + 1).min(m.frames());
    let f_start = f.saturating_sub(freq_half);
    let f_end = (f + freq_half + 1).min(m.bins());

    let mut values = Vec::with_capacity((t_end - t_start) * (f_end - f_start));
    for nt in t_start..t_end {
        for nf in f_start..f_end {
            values.push(m.get(nt, nf));
        }
    }
    values
}

/// Extract peaks from a magnitude matrix.
///
/// `nms_alpha` controls how fast the frequency-axis NMS half-width grows
/// with frequency; `nms_time_half` is the fixed time-axis half-width;
/// `percentile` (0..=100) is the threshold a surviving candidate's
/// magnitude must strictly exceed, measured over a wider neighborhood.
///
/// The result is sorted by `(frame, bin)` ascending.
pub fn find_peaks(m: &Magnitudes, nms_alpha: f32, nms_time_half: usize, percentile: u8) -> Vec<Peak> {
    let mut candidates = Vec::new();

    for t in 0..m.frames() {
        for f in 0..m.bins() {
            let freq_half = freq_half_width(f, nms_alpha);
            if is_local_max(m, t, f, nms_time_half, freq_half) {
                candidates.push(Peak { frame: t, bin: f });
            }
        }
    }

    let wide_time_half = nms_time_half * PERCENTILE_WINDOW_MULTIPLIER;

    let mut peaks: Vec<Peak> = candidates
        .into_iter()
        .filter(|peak| {
            let wide_freq_half = freq_half_width(peak.bin, nms_alpha) * PERCENTILE_WINDOW_MULTIPLIER;
            let neighborhood = neighborhood_values(m, peak.frame, peak.bin, wide_time_half, wide_freq_half);
            let threshold = histogram_percentile(&neighborhood, percentile);
            m.get(peak.frame, peak.bin) > threshold
        })
        .collect();

    peaks.sort();
    peaks
}
