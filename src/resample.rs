//! Anti-aliased downsampling: a windowed-sinc FIR low-pass filter followed
//! by integer decimation.

use crate::dsp::{hamming_window, sinc};
use crate::error::{AfpError, Result};

/// Design a linear-phase FIR low-pass filter with the given cutoff (Hz),
/// sample rate and tap count, using the windowed-sinc method with a Hamming
/// window. The filter is normalized to unity DC gain.
fn design_lowpass_fir(cutoff_hz: f32, fs: u32, order: usize) -> Vec<f32> {
    let order = order.max(1);
    let fc = cutoff_hz / fs as f32;
    let window = hamming_window(order);
    let center = (order - 1) as f32 / 2.0;

    let mut taps: Vec<f32> = (0..order)
        .map(|n| {
            let x = n as f32 - center;
            2.0 * fc * sinc(2.0 * fc * x) * window[n]
        })
        .collect();

    let gain: f32 = taps.iter().sum();
    if gain.abs() > 1e-9 {
        for t in &mut taps {
            *t /= gain;
        }
    }
    taps
}

/// Causal FIR convolution: `y[n] = sum_k taps[k] * x[n-k]`, treating
/// out-of-range `x` as zero. The input is zero-padded at the tail up to at
/// least `taps.len()` samples, per the resampler's edge-case contract.
fn convolve(samples: &[f32], taps: &[f32]) -> Vec<f32> {
    let padded_len = samples.len().max(taps.len());
    let mut padded = samples.to_vec();
    padded.resize(padded_len, 0.0);

    let mut output = vec![0.0f32; padded_len];
    for n in 0..padded_len {
        let mut acc = 0.0f32;
        for (k, &tap) in taps.iter().enumerate() {
            if k <= n {
                acc += tap * padded[n - k];
            }
        }
        output[n] = acc;
    }
    output
}

/// Resample `samples` from `fs` Hz down to `target_rate` Hz.
///
/// `target_rate` must be at most `fs / 2`. The decimation factor is
/// `D = round(fs / target_rate)`; the effective output rate is `fs / D`,
/// which may differ slightly from `target_rate` for non-integer ratios.
pub fn resample(samples: &[f32], fs: u32, target_rate: u32, fir_order: usize) -> Result<Vec<f32>> {
    if samples.is_empty() {
        return Err(AfpError::InvalidInput("waveform is empty".to_string()));
    }
    if samples.iter().any(|s| !s.is_finite()) {
        return Err(AfpError::InvalidInput(
            "waveform contains NaN or infinite samples".to_string(),
        ));
    }
    if fs == 0 || target_rate == 0 {
        return Err(AfpError::InvalidInput(
            "sample rates must be nonzero".to_string(),
        ));
    }
    if (fs as f64) < 2.0 * target_rate as f64 {
        return Err(AfpError::InvalidInput(format!(
            "source rate {} Hz is below twice the target rate {} Hz",
            fs, target_rate
        )));
    }

    let decimation = (fs as f64 / target_rate as f64).round().max(1.0) as usize;

    let taps = design_lowpass_fir(0.5 * target_rate as f32, fs, fir_order);
    let filtered = convolve(samples, &taps);

    let decimated: Vec<f32> = filtered.iter().step_by(decimation).copied().collect();

    let group_delay_skip = ((fir_order.saturating_sub(1)) / (2 * decimation)).min(decimated.len());
    Ok(decimated[group_delay_skip..].to_vec())
}

/// Effective output rate for a given source rate, target rate and
/// decimation factor, rounded the same way `resample` rounds it.
pub fn effective_rate(fs: u32, target_rate: u32) -> u32 {
    let decimation = (fs as f64 / target_rate as f64).round().max(1.0) as u32;
    fs / decimation
}
