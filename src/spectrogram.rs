//! Short-time Fourier transform: partition a waveform into overlapping
//! Hamming-windowed frames and keep the lower half of each frame's real FFT.

use chfft::RFft1D;

use crate::dsp::{hamming_window, Magnitudes};
use crate::error::{AfpError, Result};

/// Axis metadata returned alongside the magnitude matrix.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Axes {
    /// Seconds per frame (`hop / fs`).
    pub dt: f32,
    /// Hz per bin (`fs / window_len`).
    pub df: f32,
}

/// Compute the magnitude spectrogram of `samples` at sample rate `fs`.
///
/// Frames of `window_len` samples are taken at stride `hop` (50% overlap
/// with the default `hop = window_len / 2`); the final partial frame is
/// zero-padded. Each frame is Hamming-windowed before the real FFT.
pub fn stft(samples: &[f32], fs: u32, window_len: usize, hop: usize) -> Result<(Magnitudes, Axes)> {
    if window_len == 0 || hop == 0 {
        return Err(AfpError::InvalidInput(
            "window_len and hop must be nonzero".to_string(),
        ));
    }
    if samples.len() < window_len {
        return Err(AfpError::TooShort(format!(
            "{} samples is less than one window of {} samples",
            samples.len(),
            window_len
        )));
    }

    let num_frames = (samples.len() - window_len) / hop + 1;
    let num_bins = window_len / 2 + 1;

    let window = hamming_window(window_len);
    let mut fft = RFft1D::<f32>::new(window_len);
    let mut frame_buf = vec![0.0f32; window_len];

    let mut magnitudes = Magnitudes::zeros(num_frames, num_bins);

    for frame_idx in 0..num_frames {
        let start = frame_idx * hop;
        let end = (start + window_len).min(samples.len());

        for (i, slot) in frame_buf.iter_mut().enumerate() {
            let sample = if start + i < end { samples[start + i] } else { 0.0 };
            *slot = sample * window[i];
        }

        let spectrum = fft.forward(&frame_buf);
        debug_assert_eq!(spectrum.len(), num_bins);

        let row = magnitudes.frame_mut(frame_idx);
        for (bin, value) in spectrum.iter().enumerate() {
            row[bin] = value.norm();
        }
    }

    let axes = Axes {
        dt: hop as f32 / fs as f32,
        df: fs as f32 / window_len as f32,
    };

    Ok((magnitudes, axes))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn tone(freq: f32, fs: u32, n: usize) -> Vec<f32> {
        (0..n)
            .map(|i| (2.0 * PI * freq * i as f32 / fs as f32).sin())
            .collect()
    }

    #[test]
    fn rejects_too_short_input() {
        let samples = vec![0.0; 10];
        assert!(stft(&samples, 11025, 1024, 512).is_err());
    }

    #[test]
    fn shape_matches_formula() {
        let samples = vec![0.0f32; 4096];
        let (m, _axes) = stft(&samples, 11025, 1024, 512).unwrap();
        let expected_frames = (samples.len() - 1024) / 512 + 1;
        assert_eq!(m.frames(), expected_frames);
        assert_eq!(m.bins(), 1024 / 2 + 1);
    }

    #[test]
    fn axes_have_expected_units() {
        let samples = vec![0.0f32; 2048];
        let (_m, axes) = stft(&samples, 11025, 1024, 512).unwrap();
        assert!((axes.dt - 512.0 / 11025.0).abs() < 1e-6);
        assert!((axes.df - 11025.0 / 1024.0).abs() < 1e-3);
    }

    #[test]
    fn magnitudes_are_non_negative() {
        let samples = tone(1000.0, 11025, 4096);
        let (m, _) = stft(&samples, 11025, 1024, 512).unwrap();
        for f in 0..m.frames() {
            for b in 0..m.bins() {
                assert!(m.get(f, b) >= 0.0);
            }
        }
    }

    #[test]
    fn tone_energy_concentrates_near_expected_bin() {
        let fs = 11025;
        let freq = 1000.0;
        let samples = tone(freq, fs, 4096);
        let (m, axes) = stft(&samples, fs, 1024, 512).unwrap();

        let expected_bin = (freq / axes.df).round() as usize;
        let mid_frame = m.frames() / 2;
        let row = m.frame(mid_frame);

        let (peak_bin, _) = row
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap())
            .unwrap();

        assert!((peak_bin as i64 - expected_bin as i64).abs() <= 2);
    }
}
