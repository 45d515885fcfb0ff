use crate::config::Config;

/// Buffers incoming audio and releases a window once `min_audio_duration`
/// seconds have accumulated at the device's native rate, capped at
/// `max_audio_duration`.
pub struct AudioProcessor {
    sample_buffer: Vec<f32>,
    native_rate: Option<u32>,
    config: Config,
}

impl AudioProcessor {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        Self {
            sample_buffer: Vec::new(),
            native_rate: None,
            config,
        }
    }

    /// Feed a batch of mono samples captured at `sample_rate`. Returns
    /// `Some((buffer, sample_rate))` once enough audio has accumulated for
    /// an identification attempt, and resets the buffer for the next one.
    pub fn process_samples(&mut self, samples: &[f32], sample_rate: u32) -> Option<(Vec<f32>, u32)> {
        self.native_rate = Some(sample_rate);
        self.sample_buffer.extend_from_slice(samples);

        let min_samples = (self.config.min_audio_duration * sample_rate as f32) as usize;
        let max_samples = (self.config.max_audio_duration * sample_rate as f32) as usize;

        if self.sample_buffer.len() >= min_samples {
            let take = self.sample_buffer.len().min(max_samples.max(min_samples));
            let window: Vec<f32> = self.sample_buffer.drain(..take).collect();
            if !self.config.quiet_mode {
                eprintln!(
                    "accumulated {:.2}s of audio at {} Hz, attempting identification",
                    window.len() as f32 / sample_rate as f32,
                    sample_rate
                );
            }
            return Some((window, sample_rate));
        }

        None
    }

    pub fn reset(&mut self) {
        self.sample_buffer.clear();
    }

    /// Progress toward the minimum window, 0.0 to 1.0, at the last known
    /// sample rate.
    pub fn progress(&self) -> f32 {
        let Some(rate) = self.native_rate else {
            return 0.0;
        };
        let min_samples = (self.config.min_audio_duration * rate as f32) as usize;
        if min_samples == 0 {
            return 1.0;
        }
        (self.sample_buffer.len() as f32 / min_samples as f32).min(1.0)
    }
}

impl Default for AudioProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_until_min_duration_then_resets() {
        let config = Config::default().with_min_audio_duration(1.0).with_max_audio_duration(2.0);
        let mut processor = AudioProcessor::with_config(config);

        let half_second = vec![0.0f32; 22050];
        assert!(processor.process_samples(&half_second, 44100).is_none());
        let result = processor.process_samples(&half_second, 44100);
        assert!(result.is_some());
        let (window, rate) = result.unwrap();
        assert_eq!(rate, 44100);
        assert!(window.len() >= 44100);
    }

    #[test]
    fn progress_reports_fraction_of_minimum_window() {
        let config = Config::default().with_min_audio_duration(2.0);
        let mut processor = AudioProcessor::with_config(config);
        processor.process_samples(&vec![0.0f32; 22050], 44100);
        assert!((processor.progress() - 0.25).abs() < 0.01);
    }
}
