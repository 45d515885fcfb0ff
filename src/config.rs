use serde::{Deserialize, Serialize};

/// Configuration for the recognizer.
///
/// A single explicit record passed to each top-level operation rather than
/// a global configuration module.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Post-decimation sample rate in Hz that every waveform is normalized to.
    pub target_rate: u32,

    /// Anti-alias FIR low-pass filter length, used by the resampler.
    pub fir_order: usize,

    /// STFT window length in samples.
    pub window_len: usize,

    /// STFT hop size in samples.
    pub hop: usize,

    /// Coefficient controlling how fast the NMS frequency half-width grows
    /// with frequency.
    pub nms_alpha: f32,

    /// NMS time-axis half-width, in frames.
    pub nms_time_half: usize,

    /// Percentile threshold (0..100) a surviving NMS candidate must exceed.
    pub percentile: u8,

    /// Maximum number of target peaks paired with a single anchor.
    pub fanout: usize,

    /// Minimum frame offset (inclusive) of the target zone.
    pub dt_min: u32,

    /// Maximum frame offset (inclusive) of the target zone.
    pub dt_max: u32,

    /// Maximum absolute bin distance (inclusive) of the target zone.
    pub df_max: u32,

    /// Minimum number of address matches before a track is considered a
    /// candidate at all.
    pub k_min: usize,

    /// Minimum coherent score required to return a match.
    pub s_min: usize,

    /// Minimum margin the best candidate must have over the runner-up.
    pub margin: usize,

    /// Histogram bucket width, in frames, used for time-offset coherence.
    pub bucket: i64,

    /// Minimum duration of audio to analyze, in seconds.
    pub min_audio_duration: f32,

    /// Maximum duration of audio to analyze, in seconds.
    pub max_audio_duration: f32,

    /// Buffer size used by the streaming audio processor.
    pub buffer_size: usize,

    /// Whether to suppress verbose `eprintln!` diagnostics.
    pub quiet_mode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            target_rate: 11025,
            fir_order: 101,
            window_len: 1024,
            hop: 512,
            nms_alpha: 4.0,
            nms_time_half: 3,
            percentile: 75,
            fanout: 5,
            dt_min: 1,
            dt_max: 32,
            df_max: 64,
            k_min: 5,
            s_min: 5,
            margin: 2,
            bucket: 1,
            min_audio_duration: 3.0,
            max_audio_duration: 12.0,
            buffer_size: 4096,
            quiet_mode: true, // Default to quiet mode for clean output
        }
    }
}

impl Config {
    /// Create a new config with default values
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the post-decimation target sample rate
    pub fn with_target_rate(mut self, target_rate: u32) -> Self {
        self.target_rate = target_rate;
        self
    }

    /// Set the anti-alias FIR filter length
    pub fn with_fir_order(mut self, fir_order: usize) -> Self {
        self.fir_order = fir_order;
        self
    }

    /// Set the STFT window length
    pub fn with_window_len(mut self, window_len: usize) -> Self {
        self.window_len = window_len;
        self
    }

    /// Set the STFT hop size
    pub fn with_hop(mut self, hop: usize) -> Self {
        self.hop = hop;
        self
    }

    /// Set the log-frequency NMS width coefficient
    pub fn with_nms_alpha(mut self, nms_alpha: f32) -> Self {
        self.nms_alpha = nms_alpha;
        self
    }

    /// Set the percentile threshold (clamped to 0..=100)
    pub fn with_percentile(mut self, percentile: u8) -> Self {
        self.percentile = percentile.min(100);
        self
    }

    /// Set the maximum fan-out per anchor peak
    pub fn with_fanout(mut self, fanout: usize) -> Self {
        self.fanout = fanout;
        self
    }

    /// Set the target zone bounds
    pub fn with_target_zone(mut self, dt_min: u32, dt_max: u32, df_max: u32) -> Self {
        self.dt_min = dt_min;
        self.dt_max = dt_max;
        self.df_max = df_max;
        self
    }

    /// Set the matcher's candidate/scoring thresholds
    pub fn with_matcher_thresholds(mut self, k_min: usize, s_min: usize, margin: usize, bucket: i64) -> Self {
        self.k_min = k_min;
        self.s_min = s_min;
        self.margin = margin;
        self.bucket = bucket.max(1);
        self
    }

    /// Set the minimum audio duration
    pub fn with_min_audio_duration(mut self, duration: f32) -> Self {
        self.min_audio_duration = duration;
        self
    }

    /// Set the maximum audio duration
    pub fn with_max_audio_duration(mut self, duration: f32) -> Self {
        self.max_audio_duration = duration;
        self
    }

    /// Set the buffer size
    pub fn with_buffer_size(mut self, buffer_size: usize) -> Self {
        self.buffer_size = buffer_size;
        self
    }

    /// Enable or disable quiet mode (suppress verbose output)
    pub fn with_quiet_mode(mut self, quiet: bool) -> Self {
        self.quiet_mode = quiet;
        self
    }

    /// Number of frequency bins the STFT produces under this config
    pub fn num_bins(&self) -> usize {
        self.window_len / 2 + 1
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &str) -> Result<Self, Box<dyn std::error::Error>> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn to_file(&self, path: &str) -> Result<(), Box<dyn std::error::Error>> {
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
