//! Public facade wiring the pipeline (resample -> spectrogram -> peaks ->
//! fingerprint) to the store and matcher.

use std::fs::File;
use std::io::BufReader;
use std::path::Path;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use rodio::Source;

use crate::audio::processor::AudioProcessor;
use crate::audio::recorder::AudioRecorder;
use crate::config::Config;
use crate::error::{AfpError, Result};
use crate::fingerprint::build_fingerprints;
use crate::matcher::{self, MatcherParams};
use crate::peaks::{find_peaks, Peak};
use crate::resample::resample;
use crate::spectrogram::stft;
use crate::store::{FingerprintStore, TrackInfo};

pub type TrackId = u32;

/// Result of a successful `identify` call.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct IdentifyOutcome {
    pub track_id: TrackId,
    pub track_name: String,
    pub score: u32,
}

/// Intermediate pipeline artifacts for a single `learn`/`identify` call:
/// the spectrogram shape, the extracted peaks, and the fingerprint count.
/// Not consumed anywhere in this crate; exists for a plotting collaborator
/// to render the same run a caller just fingerprinted.
#[derive(Debug, Clone)]
pub struct Diagnostics {
    pub num_frames: usize,
    pub num_bins: usize,
    pub peaks: Vec<Peak>,
    pub fingerprint_count: usize,
}

/// The recognizer: a `Config` plus the fingerprint database it reads from
/// and writes to. A thin facade wrapping the signal-processing pipeline
/// and the matcher behind `learn`/`identify`.
pub struct Recognizer {
    config: Config,
    store: FingerprintStore,
}

impl Recognizer {
    pub fn new(config: Config) -> Self {
        Self {
            config,
            store: FingerprintStore::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Open a database file, defaulting the config. A missing file yields
    /// an empty, ready-to-learn recognizer.
    pub fn open(path: &Path) -> Result<Self> {
        Self::open_with_config(path, Config::default())
    }

    pub fn open_with_config(path: &Path, config: Config) -> Result<Self> {
        let store = FingerprintStore::load(path)?;
        Ok(Self { config, store })
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.store.save(path)
    }

    /// Run the pipeline and insert the resulting fingerprints under a new
    /// track id.
    pub fn learn(&mut self, track_name: &str, waveform: &[f32], fs: u32) -> Result<TrackId> {
        let (fps, _) = self.run_pipeline(waveform, fs)?;
        Ok(self.store.insert(track_name, &fps))
    }

    /// Like `learn`, but also returns the spectrogram/peak/fingerprint
    /// summary for that run.
    pub fn learn_with_diagnostics(&mut self, track_name: &str, waveform: &[f32], fs: u32) -> Result<(TrackId, Diagnostics)> {
        let (fps, diagnostics) = self.run_pipeline(waveform, fs)?;
        let track_id = self.store.insert(track_name, &fps);
        Ok((track_id, diagnostics))
    }

    /// Run the pipeline and query the matcher. `Ok(None)` means no
    /// sufficiently confident match, which is not an error condition.
    pub fn identify(&self, waveform: &[f32], fs: u32) -> Result<Option<IdentifyOutcome>> {
        let (fps, _) = self.run_pipeline(waveform, fs)?;
        Ok(self.query_store(&fps))
    }

    /// Like `identify`, but also returns the spectrogram/peak/fingerprint
    /// summary for that run.
    pub fn identify_with_diagnostics(&self, waveform: &[f32], fs: u32) -> Result<(Option<IdentifyOutcome>, Diagnostics)> {
        let (fps, diagnostics) = self.run_pipeline(waveform, fs)?;
        Ok((self.query_store(&fps), diagnostics))
    }

    fn query_store(&self, fps: &[(u32, u32)]) -> Option<IdentifyOutcome> {
        let params = MatcherParams {
            k_min: self.config.k_min,
            s_min: self.config.s_min as u32,
            margin: self.config.margin as u32,
            bucket: self.config.bucket,
        };

        match matcher::query(&self.store, fps, &params) {
            Some(m) => {
                let track_name = self.store.track_name(m.track_id).unwrap_or("unknown").to_string();
                if !self.config.quiet_mode {
                    eprintln!("identified track {} ({}) with score {}", m.track_id, track_name, m.score);
                }
                Some(IdentifyOutcome {
                    track_id: m.track_id,
                    track_name,
                    score: m.score,
                })
            }
            None => None,
        }
    }

    pub fn list_tracks(&self) -> Vec<TrackInfo> {
        self.store.tracks().collect()
    }

    /// Decode an audio file with `rodio` and learn it, a convenience layer
    /// over the core pipeline kept outside its invariants per the audio
    /// adapters' scope.
    pub fn learn_from_file(&mut self, track_name: &str, path: &Path) -> Result<TrackId> {
        let (samples, fs) = decode_file(path)?;
        self.learn(track_name, &samples, fs)
    }

    pub fn identify_from_file(&self, path: &Path) -> Result<Option<IdentifyOutcome>> {
        let (samples, fs) = decode_file(path)?;
        self.identify(&samples, fs)
    }

    /// Start a live-capture identification stream on the default input
    /// device, polling `identify` against locally captured buffers.
    pub fn start_identify_stream(self: Arc<Self>, device_name: Option<String>) -> Result<IdentifyStream> {
        let (result_tx, result_rx) = mpsc::channel();
        let (_control_tx, control_rx) = mpsc::channel();

        let recognizer = self;
        let config_for_thread = recognizer.config.clone();

        let handle = thread::spawn(move || {
            let mut recorder = AudioRecorder::new(config_for_thread.clone());
            match recorder.start_recording(device_name, control_rx) {
                Ok(sample_rx) => {
                    let mut processor = AudioProcessor::with_config(config_for_thread.clone());
                    for (samples, fs) in sample_rx {
                        if let Some((buffer, fs)) = processor.process_samples(&samples, fs) {
                            match recognizer.identify(&buffer, fs) {
                                Ok(outcome) => {
                                    if result_tx.send(Ok(outcome)).is_err() {
                                        break;
                                    }
                                }
                                Err(e) => {
                                    if result_tx.send(Err(e)).is_err() {
                                        break;
                                    }
                                }
                            }
                        }
                    }
                }
                Err(e) => {
                    let _ = result_tx.send(Err(AfpError::AudioError(e.to_string())));
                }
            }
        });

        Ok(IdentifyStream {
            receiver: result_rx,
            _handles: vec![handle],
        })
    }

    fn run_pipeline(&self, waveform: &[f32], fs: u32) -> Result<(Vec<(u32, u32)>, Diagnostics)> {
        let clipped = self.clip_to_max_duration(waveform, fs);
        self.check_min_duration(clipped, fs)?;

        let resampled = resample(clipped, fs, self.config.target_rate, self.config.fir_order)?;
        let (magnitudes, _axes) = stft(&resampled, self.config.target_rate, self.config.window_len, self.config.hop)?;
        let peaks = find_peaks(&magnitudes, self.config.nms_alpha, self.config.nms_time_half, self.config.percentile);
        let fps = build_fingerprints(&peaks, self.config.dt_min, self.config.dt_max, self.config.df_max, self.config.fanout);

        let diagnostics = Diagnostics {
            num_frames: magnitudes.frames(),
            num_bins: magnitudes.bins(),
            peaks: peaks.clone(),
            fingerprint_count: fps.len(),
        };

        let pairs = fps.into_iter().map(|fp| (fp.address, fp.anchor_time)).collect();
        Ok((pairs, diagnostics))
    }

    fn clip_to_max_duration<'a>(&self, waveform: &'a [f32], fs: u32) -> &'a [f32] {
        let max_samples = (self.config.max_audio_duration * fs as f32) as usize;
        if max_samples > 0 && waveform.len() > max_samples {
            &waveform[..max_samples]
        } else {
            waveform
        }
    }

    fn check_min_duration(&self, waveform: &[f32], fs: u32) -> Result<()> {
        let min_samples = (self.config.min_audio_duration * fs as f32) as usize;
        if waveform.len() < min_samples {
            return Err(AfpError::TooShort(format!(
                "{:.2}s of audio is below the configured minimum of {:.2}s",
                waveform.len() as f32 / fs as f32,
                self.config.min_audio_duration
            )));
        }
        Ok(())
    }
}

/// Stream of identification results for continuous monitoring.
pub struct IdentifyStream {
    receiver: mpsc::Receiver<Result<Option<IdentifyOutcome>>>,
    _handles: Vec<thread::JoinHandle<()>>,
}

impl IdentifyStream {
    pub fn next(&self) -> Option<Result<Option<IdentifyOutcome>>> {
        self.receiver.recv().ok()
    }

    pub fn try_next(&self) -> Option<Result<Option<IdentifyOutcome>>> {
        self.receiver.try_recv().ok()
    }

    pub fn next_timeout(&self, timeout: Duration) -> Option<Result<Option<IdentifyOutcome>>> {
        self.receiver.recv_timeout(timeout).ok()
    }
}

impl Iterator for IdentifyStream {
    type Item = Result<Option<IdentifyOutcome>>;

    fn next(&mut self) -> Option<Self::Item> {
        IdentifyStream::next(self)
    }
}

/// Decode a WAV/MP3/OGG/FLAC file into mono `f32` samples at its native
/// rate. Resampling to `target_rate` remains the pipeline's job.
fn decode_file(path: &Path) -> Result<(Vec<f32>, u32)> {
    let file = File::open(path).map_err(|e| AfpError::AudioError(format!("failed to open {}: {}", path.display(), e)))?;
    let decoder = rodio::Decoder::new(BufReader::new(file))
        .map_err(|e| AfpError::AudioError(format!("failed to decode {}: {}", path.display(), e)))?;

    let native_rate = decoder.sample_rate();
    let mono = rodio::source::UniformSourceIterator::new(decoder, 1, native_rate);
    let samples: Vec<f32> = mono.map(|s: i16| s as f32 / i16::MAX as f32).collect();

    if samples.is_empty() {
        return Err(AfpError::InvalidInput(format!("no audio samples decoded from {}", path.display())));
    }

    Ok((samples, native_rate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn tone(freq: f32, fs: u32, duration_secs: f32) -> Vec<f32> {
        let n = (fs as f32 * duration_secs) as usize;
        (0..n).map(|i| (2.0 * PI * freq * i as f32 / fs as f32).sin()).collect()
    }

    fn mixed(freqs: &[f32], fs: u32, duration_secs: f32) -> Vec<f32> {
        let n = (fs as f32 * duration_secs) as usize;
        (0..n)
            .map(|i| {
                freqs
                    .iter()
                    .map(|f| (2.0 * PI * f * i as f32 / fs as f32).sin())
                    .sum::<f32>()
                    / freqs.len() as f32
            })
            .collect()
    }

    #[test]
    fn rejects_audio_shorter_than_minimum_duration() {
        let recognizer = Recognizer::new(Config::default());
        let waveform = tone(440.0, 44100, 0.5);
        let err = recognizer.identify(&waveform, 44100).unwrap_err();
        assert!(matches!(err, AfpError::TooShort(_)));
    }

    #[test]
    fn learn_then_identify_recovers_the_track() {
        let mut recognizer = Recognizer::new(Config::default());
        let fs = 44100;
        let waveform = mixed(&[440.0, 880.0, 1320.0], fs, 5.0);

        let track_id = recognizer.learn("test tone", &waveform, fs).unwrap();
        let outcome = recognizer.identify(&waveform, fs).unwrap();

        let outcome = outcome.expect("expected a match for the exact learned waveform");
        assert_eq!(outcome.track_id, track_id);
        assert_eq!(outcome.track_name, "test tone");
    }

    #[test]
    fn identify_against_empty_store_is_none() {
        let recognizer = Recognizer::new(Config::default());
        let waveform = mixed(&[440.0, 880.0], 44100, 5.0);
        let outcome = recognizer.identify(&waveform, 44100).unwrap();
        assert!(outcome.is_none());
    }

    #[test]
    fn list_tracks_reflects_learned_tracks() {
        let mut recognizer = Recognizer::new(Config::default());
        let waveform = mixed(&[300.0, 600.0], 44100, 5.0);
        recognizer.learn("alpha", &waveform, 44100).unwrap();
        let tracks = recognizer.list_tracks();
        assert_eq!(tracks.len(), 1);
        assert_eq!(tracks[0].name, "alpha");
    }

    #[test]
    fn save_and_open_round_trips_learned_tracks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.afp");

        let mut recognizer = Recognizer::new(Config::default());
        let waveform = mixed(&[500.0, 1000.0], 44100, 5.0);
        recognizer.learn("beta", &waveform, 44100).unwrap();
        recognizer.save(&path).unwrap();

        let reopened = Recognizer::open(&path).unwrap();
        assert_eq!(reopened.list_tracks().len(), 1);
    }

    #[test]
    fn learn_with_diagnostics_reports_the_same_fingerprint_count_as_plain_learn() {
        let mut recognizer = Recognizer::new(Config::default());
        let waveform = mixed(&[440.0, 880.0, 1320.0], 44100, 5.0);

        let (track_id, diagnostics) = recognizer.learn_with_diagnostics("gamma", &waveform, 44100).unwrap();

        assert_eq!(recognizer.list_tracks()[0].track_id, track_id);
        assert_eq!(recognizer.list_tracks()[0].fingerprint_count as usize, diagnostics.fingerprint_count);
        assert!(diagnostics.num_frames > 0);
        assert_eq!(diagnostics.num_bins, recognizer.config().num_bins());
        assert!(!diagnostics.peaks.is_empty());
    }

    #[test]
    fn identify_with_diagnostics_returns_the_same_outcome_as_plain_identify() {
        let mut recognizer = Recognizer::new(Config::default());
        let waveform = mixed(&[250.0, 750.0], 44100, 5.0);
        let track_id = recognizer.learn("delta", &waveform, 44100).unwrap();

        let (outcome, diagnostics) = recognizer.identify_with_diagnostics(&waveform, 44100).unwrap();

        let outcome = outcome.expect("expected a match for the exact learned waveform");
        assert_eq!(outcome.track_id, track_id);
        assert!(!diagnostics.peaks.is_empty());
    }
}
