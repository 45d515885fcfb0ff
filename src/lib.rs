//! # afp
//!
//! A local acoustic-fingerprint recognizer: the classical "reduce a
//! waveform to a compact set of noise-robust hashes, index them, and score
//! candidates by address overlap plus temporal coherence" pipeline, owning
//! its own on-disk database end to end instead of calling out to a
//! recognition service.
//!
//! ## Example
//!
//! ```rust,no_run
//! use afp::{Recognizer, Config};
//!
//! let mut recognizer = Recognizer::new(Config::default());
//! let waveform: Vec<f32> = vec![0.0; 44100 * 5];
//! recognizer.learn("silence", &waveform, 44100).unwrap();
//!
//! match recognizer.identify(&waveform, 44100) {
//!     Ok(Some(outcome)) => println!("Identified: {}", outcome.track_name),
//!     Ok(None) => println!("No match"),
//!     Err(e) => eprintln!("Error: {}", e),
//! }
//! ```

pub mod audio;
pub mod config;
pub mod dsp;
pub mod error;
pub mod fingerprint;
pub mod matcher;
pub mod output;
pub mod peaks;
pub mod recognizer;
pub mod resample;
pub mod spectrogram;
pub mod store;

pub use config::Config;
pub use error::{AfpError, Result};
pub use output::{IdentifyOutput, OutputFormat};
pub use recognizer::{Diagnostics, IdentifyOutcome, IdentifyStream, Recognizer, TrackId};
pub use store::{FingerprintStore, TrackInfo};

/// Current version of the library.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
