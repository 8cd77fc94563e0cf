//! I/Q Data Reading Module
//!
//! Reads recorded I/Q samples from files (or any [`Read`] implementation) in
//! one of the supported [`IqFormat`]s. [`IqFileTuner`] wraps a reader behind the
//! [`Tuner`] trait so that a recording can stand in for a live device: it
//! remembers the requested frequency and gain but cannot act on them.
use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use num_complex::Complex;
use tracing::debug;

use crate::{Gain, IqFormat, Result, Tuner};

/**
 * I/Q Data Source Configuration
 */
#[derive(Debug, Clone, Copy)]
pub struct IqConfig {
    pub iq_format: IqFormat,
    pub sample_rate: u32,
    /// Number of complex samples returned per chunk
    pub chunk_size: usize,
}

impl IqConfig {
    pub fn new(sample_rate: u32, chunk_size: usize, iq_format: IqFormat) -> Self {
        Self {
            iq_format,
            sample_rate,
            chunk_size,
        }
    }
}

/**
 * Synchronous I/Q Reader
 */
pub struct IqRead<R: Read> {
    config: IqConfig,
    reader: R,
}

impl IqRead<std::io::BufReader<std::fs::File>> {
    pub fn from_file<P: AsRef<Path>>(path: P, config: IqConfig) -> Result<Self> {
        let path = expanduser(path.as_ref().to_path_buf());
        let file = std::fs::File::open(&path)?;
        debug!(path = %path.display(), format = ?config.iq_format, "opened I/Q recording");
        Ok(Self::new(std::io::BufReader::new(file), config))
    }
}

impl<R: Read> IqRead<R> {
    pub fn new(reader: R, config: IqConfig) -> Self {
        Self { config, reader }
    }

    pub fn config(&self) -> &IqConfig {
        &self.config
    }

    /// Read one chunk; a short final chunk is returned, an empty read is `None`.
    fn read_samples(&mut self) -> Result<Option<Vec<Complex<f32>>>> {
        let bytes_per_sample = self.config.iq_format.bytes_per_sample();
        let mut buffer = vec![0u8; self.config.chunk_size * bytes_per_sample];
        let mut filled = 0;
        while filled < buffer.len() {
            match self.reader.read(&mut buffer[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        let whole = filled - filled % bytes_per_sample;
        if whole == 0 {
            return Ok(None);
        }
        Ok(Some(crate::convert_bytes_to_complex(
            self.config.iq_format,
            &buffer[..whole],
        )))
    }
}

impl<R: Read> Iterator for IqRead<R> {
    type Item = Result<Vec<Complex<f32>>>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_samples().transpose()
    }
}

/// A recorded I/Q stream exposed as a [`Tuner`].
pub struct IqFileTuner<R: Read + Send> {
    reader: Mutex<IqRead<R>>,
    sample_rate: u32,
    center_freq: AtomicU32,
    gain: Mutex<Gain>,
}

impl IqFileTuner<std::io::BufReader<std::fs::File>> {
    pub fn open<P: AsRef<Path>>(path: P, config: IqConfig) -> Result<Self> {
        Ok(Self::new(IqRead::from_file(path, config)?))
    }
}

impl<R: Read + Send> IqFileTuner<R> {
    pub fn new(reader: IqRead<R>) -> Self {
        let sample_rate = reader.config().sample_rate;
        Self {
            reader: Mutex::new(reader),
            sample_rate,
            center_freq: AtomicU32::new(0),
            gain: Mutex::new(Gain::Auto),
        }
    }

    /// Last frequency requested through [`Tuner::set_center_freq`]
    pub fn center_freq(&self) -> u32 {
        self.center_freq.load(Ordering::Relaxed)
    }

    /// Last gain requested through [`Tuner::set_gain`]
    pub fn gain(&self) -> Gain {
        *self.gain.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<R: Read + Send> Tuner for IqFileTuner<R> {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn set_center_freq(&self, freq_hz: u32) -> Result<()> {
        debug!(freq_hz, "recording playback ignores retune");
        self.center_freq.store(freq_hz, Ordering::Relaxed);
        Ok(())
    }

    fn set_gain(&self, gain: Gain) -> Result<()> {
        *self.gain.lock().unwrap_or_else(|e| e.into_inner()) = gain;
        Ok(())
    }

    fn read(&self) -> Option<Result<Vec<Complex<f32>>>> {
        self.reader
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .next()
    }
}

fn expanduser(path: PathBuf) -> PathBuf {
    if let Some(stripped) = path.to_str().and_then(|p| p.strip_prefix("~"))
        && let Some(home_dir) = dirs::home_dir()
    {
        return home_dir.join(stripped.trim_start_matches('/'));
    }
    path
}
