//! The FM receiver: pipeline topology and parameter control.
//!
//! ```text
//!           ┌─ resampler ─ low-pass ─ WBFM ─ 49/50 resampler ─ volume ─ audio sink
//! source ─ tee
//!           └─ xlating low-pass ─ WBFM ─ 57 kHz xlating ─ RRC ─ AGC ─ BPSK ─ re
//!              ─ slicer ─ keep 1/2 ─ diff decoder ─ RDS decoder ─ RDS parser
//!              ─ RDS adapter
//! ```
//!
//! The graph is fixed once built; `set_frequency`, `set_gain` and
//! `set_volume` act on the running stages.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use fmtuner::dsp::filters::{Window, low_pass, root_raised_cosine};
use fmtuner::dsp::psk::RDS_SYMBOL_RATE;
use fmtuner::{Gain, Tuner};
use num_complex::Complex;
use tracing::{error, info};

use crate::config::ReceiverConfig;
use crate::pipeline::stages::{self, Volume, VolumeControl};
use crate::pipeline::{Pipeline, PipelineBuilder};
use crate::rds::decoder::RDS_BIT_RATE;
use crate::rds::{RdsAdapter, RdsData, RdsEventSink};
use crate::sink::{AudioSink, NullSink};
use crate::{Error, Result};

/// Allowed volume range
pub const VOLUME_RANGE: (f32, f32) = (0.0, 3.0);

/// Decimation of the audio demodulator
const AUDIO_DECIMATION: usize = 10;

/// Loop bandwidth of the gain control ahead of symbol recovery
const RDS_AGC_BANDWIDTH: f32 = 1e-3;

/// Final audio resampler, `interpolation / decimation`
const AUDIO_RESAMPLING: (usize, usize) = (49, 50);

/// Rational ratio taking `sample_rate` to the audio demodulator's
/// quadrature rate, `audio_rate · 50/49 · 10`
fn audio_front_ratio(sample_rate: u32, audio_rate: u32) -> (usize, usize) {
    let (interp, decim) = AUDIO_RESAMPLING;
    (
        audio_rate as usize * decim * AUDIO_DECIMATION,
        sample_rate as usize * interp,
    )
}

struct Control {
    frequency: Option<f64>,
    gain: Gain,
}

/// Assembles a [`Receiver`] from a [`Tuner`] and an [`AudioSink`].
pub struct ReceiverBuilder {
    config: ReceiverConfig,
    tuner: Option<Arc<dyn Tuner>>,
    audio_sink: Option<Box<dyn AudioSink>>,
    on_rds: Option<Arc<dyn RdsEventSink>>,
}

impl Default for ReceiverBuilder {
    fn default() -> Self {
        Self::new(ReceiverConfig::default())
    }
}

impl ReceiverBuilder {
    pub fn new(config: ReceiverConfig) -> Self {
        Self {
            config,
            tuner: None,
            audio_sink: None,
            on_rds: None,
        }
    }

    pub fn config(mut self, config: ReceiverConfig) -> Self {
        self.config = config;
        self
    }

    pub fn tuner<T: Tuner + 'static>(mut self, tuner: Arc<T>) -> Self {
        self.tuner = Some(tuner);
        self
    }

    /// Audio destination; audio is discarded when none is given.
    pub fn audio_sink(mut self, sink: impl AudioSink + 'static) -> Self {
        self.audio_sink = Some(Box::new(sink));
        self
    }

    /// Register the RDS event sink.
    pub fn on_rds(mut self, sink: impl RdsEventSink + 'static) -> Self {
        self.on_rds = Some(Arc::new(sink));
        self
    }

    /// Build the pipeline and apply the initial frequency, gain and volume.
    /// The pipeline is not started.
    pub fn build(self) -> Result<Receiver> {
        let config = self.config;
        let tuner = self
            .tuner
            .ok_or_else(|| Error::invalid_argument("a tuner is required"))?;
        if tuner.sample_rate() != config.sample_rate {
            return Err(Error::Connect {
                stage: "source".to_string(),
                expected: config.sample_rate as f64,
                found: tuner.sample_rate() as f64,
            });
        }
        if config.baseband_decimation == 0 {
            return Err(Error::invalid_argument("baseband decimation must be at least 1"));
        }

        let adapter = Arc::new(match self.on_rds {
            Some(sink) => RdsAdapter::with_sink(sink),
            None => RdsAdapter::new(),
        });
        let volume = VolumeControl::new(0.0);
        let audio_sink = self.audio_sink.unwrap_or_else(|| Box::new(NullSink));
        let pipeline = assemble(&config, &tuner, &adapter, &volume, audio_sink)?;

        let receiver = Receiver {
            control: Mutex::new(Control {
                frequency: None,
                gain: config.gain,
            }),
            config,
            tuner,
            adapter,
            volume,
            pipeline,
        };
        if let Some(frequency) = receiver.config.frequency {
            receiver.set_frequency(frequency)?;
        }
        receiver.set_gain(receiver.config.gain)?;
        receiver.set_volume(receiver.config.volume)?;
        Ok(receiver)
    }
}

/// Wire the audio and RDS paths behind a shared source.
fn assemble(
    config: &ReceiverConfig,
    tuner: &Arc<dyn Tuner>,
    adapter: &Arc<RdsAdapter>,
    volume: &VolumeControl,
    mut audio_sink: Box<dyn AudioSink>,
) -> Result<Pipeline> {
    let sample_rate = config.sample_rate as f64;
    let mut builder = PipelineBuilder::new(config.channel_depth);

    let source = {
        let tuner = Arc::clone(tuner);
        builder.source("source", sample_rate, move || {
            tuner.read().map(|chunk| chunk.map_err(Error::from))
        })
    };
    let (audio, rds) = builder.tee("tee", source);

    // Audio path
    let (interp, decim) = audio_front_ratio(config.sample_rate, config.audio_rate);
    let audio = builder.connect(
        audio,
        stages::rational_resampler::<Complex<f32>>("audio-resampler", sample_rate, interp, decim)?,
    )?;
    let quad_rate = audio.rate();
    let taps = low_pass(2.0, quad_rate, 100e3, 7e3, Window::Hamming)?;
    let audio = builder.connect(
        audio,
        stages::fir::<Complex<f32>>("audio-lowpass", quad_rate, taps, 1)?,
    )?;
    let audio = builder.connect(
        audio,
        stages::wbfm_demod("audio-demod", quad_rate, AUDIO_DECIMATION)?,
    )?;
    let demod_rate = audio.rate();
    let (interp, decim) = AUDIO_RESAMPLING;
    let audio = builder.connect(
        audio,
        stages::rational_resampler::<f32>("audio-rate-resampler", demod_rate, interp, decim)?,
    )?;
    let audio = builder.connect(
        audio,
        Volume::new(volume.clone(), config.audio_rate as f64),
    )?;
    builder.sink("audio-sink", audio, move |chunk| Ok(audio_sink.write(&chunk)));

    // RDS path
    let prototype = low_pass(1.0, sample_rate, 100e3, 100e3, Window::Hamming)?;
    let rds = builder.connect(
        rds,
        stages::xlating_fir::<Complex<f32>>("rds-xlating", sample_rate, &prototype, 1, 0.0)?,
    )?;
    let rds = builder.connect(
        rds,
        stages::wbfm_demod("rds-demod", sample_rate, config.baseband_decimation)?,
    )?;
    let mpx_rate = rds.rate();
    let prototype = low_pass(2500.0, mpx_rate, 2.4e3, 2e3, Window::Hamming)?;
    let rds = builder.connect(
        rds,
        stages::xlating_fir::<f32>("rds-subcarrier", mpx_rate, &prototype, 5, 57e3)?,
    )?;
    let symbol_rate = rds.rate();
    let taps = root_raised_cosine(1.0, symbol_rate, RDS_SYMBOL_RATE, 1.0, 100)?;
    let rds = builder.connect(
        rds,
        stages::fir::<Complex<f32>>("rds-matched-filter", symbol_rate, taps, 1)?,
    )?;
    let rds = builder.connect(rds, stages::agc(symbol_rate, RDS_AGC_BANDWIDTH))?;
    let rds = builder.connect(rds, stages::mpsk_receiver("rds-psk", symbol_rate)?)?;
    let rds = builder.connect(rds, stages::complex_to_real(RDS_SYMBOL_RATE))?;
    let rds = builder.connect(rds, stages::binary_slicer(RDS_SYMBOL_RATE))?;
    let rds = builder.connect(rds, stages::keep_one_in_n(RDS_SYMBOL_RATE, 2))?;
    let rds = builder.connect(rds, stages::diff_decoder(RDS_BIT_RATE, 2))?;
    let rds = builder.connect(rds, stages::rds_decoder())?;
    let rds = builder.connect(rds, stages::rds_parser())?;

    let adapter = Arc::clone(adapter);
    builder.sink("rds-adapter", rds, move |fragments| {
        for fragment in &fragments {
            if let Err(e) = adapter.handle(fragment) {
                error!(code = fragment.code, error = %e, "RDS adapter rejected fragment");
                return Err(e);
            }
        }
        Ok(true)
    });

    Ok(builder.build())
}

/**
 * FM receiver
 *
 * Owns the pipeline and its runtime parameters. All methods take `&self`;
 * share it behind an `Arc` to control it from another thread or from the
 * RDS event sink.
 */
pub struct Receiver {
    config: ReceiverConfig,
    tuner: Arc<dyn Tuner>,
    adapter: Arc<RdsAdapter>,
    volume: VolumeControl,
    control: Mutex<Control>,
    pipeline: Pipeline,
}

impl Receiver {
    pub fn builder() -> ReceiverBuilder {
        ReceiverBuilder::default()
    }

    /// Receiver on the RTL-SDR dongle at `device_index`.
    #[cfg(feature = "rtlsdr")]
    pub fn open(
        device_index: usize,
        config: ReceiverConfig,
        audio_sink: impl AudioSink + 'static,
    ) -> Result<Self> {
        let tuner = fmtuner::rtlsdr::RtlSdrTuner::open(device_index, config.sample_rate)
            .map_err(|e| match e {
                fmtuner::Error::NoDeviceFound => Error::NoDeviceFound,
                other => Error::Source(other),
            })?;
        info!(device_index, "RTL-SDR opened");
        ReceiverBuilder::new(config)
            .tuner(Arc::new(tuner))
            .audio_sink(audio_sink)
            .build()
    }

    fn control(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Retune to `hz` and wipe the RDS cache.
    ///
    /// Both happen under the cache lock: no fragment decoded before the
    /// retune can land in the cache afterwards. There is no band check.
    pub fn set_frequency(&self, hz: f64) -> Result<()> {
        if !hz.is_finite() || hz < 0.0 || hz.round() > u32::MAX as f64 {
            return Err(Error::invalid_argument(format!("invalid frequency {hz} Hz")));
        }
        let mut control = self.control();
        self.adapter
            .clear_with(|| self.tuner.set_center_freq(hz.round() as u32))?;
        control.frequency = Some(hz);
        info!(frequency = hz, "tuned");
        Ok(())
    }

    /// Switch between automatic and manual gain. There is no upper bound
    /// on a manual value.
    pub fn set_gain(&self, gain: Gain) -> Result<()> {
        if let Gain::Manual(db) = gain
            && !db.is_finite()
        {
            return Err(Error::invalid_argument(format!("invalid gain {db} dB")));
        }
        let mut control = self.control();
        self.tuner.set_gain(gain)?;
        control.gain = gain;
        info!(gain = %gain, "gain set");
        Ok(())
    }

    /// Set the audio volume, between 0 and 3.
    pub fn set_volume(&self, volume: f32) -> Result<()> {
        let (min, max) = VOLUME_RANGE;
        if !(min..=max).contains(&volume) {
            return Err(Error::OutOfRange {
                value: volume,
                min,
                max,
            });
        }
        self.volume.set(volume);
        info!(volume, "volume set");
        Ok(())
    }

    pub fn frequency(&self) -> Option<f64> {
        self.control().frequency
    }

    pub fn gain(&self) -> Gain {
        self.control().gain
    }

    pub fn volume(&self) -> f32 {
        self.volume.get()
    }

    pub fn sample_rate(&self) -> u32 {
        self.config.sample_rate
    }

    pub fn baseband_decimation(&self) -> usize {
        self.config.baseband_decimation
    }

    pub fn config(&self) -> &ReceiverConfig {
        &self.config
    }

    /// Snapshot of the RDS cache
    pub fn rds_data(&self) -> RdsData {
        self.adapter.snapshot()
    }

    pub fn rds_adapter(&self) -> &Arc<RdsAdapter> {
        &self.adapter
    }

    /// Replace the RDS event sink; `None` removes it.
    pub fn subscribe(&self, sink: Option<Arc<dyn RdsEventSink>>) {
        self.adapter.subscribe(sink);
    }

    pub fn start(&self) -> Result<()> {
        self.pipeline.start()?;
        info!(sample_rate = self.config.sample_rate, "receiver started");
        Ok(())
    }

    /// Stop reading the source and drop pending RDS fragments.
    pub fn stop(&self) {
        self.adapter.shutdown();
        self.pipeline.stop();
        info!("receiver stopping");
    }

    /// Block until every stage has exited.
    pub fn wait(&self) -> Result<()> {
        self.pipeline.wait()
    }
}

impl Drop for Receiver {
    fn drop(&mut self) {
        self.pipeline.stop();
    }
}
