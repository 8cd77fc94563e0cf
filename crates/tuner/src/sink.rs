//! Audio outputs for the receiver.

use crossbeam::channel::{self, Receiver, Sender};
use tinyaudio::prelude::*;
use tracing::info;

use crate::{Error, Result};

/// Destination of demodulated mono audio
pub trait AudioSink: Send {
    /// Queue samples for playback; `false` once the output is gone.
    fn write(&mut self, samples: &[f32]) -> bool;
}

impl<S: AudioSink + ?Sized> AudioSink for Box<S> {
    fn write(&mut self, samples: &[f32]) -> bool {
        (**self).write(samples)
    }
}

/// Discards audio (headless operation, tests).
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl AudioSink for NullSink {
    fn write(&mut self, _samples: &[f32]) -> bool {
        true
    }
}

/// Pushes samples into a bounded channel, blocking while it is full.
pub struct ChannelSink {
    tx: Sender<f32>,
}

impl ChannelSink {
    /// A sink and the receiving end of its channel, `capacity` samples deep
    pub fn new(capacity: usize) -> (Self, Receiver<f32>) {
        let (tx, rx) = channel::bounded(capacity);
        (Self { tx }, rx)
    }
}

impl AudioSink for ChannelSink {
    fn write(&mut self, samples: &[f32]) -> bool {
        samples.iter().all(|&s| self.tx.send(s).is_ok())
    }
}

/// Sound card output; playback stops when dropped.
pub struct AudioDevice {
    _device: OutputDevice,
}

/// Open the default output device at `sample_rate` and return it with the
/// sink feeding it. Missing samples are played as silence.
pub fn open_audio_output(sample_rate: u32) -> Result<(AudioDevice, ChannelSink)> {
    let rate = sample_rate as usize;
    // Two seconds of buffering
    let (sink, rx) = ChannelSink::new(2 * rate);
    let params = OutputDeviceParameters {
        channels_count: 1,
        sample_rate: rate,
        channel_sample_count: 1024,
    };
    let device = run_output_device(params, move |data| {
        for sample in data.iter_mut() {
            *sample = rx.try_recv().unwrap_or(0.0);
        }
    })
    .map_err(|e| Error::audio(e.to_string()))?;
    info!(sample_rate, "audio output opened");
    Ok((AudioDevice { _device: device }, sink))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_sink_delivers_in_order() {
        let (mut sink, rx) = ChannelSink::new(8);
        assert!(sink.write(&[0.1, 0.2, 0.3]));
        assert_eq!(rx.try_iter().collect::<Vec<_>>(), vec![0.1, 0.2, 0.3]);
    }

    #[test]
    fn test_channel_sink_reports_closed_output() {
        let (mut sink, rx) = ChannelSink::new(8);
        drop(rx);
        assert!(!sink.write(&[0.1]));
    }
}
