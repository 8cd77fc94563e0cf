use fmtuner::Gain;

/// Runtime configuration of a [`crate::Receiver`].
///
/// `sample_rate` and `baseband_decimation` are fixed once the receiver is
/// built; the other values are only starting points for the control setters.
#[derive(Debug, Clone, PartialEq)]
pub struct ReceiverConfig {
    /// Source sample rate in Hz
    pub sample_rate: u32,
    /// Decimation of the RDS path demodulator
    pub baseband_decimation: usize,
    /// Frequency tuned at construction, in Hz
    pub frequency: Option<f64>,
    pub gain: Gain,
    pub volume: f32,
    /// Capacity, in chunks, of the channel between two stages
    pub channel_depth: usize,
    /// Sample rate of the audio sink in Hz
    pub audio_rate: u32,
}

impl Default for ReceiverConfig {
    fn default() -> Self {
        Self {
            sample_rate: 2_400_000,
            baseband_decimation: 4,
            frequency: Some(87.6e6),
            gain: Gain::Manual(49.6),
            volume: 1.0,
            channel_depth: 16,
            audio_rate: 48_000,
        }
    }
}

impl ReceiverConfig {
    pub fn with_sample_rate(mut self, sample_rate: u32) -> Self {
        self.sample_rate = sample_rate;
        self
    }

    pub fn with_frequency(mut self, frequency: Option<f64>) -> Self {
        self.frequency = frequency;
        self
    }

    pub fn with_gain(mut self, gain: Gain) -> Self {
        self.gain = gain;
        self
    }

    pub fn with_volume(mut self, volume: f32) -> Self {
        self.volume = volume;
        self
    }
}
