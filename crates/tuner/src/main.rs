//! FM receiver with RDS decoding
//!
//! # Usage Examples
//!
//! ## RTL-SDR
//! ```bash
//! tuner -f 98.5M -g auto -v
//! ```
//!
//! ## IQ File Playback
//! ```bash
//! tuner --file samples.cu8 --format cu8 --no-audio --json
//! ```
//!
//! While running on a device, commands are read from standard input:
//! `f 101.1M`, `g auto`, `g 28`, `v 0.5` and `q`.

use std::io::BufRead;
use std::str::FromStr;
use std::sync::Arc;

use clap::{ArgAction, Parser};
use fmtuner::iqread::{IqConfig, IqFileTuner};
use fmtuner::{Gain, IqFormat};
use serde::Serialize;
use tracing::{info, warn};

use tuner::rds::{RdsField, RdsValue};
use tuner::sink::{AudioSink, NullSink, open_audio_output};
use tuner::{Error, Receiver, ReceiverConfig, Result};

#[derive(Debug, Clone, Copy, PartialEq)]
struct Frequency(f64);

impl FromStr for Frequency {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(stripped) = s.strip_suffix('M') {
            let val: f64 = stripped.trim().parse().map_err(|_| "Invalid MHz value")?;
            Ok(Frequency(val * 1_000_000.0))
        } else if let Some(stripped) = s.strip_suffix('k') {
            let val: f64 = stripped.trim().parse().map_err(|_| "Invalid kHz value")?;
            Ok(Frequency(val * 1_000.0))
        } else {
            let val: f64 = s.parse().map_err(|_| "Invalid Hz value")?;
            Ok(Frequency(val))
        }
    }
}

fn parse_gain(s: &str) -> std::result::Result<Gain, String> {
    s.parse::<Gain>().map_err(|e| e.to_string())
}

#[derive(Parser, Debug)]
#[command(author, version, about = "FM receiver with RDS decoding", long_about = None)]
struct Args {
    /// Frequency in Hz (accepts k/M suffix, e.g. 98.5M)
    #[arg(short, long, value_parser = Frequency::from_str)]
    frequency: Option<Frequency>,

    /// Tuner gain in dB, or "auto"
    #[arg(short, long, value_parser = parse_gain)]
    gain: Option<Gain>,

    /// Audio volume (0 to 3)
    #[arg(long, default_value_t = 1.0)]
    volume: f32,

    /// Sample rate in Hz
    #[arg(short, long, default_value_t = 2_400_000)]
    sample_rate: u32,

    /// RTL-SDR device index
    #[arg(long, default_value_t = 0)]
    device_index: usize,

    /// Replay an I/Q recording instead of a device
    #[arg(long)]
    file: Option<String>,

    /// IQ format for file input (cu8, cs8, cs16, cf32)
    #[arg(long, default_value = "cu8")]
    format: String,

    /// Disable audio output (for SSH/headless operation)
    #[arg(long, default_value_t = false)]
    no_audio: bool,

    /// Output RDS changes as JSON (one object per line)
    #[arg(long, default_value_t = false)]
    json: bool,

    /// Verbosity level (-v=info, -vv=debug, -vvv=trace)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

/// A line typed on standard input
#[derive(Debug, Clone, Copy, PartialEq)]
enum Command {
    Frequency(f64),
    Gain(Gain),
    Volume(f32),
    Quit,
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let mut words = line.split_whitespace();
        let cmd = words.next().ok_or("empty command")?;
        let arg = words.next();
        match (cmd, arg) {
            ("q" | "quit", None) => Ok(Command::Quit),
            ("f", Some(value)) => Ok(Command::Frequency(Frequency::from_str(value)?.0)),
            ("g", Some(value)) => Ok(Command::Gain(parse_gain(value)?)),
            ("v", Some(value)) => value
                .parse()
                .map(Command::Volume)
                .map_err(|_| format!("invalid volume '{value}'")),
            _ => Err(format!("unknown command '{}'", line.trim())),
        }
    }
}

#[derive(Serialize)]
struct RdsEvent<'a> {
    field: RdsField,
    value: &'a RdsValue,
}

fn print_rds(json: bool, field: RdsField, value: &RdsValue) {
    if json {
        match serde_json::to_string(&RdsEvent { field, value }) {
            Ok(line) => println!("{line}"),
            Err(e) => warn!(error = %e, "cannot serialize RDS event"),
        }
    } else {
        println!("[RDS] {field}: {value}");
    }
}

fn run_commands(receiver: Arc<Receiver>) {
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let Ok(line) = line else { break };
        if line.trim().is_empty() {
            continue;
        }
        let result = match line.parse::<Command>() {
            Ok(Command::Quit) => break,
            Ok(Command::Frequency(hz)) => receiver.set_frequency(hz),
            Ok(Command::Gain(gain)) => receiver.set_gain(gain),
            Ok(Command::Volume(volume)) => receiver.set_volume(volume),
            Err(e) => Err(Error::invalid_argument(e)),
        };
        if let Err(e) = result {
            eprintln!("{e}");
        }
    }
    receiver.stop();
}

#[cfg(feature = "rtlsdr")]
fn open_device(index: usize, config: ReceiverConfig, sink: Box<dyn AudioSink>) -> Result<Receiver> {
    Receiver::open(index, config, sink)
}

#[cfg(not(feature = "rtlsdr"))]
fn open_device(
    _index: usize,
    _config: ReceiverConfig,
    _sink: Box<dyn AudioSink>,
) -> Result<Receiver> {
    Err(Error::NoDeviceFound)
}

fn main() -> Result<()> {
    let args = Args::parse();

    // 0 = WARN (quiet), 1 = INFO, 2 = DEBUG, 3+ = TRACE
    let log_level = match args.verbose {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };
    let _ = tracing_subscriber::fmt()
        .with_max_level(log_level)
        .with_writer(std::io::stderr)
        .try_init();

    let mut config = ReceiverConfig::default()
        .with_sample_rate(args.sample_rate)
        .with_volume(args.volume);
    if let Some(Frequency(hz)) = args.frequency {
        config = config.with_frequency(Some(hz));
    }
    if let Some(gain) = args.gain {
        config = config.with_gain(gain);
    }

    let mut _device = None;
    let sink: Box<dyn AudioSink> = if args.no_audio {
        info!("Audio output disabled (--no-audio)");
        Box::new(NullSink)
    } else {
        let (device, sink) = open_audio_output(config.audio_rate)?;
        _device = Some(device);
        Box::new(sink)
    };

    let json = args.json;
    let on_rds = move |field: RdsField, value: &RdsValue| print_rds(json, field, value);

    let receiver = match &args.file {
        Some(path) => {
            let format = IqFormat::from_str(&args.format)?;
            let source = IqFileTuner::open(path, IqConfig::new(args.sample_rate, 16_384, format))?;
            info!(path = %path, format = ?format, "replaying recording");
            Receiver::builder()
                .config(config)
                .tuner(Arc::new(source))
                .audio_sink(sink)
                .on_rds(on_rds)
                .build()?
        }
        None => {
            let receiver = open_device(args.device_index, config, sink)?;
            receiver.subscribe(Some(Arc::new(on_rds)));
            receiver
        }
    };

    let receiver = Arc::new(receiver);
    receiver.start()?;

    if args.file.is_none() {
        let control = Arc::clone(&receiver);
        std::thread::Builder::new()
            .name("commands".to_string())
            .spawn(move || run_commands(control))
            .map_err(|e| Error::pipeline(format!("cannot read commands: {e}")))?;
    }

    receiver.wait()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frequency_suffixes() {
        assert_eq!("98.5M".parse::<Frequency>().unwrap(), Frequency(98_500_000.0));
        assert_eq!("875k".parse::<Frequency>().unwrap(), Frequency(875_000.0));
        assert_eq!("101100000".parse::<Frequency>().unwrap(), Frequency(101_100_000.0));
        assert!("abcM".parse::<Frequency>().is_err());
    }

    #[test]
    fn test_commands() {
        assert_eq!("q".parse::<Command>().unwrap(), Command::Quit);
        assert_eq!(
            "f 101.1M".parse::<Command>().unwrap(),
            Command::Frequency(101_100_000.0)
        );
        assert_eq!("g auto".parse::<Command>().unwrap(), Command::Gain(Gain::Auto));
        assert_eq!("g 28".parse::<Command>().unwrap(), Command::Gain(Gain::Manual(28.0)));
        assert_eq!("v 0.5".parse::<Command>().unwrap(), Command::Volume(0.5));
        assert!("v".parse::<Command>().is_err());
        assert!("x 1".parse::<Command>().is_err());
    }

    #[test]
    fn test_rds_event_json() {
        let value = RdsValue::Text("KROQ".to_string());
        let line = serde_json::to_string(&RdsEvent {
            field: RdsField::StationName,
            value: &value,
        })
        .unwrap();
        assert_eq!(line, r#"{"field":"station_name","value":"KROQ"}"#);
    }
}
