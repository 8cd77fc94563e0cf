//! FM broadcast receiver with RDS metadata.
//!
//! A [`Receiver`] pulls I/Q samples from a [`fmtuner::Tuner`] and runs two
//! demodulation paths in parallel: wideband FM audio towards an
//! [`sink::AudioSink`], and the 57 kHz RDS subcarrier down to an
//! [`rds::RdsAdapter`] caching the station metadata.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use fmtuner::iqread::{IqConfig, IqFileTuner};
//! use fmtuner::IqFormat;
//! use tuner::rds::{RdsField, RdsValue};
//! use tuner::{Receiver, ReceiverConfig};
//!
//! let source = IqFileTuner::open("capture.cu8", IqConfig::new(2_400_000, 16_384, IqFormat::Cu8))?;
//! let receiver = Receiver::builder()
//!     .config(ReceiverConfig::default())
//!     .tuner(Arc::new(source))
//!     .on_rds(|field: RdsField, value: &RdsValue| println!("{field}: {value}"))
//!     .build()?;
//! receiver.start()?;
//! receiver.wait()?;
//! # Ok::<(), tuner::Error>(())
//! ```

pub mod config;
pub mod error;
pub mod pipeline;
pub mod rds;
pub mod receiver;
pub mod sink;

pub use config::ReceiverConfig;
pub use error::{Error, Result};
pub use fmtuner::Gain;
pub use receiver::{Receiver, ReceiverBuilder};
