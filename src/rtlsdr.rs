//! RTL-SDR I/Q Data Source Module
//! (requires the `rtlsdr` feature)
//!
//! The device is owned by a dedicated reader thread. Samples flow out through
//! a bounded channel; retune and gain requests flow in through a command
//! channel and are applied between two USB transfers, each one acknowledged
//! with the device's result. While the sample channel is full the reader
//! keeps serving commands, so a retune never waits on the consumer.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread::JoinHandle;
use std::time::Duration;

use crossbeam::channel::{self, Receiver, SendTimeoutError, Sender};
use num_complex::Complex;
use rtl_sdr_rs::{DEFAULT_BUF_LENGTH, RtlSdr, TunerGain};
use tracing::{debug, info, trace, warn};

use crate::{Error, Gain, IqFormat, Result, Tuner};

// WORKAROUND: Temporary device enumeration until rtl-sdr-rs exposes descriptors
mod device_workaround {
    use rusb::{Context, DeviceDescriptor, UsbContext};

    const KNOWN_DEVICES: &[(u16, u16)] = &[
        (0x0bda, 0x2832), // Realtek RTL2832U
        (0x0bda, 0x2838), // Realtek RTL2838
    ];

    fn is_known_device(vid: u16, pid: u16) -> bool {
        KNOWN_DEVICES.iter().any(|&(v, p)| v == vid && p == pid)
    }

    pub fn enumerate() -> Result<Vec<super::RtlSdrDeviceInfo>, rusb::Error> {
        let context = Context::new()?;
        let mut found = Vec::new();

        for device in context.devices()?.iter() {
            let desc: DeviceDescriptor = match device.device_descriptor() {
                Ok(d) => d,
                Err(_) => continue,
            };
            if !is_known_device(desc.vendor_id(), desc.product_id()) {
                continue;
            }
            let index = found.len();
            let fallback = super::RtlSdrDeviceInfo {
                index,
                manufacturer: format!("VID:{:04x}", desc.vendor_id()),
                product: format!("PID:{:04x}", desc.product_id()),
                serial: format!("Unknown-{index}"),
            };
            // Permission problems still leave the device listed
            let Ok(handle) = device.open() else {
                found.push(fallback);
                continue;
            };
            let read = |idx: Option<u8>| {
                idx.and_then(|i| handle.read_string_descriptor_ascii(i).ok())
            };
            let manufacturer = read(desc.manufacturer_string_index());
            found.push(super::RtlSdrDeviceInfo {
                index,
                manufacturer: manufacturer.unwrap_or(fallback.manufacturer),
                product: read(desc.product_string_index()).unwrap_or(fallback.product),
                serial: read(desc.serial_number_string_index()).unwrap_or(fallback.serial),
            });
        }
        Ok(found)
    }
}
// END WORKAROUND

/// Device information for RTL-SDR devices
#[derive(Debug, Clone, PartialEq)]
pub struct RtlSdrDeviceInfo {
    pub index: usize,
    pub manufacturer: String,
    pub product: String,
    pub serial: String,
}

/// List all attached RTL-SDR devices
///
/// ```no_run
/// for dev in fmtuner::rtlsdr::list_devices()? {
///     println!("[{}] {}, {}, SN: {}", dev.index, dev.manufacturer, dev.product, dev.serial);
/// }
/// # Ok::<(), fmtuner::Error>(())
/// ```
pub fn list_devices() -> Result<Vec<RtlSdrDeviceInfo>> {
    device_workaround::enumerate()
        .map_err(|e| Error::device(format!("Failed to enumerate devices: {e}")))
}

/// How often a reader blocked on a full sample channel looks for commands
const COMMAND_POLL: Duration = Duration::from_millis(20);

/// Longest wait for the reader to acknowledge a command
const ACK_TIMEOUT: Duration = Duration::from_secs(5);

enum Command {
    CenterFreq(u32, Sender<Result<()>>),
    Gain(Gain, Sender<Result<()>>),
}

fn apply_command(rtl: &mut RtlSdr, command: Command) {
    match command {
        Command::CenterFreq(freq, ack) => {
            debug!(freq, "retuning");
            let res = rtl.set_center_freq(freq).map_err(Error::from);
            let _ = ack.send(res);
        }
        Command::Gain(gain, ack) => {
            debug!(%gain, "changing gain");
            let _ = ack.send(apply_gain(rtl, gain));
        }
    }
}

/// Hand `item` to `tx`, applying pending commands until there is room.
///
/// Returns `false` when the receiving end is gone or `running` was cleared
/// while waiting.
fn deliver<T, C>(
    tx: &Sender<T>,
    mut item: T,
    commands: &Receiver<C>,
    running: &AtomicBool,
    mut apply: impl FnMut(C),
) -> bool {
    loop {
        for command in commands.try_iter() {
            apply(command);
        }
        match tx.send_timeout(item, COMMAND_POLL) {
            Ok(()) => return true,
            Err(SendTimeoutError::Disconnected(_)) => return false,
            Err(SendTimeoutError::Timeout(back)) => {
                if !running.load(Ordering::Relaxed) {
                    return false;
                }
                trace!("sample channel full");
                item = back;
            }
        }
    }
}

fn apply_gain(rtl: &mut RtlSdr, gain: Gain) -> Result<()> {
    match gain {
        // rtl-sdr counts gain in tenths of dB
        Gain::Manual(db) => rtl.set_tuner_gain(TunerGain::Manual((db * 10.0).round() as i32))?,
        Gain::Auto => rtl.set_tuner_gain(TunerGain::Auto)?,
    };
    Ok(())
}

/**
 * RTL-SDR tuner driven from a reader thread
 */
pub struct RtlSdrTuner {
    sample_rate: u32,
    samples: Receiver<Result<Vec<Complex<f32>>>>,
    commands: Sender<Command>,
    running: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl RtlSdrTuner {
    /// Open device `index` at `sample_rate`.
    ///
    /// Fails with [`Error::NoDeviceFound`] when no device is attached or the
    /// index is out of range.
    pub fn open(index: usize, sample_rate: u32) -> Result<Self> {
        let devices = list_devices()?;
        if index >= devices.len() {
            return Err(Error::NoDeviceFound);
        }
        info!(
            index,
            manufacturer = %devices[index].manufacturer,
            product = %devices[index].product,
            "opening RTL-SDR device"
        );

        let (tx, samples) = channel::bounded(32);
        let (commands, rx_cmd) = channel::unbounded::<Command>();
        let (tx_init, rx_init) = channel::bounded::<Result<()>>(1);
        let running = Arc::new(AtomicBool::new(true));
        let keep_running = Arc::clone(&running);

        let handle = std::thread::Builder::new()
            .name("rtlsdr-reader".into())
            .spawn(move || {
                let init = (|| -> Result<RtlSdr> {
                    let mut rtl = RtlSdr::open_with_index(index)?;
                    rtl.set_sample_rate(sample_rate)?;
                    rtl.reset_buffer()?;
                    Ok(rtl)
                })();
                let mut rtl = match init {
                    Ok(rtl) => {
                        let _ = tx_init.send(Ok(()));
                        rtl
                    }
                    Err(e) => {
                        let _ = tx_init.send(Err(e));
                        return;
                    }
                };

                let mut buffer = vec![0u8; DEFAULT_BUF_LENGTH];
                while keep_running.load(Ordering::Relaxed) {
                    for command in rx_cmd.try_iter() {
                        apply_command(&mut rtl, command);
                    }
                    match rtl.read_sync(&mut buffer) {
                        Ok(0) => return,
                        Ok(n) => {
                            let chunk =
                                crate::convert_bytes_to_complex(IqFormat::Cu8, &buffer[..n]);
                            let sent = deliver(&tx, Ok(chunk), &rx_cmd, &keep_running, |c| {
                                apply_command(&mut rtl, c)
                            });
                            if !sent {
                                return;
                            }
                        }
                        Err(e) => {
                            warn!(error = %e, "RTL-SDR transfer failed");
                            deliver(&tx, Err(e.into()), &rx_cmd, &keep_running, |c| {
                                apply_command(&mut rtl, c)
                            });
                            return;
                        }
                    }
                }
            })?;

        match rx_init.recv() {
            Ok(Ok(())) => Ok(Self {
                sample_rate,
                samples,
                commands,
                running,
                handle: Some(handle),
            }),
            Ok(Err(e)) => Err(e),
            Err(_) => Err(Error::device("Failed to initialize RTL-SDR device")),
        }
    }

    fn request(&self, make: impl FnOnce(Sender<Result<()>>) -> Command) -> Result<()> {
        let (ack, done) = channel::bounded(1);
        self.commands
            .send(make(ack))
            .map_err(|_| Error::device("RTL-SDR reader thread has stopped"))?;
        match done.recv_timeout(ACK_TIMEOUT) {
            Ok(result) => result,
            Err(channel::RecvTimeoutError::Timeout) => {
                Err(Error::device("RTL-SDR did not acknowledge the request in time"))
            }
            Err(channel::RecvTimeoutError::Disconnected) => {
                Err(Error::device("RTL-SDR reader thread has stopped"))
            }
        }
    }
}

impl Tuner for RtlSdrTuner {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn set_center_freq(&self, freq_hz: u32) -> Result<()> {
        self.request(|ack| Command::CenterFreq(freq_hz, ack))
    }

    fn set_gain(&self, gain: Gain) -> Result<()> {
        self.request(|ack| Command::Gain(gain, ack))
    }

    fn read(&self) -> Option<Result<Vec<Complex<f32>>>> {
        self.samples.recv().ok()
    }
}

impl Drop for RtlSdrTuner {
    fn drop(&mut self) {
        self.running.store(false, Ordering::Relaxed);
        // Unblock a reader stuck on a full channel
        while self.samples.try_recv().is_ok() {}
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
