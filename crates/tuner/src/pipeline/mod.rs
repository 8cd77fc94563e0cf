//! Thread-per-stage streaming pipeline.
//!
//! A [`PipelineBuilder`] wires stages together through typed [`Port`]s. Each
//! port is the receiving end of a bounded `crossbeam` channel of sample
//! chunks, tagged with the sample rate flowing through it. Connecting a
//! [`Block`] checks that rate against the one the block was designed for,
//! so a misconfigured graph fails before any thread is started.
//!
//! ```
//! use tuner::pipeline::{PipelineBuilder, stage};
//!
//! let mut builder = PipelineBuilder::new(4);
//! let mut chunks = vec![vec![1.0f32, 2.0], vec![3.0]].into_iter();
//! let source = builder.source("numbers", 10.0, move || chunks.next().map(Ok));
//! let double = stage("double", 10.0, 10.0, |x: &[f32]| {
//!     x.iter().map(|v| v * 2.0).collect::<Vec<f32>>()
//! });
//! let doubled = builder.connect(source, double).unwrap();
//! let (tx, rx) = crossbeam::channel::unbounded();
//! builder.sink("collect", doubled, move |chunk: Vec<f32>| Ok(tx.send(chunk).is_ok()));
//!
//! let pipeline = builder.build();
//! pipeline.start().unwrap();
//! pipeline.wait().unwrap();
//! assert_eq!(rx.iter().flatten().collect::<Vec<_>>(), vec![2.0, 4.0, 6.0]);
//! ```

pub mod stages;

use std::marker::PhantomData;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::JoinHandle;

use crossbeam::channel::{self, Receiver, Sender};
use tracing::{debug, error, trace};

use crate::{Error, Result};

/// Relative tolerance when comparing junction rates
const RATE_TOLERANCE: f64 = 1e-9;

/**
 * A processing stage
 *
 * A block consumes chunks of `Input` at `input_rate()` and produces chunks
 * of `Output` at `output_rate()`. Both rates are fixed when the block is
 * built.
 */
pub trait Block: Send + 'static {
    type Input: Send + 'static;
    type Output: Send + 'static;

    fn name(&self) -> &str;

    /// Rate the block was designed for, in items per second
    fn input_rate(&self) -> f64;

    fn output_rate(&self) -> f64;

    fn work(&mut self, input: &[Self::Input]) -> Vec<Self::Output>;
}

/// A [`Block`] around a closure
pub struct FnBlock<I, O, F> {
    name: String,
    input_rate: f64,
    output_rate: f64,
    f: F,
    _types: PhantomData<fn(I) -> O>,
}

/// Build a [`Block`] from a closure and its rates.
pub fn stage<I, O, F>(
    name: impl Into<String>,
    input_rate: f64,
    output_rate: f64,
    f: F,
) -> FnBlock<I, O, F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: FnMut(&[I]) -> Vec<O> + Send + 'static,
{
    FnBlock {
        name: name.into(),
        input_rate,
        output_rate,
        f,
        _types: PhantomData,
    }
}

impl<I, O, F> Block for FnBlock<I, O, F>
where
    I: Send + 'static,
    O: Send + 'static,
    F: FnMut(&[I]) -> Vec<O> + Send + 'static,
{
    type Input = I;
    type Output = O;

    fn name(&self) -> &str {
        &self.name
    }

    fn input_rate(&self) -> f64 {
        self.input_rate
    }

    fn output_rate(&self) -> f64 {
        self.output_rate
    }

    fn work(&mut self, input: &[I]) -> Vec<O> {
        (self.f)(input)
    }
}

/// Output of a stage, waiting to be connected
pub struct Port<T> {
    rx: Receiver<Vec<T>>,
    rate: f64,
}

impl<T> Port<T> {
    pub fn rate(&self) -> f64 {
        self.rate
    }
}

type Work = Box<dyn FnOnce() -> Result<()> + Send>;

struct Worker {
    name: String,
    work: Work,
}

/// Assembles a [`Pipeline`]; nothing runs until [`Pipeline::start`].
pub struct PipelineBuilder {
    depth: usize,
    stopped: Arc<AtomicBool>,
    workers: Vec<Worker>,
}

impl PipelineBuilder {
    /// `depth` is the capacity, in chunks, of every inter-stage channel.
    pub fn new(depth: usize) -> Self {
        Self {
            depth: depth.max(1),
            stopped: Arc::new(AtomicBool::new(false)),
            workers: Vec::new(),
        }
    }

    fn channel<T>(&self) -> (Sender<Vec<T>>, Receiver<Vec<T>>) {
        channel::bounded(self.depth)
    }

    fn spawn_later(
        &mut self,
        name: impl Into<String>,
        work: impl FnOnce() -> Result<()> + Send + 'static,
    ) {
        self.workers.push(Worker {
            name: name.into(),
            work: Box::new(work),
        });
    }

    /// Add a source polled until it returns `None` or the pipeline stops.
    pub fn source<T, F>(&mut self, name: &str, rate: f64, mut read: F) -> Port<T>
    where
        T: Send + 'static,
        F: FnMut() -> Option<Result<Vec<T>>> + Send + 'static,
    {
        let (tx, rx) = self.channel();
        let stopped = Arc::clone(&self.stopped);
        let label = name.to_string();
        self.spawn_later(name, move || {
            while !stopped.load(Ordering::Relaxed) {
                match read() {
                    None => {
                        debug!(stage = %label, "end of stream");
                        break;
                    }
                    Some(Err(e)) => return Err(e),
                    Some(Ok(chunk)) => {
                        if tx.send(chunk).is_err() {
                            break;
                        }
                    }
                }
            }
            Ok(())
        });
        Port { rx, rate }
    }

    /// Attach `block` to `input`.
    ///
    /// Fails with [`Error::Connect`] when the port rate differs from the
    /// rate the block was designed for.
    pub fn connect<B: Block>(
        &mut self,
        input: Port<B::Input>,
        mut block: B,
    ) -> Result<Port<B::Output>> {
        let expected = block.input_rate();
        if (expected - input.rate).abs() > RATE_TOLERANCE * expected.abs().max(1.0) {
            return Err(Error::Connect {
                stage: block.name().to_string(),
                expected,
                found: input.rate,
            });
        }
        trace!(stage = block.name(), rate = input.rate, "stage connected");

        let (tx, rx) = self.channel();
        let rate = block.output_rate();
        let stopped = Arc::clone(&self.stopped);
        let name = block.name().to_string();
        self.spawn_later(name, move || {
            for chunk in input.rx.iter() {
                if stopped.load(Ordering::Relaxed) {
                    continue;
                }
                let out = block.work(&chunk);
                if !out.is_empty() && tx.send(out).is_err() {
                    break;
                }
            }
            Ok(())
        });
        Ok(Port { rx, rate })
    }

    /// Duplicate a stream; it keeps flowing as long as one branch is alive.
    pub fn tee<T: Clone + Send + 'static>(
        &mut self,
        name: &str,
        input: Port<T>,
    ) -> (Port<T>, Port<T>) {
        let rate = input.rate;
        let (tx_a, rx_a) = self.channel();
        let (tx_b, rx_b) = self.channel();
        let stopped = Arc::clone(&self.stopped);
        self.spawn_later(name, move || {
            let mut outputs = vec![Some(tx_a), Some(tx_b)];
            for chunk in input.rx.iter() {
                if stopped.load(Ordering::Relaxed) {
                    continue;
                }
                for slot in outputs.iter_mut() {
                    let closed = slot
                        .as_ref()
                        .is_some_and(|tx| tx.send(chunk.clone()).is_err());
                    if closed {
                        *slot = None;
                    }
                }
                if outputs.iter().all(Option::is_none) {
                    break;
                }
            }
            Ok(())
        });
        (Port { rx: rx_a, rate }, Port { rx: rx_b, rate })
    }

    /// Terminate a stream. `consume` returns `Ok(false)` to close the sink.
    pub fn sink<T, F>(&mut self, name: &str, input: Port<T>, mut consume: F)
    where
        T: Send + 'static,
        F: FnMut(Vec<T>) -> Result<bool> + Send + 'static,
    {
        let stopped = Arc::clone(&self.stopped);
        self.spawn_later(name, move || {
            for chunk in input.rx.iter() {
                if stopped.load(Ordering::Relaxed) {
                    continue;
                }
                if !consume(chunk)? {
                    break;
                }
            }
            Ok(())
        });
    }

    pub fn build(self) -> Pipeline {
        Pipeline {
            stopped: self.stopped,
            pending: Mutex::new(Some(self.workers)),
            running: Mutex::new(Vec::new()),
        }
    }
}

/// A built graph of stages, each on its own thread once started.
pub struct Pipeline {
    stopped: Arc<AtomicBool>,
    pending: Mutex<Option<Vec<Worker>>>,
    running: Mutex<Vec<(String, JoinHandle<Result<()>>)>>,
}

impl Pipeline {
    /// Spawn every stage. A pipeline starts at most once.
    pub fn start(&self) -> Result<()> {
        if self.stopped.load(Ordering::Relaxed) {
            return Err(Error::pipeline("cannot start a stopped pipeline"));
        }
        let workers = self
            .pending
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
            .ok_or_else(|| Error::pipeline("pipeline already started"))?;

        let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
        for Worker { name, work } in workers {
            let handle = std::thread::Builder::new()
                .name(name.clone())
                .spawn(work)
                .map_err(|e| Error::pipeline(format!("failed to spawn stage '{name}': {e}")))?;
            running.push((name, handle));
        }
        debug!(stages = running.len(), "pipeline started");
        Ok(())
    }

    /// Ask every stage to stop; in-flight chunks are discarded.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Relaxed);
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Relaxed)
    }

    /// Join every stage and return the first error raised by one of them.
    pub fn wait(&self) -> Result<()> {
        let handles = {
            let mut running = self.running.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::take(&mut *running)
        };
        let mut first = None;
        for (name, handle) in handles {
            let result = handle
                .join()
                .unwrap_or_else(|_| Err(Error::pipeline(format!("stage '{name}' panicked"))));
            if let Err(e) = result {
                error!(stage = %name, error = %e, "stage failed");
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counter(n: usize) -> impl FnMut() -> Option<Result<Vec<u32>>> + Send + 'static {
        let mut sent = 0;
        move || {
            (sent < n).then(|| {
                sent += 1;
                Ok(vec![sent as u32; 10])
            })
        }
    }

    #[test]
    fn test_rate_mismatch_fails_connect() {
        let mut builder = PipelineBuilder::new(2);
        let source = builder.source("source", 1000.0, counter(1));
        let block = stage("half", 500.0, 250.0, |x: &[u32]| x.to_vec());
        let err = builder.connect(source, block).err().unwrap();
        match err {
            Error::Connect {
                stage,
                expected,
                found,
            } => {
                assert_eq!(stage, "half");
                assert_eq!(expected, 500.0);
                assert_eq!(found, 1000.0);
            }
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn test_output_rate_propagates() {
        let mut builder = PipelineBuilder::new(2);
        let source = builder.source("source", 1000.0, counter(1));
        let port = builder
            .connect(source, stage("decimate", 1000.0, 100.0, |x: &[u32]| x.to_vec()))
            .unwrap();
        assert_eq!(port.rate(), 100.0);
    }

    #[test]
    fn test_tee_feeds_both_branches() {
        let mut builder = PipelineBuilder::new(2);
        let source = builder.source("source", 1.0, counter(5));
        let (a, b) = builder.tee("tee", source);
        let (tx_a, rx_a) = channel::unbounded();
        let (tx_b, rx_b) = channel::unbounded();
        builder.sink("a", a, move |chunk| Ok(tx_a.send(chunk.len()).is_ok()));
        builder.sink("b", b, move |chunk| Ok(tx_b.send(chunk.len()).is_ok()));

        let pipeline = builder.build();
        pipeline.start().unwrap();
        pipeline.wait().unwrap();
        assert_eq!(rx_a.iter().sum::<usize>(), 50);
        assert_eq!(rx_b.iter().sum::<usize>(), 50);
    }

    #[test]
    fn test_closed_branch_does_not_stall_the_other() {
        let mut builder = PipelineBuilder::new(1);
        let source = builder.source("source", 1.0, counter(20));
        let (a, b) = builder.tee("tee", source);
        builder.sink("closing", a, |_: Vec<u32>| Ok(false));
        let (tx, rx) = channel::unbounded();
        builder.sink("counting", b, move |chunk| Ok(tx.send(chunk.len()).is_ok()));

        let pipeline = builder.build();
        pipeline.start().unwrap();
        pipeline.wait().unwrap();
        assert_eq!(rx.iter().sum::<usize>(), 200);
    }

    #[test]
    fn test_first_error_is_returned() {
        let mut builder = PipelineBuilder::new(2);
        let source = builder.source("source", 1.0, counter(3));
        builder.sink("failing", source, |_: Vec<u32>| Err(Error::pipeline("boom")));

        let pipeline = builder.build();
        pipeline.start().unwrap();
        let err = pipeline.wait().unwrap_err();
        assert_eq!(err.to_string(), "Pipeline error: boom");
    }

    #[test]
    fn test_start_twice_and_after_stop() {
        let mut builder = PipelineBuilder::new(2);
        let source = builder.source("source", 1.0, counter(1));
        builder.sink("drop", source, |_: Vec<u32>| Ok(true));
        let pipeline = builder.build();
        pipeline.start().unwrap();
        assert!(pipeline.start().is_err());
        pipeline.wait().unwrap();

        let builder = PipelineBuilder::new(2);
        let pipeline = builder.build();
        pipeline.stop();
        assert!(matches!(pipeline.start(), Err(Error::Pipeline(_))));
    }

    #[test]
    fn test_stop_ends_endless_source() {
        let mut builder = PipelineBuilder::new(2);
        let source = builder.source("endless", 1.0, || Some(Ok(vec![0u8; 64])));
        builder.sink("drop", source, |_: Vec<u8>| Ok(true));
        let pipeline = builder.build();
        pipeline.start().unwrap();
        std::thread::sleep(std::time::Duration::from_millis(20));
        pipeline.stop();
        pipeline.wait().unwrap();
    }
}
