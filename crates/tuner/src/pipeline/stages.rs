//! Pipeline stages around the `fmtuner` DSP primitives.
//!
//! Each constructor designs its primitive for a given input rate and returns
//! a [`Block`] declaring that rate, so that [`PipelineBuilder::connect`]
//! rejects a stage fed at the wrong rate.
//!
//! [`PipelineBuilder::connect`]: super::PipelineBuilder::connect

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use fmtuner::dsp::agc::Agc;
use fmtuner::dsp::demod::WbfmDemod;
use fmtuner::dsp::digital::{self, BinarySlicer, DiffDecoder, KeepOneInN};
use fmtuner::dsp::filters::FirFilter;
use fmtuner::dsp::psk::{MpskParams, MpskReceiver, RDS_SYMBOL_RATE};
use fmtuner::dsp::resampler::{Frame, RationalResampler};
use fmtuner::dsp::xlating::FreqXlatingFir;
use fmtuner::dsp::Sample;
use num_complex::Complex;

use super::{Block, stage};
use crate::Result;
use crate::rds::decoder::RDS_BIT_RATE;
use crate::rds::parser::GROUP_RATE;
use crate::rds::{RdsDecoder, RdsFragment, RdsGroup, RdsParser};

/// Shared volume multiplier, updated in place while the pipeline runs.
#[derive(Debug, Clone)]
pub struct VolumeControl(Arc<AtomicU32>);

impl VolumeControl {
    pub fn new(volume: f32) -> Self {
        Self(Arc::new(AtomicU32::new(volume.to_bits())))
    }

    pub fn get(&self) -> f32 {
        f32::from_bits(self.0.load(Ordering::Relaxed))
    }

    pub fn set(&self, volume: f32) {
        self.0.store(volume.to_bits(), Ordering::Relaxed);
    }
}

/// Scales audio by the current [`VolumeControl`] value, read once per chunk.
pub struct Volume {
    control: VolumeControl,
    rate: f64,
}

impl Volume {
    pub fn new(control: VolumeControl, rate: f64) -> Self {
        Self { control, rate }
    }
}

impl Block for Volume {
    type Input = f32;
    type Output = f32;

    fn name(&self) -> &str {
        "volume"
    }

    fn input_rate(&self) -> f64 {
        self.rate
    }

    fn output_rate(&self) -> f64 {
        self.rate
    }

    fn work(&mut self, input: &[f32]) -> Vec<f32> {
        let gain = self.control.get();
        input.iter().map(|&x| x * gain).collect()
    }
}

pub fn rational_resampler<T: Frame>(
    name: &str,
    input_rate: f64,
    interpolation: usize,
    decimation: usize,
) -> Result<impl Block<Input = T, Output = T>> {
    let mut resampler = RationalResampler::<T>::new(interpolation, decimation)?;
    let output_rate = resampler.output_rate(input_rate);
    Ok(stage(name, input_rate, output_rate, move |x: &[T]| {
        resampler.process(x)
    }))
}

pub fn fir<T>(
    name: &str,
    input_rate: f64,
    taps: Vec<f32>,
    decimation: usize,
) -> Result<impl Block<Input = T, Output = T>>
where
    T: Sample + Send + 'static,
{
    let mut filter = FirFilter::<T>::new(taps, decimation)?;
    Ok(stage(
        name,
        input_rate,
        input_rate / decimation as f64,
        move |x: &[T]| filter.process(x),
    ))
}

pub fn xlating_fir<T>(
    name: &str,
    input_rate: f64,
    prototype: &[f32],
    decimation: usize,
    center_freq: f64,
) -> Result<impl Block<Input = T, Output = Complex<f32>>>
where
    T: Copy + Into<Complex<f32>> + Send + 'static,
{
    let mut filter = FreqXlatingFir::<T>::new(prototype, decimation, center_freq, input_rate)?;
    Ok(stage(
        name,
        input_rate,
        input_rate / decimation as f64,
        move |x: &[T]| filter.process(x),
    ))
}

pub fn wbfm_demod(
    name: &str,
    quad_rate: f64,
    audio_decimation: usize,
) -> Result<impl Block<Input = Complex<f32>, Output = f32>> {
    let mut demod = WbfmDemod::new(quad_rate, audio_decimation)?;
    Ok(stage(name, quad_rate, demod.audio_rate(), move |x: &[Complex<f32>]| {
        demod.process(x)
    }))
}

/// Gain control normalising the matched filter output for symbol recovery
pub fn agc(rate: f64, bandwidth: f32) -> impl Block<Input = Complex<f32>, Output = Complex<f32>> {
    let mut agc = Agc::new(bandwidth);
    stage("rds-agc", rate, rate, move |x: &[Complex<f32>]| agc.process(x))
}

/// BPSK symbol recovery at the RDS symbol rate
pub fn mpsk_receiver(
    name: &str,
    input_rate: f64,
) -> Result<impl Block<Input = Complex<f32>, Output = Complex<f32>>> {
    let mut receiver = MpskReceiver::new(MpskParams::rds(input_rate))?;
    Ok(stage(name, input_rate, RDS_SYMBOL_RATE, move |x: &[Complex<f32>]| {
        receiver.process(x)
    }))
}

pub fn complex_to_real(rate: f64) -> impl Block<Input = Complex<f32>, Output = f32> {
    stage("rds-complex-to-real", rate, rate, digital::complex_to_real)
}

pub fn binary_slicer(rate: f64) -> impl Block<Input = f32, Output = u8> {
    stage("rds-slicer", rate, rate, |x: &[f32]| BinarySlicer.process(x))
}

pub fn keep_one_in_n(rate: f64, n: usize) -> impl Block<Input = u8, Output = u8> {
    let mut keep = KeepOneInN::new(n);
    let output_rate = rate / keep.n() as f64;
    stage("rds-keep-one-in-n", rate, output_rate, move |x: &[u8]| keep.process(x))
}

pub fn diff_decoder(rate: f64, modulus: u8) -> impl Block<Input = u8, Output = u8> {
    let mut diff = DiffDecoder::new(modulus);
    stage("rds-diff-decoder", rate, rate, move |x: &[u8]| diff.process(x))
}

pub fn rds_decoder() -> impl Block<Input = u8, Output = RdsGroup> {
    let mut decoder = RdsDecoder::new();
    stage("rds-decoder", RDS_BIT_RATE, GROUP_RATE, move |bits: &[u8]| {
        decoder.process(bits)
    })
}

pub fn rds_parser() -> impl Block<Input = RdsGroup, Output = RdsFragment> {
    let mut parser = RdsParser::new();
    stage("rds-parser", GROUP_RATE, GROUP_RATE, move |groups: &[RdsGroup]| {
        parser.process(groups)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_volume_reads_control_per_chunk() {
        let control = VolumeControl::new(1.0);
        let mut volume = Volume::new(control.clone(), 48_000.0);
        assert_eq!(volume.work(&[0.5, -0.25]), vec![0.5, -0.25]);
        control.set(2.0);
        assert_eq!(volume.work(&[0.5, -0.25]), vec![1.0, -0.5]);
        control.set(0.0);
        assert_eq!(volume.work(&[0.5]), vec![0.0]);
    }

    #[test]
    fn test_declared_rates() {
        let resampler = rational_resampler::<f32>("r", 48_000.0 * 50.0 / 49.0, 49, 50).unwrap();
        assert_relative_eq!(resampler.output_rate(), 48_000.0, epsilon = 1e-6);

        let demod = wbfm_demod("d", 2_400_000.0, 4).unwrap();
        assert_relative_eq!(demod.input_rate(), 2_400_000.0);
        assert_relative_eq!(demod.output_rate(), 600_000.0);

        assert_relative_eq!(keep_one_in_n(2375.0, 2).output_rate(), RDS_BIT_RATE);
        assert_relative_eq!(rds_decoder().input_rate(), RDS_BIT_RATE);
    }

    #[test]
    fn test_agc_stage_normalises() {
        let mut agc = agc(120_000.0, 1e-2);
        assert_relative_eq!(agc.output_rate(), 120_000.0);
        let out = agc.work(&vec![Complex::new(0.0, 25.0); 4_000]);
        assert_relative_eq!(out[3_999].norm(), 1.0, epsilon = 0.05);
    }

    #[test]
    fn test_bit_stages_chain() {
        let mut to_real = complex_to_real(2375.0);
        let mut slicer = binary_slicer(2375.0);
        let mut keep = keep_one_in_n(2375.0, 2);
        let mut diff = diff_decoder(RDS_BIT_RATE, 2);

        let symbols: Vec<Complex<f32>> = [1.0, 1.0, -1.0, -1.0, -1.0, -1.0, 1.0, 1.0]
            .iter()
            .map(|&re| Complex::new(re, 0.3))
            .collect();
        let bits = slicer.work(&to_real.work(&symbols));
        assert_eq!(bits, vec![1, 1, 0, 0, 0, 0, 1, 1]);
        let kept = keep.work(&bits);
        assert_eq!(kept, vec![1, 0, 0, 1]);
        assert_eq!(diff.work(&kept), vec![1, 1, 0, 1]);
    }
}
