//! Spectrogram columns from PCM.
//!
//! One column per analysis window: periodic Hann window, real FFT, bin
//! magnitude in q15, then quantized to the signed byte the telemetry
//! frames carry:
//!
//! ```text
//! out[j] = sat_i8(mag_q15[j] / divider + round(zero_point))
//! ```
//!
//! Windows advance by `hop_size` samples; each new column is appended to a
//! frame-major spectrogram with [`crate::telemetry::append_frame`].

use std::f32::consts::PI;
use std::fmt;
use std::sync::Arc;

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};

use crate::error::AudioError;
use crate::telemetry::{append_frame, N_BINS};

pub const FFT_SIZE: usize = 256;
pub const HOP_SIZE: usize = 80;
/// Quantization that maps silence to -128 and a full-scale bin to 127.
pub const DEFAULT_DIVIDER: i32 = 64;
pub const DEFAULT_ZERO_POINT: f32 = -128.0;

/// Signed q15 sample from unsigned 8-bit PCM (128 is zero).
#[inline]
pub fn pcm_to_q15(sample: u8) -> i16 {
    (sample as i16 - 128) << 8
}

/// Quantize one q15 magnitude.
///
/// Integer division truncates toward zero; a zero divider leaves the
/// magnitude unscaled. The zero point rounds half away from zero.
#[inline]
pub fn scale_bin(mag_q15: i16, divider: i32, zero_point: f32) -> i8 {
    let mag = mag_q15 as i32;
    let scaled = if divider != 0 { mag / divider } else { mag };
    let value = scaled.saturating_add(zero_point.round() as i32);
    value.clamp(i8::MIN as i32, i8::MAX as i32) as i8
}

/// Windowed real-FFT front end.
pub struct SpectrumPipeline {
    fft_size: usize,
    hop_size: usize,
    n_bins: usize,
    time_frames: usize,
    window: Vec<f32>,
    plan: Arc<dyn RealToComplex<f32>>,
    input: Vec<f32>,
    spectrum: Vec<Complex32>,
    scratch: Vec<Complex32>,
}

impl SpectrumPipeline {
    /// Plan the FFT and build the window.
    ///
    /// All sizes must be positive and `n_bins` cannot exceed the
    /// `fft_size / 2 + 1` bins a real FFT produces.
    pub fn new(fft_size: usize, hop_size: usize, n_bins: usize, time_frames: usize) -> Result<Self, AudioError> {
        if fft_size == 0 || hop_size == 0 || n_bins == 0 || time_frames == 0 {
            return Err(AudioError::InvalidParameter("spectrum sizes must be positive"));
        }
        if n_bins > fft_size / 2 + 1 {
            return Err(AudioError::InvalidParameter("more bins than the FFT produces"));
        }

        let plan = RealFftPlanner::<f32>::new().plan_fft_forward(fft_size);
        let window = (0..fft_size)
            .map(|i| 0.5 * (1.0 - (2.0 * PI * i as f32 / fft_size as f32).cos()))
            .collect();

        Ok(Self {
            fft_size,
            hop_size,
            n_bins,
            time_frames,
            window,
            input: plan.make_input_vec(),
            spectrum: plan.make_output_vec(),
            scratch: plan.make_scratch_vec(),
            plan,
        })
    }

    pub fn fft_size(&self) -> usize {
        self.fft_size
    }

    pub fn hop_size(&self) -> usize {
        self.hop_size
    }

    pub fn n_bins(&self) -> usize {
        self.n_bins
    }

    pub fn time_frames(&self) -> usize {
        self.time_frames
    }

    /// Bins produced by the real FFT.
    pub fn fft_bins(&self) -> usize {
        self.fft_size / 2 + 1
    }

    /// One column from the first `fft_size` samples of `input`.
    ///
    /// Writes `min(out.len(), n_bins)` values and zeroes the rest of `out`.
    pub fn calculate(
        &mut self,
        input: &[i16],
        out: &mut [i8],
        divider: i32,
        zero_point: f32,
    ) -> Result<(), AudioError> {
        let Some(frame) = input.get(..self.fft_size) else {
            return Err(AudioError::InvalidParameter("input shorter than the FFT size"));
        };

        for ((dst, &x), &w) in self.input.iter_mut().zip(frame).zip(&self.window) {
            *dst = x as f32 / 32768.0 * w;
        }
        self.plan
            .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)
            .map_err(|_| AudioError::InvalidParameter("FFT buffer length"))?;

        let written = out.len().min(self.n_bins);
        let norm = 32768.0 / self.fft_size as f32;
        for (dst, bin) in out[..written].iter_mut().zip(&self.spectrum) {
            let mag = (bin.norm() * norm).min(i16::MAX as f32) as i16;
            *dst = scale_bin(mag, divider, zero_point);
        }
        out[written..].fill(0);
        Ok(())
    }

    /// Append one column per full window in `input`, stepping by
    /// `hop_size`. Returns the number of columns appended.
    pub fn append_columns(
        &mut self,
        input: &[i16],
        spectrogram: &mut [u8],
        divider: i32,
        zero_point: f32,
    ) -> Result<usize, AudioError> {
        if spectrogram.len() < N_BINS * self.time_frames {
            return Err(AudioError::InvalidParameter("spectrogram smaller than its time frames"));
        }

        let mut column = [0i8; N_BINS];
        let mut start = 0;
        let mut appended = 0;
        while start + self.fft_size <= input.len() {
            self.calculate(&input[start..], &mut column, divider, zero_point)?;
            append_frame(&mut spectrogram[..N_BINS * self.time_frames], &column);
            start += self.hop_size;
            appended += 1;
        }
        Ok(appended)
    }
}

impl fmt::Debug for SpectrumPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumPipeline")
            .field("fft_size", &self.fft_size)
            .field("hop_size", &self.hop_size)
            .field("n_bins", &self.n_bins)
            .field("time_frames", &self.time_frames)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pcm_to_q15() {
        assert_eq!(pcm_to_q15(128), 0);
        assert_eq!(pcm_to_q15(0), -32768);
        assert_eq!(pcm_to_q15(255), 127 << 8);
    }

    #[test]
    fn test_window_is_periodic_hann() {
        let pipeline = SpectrumPipeline::new(8, 1, 5, 1).unwrap();
        assert_eq!(pipeline.window[0], 0.0);
        assert!((pipeline.window[4] - 1.0).abs() < 1e-6);
        assert!((pipeline.window[2] - 0.5).abs() < 1e-6);
    }
}
