//! Record and play sessions.
//!
//! Sequencing around the engines: boot grace, countdown, capture,
//! smoothing, storage, and the playback supervision loop. All progress is
//! reported through a foreground log ring.

use core::cell::RefCell;
use core::sync::atomic::AtomicBool;
use std::path::Path;

use crate::audio::{
    capture::{CaptureEngine, CaptureReport},
    filter::smooth,
    level::{measure, Level},
    playback::{supervise, PlaybackEngine, PlaybackState},
    wav,
};
use crate::config::AudioConfig;
use crate::error::AudioError;
use crate::hal::{period_us, DelayNs, MonotonicClock, PwmOutput, SampleAdc, SampleTimer};
use crate::logging::LogRing;
use crate::{rt_error, rt_info, rt_warn};

/// Result of [`Session::record`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordReport {
    pub capture: CaptureReport,
    /// Level of the smoothed samples
    pub level: Level,
    /// Size of the written file
    pub file_bytes: u64,
}

/// Foreground session runner.
pub struct Session<'a, C: MonotonicClock, D: DelayNs> {
    config: &'a AudioConfig,
    clock: C,
    delay: D,
    log: &'a LogRing,
}

impl<'a, C: MonotonicClock, D: DelayNs> Session<'a, C, D> {
    pub fn new(config: &'a AudioConfig, clock: C, delay: D, log: &'a LogRing) -> Self {
        Self {
            config,
            clock,
            delay,
            log,
        }
    }

    pub fn config(&self) -> &'a AudioConfig {
        self.config
    }

    /// Fixed wait after power-up before touching the audio hardware.
    pub fn boot_grace(&mut self) {
        rt_info!(self.log, self.clock.now(), "Waiting {} ms before start", self.config.boot_delay_ms);
        self.delay.delay_ms(self.config.boot_delay_ms);
    }

    /// Announce the recording, then "Ready in 1...", "Ready in 2..." and
    /// so on once per second, then "Go!".
    pub fn countdown(&mut self) {
        countdown(self.log, &self.clock, &mut self.delay, self.config);
    }

    /// Count down, capture, smooth and store one recording at `path`.
    pub fn record<A: SampleAdc>(&mut self, adc: A, path: impl AsRef<Path>) -> Result<RecordReport, AudioError> {
        let path = path.as_ref();
        let mut engine = CaptureEngine::new(&self.clock, adc, self.config.sample_rate)?;
        let count = engine.sample_count(self.config.record_secs)?;

        countdown(self.log, &self.clock, &mut self.delay, self.config);

        let (mut pcm, capture) = match engine.capture(self.config.record_secs) {
            Ok(result) => result,
            Err(e) => {
                rt_error!(self.log, self.clock.now(), "Capture failed: {}", e);
                return Err(e);
            }
        };
        rt_info!(self.log, self.clock.now(), "Recording done.");
        rt_info!(
            self.log,
            self.clock.now(),
            "Captured {} samples in {} us",
            count,
            capture.elapsed_us
        );
        if capture.late_samples > 0 {
            rt_warn!(
                self.log,
                self.clock.now(),
                "{} late samples, worst {} us",
                capture.late_samples,
                capture.max_lateness_us
            );
        }

        smooth(&mut pcm, self.config.alpha)?;
        rt_info!(self.log, self.clock.now(), "Filtering done.");
        let level = measure(&pcm);
        rt_info!(
            self.log,
            self.clock.now(),
            "Level: peak {} bias {}",
            level.peak,
            level.bias()
        );

        let file_bytes = wav::write_wav(path, &pcm, self.config.sample_rate)?;
        rt_info!(self.log, self.clock.now(), "Saved {} bytes", file_bytes);

        Ok(RecordReport {
            capture,
            level,
            file_bytes,
        })
    }

    /// Read the file to play. Returns the samples and their rate.
    pub fn load_playback(&mut self, path: impl AsRef<Path>) -> Result<(Vec<u8>, u32), AudioError> {
        match wav::read_wav(path) {
            Ok((pcm, rate)) => {
                rt_info!(self.log, self.clock.now(), "Loaded WAV: {} Hz, {} bytes", rate, pcm.len());
                Ok((pcm, rate))
            }
            Err(e) => {
                rt_error!(self.log, self.clock.now(), "Load failed: {}", e);
                Err(e)
            }
        }
    }

    /// Play `pcm` with ticks driven from the supervising loop.
    ///
    /// Each loop iteration runs one tick and then waits one sample period
    /// on the session's delay; for hosts without a timer interrupt.
    pub fn play_inline<'p, P: PwmOutput, T: SampleTimer>(
        &mut self,
        engine: &mut PlaybackEngine<'p, P, T>,
        pcm: &'p [u8],
        sample_rate: u32,
        cancel: &AtomicBool,
    ) -> Result<PlaybackState, AudioError> {
        let period = period_us(sample_rate).unwrap_or(0);
        engine.start(pcm, sample_rate, self.config.looping)?;

        let status = engine.status();
        let engine = RefCell::new(engine);
        let delay = &mut self.delay;
        let outcome = supervise(
            status,
            cancel,
            || {
                engine.borrow_mut().on_tick();
                delay.delay_us(period);
            },
            || engine.borrow_mut().stop(),
        );

        match outcome {
            Ok(state) => rt_info!(self.log, self.clock.now(), "Playback {:?}", state),
            Err(e) => rt_error!(self.log, self.clock.now(), "Playback ended: {}", e),
        }
        outcome
    }
}

fn countdown<C: MonotonicClock, D: DelayNs>(log: &LogRing, clock: &C, delay: &mut D, config: &AudioConfig) {
    rt_info!(log, clock.now(), "Recording {} seconds...", config.record_secs);
    delay.delay_ms(1000);
    for n in 1..=config.countdown_secs {
        rt_info!(log, clock.now(), "Ready in {}...", n);
        delay.delay_ms(1000);
    }
    rt_info!(log, clock.now(), "Go!");
}
