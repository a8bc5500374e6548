//! Timer-driven PWM playback.
//!
//! A periodic timer calls [`PlaybackEngine::on_tick`] once per sample
//! period; each tick writes the next sample as the PWM duty cycle. The RC
//! filter on the pin turns the duty into an analog level.
//!
//! # State machine
//!
//! ```text
//!          start()             end of buffer (no loop)
//!   Idle ─────────▶ Playing ─────────────────────────▶ Finished
//!                     │  │
//!              stop() │  │ hardware error in a tick
//!                     ▼  ▼
//!               Stopped  Faulted
//! ```
//!
//! Every exit from `Playing` disarms the timer and parks the output at
//! neutral duty (mid-scale, silence).
//!
//! # Concurrency
//!
//! The engine itself is only ever touched by one context at a time: the
//! tick callback, or the foreground while it holds the engine (Start/Stop).
//! The foreground observes progress through a [`PlaybackStatus`], which is
//! plain atomics and can live in a `static`.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

use crate::error::AudioError;
use crate::fault::FaultState;
use crate::hal::{HalError, PwmOutput, SampleTimer};
use crate::logging::LogRing;
use crate::{rt_error, rt_info};

/// PWM carrier frequency, well above the audio band.
pub const DEFAULT_CARRIER_HZ: u32 = 20_000;

/// Playback lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PlaybackState {
    Idle = 0,
    Playing = 1,
    /// Non-looping buffer played to the end
    Finished = 2,
    /// Stopped by the caller
    Stopped = 3,
    /// A hardware step failed; see [`PlaybackStatus::fault`]
    Faulted = 4,
}

impl PlaybackState {
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Playing,
            2 => Self::Finished,
            3 => Self::Stopped,
            4 => Self::Faulted,
            _ => Self::Idle,
        }
    }

    /// True for states a session cannot leave on its own.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Finished | Self::Stopped | Self::Faulted)
    }
}

/// Foreground view of a playback session.
///
/// Written by the engine, read by anyone.
pub struct PlaybackStatus {
    state: AtomicU8,
    position: AtomicU32,
    loops: AtomicU32,
    fault: FaultState,
}

impl PlaybackStatus {
    pub const fn new() -> Self {
        Self {
            state: AtomicU8::new(PlaybackState::Idle as u8),
            position: AtomicU32::new(0),
            loops: AtomicU32::new(0),
            fault: FaultState::new(),
        }
    }

    #[inline]
    pub fn state(&self) -> PlaybackState {
        PlaybackState::from_u8(self.state.load(Ordering::Acquire))
    }

    /// Samples played since the last wrap (or since start).
    #[inline]
    pub fn position(&self) -> u32 {
        self.position.load(Ordering::Relaxed)
    }

    /// Times a looping session wrapped back to the first sample.
    #[inline]
    pub fn loops(&self) -> u32 {
        self.loops.load(Ordering::Relaxed)
    }

    #[inline]
    pub fn fault(&self) -> &FaultState {
        &self.fault
    }

    /// Back to `Idle` for a new session.
    ///
    /// Clears the cursor, loop count and active fault; the fault count is
    /// kept.
    pub fn reset(&self) {
        self.position.store(0, Ordering::Relaxed);
        self.loops.store(0, Ordering::Relaxed);
        self.fault.clear();
        self.set_state(PlaybackState::Idle);
    }

    #[inline]
    fn set_state(&self, state: PlaybackState) {
        self.state.store(state as u8, Ordering::Release);
    }
}

impl Default for PlaybackStatus {
    fn default() -> Self {
        Self::new()
    }
}

/// Duty cycle for an 8-bit sample on a channel whose maximum is `max`.
///
/// `sample × (max + 1) / 256`: a 16-bit channel gets `sample × 256`.
#[inline]
pub fn duty_for(sample: u8, max: u16) -> u16 {
    ((sample as u32 * (max as u32 + 1)) >> 8) as u16
}

/// Mid-scale duty (the 128 sample), i.e. silence.
#[inline]
pub fn neutral_duty(max: u16) -> u16 {
    duty_for(128, max)
}

/// Sample sequencer driven by a periodic timer.
pub struct PlaybackEngine<'a, P: PwmOutput, T: SampleTimer> {
    pwm: P,
    timer: T,
    status: &'a PlaybackStatus,
    log: &'a LogRing,
    carrier_hz: u32,
    pcm: &'a [u8],
    position: usize,
    looping: bool,
    max_duty: u16,
    neutral: u16,
    ticks: u32,
}

impl<'a, P: PwmOutput, T: SampleTimer> PlaybackEngine<'a, P, T> {
    /// Take ownership of the PWM channel and sample timer.
    ///
    /// No hardware is touched until [`PlaybackEngine::start`]. `status` is
    /// reset, so a fault left by a previous engine does not carry over.
    pub fn new(pwm: P, timer: T, status: &'a PlaybackStatus, log: &'a LogRing) -> Self {
        status.reset();
        let max_duty = pwm.max_duty_cycle();
        Self {
            pwm,
            timer,
            status,
            log,
            carrier_hz: DEFAULT_CARRIER_HZ,
            pcm: &[],
            position: 0,
            looping: false,
            max_duty,
            neutral: neutral_duty(max_duty),
            ticks: 0,
        }
    }

    /// Use a different PWM carrier frequency.
    pub fn with_carrier(mut self, hz: u32) -> Self {
        self.carrier_hz = hz;
        self
    }

    #[inline]
    pub fn state(&self) -> PlaybackState {
        self.status.state()
    }

    pub fn status(&self) -> &'a PlaybackStatus {
        self.status
    }

    pub fn pwm(&self) -> &P {
        &self.pwm
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    /// Begin playing `pcm` at `sample_rate` Hz.
    ///
    /// Sets the carrier and a neutral duty before the timer is armed. On
    /// any failure the output is parked at neutral and the engine is left
    /// `Idle`. A faulted engine refuses to start; build a new engine over
    /// the same status to begin another session.
    pub fn start(&mut self, pcm: &'a [u8], sample_rate: u32, looping: bool) -> Result<(), AudioError> {
        match self.state() {
            PlaybackState::Playing => return Err(AudioError::AlreadyPlaying),
            PlaybackState::Faulted => return Err(AudioError::Faulted(self.status.fault.code())),
            _ => {}
        }
        if pcm.is_empty() {
            return Err(AudioError::InvalidParameter("empty sample buffer"));
        }
        if sample_rate == 0 {
            return Err(AudioError::InvalidParameter("sample rate must be non-zero"));
        }

        self.max_duty = self.pwm.max_duty_cycle();
        self.neutral = neutral_duty(self.max_duty);

        if self.pwm.set_carrier_hz(self.carrier_hz).is_err() {
            let _ = self.pwm.set_duty_cycle(self.neutral);
            return Err(AudioError::Hardware(HalError::PwmCarrier));
        }
        if self.pwm.set_duty_cycle(self.neutral).is_err() {
            return Err(AudioError::Hardware(HalError::PwmWrite));
        }

        self.pcm = pcm;
        self.position = 0;
        self.looping = looping;
        self.ticks = 0;
        self.status.position.store(0, Ordering::Relaxed);
        self.status.loops.store(0, Ordering::Relaxed);
        // Playing must be visible before the first tick can fire.
        self.status.set_state(PlaybackState::Playing);

        if let Err(e) = self.timer.arm(sample_rate) {
            self.status.set_state(PlaybackState::Idle);
            let _ = self.pwm.set_duty_cycle(self.neutral);
            return Err(AudioError::Hardware(e));
        }

        rt_info!(
            self.log,
            0,
            "playing {} samples @ {} Hz{}",
            pcm.len(),
            sample_rate,
            if looping { " (loop)" } else { "" }
        );
        Ok(())
    }

    /// Timer callback body. Runs to completion, never blocks or allocates.
    pub fn on_tick(&mut self) {
        // A tick can still fire after teardown
        if self.state() != PlaybackState::Playing {
            return;
        }
        self.ticks = self.ticks.wrapping_add(1);

        if self.position >= self.pcm.len() {
            if !self.looping {
                self.finish();
                return;
            }
            self.position = 0;
            self.status.loops.fetch_add(1, Ordering::Relaxed);
        }

        let duty = duty_for(self.pcm[self.position], self.max_duty);
        if self.pwm.set_duty_cycle(duty).is_err() {
            self.fault(HalError::PwmWrite);
            return;
        }

        self.position += 1;
        self.status.position.store(self.position as u32, Ordering::Relaxed);
    }

    /// Stop playback from the foreground.
    ///
    /// No-op unless `Playing`. If a teardown step fails the engine ends
    /// `Faulted` and the error is returned.
    pub fn stop(&mut self) -> Result<(), AudioError> {
        if self.state() != PlaybackState::Playing {
            return Ok(());
        }

        let disarmed = self.timer.disarm();
        let parked = self
            .pwm
            .set_duty_cycle(self.neutral)
            .map_err(|_| HalError::PwmWrite);

        match disarmed.and(parked) {
            Ok(()) => {
                self.status.set_state(PlaybackState::Stopped);
                rt_info!(self.log, self.ticks, "stopped at sample {}", self.position);
                Ok(())
            }
            Err(e) => {
                self.record_fault(e);
                Err(AudioError::Hardware(e))
            }
        }
    }

    /// Stop if needed and hand the PWM channel and timer back.
    pub fn release(mut self) -> (P, T) {
        let _ = self.stop();
        (self.pwm, self.timer)
    }

    fn finish(&mut self) {
        if let Err(e) = self.timer.disarm() {
            self.fault(e);
            return;
        }
        if self.pwm.set_duty_cycle(self.neutral).is_err() {
            self.fault(HalError::PwmWrite);
            return;
        }
        self.status.set_state(PlaybackState::Finished);
        rt_info!(self.log, self.ticks, "finished after {} samples", self.position);
    }

    /// Best-effort shutdown after a failed tick step.
    ///
    /// Each step is attempted regardless of the previous one.
    fn fault(&mut self, cause: HalError) {
        let _ = self.timer.disarm();
        let _ = self.pwm.set_duty_cycle(self.neutral);
        self.record_fault(cause);
    }

    fn record_fault(&mut self, cause: HalError) {
        self.status.fault.set(cause.fault_code(), self.position as u32);
        self.status.set_state(PlaybackState::Faulted);
        rt_error!(self.log, self.ticks, "FAULT: {} at sample {}", cause, self.position);
    }
}

/// Foreground wait loop for a running session.
///
/// Calls `idle` while the session is playing. When `cancel` is raised,
/// runs `stop` (the same teardown as [`PlaybackEngine::stop`]) and then
/// returns [`AudioError::Interrupted`]; teardown failures are recorded in
/// the status, not returned. A faulted session returns
/// [`AudioError::Faulted`]; other end states are returned as `Ok`.
pub fn supervise<I, S>(
    status: &PlaybackStatus,
    cancel: &AtomicBool,
    mut idle: I,
    mut stop: S,
) -> Result<PlaybackState, AudioError>
where
    I: FnMut(),
    S: FnMut() -> Result<(), AudioError>,
{
    loop {
        if cancel.load(Ordering::Acquire) {
            let _ = stop();
            return Err(AudioError::Interrupted);
        }
        match status.state() {
            PlaybackState::Playing => idle(),
            PlaybackState::Faulted => return Err(AudioError::Faulted(status.fault.code())),
            state => return Ok(state),
        }
    }
}
