//! Simulated hardware for the host build and the tests.
//!
//! On host: every peripheral is a plain struct with inspection and
//! failure-injection hooks. Nothing here is timing accurate; the clock
//! advances a fixed step on every read so busy-wait loops always make
//! progress.

use std::cell::Cell;
use std::rc::Rc;

use embedded_hal::delay::DelayNs;
use embedded_hal::pwm::{self, ErrorType, SetDutyCycle};

use super::{HalError, MonotonicClock, PwmOutput, SampleAdc, SampleTimer};
use crate::ticks::TickSpace;

/// Shared simulated microsecond counter.
///
/// Clones share the same counter, so an ADC or delay holding a clone sees
/// (and moves) the same time as the capture engine.
#[derive(Clone, Debug)]
pub struct SimClock {
    now: Rc<Cell<u32>>,
    step: Rc<Cell<u32>>,
    space: TickSpace,
}

impl SimClock {
    /// Counter starting at `start` that advances `step` ticks per read.
    ///
    /// A zero step never advances: only use it when the caller moves time
    /// with [`SimClock::advance`].
    pub fn new(space: TickSpace, start: u32, step: u32) -> Self {
        Self {
            now: Rc::new(Cell::new(space.wrap(start))),
            step: Rc::new(Cell::new(step)),
            space,
        }
    }

    /// Current value without advancing.
    pub fn peek(&self) -> u32 {
        self.now.get()
    }

    pub fn advance(&self, ticks: u32) {
        let mut remaining = ticks;
        // Keep each add inside the half range so it stays well defined.
        let chunk = self.space.half_range().max(1);
        while remaining > 0 {
            let delta = remaining.min(chunk);
            self.now.set(self.space.add(self.now.get(), delta as i32));
            remaining -= delta;
        }
    }
}

impl MonotonicClock for SimClock {
    fn now(&self) -> u32 {
        let t = self.now.get();
        self.advance(self.step.get());
        t
    }

    fn tick_space(&self) -> TickSpace {
        self.space
    }
}

/// What a [`SimAdc`] returns.
#[derive(Clone, Debug)]
pub enum AdcSource {
    /// Same reading every time.
    Constant(u16),
    /// Readings in order, repeating from the start.
    Sequence(Vec<u16>),
    /// Sine around mid-scale; `phase_step` LUT entries per read.
    Tone { phase_step: u8, amplitude: u16 },
}

/// Simulated ADC channel.
pub struct SimAdc {
    source: AdcSource,
    clock: Option<SimClock>,
    reads: usize,
    phase: u8,
    stamps: Vec<u32>,
    fail_at: Option<usize>,
}

impl SimAdc {
    pub fn new(source: AdcSource) -> Self {
        Self {
            source,
            clock: None,
            reads: 0,
            phase: 0,
            stamps: Vec::new(),
            fail_at: None,
        }
    }

    /// Record the clock value (without advancing it) at every read.
    pub fn with_clock(mut self, clock: SimClock) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Fail the read with the given zero-based index.
    pub fn fail_at(mut self, read: usize) -> Self {
        self.fail_at = Some(read);
        self
    }

    /// Clock values at each successful read.
    pub fn read_stamps(&self) -> &[u32] {
        &self.stamps
    }

    pub fn reads(&self) -> usize {
        self.reads
    }

    fn next_value(&mut self) -> u16 {
        match &self.source {
            AdcSource::Constant(v) => *v,
            AdcSource::Sequence(values) if values.is_empty() => 0,
            AdcSource::Sequence(values) => values[(self.reads - 1) % values.len()],
            AdcSource::Tone { phase_step, amplitude } => {
                let s = SINE_LUT[self.phase as usize] as i32;
                self.phase = self.phase.wrapping_add(*phase_step);
                (32768 + s * *amplitude as i32 / 32767).clamp(0, 65535) as u16
            }
        }
    }
}

impl SampleAdc for SimAdc {
    fn read_u16(&mut self) -> Result<u16, HalError> {
        let index = self.reads;
        self.reads += 1;
        if self.fail_at == Some(index) {
            return Err(HalError::Adc);
        }
        if let Some(clock) = &self.clock {
            self.stamps.push(clock.peek());
        }
        Ok(self.next_value())
    }
}

/// 256-entry sine table, full i16 amplitude, one cycle.
static SINE_LUT: [i16; 256] = {
    let mut table = [0i16; 256];
    let mut i = 0;
    while i < 256 {
        let angle = (i as f64) * core::f64::consts::PI * 2.0 / 256.0;
        table[i] = (const_sin(angle) * 32767.0) as i16;
        i += 1;
    }
    table
};

/// Taylor-series sine usable in const context.
const fn const_sin(x: f64) -> f64 {
    let mut x = x;
    while x > core::f64::consts::PI {
        x -= 2.0 * core::f64::consts::PI;
    }
    // Fold into [-π/2, π/2] where the series is accurate
    if x > core::f64::consts::FRAC_PI_2 {
        x = core::f64::consts::PI - x;
    } else if x < -core::f64::consts::FRAC_PI_2 {
        x = -core::f64::consts::PI - x;
    }
    let x2 = x * x;
    let x3 = x2 * x;
    let x5 = x3 * x2;
    let x7 = x5 * x2;
    let x9 = x7 * x2;
    x - x3 / 6.0 + x5 / 120.0 - x7 / 5040.0 + x9 / 362880.0
}

/// Error returned by [`SimPwm`] when a failure is injected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimPwmError;

impl pwm::Error for SimPwmError {
    fn kind(&self) -> pwm::ErrorKind {
        pwm::ErrorKind::Other
    }
}

/// Simulated PWM channel recording every duty it was set to.
pub struct SimPwm {
    max: u16,
    duty: u16,
    carrier_hz: Option<u32>,
    carrier_sets: u32,
    history: Vec<u16>,
    writes: usize,
    fail_writes: Vec<usize>,
    fail_from: Option<usize>,
    fail_carrier: bool,
}

impl SimPwm {
    /// Channel with the given maximum duty, resting at 0.
    pub fn new(max_duty: u16) -> Self {
        Self {
            max: max_duty,
            duty: 0,
            carrier_hz: None,
            carrier_sets: 0,
            history: Vec::new(),
            writes: 0,
            fail_writes: Vec::new(),
            fail_from: None,
            fail_carrier: false,
        }
    }

    /// Fail the duty write attempt with the given zero-based index.
    pub fn fail_write(mut self, attempt: usize) -> Self {
        self.fail_writes.push(attempt);
        self
    }

    /// Fail every duty write attempt from the given index on.
    pub fn fail_writes_from(mut self, attempt: usize) -> Self {
        self.fail_from = Some(attempt);
        self
    }

    pub fn fail_carrier(mut self) -> Self {
        self.fail_carrier = true;
        self
    }

    pub fn duty(&self) -> u16 {
        self.duty
    }

    /// Duty values successfully written, oldest first.
    pub fn history(&self) -> &[u16] {
        &self.history
    }

    pub fn carrier_hz(&self) -> Option<u32> {
        self.carrier_hz
    }

    pub fn carrier_sets(&self) -> u32 {
        self.carrier_sets
    }

    /// Duty write attempts, including failed ones.
    pub fn write_attempts(&self) -> usize {
        self.writes
    }
}

impl ErrorType for SimPwm {
    type Error = SimPwmError;
}

impl SetDutyCycle for SimPwm {
    fn max_duty_cycle(&self) -> u16 {
        self.max
    }

    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        let attempt = self.writes;
        self.writes += 1;
        let failing = self.fail_writes.contains(&attempt)
            || self.fail_from.is_some_and(|from| attempt >= from);
        if failing {
            return Err(SimPwmError);
        }
        self.duty = duty.min(self.max);
        self.history.push(self.duty);
        Ok(())
    }
}

impl PwmOutput for SimPwm {
    fn set_carrier_hz(&mut self, hz: u32) -> Result<(), Self::Error> {
        if self.fail_carrier {
            return Err(SimPwmError);
        }
        self.carrier_hz = Some(hz);
        self.carrier_sets += 1;
        Ok(())
    }
}

/// Simulated periodic timer. The test (or host loop) calls the tick.
#[derive(Debug, Default)]
pub struct SimTimer {
    armed_hz: Option<u32>,
    arm_calls: u32,
    disarm_calls: u32,
    fail_arm: bool,
    fail_disarm: bool,
}

impl SimTimer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_arm(mut self) -> Self {
        self.fail_arm = true;
        self
    }

    pub fn fail_disarm(mut self) -> Self {
        self.fail_disarm = true;
        self
    }

    pub fn is_armed(&self) -> bool {
        self.armed_hz.is_some()
    }

    pub fn armed_hz(&self) -> Option<u32> {
        self.armed_hz
    }

    pub fn arm_calls(&self) -> u32 {
        self.arm_calls
    }

    pub fn disarm_calls(&self) -> u32 {
        self.disarm_calls
    }
}

impl SampleTimer for SimTimer {
    fn arm(&mut self, rate_hz: u32) -> Result<(), HalError> {
        self.arm_calls += 1;
        if self.fail_arm {
            return Err(HalError::TimerArm);
        }
        self.armed_hz = Some(rate_hz);
        Ok(())
    }

    fn disarm(&mut self) -> Result<(), HalError> {
        self.disarm_calls += 1;
        if self.fail_disarm {
            return Err(HalError::TimerDisarm);
        }
        self.armed_hz = None;
        Ok(())
    }
}

/// Delay that moves a [`SimClock`] forward instead of sleeping.
#[derive(Debug, Default)]
pub struct SimDelay {
    clock: Option<SimClock>,
    total_us: u64,
}

impl SimDelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_clock(clock: SimClock) -> Self {
        Self {
            clock: Some(clock),
            total_us: 0,
        }
    }

    /// Total simulated time spent in delays.
    pub fn total_us(&self) -> u64 {
        self.total_us
    }
}

impl DelayNs for SimDelay {
    fn delay_ns(&mut self, ns: u32) {
        let us = ns.div_ceil(1000);
        self.total_us += us as u64;
        if let Some(clock) = &self.clock {
            clock.advance(us);
        }
    }
}
