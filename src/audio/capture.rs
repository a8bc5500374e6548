//! Paced ADC capture.
//!
//! Samples are taken on absolute deadlines spaced exactly one period
//! apart on a free-running microsecond clock:
//!
//! ```text
//! deadline:  d0        d0+P      d0+2P     d0+3P
//!            |---------|---------|---------|
//! read:       ^r0       ^r1        ^r2      ^r3
//! ```
//!
//! Loop overhead makes each read land slightly after its deadline, but the
//! next deadline is computed from the previous deadline, not from the read
//! time, so the error never accumulates. The wait is a pure spin: no sleep,
//! no yield, no scheduler jitter.

use crate::error::AudioError;
use crate::hal::{period_us, MonotonicClock, SampleAdc};
use crate::ticks::TickSpace;

/// Outcome of one capture session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CaptureReport {
    /// Samples written.
    pub samples: usize,
    /// Sample period in microseconds.
    pub period_us: u32,
    /// Reads that started one full period or more after their deadline.
    pub late_samples: u32,
    /// Worst lateness seen, in microseconds.
    pub max_lateness_us: u32,
    /// Time from the first deadline to the last read, summed read to read
    /// so it survives any number of counter wraps.
    pub elapsed_us: u64,
}

/// Busy-wait paced capture from one ADC channel.
pub struct CaptureEngine<C: MonotonicClock, A: SampleAdc> {
    clock: C,
    adc: A,
    sample_rate: u32,
    period: u32,
}

impl<C: MonotonicClock, A: SampleAdc> CaptureEngine<C, A> {
    /// Engine sampling at `sample_rate` Hz.
    ///
    /// The period (`round(1e6 / rate)` µs) must be at least 1 µs and fit in
    /// the clock's half range, otherwise deadlines could not be compared.
    pub fn new(clock: C, adc: A, sample_rate: u32) -> Result<Self, AudioError> {
        let period = period_us(sample_rate)
            .ok_or(AudioError::InvalidParameter("sample rate out of range"))?;
        if period > clock.tick_space().half_range() {
            return Err(AudioError::InvalidParameter("sample period exceeds clock range"));
        }
        Ok(Self {
            clock,
            adc,
            sample_rate,
            period,
        })
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn period_us(&self) -> u32 {
        self.period
    }

    /// Number of samples for `duration_secs` seconds.
    pub fn sample_count(&self, duration_secs: u32) -> Result<usize, AudioError> {
        self.sample_rate
            .checked_mul(duration_secs)
            .map(|n| n as usize)
            .ok_or(AudioError::InvalidParameter("capture too long"))
    }

    /// Fill `buf` with one paced sample per slot. Allocation-free.
    ///
    /// An ADC failure aborts the capture; the buffer contents are then
    /// partial and should be discarded.
    pub fn capture_into(&mut self, buf: &mut [u8]) -> Result<CaptureReport, AudioError> {
        let space: TickSpace = self.clock.tick_space();
        let step = self.period as i32;

        let mut deadline = self.clock.now();
        let mut previous = deadline;
        let mut report = CaptureReport {
            samples: 0,
            period_us: self.period,
            ..CaptureReport::default()
        };

        for slot in buf.iter_mut() {
            let mut now = self.clock.now();
            while !space.is_reached(now, deadline) {
                core::hint::spin_loop();
                now = self.clock.now();
            }

            let lateness = space.diff(now, deadline) as u32;
            if lateness >= self.period {
                report.late_samples += 1;
            }
            report.max_lateness_us = report.max_lateness_us.max(lateness);
            report.elapsed_us += space.diff(now, previous) as u64;
            previous = now;

            deadline = space.add(deadline, step);

            let raw = self.adc.read_u16()?;
            *slot = (raw >> 8) as u8;
            report.samples += 1;
        }

        Ok(report)
    }

    /// Capture `duration_secs` seconds into a new buffer.
    #[cfg(feature = "std")]
    pub fn capture(&mut self, duration_secs: u32) -> Result<(Vec<u8>, CaptureReport), AudioError> {
        let mut buf = vec![0u8; self.sample_count(duration_secs)?];
        let report = self.capture_into(&mut buf)?;
        Ok((buf, report))
    }

    /// Hand the clock and ADC back.
    pub fn release(self) -> (C, A) {
        (self.clock, self.adc)
    }
}
