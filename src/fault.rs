//! Fault state shared between the tick context and the foreground task.
//!
//! A player that keeps driving the PWM pin after something went wrong
//! produces noise or a DC offset on the speaker. Silence is the safe
//! failure, so every fault ends with the output at neutral duty and the
//! sample timer disarmed, and is then recorded here.

use core::sync::atomic::{AtomicBool, AtomicU32, AtomicU8, Ordering};

/// Which hardware step failed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
pub enum FaultCode {
    /// No fault (normal operation).
    None = 0,

    /// Writing a duty cycle to the PWM channel failed.
    PwmWrite = 1,

    /// Configuring the PWM carrier frequency failed.
    PwmCarrier = 2,

    /// Arming the periodic sample timer failed.
    TimerArm = 3,

    /// Disarming the sample timer failed.
    TimerDisarm = 4,

    /// Reading the ADC failed.
    AdcRead = 5,
}

impl FaultCode {
    /// Convert from raw u8 value.
    pub fn from_u8(value: u8) -> Self {
        match value {
            1 => FaultCode::PwmWrite,
            2 => FaultCode::PwmCarrier,
            3 => FaultCode::TimerArm,
            4 => FaultCode::TimerDisarm,
            5 => FaultCode::AdcRead,
            _ => FaultCode::None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            FaultCode::None => "none",
            FaultCode::PwmWrite => "pwm write",
            FaultCode::PwmCarrier => "pwm carrier",
            FaultCode::TimerArm => "timer arm",
            FaultCode::TimerDisarm => "timer disarm",
            FaultCode::AdcRead => "adc read",
        }
    }
}

impl core::fmt::Display for FaultCode {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lock-free fault record.
///
/// Set from the tick context, polled by the foreground task.
///
/// # Usage
///
/// ```ignore
/// static FAULT: FaultState = FaultState::new();
///
/// // In the timer tick:
/// if pwm.set_duty_cycle(duty).is_err() {
///     FAULT.set(FaultCode::PwmWrite, position as u32);
/// }
///
/// // In the main loop:
/// if FAULT.is_active() {
///     report(FAULT.snapshot());
/// }
/// ```
pub struct FaultState {
    /// True if fault is active.
    active: AtomicBool,

    /// Fault code (reason for fault).
    code: AtomicU8,

    /// Additional data (the playback cursor position for tick faults).
    data: AtomicU32,

    /// Total fault count since boot (never cleared).
    count: AtomicU32,
}

impl FaultState {
    /// Create new fault state (no fault).
    pub const fn new() -> Self {
        Self {
            active: AtomicBool::new(false),
            code: AtomicU8::new(0),
            data: AtomicU32::new(0),
            count: AtomicU32::new(0),
        }
    }

    /// Record a fault and raise the active flag.
    ///
    /// Code and data are published before the flag, so a reader that sees
    /// `is_active()` also sees the matching code.
    #[inline]
    pub fn set(&self, code: FaultCode, data: u32) {
        self.code.store(code as u8, Ordering::Release);
        self.data.store(data, Ordering::Release);
        self.count.fetch_add(1, Ordering::Relaxed);
        self.active.store(true, Ordering::Release);
    }

    /// Check if fault is currently active.
    #[inline]
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Get fault code (only meaningful if `is_active()` is true).
    #[inline]
    pub fn code(&self) -> FaultCode {
        FaultCode::from_u8(self.code.load(Ordering::Acquire))
    }

    #[inline]
    pub fn data(&self) -> u32 {
        self.data.load(Ordering::Acquire)
    }

    /// Get total fault count since boot.
    #[inline]
    pub fn count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }

    /// Clear the active flag. The counter is kept for diagnostics.
    #[inline]
    pub fn clear(&self) {
        self.active.store(false, Ordering::Release);
    }

    #[inline]
    pub fn snapshot(&self) -> FaultSnapshot {
        FaultSnapshot {
            active: self.is_active(),
            code: self.code(),
            data: self.data(),
            count: self.count(),
        }
    }
}

impl Default for FaultState {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of fault state at a point in time.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FaultSnapshot {
    pub active: bool,
    pub code: FaultCode,
    pub data: u32,
    pub count: u32,
}
