//! Hardware seams for the audio core.
//!
//! The capture and playback engines own their peripherals through these
//! traits instead of reaching for global singletons. The firmware passes
//! ESP-IDF drivers ([`esp`]), the host build and the tests pass simulated
//! hardware ([`sim`]).
//!
//! PWM duty and delays use the `embedded-hal` 1.0 traits directly.

#[cfg(target_os = "espidf")]
pub mod esp;
#[cfg(feature = "std")]
pub mod sim;

pub use embedded_hal::delay::DelayNs;
pub use embedded_hal::pwm::SetDutyCycle;

use crate::fault::FaultCode;
use crate::ticks::TickSpace;

/// Peripheral failure reported by a HAL implementation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HalError {
    /// ADC conversion failed
    Adc,
    /// PWM duty register write failed
    PwmWrite,
    /// PWM carrier frequency could not be set
    PwmCarrier,
    /// Periodic timer could not be started
    TimerArm,
    /// Periodic timer could not be stopped
    TimerDisarm,
}

impl HalError {
    /// Fault code recorded when this error ends a session.
    pub fn fault_code(self) -> FaultCode {
        match self {
            Self::Adc => FaultCode::AdcRead,
            Self::PwmWrite => FaultCode::PwmWrite,
            Self::PwmCarrier => FaultCode::PwmCarrier,
            Self::TimerArm => FaultCode::TimerArm,
            Self::TimerDisarm => FaultCode::TimerDisarm,
        }
    }
}

impl core::fmt::Display for HalError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} failed", self.fault_code())
    }
}

/// Free-running microsecond counter.
///
/// Readings wrap inside [`MonotonicClock::tick_space`]; compare them only
/// through [`TickSpace::diff`].
pub trait MonotonicClock {
    /// Current counter value, already reduced into the tick space.
    fn now(&self) -> u32;

    /// Modulus of the counter.
    fn tick_space(&self) -> TickSpace;
}

impl<C: MonotonicClock + ?Sized> MonotonicClock for &C {
    #[inline]
    fn now(&self) -> u32 {
        (**self).now()
    }

    #[inline]
    fn tick_space(&self) -> TickSpace {
        (**self).tick_space()
    }
}

/// One ADC channel, read at its native resolution scaled to 16 bits.
pub trait SampleAdc {
    fn read_u16(&mut self) -> Result<u16, HalError>;
}

/// A PWM channel whose carrier frequency can be configured.
pub trait PwmOutput: SetDutyCycle {
    fn set_carrier_hz(&mut self, hz: u32) -> Result<(), Self::Error>;
}

/// Periodic timer that drives the playback tick.
///
/// Arming starts calling the tick at `rate_hz`; disarming stops it. The
/// tick callback itself is wired up by the platform, not by this trait.
pub trait SampleTimer {
    fn arm(&mut self, rate_hz: u32) -> Result<(), HalError>;
    fn disarm(&mut self) -> Result<(), HalError>;
}

/// Sample period in microseconds, `round(1_000_000 / rate_hz)`.
///
/// Returns `None` for a zero rate or a rate above 2 MHz (period rounds to 0).
pub const fn period_us(rate_hz: u32) -> Option<u32> {
    if rate_hz == 0 {
        return None;
    }
    let period = (1_000_000 + rate_hz / 2) / rate_hz;
    if period == 0 {
        None
    } else {
        Some(period)
    }
}
