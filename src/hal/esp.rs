//! ESP-IDF implementations of the hardware seams.
//!
//! - Clock: `esp_timer_get_time`, truncated to a wrapping 32-bit counter
//! - ADC: oneshot driver, 12-bit raw reads scaled to 16 bits
//! - PWM: LEDC channel, carrier set on its timer
//! - Sample timer: `esp_timer` periodic callback
//! - Storage: SPIFFS mounted into the VFS

use core::borrow::Borrow;
use core::ffi::CStr;
use core::time::Duration;

use embedded_hal::pwm::{self, ErrorType};
use esp_idf_svc::hal::adc::oneshot::{AdcChannelDriver, AdcDriver};
use esp_idf_svc::hal::gpio::ADCPin;
use esp_idf_svc::hal::ledc::LedcDriver;
use esp_idf_svc::sys::{self, esp, EspError};
use esp_idf_svc::timer::EspTimer;

use super::{period_us, HalError, MonotonicClock, PwmOutput, SampleAdc, SampleTimer, SetDutyCycle};
use crate::ticks::TickSpace;

/// Microsecond clock since boot.
#[derive(Debug, Clone, Copy, Default)]
pub struct EspClock;

impl MonotonicClock for EspClock {
    #[inline]
    fn now(&self) -> u32 {
        // SAFETY: reads a hardware counter, no preconditions.
        unsafe { sys::esp_timer_get_time() as u32 }
    }

    #[inline]
    fn tick_space(&self) -> TickSpace {
        TickSpace::U32
    }
}

/// One oneshot ADC channel.
pub struct EspAdc<'d, T: ADCPin, M: Borrow<AdcDriver<'d, T::Adc>>> {
    channel: AdcChannelDriver<'d, T, M>,
}

impl<'d, T: ADCPin, M: Borrow<AdcDriver<'d, T::Adc>>> EspAdc<'d, T, M> {
    pub fn new(channel: AdcChannelDriver<'d, T, M>) -> Self {
        Self { channel }
    }
}

impl<'d, T: ADCPin, M: Borrow<AdcDriver<'d, T::Adc>>> SampleAdc for EspAdc<'d, T, M> {
    #[inline]
    fn read_u16(&mut self) -> Result<u16, HalError> {
        self.channel
            .read_raw()
            .map(|raw| raw << 4)
            .map_err(|_| HalError::Adc)
    }
}

/// Error from an LEDC register call.
#[derive(Debug, Clone, Copy)]
pub struct EspPwmError(pub EspError);

impl pwm::Error for EspPwmError {
    fn kind(&self) -> pwm::ErrorKind {
        pwm::ErrorKind::Other
    }
}

/// LEDC channel used as the audio DAC.
pub struct EspPwm<'d> {
    driver: LedcDriver<'d>,
    speed_mode: sys::ledc_mode_t,
    timer: sys::ledc_timer_t,
}

impl<'d> EspPwm<'d> {
    /// `timer` must be the LEDC timer the driver's channel is bound to.
    pub fn new(driver: LedcDriver<'d>, timer: sys::ledc_timer_t) -> Self {
        Self {
            driver,
            speed_mode: sys::ledc_mode_t_LEDC_LOW_SPEED_MODE,
            timer,
        }
    }
}

impl ErrorType for EspPwm<'_> {
    type Error = EspPwmError;
}

impl SetDutyCycle for EspPwm<'_> {
    fn max_duty_cycle(&self) -> u16 {
        self.driver.get_max_duty().min(u16::MAX as u32) as u16
    }

    #[inline]
    fn set_duty_cycle(&mut self, duty: u16) -> Result<(), Self::Error> {
        self.driver.set_duty(duty as u32).map_err(EspPwmError)
    }
}

impl PwmOutput for EspPwm<'_> {
    fn set_carrier_hz(&mut self, hz: u32) -> Result<(), Self::Error> {
        // SAFETY: speed mode and timer index name a configured LEDC timer.
        esp!(unsafe { sys::ledc_set_freq(self.speed_mode, self.timer, hz) }).map_err(EspPwmError)
    }
}

/// Periodic `esp_timer` whose callback runs the playback tick.
///
/// The callback is bound when the timer is created from the timer
/// service; this type only starts and stops it.
pub struct EspSampleTimer {
    timer: EspTimer<'static>,
}

impl EspSampleTimer {
    pub fn new(timer: EspTimer<'static>) -> Self {
        Self { timer }
    }
}

impl SampleTimer for EspSampleTimer {
    fn arm(&mut self, rate_hz: u32) -> Result<(), HalError> {
        let period = period_us(rate_hz).ok_or(HalError::TimerArm)?;
        self.timer
            .every(Duration::from_micros(period as u64))
            .map_err(|_| HalError::TimerArm)
    }

    fn disarm(&mut self) -> Result<(), HalError> {
        self.timer.cancel().map(|_| ()).map_err(|_| HalError::TimerDisarm)
    }
}

/// Mount the default SPIFFS partition at `base_path`, formatting it if
/// it cannot be mounted.
pub fn mount_spiffs(base_path: &'static CStr) -> Result<(), EspError> {
    let conf = sys::esp_vfs_spiffs_conf_t {
        base_path: base_path.as_ptr(),
        partition_label: core::ptr::null(),
        max_files: 4,
        format_if_mount_failed: true,
    };
    // SAFETY: `conf` outlives the call and `base_path` is 'static.
    esp!(unsafe { sys::esp_vfs_spiffs_register(&conf) })
}
