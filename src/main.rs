//! pwm-audio - record then play back one clip.
//!
//! Sequence:
//! 1. Boot grace delay
//! 2. Countdown, capture, smooth, save `record.wav`
//! 3. Load the playback file and play it through PWM until it finishes
//!
//! The host run also stores a spectrogram of the take as one telemetry
//! frame next to the recording.
//!
//! On ESP-IDF this drives the real ADC, LEDC and `esp_timer`. On any other
//! target the same sessions run against simulated hardware in a temporary
//! directory, so the full flow can be exercised from a desktop.

use pwm_audio::log_drain::drain_to;
use pwm_audio::{MAIN_LOG, TICK_LOG};

/// Print everything both rings hold.
fn drain_logs() {
    let mut out = String::new();
    drain_to(&MAIN_LOG, &mut out);
    drain_to(&TICK_LOG, &mut out);
    if !out.is_empty() {
        print!("{}", out);
    }
}

#[cfg(target_os = "espidf")]
fn main() {
    esp_idf_svc::sys::link_patches();

    if let Err(e) = firmware::run() {
        pwm_audio::rt_error!(MAIN_LOG, 0, "Session aborted: {}", e);
    }

    loop {
        drain_logs();
        esp_idf_svc::hal::delay::FreeRtos::delay_ms(1000);
    }
}

#[cfg(target_os = "espidf")]
mod firmware {
    use std::sync::atomic::AtomicBool;
    use std::sync::{Arc, Mutex};

    use esp_idf_svc::hal::adc::attenuation::DB_11;
    use esp_idf_svc::hal::adc::oneshot::config::AdcChannelConfig;
    use esp_idf_svc::hal::adc::oneshot::{AdcChannelDriver, AdcDriver};
    use esp_idf_svc::hal::delay::FreeRtos;
    use esp_idf_svc::hal::gpio::PinDriver;
    use esp_idf_svc::hal::ledc::config::TimerConfig;
    use esp_idf_svc::hal::ledc::{LedcDriver, LedcTimerDriver, Resolution};
    use esp_idf_svc::hal::peripherals::Peripherals;
    use esp_idf_svc::hal::units::Hertz;
    use esp_idf_svc::sys;
    use esp_idf_svc::timer::EspTaskTimerService;

    use pwm_audio::audio::playback::supervise;
    use pwm_audio::hal::esp::{mount_spiffs, EspAdc, EspClock, EspPwm, EspSampleTimer};
    use pwm_audio::session::Session;
    use pwm_audio::{rt_info, PlaybackEngine, PlaybackStatus, CONFIG, MAIN_LOG, TICK_LOG};

    use super::drain_logs;

    type Engine = PlaybackEngine<'static, EspPwm<'static>, EspSampleTimer>;

    static STATUS: PlaybackStatus = PlaybackStatus::new();
    /// Never raised on this board; no stop input is wired.
    static CANCEL: AtomicBool = AtomicBool::new(false);

    const MOUNT: &str = "/spiffs";

    // Wiring: microphone on GPIO4 (ADC1 channel 3), gain select on GPIO2
    // driven high, PWM audio out on GPIO8 through the RC filter.

    pub fn run() -> Result<(), Box<dyn std::error::Error>> {
        rt_info!(MAIN_LOG, 0, "{}", env!("VERSION_STRING"));
        CONFIG.validate()?;
        let peripherals = Peripherals::take()?;
        mount_spiffs(c"/spiffs")?;

        let mut gain = PinDriver::output(peripherals.pins.gpio2)?;
        gain.set_high()?;

        let mut session = Session::new(&CONFIG, EspClock, FreeRtos, &MAIN_LOG);
        session.boot_grace();
        drain_logs();

        // Record
        let adc = AdcDriver::new(peripherals.adc1)?;
        let channel_config = AdcChannelConfig {
            attenuation: DB_11,
            ..Default::default()
        };
        let channel = AdcChannelDriver::new(&adc, peripherals.pins.gpio4, &channel_config)?;
        session.record(EspAdc::new(channel), format!("{}/{}", MOUNT, CONFIG.record_path))?;
        drain_logs();

        // Play
        session.boot_grace();
        let (pcm, rate) = session.load_playback(format!("{}/{}", MOUNT, CONFIG.playback_path))?;
        let pcm: &'static [u8] = Box::leak(pcm.into_boxed_slice());

        let ledc_timer = LedcTimerDriver::new(
            peripherals.ledc.timer0,
            &TimerConfig::new()
                .frequency(Hertz(CONFIG.carrier_hz))
                .resolution(Resolution::Bits10),
        )?;
        let ledc = LedcDriver::new(peripherals.ledc.channel0, ledc_timer, peripherals.pins.gpio8)?;
        let pwm = EspPwm::new(ledc, sys::ledc_timer_t_LEDC_TIMER_0);

        // The tick only try_locks: a tick that meets a foreground
        // Start/Stop is skipped rather than blocked.
        let slot: Arc<Mutex<Option<Engine>>> = Arc::new(Mutex::new(None));
        let tick_slot = slot.clone();
        let timer_service = EspTaskTimerService::new()?;
        let timer = timer_service.timer(move || {
            if let Ok(mut guard) = tick_slot.try_lock() {
                if let Some(engine) = guard.as_mut() {
                    engine.on_tick();
                }
            }
        })?;

        let engine = PlaybackEngine::new(pwm, EspSampleTimer::new(timer), &STATUS, &TICK_LOG)
            .with_carrier(CONFIG.carrier_hz);
        {
            let mut guard = slot.lock().unwrap_or_else(|e| e.into_inner());
            guard.insert(engine).start(pcm, rate, CONFIG.looping)?;
        }

        let state = supervise(
            &STATUS,
            &CANCEL,
            || {
                drain_logs();
                FreeRtos::delay_ms(100);
            },
            || {
                let mut guard = slot.lock().unwrap_or_else(|e| e.into_inner());
                guard.as_mut().map_or(Ok(()), |engine| engine.stop())
            },
        )?;

        rt_info!(MAIN_LOG, 0, "Done: {:?}", state);
        drain_logs();
        Ok(())
    }
}

#[cfg(not(target_os = "espidf"))]
fn main() -> std::process::ExitCode {
    match host::run() {
        Ok(()) => {
            drain_logs();
            std::process::ExitCode::SUCCESS
        }
        Err(e) => {
            drain_logs();
            eprintln!("error: {}", e);
            std::process::ExitCode::FAILURE
        }
    }
}

#[cfg(not(target_os = "espidf"))]
mod host {
    use std::path::Path;
    use std::sync::atomic::AtomicBool;

    use pwm_audio::audio::spectrum::{
        pcm_to_q15, SpectrumPipeline, DEFAULT_DIVIDER, DEFAULT_ZERO_POINT, FFT_SIZE, HOP_SIZE,
    };
    use pwm_audio::hal::sim::{AdcSource, SimAdc, SimClock, SimDelay, SimPwm, SimTimer};
    use pwm_audio::session::Session;
    use pwm_audio::telemetry::{encode_frame, FRAME_LEN, N_BINS, PAYLOAD_LEN, TIME_FRAMES};
    use pwm_audio::{
        rt_info, AudioError, PlaybackEngine, PlaybackStatus, TickSpace, CONFIG, MAIN_LOG, TICK_LOG,
    };

    use super::drain_logs;

    pub fn run() -> Result<(), AudioError> {
        rt_info!(MAIN_LOG, 0, "{}", env!("VERSION_STRING"));
        CONFIG.validate()?;
        let dir = std::env::temp_dir().join("pwm-audio");
        std::fs::create_dir_all(&dir)?;
        let path = dir.join(CONFIG.record_path);

        let clock = SimClock::new(TickSpace::U32, 0, 1);
        let delay = SimDelay::with_clock(clock.clone());
        let mut session = Session::new(&CONFIG, clock.clone(), delay, &MAIN_LOG);

        session.boot_grace();
        let adc = SimAdc::new(AdcSource::Tone {
            phase_step: 8,
            amplitude: 16_000,
        })
        .with_clock(clock.clone());
        let report = session.record(adc, &path)?;
        drain_logs();
        println!("recorded {} ({} bytes)", path.display(), report.file_bytes);

        // Nothing else is on the simulated filesystem; play back the take.
        let (pcm, rate) = session.load_playback(&path)?;

        let spectrum_path = dir.join("spectrum.bin");
        let columns = write_spectrum(&pcm, &spectrum_path)?;
        println!("{} spectrum columns in {}", columns, spectrum_path.display());
        let status = PlaybackStatus::new();
        let mut engine = PlaybackEngine::new(SimPwm::new(1023), SimTimer::new(), &status, &TICK_LOG)
            .with_carrier(CONFIG.carrier_hz);
        let cancel = AtomicBool::new(false);
        let state = session.play_inline(&mut engine, &pcm, rate, &cancel)?;

        let (pwm, _) = engine.release();
        println!("{:?} after {} duty writes", state, pwm.history().len());
        Ok(())
    }

    /// Spectrogram of the newest frames of `pcm`, stored as one telemetry
    /// frame.
    fn write_spectrum(pcm: &[u8], path: &Path) -> Result<usize, AudioError> {
        let mut pipeline = SpectrumPipeline::new(FFT_SIZE, HOP_SIZE, N_BINS, TIME_FRAMES)?;
        let q15: Vec<i16> = pcm.iter().map(|&s| pcm_to_q15(s)).collect();
        let mut spectrogram = [0u8; PAYLOAD_LEN];
        let columns = pipeline.append_columns(&q15, &mut spectrogram, DEFAULT_DIVIDER, DEFAULT_ZERO_POINT)?;

        let mut frame = [0u8; FRAME_LEN];
        let len = encode_frame(&spectrogram, &mut frame)
            .map_err(|_| AudioError::InvalidParameter("telemetry frame"))?;
        std::fs::write(path, &frame[..len])?;
        Ok(columns)
    }
}
