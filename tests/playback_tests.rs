//! Playback engine tests against simulated PWM and timer

use std::cell::RefCell;
use std::sync::atomic::{AtomicBool, Ordering};

use pwm_audio::audio::playback::{duty_for, supervise, PlaybackEngine, PlaybackState, PlaybackStatus};
use pwm_audio::hal::sim::{SimPwm, SimTimer};
use pwm_audio::hal::HalError;
use pwm_audio::logging::{LogLevel, LogRing};
use pwm_audio::{AudioError, FaultCode};

const NEUTRAL: u16 = 32768;

fn make_engine<'a>(
    pwm: SimPwm,
    timer: SimTimer,
    status: &'a PlaybackStatus,
    log: &'a LogRing,
) -> PlaybackEngine<'a, SimPwm, SimTimer> {
    PlaybackEngine::new(pwm, timer, status, log)
}

#[test]
fn test_initial_state() {
    let status = PlaybackStatus::new();
    let log = LogRing::new();
    let engine = make_engine(SimPwm::new(u16::MAX), SimTimer::new(), &status, &log);
    assert_eq!(engine.state(), PlaybackState::Idle);
    // Nothing touched before start
    assert!(engine.pwm().history().is_empty());
    assert_eq!(engine.pwm().carrier_hz(), None);
}

#[test]
fn test_start_configures_hardware() {
    let status = PlaybackStatus::new();
    let log = LogRing::new();
    let pcm = [10u8, 20, 30];
    let mut engine = make_engine(SimPwm::new(u16::MAX), SimTimer::new(), &status, &log);

    engine.start(&pcm, 8000, false).unwrap();

    assert_eq!(engine.state(), PlaybackState::Playing);
    assert_eq!(engine.pwm().carrier_hz(), Some(20_000));
    assert_eq!(engine.pwm().history(), &[NEUTRAL]);
    assert_eq!(engine.timer().armed_hz(), Some(8000));
}

#[test]
fn test_custom_carrier() {
    let status = PlaybackStatus::new();
    let log = LogRing::new();
    let pcm = [128u8];
    let mut engine =
        make_engine(SimPwm::new(1023), SimTimer::new(), &status, &log).with_carrier(31_250);

    engine.start(&pcm, 8000, false).unwrap();
    assert_eq!(engine.pwm().carrier_hz(), Some(31_250));
    // 10-bit channel: neutral is 512
    assert_eq!(engine.pwm().duty(), 512);
}

#[test]
fn test_non_looping_terminates_after_n_samples() {
    let status = PlaybackStatus::new();
    let log = LogRing::new();
    let pcm = [0u8, 64, 128, 255];
    let mut engine = make_engine(SimPwm::new(u16::MAX), SimTimer::new(), &status, &log);
    engine.start(&pcm, 8000, false).unwrap();

    for _ in 0..pcm.len() {
        engine.on_tick();
        assert_eq!(engine.state(), PlaybackState::Playing);
    }
    assert_eq!(status.position(), 4);

    // One more tick notices the end
    engine.on_tick();
    assert_eq!(engine.state(), PlaybackState::Finished);
    assert!(!engine.timer().is_armed());
    assert_eq!(engine.pwm().duty(), NEUTRAL);
    assert_eq!(
        engine.pwm().history(),
        &[NEUTRAL, 0, 16384, 32768, 65280, NEUTRAL]
    );

    // Late ticks are ignored
    engine.on_tick();
    engine.on_tick();
    assert_eq!(engine.pwm().history().len(), 6);
    assert_eq!(engine.state(), PlaybackState::Finished);
}

#[test]
fn test_finish_is_logged() {
    let status = PlaybackStatus::new();
    let log = LogRing::new();
    let pcm = [1u8, 2];
    let mut engine = make_engine(SimPwm::new(u16::MAX), SimTimer::new(), &status, &log);
    engine.start(&pcm, 8000, false).unwrap();
    for _ in 0..3 {
        engine.on_tick();
    }

    let mut messages = Vec::new();
    while let Some(record) = log.drain() {
        messages.push(record.message().to_string());
    }
    assert!(messages.iter().any(|m| m.contains("playing 2 samples")));
    assert!(messages.iter().any(|m| m.contains("finished after 2 samples")));
}

#[test]
fn test_looping_never_finishes() {
    let status = PlaybackStatus::new();
    let log = LogRing::new();
    let pcm = [10u8, 20, 30];
    let mut engine = make_engine(SimPwm::new(u16::MAX), SimTimer::new(), &status, &log);
    engine.start(&pcm, 8000, true).unwrap();

    for _ in 0..3 * pcm.len() {
        engine.on_tick();
        assert_eq!(engine.state(), PlaybackState::Playing);
    }

    let first = duty_for(10, u16::MAX);
    let history = engine.pwm().history();
    // Start's neutral write plus one write per tick
    assert_eq!(history.len(), 1 + 3 * pcm.len());
    assert_eq!(history.iter().filter(|&&d| d == first).count(), 3);
    assert_eq!(status.loops(), 2);
    assert!(engine.timer().is_armed());
}

#[test]
fn test_looping_wrap_plays_first_sample_same_tick() {
    let status = PlaybackStatus::new();
    let log = LogRing::new();
    let pcm = [10u8, 20];
    let mut engine = make_engine(SimPwm::new(u16::MAX), SimTimer::new(), &status, &log);
    engine.start(&pcm, 8000, true).unwrap();

    engine.on_tick();
    engine.on_tick();
    engine.on_tick();
    assert_eq!(engine.pwm().duty(), duty_for(10, u16::MAX));
    assert_eq!(status.position(), 1);
}

#[test]
fn test_fault_at_tick_k() {
    let status = PlaybackStatus::new();
    let log = LogRing::new();
    let pcm = [200u8; 8];
    // Attempt 0 is start's neutral write, so tick 3 is attempt 3
    let pwm = SimPwm::new(u16::MAX).fail_write(3);
    let mut engine = make_engine(pwm, SimTimer::new(), &status, &log);
    engine.start(&pcm, 8000, false).unwrap();

    engine.on_tick();
    engine.on_tick();
    assert_eq!(engine.state(), PlaybackState::Playing);
    engine.on_tick();

    assert_eq!(engine.state(), PlaybackState::Faulted);
    assert!(!engine.timer().is_armed());
    assert_eq!(engine.pwm().duty(), NEUTRAL);

    let fault = status.fault().snapshot();
    assert!(fault.active);
    assert_eq!(fault.code, FaultCode::PwmWrite);
    assert_eq!(fault.data, 2);

    let record = std::iter::from_fn(|| log.drain())
        .find(|r| r.level == LogLevel::Error)
        .expect("fault logged");
    assert!(record.message().contains("FAULT"));

    // Faulted is final: further ticks write nothing
    let writes = engine.pwm().write_attempts();
    engine.on_tick();
    assert_eq!(engine.pwm().write_attempts(), writes);
}

#[test]
fn test_fault_teardown_is_best_effort() {
    let status = PlaybackStatus::new();
    let log = LogRing::new();
    let pcm = [200u8; 8];
    // Every write from tick 2 on fails, including the neutral reset
    let pwm = SimPwm::new(u16::MAX).fail_writes_from(2);
    let mut engine = make_engine(pwm, SimTimer::new(), &status, &log);
    engine.start(&pcm, 8000, false).unwrap();

    engine.on_tick();
    engine.on_tick();

    assert_eq!(engine.state(), PlaybackState::Faulted);
    assert_eq!(engine.timer().disarm_calls(), 1);
    assert!(!engine.timer().is_armed());
    // Neutral was attempted after the failed write
    assert_eq!(engine.pwm().write_attempts(), 4);
}

#[test]
fn test_disarm_failure_at_end_faults() {
    let status = PlaybackStatus::new();
    let log = LogRing::new();
    let pcm = [50u8, 60];
    let mut engine = make_engine(SimPwm::new(u16::MAX), SimTimer::new().fail_disarm(), &status, &log);
    engine.start(&pcm, 8000, false).unwrap();

    for _ in 0..3 {
        engine.on_tick();
    }

    assert_eq!(engine.state(), PlaybackState::Faulted);
    assert_eq!(status.fault().code(), FaultCode::TimerDisarm);
    assert_eq!(engine.pwm().duty(), NEUTRAL);
}

#[test]
fn test_stop_while_playing() {
    let status = PlaybackStatus::new();
    let log = LogRing::new();
    let pcm = [255u8; 16];
    let mut engine = make_engine(SimPwm::new(u16::MAX), SimTimer::new(), &status, &log);
    engine.start(&pcm, 8000, false).unwrap();
    engine.on_tick();
    engine.on_tick();

    assert_eq!(engine.stop(), Ok(()));
    assert_eq!(engine.state(), PlaybackState::Stopped);
    assert!(!engine.timer().is_armed());
    assert_eq!(engine.pwm().duty(), NEUTRAL);
    assert_eq!(status.position(), 2);
}

#[test]
fn test_stop_is_idempotent() {
    let status = PlaybackStatus::new();
    let log = LogRing::new();
    let pcm = [255u8; 4];
    let mut engine = make_engine(SimPwm::new(u16::MAX), SimTimer::new(), &status, &log);

    // Idle: no-op
    assert_eq!(engine.stop(), Ok(()));
    assert_eq!(engine.timer().disarm_calls(), 0);
    assert_eq!(engine.state(), PlaybackState::Idle);

    engine.start(&pcm, 8000, false).unwrap();
    assert_eq!(engine.stop(), Ok(()));
    assert_eq!(engine.stop(), Ok(()));
    assert_eq!(engine.timer().disarm_calls(), 1);
    assert_eq!(engine.state(), PlaybackState::Stopped);
}

#[test]
fn test_stop_after_finish_is_noop() {
    let status = PlaybackStatus::new();
    let log = LogRing::new();
    let pcm = [1u8];
    let mut engine = make_engine(SimPwm::new(u16::MAX), SimTimer::new(), &status, &log);
    engine.start(&pcm, 8000, false).unwrap();
    engine.on_tick();
    engine.on_tick();
    assert_eq!(engine.state(), PlaybackState::Finished);

    assert_eq!(engine.stop(), Ok(()));
    assert_eq!(engine.state(), PlaybackState::Finished);
}

#[test]
fn test_stop_with_failing_disarm_faults() {
    let status = PlaybackStatus::new();
    let log = LogRing::new();
    let pcm = [1u8; 4];
    let mut engine = make_engine(SimPwm::new(u16::MAX), SimTimer::new().fail_disarm(), &status, &log);
    engine.start(&pcm, 8000, false).unwrap();

    assert_eq!(engine.stop(), Err(AudioError::Hardware(HalError::TimerDisarm)));
    assert_eq!(engine.state(), PlaybackState::Faulted);
    // Neutral still written
    assert_eq!(engine.pwm().duty(), NEUTRAL);
}

#[test]
fn test_start_rejects_bad_arguments() {
    let status = PlaybackStatus::new();
    let log = LogRing::new();
    let pcm = [1u8; 4];
    let mut engine = make_engine(SimPwm::new(u16::MAX), SimTimer::new(), &status, &log);

    assert!(matches!(engine.start(&[], 8000, false), Err(AudioError::InvalidParameter(_))));
    assert!(matches!(engine.start(&pcm, 0, false), Err(AudioError::InvalidParameter(_))));
    assert_eq!(engine.state(), PlaybackState::Idle);
    assert_eq!(engine.timer().arm_calls(), 0);
}

#[test]
fn test_start_while_playing() {
    let status = PlaybackStatus::new();
    let log = LogRing::new();
    let pcm = [1u8; 4];
    let mut engine = make_engine(SimPwm::new(u16::MAX), SimTimer::new(), &status, &log);
    engine.start(&pcm, 8000, false).unwrap();
    assert_eq!(engine.start(&pcm, 8000, false), Err(AudioError::AlreadyPlaying));
    assert_eq!(engine.state(), PlaybackState::Playing);
}

#[test]
fn test_arm_failure_leaves_idle_and_neutral() {
    let status = PlaybackStatus::new();
    let log = LogRing::new();
    let pcm = [1u8; 4];
    let mut engine = make_engine(SimPwm::new(u16::MAX), SimTimer::new().fail_arm(), &status, &log);

    assert_eq!(
        engine.start(&pcm, 8000, false),
        Err(AudioError::Hardware(HalError::TimerArm))
    );
    assert_eq!(engine.state(), PlaybackState::Idle);
    assert_eq!(engine.pwm().duty(), NEUTRAL);
    assert!(!engine.timer().is_armed());
}

#[test]
fn test_carrier_failure_leaves_idle() {
    let status = PlaybackStatus::new();
    let log = LogRing::new();
    let pcm = [1u8; 4];
    let pwm = SimPwm::new(u16::MAX).fail_carrier();
    let mut engine = make_engine(pwm, SimTimer::new(), &status, &log);

    assert_eq!(
        engine.start(&pcm, 8000, false),
        Err(AudioError::Hardware(HalError::PwmCarrier))
    );
    assert_eq!(engine.state(), PlaybackState::Idle);
    assert_eq!(engine.timer().arm_calls(), 0);
}

#[test]
fn test_faulted_engine_refuses_start() {
    let status = PlaybackStatus::new();
    let log = LogRing::new();
    let pcm = [1u8; 4];
    let pwm = SimPwm::new(u16::MAX).fail_write(1);
    let mut engine = make_engine(pwm, SimTimer::new(), &status, &log);
    engine.start(&pcm, 8000, false).unwrap();
    engine.on_tick();
    assert_eq!(engine.state(), PlaybackState::Faulted);

    assert_eq!(
        engine.start(&pcm, 8000, false),
        Err(AudioError::Faulted(FaultCode::PwmWrite))
    );
}

#[test]
fn test_new_engine_after_fault_starts_clean() {
    let status = PlaybackStatus::new();
    let log = LogRing::new();
    let pcm = [1u8; 4];
    let pwm = SimPwm::new(u16::MAX).fail_write(1);
    let mut engine = make_engine(pwm, SimTimer::new(), &status, &log);
    engine.start(&pcm, 8000, false).unwrap();
    engine.on_tick();
    assert_eq!(engine.state(), PlaybackState::Faulted);
    drop(engine);

    let mut engine = make_engine(SimPwm::new(u16::MAX), SimTimer::new(), &status, &log);
    assert_eq!(engine.state(), PlaybackState::Idle);
    assert!(!status.fault().is_active());
    assert_eq!(status.fault().count(), 1);

    engine.start(&pcm, 8000, false).unwrap();
    for _ in 0..=pcm.len() {
        engine.on_tick();
    }
    assert_eq!(engine.state(), PlaybackState::Finished);
    assert_eq!(status.position(), 4);
}

#[test]
fn test_restart_after_finish() {
    let status = PlaybackStatus::new();
    let log = LogRing::new();
    let pcm = [1u8, 2];
    let mut engine = make_engine(SimPwm::new(u16::MAX), SimTimer::new(), &status, &log);
    engine.start(&pcm, 8000, false).unwrap();
    for _ in 0..3 {
        engine.on_tick();
    }
    assert_eq!(engine.state(), PlaybackState::Finished);

    engine.start(&pcm, 4000, false).unwrap();
    assert_eq!(engine.state(), PlaybackState::Playing);
    assert_eq!(status.position(), 0);
    assert_eq!(engine.timer().armed_hz(), Some(4000));
}

#[test]
fn test_release_stops_playback() {
    let status = PlaybackStatus::new();
    let log = LogRing::new();
    let pcm = [1u8; 4];
    let mut engine = make_engine(SimPwm::new(u16::MAX), SimTimer::new(), &status, &log);
    engine.start(&pcm, 8000, false).unwrap();

    let (pwm, timer) = engine.release();
    assert!(!timer.is_armed());
    assert_eq!(pwm.duty(), NEUTRAL);
    assert_eq!(status.state(), PlaybackState::Stopped);
}

#[test]
fn test_supervise_runs_to_finish() {
    let status = PlaybackStatus::new();
    let log = LogRing::new();
    let pcm = [9u8; 5];
    let engine = RefCell::new(make_engine(SimPwm::new(u16::MAX), SimTimer::new(), &status, &log));
    engine.borrow_mut().start(&pcm, 8000, false).unwrap();
    let cancel = AtomicBool::new(false);

    let result = supervise(
        &status,
        &cancel,
        || engine.borrow_mut().on_tick(),
        || engine.borrow_mut().stop(),
    );
    assert_eq!(result, Ok(PlaybackState::Finished));
}

#[test]
fn test_supervise_cancel_tears_down() {
    let status = PlaybackStatus::new();
    let log = LogRing::new();
    let pcm = [9u8; 100];
    let engine = RefCell::new(make_engine(SimPwm::new(u16::MAX), SimTimer::new(), &status, &log));
    engine.borrow_mut().start(&pcm, 8000, true).unwrap();
    let cancel = AtomicBool::new(false);
    let mut ticks = 0;

    let result = supervise(
        &status,
        &cancel,
        || {
            engine.borrow_mut().on_tick();
            ticks += 1;
            if ticks == 3 {
                cancel.store(true, Ordering::Release);
            }
        },
        || engine.borrow_mut().stop(),
    );

    assert_eq!(result, Err(AudioError::Interrupted));
    let engine = engine.borrow();
    assert_eq!(engine.state(), PlaybackState::Stopped);
    assert!(!engine.timer().is_armed());
    assert_eq!(engine.pwm().duty(), NEUTRAL);
}

#[test]
fn test_supervise_reports_fault() {
    let status = PlaybackStatus::new();
    let log = LogRing::new();
    let pcm = [9u8; 10];
    let pwm = SimPwm::new(u16::MAX).fail_write(4);
    let engine = RefCell::new(make_engine(pwm, SimTimer::new(), &status, &log));
    engine.borrow_mut().start(&pcm, 8000, false).unwrap();
    let cancel = AtomicBool::new(false);

    let result = supervise(
        &status,
        &cancel,
        || engine.borrow_mut().on_tick(),
        || engine.borrow_mut().stop(),
    );
    assert_eq!(result, Err(AudioError::Faulted(FaultCode::PwmWrite)));
}

#[test]
fn test_supervise_idle_session_returns_immediately() {
    let status = PlaybackStatus::new();
    let cancel = AtomicBool::new(false);
    let result = supervise(&status, &cancel, || panic!("no ticks expected"), || Ok(()));
    assert_eq!(result, Ok(PlaybackState::Idle));
}
