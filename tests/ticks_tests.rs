//! Wraparound tick arithmetic tests

use pwm_audio::TickSpace;

#[test]
fn test_u32_space_bounds() {
    let space = TickSpace::U32;
    assert_eq!(space.max(), u32::MAX);
    assert_eq!(space.half_range(), i32::MAX as u32);
    assert_eq!(TickSpace::default(), space);
}

#[test]
fn test_u32_diff_across_wrap() {
    let space = TickSpace::U32;
    assert_eq!(space.diff(3, u32::MAX - 2), 6);
    assert_eq!(space.diff(u32::MAX - 2, 3), -6);
    assert!(space.is_reached(3, u32::MAX - 2));
    assert!(!space.is_reached(u32::MAX - 2, 3));
}

#[test]
fn test_16_bit_diff_across_wrap() {
    let space = TickSpace::new(16);
    assert_eq!(space.max(), 65_535);
    assert_eq!(space.diff(5, 65_530), 11);
    assert_eq!(space.diff(65_530, 5), -11);
    assert_eq!(space.add(65_530, 10), 4);
    assert_eq!(space.add(4, -10), 65_530);
}

#[test]
fn test_half_range_boundary() {
    let space = TickSpace::new(16);
    assert_eq!(space.diff(32_767, 0), 32_767);
    // One past half range reads as "before"
    assert_eq!(space.diff(32_768, 0), -32_768);
}

#[test]
fn test_deadline_reached_at_equality() {
    let space = TickSpace::new(12);
    assert!(space.is_reached(100, 100));
    assert!(!space.is_reached(99, 100));
    assert!(space.is_reached(101, 100));
}

#[test]
fn test_deadline_chain_over_many_wraps() {
    // Advance a deadline by a fixed period through many wraps of an
    // 8-bit counter; it always lands on the expected residue.
    let space = TickSpace::new(8);
    let mut deadline = 250;
    for k in 1..=1000u32 {
        deadline = space.add(deadline, 37);
        assert_eq!(deadline, (250 + 37 * k) % 256);
    }
}

#[test]
fn test_wrap_masks_value() {
    let space = TickSpace::new(10);
    assert_eq!(space.wrap(1024), 0);
    assert_eq!(space.wrap(1025), 1);
}

#[test]
#[should_panic]
fn test_rejects_one_bit_space() {
    let _ = TickSpace::new(1);
}
