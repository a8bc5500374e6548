//! Single-pole (exponential) low-pass smoothing of 8-bit PCM.
//!
//! `y[i] = y[i-1]·(1-α) + x[i]·α`, seeded with `y[0] = x[0]`.
//!
//! The running value is kept at full precision; only the stored sample is
//! truncated (floor, then masked to one byte). Each output depends on the
//! previous *filtered* value, so the pass is strictly sequential.

use crate::error::AudioError;

/// Smooth `samples` in place.
///
/// `alpha` must lie in `(0, 1]`; `1.0` leaves the buffer unchanged,
/// smaller values smooth harder. Out-of-range (or NaN) alpha is rejected
/// before the buffer is touched.
pub fn smooth(samples: &mut [u8], alpha: f32) -> Result<(), AudioError> {
    if !(alpha > 0.0 && alpha <= 1.0) {
        return Err(AudioError::InvalidParameter("filter alpha must be in (0, 1]"));
    }

    let Some((first, rest)) = samples.split_first_mut() else {
        return Ok(());
    };

    let keep = 1.0 - alpha;
    let mut y = *first as f32;
    for sample in rest {
        y = y * keep + *sample as f32 * alpha;
        // y stays within [0, 255]; the cast truncates toward zero.
        *sample = ((y as u32) & 0xFF) as u8;
    }
    Ok(())
}
