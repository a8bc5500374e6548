//! Block level metering for captured PCM.

/// Mid-scale value of unsigned 8-bit PCM.
pub const PCM_CENTER: u8 = 128;

/// Peak deviation and DC offset of one block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Level {
    /// Largest `|sample - 128|`, 0..=128.
    pub peak: u8,
    /// Mean sample value (128 for a centered signal).
    pub dc_offset: u8,
}

impl Level {
    /// Mean offset from the 128 center; a biased microphone shows up here.
    pub fn bias(&self) -> i16 {
        self.dc_offset as i16 - PCM_CENTER as i16
    }
}

/// Measure a block. An empty block reads as silence.
pub fn measure(samples: &[u8]) -> Level {
    if samples.is_empty() {
        return Level {
            peak: 0,
            dc_offset: PCM_CENTER,
        };
    }

    let mut acc: u64 = 0;
    let mut peak: u8 = 0;
    for &s in samples {
        acc += s as u64;
        peak = peak.max(s.abs_diff(PCM_CENTER));
    }

    Level {
        peak,
        dc_offset: (acc / samples.len() as u64) as u8,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_silence() {
        let level = measure(&[128; 64]);
        assert_eq!(level, Level { peak: 0, dc_offset: 128 });
        assert_eq!(level.bias(), 0);
    }

    #[test]
    fn test_full_scale_negative_peak() {
        let level = measure(&[128, 0, 200]);
        assert_eq!(level.peak, 128);
        assert_eq!(level.dc_offset, 109); // 328 / 3
        assert_eq!(level.bias(), -19);
    }

    #[test]
    fn test_empty_is_silence() {
        assert_eq!(measure(&[]).dc_offset, PCM_CENTER);
    }
}
