pub(crate) fn mul_div255_u16(x: u16, y: u16) -> u16 {
    (((u32::from(x) * u32::from(y)) + 127) / 255) as u16
}

/// Convert a frame delta to the nearest sample index at `sample_rate`.
pub(crate) fn frame_to_sample(frame_delta: u64, fps: crate::Fps, sample_rate: u32) -> u64 {
    let num = u128::from(frame_delta) * u128::from(sample_rate) * u128::from(fps.den);
    let den = u128::from(fps.num);
    ((num + (den / 2)) / den) as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mul_div255_rounds() {
        assert_eq!(mul_div255_u16(255, 255), 255);
        assert_eq!(mul_div255_u16(0, 255), 0);
        assert_eq!(mul_div255_u16(128, 255), 128);
    }

    #[test]
    fn frame_to_sample_uses_rational_fps() {
        let fps = crate::Fps {
            num: 30_000,
            den: 1001,
        };
        assert_eq!(frame_to_sample(0, fps, 48_000), 0);
        assert!(frame_to_sample(1, fps, 48_000) > 0);

        let fps30 = crate::Fps::new(30, 1).unwrap();
        assert_eq!(frame_to_sample(30, fps30, 48_000), 48_000);
        assert_eq!(frame_to_sample(1, fps30, 48_000), 1_600);
    }
}
