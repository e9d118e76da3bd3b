//! Fixed-point speed arithmetic.
//!
//! Speeds are kept as `SpeedQ20`: substeps per 2^20 microseconds, stored in an
//! `i32`. One 2^20 µs "tick" is about 1.05 s, so the raw value is close to
//! substeps/second while a slope only costs one shift and one integer division.
//!
//! Every operation rounds toward zero. That keeps results sign-symmetric:
//! negating the inputs negates the output exactly, which the estimator relies
//! on for mirrored rotation to produce mirrored readings.

/// Number of fractional bits of the time base (2^20 µs).
pub const Q20_SHIFT: u32 = 20;
const Q20_ONE: i64 = 1 << Q20_SHIFT;

/// `1_000_000 / 2^20` as the reduced fraction `62_500 / 65_536`.
const US_PER_SEC_NUM: i64 = 62_500;
const US_PER_SEC_DEN: i64 = 65_536;

/// Signed speed in substeps per 2^20 µs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Hash)]
pub struct SpeedQ20(i32);

impl SpeedQ20 {
    pub const ZERO: SpeedQ20 = SpeedQ20(0);
    pub const MAX: SpeedQ20 = SpeedQ20(i32::MAX);
    pub const MIN: SpeedQ20 = SpeedQ20(-i32::MAX);

    #[inline]
    pub const fn from_raw(raw: i32) -> Self {
        Self(raw)
    }

    #[inline]
    pub const fn raw(self) -> i32 {
        self.0
    }

    /// Slope of `delta_substeps` over `delta_us`, saturating to the i32 range.
    ///
    /// A zero time delta is an infinite slope: it saturates toward the sign of
    /// `delta_substeps` (and is zero when both are zero), which makes it a
    /// no-op when used as a clamp bound.
    #[inline]
    pub fn from_slope(delta_substeps: i32, delta_us: i32) -> Self {
        if delta_us == 0 {
            return match delta_substeps.signum() {
                1 => Self::MAX,
                -1 => Self::MIN,
                _ => Self::ZERO,
            };
        }
        let q = (i64::from(delta_substeps) << Q20_SHIFT) / i64::from(delta_us);
        Self(saturate_i32(q))
    }

    /// Convert to substeps per second.
    #[inline]
    pub fn per_second(self) -> i32 {
        saturate_i32(i64::from(self.0) * US_PER_SEC_NUM / US_PER_SEC_DEN)
    }

    /// Substeps covered at this speed over `elapsed_us`.
    #[inline]
    pub fn distance_over(self, elapsed_us: u32) -> i32 {
        saturate_i32(i64::from(self.0) * i64::from(elapsed_us) / Q20_ONE)
    }

    /// Restrict to `[low, high]`, applying the upper bound first.
    #[inline]
    pub fn bounded(self, low: SpeedQ20, high: SpeedQ20) -> Self {
        let mut v = self;
        if v > high {
            v = high;
        }
        if v < low {
            v = low;
        }
        v
    }

    /// Substeps per second without the integer truncation of
    /// [`per_second`](Self::per_second), which matters below a few hundred
    /// substeps per second.
    #[inline]
    pub fn per_second_f64(self) -> f64 {
        f64::from(self.0) * 1e6 / Q20_ONE as f64
    }
}

#[inline]
fn saturate_i32(v: i64) -> i32 {
    v.clamp(i64::from(-i32::MAX), i64::from(i32::MAX)) as i32
}

/// Signed distance `a - b` between two wrapping substep positions.
#[inline]
pub fn wrapping_diff(a: i32, b: i32) -> i32 {
    a.wrapping_sub(b)
}

/// Signed distance between two wrapping microsecond timestamps.
#[inline]
pub fn elapsed_us(later: u32, earlier: u32) -> i32 {
    later.wrapping_sub(earlier) as i32
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slope_matches_q20_scale() {
        // 64 substeps in 1000 us => 64 * 2^20 / 1000
        assert_eq!(SpeedQ20::from_slope(64, 1000).raw(), 67_108);
        assert_eq!(SpeedQ20::from_slope(-64, 1000).raw(), -67_108);
    }

    #[test]
    fn slope_with_zero_time_saturates_by_sign() {
        assert_eq!(SpeedQ20::from_slope(5, 0), SpeedQ20::MAX);
        assert_eq!(SpeedQ20::from_slope(-5, 0), SpeedQ20::MIN);
        assert_eq!(SpeedQ20::from_slope(0, 0), SpeedQ20::ZERO);
    }

    #[test]
    fn per_second_converts_time_base() {
        // 2^20 substeps per 2^20 us == 1_000_000 substeps per second
        assert_eq!(SpeedQ20::from_raw(1 << 20).per_second(), 1_000_000);
        assert_eq!(SpeedQ20::from_raw(67_108).per_second(), 63_999);
        assert_eq!(SpeedQ20::from_raw(-67_108).per_second(), -63_999);
    }

    #[test]
    fn fractional_per_second_keeps_slow_speeds() {
        let slow = SpeedQ20::from_slope(64, 100_000);
        assert_eq!(slow.per_second(), 639);
        assert!((slow.per_second_f64() - 639.915).abs() < 1e-3);
        assert_eq!(slow.per_second_f64(), -SpeedQ20::from_raw(-slow.raw()).per_second_f64());
    }

    #[test]
    fn rounding_is_symmetric() {
        for raw in [-100_003, -7, -1, 0, 1, 7, 100_003] {
            let v = SpeedQ20::from_raw(raw);
            let n = SpeedQ20::from_raw(-raw);
            assert_eq!(v.per_second(), -n.per_second());
            assert_eq!(v.distance_over(12_345), -n.distance_over(12_345));
        }
        for (d, t) in [(63, 977), (1, 3), (255, 1_000_001)] {
            assert_eq!(
                SpeedQ20::from_slope(d, t).raw(),
                -SpeedQ20::from_slope(-d, t).raw()
            );
        }
    }

    #[test]
    fn distance_inverts_slope() {
        let s = SpeedQ20::from_slope(64, 1000);
        assert_eq!(s.distance_over(1000), 63);
        assert_eq!(s.distance_over(0), 0);
    }

    #[test]
    fn saturation_never_overflows() {
        assert_eq!(SpeedQ20::from_slope(i32::MAX, 1), SpeedQ20::MAX);
        assert_eq!(SpeedQ20::from_slope(i32::MIN, 1), SpeedQ20::MIN);
        assert_eq!(SpeedQ20::MAX.distance_over(u32::MAX), i32::MAX);
        let _ = SpeedQ20::MIN.per_second();
    }

    #[test]
    fn bounded_applies_upper_then_lower() {
        let v = SpeedQ20::from_raw(50);
        assert_eq!(
            v.bounded(SpeedQ20::from_raw(0), SpeedQ20::from_raw(10)).raw(),
            10
        );
        assert_eq!(
            v.bounded(SpeedQ20::from_raw(60), SpeedQ20::from_raw(100)).raw(),
            60
        );
        // inverted bounds: lower wins
        assert_eq!(
            v.bounded(SpeedQ20::from_raw(20), SpeedQ20::from_raw(10)).raw(),
            20
        );
    }

    #[test]
    fn wrapping_time_differences() {
        assert_eq!(elapsed_us(5, u32::MAX - 4), 10);
        assert_eq!(elapsed_us(100, 150), -50);
        assert_eq!(wrapping_diff(i32::MIN, i32::MAX), 1);
    }
}
