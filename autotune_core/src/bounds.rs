//! Absolute travel limits and the derived soft ("test") envelope.

use crate::error::AutotuneError;

/// Limits of the mechanism plus the envelope derived from them.
///
/// `min`/`max` are stored as configured. The derived fields are computed over
/// the ordered pair, so an out-of-order configuration never yields an inverted
/// envelope.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Bounds {
    pub min: f64,
    pub max: f64,
    pub center: f64,
    pub test_min: f64,
    pub test_max: f64,
}

impl Bounds {
    /// Derive center and soft limits. `inset_fraction` must already be validated.
    pub fn compute(min: f64, max: f64, inset_fraction: f64) -> Self {
        let (lo, hi) = if min <= max { (min, max) } else { (max, min) };
        let center = (lo + hi) / 2.0;
        let range = hi - lo;
        let test_padding = if inset_fraction == 0.0 {
            0.0
        } else {
            range / inset_fraction
        };
        Self {
            min,
            max,
            center,
            // Clamp against center so rounding at fraction == 2 cannot cross it.
            test_min: (lo + test_padding).min(center),
            test_max: (hi - test_padding).max(center),
        }
    }

    /// Width of the absolute envelope.
    pub fn range(&self) -> f64 {
        (self.max - self.min).abs()
    }

    pub fn is_ordered(&self) -> bool {
        self.min <= self.max
    }

    /// Whether `position` lies inside the soft envelope (inclusive).
    #[inline]
    pub fn in_test_bounds(&self, position: f64) -> bool {
        position >= self.test_min && position <= self.test_max
    }

    /// Padding applied on each side of the absolute envelope.
    pub fn test_padding(&self) -> f64 {
        self.test_min - self.min.min(self.max)
    }
}

/// Accept 0 (inset disabled) or any finite value >= 2.
///
/// Values in (0, 2) would inset each side by more than half the range and
/// invert the envelope.
pub fn validate_inset_fraction(fraction: f64) -> Result<f64, AutotuneError> {
    if fraction == 0.0 || (fraction.is_finite() && fraction >= 2.0) {
        Ok(fraction)
    } else {
        Err(AutotuneError::InvalidInsetFraction(fraction))
    }
}
