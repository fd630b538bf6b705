//! Trainable-parameter accounting

use std::fmt;

/// Trainable parameter counts around a patch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ParamDelta {
    pub before: usize,
    pub after: usize,
}

impl ParamDelta {
    pub fn new(before: usize, after: usize) -> Self {
        Self { before, after }
    }

    /// `(before − after) / before`; positive when the patch removed parameters
    pub fn fraction(&self) -> f64 {
        if self.before == 0 {
            return 0.0;
        }
        (self.before as f64 - self.after as f64) / self.before as f64
    }

    /// Magnitude of the change in whole percentage points
    ///
    /// Uses [`f64::round`], so an exact half rounds away from zero: 12.5 becomes
    /// 13, where round-half-to-even would print 12.
    pub fn percent(&self) -> u64 {
        (self.fraction().abs() * 100.0).round() as u64
    }

    pub fn direction(&self) -> &'static str {
        match self.after.cmp(&self.before) {
            std::cmp::Ordering::Less => "reduced",
            std::cmp::Ordering::Greater => "increased",
            std::cmp::Ordering::Equal => "unchanged",
        }
    }
}

impl fmt::Display for ParamDelta {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.before == self.after {
            return write!(f, "Trainable parameters unchanged at {}", self.before);
        }
        write!(
            f,
            "Trainable parameters {} from {} to {} ({}%)",
            self.direction(),
            self.before,
            self.after,
            self.percent()
        )
    }
}
