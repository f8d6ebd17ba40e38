//! Progress contract between the orchestrator and the UI.
//!
//! Values are whole percentages in `[0, 100]`. Within one attempt they never
//! decrease, `0` is always emitted first, and `100` is emitted exactly once,
//! only when the staged release has been validated.

/// Enforces the progress contract over a raw callback.
pub struct ProgressTracker<'a> {
    sink: &'a mut dyn FnMut(u8),
    last: Option<u8>,
    finished: bool,
}

impl<'a> ProgressTracker<'a> {
    /// Wrap `sink`. Nothing is emitted until [`ProgressTracker::start`] or
    /// the first [`ProgressTracker::report`].
    pub fn new(sink: &'a mut dyn FnMut(u8)) -> Self {
        Self {
            sink,
            last: None,
            finished: false,
        }
    }

    /// Emit `0` unless something was emitted already.
    pub fn start(&mut self) {
        if self.last.is_none() {
            self.emit(0);
        }
    }

    /// Report a percentage. Regressions and repeats are dropped; `100` is
    /// held back for [`ProgressTracker::finish`].
    pub fn report(&mut self, value: u8) {
        if self.finished || value >= 100 {
            return;
        }
        if self.last.is_none_or(|last| value > last) {
            self.emit(value);
        }
    }

    /// Emit the final `100`. Later calls are no-ops.
    pub fn finish(&mut self) {
        if !self.finished {
            self.start();
            self.finished = true;
            self.emit(100);
        }
    }

    fn emit(&mut self, value: u8) {
        self.last = Some(value);
        (self.sink)(value);
    }
}

/// Map `fraction` of the way through `lo..hi` to a percentage.
pub fn band(lo: u8, hi: u8, fraction: f64) -> u8 {
    let fraction = if fraction.is_finite() {
        fraction.clamp(0.0, 1.0)
    } else {
        0.0
    };
    let span = f64::from(hi.saturating_sub(lo));
    let value = f64::from(lo) + span * fraction;
    value.floor().clamp(0.0, 100.0) as u8
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used, clippy::expect_used)]

    use super::*;

    fn collect(f: impl FnOnce(&mut ProgressTracker<'_>)) -> Vec<u8> {
        let mut seen = Vec::new();
        {
            let mut sink = |v: u8| seen.push(v);
            let mut tracker = ProgressTracker::new(&mut sink);
            f(&mut tracker);
        }
        seen
    }

    #[test]
    fn passes_through_increasing_values() {
        let seen = collect(|t| {
            t.start();
            t.report(0);
            t.report(10);
            t.report(50);
            t.report(100);
            t.finish();
        });
        assert_eq!(seen, vec![0, 10, 50, 100]);
    }

    #[test]
    fn drops_regressions_and_repeats() {
        let seen = collect(|t| {
            t.start();
            t.report(30);
            t.report(20);
            t.report(30);
            t.report(31);
        });
        assert_eq!(seen, vec![0, 30, 31]);
    }

    #[test]
    fn hundred_only_on_finish() {
        let seen = collect(|t| {
            t.start();
            t.report(100);
            t.report(99);
        });
        assert_eq!(seen, vec![0, 99]);

        let seen = collect(|t| {
            t.finish();
            t.finish();
            t.report(50);
        });
        assert_eq!(seen, vec![0, 100]);
    }

    #[test]
    fn band_mapping() {
        assert_eq!(band(0, 70, 0.0), 0);
        assert_eq!(band(0, 70, 0.5), 35);
        assert_eq!(band(0, 70, 1.0), 70);
        assert_eq!(band(75, 99, 2.0), 99);
        assert_eq!(band(75, 99, f64::NAN), 75);
    }
}
