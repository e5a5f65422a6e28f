//! Bit-exact equivalence checking
//!
//! Integer convolution has no rounding, so two correct engines agree on every
//! element. There is no tolerance: a single differing bit fails the check.

use crate::error::{Result, TileError};
use crate::tensor::{Element, Tensor};
use serde::Serialize;
use std::fmt;
use tracing::{info, warn};

/// Mismatches recorded in a report unless configured otherwise
pub const DEFAULT_MAX_RECORDED: usize = 16;

/// One differing element
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Mismatch {
    /// Tensor coordinate
    pub index: Vec<usize>,
    /// Value from the reference
    pub expected: i64,
    /// Value from the candidate
    pub actual: i64,
}

/// Outcome of comparing two tensors
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EquivalenceReport {
    /// Elements compared
    pub checked: usize,
    /// Total differing elements
    pub mismatch_count: usize,
    /// First mismatches in row-major order, up to the recording limit
    pub mismatches: Vec<Mismatch>,
}

impl EquivalenceReport {
    /// True iff every element matched
    pub const fn is_pass(&self) -> bool {
        self.mismatch_count == 0
    }

    /// First mismatch, if any
    pub fn first(&self) -> Option<&Mismatch> {
        self.mismatches.first()
    }

    /// Emit the report through `tracing`
    pub fn log(&self, label: &str) {
        if self.is_pass() {
            info!("{label}: PASS ({} elements identical)", self.checked);
            return;
        }
        warn!(
            "{label}: FAIL ({} of {} elements differ)",
            self.mismatch_count, self.checked
        );
        for m in &self.mismatches {
            warn!(
                "{label}: {:?} expected {} got {}",
                m.index, m.expected, m.actual
            );
        }
    }
}

impl fmt::Display for EquivalenceReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_pass() {
            return write!(f, "PASS: {} elements identical", self.checked);
        }
        write!(
            f,
            "FAIL: {} of {} elements differ",
            self.mismatch_count, self.checked
        )?;
        for m in &self.mismatches {
            write!(
                f,
                "\n  {:?}: expected {} ({:#x}), got {} ({:#x})",
                m.index, m.expected, m.expected, m.actual, m.actual
            )?;
        }
        let hidden = self.mismatch_count - self.mismatches.len();
        if hidden > 0 {
            write!(f, "\n  ... {hidden} more")?;
        }
        Ok(())
    }
}

/// Element-by-element comparator
#[derive(Debug, Clone, Copy)]
pub struct EquivalenceChecker {
    max_recorded: usize,
}

impl Default for EquivalenceChecker {
    fn default() -> Self {
        Self::new()
    }
}

impl EquivalenceChecker {
    /// Checker recording up to [`DEFAULT_MAX_RECORDED`] mismatches
    pub const fn new() -> Self {
        Self {
            max_recorded: DEFAULT_MAX_RECORDED,
        }
    }

    /// Limit how many mismatches are kept in the report (the count is always exact)
    #[must_use]
    pub const fn with_max_recorded(mut self, n: usize) -> Self {
        self.max_recorded = n;
        self
    }

    /// Compare `actual` against `expected`, visiting coordinates in row-major order
    ///
    /// # Errors
    ///
    /// Returns [`TileError::ShapeMismatch`] if the extents differ.
    pub fn compare<T: Element, const R: usize>(
        &self,
        expected: &Tensor<T, R>,
        actual: &Tensor<T, R>,
    ) -> Result<EquivalenceReport> {
        if expected.extents() != actual.extents() {
            return Err(TileError::shape_mismatch(
                "candidate",
                &expected.extents(),
                &actual.extents(),
            ));
        }

        let mut report = EquivalenceReport {
            checked: 0,
            mismatch_count: 0,
            mismatches: Vec::new(),
        };
        let pairs = expected.as_slice().iter().zip(actual.as_slice());
        for (index, (&e, &a)) in expected.indices().zip(pairs) {
            report.checked += 1;
            if e != a {
                report.mismatch_count += 1;
                if report.mismatches.len() < self.max_recorded {
                    report.mismatches.push(Mismatch {
                        index: index.to_vec(),
                        expected: e.to_i64(),
                        actual: a.to_i64(),
                    });
                }
            }
        }
        Ok(report)
    }
}
