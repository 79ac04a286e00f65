//! Size-constrained quality search
//!
//! Finds the highest quality step whose encoding fits a byte budget by
//! walking down from `start` to `floor` in fixed `step`s. Encoders are only
//! roughly monotonic in quality vs size, so every step is visited instead of
//! bisecting; a lower step can occasionally produce a larger file.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{PageKitError, Result};

/// Linear descent parameters. Qualities are on the 1-100 scale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QualitySearch {
    pub start: u8,
    pub floor: u8,
    pub step: u8,
}

impl Default for QualitySearch {
    fn default() -> Self {
        Self {
            start: 100,
            floor: 10,
            step: 5,
        }
    }
}

/// A successful encoding within budget.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Compressed {
    pub bytes: Vec<u8>,
    pub quality: u8,
    /// Number of encode calls it took.
    pub attempts: usize,
}

impl QualitySearch {
    pub fn new(start: u8, floor: u8, step: u8) -> Result<Self> {
        let search = Self { start, floor, step };
        search.check()?;
        Ok(search)
    }

    /// Reject parameter combinations that would not terminate or leave the 1-100 scale.
    pub fn check(&self) -> Result<()> {
        if self.step == 0 {
            return Err(PageKitError::Configuration(
                "quality step must be at least 1".into(),
            ));
        }
        if self.floor == 0 {
            return Err(PageKitError::Configuration(
                "quality floor must be at least 1".into(),
            ));
        }
        if self.start > 100 {
            return Err(PageKitError::Configuration(format!(
                "quality start {} exceeds 100",
                self.start
            )));
        }
        if self.floor > self.start {
            return Err(PageKitError::Configuration(format!(
                "quality floor {} is above start {}",
                self.floor, self.start
            )));
        }
        Ok(())
    }

    /// Upper bound on encode calls: ceil((start - floor) / step) + 1.
    pub fn max_attempts(&self) -> Result<usize> {
        self.check()?;
        let span = (self.start - self.floor) as usize;
        let step = self.step as usize;
        Ok(span.div_ceil(step) + 1)
    }

    /// Encode at decreasing qualities until the output fits in `target_bytes`.
    ///
    /// Fails with [`PageKitError::SizeTargetUnreachable`] carrying the
    /// encoding made at `floor`. Errors from `encode` abort the search.
    pub fn search<F>(&self, target_bytes: usize, mut encode: F) -> Result<Compressed>
    where
        F: FnMut(u8) -> Result<Vec<u8>>,
    {
        self.check()?;

        let mut quality = self.start;
        let mut attempts = 0;
        loop {
            let bytes = encode(quality)?;
            attempts += 1;
            debug!(
                "quality {} -> {} bytes (target {})",
                quality,
                bytes.len(),
                target_bytes
            );

            if bytes.len() <= target_bytes {
                return Ok(Compressed {
                    bytes,
                    quality,
                    attempts,
                });
            }

            if quality <= self.floor {
                return Err(PageKitError::SizeTargetUnreachable {
                    target_bytes,
                    quality,
                    artifact: bytes,
                });
            }

            quality = quality.saturating_sub(self.step).max(self.floor);
        }
    }
}
