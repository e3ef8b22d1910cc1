// Copyright 2026 the Vello Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

use std::cmp::Ordering;

use thiserror::Error;

/// Maximum number of breakpoints of a segmented equalization.
pub const HISTOGRAM_SEGMENTS_MAX: usize = 8;

pub const DEFAULT_BINS: u32 = 256;
pub const MIN_BINS: u32 = 2;
pub const MAX_BINS: u32 = 4096;

/// How scalar values are mapped to colors.
///
/// The discriminants are part of the uniform layout.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum HistogramMode {
    /// Lines are drawn with the line color, no histogram is built.
    None = 0,
    #[default]
    Equalization = 1,
    /// Two halves split at the middle of the bin range, equalized independently.
    BiEqualization = 2,
    /// The raw scalar addresses the colormap.
    ScalarColor = 3,
    SegmentedEqualization = 4,
}

impl HistogramMode {
    /// Whether the CDF of the histogram drives the coloring.
    pub fn uses_cdf(self) -> bool {
        matches!(
            self,
            Self::Equalization | Self::BiEqualization | Self::SegmentedEqualization
        )
    }

    pub fn uses_colormap(self) -> bool {
        self != Self::None
    }

    /// The breakpoints that drive the CDF stage for this mode.
    ///
    /// Only segmented equalization looks at `segments`.
    pub fn breakpoints(self, segments: &Segments) -> Segments {
        match self {
            Self::SegmentedEqualization => segments.clone(),
            Self::BiEqualization => Segments::bi(),
            _ => Segments::full(),
        }
    }
}

#[derive(Copy, Clone, Debug, Error, PartialEq, Eq)]
pub enum SegmentError {
    #[error("at least two segment breakpoints are required")]
    TooFew,
    #[error("at most {HISTOGRAM_SEGMENTS_MAX} segment breakpoints are supported")]
    TooMany,
    #[error("segment breakpoints must start at 0 and end at 1")]
    BadEndpoints,
    #[error("segment breakpoints must be strictly increasing")]
    NotIncreasing,
}

/// Validated breakpoints of a segmented equalization.
///
/// Breakpoints are strictly increasing, the first is `0` and the last is `1`.
#[derive(Clone, Debug, PartialEq)]
pub struct Segments(Vec<f32>);

impl Segments {
    pub fn new(breakpoints: &[f32]) -> Result<Self, SegmentError> {
        if breakpoints.len() < 2 {
            return Err(SegmentError::TooFew);
        }
        if breakpoints.len() > HISTOGRAM_SEGMENTS_MAX {
            return Err(SegmentError::TooMany);
        }
        if breakpoints[0] != 0.0 || breakpoints[breakpoints.len() - 1] != 1.0 {
            return Err(SegmentError::BadEndpoints);
        }
        // NaN compares as unordered and is rejected here too.
        if breakpoints
            .windows(2)
            .any(|w| w[0].partial_cmp(&w[1]) != Some(Ordering::Less))
        {
            return Err(SegmentError::NotIncreasing);
        }
        Ok(Self(breakpoints.to_vec()))
    }

    /// The single segment `[0, 1]`.
    pub fn full() -> Self {
        Self(vec![0.0, 1.0])
    }

    /// The two segments `[0, 0.5, 1]`.
    pub fn bi() -> Self {
        Self(vec![0.0, 0.5, 1.0])
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.0
    }

    /// Number of segments, one less than the number of breakpoints.
    pub fn count(&self) -> usize {
        self.0.len() - 1
    }

    /// Breakpoints padded to the fixed uniform layout, unused slots are `-1`.
    pub fn padded(&self) -> [f32; HISTOGRAM_SEGMENTS_MAX] {
        let mut out = [-1.0; HISTOGRAM_SEGMENTS_MAX];
        out[..self.0.len()].copy_from_slice(&self.0);
        out
    }

    /// Bin ranges `[start, end)` covered by each segment for `n_bins` bins.
    pub fn bin_ranges(&self, n_bins: u32) -> impl Iterator<Item = (u32, u32)> + '_ {
        self.0
            .windows(2)
            .map(move |w| (breakpoint_bin(w[0], n_bins), breakpoint_bin(w[1], n_bins)))
    }
}

impl Default for Segments {
    fn default() -> Self {
        Self::bi()
    }
}

/// First bin at or after a breakpoint.
pub(crate) fn breakpoint_bin(breakpoint: f32, n_bins: u32) -> u32 {
    ((breakpoint * n_bins as f32 + 0.5).floor() as u32).min(n_bins)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validates_breakpoints() {
        assert_eq!(Segments::new(&[0.0]), Err(SegmentError::TooFew));
        assert_eq!(Segments::new(&[0.0; 9]), Err(SegmentError::TooMany));
        assert_eq!(Segments::new(&[0.1, 1.0]), Err(SegmentError::BadEndpoints));
        assert_eq!(Segments::new(&[0.0, 0.9]), Err(SegmentError::BadEndpoints));
        assert_eq!(
            Segments::new(&[0.0, 0.6, 0.4, 1.0]),
            Err(SegmentError::NotIncreasing)
        );
        assert_eq!(
            Segments::new(&[0.0, f32::NAN, 1.0]),
            Err(SegmentError::NotIncreasing)
        );
        assert!(Segments::new(&[0.0, 0.2, 0.7, 1.0]).is_ok());
    }

    #[test]
    fn bin_ranges_cover_every_bin() {
        let segments = Segments::new(&[0.0, 0.3, 0.5, 1.0]).unwrap();
        let ranges: Vec<_> = segments.bin_ranges(10).collect();
        assert_eq!(ranges, vec![(0, 3), (3, 5), (5, 10)]);
    }

    #[test]
    fn modes_pick_breakpoints() {
        let user = Segments::new(&[0.0, 0.25, 1.0]).unwrap();
        assert_eq!(
            HistogramMode::Equalization.breakpoints(&user),
            Segments::full()
        );
        assert_eq!(HistogramMode::BiEqualization.breakpoints(&user), Segments::bi());
        assert_eq!(HistogramMode::SegmentedEqualization.breakpoints(&user), user);
        assert!(!HistogramMode::ScalarColor.uses_cdf());
        assert!(HistogramMode::ScalarColor.uses_colormap());
        assert!(!HistogramMode::None.uses_colormap());
    }

    #[test]
    fn padded_marks_unused_slots() {
        let padded = Segments::bi().padded();
        assert_eq!(&padded[..3], &[0.0, 0.5, 1.0]);
        assert!(padded[3..].iter().all(|&b| b == -1.0));
    }
}
