use std::ops::Range;

/// Aggregates linear magnitude bins into a fixed number of log-spaced bands.
///
/// Band `b` of `B` spans the bins between `exp(lerp(ln f_min, ln f_max, t))`
/// for `t = b/B` and `t = (b+1)/B`, where `f_min` is bin 1 and `f_max` is the
/// last bin below Nyquist. The upper edge is pushed at least one bin above the
/// lower edge so low bands never come out empty.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BandMapper {
    bins: usize,
    ranges: Vec<Range<usize>>,
}

impl BandMapper {
    /// Precomputes the bin range of each of `bands` bands over a spectrum of
    /// `bins` linear bins.
    pub fn new(bins: usize, bands: usize) -> Self {
        let min_bin = 1.0f64;
        let max_bin = (bins as f64 - 1.0).max(min_bin);
        // exp(ln a·(1−t) + ln b·t), written so t = 1 lands exactly on b.
        let log_map = |t: f64| min_bin.powf(1.0 - t) * max_bin.powf(t);

        let ranges = (0..bands)
            .map(|band| {
                let t0 = band as f64 / bands as f64;
                let t1 = (band + 1) as f64 / bands as f64;
                let lower = log_map(t0).max(1.0);
                let upper = log_map(t1).max(lower + 1.0);

                let start = lower as usize;
                let end = (upper as usize).min(bins);
                start..end.max(start)
            })
            .collect();

        Self { bins, ranges }
    }

    /// Number of output bands.
    pub fn len(&self) -> usize {
        self.ranges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ranges.is_empty()
    }

    /// Number of linear bins the mapper expects.
    pub fn bins(&self) -> usize {
        self.bins
    }

    pub fn ranges(&self) -> &[Range<usize>] {
        &self.ranges
    }

    /// First band whose bin range contains `bin`.
    pub fn band_for_bin(&self, bin: usize) -> Option<usize> {
        self.ranges.iter().position(|range| range.contains(&bin))
    }

    /// Averages `magnitudes` into `out` (resized to [`len`](Self::len)) and
    /// scales the result so the loudest band is 1. An all-zero frame stays
    /// all zero.
    pub fn map(&self, magnitudes: &[f32], out: &mut Vec<f32>) {
        debug_assert_eq!(magnitudes.len(), self.bins);

        out.clear();
        out.extend(self.ranges.iter().map(|range| {
            let len = magnitudes.len();
            let bins = &magnitudes[range.start.min(len)..range.end.min(len)];
            if bins.is_empty() {
                return 0.0;
            }
            let sum: f64 = bins.iter().map(|&m| m as f64).sum();
            (sum / bins.len() as f64) as f32
        }));

        normalize(out);
    }
}

/// Divides every entry by the maximum. Skipped when the maximum is not
/// positive, which keeps silence at exactly zero.
fn normalize(values: &mut [f32]) {
    let max = values.iter().cloned().fold(0.0f32, f32::max);
    if max > 0.0 {
        for value in values.iter_mut() {
            *value /= max;
        }
    }
}
