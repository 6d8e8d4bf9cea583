//! One-dimensional histograms and profiles as stored in ROOT files.
//!
//! Cells follow ROOT numbering: cell 0 is the underflow, cells `1..=n_bins`
//! are the bins and cell `n_bins + 1` is the overflow.

use crate::error::{Result, RootError};

/// Which ROOT class a [`Histogram`] was read from / is written as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistogramKind {
    /// `TH1D`: f64 cell sums.
    Th1D,
    /// `TH1F`: f32 cell sums.
    Th1F,
    /// `TProfile`: per-cell mean of y.
    Profile,
}

impl HistogramKind {
    /// ROOT class name.
    pub fn class_name(self) -> &'static str {
        match self {
            HistogramKind::Th1D => "TH1D",
            HistogramKind::Th1F => "TH1F",
            HistogramKind::Profile => "TProfile",
        }
    }
}

/// X-axis binning.
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    /// Number of bins (excluding under/overflow).
    pub n_bins: usize,
    /// Lower edge of first bin.
    pub x_min: f64,
    /// Upper edge of last bin.
    pub x_max: f64,
    /// Variable bin edges (`n_bins + 1` values); empty for uniform binning.
    pub edges: Vec<f64>,
}

impl Axis {
    /// Bin edges, computed for uniform binning.
    pub fn bin_edges(&self) -> Vec<f64> {
        if !self.edges.is_empty() {
            return self.edges.clone();
        }
        let width = (self.x_max - self.x_min) / self.n_bins as f64;
        (0..=self.n_bins).map(|i| self.x_min + i as f64 * width).collect()
    }

    /// Cell index for `x` (0 = underflow, `n_bins + 1` = overflow).
    pub fn find_bin(&self, x: f64) -> usize {
        if x.is_nan() || x < self.x_min {
            return 0;
        }
        if x >= self.x_max {
            return self.n_bins + 1;
        }
        if self.edges.is_empty() {
            let width = (self.x_max - self.x_min) / self.n_bins as f64;
            let bin = ((x - self.x_min) / width) as usize + 1;
            bin.min(self.n_bins)
        } else {
            // Number of edges <= x is the 1-based bin.
            self.edges.partition_point(|&e| e <= x).clamp(1, self.n_bins)
        }
    }
}

/// Global fill statistics kept by TH1.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Stats {
    /// Number of fills.
    pub entries: f64,
    /// Sum of weights.
    pub tsumw: f64,
    /// Sum of squared weights.
    pub tsumw2: f64,
    /// Sum of w·x.
    pub tsumwx: f64,
    /// Sum of w·x².
    pub tsumwx2: f64,
}

/// Extra per-cell sums of a `TProfile`.
#[derive(Debug, Clone, PartialEq)]
pub struct ProfileCells {
    /// Sum of weights per cell (`fBinEntries`).
    pub bin_entries: Vec<f64>,
    /// Sum of squared weights per cell (`fBinSumw2`), empty until a non-unit weight is filled.
    pub bin_sumw2: Vec<f64>,
    /// Error mode (`fErrorMode`, 0 = error on the mean).
    pub error_mode: i32,
    /// Lower y limit (`fYmin`); equal to `y_max` means unlimited.
    pub y_min: f64,
    /// Upper y limit (`fYmax`).
    pub y_max: f64,
    /// Sum of w·y.
    pub tsumwy: f64,
    /// Sum of w·y².
    pub tsumwy2: f64,
}

/// A 1D histogram or profile.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram {
    /// Histogram name.
    pub name: String,
    /// Histogram title.
    pub title: String,
    kind: HistogramKind,
    axis: Axis,
    /// Raw cell sums including under/overflow; for profiles, Σ w·y.
    cells: Vec<f64>,
    /// Σ w² per cell (for profiles, Σ w·y²), if stored.
    sumw2: Option<Vec<f64>>,
    profile: Option<ProfileCells>,
    stats: Stats,
}

impl Histogram {
    /// Empty `TH1D` with `n_bins` uniform bins on `[x_min, x_max)`.
    pub fn new(name: &str, title: &str, n_bins: usize, x_min: f64, x_max: f64) -> Result<Self> {
        let axis = uniform_axis(n_bins, x_min, x_max)?;
        Ok(Self::empty(name, title, HistogramKind::Th1D, axis))
    }

    /// Empty `TH1D` with variable bin edges.
    pub fn with_edges(name: &str, title: &str, edges: &[f64]) -> Result<Self> {
        if edges.len() < 2 || edges.windows(2).any(|w| w[1] <= w[0]) {
            return Err(RootError::Serialization(format!(
                "{name}: bin edges must be strictly increasing with at least two values"
            )));
        }
        let axis = Axis {
            n_bins: edges.len() - 1,
            x_min: edges[0],
            x_max: edges[edges.len() - 1],
            edges: edges.to_vec(),
        };
        Ok(Self::empty(name, title, HistogramKind::Th1D, axis))
    }

    /// Empty `TProfile` with `n_bins` uniform bins on `[x_min, x_max)`.
    pub fn new_profile(name: &str, title: &str, n_bins: usize, x_min: f64, x_max: f64) -> Result<Self> {
        let axis = uniform_axis(n_bins, x_min, x_max)?;
        let mut h = Self::empty(name, title, HistogramKind::Profile, axis);
        h.sumw2 = Some(vec![0.0; n_bins + 2]);
        h.profile = Some(ProfileCells {
            bin_entries: vec![0.0; n_bins + 2],
            bin_sumw2: Vec::new(),
            error_mode: 0,
            y_min: 0.0,
            y_max: 0.0,
            tsumwy: 0.0,
            tsumwy2: 0.0,
        });
        Ok(h)
    }

    fn empty(name: &str, title: &str, kind: HistogramKind, axis: Axis) -> Self {
        let n_cells = axis.n_bins + 2;
        Self {
            name: name.to_string(),
            title: title.to_string(),
            kind,
            axis,
            cells: vec![0.0; n_cells],
            sumw2: None,
            profile: None,
            stats: Stats::default(),
        }
    }

    /// Assemble a histogram from decoded streamer parts.
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn from_parts(
        name: String,
        title: String,
        kind: HistogramKind,
        axis: Axis,
        cells: Vec<f64>,
        sumw2: Option<Vec<f64>>,
        profile: Option<ProfileCells>,
        stats: Stats,
    ) -> Result<Self> {
        let n_cells = axis.n_bins + 2;
        if cells.len() != n_cells {
            return Err(RootError::Deserialization(format!(
                "{name}: {} cells for {} bins",
                cells.len(),
                axis.n_bins
            )));
        }
        if let Some(p) = &profile {
            if p.bin_entries.len() != n_cells {
                return Err(RootError::Deserialization(format!(
                    "{name}: {} bin entries for {} cells",
                    p.bin_entries.len(),
                    n_cells
                )));
            }
        }
        let sumw2 = sumw2.filter(|s| s.len() == n_cells);
        Ok(Self { name, title, kind, axis, cells, sumw2, profile, stats })
    }

    /// ROOT class this histogram maps to.
    pub fn kind(&self) -> HistogramKind {
        self.kind
    }

    /// Whether this is a `TProfile`.
    pub fn is_profile(&self) -> bool {
        self.kind == HistogramKind::Profile
    }

    /// Binning of the x axis.
    pub fn axis(&self) -> &Axis {
        &self.axis
    }

    /// Number of bins (excluding under/overflow).
    pub fn n_bins(&self) -> usize {
        self.axis.n_bins
    }

    /// Bin edges (`n_bins + 1` values).
    pub fn bin_edges(&self) -> Vec<f64> {
        self.axis.bin_edges()
    }

    /// Number of fills.
    pub fn entries(&self) -> f64 {
        self.stats.entries
    }

    /// Global fill statistics.
    pub fn stats(&self) -> &Stats {
        &self.stats
    }

    /// Raw cell sums including under/overflow.
    pub fn raw_cells(&self) -> &[f64] {
        &self.cells
    }

    /// Per-cell Σ w² (Σ w·y² for profiles), if stored.
    pub fn sumw2(&self) -> Option<&[f64]> {
        self.sumw2.as_deref()
    }

    /// Profile sums, for `TProfile`.
    pub fn profile_cells(&self) -> Option<&ProfileCells> {
        self.profile.as_ref()
    }

    /// Content of cell `bin` in ROOT numbering; 0 outside `0..=n_bins + 1`.
    ///
    /// For a profile this is the mean y of the cell, and 0 for a cell
    /// without entries.
    pub fn bin_content(&self, bin: usize) -> f64 {
        let Some(&sum) = self.cells.get(bin) else {
            return 0.0;
        };
        match &self.profile {
            Some(p) => {
                let w = p.bin_entries[bin];
                if w == 0.0 { 0.0 } else { sum / w }
            }
            None => sum,
        }
    }

    /// Sum of weights in cell `bin` (profiles), or the cell content.
    pub fn bin_entries(&self, bin: usize) -> f64 {
        match &self.profile {
            Some(p) => p.bin_entries.get(bin).copied().unwrap_or(0.0),
            None => self.cells.get(bin).copied().unwrap_or(0.0),
        }
    }

    /// Contents of bins `1..=n_bins`.
    pub fn contents(&self) -> Vec<f64> {
        (1..=self.axis.n_bins).map(|b| self.bin_content(b)).collect()
    }

    /// Cell index for `x`.
    pub fn find_bin(&self, x: f64) -> usize {
        self.axis.find_bin(x)
    }

    /// Add weight `w` at `x` (`TH1D`/`TH1F`).
    pub fn fill(&mut self, x: f64, w: f64) -> Result<usize> {
        if self.is_profile() {
            return Err(RootError::UnsupportedClass(format!(
                "{}: fill(x, w) on a TProfile, use fill_profile",
                self.name
            )));
        }
        let bin = self.find_bin(x);
        self.cells[bin] += w;
        if let Some(s) = self.sumw2.as_mut() {
            s[bin] += w * w;
        } else if w != 1.0 {
            // ROOT starts tracking Σw² at the first non-unit weight.
            let mut s = self.cells.clone();
            s[bin] += w * w - w;
            self.sumw2 = Some(s);
        }
        self.record_stats(bin, x, w);
        Ok(bin)
    }

    /// Add `y` with weight `w` at `x` (`TProfile`).
    pub fn fill_profile(&mut self, x: f64, y: f64, w: f64) -> Result<usize> {
        let bin = self.find_bin(x);
        let Some(p) = self.profile.as_mut() else {
            return Err(RootError::UnsupportedClass(format!(
                "{}: fill_profile on a {}",
                self.name,
                self.kind.class_name()
            )));
        };
        if p.y_min != p.y_max && (y < p.y_min || y > p.y_max) {
            return Ok(bin);
        }

        self.cells[bin] += w * y;
        if let Some(s) = self.sumw2.as_mut() {
            s[bin] += w * y * y;
        }
        p.bin_entries[bin] += w;
        if !p.bin_sumw2.is_empty() {
            p.bin_sumw2[bin] += w * w;
        } else if w != 1.0 {
            let mut s = p.bin_entries.clone();
            s[bin] += w * w - w;
            p.bin_sumw2 = s;
        }
        if bin != 0 && bin != self.axis.n_bins + 1 {
            p.tsumwy += w * y;
            p.tsumwy2 += w * y * y;
        }
        self.record_stats(bin, x, w);
        Ok(bin)
    }

    fn record_stats(&mut self, bin: usize, x: f64, w: f64) {
        self.stats.entries += 1.0;
        if bin == 0 || bin == self.axis.n_bins + 1 {
            return;
        }
        self.stats.tsumw += w;
        self.stats.tsumw2 += w * w;
        self.stats.tsumwx += w * x;
        self.stats.tsumwx2 += w * x * x;
    }
}

fn uniform_axis(n_bins: usize, x_min: f64, x_max: f64) -> Result<Axis> {
    if n_bins == 0 || !(x_min < x_max) {
        return Err(RootError::Serialization(format!(
            "invalid binning: {n_bins} bins on [{x_min}, {x_max})"
        )));
    }
    Ok(Axis { n_bins, x_min, x_max, edges: Vec::new() })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn find_bin_uniform() {
        let h = Histogram::new("h", "", 10, 0.0, 1.0).unwrap();
        assert_eq!(h.find_bin(-0.1), 0);
        assert_eq!(h.find_bin(0.0), 1);
        assert_eq!(h.find_bin(0.55), 6);
        assert_eq!(h.find_bin(0.999_999), 10);
        assert_eq!(h.find_bin(1.0), 11);
    }

    #[test]
    fn find_bin_variable() {
        let h = Histogram::with_edges("h", "", &[0.0, 1.0, 3.0, 10.0]).unwrap();
        assert_eq!(h.find_bin(0.5), 1);
        assert_eq!(h.find_bin(1.0), 2);
        assert_eq!(h.find_bin(9.0), 3);
        assert_eq!(h.find_bin(10.0), 4);
    }

    #[test]
    fn bin_content_out_of_range_is_zero() {
        let mut h = Histogram::new("h", "", 4, 0.0, 4.0).unwrap();
        h.fill(2.5, 3.0).unwrap();
        assert_eq!(h.bin_content(3), 3.0);
        assert_eq!(h.bin_content(99), 0.0);
        assert_eq!(h.contents(), vec![0.0, 0.0, 3.0, 0.0]);
        assert_eq!(h.sumw2().unwrap()[3], 9.0);
    }

    #[test]
    fn profile_mean_per_bin() {
        let mut p = Histogram::new_profile("p", "", 3, 0.5, 3.5).unwrap();
        p.fill_profile(1.0, 0.2, 1.0).unwrap();
        p.fill_profile(1.0, 0.4, 1.0).unwrap();
        p.fill_profile(3.0, -1.0, 2.0).unwrap();

        assert_relative_eq!(p.bin_content(1), 0.3, epsilon = 1e-12);
        assert_eq!(p.bin_content(2), 0.0);
        assert_relative_eq!(p.bin_content(3), -1.0);
        assert_eq!(p.bin_entries(3), 2.0);
        assert_eq!(p.entries(), 3.0);
        assert_eq!(p.profile_cells().unwrap().bin_sumw2[3], 4.0);
    }

    #[test]
    fn fill_kind_mismatch_is_an_error() {
        let mut p = Histogram::new_profile("p", "", 3, 0.0, 3.0).unwrap();
        assert!(p.fill(1.0, 1.0).is_err());
        let mut h = Histogram::new("h", "", 3, 0.0, 3.0).unwrap();
        assert!(h.fill_profile(1.0, 1.0, 1.0).is_err());
    }

    #[test]
    fn invalid_binning_is_rejected() {
        assert!(Histogram::new("h", "", 0, 0.0, 1.0).is_err());
        assert!(Histogram::new("h", "", 5, 1.0, 1.0).is_err());
        assert!(Histogram::with_edges("h", "", &[0.0, 2.0, 1.0]).is_err());
    }
}
