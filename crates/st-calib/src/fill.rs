//! The pass that fills recentering and shift profiles from pico events.
//!
//! For centrality `c` and vertex-z bin `j`, with `φ` the track azimuth:
//!
//! * `recenter_cos<c>_<j>` / `recenter_sin<c>_<j>`: `cos(nφ)` / `sin(nφ)` at `x = n`,
//!   `n = 1..=harmonics`, every accepted track;
//! * `tpc_recenter_{N,P}_{cos,sin}<c>_<j>`: the same, split by the sign of η;
//! * `shift_cos<c>_<j>` / `shift_sin<c>_<j>` (shift vz binning): `cos(k·2Ψ)` /
//!   `sin(k·2Ψ)` at `x = k`, once per event, where Ψ is the second-order event
//!   plane built from recentred Q-vectors. Only filled when recentering
//!   tables are supplied.

use std::path::Path;

use serde::{Deserialize, Serialize};
use st_pico::{EventContext, Maker, MakerStatus, PicoEvent, PicoTrack};
use st_root::{Histogram, RootFile, RootFileWriter};

use crate::error::{CalibError, Result};
use crate::extract::{TableSpec, extract_table};
use crate::recipe::{N_CENTRALITY, N_HARMONICS, N_RECENTER_VZ, N_SHIFT_VZ};
use crate::table::CalibTable;

/// Binning and track selection of the calibration pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct FlowCalibConfig {
    pub n_centrality: usize,
    pub recenter_vz_bins: usize,
    pub shift_vz_bins: usize,
    pub vz_min: f64,
    pub vz_max: f64,
    /// Harmonics `n = 1..=harmonics` in the recentering profiles.
    pub harmonics: usize,
    /// Orders `k = 1..=shift_orders` in the shift profiles.
    pub shift_orders: usize,
    pub track_min_pt: f64,
    pub track_max_pt: f64,
    pub track_max_eta: f64,
    /// Fewest accepted tracks for an event plane.
    pub min_plane_tracks: usize,
}

impl Default for FlowCalibConfig {
    fn default() -> Self {
        Self {
            n_centrality: N_CENTRALITY,
            recenter_vz_bins: N_RECENTER_VZ,
            shift_vz_bins: N_SHIFT_VZ,
            vz_min: -70.0,
            vz_max: 70.0,
            harmonics: N_HARMONICS,
            shift_orders: N_HARMONICS,
            track_min_pt: 0.15,
            track_max_pt: 2.0,
            track_max_eta: 1.0,
            min_plane_tracks: 2,
        }
    }
}

impl FlowCalibConfig {
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let cfg: Self = serde_yaml_ng::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_yaml_str(&std::fs::read_to_string(path.as_ref())?)
    }

    pub fn validate(&self) -> Result<()> {
        let counts = [
            ("n_centrality", self.n_centrality),
            ("recenter_vz_bins", self.recenter_vz_bins),
            ("shift_vz_bins", self.shift_vz_bins),
            ("shift_orders", self.shift_orders),
        ];
        if let Some((what, _)) = counts.iter().find(|(_, n)| *n == 0) {
            return Err(CalibError::Shape(format!("{what} must be > 0")));
        }
        if self.harmonics < 2 {
            return Err(CalibError::Shape("harmonics must be >= 2 for the second-order plane".into()));
        }
        if self.vz_min.is_nan() || self.vz_max.is_nan() || self.vz_min >= self.vz_max {
            return Err(CalibError::Shape(format!("vz range [{}, {}) is empty", self.vz_min, self.vz_max)));
        }
        Ok(())
    }

    fn vz_bin(&self, vz: f64, n_bins: usize) -> Option<usize> {
        if vz.is_nan() || vz < self.vz_min || vz >= self.vz_max {
            return None;
        }
        let f = (vz - self.vz_min) / (self.vz_max - self.vz_min);
        Some(((f * n_bins as f64) as usize).min(n_bins - 1))
    }

    /// Specs of the recentering tables this pass fills (`recenter_A/B`).
    pub fn recenter_specs(&self) -> [TableSpec; 2] {
        let dims = [self.n_centrality, self.recenter_vz_bins, self.harmonics];
        [TableSpec::new("recenter_A", "recenter_cos", &dims), TableSpec::new("recenter_B", "recenter_sin", &dims)]
    }
}

/// ⟨cos nφ⟩ / ⟨sin nφ⟩ per centrality and vertex bin.
#[derive(Debug, Clone, PartialEq)]
pub struct RecenterCorrection {
    pub a: CalibTable,
    pub b: CalibTable,
}

impl RecenterCorrection {
    pub fn new(a: CalibTable, b: CalibTable, config: &FlowCalibConfig) -> Result<Self> {
        let dims = [config.n_centrality, config.recenter_vz_bins, config.harmonics];
        for t in [&a, &b] {
            if t.dims() != dims {
                return Err(CalibError::Shape(format!("{}{:?} does not match {dims:?}", t.name, t.dims())));
            }
        }
        Ok(Self { a, b })
    }

    /// Read `recenter_A/B` from a file of filled recentering profiles.
    pub fn from_file(file: &RootFile, config: &FlowCalibConfig) -> Result<Self> {
        let [sa, sb] = config.recenter_specs();
        Self::new(extract_table(file, &sa)?, extract_table(file, &sb)?, config)
    }

    /// Offsets `(⟨cos nφ⟩, ⟨sin nφ⟩)` for harmonic `n` (1-based).
    fn offsets(&self, cent: usize, vz: usize, n: usize) -> (f64, f64) {
        let idx = [cent, vz, n - 1];
        (self.a.get(&idx).unwrap_or(0.0), self.b.get(&idx).unwrap_or(0.0))
    }
}

/// A cos/sin pair of profile grids indexed `[centrality][vz]`.
struct ProfileGrid {
    cos: Vec<Histogram>,
    sin: Vec<Histogram>,
    n_vz: usize,
}

impl ProfileGrid {
    fn new(prefix: &str, n_cent: usize, n_vz: usize, n_x: usize) -> Result<Self> {
        let make = |kind: &str| -> Result<Vec<Histogram>> {
            let mut out = Vec::with_capacity(n_cent * n_vz);
            for c in 0..n_cent {
                for j in 0..n_vz {
                    let name = format!("{prefix}_{kind}{c}_{j}");
                    out.push(Histogram::new_profile(&name, "", n_x, 0.5, n_x as f64 + 0.5)?);
                }
            }
            Ok(out)
        };
        Ok(Self { cos: make("cos")?, sin: make("sin")?, n_vz })
    }

    fn fill(&mut self, cent: usize, vz: usize, x: usize, cos: f64, sin: f64) -> Result<()> {
        let i = cent * self.n_vz + vz;
        self.cos[i].fill_profile(x as f64, cos, 1.0)?;
        self.sin[i].fill_profile(x as f64, sin, 1.0)?;
        Ok(())
    }

    fn histograms(&self) -> impl Iterator<Item = &Histogram> {
        self.cos.iter().chain(&self.sin)
    }
}

/// Counters of a filling pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct FillStats {
    pub events_seen: u64,
    pub events_used: u64,
    pub tracks_used: u64,
    pub planes_filled: u64,
}

/// Accumulates calibration profiles over pico events.
pub struct FlowCalibFiller {
    config: FlowCalibConfig,
    recenter: ProfileGrid,
    tpc_n: ProfileGrid,
    tpc_p: ProfileGrid,
    shift: Option<(ProfileGrid, RecenterCorrection)>,
    stats: FillStats,
}

impl FlowCalibFiller {
    /// Recentering pass only.
    pub fn new(config: FlowCalibConfig) -> Result<Self> {
        config.validate()?;
        let (nc, nv, nh) = (config.n_centrality, config.recenter_vz_bins, config.harmonics);
        Ok(Self {
            recenter: ProfileGrid::new("recenter", nc, nv, nh)?,
            tpc_n: ProfileGrid::new("tpc_recenter_N", nc, nv, nh)?,
            tpc_p: ProfileGrid::new("tpc_recenter_P", nc, nv, nh)?,
            shift: None,
            config,
            stats: FillStats::default(),
        })
    }

    /// Also fill shift profiles, using `correction` to recentre Q-vectors.
    pub fn with_recenter(mut self, correction: RecenterCorrection) -> Result<Self> {
        let c = &self.config;
        let grid = ProfileGrid::new("shift", c.n_centrality, c.shift_vz_bins, c.shift_orders)?;
        self.shift = Some((grid, correction));
        Ok(self)
    }

    pub fn config(&self) -> &FlowCalibConfig {
        &self.config
    }

    pub fn stats(&self) -> FillStats {
        self.stats
    }

    /// Whether shift profiles are being filled.
    pub fn fills_shift(&self) -> bool {
        self.shift.is_some()
    }

    /// Track momentum used for flow: primary when available, global otherwise.
    fn flow_momentum(t: &PicoTrack) -> (f64, f64, f64) {
        let p = if t.is_primary() { t.p_mom() } else { t.g_mom() };
        (p.perp(), p.pseudo_rapidity(), p.phi())
    }

    /// Fill one event. Returns whether it fell inside the centrality and vz ranges.
    pub fn fill_event(&mut self, event: &PicoEvent) -> Result<bool> {
        self.stats.events_seen += 1;
        let cfg = &self.config;
        let Ok(cent) = usize::try_from(event.centrality) else {
            return Ok(false);
        };
        if cent >= cfg.n_centrality {
            return Ok(false);
        }
        let vz = event.vertex().z;
        let Some(j) = cfg.vz_bin(vz, cfg.recenter_vz_bins) else {
            return Ok(false);
        };

        let (mut qx, mut qy, mut n_plane) = (0.0, 0.0, 0usize);
        for t in &event.tracks {
            let (pt, eta, phi) = Self::flow_momentum(t);
            if pt < cfg.track_min_pt || pt > cfg.track_max_pt || eta.abs() > cfg.track_max_eta {
                continue;
            }
            self.stats.tracks_used += 1;

            for n in 1..=cfg.harmonics {
                let (s, c) = (n as f64 * phi).sin_cos();
                self.recenter.fill(cent, j, n, c, s)?;
                if eta < 0.0 {
                    self.tpc_n.fill(cent, j, n, c, s)?;
                } else if eta > 0.0 {
                    self.tpc_p.fill(cent, j, n, c, s)?;
                }
            }

            if let Some((_, corr)) = &self.shift {
                let (a, b) = corr.offsets(cent, j, 2);
                let (s, c) = (2.0 * phi).sin_cos();
                qx += c - a;
                qy += s - b;
                n_plane += 1;
            }
        }

        if let Some((grid, _)) = self.shift.as_mut() {
            let j_shift = cfg.vz_bin(vz, cfg.shift_vz_bins);
            if let Some(j_shift) = j_shift.filter(|_| n_plane >= cfg.min_plane_tracks && (qx != 0.0 || qy != 0.0)) {
                // 2Ψ directly: the shift terms are cos(k·2Ψ), sin(k·2Ψ).
                let two_psi = qy.atan2(qx);
                for k in 1..=cfg.shift_orders {
                    let (s, c) = (k as f64 * two_psi).sin_cos();
                    grid.fill(cent, j_shift, k, c, s)?;
                }
                self.stats.planes_filled += 1;
            }
        }

        self.stats.events_used += 1;
        Ok(true)
    }

    /// Every profile, recentering grids first.
    pub fn histograms(&self) -> impl Iterator<Item = &Histogram> {
        let shift = self.shift.as_ref().map(|(g, _)| g.histograms());
        self.recenter
            .histograms()
            .chain(self.tpc_n.histograms())
            .chain(self.tpc_p.histograms())
            .chain(shift.into_iter().flatten())
    }

    /// Queue every profile on `writer`.
    pub fn write_into(&self, writer: &mut RootFileWriter) -> Result<()> {
        for h in self.histograms() {
            writer.put_histogram(h)?;
        }
        Ok(())
    }

    /// Write every profile to a new ROOT file.
    pub fn write(&self, path: impl AsRef<Path>, compression: u32) -> Result<()> {
        let path = path.as_ref();
        let file_name = path.file_name().map_or_else(|| "calib.root".into(), |n| n.to_string_lossy().into_owned());
        let mut writer = RootFileWriter::new(&file_name).with_title("flow calibration").with_compression(compression);
        self.write_into(&mut writer)?;
        let n = writer.len();
        writer.write(path)?;
        log::info!("wrote {n} profiles to {}", path.display());
        Ok(())
    }
}

/// Runs a [`FlowCalibFiller`] on each pico event of a chain and writes the
/// profiles in `finish`.
pub struct FlowCalibMaker {
    filler: FlowCalibFiller,
    output: std::path::PathBuf,
    compression: u32,
}

impl FlowCalibMaker {
    pub fn new(filler: FlowCalibFiller, output: impl AsRef<Path>) -> Self {
        Self { filler, output: output.as_ref().to_path_buf(), compression: 1 }
    }

    pub fn with_compression(mut self, level: u32) -> Self {
        self.compression = level;
        self
    }

    pub fn filler(&self) -> &FlowCalibFiller {
        &self.filler
    }
}

impl Maker for FlowCalibMaker {
    fn name(&self) -> &str {
        "FlowCalib"
    }

    fn make(&mut self, ctx: &mut EventContext) -> st_pico::Result<MakerStatus> {
        let event = ctx.require_pico("FlowCalib")?;
        self.filler.fill_event(event)?;
        Ok(MakerStatus::Ok)
    }

    fn finish(&mut self) -> st_pico::Result<MakerStatus> {
        let s = self.filler.stats();
        log::info!(
            "FlowCalib: {} of {} events, {} tracks, {} event planes",
            s.events_used,
            s.events_seen,
            s.tracks_used,
            s.planes_filled
        );
        self.filler.write(&self.output, self.compression)?;
        Ok(MakerStatus::Ok)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use st_pico::ThreeVector;

    fn small_config() -> FlowCalibConfig {
        FlowCalibConfig {
            n_centrality: 2,
            recenter_vz_bins: 2,
            shift_vz_bins: 4,
            harmonics: 3,
            shift_orders: 2,
            ..FlowCalibConfig::default()
        }
    }

    fn event(cent: i16, vz: f32, phis: &[(f64, f64)]) -> PicoEvent {
        let tracks = phis
            .iter()
            .map(|&(phi, eta)| {
                let p = ThreeVector::new(phi.cos(), phi.sin(), eta.sinh());
                PicoTrack::new(1, p, p, ThreeVector::zero(), 1)
            })
            .collect();
        PicoEvent { centrality: cent, primary_vertex: [0.0, 0.0, vz], tracks, ..PicoEvent::default() }
    }

    fn find<'a>(f: &'a FlowCalibFiller, name: &str) -> &'a Histogram {
        f.histograms().find(|h| h.name == name).unwrap()
    }

    #[test]
    fn profile_names_and_count() {
        let f = FlowCalibFiller::new(small_config()).unwrap();
        assert_eq!(f.histograms().count(), 3 * 2 * 2 * 2);
        assert!(f.histograms().any(|h| h.name == "recenter_cos1_1"));
        assert!(f.histograms().any(|h| h.name == "tpc_recenter_N_sin0_1"));
        assert!(!f.fills_shift());
    }

    #[test]
    fn recenter_profiles_hold_mean_harmonics() {
        let mut f = FlowCalibFiller::new(small_config()).unwrap();
        // vz = 10 falls in the upper of two recentering vz bins.
        assert!(f.fill_event(&event(1, 10.0, &[(0.3, 0.5), (0.7, -0.5)])).unwrap());
        let h = find(&f, "recenter_cos1_1");
        for n in 1..=3 {
            let expected = ((n as f64 * 0.3).cos() + (n as f64 * 0.7).cos()) / 2.0;
            assert_abs_diff_eq!(h.bin_content(n), expected, epsilon = 1e-6);
        }
        assert_abs_diff_eq!(find(&f, "tpc_recenter_P_sin1_1").bin_content(2), (0.6f64).sin(), epsilon = 1e-6);
        assert_abs_diff_eq!(find(&f, "tpc_recenter_N_cos1_1").bin_content(1), (0.7f64).cos(), epsilon = 1e-6);
        assert_eq!(find(&f, "recenter_cos0_0").entries(), 0.0);
        assert_eq!(f.stats().tracks_used, 2);
    }

    #[test]
    fn out_of_range_events_are_ignored() {
        let mut f = FlowCalibFiller::new(small_config()).unwrap();
        assert!(!f.fill_event(&event(-1, 0.0, &[(0.1, 0.1)])).unwrap());
        assert!(!f.fill_event(&event(5, 0.0, &[(0.1, 0.1)])).unwrap());
        assert!(!f.fill_event(&event(0, 80.0, &[(0.1, 0.1)])).unwrap());
        assert_eq!(f.stats().events_used, 0);
        assert_eq!(f.stats().events_seen, 3);
    }

    #[test]
    fn shift_profiles_use_recentred_plane() {
        let cfg = small_config();
        let dims = [2, 2, 3];
        let a = CalibTable::zeros("recenter_A", &dims).unwrap();
        let b = CalibTable::zeros("recenter_B", &dims).unwrap();
        let corr = RecenterCorrection::new(a, b, &cfg).unwrap();
        let mut f = FlowCalibFiller::new(cfg).unwrap().with_recenter(corr).unwrap();
        assert!(f.fills_shift());

        // Two tracks at φ = 0.2 and 0.2 + π: both give 2φ = 0.4.
        let phis = [(0.2, 0.3), (0.2 + std::f64::consts::PI, -0.3)];
        f.fill_event(&event(0, -60.0, &phis)).unwrap();
        assert_eq!(f.stats().planes_filled, 1);
        let h = find(&f, "shift_cos0_0");
        assert_abs_diff_eq!(h.bin_content(1), (0.4f64).cos(), epsilon = 1e-6);
        assert_abs_diff_eq!(h.bin_content(2), (0.8f64).cos(), epsilon = 1e-6);
        assert_abs_diff_eq!(find(&f, "shift_sin0_0").bin_content(1), (0.4f64).sin(), epsilon = 1e-6);
    }

    #[test]
    fn correction_shape_is_checked() {
        let cfg = small_config();
        let a = CalibTable::zeros("recenter_A", &[9, 10, 20]).unwrap();
        let b = CalibTable::zeros("recenter_B", &[2, 2, 3]).unwrap();
        assert!(matches!(RecenterCorrection::new(a, b, &cfg), Err(CalibError::Shape(_))));
    }

    #[test]
    fn config_yaml() {
        let cfg = FlowCalibConfig::from_yaml_str("harmonics: 4\nvz_min: -30\nvz_max: 30\n").unwrap();
        assert_eq!(cfg.harmonics, 4);
        assert_eq!(cfg.n_centrality, 9);
        assert!(FlowCalibConfig::from_yaml_str("harmonics: 1").is_err());
        assert!(FlowCalibConfig::from_yaml_str("vz_min: 5\nvz_max: 5").is_err());
        assert_eq!(cfg.vz_bin(-30.0, 10), Some(0));
        assert_eq!(cfg.vz_bin(29.999, 10), Some(9));
        assert_eq!(cfg.vz_bin(30.0, 10), None);
    }
}
