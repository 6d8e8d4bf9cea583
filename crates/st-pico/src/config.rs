//! Pico production configuration (YAML).
//!
//! ```yaml
//! vz_max: 70.0
//! vr_max: 2.0
//! min_n_hits_fit: 15
//! max_g_dca: 3.0
//! min_pt: 0.15
//! centrality_edges: [10, 22, 43, 76, 125, 193, 281, 396, 466]
//! track_map_size: 8192
//! compression: 1
//! ```
//! Every field is optional.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PicoError, Result};

/// Event cuts, track cuts and output settings for pico production.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PicoConfig {
    /// Maximum |vz| of the primary vertex (cm).
    pub vz_max: f64,
    /// Maximum transverse vertex displacement (cm).
    pub vr_max: f64,
    pub min_n_hits_fit: u16,
    /// Maximum global DCA to the primary vertex (cm).
    pub max_g_dca: f64,
    /// Minimum global pt (GeV/c).
    pub min_pt: f64,
    /// Ascending refmult lower edges of the 9 centrality classes, 70-80% first.
    pub centrality_edges: Vec<u32>,
    /// Slots in the upstream-id to pico-index map.
    pub track_map_size: usize,
    /// zlib level of the output file (0 = stored).
    pub compression: u32,
}

impl Default for PicoConfig {
    fn default() -> Self {
        Self {
            vz_max: 70.0,
            vr_max: 2.0,
            min_n_hits_fit: 15,
            max_g_dca: 3.0,
            min_pt: 0.15,
            centrality_edges: vec![10, 22, 43, 76, 125, 193, 281, 396, 466],
            track_map_size: 8192,
            compression: 1,
        }
    }
}

impl PicoConfig {
    /// Load from a YAML (or JSON) file and validate.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&text)
    }

    /// Parse YAML and validate.
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let cfg: Self = serde_yaml_ng::from_str(text)?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        for (what, v) in [("vz_max", self.vz_max), ("vr_max", self.vr_max), ("max_g_dca", self.max_g_dca)] {
            if v.is_nan() || v <= 0.0 {
                return Err(PicoError::Validation(format!("{what} must be positive, got {v}")));
            }
        }
        if self.min_pt.is_nan() || self.min_pt < 0.0 {
            return Err(PicoError::Validation(format!("min_pt must be >= 0, got {}", self.min_pt)));
        }
        if self.centrality_edges.len() != 9 {
            return Err(PicoError::Validation(format!(
                "centrality_edges needs 9 entries, got {}",
                self.centrality_edges.len()
            )));
        }
        if self.centrality_edges.windows(2).any(|w| w[0] >= w[1]) {
            return Err(PicoError::Validation("centrality_edges must be strictly ascending".into()));
        }
        if self.track_map_size == 0 {
            return Err(PicoError::Validation("track_map_size must be > 0".into()));
        }
        if self.compression > 9 {
            return Err(PicoError::Validation(format!("compression must be 0-9, got {}", self.compression)));
        }
        Ok(())
    }

    /// Centrality bin for a reference multiplicity: 0 = 70-80% ... 8 = 0-5%,
    /// -1 below the 80% edge.
    pub fn centrality_bin(&self, ref_mult: u32) -> i16 {
        self.centrality_edges.iter().rposition(|&edge| ref_mult >= edge).map_or(-1, |i| i as i16)
    }
}
