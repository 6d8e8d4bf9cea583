//! Upstream ("MuDst") event records, read as JSON lines.
//!
//! One event per line:
//! ```json
//! {"run_id": 1, "event_id": 7, "b_field": 4.98, "primary_vertex": {"x": 0.1, "y": -0.2, "z": 3.0},
//!  "ref_mult": 212, "tracks": [{"id": 3, "charge": 1, "n_hits_fit": 30,
//!  "global_momentum": {"x": 0.5, "y": 0.1, "z": 0.3}, "first_point": {"x": 0.2, "y": 0.0, "z": 3.0}}]}
//! ```

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{PicoError, Result};
use crate::vector::ThreeVector;

/// A reconstructed track as delivered upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MuTrack {
    /// Upstream track key, unique within the event.
    pub id: i32,
    /// Charge in units of e.
    pub charge: i8,
    /// Hits used in the fit.
    #[serde(default)]
    pub n_hits_fit: u16,
    /// Global-fit momentum at `first_point` (GeV/c).
    pub global_momentum: ThreeVector,
    /// A point on the global helix, usually the first measured hit (cm).
    pub first_point: ThreeVector,
    /// Momentum of the vertex-constrained fit, if the track has one.
    #[serde(default)]
    pub primary_momentum: Option<ThreeVector>,
}

/// An upstream event.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MuEvent {
    /// Run number.
    pub run_id: i32,
    /// Event number within the run.
    pub event_id: i32,
    /// Solenoid field (kG).
    pub b_field: f64,
    /// Primary vertex (cm).
    pub primary_vertex: ThreeVector,
    /// Reference multiplicity.
    #[serde(default)]
    pub ref_mult: u32,
    /// Centrality bin if the producer already computed one.
    #[serde(default)]
    pub centrality: Option<i32>,
    /// Reconstructed tracks.
    #[serde(default)]
    pub tracks: Vec<MuTrack>,
}

impl MuEvent {
    /// Transverse distance of the primary vertex from the beam line.
    pub fn vertex_r(&self) -> f64 {
        self.primary_vertex.perp()
    }
}

/// Lazily iterates the events of a JSON-lines file. Blank lines are skipped.
pub struct MuDstReader<R> {
    lines: std::io::Lines<R>,
    line_no: usize,
}

impl MuDstReader<BufReader<File>> {
    /// Open a JSON-lines file.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let file = File::open(path.as_ref())?;
        log::debug!("reading MuDst events from {}", path.as_ref().display());
        Ok(Self::new(BufReader::new(file)))
    }
}

impl<R: BufRead> MuDstReader<R> {
    /// Wrap any buffered reader.
    pub fn new(reader: R) -> Self {
        Self { lines: reader.lines(), line_no: 0 }
    }

    /// Line number of the last event returned (1-based).
    pub fn line_no(&self) -> usize {
        self.line_no
    }
}

impl<R: BufRead> Iterator for MuDstReader<R> {
    type Item = Result<MuEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_no += 1;
            if line.trim().is_empty() {
                continue;
            }
            let line_no = self.line_no;
            return Some(
                serde_json::from_str(&line).map_err(|source| PicoError::Json { line: line_no, source }),
            );
        }
    }
}

/// Serialize events as JSON lines (the inverse of [`MuDstReader`]).
pub fn write_json_lines<W: std::io::Write>(mut out: W, events: &[MuEvent]) -> Result<()> {
    for ev in events {
        serde_json::to_writer(&mut out, ev).map_err(|e| PicoError::Io(e.into()))?;
        out.write_all(b"\n")?;
    }
    Ok(())
}
