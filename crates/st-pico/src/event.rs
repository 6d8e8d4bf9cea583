//! Pico event record (`StPicoEvent`).

use st_root::{RBuffer, WBuffer};

use crate::error::{PicoError, Result};
use crate::track::PicoTrack;
use crate::vector::ThreeVector;

/// Class name under which events are stored.
pub const PICO_EVENT_CLASS: &str = "StPicoEvent";

/// Streamer class version.
pub const PICO_EVENT_VERSION: u16 = 1;

/// Centrality value for events outside the 0-80% classes.
pub const NO_CENTRALITY: i16 = -1;

/// One pico event: header quantities plus its tracks.
#[derive(Debug, Clone, PartialEq)]
pub struct PicoEvent {
    pub run_id: i32,
    pub event_id: i32,
    /// Solenoid field (kG).
    pub b_field: f32,
    /// Primary vertex (cm).
    pub primary_vertex: [f32; 3],
    pub ref_mult: u32,
    /// Centrality bin 0..9 (0 = 70-80%, 8 = 0-5%) or [`NO_CENTRALITY`].
    pub centrality: i16,
    pub tracks: Vec<PicoTrack>,
}

impl Default for PicoEvent {
    fn default() -> Self {
        Self {
            run_id: 0,
            event_id: 0,
            b_field: 0.0,
            primary_vertex: [0.0; 3],
            ref_mult: 0,
            centrality: NO_CENTRALITY,
            tracks: Vec::new(),
        }
    }
}

impl PicoEvent {
    pub fn vertex(&self) -> ThreeVector {
        ThreeVector::from_f32(self.primary_vertex)
    }

    /// Whether the event has a usable centrality bin.
    pub fn has_centrality(&self) -> bool {
        (0..9).contains(&self.centrality)
    }

    /// Stream the event as a standalone object payload.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut w = WBuffer::with_capacity(64 + self.tracks.len() * 48);
        let tok = w.begin_object(PICO_EVENT_VERSION);
        w.write_tobject();
        w.write_i32(self.run_id);
        w.write_i32(self.event_id);
        w.write_f32(self.b_field);
        for v in self.primary_vertex {
            w.write_f32(v);
        }
        w.write_u32(self.ref_mult);
        w.write_i16(self.centrality);
        let n = u32::try_from(self.tracks.len())
            .map_err(|_| PicoError::Validation(format!("{} tracks in one event", self.tracks.len())))?;
        w.write_u32(n);
        for t in &self.tracks {
            t.write_to(&mut w)?;
        }
        w.end_object(tok)?;
        Ok(w.into_inner())
    }

    /// Inverse of [`Self::encode`].
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut r = RBuffer::new(payload);
        let (version, end) = r.read_version()?;
        if version > PICO_EVENT_VERSION {
            log::warn!("{PICO_EVENT_CLASS} version {version} is newer than {PICO_EVENT_VERSION}; reading known fields");
        }
        r.read_tobject()?;
        let run_id = r.read_i32()?;
        let event_id = r.read_i32()?;
        let b_field = r.read_f32()?;
        let primary_vertex = [r.read_f32()?, r.read_f32()?, r.read_f32()?];
        let ref_mult = r.read_u32()?;
        let centrality = r.read_i16()?;
        let n = r.read_u32()? as usize;
        // Each track needs at least its 6-byte version header.
        if n > r.remaining() / 6 {
            return Err(PicoError::Validation(format!(
                "event {run_id}/{event_id}: {n} tracks do not fit in {} bytes",
                r.remaining()
            )));
        }
        let tracks = (0..n).map(|_| PicoTrack::read_from(&mut r)).collect::<Result<Vec<_>>>()?;
        r.finish_object(end, PICO_EVENT_CLASS)?;

        Ok(Self { run_id, event_id, b_field, primary_vertex, ref_mult, centrality, tracks })
    }
}
