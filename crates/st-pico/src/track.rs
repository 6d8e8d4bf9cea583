//! Pico track record (`StPicoTrk`).

use st_root::{RBuffer, WBuffer};

use crate::error::Result;
use crate::helix::PhysicalHelix;
use crate::mudst::MuTrack;
use crate::vector::ThreeVector;

/// Streamer class version.
pub const PICO_TRACK_VERSION: u16 = 1;

/// Compact track: ids, primary and global momenta, DCA point, charge.
///
/// Values are stored in single precision. Built once per track with
/// [`PicoTrack::from_mu_track`]; fields change only through the setters.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PicoTrack {
    id: i32,
    p_mom: [f32; 3],
    g_mom: [f32; 3],
    origin: [f32; 3],
    charge: i8,
}

impl PicoTrack {
    /// Record from raw components.
    pub fn new(id: i32, p_mom: ThreeVector, g_mom: ThreeVector, origin: ThreeVector, charge: i8) -> Self {
        Self { id, p_mom: p_mom.to_f32(), g_mom: g_mom.to_f32(), origin: origin.to_f32(), charge }
    }

    /// Copy an upstream track. The global helix is evaluated at its point of
    /// closest approach to `vertex`, giving the global momentum and origin.
    /// Tracks without a primary fit get a zero primary momentum.
    pub fn from_mu_track(track: &MuTrack, vertex: ThreeVector, b_field_kg: f64) -> Self {
        let helix = PhysicalHelix::new(
            track.global_momentum,
            track.first_point,
            b_field_kg,
            i32::from(track.charge),
        );
        let s = helix.path_length_to(vertex);
        Self::new(
            track.id,
            track.primary_momentum.unwrap_or_default(),
            helix.momentum_at(s),
            helix.at(s),
            track.charge,
        )
    }

    pub fn id(&self) -> i32 {
        self.id
    }

    pub fn p_mom(&self) -> ThreeVector {
        ThreeVector::from_f32(self.p_mom)
    }

    pub fn g_mom(&self) -> ThreeVector {
        ThreeVector::from_f32(self.g_mom)
    }

    /// Global helix point closest to the primary vertex.
    pub fn origin(&self) -> ThreeVector {
        ThreeVector::from_f32(self.origin)
    }

    pub fn charge(&self) -> i8 {
        self.charge
    }

    pub fn p_pt(&self) -> f64 {
        self.p_mom().perp()
    }

    pub fn g_pt(&self) -> f64 {
        self.g_mom().perp()
    }

    pub fn g_eta(&self) -> f64 {
        self.g_mom().pseudo_rapidity()
    }

    pub fn g_phi(&self) -> f64 {
        self.g_mom().phi()
    }

    /// Distance from the stored origin to `vertex`.
    pub fn g_dca(&self, vertex: ThreeVector) -> f64 {
        (self.origin() - vertex).mag()
    }

    /// Whether the track carries a primary (vertex-constrained) momentum.
    pub fn is_primary(&self) -> bool {
        self.p_mom.iter().any(|&c| c != 0.0)
    }

    pub fn set_id(&mut self, id: i32) {
        self.id = id;
    }

    pub fn set_p_mom(&mut self, p: ThreeVector) {
        self.p_mom = p.to_f32();
    }

    pub fn set_g_mom(&mut self, p: ThreeVector) {
        self.g_mom = p.to_f32();
    }

    pub fn set_origin(&mut self, o: ThreeVector) {
        self.origin = o.to_f32();
    }

    pub fn set_charge(&mut self, q: i8) {
        self.charge = q;
    }

    /// Stream as `StPicoTrk` v1: TObject, id, pMom[3], gMom[3], origin[3], charge.
    pub fn write_to(&self, w: &mut WBuffer) -> Result<()> {
        let tok = w.begin_object(PICO_TRACK_VERSION);
        w.write_tobject();
        w.write_i32(self.id);
        for v in self.p_mom.iter().chain(&self.g_mom).chain(&self.origin) {
            w.write_f32(*v);
        }
        w.write_i8(self.charge);
        w.end_object(tok)?;
        Ok(())
    }

    /// Inverse of [`Self::write_to`].
    pub fn read_from(r: &mut RBuffer) -> Result<Self> {
        let (_version, end) = r.read_version()?;
        r.read_tobject()?;
        let id = r.read_i32()?;
        let mut t = Self { id, ..Self::default() };
        for arr in [&mut t.p_mom, &mut t.g_mom, &mut t.origin] {
            for v in arr.iter_mut() {
                *v = r.read_f32()?;
            }
        }
        t.charge = r.read_i8()?;
        r.finish_object(end, "StPicoTrk")?;
        Ok(t)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    fn mu_track() -> MuTrack {
        MuTrack {
            id: 42,
            charge: 1,
            n_hits_fit: 35,
            global_momentum: ThreeVector::new(0.0, 1.0, 0.4),
            first_point: ThreeVector::new(0.5, 0.0, 0.0),
            primary_momentum: Some(ThreeVector::new(0.01, 1.0, 0.4)),
        }
    }

    #[test]
    fn copies_fields_and_evaluates_helix_at_vertex() {
        let t = PicoTrack::from_mu_track(&mu_track(), ThreeVector::zero(), 4.98);
        assert_eq!(t.id(), 42);
        assert_eq!(t.charge(), 1);
        assert!(t.is_primary());
        assert_abs_diff_eq!(t.p_mom().x, 0.01, epsilon = 1e-6);

        // Track starts 0.5 cm off the vertex, moving almost perpendicular to that offset.
        assert_abs_diff_eq!(t.g_dca(ThreeVector::zero()), 0.5, epsilon = 1e-2);
        assert_abs_diff_eq!(t.g_pt(), 1.0, epsilon = 1e-5);
        assert_abs_diff_eq!(t.g_mom().z, 0.4, epsilon = 1e-5);
    }

    #[test]
    fn missing_primary_fit_gives_zero_primary_momentum() {
        let mut mu = mu_track();
        mu.primary_momentum = None;
        let t = PicoTrack::from_mu_track(&mu, ThreeVector::zero(), 4.98);
        assert!(!t.is_primary());
        assert_eq!(t.p_pt(), 0.0);
    }

    #[test]
    fn setters_change_only_their_field() {
        let mut t = PicoTrack::from_mu_track(&mu_track(), ThreeVector::zero(), 4.98);
        let before = t;
        t.set_charge(-1);
        t.set_id(7);
        assert_eq!(t.charge(), -1);
        assert_eq!(t.id(), 7);
        assert_eq!(t.g_mom(), before.g_mom());
        assert_eq!(t.origin(), before.origin());
    }

    #[test]
    fn streamer_round_trip() {
        let t = PicoTrack::from_mu_track(&mu_track(), ThreeVector::new(0.1, 0.1, 1.0), -4.98);
        let mut w = WBuffer::new();
        t.write_to(&mut w).unwrap();
        let mut r = RBuffer::new(w.as_slice());
        assert_eq!(PicoTrack::read_from(&mut r).unwrap(), t);
        assert_eq!(r.remaining(), 0);
    }
}
