//! Charged-particle helix in a uniform solenoidal field along z.
//!
//! Parametrization by path length `s` (cm):
//! ```text
//! x(s) = x0 + (cos(Φ0 + h·s·κ·cosλ) − cos Φ0) / κ
//! y(s) = y0 + (sin(Φ0 + h·s·κ·cosλ) − sin Φ0) / κ
//! z(s) = z0 + s·sinλ
//! ```
//! with curvature `κ`, dip angle `λ`, phase `Φ0 = ψ − h·π/2` (`ψ` the
//! momentum azimuth at the origin) and `h = −sign(q·B)` the sense of
//! rotation. Units: cm, GeV/c, kilogauss.

use std::f64::consts::{FRAC_PI_2, PI};

use crate::vector::ThreeVector;

/// Speed of light in GeV/c per (kG·cm): `κ = C_LIGHT_KG·|qB| / pt`.
pub const C_LIGHT_KG: f64 = 2.997_924_58e-4;

const MAX_NEWTON_STEPS: usize = 100;
const NEWTON_TOLERANCE: f64 = 1e-6;

/// A helix built from a momentum, a point on the track, the field and the charge.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PhysicalHelix {
    origin: ThreeVector,
    /// Momentum magnitude (conserved along the helix).
    p: f64,
    dip: f64,
    curvature: f64,
    phase: f64,
    h: i32,
}

impl PhysicalHelix {
    /// Helix through `origin` with `momentum` there.
    pub fn new(momentum: ThreeVector, origin: ThreeVector, b_field_kg: f64, charge: i32) -> Self {
        let pt = momentum.perp();
        let qb = charge as f64 * b_field_kg;
        let h = if qb > 0.0 { -1 } else { 1 };
        let curvature = if pt > 0.0 && qb != 0.0 { C_LIGHT_KG * qb.abs() / pt } else { 0.0 };

        Self {
            origin,
            p: momentum.mag(),
            dip: momentum.z.atan2(pt),
            curvature,
            phase: momentum.phi() - h as f64 * FRAC_PI_2,
            h,
        }
    }

    /// Point at `s = 0`.
    pub fn origin(&self) -> ThreeVector {
        self.origin
    }

    /// Curvature κ (1/cm); 0 for a straight line.
    pub fn curvature(&self) -> f64 {
        self.curvature
    }

    /// Dip angle λ.
    pub fn dip_angle(&self) -> f64 {
        self.dip
    }

    /// Phase Φ0 of the origin as seen from the circle centre.
    pub fn phase(&self) -> f64 {
        self.phase
    }

    /// Sense of rotation (±1).
    pub fn h(&self) -> i32 {
        self.h
    }

    /// Whether the trajectory degenerates to a straight line.
    pub fn is_straight(&self) -> bool {
        self.curvature == 0.0 || self.dip.cos().abs() < 1e-12
    }

    /// Centre of the circle in the transverse plane.
    pub fn center(&self) -> (f64, f64) {
        (
            self.origin.x - self.phase.cos() / self.curvature,
            self.origin.y - self.phase.sin() / self.curvature,
        )
    }

    /// Path length of one full turn; infinite for a straight line.
    pub fn period(&self) -> f64 {
        if self.is_straight() {
            f64::INFINITY
        } else {
            2.0 * PI / (self.curvature * self.dip.cos())
        }
    }

    /// Transverse phase advanced per unit path length.
    fn omega(&self) -> f64 {
        self.h as f64 * self.curvature * self.dip.cos()
    }

    /// Position at path length `s`.
    pub fn at(&self, s: f64) -> ThreeVector {
        if self.is_straight() {
            return self.origin + self.direction_at(0.0) * s;
        }
        let angle = self.phase + s * self.omega();
        ThreeVector::new(
            self.origin.x + (angle.cos() - self.phase.cos()) / self.curvature,
            self.origin.y + (angle.sin() - self.phase.sin()) / self.curvature,
            self.origin.z + s * self.dip.sin(),
        )
    }

    /// Unit tangent at path length `s`.
    pub fn direction_at(&self, s: f64) -> ThreeVector {
        let (cos_dip, sin_dip) = (self.dip.cos(), self.dip.sin());
        if self.curvature == 0.0 {
            let psi = self.phase + self.h as f64 * FRAC_PI_2;
            return ThreeVector::new(cos_dip * psi.cos(), cos_dip * psi.sin(), sin_dip);
        }
        let angle = self.phase + s * self.omega();
        let hc = self.h as f64 * cos_dip;
        ThreeVector::new(-angle.sin() * hc, angle.cos() * hc, sin_dip)
    }

    /// Momentum at path length `s`.
    pub fn momentum_at(&self, s: f64) -> ThreeVector {
        self.direction_at(s) * self.p
    }

    /// Path length of the point of closest approach to `point`.
    ///
    /// Uses the closed-form transverse solution, then refines it in 3D
    /// by Newton steps on `(r(s) − P)·r'(s) = 0`. The transverse value is
    /// kept if the refinement diverges or lands farther away.
    pub fn path_length_to(&self, point: ThreeVector) -> f64 {
        if self.is_straight() {
            return (point - self.origin).dot(&self.direction_at(0.0));
        }

        let (xc, yc) = self.center();
        let target_phase = (point.y - yc).atan2(point.x - xc);
        let s2d = wrap_angle(target_phase - self.phase) / self.omega();

        let refined = self.newton(point, s2d);
        match refined {
            Some(s) if self.distance_at(s, point) <= self.distance_at(s2d, point) => s,
            _ => s2d,
        }
    }

    /// Distance of closest approach to `point`.
    pub fn dca_to(&self, point: ThreeVector) -> f64 {
        self.distance_at(self.path_length_to(point), point)
    }

    fn distance_at(&self, s: f64, point: ThreeVector) -> f64 {
        (self.at(s) - point).mag()
    }

    fn newton(&self, point: ThreeVector, start: f64) -> Option<f64> {
        let k_cos2 = self.curvature * self.dip.cos().powi(2);
        let mut s = start;
        for _ in 0..MAX_NEWTON_STEPS {
            let r = self.at(s) - point;
            let d1 = self.direction_at(s);
            let angle = self.phase + s * self.omega();
            let d2 = ThreeVector::new(-angle.cos() * k_cos2, -angle.sin() * k_cos2, 0.0);

            let f = r.dot(&d1);
            let fp = d1.dot(&d1) + r.dot(&d2);
            if fp <= 0.0 || !fp.is_finite() {
                return None;
            }
            let ds = f / fp;
            s -= ds;
            if !s.is_finite() {
                return None;
            }
            if ds.abs() < NEWTON_TOLERANCE {
                return Some(s);
            }
        }
        None
    }
}

/// Wrap an angle into `(-π, π]`.
pub fn wrap_angle(a: f64) -> f64 {
    let w = (a + PI).rem_euclid(2.0 * PI) - PI;
    if w == -PI { PI } else { w }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::{assert_abs_diff_eq, assert_relative_eq};
    use proptest::prelude::*;

    const B: f64 = 4.98;

    #[test]
    fn radius_matches_pt_over_field() {
        let h = PhysicalHelix::new(ThreeVector::new(1.0, 0.0, 0.0), ThreeVector::zero(), B, 1);
        assert_relative_eq!(1.0 / h.curvature(), 1.0 / (C_LIGHT_KG * B), epsilon = 1e-9);
        for s in [0.0, 25.0, 300.0, -80.0] {
            let p = h.at(s);
            let (xc, yc) = h.center();
            assert_relative_eq!(((p.x - xc).powi(2) + (p.y - yc).powi(2)).sqrt(), 1.0 / h.curvature(), epsilon = 1e-9);
        }
    }

    #[test]
    fn positive_track_bends_clockwise_in_positive_field() {
        let h = PhysicalHelix::new(ThreeVector::new(1.0, 0.0, 0.0), ThreeVector::zero(), B, 1);
        assert_eq!(h.h(), -1);
        // Moving along +x and turning clockwise means y goes negative.
        assert!(h.at(50.0).y < 0.0);
        let neg = PhysicalHelix::new(ThreeVector::new(1.0, 0.0, 0.0), ThreeVector::zero(), B, -1);
        assert!(neg.at(50.0).y > 0.0);
    }

    #[test]
    fn momentum_at_origin_is_input_momentum() {
        let p = ThreeVector::new(0.4, -0.7, 1.1);
        let h = PhysicalHelix::new(p, ThreeVector::new(1.0, 2.0, 3.0), B, -1);
        let m = h.momentum_at(0.0);
        assert_abs_diff_eq!(m.x, p.x, epsilon = 1e-12);
        assert_abs_diff_eq!(m.y, p.y, epsilon = 1e-12);
        assert_abs_diff_eq!(m.z, p.z, epsilon = 1e-12);
        assert_relative_eq!(h.momentum_at(123.0).mag(), p.mag(), epsilon = 1e-12);
        assert_relative_eq!(h.momentum_at(123.0).perp(), p.perp(), epsilon = 1e-12);
    }

    #[test]
    fn straight_line_without_field() {
        let p = ThreeVector::new(1.0, 1.0, 0.0);
        let h = PhysicalHelix::new(p, ThreeVector::zero(), 0.0, 1);
        assert!(h.is_straight());
        let at = h.at(2f64.sqrt());
        assert_relative_eq!(at.x, 1.0, epsilon = 1e-12);
        assert_relative_eq!(at.y, 1.0, epsilon = 1e-12);
        assert_relative_eq!(h.path_length_to(ThreeVector::new(2.0, 0.0, 0.0)), 2f64.sqrt(), epsilon = 1e-12);
        assert_relative_eq!(h.dca_to(ThreeVector::new(2.0, 0.0, 0.0)), 2f64.sqrt(), epsilon = 1e-12);
    }

    #[test]
    fn dca_to_offset_vertex() {
        // Track along +y through (1, 0, 0) with huge radius: DCA to the origin is ~1 cm.
        let h = PhysicalHelix::new(ThreeVector::new(0.0, 50.0, 0.0), ThreeVector::new(1.0, 0.0, 0.0), B, 1);
        assert_abs_diff_eq!(h.dca_to(ThreeVector::zero()), 1.0, epsilon = 1e-3);
        assert_abs_diff_eq!(h.path_length_to(ThreeVector::zero()), 0.0, epsilon = 1e-3);
    }

    #[test]
    fn wrap_angle_range() {
        assert_relative_eq!(wrap_angle(3.0 * PI), PI);
        assert_relative_eq!(wrap_angle(-PI), PI);
        assert_relative_eq!(wrap_angle(0.5), 0.5);
        assert_relative_eq!(wrap_angle(-2.0 * PI + 0.25), 0.25, epsilon = 1e-12);
    }

    proptest! {
        #[test]
        fn path_length_recovers_points_on_the_helix(
            pt in 0.2f64..5.0,
            psi in -3.1f64..3.1,
            pz in -3.0f64..3.0,
            charge in prop_oneof![Just(-1i32), Just(1i32)],
            s in -100.0f64..100.0,
        ) {
            let p = ThreeVector::new(pt * psi.cos(), pt * psi.sin(), pz);
            let h = PhysicalHelix::new(p, ThreeVector::new(0.3, -0.2, 5.0), B, charge);
            let target = h.at(s);
            let found = h.path_length_to(target);
            prop_assert!((found - s).abs() < 1e-4, "s = {s}, found = {found}");
            prop_assert!(h.dca_to(target) < 1e-4);
        }
    }
}
