//! Cartesian three-vectors for positions (cm) and momenta (GeV/c).

use std::ops::{Add, Mul, Neg, Sub};

use serde::{Deserialize, Serialize};

/// A Cartesian vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ThreeVector {
    /// x component.
    pub x: f64,
    /// y component.
    pub y: f64,
    /// z component.
    pub z: f64,
}

impl ThreeVector {
    /// Build from components.
    pub const fn new(x: f64, y: f64, z: f64) -> Self {
        Self { x, y, z }
    }

    /// The zero vector.
    pub const fn zero() -> Self {
        Self::new(0.0, 0.0, 0.0)
    }

    /// From single-precision storage.
    pub fn from_f32(v: [f32; 3]) -> Self {
        Self::new(v[0] as f64, v[1] as f64, v[2] as f64)
    }

    /// To single-precision storage.
    pub fn to_f32(self) -> [f32; 3] {
        [self.x as f32, self.y as f32, self.z as f32]
    }

    /// Transverse component squared.
    pub fn perp2(&self) -> f64 {
        self.x * self.x + self.y * self.y
    }

    /// Transverse component.
    pub fn perp(&self) -> f64 {
        self.perp2().sqrt()
    }

    /// Magnitude squared.
    pub fn mag2(&self) -> f64 {
        self.perp2() + self.z * self.z
    }

    /// Magnitude.
    pub fn mag(&self) -> f64 {
        self.mag2().sqrt()
    }

    /// Azimuth in `(-π, π]`.
    pub fn phi(&self) -> f64 {
        self.y.atan2(self.x)
    }

    /// Polar angle.
    pub fn theta(&self) -> f64 {
        self.perp().atan2(self.z)
    }

    /// Pseudorapidity; infinite along the beam axis.
    pub fn pseudo_rapidity(&self) -> f64 {
        let pt = self.perp();
        if pt == 0.0 {
            return if self.z >= 0.0 { f64::INFINITY } else { f64::NEG_INFINITY };
        }
        (self.z / pt).asinh()
    }

    /// Dot product.
    pub fn dot(&self, other: &Self) -> f64 {
        self.x * other.x + self.y * other.y + self.z * other.z
    }

    /// Cross product.
    pub fn cross(&self, other: &Self) -> Self {
        Self::new(
            self.y * other.z - self.z * other.y,
            self.z * other.x - self.x * other.z,
            self.x * other.y - self.y * other.x,
        )
    }

    /// Unit vector in the same direction (zero stays zero).
    pub fn unit(&self) -> Self {
        let m = self.mag();
        if m == 0.0 { *self } else { *self * (1.0 / m) }
    }

    /// Whether all components are exactly zero.
    pub fn is_zero(&self) -> bool {
        self.x == 0.0 && self.y == 0.0 && self.z == 0.0
    }
}

impl Add for ThreeVector {
    type Output = Self;
    fn add(self, o: Self) -> Self {
        Self::new(self.x + o.x, self.y + o.y, self.z + o.z)
    }
}

impl Sub for ThreeVector {
    type Output = Self;
    fn sub(self, o: Self) -> Self {
        Self::new(self.x - o.x, self.y - o.y, self.z - o.z)
    }
}

impl Mul<f64> for ThreeVector {
    type Output = Self;
    fn mul(self, s: f64) -> Self {
        Self::new(self.x * s, self.y * s, self.z * s)
    }
}

impl Neg for ThreeVector {
    type Output = Self;
    fn neg(self) -> Self {
        Self::new(-self.x, -self.y, -self.z)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn kinematics() {
        let p = ThreeVector::new(3.0, 4.0, 0.0);
        assert_eq!(p.perp(), 5.0);
        assert_eq!(p.pseudo_rapidity(), 0.0);
        assert_relative_eq!(p.phi(), 4.0f64.atan2(3.0));

        let q = ThreeVector::new(1.0, 0.0, 1.0f64.sinh());
        assert_relative_eq!(q.pseudo_rapidity(), 1.0, epsilon = 1e-12);
        assert_eq!(ThreeVector::new(0.0, 0.0, -2.0).pseudo_rapidity(), f64::NEG_INFINITY);
    }

    #[test]
    fn cross_is_right_handed() {
        let x = ThreeVector::new(1.0, 0.0, 0.0);
        let y = ThreeVector::new(0.0, 1.0, 0.0);
        assert_eq!(x.cross(&y), ThreeVector::new(0.0, 0.0, 1.0));
    }
}
