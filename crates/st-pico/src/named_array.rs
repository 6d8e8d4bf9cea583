//! Fixed-size named integer array (`StNamedArrayI`).
//!
//! Used as a lookup table, e.g. upstream track id to pico track index.
//! Unset slots hold [`UNSET`].

use st_root::{RBuffer, WBuffer};

use crate::error::{PicoError, Result};

/// Class name of the streamed object.
pub const NAMED_ARRAY_CLASS: &str = "StNamedArrayI";

/// Value of a cleared slot.
pub const UNSET: i32 = -1;

/// A named `i32` array whose slots start cleared.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NamedArrayI {
    name: String,
    values: Vec<i32>,
}

impl NamedArrayI {
    /// `size` cleared slots.
    pub fn new(name: &str, size: usize) -> Self {
        Self { name: name.to_string(), values: vec![UNSET; size] }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn set_name(&mut self, name: &str) {
        self.name = name.to_string();
    }

    /// Value at `i`, `None` when out of range.
    pub fn get(&self, i: usize) -> Option<i32> {
        self.values.get(i).copied()
    }

    /// Value at `i` when the slot is in range and set.
    pub fn lookup(&self, i: usize) -> Option<i32> {
        self.get(i).filter(|&v| v != UNSET)
    }

    pub fn set(&mut self, i: usize, v: i32) -> Result<()> {
        let len = self.values.len();
        match self.values.get_mut(i) {
            Some(slot) => {
                *slot = v;
                Ok(())
            }
            None => Err(PicoError::IndexOutOfRange { name: self.name.clone(), index: i, len }),
        }
    }

    /// Reset every slot to [`UNSET`].
    pub fn clear(&mut self) {
        self.values.fill(UNSET);
    }

    pub fn is_set(&self, i: usize) -> bool {
        self.lookup(i).is_some()
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.values
    }

    /// Stream as TNamed + TArrayI.
    pub fn encode(&self) -> Result<Vec<u8>> {
        let mut w = WBuffer::with_capacity(32 + 4 * self.values.len());
        let tok = w.begin_object(1);
        w.write_tnamed(&self.name, "")?;
        w.write_tarray_i32(&self.values)?;
        w.end_object(tok)?;
        Ok(w.into_inner())
    }

    /// Inverse of [`Self::encode`].
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut r = RBuffer::new(payload);
        let (_version, end) = r.read_version()?;
        let (name, _title) = r.read_tnamed()?;
        let values = r.read_tarray_i32()?;
        r.finish_object(end, NAMED_ARRAY_CLASS)?;
        Ok(Self { name, values })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_cleared() {
        let a = NamedArrayI::new("TrackIdMap", 4);
        assert_eq!(a.as_slice(), &[-1, -1, -1, -1]);
        assert!(!a.is_set(0));
        assert_eq!(a.get(0), Some(-1));
        assert_eq!(a.lookup(0), None);
        assert_eq!(a.get(4), None);
    }

    #[test]
    fn set_clear_and_bounds() {
        let mut a = NamedArrayI::new("map", 3);
        a.set(2, 17).unwrap();
        assert_eq!(a.lookup(2), Some(17));
        assert!(a.is_set(2));

        let err = a.set(3, 1).unwrap_err();
        assert!(matches!(err, PicoError::IndexOutOfRange { index: 3, len: 3, .. }));

        a.clear();
        assert!(!a.is_set(2));
        assert_eq!(a.len(), 3);
    }

    #[test]
    fn rename() {
        let mut a = NamedArrayI::new("a", 1);
        a.set_name("b");
        assert_eq!(a.name(), "b");
    }

    #[test]
    fn streamer_round_trip() {
        let mut a = NamedArrayI::new("TrackIdMap", 5);
        a.set(1, 0).unwrap();
        a.set(4, 1).unwrap();
        assert_eq!(NamedArrayI::decode(&a.encode().unwrap()).unwrap(), a);
    }
}
