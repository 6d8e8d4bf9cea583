//! Dense fixed-rank numeric tables and their C array literal rendering.

use std::fmt::Write as _;

use serde::Serialize;

use crate::error::{CalibError, Result};

/// A row-major table of doubles, e.g. `recenter_A[9][10][20]`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CalibTable {
    pub name: String,
    dims: Vec<usize>,
    values: Vec<f64>,
}

impl CalibTable {
    /// Table from values in row-major order.
    pub fn new(name: &str, dims: &[usize], values: Vec<f64>) -> Result<Self> {
        let expected = element_count(dims)?;
        if values.len() != expected {
            return Err(CalibError::Shape(format!(
                "{name}{dims:?} needs {expected} values, got {}",
                values.len()
            )));
        }
        Ok(Self { name: name.to_string(), dims: dims.to_vec(), values })
    }

    /// Table of zeros.
    pub fn zeros(name: &str, dims: &[usize]) -> Result<Self> {
        let n = element_count(dims)?;
        Self::new(name, dims, vec![0.0; n])
    }

    pub fn dims(&self) -> &[usize] {
        &self.dims
    }

    pub fn rank(&self) -> usize {
        self.dims.len()
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    fn offset(&self, index: &[usize]) -> Option<usize> {
        if index.len() != self.dims.len() {
            return None;
        }
        let mut off = 0usize;
        for (&i, &d) in index.iter().zip(&self.dims) {
            if i >= d {
                return None;
            }
            off = off * d + i;
        }
        Some(off)
    }

    /// Value at a full index, `None` when out of range or of the wrong rank.
    pub fn get(&self, index: &[usize]) -> Option<f64> {
        self.offset(index).map(|o| self.values[o])
    }

    pub fn set(&mut self, index: &[usize], value: f64) -> Result<()> {
        let off = self
            .offset(index)
            .ok_or_else(|| CalibError::Shape(format!("{}: index {index:?} outside {:?}", self.name, self.dims)))?;
        self.values[off] = value;
        Ok(())
    }

    /// The innermost row at a leading index (`rank - 1` entries).
    pub fn row(&self, lead: &[usize]) -> Option<&[f64]> {
        let (&last, outer) = self.dims.split_last()?;
        if lead.len() != outer.len() {
            return None;
        }
        let mut off = 0usize;
        for (&i, &d) in lead.iter().zip(outer) {
            if i >= d {
                return None;
            }
            off = off * d + i;
        }
        Some(&self.values[off * last..(off + 1) * last])
    }

    /// First non-finite value and its index.
    fn first_non_finite(&self) -> Option<(Vec<usize>, f64)> {
        let pos = self.values.iter().position(|v| !v.is_finite())?;
        Some((unflatten(pos, &self.dims), self.values[pos]))
    }

    /// Render as a C declaration, e.g.
    ///
    /// ```text
    /// const double shift_A[2][3] = {
    ///   {1e-2, 0e0, -3.5e-1},
    ///   {0e0, 0e0, 1e0}
    /// };
    /// ```
    /// Innermost rows stay on one line. Values use the shortest exponent
    /// form that reads back to the same double.
    pub fn to_c_literal(&self, ctype: &str) -> Result<String> {
        if let Some((index, value)) = self.first_non_finite() {
            return Err(CalibError::NonFinite { table: self.name.clone(), index, value });
        }

        let mut out = String::with_capacity(self.values.len() * 12 + 64);
        out.push_str(ctype);
        out.push(' ');
        out.push_str(&self.name);
        for d in &self.dims {
            let _ = write!(out, "[{d}]");
        }
        out.push_str(" = ");
        render_level(&mut out, &self.dims, &self.values, 0);
        out.push_str(";\n");
        Ok(out)
    }
}

fn element_count(dims: &[usize]) -> Result<usize> {
    if dims.is_empty() || dims.contains(&0) {
        return Err(CalibError::Shape(format!("invalid table dimensions {dims:?}")));
    }
    dims.iter()
        .try_fold(1usize, |acc, &d| acc.checked_mul(d))
        .ok_or_else(|| CalibError::Shape(format!("table dimensions {dims:?} overflow")))
}

fn unflatten(mut pos: usize, dims: &[usize]) -> Vec<usize> {
    let mut index = vec![0; dims.len()];
    for (slot, &d) in index.iter_mut().zip(dims).rev() {
        *slot = pos % d;
        pos /= d;
    }
    index
}

fn render_level(out: &mut String, dims: &[usize], values: &[f64], depth: usize) {
    if dims.len() == 1 {
        out.push('{');
        for (i, v) in values.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            let _ = write!(out, "{v:e}");
        }
        out.push('}');
        return;
    }

    let stride = values.len() / dims[0];
    let pad = "  ".repeat(depth + 1);
    out.push_str("{\n");
    for (i, chunk) in values.chunks(stride).enumerate() {
        out.push_str(&pad);
        render_level(out, &dims[1..], chunk, depth + 1);
        if i + 1 < dims[0] {
            out.push(',');
        }
        out.push('\n');
    }
    out.push_str(&"  ".repeat(depth));
    out.push('}');
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_major_indexing() {
        let t = CalibTable::new("t", &[2, 3], vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]).unwrap();
        assert_eq!(t.get(&[1, 2]), Some(5.0));
        assert_eq!(t.get(&[0, 1]), Some(1.0));
        assert_eq!(t.get(&[2, 0]), None);
        assert_eq!(t.get(&[1]), None);
        assert_eq!(t.row(&[1]), Some(&[3.0, 4.0, 5.0][..]));
    }

    #[test]
    fn shape_is_checked() {
        assert!(matches!(CalibTable::new("t", &[2, 2], vec![1.0; 3]), Err(CalibError::Shape(_))));
        assert!(matches!(CalibTable::zeros("t", &[]), Err(CalibError::Shape(_))));
        assert!(matches!(CalibTable::zeros("t", &[3, 0]), Err(CalibError::Shape(_))));
    }

    #[test]
    fn renders_rank_two() {
        let t = CalibTable::new("shift_A", &[2, 3], vec![0.01, 0.0, -0.35, 0.0, 0.0, 1.0]).unwrap();
        assert_eq!(
            t.to_c_literal("const double").unwrap(),
            "const double shift_A[2][3] = {\n  {1e-2, 0e0, -3.5e-1},\n  {0e0, 0e0, 1e0}\n};\n"
        );
    }

    #[test]
    fn renders_rank_one_and_three() {
        let t = CalibTable::new("b", &[3], vec![1.5, 2.0, -0.25]).unwrap();
        assert_eq!(t.to_c_literal("double").unwrap(), "double b[3] = {1.5e0, 2e0, -2.5e-1};\n");

        let t = CalibTable::new("c", &[2, 1, 2], vec![1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_eq!(
            t.to_c_literal("const double").unwrap(),
            "const double c[2][1][2] = {\n  {\n    {1e0, 2e0}\n  },\n  {\n    {3e0, 4e0}\n  }\n};\n"
        );
    }

    #[test]
    fn literals_read_back_exactly() {
        let v = [0.1, 1.0 / 3.0, -2.5e-300, 6.02214076e23];
        let t = CalibTable::new("v", &[4], v.to_vec()).unwrap();
        let lit = t.to_c_literal("double").unwrap();
        let body = lit.trim_end().trim_end_matches("};").split('{').nth(1).unwrap();
        let back: Vec<f64> = body.split(", ").map(|s| s.parse().unwrap()).collect();
        assert_eq!(back, v);
    }

    #[test]
    fn non_finite_values_are_rejected() {
        let mut t = CalibTable::zeros("recenter_A", &[2, 2]).unwrap();
        t.set(&[1, 0], f64::NAN).unwrap();
        match t.to_c_literal("const double") {
            Err(CalibError::NonFinite { table, index, .. }) => {
                assert_eq!(table, "recenter_A");
                assert_eq!(index, vec![1, 0]);
            }
            other => panic!("expected NonFinite, got {other:?}"),
        }
    }
}
