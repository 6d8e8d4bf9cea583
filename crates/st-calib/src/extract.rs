//! Reading calibration tables out of histogram files.
//!
//! A table of rank `r` is built from histograms whose names append the
//! leading `r - 1` indices to a prefix, joined by `_`:
//!
//! | rank | histogram             | value `[i][j][l]`            |
//! |------|-----------------------|------------------------------|
//! | 3    | `<prefix><i>_<j>`     | bin `first_bin + l`          |
//! | 2    | `<prefix><i>`         | bin `first_bin + l`          |
//! | 1    | `<prefix>`            | bin `first_bin + l`          |

use serde::{Deserialize, Serialize};
use st_root::RootFile;

use crate::error::{CalibError, Result};
use crate::table::CalibTable;

fn default_first_bin() -> usize {
    1
}

/// How to assemble one table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TableSpec {
    /// Name of the emitted C array.
    pub name: String,
    /// Histogram name prefix.
    pub prefix: String,
    /// Table dimensions; the last one runs over bins.
    pub dims: Vec<usize>,
    /// ROOT bin number of element 0 along the bin axis.
    #[serde(default = "default_first_bin")]
    pub first_bin: usize,
}

impl TableSpec {
    pub fn new(name: &str, prefix: &str, dims: &[usize]) -> Self {
        Self { name: name.to_string(), prefix: prefix.to_string(), dims: dims.to_vec(), first_bin: 1 }
    }

    /// Histogram holding the row at leading index `lead`.
    pub fn histogram_name(&self, lead: &[usize]) -> String {
        let mut name = self.prefix.clone();
        for (k, i) in lead.iter().enumerate() {
            if k > 0 {
                name.push('_');
            }
            name.push_str(&i.to_string());
        }
        name
    }

    /// Every leading index, in row-major order.
    pub fn leading_indices(&self) -> Vec<Vec<usize>> {
        let outer = &self.dims[..self.dims.len().saturating_sub(1)];
        let mut out = vec![Vec::new()];
        for &d in outer {
            out = out
                .into_iter()
                .flat_map(|prefix| {
                    (0..d).map(move |i| {
                        let mut idx = prefix.clone();
                        idx.push(i);
                        idx
                    })
                })
                .collect();
        }
        out
    }

    pub fn validate(&self) -> Result<()> {
        if self.dims.is_empty() || self.dims.contains(&0) {
            return Err(CalibError::Shape(format!("{}: invalid dimensions {:?}", self.name, self.dims)));
        }
        self.last_bin()?;
        if self.first_bin == 0 {
            log::warn!("{}: first_bin 0 reads the underflow bin", self.name);
        }
        Ok(())
    }

    /// ROOT bin number of the last element along the bin axis.
    pub fn last_bin(&self) -> Result<usize> {
        let n_row = self.dims.last().copied().unwrap_or(0);
        n_row
            .checked_sub(1)
            .and_then(|span| self.first_bin.checked_add(span))
            .ok_or_else(|| {
                CalibError::Shape(format!("{}: first_bin {} with {n_row} bins overflows", self.name, self.first_bin))
            })
    }
}

/// Build one table from `file`. Every histogram named by `spec` must exist
/// and reach the last bin read.
pub fn extract_table(file: &RootFile, spec: &TableSpec) -> Result<CalibTable> {
    spec.validate()?;
    let n_row = spec.dims[spec.dims.len() - 1];
    let last_bin = spec.last_bin()?;

    let leads = spec.leading_indices();
    let mut values = Vec::with_capacity(leads.len() * n_row);
    for lead in &leads {
        let hname = spec.histogram_name(lead);
        let h = file.get_histogram(&hname)?;
        if h.n_bins() < last_bin {
            return Err(CalibError::TooFewBins { histogram: hname, need: last_bin, have: h.n_bins() });
        }
        values.extend((spec.first_bin..=last_bin).map(|bin| h.bin_content(bin)));
    }

    log::debug!("{}: {} histograms, {} values", spec.name, leads.len(), values.len());
    CalibTable::new(&spec.name, &spec.dims, values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn histogram_names_follow_rank() {
        let s3 = TableSpec::new("recenter_A", "recenter_cos", &[9, 10, 20]);
        assert_eq!(s3.histogram_name(&[3, 7]), "recenter_cos3_7");
        let s2 = TableSpec::new("x", "flat", &[4, 5]);
        assert_eq!(s2.histogram_name(&[2]), "flat2");
        let s1 = TableSpec::new("bbc_shift_A", "bbc_shift_cos", &[1359]);
        assert_eq!(s1.histogram_name(&[]), "bbc_shift_cos");
    }

    #[test]
    fn leading_indices_are_dense_and_ordered() {
        let s = TableSpec::new("t", "p", &[2, 3, 5]);
        let idx = s.leading_indices();
        assert_eq!(idx.len(), 6);
        assert_eq!(idx[0], vec![0, 0]);
        assert_eq!(idx[1], vec![0, 1]);
        assert_eq!(idx[5], vec![1, 2]);
        assert_eq!(TableSpec::new("t", "p", &[7]).leading_indices(), vec![Vec::<usize>::new()]);
    }

    #[test]
    fn spec_from_yaml_defaults_first_bin() {
        let s: TableSpec = serde_yaml_ng::from_str("name: a\nprefix: h\ndims: [2, 3]\n").unwrap();
        assert_eq!(s.first_bin, 1);
        assert!(TableSpec::new("a", "h", &[2, 0]).validate().is_err());
    }

    #[test]
    fn first_bin_overflow_is_a_shape_error() {
        let s: TableSpec = serde_yaml_ng::from_str("name: a\nprefix: h\ndims: [3]\nfirst_bin: 18446744073709551615\n").unwrap();
        assert!(matches!(s.validate(), Err(CalibError::Shape(_))));
        assert!(matches!(s.last_bin(), Err(CalibError::Shape(_))));

        let mut ok = TableSpec::new("b", "h", &[4, 20]);
        ok.first_bin = 3;
        assert_eq!(ok.last_bin().unwrap(), 22);
        ok.first_bin = usize::MAX;
        assert!(ok.validate().is_err());
        ok.dims = vec![4, 1];
        assert_eq!(ok.last_bin().unwrap(), usize::MAX);
    }
}
