//! Calibration recipes: which tables to pull from a file, and the header
//! they are written to.
//!
//! Built-in recipes (centrality in 9 bins, harmonics/orders in 20):
//!
//! | recipe                 | tables                                   | histograms                         |
//! |------------------------|------------------------------------------|------------------------------------|
//! | `recenter_getAB`       | `recenter_A/B[9][10][20]`                | `recenter_cos/sin<i>_<j>`          |
//! | `shift_getAB`          | `shift_A/B[9][20][20]`                   | `shift_cos/sin<i>_<j>`             |
//! | `tpc_recenter_getNP`   | `tpc_recenter_{N,P}_{A,B}[9][10][20]`    | `tpc_recenter_{N,P}_cos/sin<i>_<j>`|
//! | `bbc_shift_getAB_orig` | `bbc_shift_A/B[1359]`                    | `bbc_shift_cos/sin`                |
//!
//! Custom recipes load from YAML:
//! ```yaml
//! name: my_tables
//! tables:
//!   - { name: v2_A, prefix: v2_cos, dims: [9, 12] }
//! ```

use std::path::Path;

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use st_root::RootFile;

use crate::error::{CalibError, Result};
use crate::extract::{TableSpec, extract_table};
use crate::table::CalibTable;

/// Centrality classes in the built-in tables.
pub const N_CENTRALITY: usize = 9;
/// Vertex-z bins of the recentering tables.
pub const N_RECENTER_VZ: usize = 10;
/// Vertex-z bins of the shift tables.
pub const N_SHIFT_VZ: usize = 20;
/// Harmonics per recentering histogram, orders per shift histogram.
pub const N_HARMONICS: usize = 20;
/// Entries in the BBC shift tables.
pub const N_BBC_SHIFT: usize = 1359;

/// Names of the built-in recipes.
pub const BUILTIN_RECIPES: [&str; 4] =
    ["recenter_getAB", "shift_getAB", "tpc_recenter_getNP", "bbc_shift_getAB_orig"];

fn default_ctype() -> String {
    "const double".to_string()
}

/// A named set of tables rendered into one header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Recipe {
    pub name: String,
    /// Include guard; derived from `name` when absent.
    #[serde(default)]
    pub guard: Option<String>,
    /// C type of every table.
    #[serde(default = "default_ctype")]
    pub ctype: String,
    pub tables: Vec<TableSpec>,
}

impl Recipe {
    pub fn new(name: &str, tables: Vec<TableSpec>) -> Self {
        Self { name: name.to_string(), guard: None, ctype: default_ctype(), tables }
    }

    /// A built-in recipe by name.
    pub fn builtin(name: &str) -> Result<Self> {
        let grid = [N_CENTRALITY, N_RECENTER_VZ, N_HARMONICS];
        let shift_grid = [N_CENTRALITY, N_SHIFT_VZ, N_HARMONICS];
        let recipe = match name {
            "recenter_getAB" => Self::new(
                name,
                vec![
                    TableSpec::new("recenter_A", "recenter_cos", &grid),
                    TableSpec::new("recenter_B", "recenter_sin", &grid),
                ],
            ),
            "shift_getAB" => Self::new(
                name,
                vec![
                    TableSpec::new("shift_A", "shift_cos", &shift_grid),
                    TableSpec::new("shift_B", "shift_sin", &shift_grid),
                ],
            ),
            "tpc_recenter_getNP" => Self::new(
                name,
                vec![
                    TableSpec::new("tpc_recenter_N_A", "tpc_recenter_N_cos", &grid),
                    TableSpec::new("tpc_recenter_N_B", "tpc_recenter_N_sin", &grid),
                    TableSpec::new("tpc_recenter_P_A", "tpc_recenter_P_cos", &grid),
                    TableSpec::new("tpc_recenter_P_B", "tpc_recenter_P_sin", &grid),
                ],
            ),
            "bbc_shift_getAB_orig" => Self::new(
                name,
                vec![
                    TableSpec::new("bbc_shift_A", "bbc_shift_cos", &[N_BBC_SHIFT]),
                    TableSpec::new("bbc_shift_B", "bbc_shift_sin", &[N_BBC_SHIFT]),
                ],
            ),
            other => return Err(CalibError::UnknownRecipe(other.to_string())),
        };
        Ok(recipe)
    }

    /// Load a recipe from YAML (or JSON).
    pub fn from_yaml_str(text: &str) -> Result<Self> {
        let recipe: Self = serde_yaml_ng::from_str(text)?;
        recipe.validate()?;
        Ok(recipe)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        Self::from_yaml_str(&std::fs::read_to_string(path.as_ref())?)
    }

    pub fn validate(&self) -> Result<()> {
        if self.tables.is_empty() {
            return Err(CalibError::Shape(format!("recipe '{}' has no tables", self.name)));
        }
        for (i, t) in self.tables.iter().enumerate() {
            t.validate()?;
            if self.tables[..i].iter().any(|o| o.name == t.name) {
                return Err(CalibError::Shape(format!("recipe '{}': table '{}' appears twice", self.name, t.name)));
            }
        }
        Ok(())
    }

    /// Include guard, e.g. `RECENTER_GETAB_H`.
    pub fn guard(&self) -> String {
        self.guard.clone().unwrap_or_else(|| {
            let mut g: String = self
                .name
                .chars()
                .map(|c| if c.is_ascii_alphanumeric() { c.to_ascii_uppercase() } else { '_' })
                .collect();
            g.push_str("_H");
            g
        })
    }
}

/// Extract every table of `recipe`, in recipe order. Tables are read in parallel.
pub fn extract_recipe(file: &RootFile, recipe: &Recipe) -> Result<Vec<CalibTable>> {
    recipe.validate()?;
    let tables = recipe.tables.par_iter().map(|spec| extract_table(file, spec)).collect::<Result<Vec<_>>>()?;
    log::info!("{}: extracted {} tables from {}", recipe.name, tables.len(), file.path().display());
    Ok(tables)
}

/// Render `tables` as a header: guard, provenance comment, one declaration
/// per table.
pub fn render_header(recipe: &Recipe, tables: &[CalibTable], source: &str) -> Result<String> {
    let guard = recipe.guard();
    let mut out = String::new();
    out.push_str(&format!("// {} tables from {source}\n", recipe.name));
    out.push_str(&format!("#ifndef {guard}\n#define {guard}\n"));
    for t in tables {
        out.push('\n');
        out.push_str(&t.to_c_literal(&recipe.ctype)?);
    }
    out.push_str(&format!("\n#endif // {guard}\n"));
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtins_have_expected_shapes() {
        let r = Recipe::builtin("recenter_getAB").unwrap();
        assert_eq!(r.tables.len(), 2);
        assert_eq!(r.tables[0].dims, vec![9, 10, 20]);
        assert_eq!(r.tables[1].prefix, "recenter_sin");

        let r = Recipe::builtin("shift_getAB").unwrap();
        assert_eq!(r.tables[0].dims, vec![9, 20, 20]);

        let r = Recipe::builtin("tpc_recenter_getNP").unwrap();
        let names: Vec<&str> = r.tables.iter().map(|t| t.name.as_str()).collect();
        assert_eq!(names, ["tpc_recenter_N_A", "tpc_recenter_N_B", "tpc_recenter_P_A", "tpc_recenter_P_B"]);

        let r = Recipe::builtin("bbc_shift_getAB_orig").unwrap();
        assert_eq!(r.tables[0].dims, vec![1359]);
        assert_eq!(r.tables[0].histogram_name(&[]), "bbc_shift_cos");

        for name in BUILTIN_RECIPES {
            Recipe::builtin(name).unwrap().validate().unwrap();
        }
        assert!(matches!(Recipe::builtin("nope"), Err(CalibError::UnknownRecipe(_))));
    }

    #[test]
    fn guard_from_name() {
        assert_eq!(Recipe::builtin("recenter_getAB").unwrap().guard(), "RECENTER_GETAB_H");
        let mut r = Recipe::builtin("shift_getAB").unwrap();
        r.guard = Some("MY_GUARD".into());
        assert_eq!(r.guard(), "MY_GUARD");
    }

    #[test]
    fn yaml_recipe() {
        let r = Recipe::from_yaml_str(
            "name: v2\nctype: static const double\ntables:\n  - { name: v2_A, prefix: v2_cos, dims: [3, 4], first_bin: 2 }\n",
        )
        .unwrap();
        assert_eq!(r.ctype, "static const double");
        assert_eq!(r.tables[0].first_bin, 2);
        assert!(Recipe::from_yaml_str("name: empty\ntables: []\n").is_err());
        assert!(Recipe::from_yaml_str("name: x\ntables:\n  - { name: a, prefix: p, dims: [1] }\n  - { name: a, prefix: q, dims: [1] }\n").is_err());
        let huge = "name: a\ntables:\n  - { name: a, prefix: h, dims: [3], first_bin: 18446744073709551615 }\n";
        assert!(matches!(Recipe::from_yaml_str(huge), Err(CalibError::Shape(_))));
    }

    #[test]
    fn header_layout() {
        let r = Recipe::new("demo", vec![TableSpec::new("d_A", "d", &[2])]);
        let t = CalibTable::new("d_A", &[2], vec![0.5, -1.0]).unwrap();
        let h = render_header(&r, &[t], "calib.root").unwrap();
        assert_eq!(
            h,
            "// demo tables from calib.root\n#ifndef DEMO_H\n#define DEMO_H\n\nconst double d_A[2] = {5e-1, -1e0};\n\n#endif // DEMO_H\n"
        );
    }
}
