//! # st-calib
//!
//! Event-plane flow calibration tables.
//!
//! Two halves: [`fill`] accumulates the recentering and shift profiles over
//! pico events, and [`recipe`] reads them back out of a ROOT file as
//! fixed-rank tables and renders them as C array literals in a header.
//!
//! ```no_run
//! use st_calib::{Recipe, extract_recipe, render_header};
//! use st_root::RootFile;
//!
//! let file = RootFile::open("calib.root").unwrap();
//! let recipe = Recipe::builtin("recenter_getAB").unwrap();
//! let tables = extract_recipe(&file, &recipe).unwrap();
//! print!("{}", render_header(&recipe, &tables, "calib.root").unwrap());
//! ```

#![warn(clippy::all)]

pub mod error;
pub mod extract;
pub mod fill;
pub mod recipe;
pub mod table;

pub use error::{CalibError, Result};
pub use extract::{TableSpec, extract_table};
pub use fill::{FillStats, FlowCalibConfig, FlowCalibFiller, FlowCalibMaker, RecenterCorrection};
pub use recipe::{BUILTIN_RECIPES, Recipe, extract_recipe, render_header};
pub use table::CalibTable;
