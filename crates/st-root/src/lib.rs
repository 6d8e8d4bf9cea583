//! # st-root
//!
//! Native ROOT container I/O for the stpico workspace.
//!
//! Reads TH1D/TH1F/TProfile histograms and arbitrary keyed objects from
//! `.root` files without external ROOT libraries (zlib, LZ4, ZSTD and XZ
//! payloads), and writes flat files of histograms and custom objects.
//!
//! ## Example
//!
//! ```no_run
//! use st_root::{Histogram, RootFile, RootFileWriter};
//!
//! let mut p = Histogram::new_profile("recenter_cos0_0", "", 20, 0.5, 20.5).unwrap();
//! p.fill_profile(2.0, 0.12, 1.0).unwrap();
//!
//! let mut w = RootFileWriter::new("calib.root").with_compression(6);
//! w.put_histogram(&p).unwrap();
//! w.write("calib.root").unwrap();
//!
//! let f = RootFile::open("calib.root").unwrap();
//! for key in f.list_keys().unwrap() {
//!     println!("{} ({})", key.name, key.class_name);
//! }
//! let h = f.get_histogram("recenter_cos0_0").unwrap();
//! println!("<cos 2phi> = {}", h.bin_content(2));
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compress;
pub mod datasource;
pub mod directory;
pub mod error;
pub mod file;
pub mod histogram;
pub mod key;
pub mod objects;
pub mod rbuffer;
pub mod wbuffer;
pub mod writer;

pub use error::{Result, RootError};
pub use file::RootFile;
pub use histogram::{Axis, Histogram, HistogramKind, ProfileCells, Stats};
pub use key::{Key, KeyInfo};
pub use rbuffer::RBuffer;
pub use wbuffer::{ObjectToken, WBuffer};
pub use writer::RootFileWriter;
