//! ROOT object (de)serialization dispatch.

mod th1;

pub use th1::{read_histogram, write_histogram};

/// Classes [`read_histogram`] decodes.
pub const HISTOGRAM_CLASSES: [&str; 3] = ["TH1D", "TH1F", "TProfile"];

/// Whether `class_name` is a histogram class this crate reads.
pub fn is_histogram_class(class_name: &str) -> bool {
    HISTOGRAM_CLASSES.contains(&class_name)
}
