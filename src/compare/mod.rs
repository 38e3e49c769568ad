mod comparator;
mod diff;

pub use comparator::{compare_results, equivalent};
pub use diff::{FieldDiff, Mismatch};
