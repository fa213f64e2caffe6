pub mod classifier;
pub mod drift;

pub use classifier::{classify, percent_change, PairClass};
pub use drift::{compare_snapshots, Comparator};
