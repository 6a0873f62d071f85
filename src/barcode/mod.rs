pub mod merge_pairs;
pub mod revcomp;

pub use merge_pairs::MergeParams;
pub use merge_pairs::MergeStats;
pub use merge_pairs::MergedRecord;
pub use merge_pairs::ReadPairMerger;

pub use revcomp::revcomp_n;
