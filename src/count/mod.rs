pub mod filter;
pub mod final_count;
pub mod raw;

pub use filter::filter_by_length;
pub use filter::FilterStats;
pub use filter::FilteredCounts;

pub use final_count::final_counts;
pub use final_count::top_umis;
pub use final_count::FinalCountRecord;

pub use raw::RawCountRecord;
pub use raw::RawCounter;
