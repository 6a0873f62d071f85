pub mod association;
pub mod count_table;
pub mod design;
pub mod fastq;
pub mod label;
pub mod manifest;
pub mod tables;

pub use association::AssociatedInsert;
pub use association::AssociationLoadStats;
pub use association::AssociationMap;

pub use design::Design;
pub use label::Labels;

pub use manifest::ExperimentRow;
pub use manifest::Manifest;
pub use manifest::RejectedRow;

pub use fastq::open_fasta;
pub use fastq::open_fastq;
pub use fastq::open_maybe_compressed;
