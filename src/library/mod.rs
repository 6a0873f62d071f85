pub mod aggregate;
pub mod associate;
pub mod join;

pub use join::join_dna_rna;
pub use join::MergedCountRow;

pub use associate::AssignedCountRow;
pub use associate::Association;
pub use associate::AssociationOutput;
pub use associate::AssociationStats;
pub use associate::CondRepTable;
pub use associate::InsertRow;
pub use associate::LibraryAssociator;
pub use associate::MpraAnalyzeCounts;

pub use aggregate::aggregate;
pub use aggregate::AnnotationRow;
pub use aggregate::AverageRow;
pub use aggregate::ConditionOutput;
pub use aggregate::MasterTable;
pub use aggregate::MpraAnalyzeTables;
pub use aggregate::ReplicateRow;
