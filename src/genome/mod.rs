//! Genomic domain types: chromosomes, coordinate ranges, variants,
//! association records, and gene position lookup.

pub mod coordinate;
pub mod gene;
pub mod record;
pub mod variant;

pub use coordinate::{Chromosome, GenomicRange};
pub use gene::GeneTable;
pub use record::{AssociationRecord, ColumnMap};
pub use variant::Variant;
