//! # LexNet Pipeline
//!
//! Preprocessing, clustering and evolution stages.
//!
//! The stages run in order. Reduction contracts the hierarchy, the augmenter
//! injects sequence and co-occurrence edges, the clustering engine partitions
//! the result per configuration, and the evolution builder links the
//! partitions of consecutive snapshots.

pub mod clustering;
pub mod consensus;
pub mod cooccurrence;
pub mod evolution;
pub mod prelude;
pub mod quotient;
pub mod reduction;
pub mod sequence;
pub mod snapshot_index;
pub mod stages;
pub mod storage;
pub mod sweep;
