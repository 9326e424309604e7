//! LexNet Pipeline prelude: convenient imports for common usage.
//!
//! ```rust
//! use lexnet_pipeline::prelude::*;
//! ```

// Re-export preprocessing
pub use crate::cooccurrence::{
    add_co_occurrences, preprocess, simplify_citekey, CooccurrenceReport, DecisionNetworkCache,
    Preprocessed,
};
pub use crate::reduction::{quotient_graph_with_merge, ContractionRule, NodesMapping};
pub use crate::sequence::{sequence_graph, Decay};

// Re-export clustering
pub use crate::clustering::{cluster, compile_source_graph, ClusterParams, Clustering, WeightedNetwork};
pub use crate::consensus::consensus_clustering;

// Re-export evolution
pub use crate::evolution::{
    cluster_families, EvolutionBuilder, EvolutionGraph, LeafMapping, LeafTarget, MappingDiagnostic,
};
pub use crate::snapshot_index::SnapshotIndex;

// Re-export stage plumbing
pub use crate::storage::DataLayout;
pub use crate::sweep::{filter_selected, run_sweep, SweepReport};

pub use lexnet_core::prelude::*;
