//! LexNet Core prelude: convenient imports for common usage.
//!
//! ```rust
//! use lexnet_core::prelude::*;
//! ```

pub use crate::types::{
    Bipartite, EdgeData, EdgeType, NodeData, NodeKind, SizeAttr, SizeMetrics, ROOT_LEVEL,
};

pub use crate::graph::{DocGraph, Hierarchy, SerializedGraph};

pub use crate::config::{ConfigSpace, CooccurrenceType, Method, RunConfig};

pub use crate::tree::ClusterTree;

pub use crate::error::{ConfigError, GraphError, LexnetError, Result};
