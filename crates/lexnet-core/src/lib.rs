//! # LexNet Core
//!
//! Data model and algorithms for community detection on hierarchical legal
//! citation networks.
//!
//! - [`graph`]: the document multigraph and its containment hierarchy
//! - [`config`]: run configurations and their filename identities
//! - [`louvain`], [`infomap`]: modularity- and flow-based clustering
//! - [`tree`]: hierarchical cluster trees
//!
//! ## Quick Start
//!
//! ```rust
//! use lexnet_core::prelude::*;
//!
//! let config = RunConfig::from_filename("2019_1-0_1-0_-1_a-louvain_s7.json").unwrap();
//! assert_eq!(config.method, Some(Method::Louvain));
//! assert_eq!(config.pp_merge, -1);
//! ```

pub mod config;
pub mod error;
pub mod graph;
pub mod infomap;
pub mod louvain;
pub mod prelude;
pub mod tree;
pub mod types;
