//! Spreadsheet evaluation core.
//!
//! Three cooperating subsystems: a sparse [`sheet::Sheet`] of cells whose
//! contents are raw text or arithmetic formulas, a [`formula`] layer that
//! parses expressions and evaluates them on demand through an injected
//! lookup, and a [`dep_graph::DepGraph`] that rejects cyclic writes and
//! drives transitive cache invalidation when an upstream cell changes.
//!
//! Everything is single-threaded: reads memoise through interior
//! mutability, so no type here is `Sync`.

pub mod cell;
pub mod dep_graph;
pub mod error;
pub mod formula;
pub mod position;
pub mod sheet;
