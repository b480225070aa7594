//! Operator tools for region-metadata surgery on a range-partitioned,
//! column-family table store.
//!
//! Regions are described by rows in a metadata table, keyed so that a
//! slice of a table's key space maps onto a contiguous slice of metadata
//! rows. Three procedures work on that mapping:
//!
//! - [`excise::ExciseProcedure`] takes every region overlapping a key
//!   range out of the metadata table, archiving the removed descriptors.
//! - [`plug::PlugProcedure`] fills a key-space hole with one synthesized
//!   region.
//! - [`bulk`] seeds and tears down batches of pre-split load-test tables.
//!
//! All of them reach the cluster through the traits in [`catalog`]. The
//! fjall-backed [`catalog::LocalCluster`] works directly on a store data
//! directory; [`catalog::MemoryCluster`] backs the tests.

pub mod bulk;
pub mod catalog;
pub mod descriptor;
pub mod error;
pub mod excise;
pub mod plug;
pub mod scanner;

pub use error::{RepairError, Result};
