//! `sectorform` - A sector choice form over a document store
//!
//! This library provides the data-sync core of the form: the sector index
//! built from a hierarchical taxonomy, the choice repository with its
//! reload-after-write cache, declarative validation, and the list/edit
//! controller that ties them together.

#![warn(missing_docs)]
#![warn(missing_debug_implementations)]
#![deny(unsafe_code)]

pub mod choices;
pub mod cli;
pub mod config;
pub mod controller;
pub mod error;
pub mod logging;
pub mod model;
pub mod render;
pub mod sectors;
pub mod store;
pub mod validation;

pub use choices::{ChoiceRepository, RefreshStrategy, Written};
pub use config::Config;
pub use controller::{FormController, LoadOutcome, Notice, NoticeLevel, Outcome, View};
pub use error::{Error, Result};
pub use logging::init_logging;
pub use model::{Choice, ChoiceDraft, Sector};
pub use sectors::{NestingOrder, SectorIndex, SectorIndexBuilder};
pub use store::{DocumentStore, MemoryStore, SqliteStore, StoreStats};
pub use validation::{Schema, ValidationErrors, Validator};
