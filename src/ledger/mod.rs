//! The in-memory expense ledger.
//!
//! - [`entry`] - the data model: [`Entry`], the fixed [`Category`] set, and
//!   validated [`EntryDraft`] candidates
//! - [`controller`] - [`LedgerController`], which owns the ordered collection,
//!   its category-filtered view, and the refresh cycle against the server

mod controller;
mod entry;

pub use controller::{LedgerController, LedgerError};
pub use entry::{
    Category, DraftError, Entry, EntryDraft, ParseCategoryError, MIN_DESCRIPTION_LEN,
};
