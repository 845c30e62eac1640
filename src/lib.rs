//! tally: an expense ledger that syncs against a REST backend.
//!
//! The crate is split into two cooperating layers:
//!
//! - [`api`]: a typed HTTP access layer. One explicitly configured
//!   [`api::ApiClient`] and generic [`api::ResourceService`] instances that
//!   speak to a single collection endpoint (cancellable list, create, update,
//!   remove).
//! - [`ledger`]: the in-memory ledger. An ordered collection of entries, a
//!   category-filtered view, optimistic mutations, and a refresh operation
//!   that replaces the collection from the server while discarding overtaken
//!   fetches.
//!
//! Rendering is out of scope; the `tally` binary is a thin CLI driver over
//! these two layers.

pub mod api;
pub mod config;
pub mod ledger;
pub mod util;
