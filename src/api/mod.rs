//! HTTP access layer.
//!
//! One explicitly configured [`ApiClient`] (no ambient global) and generic
//! [`ResourceService`] instances built on top of it. Each service covers a
//! single collection endpoint and exposes list (cancellable), create, update
//! and remove. Errors are typed [`ApiError`] values; this layer never retries
//! and never panics on failure.

mod client;
mod resource;

pub use client::{ApiClient, ApiError};
pub use resource::{CancelHandle, Identified, ListRequest, ResourceService};
