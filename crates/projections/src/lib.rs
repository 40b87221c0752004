//! Read side of conference registration.
//!
//! This crate provides:
//! - [`ViewRepository`], the write contract the core publishes snapshots into
//! - [`InMemoryViewRepository`] with the lookups the presentation layer needs
//! - [`OrderViewProjection`] which folds order events into snapshots
//! - [`ProjectionProcessor`] for catch-up from the log and live delivery

pub mod error;
pub mod processor;
pub mod projection;
pub mod view_repository;
pub mod views;

pub use error::{ProjectionError, Result};
pub use processor::ProjectionProcessor;
pub use projection::{Projection, ProjectionPosition};
pub use view_repository::{ConferenceSnapshot, InMemoryViewRepository, OrderSnapshot, ViewRepository};
pub use views::OrderViewProjection;
