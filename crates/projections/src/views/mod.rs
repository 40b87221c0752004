//! Projections that maintain views.

pub mod order_view;

pub use order_view::OrderViewProjection;
