//! Billing features over the session layer: GST arithmetic, resource models
//! and the typed backend API.

pub mod api;
pub mod gst;
pub mod models;

pub use api::{BillingApi, BillingError};
pub use gst::{GstBreakdown, GstError, SupplyKind};
