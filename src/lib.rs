//! Slot allocation engine for a container yard.
//!
//! Containers are grouped by carrier (inbound) or destination port
//! (outbound), classified into weight classes and stacked into zone slots
//! that respect length, reefer and tier constraints.

pub mod allocator;
pub mod api;
pub mod config;
pub mod error;
pub mod layout;
pub mod logging;
pub mod metrics;
pub mod model;
pub mod proposal;
pub mod session;
pub mod types;
pub mod weight;
pub mod yard;
