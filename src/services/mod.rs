//! Read API and administrative operations, one module per resource. An HTTP
//! layer maps these one-to-one onto routes.

pub mod alerts;
pub mod leads;
pub mod metrics;
