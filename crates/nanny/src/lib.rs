//! Pod nanny daemon
//!
//! The binary wires settings, the estimator and the Kubernetes client into the poll
//! loop; this library half holds the HTTP API so it can be exercised in tests.

pub mod api;
