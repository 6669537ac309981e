//! # Runtime
//!
//! Wiring between the reconciler and `kube-runtime`.
//!
//! - `initialization`: rustls, tracing, metrics, HTTP server and client setup
//! - `watch_loop`: the `Controller` driving reconciliations
//! - `schedule`: per-resource due times gating status-only watch events
//! - `error_policy`: handling of reconciliation and watch stream errors

pub mod error_policy;
pub mod initialization;
pub mod schedule;
pub mod watch_loop;
