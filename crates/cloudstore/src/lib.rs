//! HTTP adapter for the hosted datalog and alert service.
//!
//! `CloudStore` implements both `SensorLog` (reading history) and
//! `AlertStore` (alert persistence) against the REST backend, so one
//! configured client covers both halves of the polling cycle.

mod client;

pub use client::*;
