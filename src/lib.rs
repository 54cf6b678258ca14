//! Battery dispatch controller.
//!
//! Computes each battery's 24-hour charge/discharge schedule as a MILP that
//! trades incentive-program rewards against charging and grid costs, freezes
//! the elapsed hours of the day and serves the result over HTTP.

pub mod api;
pub mod config;
pub mod controller;
pub mod domain;
pub mod optimizer;
pub mod repo;
pub mod telemetry;
