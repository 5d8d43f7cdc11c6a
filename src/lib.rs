//! Conditional Access policy manager
//!
//! Talks to the policy backend, renders its collection as a sortable,
//! selectable table and runs sequential bulk operations with live progress.

pub mod api;
pub mod bulk;
pub mod cmd;
pub mod config;
pub mod error;
pub mod model;
pub mod table;
