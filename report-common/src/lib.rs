//! Shared record vocabulary for the jamf-report workspace.
//!
//! This crate holds the types every stage of a report run agrees on:
//! which artifact a row describes, which kind of policy references it,
//! and the scalar cells a spreadsheet row is made of.

mod kind;
mod row;

pub use kind::{ArtifactKind, SiteKind};
pub use row::{Cell, ReportRow};
