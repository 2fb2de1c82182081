//! Workgraph - typed entity graph over SQLite
//!
//! Global node resolution by id and relay cursor pagination for the
//! work-order graph, exposed through GraphQL.

extern crate self as workgraph;

pub mod api;
pub mod config;
pub mod db;
pub mod ent;
pub mod entities;
pub mod graphql;
pub mod logging;
