//! Core types and contracts for the Moneta persistence core.
//!
//! `moneta-core` is the foundation layer for the workspace. It defines the
//! traits and data types every other crate builds on.
//!
//! # Role In The Architecture
//!
//! - **Contract layer**: [`Connection`] and [`Backend`] are implemented by the
//!   database drivers; [`Dialect`] is the per-backend SQL strategy threaded
//!   through the statement builders.
//! - **Data model**: [`Row`], [`Value`], and [`SqlParams`] represent query
//!   inputs and outputs shared across the statement, session, and driver
//!   crates.
//! - **Structured concurrency**: re-exports `Cx` and `Outcome` from
//!   asupersync so every async database operation is cancel-correct.
//!
//! # Who Uses This Crate
//!
//! - `moneta-sql` consumes [`Value`], [`Dialect`], and the error taxonomy to
//!   build parameterized statements.
//! - `moneta-session` depends on [`Connection`] for its execution contexts.
//! - Driver crates (`moneta-sqlite`, `moneta-mysql`, `moneta-postgres`)
//!   implement [`Connection`]/[`Backend`] and operate on [`Row`]/[`Value`].
//! - `moneta-model` and `moneta-schema` use the attribute/column metadata
//!   types to describe business-object schemas.
//!
//! Most applications should use the `moneta` facade; reach for `moneta-core`
//! directly when writing drivers or advanced integrations.

// Re-export asupersync primitives for structured concurrency
pub use asupersync::{Cx, Outcome};

pub mod config;
pub mod connection;
pub mod dialect;
pub mod error;
pub mod flags;
pub mod params;
pub mod row;
pub mod types;
pub mod value;

pub use config::{DbConfig, MySqlFlavor};
pub use connection::{Backend, Connection, ExecResult};
pub use dialect::{Dialect, SqlTemplate};
pub use error::{Error, Result};
pub use flags::ColumnFlags;
pub use params::{SqlParams, bind_positional};
pub use row::Row;
pub use types::{AttrExtra, AttrType};
pub use value::Value;
