//! Business objects and their persistence behavior.
//!
//! The object model is dynamic: a [`BusinessObject`] is a typed attribute
//! map whose schema is declared once per type at program start through the
//! [`BoMetaBuilder`]. Attribute descriptors validate every write; the
//! [`Persistence`] unit of work drives fetch/insert/diff-update against a
//! backend; the [`ChangeHub`] fans change events out to subscribers; and
//! [`ListSubscription`] keeps live query results fresh for an external
//! delivery channel.

pub mod bo;
pub mod convert;
pub mod descriptors;
pub mod flags;
pub mod hub;
pub mod list_subscription;
pub mod persistence;
pub mod repo;
pub mod transient;

pub use bo::{BoMeta, BoMetaBuilder, BusinessObject, SchemaRegistry};
pub use convert::{convert_from_db, normalize_date, normalize_datetime};
pub use descriptors::AttrSpec;
pub use flags::{FlagType, FlagValue};
pub use hub::{BASE_TYPE_NAME, BoCallback, BoFuture, ChangeHub, ChangeSubscriber};
pub use list_subscription::{ListPayload, ListSink, ListSubscription};
pub use persistence::Persistence;
pub use repo::Repository;
pub use transient::TransientRegistry;
