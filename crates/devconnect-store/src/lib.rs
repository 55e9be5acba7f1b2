//! # devconnect-store
//!
//! Persistence side of the chat subsystem: the relational store (SQLite via
//! `rusqlite`), object storage buckets for attachments, and the realtime
//! change feed that pushes row inserts/updates to subscribed clients.
//!
//! The view-models never touch these directly. They talk to a
//! [`ChatBackend`], which [`LocalBackend`] implements on top of the three.

pub mod backend;
pub mod buckets;
pub mod chats;
pub mod database;
pub mod members;
pub mod messages;
pub mod migrations;
pub mod profiles;
pub mod realtime;

mod error;

pub use backend::{ChatBackend, LocalBackend, NewChat};
pub use buckets::{BucketStore, StoredObject};
pub use database::{now, Database};
pub use error::{Result, StoreError};
pub use realtime::{
    ChangeFilter, ChangeKind, RealtimeHub, RealtimeSubscription, Record, RowChange, Table,
};
