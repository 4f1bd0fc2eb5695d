//! This crate contains the command-dispatch and execution core of a MongoDB client driver. It turns
//! a logical database operation into a wire request, selects the cluster member that should receive
//! it, leases a connection, performs the request/response exchange, and converts the raw reply into
//! a typed result.
//!
//! Cluster monitoring, server selection and connection pooling are not implemented here; they are
//! consumed through the [`Topology`](sdam::Topology), [`ConnectionSource`](sdam::ConnectionSource)
//! and [`Connection`](cmap::Connection) traits. The driver uses the [`bson`] crate for its document
//! model and [`tokio`] for its asynchronous runtime.
//!
//! # Dispatching an operation
//!
//! ```rust,no_run
//! # use std::sync::Arc;
//! # use mongodb_dispatch::{
//! #     bson::doc,
//! #     dispatch::WriteOutcome,
//! #     error::Result,
//! #     operation::FindAndModify,
//! #     options::ClientOptions,
//! #     sdam::Topology,
//! #     Client,
//! #     Namespace,
//! # };
//! #
//! # async fn run(topology: Arc<dyn Topology>) -> Result<()> {
//! let client = Client::new(topology, ClientOptions::default());
//! let op = FindAndModify::with_delete(Namespace::new("test", "c"), doc! { "_id": 1 }, Vec::new());
//!
//! match client.find_and_modify(op).await? {
//!     WriteOutcome::Acknowledged(result) => println!("deleted {:?}", result.value),
//!     WriteOutcome::Unacknowledged => println!("write sent without acknowledgement"),
//! }
//! # Ok(())
//! # }
//! ```
//!
//! # Acknowledgement
//!
//! Write-capable operations resolve to a [`WriteOutcome`](dispatch::WriteOutcome). When the
//! effective write concern is unacknowledged (`w: 0`), the operation is executed by a detached
//! background task and dispatch returns [`WriteOutcome::Unacknowledged`](dispatch::WriteOutcome)
//! immediately. That variant is not an error: it reports that the write was launched and that its
//! outcome is intentionally not observed.

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![allow(clippy::derive_partial_eq_without_eq)]

pub use ::bson;

mod bson_util;
pub mod client;
pub mod cmap;
mod concern;
pub mod context;
pub mod cursor;
pub mod dispatch;
pub mod error;
mod index;
mod namespace;
pub mod operation;
pub mod options;
pub mod results;
mod runtime;
pub mod sdam;
mod selection_criteria;
mod serde_util;
mod trace;

pub use crate::{
    client::Client,
    context::OperationContext,
    cursor::Cursor,
    dispatch::WriteOutcome,
    namespace::Namespace,
};
