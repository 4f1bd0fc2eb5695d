//! Contains [`Client`], which binds a [`Topology`] to the configuration defaults applied to every
//! operation dispatched through it.

pub(crate) mod options;
#[cfg(test)]
mod test;

use std::{sync::Arc, time::Duration};

use derive_where::derive_where;
use futures_util::future::{BoxFuture, FutureExt};

use crate::{
    bson::Document,
    context::OperationContext,
    dispatch::{self, WriteOutcome},
    error::{Error, Result},
    operation::{Aggregate, CreateIndexes, Find, FindAndModify, ListDatabases, RunCommand},
    options::ClientOptions,
    results::{CreateIndexesResult, FindAndModifyResult, ListDatabasesResult},
    runtime,
    sdam::{SelectedServer, Topology},
    selection_criteria::SelectionCriteria,
    Cursor,
};

const DEFAULT_SERVER_SELECTION_TIMEOUT: Duration = Duration::from_secs(30);

/// This is the main entry point for the API. A `Client` dispatches operations to the servers of a
/// [`Topology`], applying the defaults in its [`ClientOptions`]:
///
///   - the configured write concern is appended to the options of write operations, so a write
///     concern supplied on the operation itself takes precedence
///   - the configured read concern is used by `find` when the operation carries none
///   - reads are routed by the configured read preference, and writes to a primary
///   - server selection fails after the configured server selection timeout
///   - every operation is cancelled once the configured timeout elapses
///
/// `Client` uses [`std::sync::Arc`] internally, so it can safely be shared across threads or async
/// tasks, and cloning it is cheap.
#[derive(Clone, Debug)]
pub struct Client {
    inner: Arc<ClientInner>,
}

#[derive_where(Debug)]
struct ClientInner {
    #[derive_where(skip)]
    topology: BoundedTopology,
    options: ClientOptions,
}

impl Client {
    /// Creates a new `Client` dispatching to `topology`.
    pub fn new(topology: Arc<dyn Topology>, options: ClientOptions) -> Self {
        let topology = BoundedTopology {
            topology,
            timeout: options
                .server_selection_timeout
                .unwrap_or(DEFAULT_SERVER_SELECTION_TIMEOUT),
        };
        Self {
            inner: Arc::new(ClientInner { topology, options }),
        }
    }

    /// The options this client was created with.
    pub fn options(&self) -> &ClientOptions {
        &self.inner.options
    }

    /// A fresh context for a single operation, with the configured timeout applied.
    pub fn context(&self) -> OperationContext {
        self.bound(&OperationContext::new())
    }

    /// Runs a `findAndModify`. See [`dispatch::find_and_modify`].
    pub async fn find_and_modify(
        &self,
        op: FindAndModify,
    ) -> Result<WriteOutcome<FindAndModifyResult>> {
        self.find_and_modify_with_context(&self.context(), op).await
    }

    /// Runs a `findAndModify` under `ctx`.
    pub async fn find_and_modify_with_context(
        &self,
        ctx: &OperationContext,
        op: FindAndModify,
    ) -> Result<WriteOutcome<FindAndModifyResult>> {
        dispatch::find_and_modify(
            &self.bound(ctx),
            op,
            &self.inner.topology,
            &SelectionCriteria::writable(),
            self.inner.options.write_concern.as_ref(),
        )
        .await
    }

    /// Runs an `aggregate`. See [`dispatch::aggregate`].
    pub async fn aggregate(&self, op: Aggregate) -> Result<WriteOutcome<Cursor>> {
        self.aggregate_with_context(&self.context(), op).await
    }

    /// Runs an `aggregate` under `ctx`.
    pub async fn aggregate_with_context(
        &self,
        ctx: &OperationContext,
        op: Aggregate,
    ) -> Result<WriteOutcome<Cursor>> {
        dispatch::aggregate(
            &self.bound(ctx),
            op,
            &self.inner.topology,
            &self.read_selector(),
            self.inner.options.write_concern.as_ref(),
        )
        .await
    }

    /// Runs a `find`. See [`dispatch::find`].
    pub async fn find(&self, op: Find) -> Result<Cursor> {
        self.find_with_context(&self.context(), op).await
    }

    /// Runs a `find` under `ctx`.
    pub async fn find_with_context(&self, ctx: &OperationContext, op: Find) -> Result<Cursor> {
        dispatch::find(
            &self.bound(ctx),
            op,
            &self.inner.topology,
            &self.read_selector(),
            self.inner.options.read_concern.as_ref(),
        )
        .await
    }

    /// Runs a `createIndexes` against a primary.
    pub async fn create_indexes(&self, op: CreateIndexes) -> Result<CreateIndexesResult> {
        self.create_indexes_with_context(&self.context(), op).await
    }

    /// Runs a `createIndexes` under `ctx`.
    pub async fn create_indexes_with_context(
        &self,
        ctx: &OperationContext,
        op: CreateIndexes,
    ) -> Result<CreateIndexesResult> {
        dispatch::create_indexes(
            &self.bound(ctx),
            op,
            &self.inner.topology,
            &SelectionCriteria::writable(),
        )
        .await
    }

    /// Runs a `listDatabases`.
    pub async fn list_databases(&self, op: ListDatabases) -> Result<ListDatabasesResult> {
        self.list_databases_with_context(&self.context(), op).await
    }

    /// Runs a `listDatabases` under `ctx`.
    pub async fn list_databases_with_context(
        &self,
        ctx: &OperationContext,
        op: ListDatabases,
    ) -> Result<ListDatabasesResult> {
        dispatch::list_databases(&self.bound(ctx), op, &self.inner.topology).await
    }

    /// Runs an arbitrary command, routed by the configured read preference.
    pub async fn run_command(&self, op: RunCommand) -> Result<Document> {
        self.run_command_with_context(&self.context(), op).await
    }

    /// Runs an arbitrary command under `ctx`.
    pub async fn run_command_with_context(
        &self,
        ctx: &OperationContext,
        op: RunCommand,
    ) -> Result<Document> {
        dispatch::run_command(
            &self.bound(ctx),
            op,
            &self.inner.topology,
            &self.read_selector(),
        )
        .await
    }

    fn read_selector(&self) -> SelectionCriteria {
        self.inner
            .options
            .read_preference
            .map(SelectionCriteria::from)
            .unwrap_or_else(SelectionCriteria::writable)
    }

    fn bound(&self, ctx: &OperationContext) -> OperationContext {
        match self.inner.options.timeout {
            Some(timeout) => ctx.clone().with_timeout(timeout),
            None => ctx.clone(),
        }
    }
}

/// Wraps a topology so that server selection fails once the selection timeout elapses.
struct BoundedTopology {
    topology: Arc<dyn Topology>,
    timeout: Duration,
}

impl Topology for BoundedTopology {
    fn select_server<'a>(
        &'a self,
        criteria: &'a SelectionCriteria,
    ) -> BoxFuture<'a, Result<SelectedServer>> {
        async move {
            match runtime::timeout(self.timeout, self.topology.select_server(criteria)).await {
                Ok(result) => result,
                Err(_) => Err(Error::server_selection(format!(
                    "Server selection timeout: No available servers matching {} after {:?}",
                    criteria, self.timeout
                ))),
            }
        }
        .boxed()
    }
}
