//! Orchestrates the execution of operations against a [`Topology`]: selecting a server, leasing a
//! connection, merging options derived from the client configuration, deciding whether a write is
//! acknowledged, and running the operation's round trip.
//!
//! Every function here releases the connection it leased exactly once, on every exit path. The
//! lease is released by the caller's task after a synchronous round trip, handed to a detached task
//! for an unacknowledged write, or handed to a [`Cursor`] for operations that produce one.


use std::panic::AssertUnwindSafe;

use futures_util::FutureExt;
use tracing::Instrument;

use crate::{
    bson::Document,
    cmap::ConnectionLease,
    concern::{ReadConcern, WriteConcern},
    context::OperationContext,
    error::Result,
    operation::{
        round_trip,
        Aggregate,
        CreateIndexes,
        CursorSpecification,
        Find,
        FindAndModify,
        ListDatabases,
        Operation,
        RunCommand,
    },
    options::{self, CommandOption},
    results::{CreateIndexesResult, FindAndModifyResult, ListDatabasesResult},
    runtime,
    sdam::{ServerDescription, Topology},
    selection_criteria::SelectionCriteria,
    trace::{
        phase_span,
        Phase,
        TracingRepresentation,
        COMMAND_TRACING_EVENT_TARGET,
        SERVER_SELECTION_TRACING_EVENT_TARGET,
    },
    Cursor,
};

/// The outcome of a write whose acknowledgement depends on its effective write concern.
///
/// `Unacknowledged` is not a failure. It reports that the write was handed to a detached
/// background task, and that its outcome, including any error, is deliberately not observed by the
/// caller.
#[derive(Debug, Clone, PartialEq)]
#[must_use]
pub enum WriteOutcome<T> {
    /// The server acknowledged the write and replied with this result.
    Acknowledged(T),

    /// The write was launched without waiting for a reply.
    Unacknowledged,
}

impl<T> WriteOutcome<T> {
    /// Whether the server acknowledged the write.
    pub fn is_acknowledged(&self) -> bool {
        matches!(self, Self::Acknowledged(_))
    }

    /// The result of an acknowledged write.
    pub fn acknowledged(self) -> Option<T> {
        match self {
            Self::Acknowledged(result) => Some(result),
            Self::Unacknowledged => None,
        }
    }

    /// Maps the result of an acknowledged write.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> WriteOutcome<U> {
        match self {
            Self::Acknowledged(result) => WriteOutcome::Acknowledged(f(result)),
            Self::Unacknowledged => WriteOutcome::Unacknowledged,
        }
    }
}

/// Executes a `findAndModify` on a server matching `selector`. `write_concern` is the configured
/// default; it is appended to the operation's options, so a write concern supplied on the
/// operation itself takes precedence.
///
/// If the effective write concern is unacknowledged, the command is executed in the background and
/// [`WriteOutcome::Unacknowledged`] is returned as soon as it is launched.
pub async fn find_and_modify(
    ctx: &OperationContext,
    mut op: FindAndModify,
    topology: &dyn Topology,
    selector: &SelectionCriteria,
    write_concern: Option<&WriteConcern>,
) -> Result<WriteOutcome<FindAndModifyResult>> {
    op.validate()?;
    let criteria = op.selection_criteria().unwrap_or_else(|| selector.clone());
    let (description, connection) =
        select_and_check_out::<FindAndModify>(ctx, topology, &criteria).await?;

    let acknowledged = derive_write_concern(&mut op, write_concern)?;
    if !acknowledged {
        execute_detached(ctx, op, description, criteria, connection);
        return Ok(WriteOutcome::Unacknowledged);
    }

    execute_acknowledged(ctx, &op, &description, &criteria, connection)
        .await
        .map(WriteOutcome::Acknowledged)
}

/// Executes an `aggregate`, returning a cursor over its results.
///
/// A pipeline ending in `$out` or `$merge` writes data: it is always routed with a write-capable
/// selector, regardless of `read_selector`, and follows the same acknowledgement rules as
/// [`find_and_modify`]. Other pipelines are always acknowledged and `write_concern` is ignored.
pub async fn aggregate(
    ctx: &OperationContext,
    mut op: Aggregate,
    topology: &dyn Topology,
    read_selector: &SelectionCriteria,
    write_concern: Option<&WriteConcern>,
) -> Result<WriteOutcome<Cursor>> {
    op.validate()?;
    let criteria = op
        .selection_criteria()
        .unwrap_or_else(|| read_selector.clone());
    let (description, connection) =
        select_and_check_out::<Aggregate>(ctx, topology, &criteria).await?;

    if op.has_out_stage() {
        let acknowledged = derive_write_concern(&mut op, write_concern)?;
        if !acknowledged {
            execute_detached(ctx, op, description, criteria, connection);
            return Ok(WriteOutcome::Unacknowledged);
        }
    }

    execute_with_cursor(ctx, &op, description, criteria, connection)
        .await
        .map(WriteOutcome::Acknowledged)
}

/// Executes a `find`, returning a cursor over the matching documents. `read_concern` is the
/// configured default, used only if the operation does not carry a read concern of its own.
pub async fn find(
    ctx: &OperationContext,
    mut op: Find,
    topology: &dyn Topology,
    selector: &SelectionCriteria,
    read_concern: Option<&ReadConcern>,
) -> Result<Cursor> {
    op.validate()?;
    let criteria = op.selection_criteria().unwrap_or_else(|| selector.clone());
    let (description, connection) =
        select_and_check_out::<Find>(ctx, topology, &criteria).await?;

    if let Some(read_concern) = read_concern {
        let _span = phase_span(Find::NAME, Phase::DeriveOptions).entered();
        if !options::has_read_concern(op.options()) {
            op.options_mut()
                .push(CommandOption::from_read_concern(read_concern)?);
        }
    }

    execute_with_cursor(ctx, &op, description, criteria, connection).await
}

/// Executes a `createIndexes`, waiting for the server's reply.
pub async fn create_indexes(
    ctx: &OperationContext,
    op: CreateIndexes,
    topology: &dyn Topology,
    selector: &SelectionCriteria,
) -> Result<CreateIndexesResult> {
    execute_operation(ctx, op, topology, selector).await
}

/// Executes a `listDatabases`. The command is always routed to a primary.
pub async fn list_databases(
    ctx: &OperationContext,
    op: ListDatabases,
    topology: &dyn Topology,
) -> Result<ListDatabasesResult> {
    execute_operation(ctx, op, topology, &SelectionCriteria::writable()).await
}

/// Executes an arbitrary command, returning the server's reply document.
pub async fn run_command(
    ctx: &OperationContext,
    op: RunCommand,
    topology: &dyn Topology,
    selector: &SelectionCriteria,
) -> Result<Document> {
    execute_operation(ctx, op, topology, selector).await
}

/// Validates, selects, checks out and performs a synchronous round trip, with no option
/// derivation.
async fn execute_operation<Op: Operation>(
    ctx: &OperationContext,
    op: Op,
    topology: &dyn Topology,
    selector: &SelectionCriteria,
) -> Result<Op::O> {
    op.validate()?;
    let criteria = op.selection_criteria().unwrap_or_else(|| selector.clone());
    let (description, connection) =
        select_and_check_out::<Op>(ctx, topology, &criteria).await?;
    execute_acknowledged(ctx, &op, &description, &criteria, connection).await
}

async fn select_and_check_out<Op: Operation>(
    ctx: &OperationContext,
    topology: &dyn Topology,
    criteria: &SelectionCriteria,
) -> Result<(ServerDescription, ConnectionLease)> {
    tracing::debug!(
        target: SERVER_SELECTION_TRACING_EVENT_TARGET,
        selector = criteria.tracing_representation(),
        operation = Op::NAME,
        "Server selection started"
    );
    let server = match ctx
        .run(Phase::SelectServer, topology.select_server(criteria))
        .instrument(phase_span(Op::NAME, Phase::SelectServer))
        .await
    {
        Ok(server) => {
            tracing::debug!(
                target: SERVER_SELECTION_TRACING_EVENT_TARGET,
                selector = criteria.tracing_representation(),
                operation = Op::NAME,
                serverHost = server.description().address.as_str(),
                "Server selection succeeded"
            );
            server
        }
        Err(error) => {
            tracing::debug!(
                target: SERVER_SELECTION_TRACING_EVENT_TARGET,
                selector = criteria.tracing_representation(),
                operation = Op::NAME,
                failure = error.tracing_representation(),
                "Server selection failed"
            );
            return Err(error);
        }
    };

    let connection = ctx
        .run(Phase::CheckOut, server.checkout_connection())
        .instrument(phase_span(Op::NAME, Phase::CheckOut))
        .await?;
    Ok((server.description().clone(), connection))
}

/// Appends the option derived from the configured write concern and reports whether the write is
/// acknowledged under the resulting option sequence.
fn derive_write_concern<Op: Operation>(
    op: &mut Op,
    write_concern: Option<&WriteConcern>,
) -> Result<bool> {
    let _span = phase_span(Op::NAME, Phase::DeriveOptions).entered();
    if let Some(write_concern) = write_concern {
        if let Some(option) = CommandOption::from_write_concern(write_concern)? {
            op.options_mut().push(option);
        }
    }
    Ok(options::is_acknowledged(op.options()))
}

async fn execute_acknowledged<Op: Operation>(
    ctx: &OperationContext,
    op: &Op,
    description: &ServerDescription,
    criteria: &SelectionCriteria,
    mut connection: ConnectionLease,
) -> Result<Op::O> {
    let result = round_trip(ctx, op, description, criteria, &mut connection).await;
    connection.release();
    result?.into_result()
}

/// Runs the round trip of a cursor-producing operation and, if it succeeds, hands the connection
/// to the returned cursor.
async fn execute_with_cursor<Op>(
    ctx: &OperationContext,
    op: &Op,
    description: ServerDescription,
    criteria: SelectionCriteria,
    mut connection: ConnectionLease,
) -> Result<Cursor>
where
    Op: Operation<O = CursorSpecification>,
{
    let spec = match round_trip(ctx, op, &description, &criteria, &mut connection)
        .await
        .and_then(|reply| reply.into_result())
    {
        Ok(spec) => spec,
        Err(error) => {
            connection.release();
            return Err(error);
        }
    };
    Ok(Cursor::new(ctx.clone(), description, criteria, spec, connection))
}

/// Launches the round trip of `op` as a background task that owns `connection`. The task runs
/// under a context detached from the caller's cancellation token, contains every failure including
/// panics, and releases the connection when it finishes.
fn execute_detached<Op: Operation>(
    ctx: &OperationContext,
    op: Op,
    description: ServerDescription,
    criteria: SelectionCriteria,
    mut connection: ConnectionLease,
) {
    let ctx = ctx.detached();
    runtime::execute(
        async move {
            let outcome = AssertUnwindSafe(round_trip(
                &ctx,
                &op,
                &description,
                &criteria,
                &mut connection,
            ))
            .catch_unwind()
            .await;
            connection.release();

            match outcome {
                Ok(Ok(reply)) => match reply.error() {
                    None => tracing::debug!(
                        target: COMMAND_TRACING_EVENT_TARGET,
                        commandName = Op::NAME,
                        serverHost = reply.source_address(),
                        "Unacknowledged write completed"
                    ),
                    Some(error) => tracing::debug!(
                        target: COMMAND_TRACING_EVENT_TARGET,
                        commandName = Op::NAME,
                        serverHost = reply.source_address(),
                        failure = error.tracing_representation(),
                        "Unacknowledged write failed"
                    ),
                },
                Ok(Err(error)) => tracing::debug!(
                    target: COMMAND_TRACING_EVENT_TARGET,
                    commandName = Op::NAME,
                    failure = error.tracing_representation(),
                    "Unacknowledged write failed"
                ),
                Err(_) => tracing::warn!(
                    target: COMMAND_TRACING_EVENT_TARGET,
                    commandName = Op::NAME,
                    "Unacknowledged write panicked"
                ),
            }
        }
        .instrument(phase_span(Op::NAME, Phase::Detached)),
    );
}
