//! Contains [`Cursor`], a server-backed handle for retrieving the results of a query in batches.

#[cfg(test)]
mod test;

use std::collections::VecDeque;

use futures_core::Stream;
use tracing::Instrument;

use crate::{
    bson::Document,
    cmap::ConnectionLease,
    context::OperationContext,
    error::{ErrorKind, Result},
    operation::{round_trip, CursorSpecification, GetMore, KillCursors},
    runtime,
    sdam::ServerDescription,
    selection_criteria::SelectionCriteria,
    trace::{phase_span, Phase, COMMAND_TRACING_EVENT_TARGET},
    Namespace,
};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum CursorState {
    Open,
    Exhausted,
    Closed,
}

/// A lazy sequence of documents produced by a `find` or `aggregate`.
///
/// The cursor owns the connection its originating command ran on and issues `getMore` commands on
/// that connection whenever its buffer runs dry. The connection is released exactly once, as soon
/// as the server reports that no further batches exist, when [`Cursor::close`] is called, or when
/// the cursor is dropped.
///
/// ```rust,no_run
/// # use mongodb_dispatch::{bson::doc, error::Result, operation::Find, Client, Namespace};
/// # async fn run(client: Client) -> Result<()> {
/// let mut cursor = client
///     .find(Find::new(Namespace::new("test", "c"), doc! {}, Vec::new()))
///     .await?;
/// while let Some(document) = cursor.next().await? {
///     println!("{}", document);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Cursor {
    ctx: OperationContext,
    description: ServerDescription,
    criteria: SelectionCriteria,
    ns: Namespace,
    id: i64,
    batch_size: Option<u32>,
    buffer: VecDeque<Document>,
    connection: Option<ConnectionLease>,
    state: CursorState,
}

impl Cursor {
    pub(crate) fn new(
        ctx: OperationContext,
        description: ServerDescription,
        criteria: SelectionCriteria,
        spec: CursorSpecification,
        connection: ConnectionLease,
    ) -> Self {
        let mut cursor = Self {
            ctx,
            description,
            criteria,
            ns: spec.ns,
            id: spec.id,
            batch_size: spec.batch_size,
            buffer: spec.initial_buffer,
            connection: Some(connection),
            state: CursorState::Open,
        };
        if cursor.id == 0 {
            cursor.release_connection();
        }
        cursor
    }

    /// The server-side id of this cursor. Zero once the server has no further batches.
    pub fn id(&self) -> i64 {
        self.id
    }

    /// The namespace the cursor iterates over.
    pub fn namespace(&self) -> &Namespace {
        &self.ns
    }

    /// Whether every document has been returned.
    pub fn is_exhausted(&self) -> bool {
        self.state == CursorState::Exhausted
    }

    /// Whether [`Cursor::close`] has been called or the cursor failed.
    pub fn is_closed(&self) -> bool {
        self.state == CursorState::Closed
    }

    /// Advances the cursor, fetching a new batch from the server if the buffered one is used up.
    /// Returns `Ok(None)` once every document has been returned, and an error if the cursor has
    /// been closed.
    pub async fn next(&mut self) -> Result<Option<Document>> {
        loop {
            if self.state == CursorState::Closed {
                return Err(ErrorKind::CursorClosed.into());
            }
            if let Some(document) = self.buffer.pop_front() {
                return Ok(Some(document));
            }
            if self.id == 0 {
                self.state = CursorState::Exhausted;
                self.release_connection();
                return Ok(None);
            }
            self.get_more().await?;
        }
    }

    async fn get_more(&mut self) -> Result<()> {
        let op = GetMore::new(self.ns.clone(), self.id, self.batch_size);
        let result = match self.connection.as_mut() {
            Some(connection) => {
                round_trip(
                    &self.ctx,
                    &op,
                    &self.description,
                    &self.criteria,
                    connection,
                )
                .instrument(phase_span("cursor", Phase::GetMore))
                .await
            }
            None => Err(ErrorKind::CursorClosed.into()),
        }
        .and_then(|reply| reply.into_result());

        match result {
            Ok(batch) => {
                self.id = batch.id;
                self.buffer.extend(batch.batch);
                if self.id == 0 {
                    self.release_connection();
                }
                Ok(())
            }
            Err(error) => {
                tracing::debug!(
                    target: COMMAND_TRACING_EVENT_TARGET,
                    cursorId = self.id,
                    error = %error,
                    "getMore failed, closing cursor"
                );
                if error.is_cursor_not_found() {
                    self.id = 0;
                }
                self.state = CursorState::Closed;
                self.buffer.clear();
                self.release_connection();
                Err(error)
            }
        }
    }

    /// Closes the cursor, killing it on the server if it is still open there and releasing its
    /// connection. Closing an already-closed cursor does nothing. Any error from the server while
    /// killing the cursor is ignored.
    pub async fn close(&mut self) {
        if self.state == CursorState::Closed {
            return;
        }
        self.state = CursorState::Closed;
        self.buffer.clear();

        if self.id != 0 {
            if let Some(connection) = self.connection.as_mut() {
                let op = KillCursors::new(self.ns.clone(), self.id);
                let result = round_trip(
                    &self.ctx.detached(),
                    &op,
                    &self.description,
                    &self.criteria,
                    connection,
                )
                .instrument(phase_span("cursor", Phase::KillCursors))
                .await;
                if let Err(error) = result {
                    tracing::debug!(
                        target: COMMAND_TRACING_EVENT_TARGET,
                        cursorId = self.id,
                        error = %error,
                        "killCursors failed"
                    );
                }
            }
            self.id = 0;
        }
        self.release_connection();
    }

    /// Converts the cursor into a [`Stream`] of documents. The stream ends after the last document
    /// or after the first error.
    pub fn into_stream(self) -> impl Stream<Item = Result<Document>> + Send {
        futures_util::stream::unfold(Some(self), |cursor| async move {
            let mut cursor = cursor?;
            match cursor.next().await {
                Ok(Some(document)) => Some((Ok(document), Some(cursor))),
                Ok(None) => None,
                Err(error) => Some((Err(error), None)),
            }
        })
    }

    fn release_connection(&mut self) {
        if let Some(mut connection) = self.connection.take() {
            connection.release();
        }
    }
}

impl Drop for Cursor {
    fn drop(&mut self) {
        if self.id == 0 || self.state == CursorState::Closed {
            return;
        }
        let Some(mut connection) = self.connection.take() else {
            return;
        };

        let ctx = self.ctx.detached();
        let description = self.description.clone();
        let criteria = self.criteria.clone();
        let op = KillCursors::new(self.ns.clone(), self.id);
        runtime::try_execute(
            async move {
                let _ = round_trip(&ctx, &op, &description, &criteria, &mut connection).await;
                connection.release();
            }
            .instrument(phase_span("cursor", Phase::KillCursors)),
        );
    }
}
