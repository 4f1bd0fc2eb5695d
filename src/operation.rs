//! The server commands this crate can dispatch, and the four-phase round trip shared by all of
//! them: encode, write, read, decode.

mod aggregate;
mod create_indexes;
mod find;
mod find_and_modify;
mod get_more;
mod kill_cursors;
mod list_databases;
mod run_command;


use std::collections::VecDeque;

use serde::Deserialize;
use tracing::Instrument;

pub use self::{
    aggregate::Aggregate,
    create_indexes::CreateIndexes,
    find::Find,
    find_and_modify::{FindAndModify, Modification, UpdateModifications},
    list_databases::ListDatabases,
    run_command::RunCommand,
};
pub(crate) use self::{get_more::GetMore, kill_cursors::KillCursors};
use crate::{
    bson::Document,
    cmap::{Command, ConnectionLease, RawCommandResponse},
    context::OperationContext,
    error::{Error, ErrorKind, Result, WriteConcernError},
    options::CommandOption,
    sdam::ServerDescription,
    selection_criteria::SelectionCriteria,
    trace::{phase_span, Phase, TracingRepresentation, COMMAND_TRACING_EVENT_TARGET},
    Namespace,
};

/// A trait modeling the behavior of a server side operation.
pub(crate) trait Operation: Send + Sync + 'static {
    /// The output type of this operation.
    type O: Send + 'static;

    /// The name of the server side command associated with this operation.
    const NAME: &'static str;

    /// Checks the operation for problems that can be detected without contacting a server.
    fn validate(&self) -> Result<()>;

    /// Returns the command that should be sent to the server as part of this operation.
    fn build(&self, description: &ServerDescription) -> Result<Command>;

    /// Interprets the server response to the command. The response has already been checked for
    /// `ok: 1`.
    fn handle_response(
        &self,
        response: &RawCommandResponse,
        description: &ServerDescription,
    ) -> Result<Self::O>;

    /// The ordered option sequence applied to the request document.
    fn options(&self) -> &[CommandOption];

    /// Mutable access to the option sequence, used to append derived options.
    fn options_mut(&mut self) -> &mut Vec<CommandOption>;

    /// Whether this operation writes data, and so is subject to write concern acknowledgement.
    fn is_write(&self) -> bool {
        false
    }

    /// Criteria that override the caller's selector, if this operation must be routed to a
    /// particular kind of server.
    fn selection_criteria(&self) -> Option<SelectionCriteria> {
        None
    }
}

/// The outcome of decoding a reply: either the typed result or the error that prevented it.
///
/// A `Reply` is produced once per round trip and never mutated afterwards, so reading it any number
/// of times yields the same outcome.
#[derive(Debug)]
pub(crate) struct Reply<T> {
    source: String,
    result: Result<T>,
}

impl<T> Reply<T> {
    fn new(source: impl Into<String>, result: Result<T>) -> Self {
        Self {
            source: source.into(),
            result,
        }
    }

    /// The typed result, or the decode error.
    pub(crate) fn result(&self) -> std::result::Result<&T, &Error> {
        self.result.as_ref()
    }

    /// The decode error, if decoding failed.
    pub(crate) fn error(&self) -> Option<&Error> {
        self.result.as_ref().err()
    }

    /// The address of the server that sent the reply.
    pub(crate) fn source_address(&self) -> &str {
        &self.source
    }

    pub(crate) fn into_result(self) -> Result<T> {
        self.result
    }
}

/// Decodes `response` for `op`: first the generic `ok`/error envelope, then the operation-specific
/// body. Decoding does not consume the response and may be repeated.
pub(crate) fn decode<Op: Operation>(
    op: &Op,
    response: &RawCommandResponse,
    description: &ServerDescription,
) -> Reply<Op::O> {
    let result = response
        .validate()
        .and_then(|_| op.handle_response(response, description));
    Reply::new(response.source_address(), result)
}

/// Performs the encode, write, read and decode phases of `op` on `connection`.
///
/// Failures while encoding or exchanging messages are returned as the outer error and short-circuit
/// the remaining phases. Failures while interpreting the reply are carried in the returned
/// [`Reply`].
pub(crate) async fn round_trip<Op: Operation>(
    ctx: &OperationContext,
    op: &Op,
    description: &ServerDescription,
    criteria: &SelectionCriteria,
    connection: &mut ConnectionLease,
) -> Result<Reply<Op::O>> {
    let (command_name, message) = phase_span(Op::NAME, Phase::Encode).in_scope(|| {
        let mut command = op.build(description)?;
        if !command.is_write && command.read_pref.is_none() {
            command.read_pref = criteria.as_read_pref().copied();
        }
        tracing::debug!(
            target: COMMAND_TRACING_EVENT_TARGET,
            commandName = command.name.as_str(),
            databaseName = command.target_db.as_str(),
            command = command.body.tracing_representation(),
            serverHost = connection.address(),
            "Command started"
        );
        let name = command.name.clone();
        command.into_message(description).map(|message| (name, message))
    })?;
    let request_id = message.request_id();

    let exchange = async {
        ctx.run(Phase::Write, connection.send_message(message))
            .instrument(phase_span(Op::NAME, Phase::Write))
            .await?;
        ctx.run(Phase::Read, connection.receive_message())
            .instrument(phase_span(Op::NAME, Phase::Read))
            .await
    };
    let reply = match exchange.await {
        Ok(reply) => reply,
        Err(error) => {
            tracing::debug!(
                target: COMMAND_TRACING_EVENT_TARGET,
                commandName = command_name.as_str(),
                failure = error.tracing_representation(),
                "Command failed"
            );
            return Err(error);
        }
    };

    let _span = phase_span(Op::NAME, Phase::Decode).entered();
    let address = connection.address().to_string();
    if let Some(request_id) = request_id {
        if reply.response_to() != request_id {
            return Ok(Reply::new(
                address,
                Err(Error::invalid_response(format!(
                    "expected a reply to request {}, got a reply to {}",
                    request_id,
                    reply.response_to()
                ))),
            ));
        }
    }

    let response = RawCommandResponse::new(address, reply);
    let reply = decode(op, &response, description);
    match reply.error() {
        None => tracing::debug!(
            target: COMMAND_TRACING_EVENT_TARGET,
            commandName = command_name.as_str(),
            "Command succeeded"
        ),
        Some(error) => tracing::debug!(
            target: COMMAND_TRACING_EVENT_TARGET,
            commandName = command_name.as_str(),
            failure = error.tracing_representation(),
            "Command failed"
        ),
    }
    Ok(reply)
}

/// Body of a write response that could possibly have a write concern error.
#[derive(Debug, Deserialize, Default, Clone)]
pub(crate) struct WriteConcernOnlyBody {
    #[serde(rename = "writeConcernError")]
    write_concern_error: Option<WriteConcernError>,
}

impl WriteConcernOnlyBody {
    pub(crate) fn validate(&self) -> Result<()> {
        match self.write_concern_error {
            Some(ref wc_error) => Err(ErrorKind::WriteConcern(wc_error.clone()).into()),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Deserialize)]
pub(crate) struct CursorBody {
    cursor: CursorInfo,
}

#[derive(Debug, Deserialize, Clone)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CursorInfo {
    pub(crate) id: i64,

    pub(crate) ns: Namespace,

    pub(crate) first_batch: VecDeque<Document>,
}

/// What a cursor-producing command returns: enough to construct a [`Cursor`](crate::Cursor)
/// around the connection the command ran on.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct CursorSpecification {
    pub(crate) ns: Namespace,
    pub(crate) id: i64,
    pub(crate) initial_buffer: VecDeque<Document>,
    pub(crate) batch_size: Option<u32>,
}

impl CursorSpecification {
    pub(crate) fn new(response: &RawCommandResponse, batch_size: Option<u32>) -> Result<Self> {
        let body: CursorBody = response.body()?;
        Ok(Self {
            ns: body.cursor.ns,
            id: body.cursor.id,
            initial_buffer: body.cursor.first_batch,
            batch_size,
        })
    }
}

/// The last `batchSize` in `options`, which is the one the server sees.
pub(crate) fn batch_size(options: &[CommandOption]) -> Option<u32> {
    options.iter().rev().find_map(|option| match option {
        CommandOption::BatchSize(batch_size) => Some(*batch_size),
        _ => None,
    })
}
