use crate::{
    bson::{Bson, Document},
    error::Error,
    selection_criteria::SelectionCriteria,
};

pub(crate) const COMMAND_TRACING_EVENT_TARGET: &str = "mongodb_dispatch::command";
pub(crate) const CONNECTION_TRACING_EVENT_TARGET: &str = "mongodb_dispatch::connection";
pub(crate) const SERVER_SELECTION_TRACING_EVENT_TARGET: &str =
    "mongodb_dispatch::server_selection";

/// The instrumented phases of a dispatch. Each phase carries its own span name so that
/// instrumentation never has to derive one at runtime.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Phase {
    SelectServer,
    CheckOut,
    DeriveOptions,
    Encode,
    Write,
    Read,
    Decode,
    Detached,
    GetMore,
    KillCursors,
}

impl Phase {
    pub(crate) const fn span_name(self) -> &'static str {
        match self {
            Phase::SelectServer => "select_server",
            Phase::CheckOut => "check_out",
            Phase::DeriveOptions => "derive_options",
            Phase::Encode => "encode",
            Phase::Write => "write",
            Phase::Read => "read",
            Phase::Decode => "decode",
            Phase::Detached => "detached",
            Phase::GetMore => "get_more",
            Phase::KillCursors => "kill_cursors",
        }
    }
}

/// Creates the span wrapping `phase` of `operation`.
pub(crate) fn phase_span(operation: &'static str, phase: Phase) -> tracing::Span {
    tracing::debug_span!(
        target: COMMAND_TRACING_EVENT_TARGET,
        "dispatch_phase",
        operation,
        phase = phase.span_name(),
    )
}

pub(crate) trait TracingRepresentation {
    type Representation;

    fn tracing_representation(&self) -> Self::Representation;
}

impl TracingRepresentation for Document {
    type Representation = String;

    fn tracing_representation(&self) -> String {
        Bson::Document(self.clone())
            .into_relaxed_extjson()
            .to_string()
    }
}

impl TracingRepresentation for Error {
    type Representation = String;

    fn tracing_representation(&self) -> String {
        self.to_string()
    }
}

impl TracingRepresentation for SelectionCriteria {
    type Representation = String;

    fn tracing_representation(&self) -> Self::Representation {
        self.to_string()
    }
}
