//! Contains the connection abstraction consumed by the dispatcher and the lease type that
//! guarantees each leased connection is released exactly once.

pub(crate) mod conn;

pub use self::conn::{
    wire::{Message, MessageFlags},
    Connection,
    StreamConnection,
};
pub(crate) use self::conn::{Command, ConnectionLease, RawCommandResponse};
