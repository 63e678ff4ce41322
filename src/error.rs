use crate::actor::{ActorState, Step};
use blsttc::error::FromBytesError;
use std::array::TryFromSliceError;
use thiserror::Error;

/// Specialisation of `std::Result`.
pub type Result<T, E = WonError> = std::result::Result<T, E>;
pub type Error = WonError;

#[derive(Error, Debug)]
/// error variants.
pub enum WonError {
    #[error("no supported parameter set for security level {0}")]
    ParameterGeneration(u32),

    #[error("domain parameters do not match the supported suite: {0}")]
    ParameterMismatch(String),

    #[error("registration failed: {0}")]
    Registration(String),

    #[error("counterparty signature does not verify over the issued challenge")]
    SignatureMismatch,

    #[error("step {step:?} is not allowed in state {state:?}")]
    ProtocolState { state: ActorState, step: Step },

    #[error("blinding failed: {0}")]
    Blinding(String),

    #[error("challenge has already been used in a previous round")]
    Replay,

    #[error("deserialization from bytes failed")]
    BlsttcFromBytes(#[from] FromBytesError),

    #[error("deserialization from bytes failed")]
    InvalidBytes(#[from] TryFromSliceError),

    #[error("wire encoding failed")]
    Encoding(#[from] bincode::Error),
}
