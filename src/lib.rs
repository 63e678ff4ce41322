mod actor;
mod authority;
mod blind_sigs;
mod certificate;
mod error;
mod keys;
mod messages;
mod params;
mod token;
mod utils;

pub use crate::actor::{Actor, ActorState, Role, Step};
pub use crate::authority::{CertificateAuthority, RegistrationEndpoint};
pub use crate::blind_sigs::{
    BlindSignature, BlindSignatureScheme, BlindSigner, BlindedToken, BlindingFactor,
};
pub use crate::certificate::{signed_payload, AccountId, Certificate};
pub use crate::error::{Error, Result, WonError};
pub use crate::keys::{verify, KeyPair};
pub use crate::messages::{
    BlindSignatureMessage, BlindTokenMessage, ChallengeMessage, SignedChallengeMessage,
    SignedTokenMessage, WireMessage,
};
pub use crate::params::{Curve, DomainParameters, HashAlgorithm, TrustedParty};
pub use crate::token::{Challenge, ReputationToken, SignedChallenge, SignedReputationToken};
