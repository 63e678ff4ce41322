//! Payloads carried between actors and the authority. Delivery is up to the
//! caller; these types only fix what goes on the wire.

use crate::blind_sigs::{BlindSignature, BlindedToken};
use crate::certificate::Certificate;
use crate::error::Result;
use crate::token::{Challenge, SignedChallenge, SignedReputationToken};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

pub trait WireMessage: Serialize + DeserializeOwned {
    fn to_wire(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    fn from_wire(b: &[u8]) -> Result<Self> {
        Ok(bincode::deserialize(b)?)
    }
}

/// `{challenge}`
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChallengeMessage {
    pub challenge: Challenge,
}

/// `{signedChallenge, certificate}`: the answer to a [`ChallengeMessage`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedChallengeMessage {
    pub signed_challenge: SignedChallenge,
    pub certificate: Certificate,
}

/// `{blindToken}`: actor to authority.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindTokenMessage {
    pub blinded: BlindedToken,
}

/// Authority to actor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindSignatureMessage {
    pub signature: BlindSignature,
}

/// Actor to actor, after unblinding.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedTokenMessage {
    pub token: SignedReputationToken,
}

impl WireMessage for ChallengeMessage {}
impl WireMessage for SignedChallengeMessage {}
impl WireMessage for BlindTokenMessage {}
impl WireMessage for BlindSignatureMessage {}
impl WireMessage for SignedTokenMessage {}
