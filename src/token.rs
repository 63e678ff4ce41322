use crate::certificate::{Certificate, CERTIFICATE_LEN};
use crate::error::Result;
use crate::keys::{signature_from_bytes, verify, KeyPair};
use crate::params::DomainParameters;
use blsttc::{PublicKey, Signature, SIG_SIZE};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::convert::TryInto;
use std::fmt;

pub const CHALLENGE_LEN: usize = 32;
pub const SIGNED_CHALLENGE_LEN: usize = CHALLENGE_LEN + SIG_SIZE;
pub const REPUTATION_TOKEN_LEN: usize = CERTIFICATE_LEN + SIGNED_CHALLENGE_LEN;

/// Fresh random value binding one interaction. 256 bits, never reused.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Challenge([u8; CHALLENGE_LEN]);

impl Challenge {
    pub fn random() -> Self {
        let mut bytes = [0u8; CHALLENGE_LEN];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; CHALLENGE_LEN] {
        &self.0
    }
}

impl From<[u8; CHALLENGE_LEN]> for Challenge {
    fn from(b: [u8; CHALLENGE_LEN]) -> Self {
        Self(b)
    }
}

impl fmt::Debug for Challenge {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Challenge({:02x}{:02x}{:02x}{:02x}..)",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

/// A counterparty's signature over a challenge it was sent.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedChallenge {
    challenge: Challenge,
    signature: Signature,
}

impl SignedChallenge {
    pub fn sign(challenge: Challenge, key: &KeyPair) -> Result<Self> {
        let signature = key.sign(challenge.as_bytes())?;
        Ok(Self {
            challenge,
            signature,
        })
    }

    pub fn challenge(&self) -> &Challenge {
        &self.challenge
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    /// True iff `signer_pk` signed this challenge.
    pub fn verify(&self, params: &DomainParameters, signer_pk: &PublicKey) -> bool {
        verify(params, signer_pk, self.challenge.as_bytes(), &self.signature)
    }

    pub fn to_bytes(&self) -> [u8; SIGNED_CHALLENGE_LEN] {
        let mut bytes = [0u8; SIGNED_CHALLENGE_LEN];
        bytes[..CHALLENGE_LEN].copy_from_slice(self.challenge.as_bytes());
        bytes[CHALLENGE_LEN..].copy_from_slice(&self.signature.to_bytes());
        bytes
    }

    pub fn from_bytes(b: &[u8]) -> Result<Self> {
        let b: &[u8; SIGNED_CHALLENGE_LEN] = b.try_into()?;
        let challenge: [u8; CHALLENGE_LEN] = b[..CHALLENGE_LEN].try_into()?;
        Ok(Self {
            challenge: Challenge::from(challenge),
            signature: signature_from_bytes(&b[CHALLENGE_LEN..])?,
        })
    }
}

/// An actor's own certificate paired with the counterparty's signature over
/// the challenge the actor issued. It is what gets blind signed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReputationToken {
    certificate: Certificate,
    signed_challenge: SignedChallenge,
}

impl ReputationToken {
    pub fn new(certificate: Certificate, signed_challenge: SignedChallenge) -> Self {
        Self {
            certificate,
            signed_challenge,
        }
    }

    pub fn certificate(&self) -> &Certificate {
        &self.certificate
    }

    pub fn signed_challenge(&self) -> &SignedChallenge {
        &self.signed_challenge
    }

    /// Checks that the holder of `voucher_pk` countersigned this token's challenge.
    pub fn is_vouched_by(&self, params: &DomainParameters, voucher_pk: &PublicKey) -> bool {
        self.signed_challenge.verify(params, voucher_pk)
    }

    /// The bytes the blind signature covers.
    pub fn to_bytes(&self) -> [u8; REPUTATION_TOKEN_LEN] {
        let mut bytes = [0u8; REPUTATION_TOKEN_LEN];
        bytes[..CERTIFICATE_LEN].copy_from_slice(&self.certificate.to_bytes());
        bytes[CERTIFICATE_LEN..].copy_from_slice(&self.signed_challenge.to_bytes());
        bytes
    }

    pub fn from_bytes(b: &[u8]) -> Result<Self> {
        let b: &[u8; REPUTATION_TOKEN_LEN] = b.try_into()?;
        Ok(Self {
            certificate: Certificate::from_bytes(&b[..CERTIFICATE_LEN])?,
            signed_challenge: SignedChallenge::from_bytes(&b[CERTIFICATE_LEN..])?,
        })
    }
}

/// A reputation token with the authority's unblinded signature.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedReputationToken {
    token: ReputationToken,
    signature: Signature,
}

impl SignedReputationToken {
    pub fn new(token: ReputationToken, signature: Signature) -> Self {
        Self { token, signature }
    }

    pub fn token(&self) -> &ReputationToken {
        &self.token
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }
}
