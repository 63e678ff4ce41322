use crate::error::Result;
use crate::keys::{public_key_from_bytes, signature_from_bytes, verify};
use crate::params::DomainParameters;
use blsttc::{PublicKey, Signature, PK_SIZE, SIG_SIZE};
use serde::{Deserialize, Serialize};
use std::convert::TryInto;

pub type AccountId = u64;

/// Length of the bytes the authority signs: `pk || account_id`.
pub const SIGNED_PAYLOAD_LEN: usize = PK_SIZE + 8;
pub const CERTIFICATE_LEN: usize = SIGNED_PAYLOAD_LEN + SIG_SIZE;

/// The fixed encoding signed by the authority. Both sides must build it the
/// same way; any difference is a verification failure.
pub fn signed_payload(pk: &PublicKey, account_id: AccountId) -> [u8; SIGNED_PAYLOAD_LEN] {
    let mut bytes = [0u8; SIGNED_PAYLOAD_LEN];
    bytes[..PK_SIZE].copy_from_slice(&pk.to_bytes());
    bytes[PK_SIZE..].copy_from_slice(&account_id.to_be_bytes());
    bytes
}

/// Binds an actor's public key to the account ID the authority assigned it.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Certificate {
    public_key: PublicKey,
    account_id: AccountId,
    signature: Signature,
}

impl Certificate {
    pub(crate) fn new(public_key: PublicKey, account_id: AccountId, signature: Signature) -> Self {
        Self {
            public_key,
            account_id,
            signature,
        }
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn account_id(&self) -> AccountId {
        self.account_id
    }

    pub fn signature(&self) -> &Signature {
        &self.signature
    }

    pub fn signed_payload(&self) -> [u8; SIGNED_PAYLOAD_LEN] {
        signed_payload(&self.public_key, self.account_id)
    }

    /// True iff the authority holding `authority_pk` signed exactly these fields.
    pub fn verify(&self, params: &DomainParameters, authority_pk: &PublicKey) -> bool {
        verify(params, authority_pk, &self.signed_payload(), &self.signature)
    }

    pub fn to_bytes(&self) -> [u8; CERTIFICATE_LEN] {
        let mut bytes = [0u8; CERTIFICATE_LEN];
        bytes[..SIGNED_PAYLOAD_LEN].copy_from_slice(&self.signed_payload());
        bytes[SIGNED_PAYLOAD_LEN..].copy_from_slice(&self.signature.to_bytes());
        bytes
    }

    pub fn from_bytes(b: &[u8]) -> Result<Self> {
        let b: &[u8; CERTIFICATE_LEN] = b.try_into()?;
        let public_key = public_key_from_bytes(&b[..PK_SIZE])?;
        let account_id = AccountId::from_be_bytes(b[PK_SIZE..SIGNED_PAYLOAD_LEN].try_into()?);
        let signature = signature_from_bytes(&b[SIGNED_PAYLOAD_LEN..])?;
        Ok(Self::new(public_key, account_id, signature))
    }
}
