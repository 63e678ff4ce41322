use crate::error::Result;
use crate::params::DomainParameters;
use crate::utils::{hash_g2_with_dst, verify_hashed};
use blsttc::{PublicKey, SecretKey, Signature};
use std::convert::TryFrom;
use std::fmt;

/// Key pair for certificates and challenges.
///
/// The secret half never leaves this struct: there is no accessor, no
/// `Serialize` impl and `Debug` only prints the public key. Blind signing
/// uses [`crate::BlindSigner`], which is a different type on purpose.
pub struct KeyPair {
    sk: SecretKey,
    pk: PublicKey,
    dst: Vec<u8>,
}

impl KeyPair {
    pub fn generate(params: &DomainParameters) -> Result<Self> {
        params.validate()?;
        Ok(Self::from_secret_key(SecretKey::random(), params))
    }

    /// Deterministic key pair, mostly useful for fixtures.
    pub fn from_bytes(b: [u8; 32], params: &DomainParameters) -> Result<Self> {
        params.validate()?;
        let sk = SecretKey::from_bytes(b)?;
        Ok(Self::from_secret_key(sk, params))
    }

    fn from_secret_key(sk: SecretKey, params: &DomainParameters) -> Self {
        Self {
            pk: sk.public_key(),
            sk,
            dst: params.signature_dst().to_vec(),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.pk
    }

    pub fn sign(&self, msg: &[u8]) -> Result<Signature> {
        let hash = hash_g2_with_dst(msg, &self.dst)?;
        Ok(self.sk.sign_g2(hash))
    }

    pub fn verify(&self, msg: &[u8], sig: &Signature) -> bool {
        verify_hashed(msg, &self.dst, sig, &self.pk)
    }
}

impl fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KeyPair")
            .field("pk", &self.pk)
            .finish_non_exhaustive()
    }
}

/// Verifies `sig` over `msg` for `pk`. A wrong signature is `false`, never an error.
pub fn verify(params: &DomainParameters, pk: &PublicKey, msg: &[u8], sig: &Signature) -> bool {
    verify_hashed(msg, params.signature_dst(), sig, pk)
}

pub fn public_key_from_bytes(b: &[u8]) -> Result<PublicKey> {
    let bytes = <[u8; blsttc::PK_SIZE]>::try_from(b)?;
    Ok(PublicKey::from_bytes(bytes)?)
}

pub fn signature_from_bytes(b: &[u8]) -> Result<Signature> {
    let bytes = <[u8; blsttc::SIG_SIZE]>::try_from(b)?;
    Ok(Signature::from_bytes(bytes)?)
}
