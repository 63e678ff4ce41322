//! System-wide parameters handed out by the Trusted Party.
//!
//! Every participant of one protocol run must hold an identical copy. The
//! parameters are plain data so they can be published as configuration and
//! checked with [`DomainParameters::validate`] by whoever consumes them.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Hash-to-curve tag for certificate and challenge signatures.
pub const SIGNATURE_DST: &[u8] = b"BLS_SIG_BLS12381G2_XMD:SHA-256_SSWU_RO_NUL_";

/// Hash-to-curve tag for blind-signed reputation tokens. It differs from
/// [`SIGNATURE_DST`] so a signature from one protocol never verifies in the other.
pub const BLIND_DST: &[u8] = b"WON_BLIND_BLS12381G2_XMD:SHA-256_SSWU_RO_NUL_";

pub const SUPPORTED_SECURITY_LEVEL: u32 = 128;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Curve {
    Bls12_381,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum HashAlgorithm {
    Sha256,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainParameters {
    security_level: u32,
    curve: Curve,
    hash: HashAlgorithm,
    signature_dst: Vec<u8>,
    blind_dst: Vec<u8>,
}

impl DomainParameters {
    pub fn security_level(&self) -> u32 {
        self.security_level
    }

    pub fn curve(&self) -> Curve {
        self.curve
    }

    pub fn hash(&self) -> HashAlgorithm {
        self.hash
    }

    pub fn signature_dst(&self) -> &[u8] {
        &self.signature_dst
    }

    pub fn blind_dst(&self) -> &[u8] {
        &self.blind_dst
    }

    /// Checks that a received parameter set is the one this crate implements.
    pub fn validate(&self) -> Result<()> {
        if self.security_level != SUPPORTED_SECURITY_LEVEL {
            return Err(Error::ParameterMismatch(format!(
                "security level {}",
                self.security_level
            )));
        }
        if self.signature_dst != SIGNATURE_DST {
            return Err(Error::ParameterMismatch("signature dst".into()));
        }
        if self.blind_dst != BLIND_DST {
            return Err(Error::ParameterMismatch("blind dst".into()));
        }
        Ok(())
    }
}

/// The party that generates the parameters once for the whole system.
#[derive(Clone, Copy, Debug, Default)]
pub struct TrustedParty;

impl TrustedParty {
    pub fn new() -> Self {
        Self
    }

    /// Same security level, same parameters.
    pub fn generate_params(&self, security_level: u32) -> Result<DomainParameters> {
        if security_level != SUPPORTED_SECURITY_LEVEL {
            return Err(Error::ParameterGeneration(security_level));
        }

        debug!(security_level, "generated domain parameters");

        Ok(DomainParameters {
            security_level,
            curve: Curve::Bls12_381,
            hash: HashAlgorithm::Sha256,
            signature_dst: SIGNATURE_DST.to_vec(),
            blind_dst: BLIND_DST.to_vec(),
        })
    }
}
