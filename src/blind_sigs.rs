use crate::error::{Error, Result};
use crate::params::DomainParameters;
use crate::utils::*;
use blsttc::group::CurveProjective;
use blsttc::pairing::bls12_381::{Fr, G2};
use blsttc::{PublicKey, SecretKey, Signature};
use serde::{Deserialize, Serialize};
use std::convert::TryFrom;
use std::convert::TryInto;
use std::fmt;
use tracing::debug;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Secret scalar the requester multiplies into its message.
///
/// Not `Clone`: [`BlindSignatureScheme::unblind`] takes it by value, so one
/// factor can unblind exactly one signature. The bytes are wiped on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct BlindingFactor {
    bytes: [u8; 32],
}

impl BlindingFactor {
    fn random() -> Self {
        // SecretKey::random is uniform over the non-zero scalars
        Self {
            bytes: SecretKey::random().to_bytes(),
        }
    }

    pub fn from_bytes(bytes: [u8; 32]) -> Result<Self> {
        let factor = Self { bytes };
        if factor.bytes.iter().all(|b| *b == 0) {
            return Err(Error::Blinding("blinding factor is zero".to_string()));
        }
        factor.scalar()?;
        Ok(factor)
    }

    fn scalar(&self) -> Result<Fr> {
        fr_from_be_bytes(self.bytes)
    }
}

impl fmt::Debug for BlindingFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("BlindingFactor(..)")
    }
}

/// A reputation token hidden behind a blinding factor. This is all the
/// authority ever sees of the token.
#[derive(Clone, Debug)]
pub struct BlindedToken {
    blinded_msg: G2,
}

impl PartialEq for BlindedToken {
    fn eq(&self, other: &Self) -> bool {
        self.to_bytes() == other.to_bytes()
    }
}

impl Eq for BlindedToken {}

impl BlindedToken {
    pub fn blinded_msg(&self) -> G2 {
        self.blinded_msg
    }

    pub fn to_bytes(&self) -> [u8; 96] {
        g2_to_be_bytes(self.blinded_msg)
    }
}

impl From<G2> for BlindedToken {
    fn from(blinded_msg: G2) -> Self {
        Self { blinded_msg }
    }
}

impl TryFrom<&[u8]> for BlindedToken {
    type Error = Error;

    fn try_from(b: &[u8]) -> Result<Self> {
        let bytes: [u8; 96] = b.try_into()?;
        Ok(Self::from(be_bytes_to_g2(bytes)?))
    }
}

impl Serialize for BlindedToken {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        s.serialize_bytes(&self.to_bytes())
    }
}

impl<'de> Deserialize<'de> for BlindedToken {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let bytes: Vec<u8> = serde::Deserialize::deserialize(d)?;
        Self::try_from(bytes.as_slice()).map_err(serde::de::Error::custom)
    }
}

/// The authority's signature over a [`BlindedToken`]. Unblinding it yields a
/// signature over the token itself, which the authority never saw.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlindSignature {
    signature: Signature,
}

impl BlindSignature {
    pub fn signature_for_blinded(&self) -> &Signature {
        &self.signature
    }
}

/// Requester side of the blind-signature protocol.
#[derive(Clone, Debug)]
pub struct BlindSignatureScheme {
    dst: Vec<u8>,
}

impl BlindSignatureScheme {
    pub fn new(params: &DomainParameters) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            dst: params.blind_dst().to_vec(),
        })
    }

    /// Hides `msg` behind a fresh random factor.
    pub fn blind(&self, msg: &[u8]) -> Result<(BlindedToken, BlindingFactor)> {
        let factor = BlindingFactor::random();
        let blinded = self.blind_with(msg, &factor)?;
        Ok((blinded, factor))
    }

    pub(crate) fn blind_with(&self, msg: &[u8], factor: &BlindingFactor) -> Result<BlindedToken> {
        let msg_g2 = hash_g2_with_dst(msg, &self.dst)?;
        Ok(BlindedToken::from(blind(msg_g2, factor.scalar()?)))
    }

    /// Checks the authority's answer before the factor is spent on it.
    pub fn verify_blinded(
        &self,
        blinded: &BlindedToken,
        sig: &BlindSignature,
        pk: &PublicKey,
    ) -> bool {
        // The authority signs a G2 directly, so there is no hashing step here.
        pk.verify_g2(&sig.signature, blinded.blinded_msg())
    }

    /// Strips the factor from the authority's signature. Consumes the factor.
    pub fn unblind(&self, sig: &BlindSignature, factor: BlindingFactor) -> Result<Signature> {
        let blinded_sig_g2 = be_bytes_to_g2(sig.signature.to_bytes())?;
        let unblinded_sig_g2 = unblind(blinded_sig_g2, factor.scalar()?)?;
        drop(factor);

        let unblinded_sig = Signature::from_bytes(g2_to_be_bytes(unblinded_sig_g2))?;
        Ok(unblinded_sig)
    }

    /// Plain signature check of `msg` against the authority's blind-signing key.
    pub fn verify(&self, msg: &[u8], sig: &Signature, pk: &PublicKey) -> bool {
        verify_hashed(msg, &self.dst, sig, pk)
    }
}

/// Authority side: signs blinded tokens without seeing what is inside.
///
/// Holds its own key, unrelated to the certificate-signing key.
pub struct BlindSigner {
    sk: SecretKey,
}

impl BlindSigner {
    pub fn new() -> Self {
        Self {
            sk: SecretKey::random(),
        }
    }

    pub fn public_key(&self) -> PublicKey {
        self.sk.public_key()
    }

    fn sk_bendian(&self) -> Result<Fr> {
        fr_from_be_bytes(self.sk.to_bytes())
    }

    pub fn sign_blinded(&self, blinded: &BlindedToken) -> Result<BlindSignature> {
        if blinded.blinded_msg().is_zero() {
            return Err(Error::Blinding("blinded token is the identity".to_string()));
        }

        // Note we are signing a G2, not message bytes, so we can't
        // use blsttc:SecretKey.sign(msg);
        let bs_sig_g2 = sign_g2(blinded.blinded_msg(), self.sk_bendian()?);
        let signature = Signature::from_bytes(g2_to_be_bytes(bs_sig_g2))?;

        debug!("blind signed a token");

        Ok(BlindSignature { signature })
    }
}

impl Default for BlindSigner {
    fn default() -> Self {
        Self::new()
    }
}

impl TryFrom<[u8; 32]> for BlindSigner {
    type Error = Error;

    fn try_from(b: [u8; 32]) -> Result<Self> {
        let sk = SecretKey::from_bytes(b)?;
        Ok(Self { sk })
    }
}

impl fmt::Debug for BlindSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlindSigner")
            .field("pk", &self.public_key())
            .finish_non_exhaustive()
    }
}
