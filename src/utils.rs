use crate::error::{Error, Result};
use blst::{blst_hash_to_g2, blst_p2, blst_p2_compress};
use blsttc::ff::{Field, PrimeField}; // for Fr trait
use blsttc::group::{CurveAffine, CurveProjective, EncodedPoint};
use blsttc::pairing::bls12_381::{Fr, FrRepr, G2Affine, G2};
use blsttc::{PublicKey, Signature};
use std::borrow::Borrow;

/// Checks `sig` over arbitrary bytes that were mapped to G2 under `dst`.
///
/// The signing side computes `sig = hash_g2(data) * sk`, so verification is the
/// pairing check `e(pk, hash_g2(data)) == e(g1, sig)`.
pub(crate) fn verify_hashed(data: &[u8], dst: &[u8], sig: &Signature, pk: &PublicKey) -> bool {
    let data_g2 = match hash_g2_with_dst(data, dst) {
        Ok(g2) => g2,
        Err(_) => return false,
    };
    pk.verify_g2(sig, data_g2)
}

// blst equivalent of threshold_crypto hash_g2, with the tag chosen by the caller
pub(crate) fn hash_g2_with_dst(msg: &[u8], dst: &[u8]) -> Result<G2> {
    let mut msg_hash: blst_p2 = Default::default();
    let aug = b"";
    unsafe {
        blst_hash_to_g2(
            &mut msg_hash,
            msg.as_ptr(),
            msg.len(),
            dst.as_ptr(),
            dst.len(),
            aug.as_ptr(),
            aug.len(),
        )
    };
    let mut msg_g2_bytes = [0u8; 96];
    unsafe { blst_p2_compress(&mut msg_g2_bytes[0], &msg_hash) }
    be_bytes_to_g2(msg_g2_bytes)
}

// see blsttc util.rs
pub(crate) fn fr_from_be_bytes(bytes: [u8; 32]) -> Result<Fr> {
    let mut le_bytes = bytes;
    le_bytes.reverse();
    let mut fr_u64s = [0u64; 4];
    for (i, limb) in fr_u64s.iter_mut().enumerate() {
        let mut next_u64_bytes = [0u8; 8];
        next_u64_bytes.copy_from_slice(&le_bytes[i * 8..(i + 1) * 8]);
        *limb = u64::from_le_bytes(next_u64_bytes);
    }
    Fr::from_repr(FrRepr(fr_u64s))
        .map_err(|_| Error::Blinding("scalar is not canonical".to_string()))
}

// y = x * r
pub(crate) fn blind(g2: G2, r: Fr) -> G2 {
    g2.into_affine().mul(r)
}

// x = y * 1/r
pub(crate) fn unblind(g2: G2, r: Fr) -> Result<G2> {
    let r_inv = r
        .inverse()
        .ok_or_else(|| Error::Blinding("blinding factor has no inverse".to_string()))?;
    Ok(g2.into_affine().mul(r_inv))
}

// see blsttc Signature from_bytes
pub(crate) fn be_bytes_to_g2(bytes: [u8; 96]) -> Result<G2> {
    let mut compressed: <G2Affine as CurveAffine>::Compressed = EncodedPoint::empty();
    compressed.as_mut().copy_from_slice(bytes.borrow());
    let affine = compressed
        .into_affine()
        .map_err(|_| Error::Blinding("bytes are not a G2 point".to_string()))?;
    Ok(affine.into_projective())
}

// see blsttc Signature to_bytes
pub(crate) fn g2_to_be_bytes(g2: G2) -> [u8; 96] {
    let mut bytes = [0u8; 96];
    bytes.copy_from_slice(g2.into_affine().into_compressed().as_ref());
    bytes
}

// Kept apart from blsttc SecretKey::sign_g2: the scalar here is the blind
// signer's key applied to a point it cannot interpret.
pub(crate) fn sign_g2(g2: G2, fr: Fr) -> G2 {
    g2.into_affine().mul(fr)
}
