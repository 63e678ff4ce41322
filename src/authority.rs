//! The Signer: issues certificates and blind signs reputation tokens.

use crate::blind_sigs::{BlindSignature, BlindSigner, BlindedToken};
use crate::certificate::{signed_payload, AccountId, Certificate};
use crate::error::{Error, Result};
use crate::keys::KeyPair;
use crate::params::DomainParameters;
use blsttc::PublicKey;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;
use tracing::{debug, info};

/// Where an actor sends its public key to get a certificate.
///
/// The authority implements it in-process; a network client would implement it
/// over whatever transport carries the request.
pub trait RegistrationEndpoint {
    /// Key the endpoint's certificates verify against.
    fn public_key(&self) -> PublicKey;

    fn register(&self, pk: &PublicKey) -> Result<Certificate>;

    fn verify_certificate(&self, cert: &Certificate) -> bool;
}

pub struct CertificateAuthority {
    params: DomainParameters,
    keys: KeyPair,
    blind_signer: BlindSigner,
    next_account_id: AtomicU64,
    registry: RwLock<BTreeMap<AccountId, PublicKey>>,
}

impl CertificateAuthority {
    pub fn new(params: &DomainParameters) -> Result<Self> {
        Ok(Self::with_keys(
            params,
            KeyPair::generate(params)?,
            BlindSigner::new(),
        ))
    }

    pub fn with_keys(params: &DomainParameters, keys: KeyPair, blind_signer: BlindSigner) -> Self {
        Self {
            params: params.clone(),
            keys,
            blind_signer,
            next_account_id: AtomicU64::new(1),
            registry: RwLock::new(BTreeMap::new()),
        }
    }

    pub fn params(&self) -> &DomainParameters {
        &self.params
    }

    /// Key that certificates verify against.
    pub fn public_key(&self) -> PublicKey {
        self.keys.public_key()
    }

    /// Key that unblinded reputation tokens verify against.
    pub fn blind_public_key(&self) -> PublicKey {
        self.blind_signer.public_key()
    }

    /// Issues a certificate under the next account ID. Registering the same key
    /// twice is allowed and yields two unrelated IDs.
    pub fn register(&self, pk: &PublicKey) -> Result<Certificate> {
        let account_id = self.next_account_id.fetch_add(1, Ordering::SeqCst);
        let signature = self.keys.sign(&signed_payload(pk, account_id))?;

        self.registry
            .write()
            .map_err(|_| Error::Registration("registry lock poisoned".to_string()))?
            .insert(account_id, *pk);

        info!(account_id, "issued certificate");

        Ok(Certificate::new(*pk, account_id, signature))
    }

    pub fn verify_certificate(&self, cert: &Certificate) -> bool {
        cert.verify(&self.params, &self.keys.public_key())
    }

    /// Like [`Self::verify_certificate`] for raw bytes; anything malformed is `false`.
    pub fn verify_certificate_bytes(&self, b: &[u8]) -> bool {
        match Certificate::from_bytes(b) {
            Ok(cert) => self.verify_certificate(&cert),
            Err(e) => {
                debug!(error = %e, "rejected malformed certificate");
                false
            }
        }
    }

    pub fn registered_key(&self, account_id: AccountId) -> Option<PublicKey> {
        self.registry
            .read()
            .ok()
            .and_then(|registry| registry.get(&account_id).copied())
    }

    pub fn registrations(&self) -> usize {
        self.registry.read().map(|r| r.len()).unwrap_or(0)
    }

    /// Signs a blinded token. The authority learns nothing about the token.
    pub fn sign_blinded(&self, blinded: &BlindedToken) -> Result<BlindSignature> {
        self.blind_signer.sign_blinded(blinded)
    }
}

impl RegistrationEndpoint for CertificateAuthority {
    fn public_key(&self) -> PublicKey {
        CertificateAuthority::public_key(self)
    }

    fn register(&self, pk: &PublicKey) -> Result<Certificate> {
        CertificateAuthority::register(self, pk)
    }

    fn verify_certificate(&self, cert: &Certificate) -> bool {
        CertificateAuthority::verify_certificate(self, cert)
    }
}
