//! Requestor and Supplier.
//!
//! Both roles run the same state machine:
//!
//! ```text
//! Unregistered -> Registered -> ChallengeSent -> ChallengeReceived -> Signed
//!              -> TokenBuilt -> TokenBlinded -> Exchanged
//! ```
//!
//! A registered actor may also receive the counterparty's challenge before
//! issuing its own. Any step taken out of order, and any failed check, moves the
//! actor to `Aborted` and discards the round. The certificate survives an abort;
//! [`Actor::finish_round`] or [`Actor::abandon_round`] starts over from
//! `Registered`.

use crate::authority::RegistrationEndpoint;
use crate::blind_sigs::{BlindSignature, BlindSignatureScheme, BlindedToken, BlindingFactor};
use crate::certificate::Certificate;
use crate::error::{Error, Result};
use crate::keys::KeyPair;
use crate::params::DomainParameters;
use crate::token::{Challenge, ReputationToken, SignedChallenge, SignedReputationToken};
use blsttc::PublicKey;
use std::collections::HashSet;
use tracing::{debug, info, warn};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    Requestor,
    Supplier,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActorState {
    Unregistered,
    Registered,
    ChallengeSent,
    ChallengeReceived,
    Signed,
    TokenBuilt,
    TokenBlinded,
    Exchanged,
    Aborted,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Step {
    Register,
    SendChallenge,
    ReceiveChallenge,
    SignChallenge,
    VerifyCounterparty,
    BuildToken,
    BlindToken,
    AcceptBlindSignature,
    ExchangeToken,
    FinishRound,
}

impl ActorState {
    /// Transition table. `None` means the step is illegal in this state.
    pub fn next(self, step: Step) -> Option<ActorState> {
        use ActorState::*;
        use Step::*;

        match (self, step) {
            (Unregistered, Register) | (Registered, Register) => Some(Registered),
            (Registered, SendChallenge) => Some(ChallengeSent),
            (Registered, ReceiveChallenge) => Some(ChallengeReceived),
            (ChallengeSent, ReceiveChallenge) => Some(ChallengeReceived),
            (ChallengeReceived, SendChallenge) => Some(ChallengeReceived),
            (ChallengeReceived, SignChallenge) => Some(Signed),
            (Signed, VerifyCounterparty) => Some(Signed),
            (Signed, BuildToken) => Some(TokenBuilt),
            (TokenBuilt, BlindToken) => Some(TokenBlinded),
            (TokenBlinded, AcceptBlindSignature) => Some(TokenBlinded),
            (TokenBlinded, ExchangeToken) => Some(Exchanged),
            (Exchanged, FinishRound) | (Aborted, FinishRound) => Some(Registered),
            _ => None,
        }
    }
}

/// Everything that belongs to one exchange and is thrown away with it.
#[derive(Default)]
struct Round {
    own_challenge: Option<Challenge>,
    remote_challenge: Option<Challenge>,
    vouch: Option<SignedChallenge>,
    counterparty_cert: Option<Certificate>,
    token: Option<ReputationToken>,
    pending: Option<(BlindedToken, BlindingFactor)>,
    signed_token: Option<SignedReputationToken>,
    counterparty_token: Option<SignedReputationToken>,
}

/// One side of an exchange.
///
/// Every challenge issued or received is remembered for the life of the actor
/// so replays are caught across rounds; that memory is never pruned.
pub struct Actor {
    role: Role,
    params: DomainParameters,
    blind_scheme: BlindSignatureScheme,
    keys: Option<KeyPair>,
    certificate: Option<Certificate>,
    authority_pk: Option<PublicKey>,
    state: ActorState,
    round: Round,
    issued: HashSet<Challenge>,
    received: HashSet<Challenge>,
}

impl Actor {
    pub fn new(role: Role, params: &DomainParameters) -> Result<Self> {
        Ok(Self {
            role,
            params: params.clone(),
            blind_scheme: BlindSignatureScheme::new(params)?,
            keys: None,
            certificate: None,
            authority_pk: None,
            state: ActorState::Unregistered,
            round: Round::default(),
            issued: HashSet::new(),
            received: HashSet::new(),
        })
    }

    pub fn requestor(params: &DomainParameters) -> Result<Self> {
        Self::new(Role::Requestor, params)
    }

    pub fn supplier(params: &DomainParameters) -> Result<Self> {
        Self::new(Role::Supplier, params)
    }

    pub fn role(&self) -> Role {
        self.role
    }

    pub fn state(&self) -> ActorState {
        self.state
    }

    pub fn certificate(&self) -> Option<&Certificate> {
        self.certificate.as_ref()
    }

    pub fn public_key(&self) -> Option<PublicKey> {
        self.keys.as_ref().map(KeyPair::public_key)
    }

    /// The challenge this actor issued in the current round.
    pub fn own_challenge(&self) -> Option<&Challenge> {
        self.round.own_challenge.as_ref()
    }

    pub fn signed_token(&self) -> Option<&SignedReputationToken> {
        self.round.signed_token.as_ref()
    }

    pub fn counterparty_token(&self) -> Option<&SignedReputationToken> {
        self.round.counterparty_token.as_ref()
    }

    /// Gets a certificate from `endpoint`, generating a key pair on first use.
    ///
    /// Registering again is allowed and replaces the certificate with a fresh,
    /// unlinked one for the same key.
    pub fn register_with_system<E: RegistrationEndpoint + ?Sized>(
        &mut self,
        endpoint: &E,
    ) -> Result<Certificate> {
        let next = self.check(Step::Register)?;

        if self.keys.is_none() {
            self.keys = Some(KeyPair::generate(&self.params)?);
        }
        let pk = self.public_key().ok_or_else(|| {
            Error::Registration("key pair missing after generation".to_string())
        })?;

        let cert = endpoint
            .register(&pk)
            .map_err(|e| Error::Registration(e.to_string()))?;

        if cert.public_key() != &pk {
            warn!(role = ?self.role, "certificate issued for a different key");
            return Err(Error::Registration(
                "certificate does not carry our key".to_string(),
            ));
        }
        if !endpoint.verify_certificate(&cert) {
            warn!(role = ?self.role, "certificate signature does not verify");
            return Err(Error::Registration(
                "certificate signature does not verify".to_string(),
            ));
        }

        info!(role = ?self.role, account_id = cert.account_id(), "registered");

        self.authority_pk = Some(endpoint.public_key());
        self.certificate = Some(cert.clone());
        self.round = Round::default();
        self.state = next;
        Ok(cert)
    }

    /// Issues a fresh challenge for the counterparty and remembers it.
    pub fn create_random_challenge(&mut self) -> Result<Challenge> {
        let next = self.check(Step::SendChallenge)?;
        if self.round.own_challenge.is_some() {
            return Err(self.out_of_order(Step::SendChallenge));
        }

        let mut challenge = Challenge::random();
        while self.issued.contains(&challenge) || self.received.contains(&challenge) {
            challenge = Challenge::random();
        }
        self.issued.insert(challenge);
        self.round.own_challenge = Some(challenge);

        debug!(role = ?self.role, "issued challenge");

        self.state = next;
        Ok(challenge)
    }

    /// Stores the counterparty's challenge. A challenge seen in any earlier
    /// round, or one this actor issued itself, is a replay.
    pub fn exchange_challenge(&mut self, remote: Challenge) -> Result<()> {
        let next = self.check(Step::ReceiveChallenge)?;

        if self.received.contains(&remote) || self.issued.contains(&remote) {
            return Err(self.abort(Error::Replay));
        }
        self.received.insert(remote);
        self.round.remote_challenge = Some(remote);

        debug!(role = ?self.role, "received challenge");

        self.state = next;
        Ok(())
    }

    /// Signs the counterparty's challenge with this actor's own key.
    pub fn sign_challenge(&mut self) -> Result<SignedChallenge> {
        let next = self.check(Step::SignChallenge)?;
        if self.round.own_challenge.is_none() {
            return Err(self.out_of_order(Step::SignChallenge));
        }

        let remote = match self.round.remote_challenge {
            Some(c) => c,
            None => return Err(self.out_of_order(Step::SignChallenge)),
        };
        let signed = match self.keys.as_ref() {
            Some(keys) => SignedChallenge::sign(remote, keys),
            None => return Err(self.out_of_order(Step::SignChallenge)),
        };
        let signed = signed.map_err(|e| self.abort(e))?;

        self.state = next;
        Ok(signed)
    }

    /// Checks the counterparty's signature over the challenge this actor
    /// issued, using the key inside the counterparty's certificate. The
    /// certificate itself must come from the same authority.
    pub fn verify_counterparty_signature(
        &mut self,
        signed: &SignedChallenge,
        counterparty: &Certificate,
    ) -> Result<()> {
        let next = self.check(Step::VerifyCounterparty)?;

        let valid = match (self.round.own_challenge, self.authority_pk) {
            (Some(own), Some(authority_pk)) => {
                signed.challenge() == &own
                    && counterparty.verify(&self.params, &authority_pk)
                    && signed.verify(&self.params, counterparty.public_key())
            }
            _ => false,
        };
        if !valid {
            return Err(self.abort(Error::SignatureMismatch));
        }

        debug!(
            role = ?self.role,
            counterparty = counterparty.account_id(),
            "counterparty signature verified"
        );

        self.round.vouch = Some(signed.clone());
        self.round.counterparty_cert = Some(counterparty.clone());
        self.state = next;
        Ok(())
    }

    /// Pairs this actor's certificate with the counterparty's verified
    /// signature over its challenge.
    pub fn create_reputation_token(&mut self) -> Result<ReputationToken> {
        let next = self.check(Step::BuildToken)?;

        let token = match (self.certificate.as_ref(), self.round.vouch.as_ref()) {
            (Some(cert), Some(vouch)) => ReputationToken::new(cert.clone(), vouch.clone()),
            _ => return Err(self.out_of_order(Step::BuildToken)),
        };
        self.round.token = Some(token.clone());

        self.state = next;
        Ok(token)
    }

    /// Blinds the token for the authority. The factor stays with the actor.
    pub fn blind_reputation_token(&mut self) -> Result<BlindedToken> {
        let next = self.check(Step::BlindToken)?;

        let bytes = match self.round.token.as_ref() {
            Some(token) => token.to_bytes(),
            None => return Err(self.out_of_order(Step::BlindToken)),
        };
        let (blinded, factor) = self
            .blind_scheme
            .blind(&bytes)
            .map_err(|e| self.abort(e))?;
        self.round.pending = Some((blinded.clone(), factor));

        self.state = next;
        Ok(blinded)
    }

    /// Unblinds the authority's answer. The blinding factor is spent here
    /// whether or not the answer checks out.
    pub fn accept_blind_signature(
        &mut self,
        blind_sig: &BlindSignature,
        blind_pk: &PublicKey,
    ) -> Result<SignedReputationToken> {
        let next = self.check(Step::AcceptBlindSignature)?;

        let (blinded, factor) = match self.round.pending.take() {
            Some(pending) => pending,
            None => return Err(self.out_of_order(Step::AcceptBlindSignature)),
        };
        let token = match self.round.token.clone() {
            Some(token) => token,
            None => return Err(self.out_of_order(Step::AcceptBlindSignature)),
        };

        if !self.blind_scheme.verify_blinded(&blinded, blind_sig, blind_pk) {
            return Err(self.abort(Error::SignatureMismatch));
        }
        let sig = self
            .blind_scheme
            .unblind(blind_sig, factor)
            .map_err(|e| self.abort(e))?;
        if !self.blind_scheme.verify(&token.to_bytes(), &sig, blind_pk) {
            return Err(self.abort(Error::SignatureMismatch));
        }

        let signed = SignedReputationToken::new(token, sig);
        self.round.signed_token = Some(signed.clone());

        self.state = next;
        Ok(signed)
    }

    /// Takes the counterparty's blind-signed token. It must carry the
    /// authority's signature over its bytes, the certificate accepted earlier
    /// in this round, and this actor's signature over the challenge the
    /// counterparty sent in this round.
    pub fn exchange_reputation_token(
        &mut self,
        theirs: &SignedReputationToken,
        blind_pk: &PublicKey,
    ) -> Result<()> {
        let next = self.check(Step::ExchangeToken)?;
        if self.round.signed_token.is_none() {
            return Err(self.out_of_order(Step::ExchangeToken));
        }

        let token = theirs.token();
        let valid = match (
            self.round.remote_challenge,
            self.public_key(),
            self.authority_pk,
            self.round.counterparty_cert.as_ref(),
        ) {
            (Some(remote), Some(own_pk), Some(authority_pk), Some(counterparty)) => {
                self.blind_scheme
                    .verify(&token.to_bytes(), theirs.signature(), blind_pk)
                    && token.certificate() == counterparty
                    && token.certificate().verify(&self.params, &authority_pk)
                    && token.signed_challenge().challenge() == &remote
                    && token.is_vouched_by(&self.params, &own_pk)
            }
            _ => false,
        };
        if !valid {
            return Err(self.abort(Error::SignatureMismatch));
        }

        info!(role = ?self.role, "reputation tokens exchanged");

        self.round.counterparty_token = Some(theirs.clone());
        self.state = next;
        Ok(())
    }

    /// Closes a round that ended, either exchanged or aborted, and makes the
    /// actor ready for the next one.
    pub fn finish_round(&mut self) -> Result<()> {
        self.check(Step::FinishRound)?;
        self.abandon_round();
        Ok(())
    }

    /// Drops everything belonging to the current round, including an unspent
    /// blinding factor. Used after a timeout, whatever state the round is in.
    pub fn abandon_round(&mut self) {
        self.round = Round::default();
        self.state = if self.certificate.is_some() {
            ActorState::Registered
        } else {
            ActorState::Unregistered
        };
        debug!(role = ?self.role, state = ?self.state, "round reset");
    }

    fn check(&mut self, step: Step) -> Result<ActorState> {
        match self.state.next(step) {
            Some(next) => Ok(next),
            None => Err(self.out_of_order(step)),
        }
    }

    fn out_of_order(&mut self, step: Step) -> Error {
        let state = self.state;
        self.abort(Error::ProtocolState { state, step })
    }

    fn abort(&mut self, err: Error) -> Error {
        warn!(role = ?self.role, state = ?self.state, error = %err, "exchange aborted");
        self.round = Round::default();
        self.state = ActorState::Aborted;
        err
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::authority::CertificateAuthority;
    use crate::params::TrustedParty;

    struct Setup {
        authority: CertificateAuthority,
        requestor: Actor,
        supplier: Actor,
    }

    fn registered() -> Result<Setup> {
        let params = TrustedParty::new().generate_params(128)?;
        let authority = CertificateAuthority::new(&params)?;
        let mut requestor = Actor::requestor(&params)?;
        let mut supplier = Actor::supplier(&params)?;

        requestor.register_with_system(&authority)?;
        supplier.register_with_system(&authority)?;

        Ok(Setup {
            authority,
            requestor,
            supplier,
        })
    }

    /// Runs both actors up to the point where each holds a verified vouch.
    fn exchange_signatures(r: &mut Actor, s: &mut Actor) -> Result<()> {
        let c1 = r.create_random_challenge()?;
        s.exchange_challenge(c1)?;
        let c2 = s.create_random_challenge()?;
        r.exchange_challenge(c2)?;

        let sig_s = s.sign_challenge()?;
        let sig_r = r.sign_challenge()?;

        let cert_r = r.certificate().cloned().expect("requestor registered");
        let cert_s = s.certificate().cloned().expect("supplier registered");
        r.verify_counterparty_signature(&sig_s, &cert_s)?;
        s.verify_counterparty_signature(&sig_r, &cert_r)?;

        Ok(())
    }

    #[test]
    fn full_exchange() -> Result<()> {
        let Setup {
            authority,
            mut requestor,
            mut supplier,
        } = registered()?;
        let blind_pk = authority.blind_public_key();

        let cert_r = requestor.certificate().cloned().expect("requestor registered");
        let cert_s = supplier.certificate().cloned().expect("supplier registered");
        assert!(authority.verify_certificate(&cert_r));
        assert!(authority.verify_certificate(&cert_s));

        exchange_signatures(&mut requestor, &mut supplier)?;

        let token_r = requestor.create_reputation_token()?;
        let token_s = supplier.create_reputation_token()?;
        assert_eq!(token_r.certificate(), &cert_r);
        assert!(token_r.is_vouched_by(authority.params(), cert_s.public_key()));
        assert!(token_s.is_vouched_by(authority.params(), cert_r.public_key()));

        let blinded_r = requestor.blind_reputation_token()?;
        let blinded_s = supplier.blind_reputation_token()?;
        let signed_r =
            requestor.accept_blind_signature(&authority.sign_blinded(&blinded_r)?, &blind_pk)?;
        let signed_s =
            supplier.accept_blind_signature(&authority.sign_blinded(&blinded_s)?, &blind_pk)?;

        let scheme = BlindSignatureScheme::new(authority.params())?;
        assert!(scheme.verify(&token_r.to_bytes(), signed_r.signature(), &blind_pk));
        assert!(scheme.verify(&token_s.to_bytes(), signed_s.signature(), &blind_pk));

        requestor.exchange_reputation_token(&signed_s, &blind_pk)?;
        supplier.exchange_reputation_token(&signed_r, &blind_pk)?;

        assert_eq!(requestor.state(), ActorState::Exchanged);
        assert_eq!(supplier.state(), ActorState::Exchanged);
        assert_eq!(requestor.counterparty_token(), Some(&signed_s));

        Ok(())
    }

    #[test]
    fn mutual_signatures_verify() -> Result<()> {
        let Setup {
            authority,
            mut requestor,
            mut supplier,
        } = registered()?;
        let params = authority.params().clone();

        let c1 = requestor.create_random_challenge()?;
        supplier.exchange_challenge(c1)?;
        let c2 = supplier.create_random_challenge()?;
        requestor.exchange_challenge(c2)?;

        let sig_s = supplier.sign_challenge()?;
        let sig_r = requestor.sign_challenge()?;

        let pk_r = *requestor.certificate().expect("registered").public_key();
        let pk_s = *supplier.certificate().expect("registered").public_key();
        assert_eq!(sig_s.challenge(), &c1);
        assert_eq!(sig_r.challenge(), &c2);
        assert!(sig_s.verify(&params, &pk_s));
        assert!(sig_r.verify(&params, &pk_r));

        Ok(())
    }

    #[test]
    fn forged_signature_aborts() -> Result<()> {
        let Setup {
            authority,
            mut requestor,
            mut supplier,
        } = registered()?;

        let c1 = requestor.create_random_challenge()?;
        supplier.exchange_challenge(c1)?;
        let c2 = supplier.create_random_challenge()?;
        requestor.exchange_challenge(c2)?;
        requestor.sign_challenge()?;

        // a third party signs c1 but the supplier's certificate is presented
        let mallory = KeyPair::generate(authority.params())?;
        let forged = SignedChallenge::sign(c1, &mallory)?;
        let cert_s = supplier.certificate().cloned().expect("registered");

        let result = requestor.verify_counterparty_signature(&forged, &cert_s);
        assert!(matches!(result, Err(Error::SignatureMismatch)));
        assert_eq!(requestor.state(), ActorState::Aborted);
        assert!(requestor.certificate().is_some());

        // no token after an abort
        assert!(matches!(
            requestor.create_reputation_token(),
            Err(Error::ProtocolState { .. })
        ));

        requestor.abandon_round();
        assert_eq!(requestor.state(), ActorState::Registered);

        Ok(())
    }

    #[test]
    fn uncertified_key_is_rejected() -> Result<()> {
        let Setup {
            authority,
            mut requestor,
            mut supplier,
        } = registered()?;

        let c1 = requestor.create_random_challenge()?;
        supplier.exchange_challenge(c1)?;
        requestor.exchange_challenge(supplier.create_random_challenge()?)?;
        requestor.sign_challenge()?;

        // a certificate from another authority for mallory's key
        let rogue = CertificateAuthority::new(authority.params())?;
        let mallory = KeyPair::generate(authority.params())?;
        let rogue_cert = rogue.register(&mallory.public_key())?;
        let signed = SignedChallenge::sign(c1, &mallory)?;

        let result = requestor.verify_counterparty_signature(&signed, &rogue_cert);
        assert!(matches!(result, Err(Error::SignatureMismatch)));

        Ok(())
    }

    #[test]
    fn signature_over_other_challenge_is_rejected() -> Result<()> {
        let Setup {
            mut requestor,
            mut supplier,
            ..
        } = registered()?;

        let c1 = requestor.create_random_challenge()?;
        supplier.exchange_challenge(c1)?;
        let c2 = supplier.create_random_challenge()?;
        requestor.exchange_challenge(c2)?;
        requestor.sign_challenge()?;

        // supplier returns its signature over its own challenge instead of c1
        let wrong = SignedChallenge::sign(c2, supplier.keys.as_ref().expect("registered"))?;
        let cert_s = supplier.certificate().cloned().expect("registered");

        let result = requestor.verify_counterparty_signature(&wrong, &cert_s);
        assert!(matches!(result, Err(Error::SignatureMismatch)));

        Ok(())
    }

    #[test]
    fn out_of_order_steps_abort() -> Result<()> {
        let params = TrustedParty::new().generate_params(128)?;
        let mut actor = Actor::requestor(&params)?;

        let result = actor.create_random_challenge();
        assert!(matches!(
            result,
            Err(Error::ProtocolState {
                state: ActorState::Unregistered,
                step: Step::SendChallenge
            })
        ));
        assert_eq!(actor.state(), ActorState::Aborted);
        actor.abandon_round();
        assert_eq!(actor.state(), ActorState::Unregistered);

        let Setup { mut requestor, .. } = registered()?;
        assert!(matches!(
            requestor.sign_challenge(),
            Err(Error::ProtocolState { .. })
        ));
        assert_eq!(requestor.state(), ActorState::Aborted);
        assert!(requestor.certificate().is_some());

        Ok(())
    }

    #[test]
    fn second_challenge_in_one_round_is_refused() -> Result<()> {
        let Setup { mut requestor, .. } = registered()?;

        requestor.exchange_challenge(Challenge::random())?;
        requestor.create_random_challenge()?;
        assert_eq!(requestor.state(), ActorState::ChallengeReceived);

        assert!(matches!(
            requestor.create_random_challenge(),
            Err(Error::ProtocolState { .. })
        ));

        Ok(())
    }

    #[test]
    fn replayed_challenge_is_rejected() -> Result<()> {
        let Setup {
            mut requestor,
            mut supplier,
            ..
        } = registered()?;

        let c1 = requestor.create_random_challenge()?;
        supplier.exchange_challenge(c1)?;
        supplier.abandon_round();

        let result = supplier.exchange_challenge(c1);
        assert!(matches!(result, Err(Error::Replay)));
        assert_eq!(supplier.state(), ActorState::Aborted);

        // an actor's own challenge reflected back is a replay too
        requestor.abandon_round();
        let c = requestor.create_random_challenge()?;
        assert!(matches!(requestor.exchange_challenge(c), Err(Error::Replay)));

        Ok(())
    }

    #[test]
    fn bad_blind_signature_aborts() -> Result<()> {
        let Setup {
            authority,
            mut requestor,
            mut supplier,
        } = registered()?;
        exchange_signatures(&mut requestor, &mut supplier)?;

        requestor.create_reputation_token()?;
        let blinded = requestor.blind_reputation_token()?;

        // signed by some other blind signer
        let impostor = crate::BlindSigner::new();
        let blind_sig = impostor.sign_blinded(&blinded)?;
        let result = requestor.accept_blind_signature(&blind_sig, &authority.blind_public_key());
        assert!(matches!(result, Err(Error::SignatureMismatch)));
        assert_eq!(requestor.state(), ActorState::Aborted);

        Ok(())
    }

    #[test]
    fn foreign_token_is_rejected() -> Result<()> {
        let Setup {
            authority,
            mut requestor,
            mut supplier,
        } = registered()?;
        let blind_pk = authority.blind_public_key();
        exchange_signatures(&mut requestor, &mut supplier)?;

        requestor.create_reputation_token()?;
        let blinded = requestor.blind_reputation_token()?;
        let blind_sig = authority.sign_blinded(&blinded)?;
        let signed_r = requestor.accept_blind_signature(&blind_sig, &blind_pk)?;

        // the requestor's own token is not vouched for by the requestor
        let result = requestor.exchange_reputation_token(&signed_r, &blind_pk);
        assert!(matches!(result, Err(Error::SignatureMismatch)));
        assert!(requestor.counterparty_token().is_none());

        Ok(())
    }

    /// The supplier pairs the requestor's genuine vouch with a certificate
    /// other than the one it presented, and gets the result blind signed.
    fn token_with_swapped_certificate(
        swap: impl Fn(&CertificateAuthority, &Actor) -> Result<Certificate>,
    ) -> Result<()> {
        let Setup {
            authority,
            mut requestor,
            mut supplier,
        } = registered()?;
        let blind_pk = authority.blind_public_key();
        exchange_signatures(&mut requestor, &mut supplier)?;

        requestor.create_reputation_token()?;
        let blinded = requestor.blind_reputation_token()?;
        let blind_sig = authority.sign_blinded(&blinded)?;
        requestor.accept_blind_signature(&blind_sig, &blind_pk)?;

        let vouch = supplier.round.vouch.clone().expect("supplier verified");
        let token = ReputationToken::new(swap(&authority, &supplier)?, vouch);

        let scheme = BlindSignatureScheme::new(authority.params())?;
        let (blinded, factor) = scheme.blind(&token.to_bytes())?;
        let sig = scheme.unblind(&authority.sign_blinded(&blinded)?, factor)?;
        assert!(scheme.verify(&token.to_bytes(), &sig, &blind_pk));
        let forged = SignedReputationToken::new(token, sig);

        let result = requestor.exchange_reputation_token(&forged, &blind_pk);
        assert!(matches!(result, Err(Error::SignatureMismatch)));
        assert_eq!(requestor.state(), ActorState::Aborted);
        assert!(requestor.counterparty_token().is_none());

        Ok(())
    }

    #[test]
    fn token_with_unissued_certificate_is_rejected() -> Result<()> {
        token_with_swapped_certificate(|authority, supplier| {
            let rogue = CertificateAuthority::new(authority.params())?;
            let pk = supplier.public_key().expect("registered");
            rogue.register(&pk)
        })
    }

    #[test]
    fn token_with_someone_elses_certificate_is_rejected() -> Result<()> {
        token_with_swapped_certificate(|authority, _| {
            let bystander = KeyPair::generate(authority.params())?;
            authority.register(&bystander.public_key())
        })
    }

    #[test]
    fn token_with_fresh_certificate_for_same_key_is_rejected() -> Result<()> {
        // genuine and for the supplier's own key, but not the one it presented
        token_with_swapped_certificate(|authority, supplier| {
            let pk = supplier.public_key().expect("registered");
            authority.register(&pk)
        })
    }

    #[test]
    fn finish_round_only_after_the_round_ended() -> Result<()> {
        let Setup {
            authority,
            mut requestor,
            mut supplier,
        } = registered()?;
        let blind_pk = authority.blind_public_key();

        // nothing to finish yet
        let result = requestor.finish_round();
        assert!(matches!(
            result,
            Err(Error::ProtocolState {
                state: ActorState::Registered,
                step: Step::FinishRound
            })
        ));
        assert_eq!(requestor.state(), ActorState::Aborted);
        requestor.finish_round()?;
        assert_eq!(requestor.state(), ActorState::Registered);

        exchange_signatures(&mut requestor, &mut supplier)?;
        assert!(matches!(
            supplier.finish_round(),
            Err(Error::ProtocolState {
                state: ActorState::Signed,
                ..
            })
        ));

        requestor.create_reputation_token()?;
        let blinded = requestor.blind_reputation_token()?;
        let blind_sig = authority.sign_blinded(&blinded)?;
        requestor.accept_blind_signature(&blind_sig, &blind_pk)?;
        assert!(requestor.finish_round().is_err());

        requestor.finish_round()?;
        assert_eq!(requestor.state(), ActorState::Registered);
        assert!(requestor.own_challenge().is_none());
        assert!(requestor.signed_token().is_none());
        assert!(requestor.certificate().is_some());

        let mut fresh = Actor::supplier(authority.params())?;
        assert!(fresh.finish_round().is_err());
        fresh.finish_round()?;
        assert_eq!(fresh.state(), ActorState::Unregistered);

        Ok(())
    }

    #[test]
    fn finish_round_after_exchange() -> Result<()> {
        let Setup {
            authority,
            mut requestor,
            mut supplier,
        } = registered()?;
        let blind_pk = authority.blind_public_key();
        exchange_signatures(&mut requestor, &mut supplier)?;

        let mut signed = Vec::new();
        for actor in [&mut requestor, &mut supplier].iter_mut() {
            actor.create_reputation_token()?;
            let blinded = actor.blind_reputation_token()?;
            let blind_sig = authority.sign_blinded(&blinded)?;
            signed.push(actor.accept_blind_signature(&blind_sig, &blind_pk)?);
        }
        requestor.exchange_reputation_token(&signed[1], &blind_pk)?;
        supplier.exchange_reputation_token(&signed[0], &blind_pk)?;

        requestor.finish_round()?;
        supplier.finish_round()?;
        assert_eq!(requestor.state(), ActorState::Registered);
        assert_eq!(supplier.state(), ActorState::Registered);
        assert!(requestor.counterparty_token().is_none());

        // the next round starts cleanly
        let c = requestor.create_random_challenge()?;
        supplier.exchange_challenge(c)?;

        Ok(())
    }

    #[test]
    fn reregistration_issues_fresh_certificate() -> Result<()> {
        let Setup {
            authority,
            mut requestor,
            ..
        } = registered()?;

        let first = requestor.certificate().cloned().expect("registered");
        let second = requestor.register_with_system(&authority)?;

        assert_ne!(first.account_id(), second.account_id());
        assert_eq!(first.public_key(), second.public_key());
        assert_eq!(requestor.certificate(), Some(&second));

        Ok(())
    }

    struct ForgingEndpoint {
        authority: CertificateAuthority,
        forger: KeyPair,
    }

    impl RegistrationEndpoint for ForgingEndpoint {
        fn public_key(&self) -> PublicKey {
            self.authority.public_key()
        }

        fn register(&self, pk: &PublicKey) -> Result<Certificate> {
            let payload = crate::certificate::signed_payload(pk, 1);
            Ok(Certificate::new(*pk, 1, self.forger.sign(&payload)?))
        }

        fn verify_certificate(&self, cert: &Certificate) -> bool {
            self.authority.verify_certificate(cert)
        }
    }

    struct Unreachable;

    impl RegistrationEndpoint for Unreachable {
        fn public_key(&self) -> PublicKey {
            blsttc::SecretKey::random().public_key()
        }

        fn register(&self, _pk: &PublicKey) -> Result<Certificate> {
            Err(Error::Registration("connection refused".to_string()))
        }

        fn verify_certificate(&self, _cert: &Certificate) -> bool {
            false
        }
    }

    #[test]
    fn registration_failures() -> Result<()> {
        let params = TrustedParty::new().generate_params(128)?;

        let mut actor = Actor::supplier(&params)?;
        assert!(matches!(
            actor.register_with_system(&Unreachable),
            Err(Error::Registration(_))
        ));
        assert_eq!(actor.state(), ActorState::Unregistered);

        let endpoint = ForgingEndpoint {
            authority: CertificateAuthority::new(&params)?,
            forger: KeyPair::generate(&params)?,
        };
        assert!(matches!(
            actor.register_with_system(&endpoint),
            Err(Error::Registration(_))
        ));
        assert!(actor.certificate().is_none());

        Ok(())
    }
}
