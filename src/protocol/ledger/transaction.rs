use std::collections::BTreeMap;
use std::collections::HashSet;

use serde::Deserialize;
use serde::Serialize;

use super::address::ShieldedAddress;
use super::coin::CoinCommitment;
use super::coin::CoinInfo;
use super::coin::Nullifier;
use super::coin::QualifiedCoinInfo;
use super::domain_hash;
use super::keys::SecretKeys;
use super::notification::Notification;
use super::notification::NotificationError;
use super::token::TokenType;
use crate::macros::bytes32_newtype;

bytes32_newtype! {
    pub struct TransactionHash;
}

bytes32_newtype! {
    pub struct BlockHash;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum TransactionError {
    #[error("transactions spend the same nullifier {0}")]
    DuplicateNullifier(Nullifier),

    #[error("transactions create the same commitment {0}")]
    DuplicateCommitment(CoinCommitment),

    #[error(transparent)]
    Notification(#[from] NotificationError),

    #[error("could not (de)serialize transaction: {0}")]
    Serialization(String),

    #[error("total value of token {0} in one offer is out of range")]
    ValueOverflow(TokenType),
}

/// outcome of applying a transaction to the ledger.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, strum::Display, strum::EnumIs,
)]
pub enum ApplyStage {
    /// both segments applied.
    Success,

    /// the guaranteed segment applied, the fallible segment did not.
    PartialSuccess,

    /// nothing applied.
    Failure,
}

impl ApplyStage {
    pub fn guaranteed_applied(&self) -> bool {
        !self.is_failure()
    }

    pub fn fallible_applied(&self) -> bool {
        self.is_success()
    }
}

/// spend of a coin.  The reference model keeps value and token type in the
/// clear; a real ledger hides them behind the proof.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Input {
    pub nullifier: Nullifier,
    pub token_type: TokenType,
    pub value: u128,
}

impl Input {
    pub fn spend(coin: &QualifiedCoinInfo, keys: &SecretKeys) -> Self {
        Self {
            nullifier: coin.coin().nullifier(keys.coin_secret_key()),
            token_type: coin.token_type,
            value: coin.value,
        }
    }
}

/// creation of a coin for `recipient`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Output {
    pub commitment: CoinCommitment,
    pub token_type: TokenType,
    pub value: u128,
    pub notification: Notification,
}

impl Output {
    pub fn create(coin: &CoinInfo, recipient: &ShieldedAddress) -> Result<Self, NotificationError> {
        Ok(Self {
            commitment: coin.commitment(&recipient.coin_public_key),
            token_type: coin.token_type,
            value: coin.value,
            notification: Notification::encrypt(coin, &recipient.encryption_public_key)?,
        })
    }
}

/// one segment of a transaction.
///
/// `deltas` is the public per-token net value of the segment: inputs minus
/// outputs.  A positive delta is value the segment makes available, a
/// negative delta is value it still needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Offer {
    inputs: Vec<Input>,
    outputs: Vec<Output>,
    deltas: BTreeMap<TokenType, i128>,
}

impl Offer {
    /// fails if a token's summed input or output value does not fit the
    /// signed delta.
    pub fn new(inputs: Vec<Input>, outputs: Vec<Output>) -> Result<Self, TransactionError> {
        let mut deltas: BTreeMap<TokenType, i128> = BTreeMap::new();
        let values = inputs
            .iter()
            .map(|i| (i.token_type, i.value, true))
            .chain(outputs.iter().map(|o| (o.token_type, o.value, false)));
        for (token_type, value, is_input) in values {
            let delta = deltas.entry(token_type).or_default();
            let current = *delta;
            *delta = i128::try_from(value)
                .ok()
                .and_then(|v| {
                    if is_input {
                        current.checked_add(v)
                    } else {
                        current.checked_sub(v)
                    }
                })
                .ok_or(TransactionError::ValueOverflow(token_type))?;
        }
        deltas.retain(|_, v| *v != 0);

        Ok(Self {
            inputs,
            outputs,
            deltas,
        })
    }

    pub fn inputs(&self) -> &[Input] {
        &self.inputs
    }

    pub fn outputs(&self) -> &[Output] {
        &self.outputs
    }

    pub fn deltas(&self) -> &BTreeMap<TokenType, i128> {
        &self.deltas
    }

    pub fn is_empty(&self) -> bool {
        self.inputs.is_empty() && self.outputs.is_empty()
    }

    /// concatenate two offers.
    pub fn merge(&self, other: &Offer) -> Result<Offer, TransactionError> {
        Offer::new(
            self.inputs.iter().chain(&other.inputs).cloned().collect(),
            self.outputs.iter().chain(&other.outputs).cloned().collect(),
        )
    }

    fn digest_into(&self, parts: &mut Vec<Vec<u8>>) {
        parts.extend(self.inputs.iter().map(|i| i.nullifier.as_bytes().to_vec()));
        parts.extend(self.outputs.iter().map(|o| o.commitment.as_bytes().to_vec()));
        for (token, delta) in &self.deltas {
            parts.push([token.as_bytes().as_slice(), &delta.to_le_bytes()].concat());
        }
    }
}

/// proof status of a transaction.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, strum::EnumIs)]
pub enum ProofState {
    Unproven,
    Proven(Vec<u8>),

    /// proofs stripped, as the simulator does.  Accepted by the simulator
    /// only.
    Erased,
}

/// a shielded transaction with a guaranteed and an optional fallible
/// segment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub guaranteed: Offer,
    pub fallible: Option<Offer>,
    pub proof: ProofState,
}

impl Transaction {
    pub fn new(guaranteed: Offer, fallible: Option<Offer>) -> Self {
        Self {
            guaranteed,
            fallible: fallible.filter(|f| !f.is_empty()),
            proof: ProofState::Unproven,
        }
    }

    pub fn offers(&self) -> impl Iterator<Item = &Offer> {
        std::iter::once(&self.guaranteed).chain(self.fallible.as_ref())
    }

    pub fn num_inputs(&self) -> usize {
        self.offers().map(|o| o.inputs.len()).sum()
    }

    pub fn num_outputs(&self) -> usize {
        self.offers().map(|o| o.outputs.len()).sum()
    }

    pub fn nullifiers(&self) -> impl Iterator<Item = &Nullifier> {
        self.offers()
            .flat_map(|o| o.inputs.iter().map(|i| &i.nullifier))
    }

    pub fn commitments(&self) -> impl Iterator<Item = &CoinCommitment> {
        self.offers()
            .flat_map(|o| o.outputs.iter().map(|o| &o.commitment))
    }

    /// identifies the transaction independent of its proof status.
    pub fn hash(&self) -> TransactionHash {
        let mut parts = vec![];
        self.guaranteed.digest_into(&mut parts);
        parts.push(b"fallible".to_vec());
        if let Some(fallible) = &self.fallible {
            fallible.digest_into(&mut parts);
        }
        let parts: Vec<&[u8]> = parts.iter().map(|p| p.as_slice()).collect();
        TransactionHash::from_bytes(domain_hash("transaction-hash", &parts))
    }

    /// combine two transactions segment by segment.
    pub fn merge(&self, other: &Transaction) -> Result<Transaction, TransactionError> {
        let mut nullifiers = HashSet::new();
        for n in self.nullifiers().chain(other.nullifiers()) {
            if !nullifiers.insert(n) {
                return Err(TransactionError::DuplicateNullifier(*n));
            }
        }
        let mut commitments = HashSet::new();
        for c in self.commitments().chain(other.commitments()) {
            if !commitments.insert(c) {
                return Err(TransactionError::DuplicateCommitment(*c));
            }
        }

        let fallible = match (&self.fallible, &other.fallible) {
            (Some(a), Some(b)) => Some(a.merge(b)?),
            (a, b) => a.clone().or_else(|| b.clone()),
        };

        let proof = match (&self.proof, &other.proof) {
            (ProofState::Unproven, _) | (_, ProofState::Unproven) => ProofState::Unproven,
            (ProofState::Erased, _) | (_, ProofState::Erased) => ProofState::Erased,
            (ProofState::Proven(a), ProofState::Proven(b)) => {
                ProofState::Proven(domain_hash("merged-proof", &[a.as_slice(), b.as_slice()]).to_vec())
            }
        };

        Ok(Transaction {
            guaranteed: self.guaranteed.merge(&other.guaranteed)?,
            fallible,
            proof,
        })
    }

    pub fn erase_proofs(mut self) -> Self {
        self.proof = ProofState::Erased;
        self
    }

    pub fn with_proof(mut self, proof: Vec<u8>) -> Self {
        self.proof = ProofState::Proven(proof);
        self
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, TransactionError> {
        bincode::serialize(self).map_err(|e| TransactionError::Serialization(e.to_string()))
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, TransactionError> {
        bincode::deserialize(bytes).map_err(|e| TransactionError::Serialization(e.to_string()))
    }
}
