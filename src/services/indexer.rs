//! boundary to the chain indexer.
//!
//! The wallet opens a session with its viewing key and then subscribes to a
//! stream of updates starting after a given index.  The transport must
//! deliver updates in index order; nothing downstream reorders them.

use std::fmt;

use async_trait::async_trait;
use futures::stream::BoxStream;
use serde::Deserialize;
use serde::Serialize;

use crate::protocol::ledger::ApplyStage;
use crate::protocol::ledger::CollapsedUpdate;
use crate::protocol::ProtocolVersion;

/// identifies an indexer session opened for one viewing key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// an update as it comes off the wire.  Transactions are still serialized.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RawUpdate {
    Progress {
        highest_index: u64,
        highest_relevant_index: u64,
        highest_relevant_wallet_index: u64,
        protocol_version: ProtocolVersion,
    },
    MerkleTree {
        index: u64,
        update: CollapsedUpdate,
        protocol_version: ProtocolVersion,
    },
    Transaction {
        offset: u64,
        transaction: Vec<u8>,
        stage: ApplyStage,
        protocol_version: ProtocolVersion,
    },
}

impl RawUpdate {
    pub fn index(&self) -> u64 {
        match self {
            Self::Progress { highest_index, .. } => *highest_index,
            Self::MerkleTree { index, .. } => *index,
            Self::Transaction { offset, .. } => *offset,
        }
    }

    pub fn protocol_version(&self) -> ProtocolVersion {
        match self {
            Self::Progress {
                protocol_version, ..
            }
            | Self::MerkleTree {
                protocol_version, ..
            }
            | Self::Transaction {
                protocol_version, ..
            } => *protocol_version,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum IndexerError {
    #[error("indexer connection failed: {0}")]
    Connection(String),

    #[error("indexer rejected viewing key: {0}")]
    InvalidViewingKey(String),

    #[error("unknown indexer session {0}")]
    UnknownSession(SessionId),
}

pub type UpdateStream = BoxStream<'static, Result<RawUpdate, IndexerError>>;

/// client side of the indexer protocol.
#[async_trait]
pub trait IndexerClient: Send + Sync + fmt::Debug {
    /// open a session for a bech32m encoded viewing key.
    async fn connect(&self, viewing_key: &str) -> Result<SessionId, IndexerError>;

    /// stream updates with an index greater than `from_index`, or from
    /// genesis when `None`.  The stream never ends on its own while the
    /// session is open.
    async fn subscribe(
        &self,
        session: &SessionId,
        from_index: Option<u64>,
    ) -> Result<UpdateStream, IndexerError>;

    async fn disconnect(&self, session: &SessionId) -> Result<(), IndexerError>;
}
