//! assembles variants together with the capabilities the facade needs to
//! drive them.

use std::sync::Arc;

use crate::application::config::Network;
use crate::application::config::WalletConfiguration;
use crate::protocol::ledger::FeeSchedule;
use crate::protocol::ProtocolVersion;
use crate::runtime::RuntimeError;
use crate::runtime::Variant;
use crate::runtime::VariantTag;
use crate::services::indexer::IndexerClient;
use crate::services::proving::ProvingService;
use crate::services::serialization::StateSerializer;
use crate::services::submission::SubmissionService;
use crate::services::sync::SyncService;
use crate::transacting::coin_selection::CoinSelectionPolicy;
use crate::transacting::TransactingCapability;

use super::ShieldedVariant;
use super::V1_FEE_SCHEDULE;
use super::V2_ACTIVATION_VERSION;
use super::V2_FEE_SCHEDULE;

/// what the facade can do with the state of one variant.
#[derive(Debug, Clone)]
pub struct VariantCapabilities {
    pub transacting: TransactingCapability,
    pub proving: Arc<dyn ProvingService>,
    pub submission: Arc<dyn SubmissionService>,
    pub serialization: StateSerializer,
}

/// a variant and its capabilities, ready for the runtime.
#[derive(Debug, Clone)]
pub struct BuiltVariant {
    pub variant: Arc<dyn Variant>,
    pub capabilities: VariantCapabilities,
}

/// the external services every variant is wired to.
#[derive(Debug, Clone)]
pub struct VariantServices {
    pub indexer: Arc<dyn IndexerClient>,
    pub proving: Arc<dyn ProvingService>,
    pub submission: Arc<dyn SubmissionService>,
}

/// builds a [ShieldedVariant].  Every service must be supplied before
/// [VariantBuilder::build].
#[derive(Debug, Clone)]
pub struct VariantBuilder {
    tag: VariantTag,
    since: ProtocolVersion,
    fees: FeeSchedule,
    policy: CoinSelectionPolicy,
    network: Network,
    supported_until: ProtocolVersion,
    indexer: Option<Arc<dyn IndexerClient>>,
    proving: Option<Arc<dyn ProvingService>>,
    submission: Option<Arc<dyn SubmissionService>>,
}

impl VariantBuilder {
    pub fn new(tag: VariantTag, since: ProtocolVersion, fees: FeeSchedule) -> Self {
        Self {
            tag,
            since,
            fees,
            policy: CoinSelectionPolicy::default(),
            network: Network::default(),
            supported_until: ProtocolVersion::MAX_SUPPORTED,
            indexer: None,
            proving: None,
            submission: None,
        }
    }

    /// V1, active from genesis.
    pub fn v1() -> Self {
        Self::new(VariantTag::V1, ProtocolVersion::GENESIS, V1_FEE_SCHEDULE)
    }

    /// V2, active from [V2_ACTIVATION_VERSION].
    pub fn v2() -> Self {
        Self::new(VariantTag::V2, V2_ACTIVATION_VERSION, V2_FEE_SCHEDULE)
    }

    pub fn with_network(mut self, network: Network) -> Self {
        self.network = network;
        self
    }

    pub fn with_fees(mut self, fees: FeeSchedule) -> Self {
        self.fees = fees;
        self
    }

    pub fn with_policy(mut self, policy: CoinSelectionPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_supported_until(mut self, supported_until: ProtocolVersion) -> Self {
        self.supported_until = supported_until;
        self
    }

    pub fn with_indexer(mut self, indexer: Arc<dyn IndexerClient>) -> Self {
        self.indexer = Some(indexer);
        self
    }

    pub fn with_proving(mut self, proving: Arc<dyn ProvingService>) -> Self {
        self.proving = Some(proving);
        self
    }

    pub fn with_submission(mut self, submission: Arc<dyn SubmissionService>) -> Self {
        self.submission = Some(submission);
        self
    }

    pub fn with_services(self, services: &VariantServices) -> Self {
        self.with_indexer(services.indexer.clone())
            .with_proving(services.proving.clone())
            .with_submission(services.submission.clone())
    }

    /// apply the network, selection policy and fee override of `config`.
    pub fn configured(self, config: &WalletConfiguration) -> Self {
        let fees = config.fee_schedule.unwrap_or(self.fees);
        self.with_network(config.network)
            .with_policy(config.coin_selection_policy)
            .with_fees(fees)
    }

    pub fn build(self) -> Result<BuiltVariant, RuntimeError> {
        let indexer = self.indexer.ok_or(RuntimeError::MissingService("indexer"))?;
        let proving = self.proving.ok_or(RuntimeError::MissingService("proving"))?;
        let submission = self
            .submission
            .ok_or(RuntimeError::MissingService("submission"))?;

        let variant = ShieldedVariant::new(
            self.tag,
            self.since,
            SyncService::new(indexer, self.network),
        )
        .with_supported_until(self.supported_until);

        tracing::debug!(
            "built variant {} (since {}, fees {:?})",
            self.tag,
            self.since,
            self.fees
        );

        Ok(BuiltVariant {
            variant: Arc::new(variant),
            capabilities: VariantCapabilities {
                transacting: TransactingCapability::new(self.fees, self.policy, self.network),
                proving,
                submission,
                serialization: StateSerializer,
            },
        })
    }
}

/// V1 and V2 wired to the same services, in activation order.
pub fn standard_variants(
    config: &WalletConfiguration,
    services: &VariantServices,
) -> Result<Vec<BuiltVariant>, RuntimeError> {
    [VariantBuilder::v1(), VariantBuilder::v2()]
        .into_iter()
        .map(|builder| builder.configured(config).with_services(services).build())
        .collect()
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use async_trait::async_trait;

    use super::*;
    use crate::services::proving::SimulatedProving;
    use crate::services::submission::NodeClient;
    use crate::services::submission::NodeReceipt;
    use crate::services::submission::NodeSubmission;
    use crate::services::submission::SubmissionError;
    use crate::services::submission::SubmissionStage;
    use crate::tests::shared::ScriptedIndexer;

    #[derive(Debug)]
    struct Unreachable;

    #[async_trait]
    impl NodeClient for Unreachable {
        async fn send_transaction_and_wait(
            &self,
            _transaction: Vec<u8>,
            _wait_for: SubmissionStage,
        ) -> Result<NodeReceipt, SubmissionError> {
            Err(SubmissionError::Transport("unreachable".to_string()))
        }

        async fn disconnect(&self) {}
    }

    fn services() -> VariantServices {
        VariantServices {
            indexer: Arc::new(ScriptedIndexer::new(vec![])),
            proving: Arc::new(SimulatedProving),
            submission: Arc::new(NodeSubmission::new(Arc::new(Unreachable))),
        }
    }

    #[test]
    fn missing_services_are_named() {
        let services = services();
        assert_eq!(
            RuntimeError::MissingService("indexer"),
            VariantBuilder::v1().build().unwrap_err()
        );
        assert_eq!(
            RuntimeError::MissingService("proving"),
            VariantBuilder::v1()
                .with_indexer(services.indexer.clone())
                .build()
                .unwrap_err()
        );
        assert_eq!(
            RuntimeError::MissingService("submission"),
            VariantBuilder::v1()
                .with_indexer(services.indexer)
                .with_proving(services.proving)
                .build()
                .unwrap_err()
        );
    }

    #[test]
    fn standard_variants_are_in_activation_order() {
        let built = standard_variants(&WalletConfiguration::default(), &services()).unwrap();
        let versions: Vec<_> = built
            .iter()
            .map(|b| (b.variant.tag(), b.variant.since_version()))
            .collect();
        assert_eq!(
            vec![
                (VariantTag::V1, ProtocolVersion::GENESIS),
                (VariantTag::V2, V2_ACTIVATION_VERSION)
            ],
            versions
        );
        assert_eq!(V1_FEE_SCHEDULE, built[0].capabilities.transacting.fees());
        assert_eq!(V2_FEE_SCHEDULE, built[1].capabilities.transacting.fees());
    }

    #[test]
    fn configured_fee_schedule_overrides_every_variant() {
        let config = WalletConfiguration::default().with_fee_schedule(FeeSchedule::zero());
        let built = standard_variants(&config, &services()).unwrap();
        assert!(built
            .iter()
            .all(|b| b.capabilities.transacting.fees() == FeeSchedule::zero()));
    }
}
