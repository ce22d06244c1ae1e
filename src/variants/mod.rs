//! the protocol variants this build supports.
//!
//! Both variants run the same shielded sync loop; they differ in the
//! protocol versions they accept and in their fee schedules.  V2 takes over
//! at [V2_ACTIVATION_VERSION].

pub mod builder;
pub mod shielded;

pub use builder::standard_variants;
pub use builder::BuiltVariant;
pub use builder::VariantBuilder;
pub use builder::VariantCapabilities;
pub use builder::VariantServices;
pub use shielded::ShieldedVariant;

use crate::protocol::ledger::FeeSchedule;
use crate::protocol::ProtocolVersion;

pub const V2_ACTIVATION_VERSION: ProtocolVersion = ProtocolVersion::new(2);

pub const V1_FEE_SCHEDULE: FeeSchedule = FeeSchedule::new(10, 2, 3);
pub const V2_FEE_SCHEDULE: FeeSchedule = FeeSchedule::new(12, 1, 2);
