use std::fmt;
use std::str::FromStr;

use serde::Deserialize;
use serde::Serialize;
use strum::EnumIter;

/// the chain a wallet operates on.
///
/// The network only affects the human-readable prefixes of encoded key
/// material, so that an address for one network can never be mistaken for an
/// address on another.
#[derive(
    Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash, Default, EnumIter, strum::EnumIs,
)]
#[non_exhaustive]
pub enum Network {
    /// Main net.
    Main,

    /// Public test network.
    Testnet,

    /// Shared development network, reset frequently.
    Devnet,

    /// Local, in-process network used by simulators and tests.
    #[default]
    Undeployed,
}

impl Network {
    fn hrp_suffix(&self) -> &'static str {
        match self {
            Self::Main => "",
            Self::Testnet => "_test",
            Self::Devnet => "_dev",
            Self::Undeployed => "_undeployed",
        }
    }

    /// human readable prefix for shielded addresses.
    pub fn address_hrp(&self) -> String {
        format!("shield_addr{}", self.hrp_suffix())
    }

    /// human readable prefix for encoded viewing keys.
    pub fn viewing_key_hrp(&self) -> String {
        format!("shield_vk{}", self.hrp_suffix())
    }
}

impl fmt::Display for Network {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let string = match self {
            Network::Main => "main",
            Network::Testnet => "testnet",
            Network::Devnet => "devnet",
            Network::Undeployed => "undeployed",
        };
        write!(f, "{}", string)
    }
}

impl FromStr for Network {
    type Err = String;
    fn from_str(input: &str) -> Result<Network, Self::Err> {
        match input {
            "main" => Ok(Network::Main),
            "testnet" => Ok(Network::Testnet),
            "devnet" => Ok(Network::Devnet),
            "undeployed" => Ok(Network::Undeployed),
            _ => Err(format!("Failed to parse {} as network", input)),
        }
    }
}

#[cfg(test)]
#[cfg_attr(coverage_nightly, coverage(off))]
mod tests {
    use std::collections::HashSet;

    use strum::IntoEnumIterator;

    use super::*;

    #[test]
    fn display_and_from_str_agree() {
        for network in Network::iter() {
            assert_eq!(network, network.to_string().parse().unwrap());
        }
        assert!("mainnet".parse::<Network>().is_err());
    }

    #[test]
    fn prefixes_are_distinct_per_network() {
        let prefixes: HashSet<_> = Network::iter()
            .flat_map(|n| [n.address_hrp(), n.viewing_key_hrp()])
            .collect();
        assert_eq!(2 * Network::iter().count(), prefixes.len());
    }
}
