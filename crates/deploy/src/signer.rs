//! Resolution of configured accounts into local signers.

use alloy_signer_local::{MnemonicBuilder, PrivateKeySigner, coins_bip39::English};
use anyhow::{Context, Result};

use crate::config::AccountsConfig;

/// Resolve every account configured for a network, in order.
///
/// The first signer is the one the tasks deploy with.
pub fn resolve_signers(accounts: &AccountsConfig) -> Result<Vec<PrivateKeySigner>> {
    match accounts {
        AccountsConfig::Mnemonic { mnemonic, count } => (0..*count)
            .map(|index| {
                MnemonicBuilder::<English>::default()
                    .phrase(mnemonic.as_str())
                    .index(index)
                    .context("Invalid derivation index")?
                    .build()
                    .with_context(|| format!("Failed to derive account {} from mnemonic", index))
            })
            .collect(),
        AccountsConfig::PrivateKeys { private_keys } => private_keys
            .iter()
            .enumerate()
            .map(|(index, key)| {
                key.trim()
                    .parse::<PrivateKeySigner>()
                    .with_context(|| format!("Invalid private key at index {}", index))
            })
            .collect(),
    }
}

/// Resolve the deploying signer: the first configured account.
pub fn resolve_deployer(accounts: &AccountsConfig) -> Result<PrivateKeySigner> {
    resolve_signers(accounts)?
        .into_iter()
        .next()
        .context("No accounts configured for this network")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEV_MNEMONIC;

    const ACCOUNT_0: &str = "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266";
    const ACCOUNT_1: &str = "0x70997970C51812dc3A010C7d01b50e0d17dc79C8";
    const ACCOUNT_0_KEY: &str =
        "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_mnemonic_derivation() {
        let signers = resolve_signers(&AccountsConfig::Mnemonic {
            mnemonic: DEV_MNEMONIC.to_string(),
            count: 2,
        })
        .unwrap();

        assert_eq!(signers.len(), 2);
        assert_eq!(signers[0].address().to_checksum(None), ACCOUNT_0);
        assert_eq!(signers[1].address().to_checksum(None), ACCOUNT_1);
    }

    #[test]
    fn test_private_keys() {
        let signers = resolve_signers(&AccountsConfig::PrivateKeys {
            private_keys: vec![ACCOUNT_0_KEY.to_string()],
        })
        .unwrap();

        assert_eq!(signers.len(), 1);
        assert_eq!(signers[0].address().to_checksum(None), ACCOUNT_0);
    }

    #[test]
    fn test_invalid_private_key() {
        let err = resolve_signers(&AccountsConfig::PrivateKeys {
            private_keys: vec![ACCOUNT_0_KEY.to_string(), "0x1234".to_string()],
        })
        .unwrap_err();

        assert!(err.to_string().contains("index 1"));
    }

    #[test]
    fn test_deployer_requires_an_account() {
        let err = resolve_deployer(&AccountsConfig::PrivateKeys {
            private_keys: vec![],
        })
        .unwrap_err();
        assert!(err.to_string().contains("No accounts"));

        let deployer = resolve_deployer(&AccountsConfig::Mnemonic {
            mnemonic: DEV_MNEMONIC.to_string(),
            count: 3,
        })
        .unwrap();
        assert_eq!(deployer.address().to_checksum(None), ACCOUNT_0);
    }
}
