use anyhow::{anyhow, Result};
use solana_sdk::pubkey::Pubkey;
use solana_sdk::signature::Keypair;
use std::path::Path;
use std::str::FromStr;
use tracing::info;

pub struct KeyUtils;

impl KeyUtils {
    pub fn parse_pubkey(pubkey_str: &str) -> Result<Pubkey> {
        let trimmed = pubkey_str.trim();
        Pubkey::from_str(trimmed).map_err(|e| anyhow!("Invalid public key '{}': {}", trimmed, e))
    }

    /// Loads a keypair stored as a JSON array of 64 bytes (Solana CLI format).
    pub fn load_keypair_from_file(filepath: impl AsRef<Path>) -> Result<Keypair> {
        let filepath = filepath.as_ref();
        info!("Loading keypair from file: {}", filepath.display());

        let file_contents = std::fs::read_to_string(filepath)
            .map_err(|e| anyhow!("Failed to read keypair file '{}': {}", filepath.display(), e))?;

        let bytes: Vec<u8> = serde_json::from_str(&file_contents)
            .map_err(|e| anyhow!("Failed to parse keypair JSON: {}", e))?;

        if bytes.len() != 64 {
            return Err(anyhow!("Invalid keypair file: expected 64 bytes, got {}", bytes.len()));
        }

        Self::keypair_from_secret(&bytes[..32])
    }

    /// Decodes a base58 private key holding either the 32-byte secret or the 64-byte keypair.
    pub fn keypair_from_base58(private_key: &str) -> Result<Keypair> {
        let key_bytes = bs58::decode(private_key.trim())
            .into_vec()
            .map_err(|e| anyhow!("Invalid base58 private key: {}", e))?;

        match key_bytes.len() {
            64 => Self::keypair_from_secret(&key_bytes[..32]),
            32 => Self::keypair_from_secret(&key_bytes),
            n => Err(anyhow!("Invalid private key length: expected 32 or 64 bytes, got {}", n)),
        }
    }

    fn keypair_from_secret(secret: &[u8]) -> Result<Keypair> {
        let mut secret_key = [0u8; 32];
        secret_key.copy_from_slice(secret);
        Ok(Keypair::new_from_array(secret_key))
    }
}
