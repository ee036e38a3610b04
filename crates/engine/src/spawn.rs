//! Deterministic token spawning.
//!
//! A cell's default token depends only on its coordinates and the configured
//! salts, so the untouched world never needs to be stored.

use sha2::{Digest, Sha256};
use worldofbits_protocol::{GridCell, Token};

use crate::config::GameConfig;

/// Hashes `key` to a float in `[0, 1)`.
pub fn luck(key: &str) -> f64 {
    let digest = Sha256::digest(key.as_bytes());
    let mut head = [0u8; 8];
    head.copy_from_slice(&digest[..8]);
    // 53 bits is the f64 mantissa; anything wider could round up to 1.0.
    let bits = u64::from_be_bytes(head) >> 11;
    bits as f64 / (1u64 << 53) as f64
}

fn cell_luck(cell: GridCell, salt: &str) -> f64 {
    luck(&format!("{cell}:{salt}"))
}

/// The token a cell holds before anyone has touched it.
pub fn spawn(config: &GameConfig, cell: GridCell) -> Option<Token> {
    if cell_luck(cell, &config.spawn_salt) >= config.spawn_probability {
        return None;
    }
    let n = config.base_values.len();
    if n == 0 {
        return None;
    }
    let idx = ((cell_luck(cell, &config.value_salt) * n as f64) as usize).min(n - 1);
    Some(config.base_values[idx])
}
