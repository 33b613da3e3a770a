//! Bloom filter for probabilistic segment membership
//!
//! Double hashing over an FNV-1a base hash derives `k` bit positions modulo
//! `m`. Persisted as `{m: u32, k: u32, bits: ⌈m/8⌉ bytes}` inside each
//! segment; no false negatives, tunable false-positive rate via bits per key.

use kore_core::error::{Error, Result};

#[derive(Debug)]
pub struct BloomFilter {
    bits: Vec<u8>,
    m: u32,
    k: u32,
}

impl BloomFilter {
    /// Size a filter for `expected_keys` at `bits_per_key`. The hash count
    /// follows the optimal `k ≈ 0.69 * bits_per_key`, clamped to a
    /// practical range.
    pub fn new(expected_keys: usize, bits_per_key: usize) -> Self {
        let m = (expected_keys.max(1) * bits_per_key).max(64) as u32;
        let k = ((bits_per_key as f64 * 0.69) as u32).clamp(1, 8);
        Self {
            bits: vec![0u8; m.div_ceil(8) as usize],
            m,
            k,
        }
    }

    pub fn add(&mut self, key: &[u8]) {
        let hash = base_hash(key);
        for i in 0..self.k {
            let bit = self.bit_position(hash, i);
            self.bits[(bit / 8) as usize] |= 1 << (bit % 8);
        }
    }

    /// `false` means definitely absent; `true` means possibly present.
    pub fn maybe_contains(&self, key: &[u8]) -> bool {
        let hash = base_hash(key);
        for i in 0..self.k {
            let bit = self.bit_position(hash, i);
            if self.bits[(bit / 8) as usize] & (1 << (bit % 8)) == 0 {
                return false;
            }
        }
        true
    }

    /// Serialized length: 8-byte header plus the bit array.
    pub fn encoded_len(&self) -> usize {
        8 + self.bits.len()
    }

    /// Append `{m, k, bits}` to `out`.
    pub fn encode_into(&self, out: &mut Vec<u8>) {
        out.extend_from_slice(&self.m.to_le_bytes());
        out.extend_from_slice(&self.k.to_le_bytes());
        out.extend_from_slice(&self.bits);
    }

    /// Parse a filter from the bloom section of a segment.
    pub fn decode(data: &[u8]) -> Result<Self> {
        if data.len() < 8 {
            return Err(Error::Codec {
                message: "bloom filter header too short".to_string(),
            });
        }
        let m = u32::from_le_bytes(data[0..4].try_into().map_err(|_| bloom_codec_err())?);
        let k = u32::from_le_bytes(data[4..8].try_into().map_err(|_| bloom_codec_err())?);
        let byte_len = m.div_ceil(8) as usize;
        if m == 0 || k == 0 || data.len() < 8 + byte_len {
            return Err(Error::Codec {
                message: format!("bloom filter truncated: m={m} k={k} len={}", data.len()),
            });
        }
        Ok(Self {
            bits: data[8..8 + byte_len].to_vec(),
            m,
            k,
        })
    }

    fn bit_position(&self, hash: u64, i: u32) -> u32 {
        let h1 = hash as u32;
        let h2 = (hash >> 32) as u32;
        h1.wrapping_add(i.wrapping_mul(h2)) % self.m
    }
}

/// FNV-1a over the key bytes.
fn base_hash(key: &[u8]) -> u64 {
    let mut hash = 0xcbf29ce484222325u64;
    for &byte in key {
        hash ^= byte as u64;
        hash = hash.wrapping_mul(0x100000001b3);
    }
    hash
}

fn bloom_codec_err() -> Error {
    Error::Codec {
        message: "bloom filter header malformed".to_string(),
    }
}
