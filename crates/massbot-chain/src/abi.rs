//! Minimal ABI encoding for the handful of calls the indexer makes.
//!
//! Every argument and return value the collection contract uses is a
//! single 32-byte word (`uint256`, `address`, `bytes32`), except the ENS
//! `name(bytes32)` return which is a dynamic `string`. A full ABI codec is
//! not needed for that.

use alloy_primitives::{Address, B256, U256, keccak256};

use crate::error::ChainError;

/// Width of one ABI word in bytes.
pub const WORD: usize = 32;

/// The 4-byte function selector for a canonical signature.
pub fn selector(signature: &str) -> [u8; 4] {
    let hash = keccak256(signature.as_bytes());
    let mut out = [0_u8; 4];
    out.copy_from_slice(hash.get(..4).unwrap_or(&[0_u8; 4]));
    out
}

/// The topic hash identifying an event signature.
pub fn event_topic(signature: &str) -> B256 {
    keccak256(signature.as_bytes())
}

/// Calldata for a function taking only word-sized arguments.
pub fn encode_call(signature: &str, args: &[B256]) -> Vec<u8> {
    let mut data = Vec::with_capacity(args.len().saturating_mul(WORD).saturating_add(4));
    data.extend_from_slice(&selector(signature));
    for arg in args {
        data.extend_from_slice(arg.as_slice());
    }
    data
}

/// Encode an unsigned integer as an ABI word.
pub fn uint_word(value: U256) -> B256 {
    B256::from(value.to_be_bytes::<WORD>())
}

/// Read the word at `index` from return data.
pub fn word_at(data: &[u8], index: usize) -> Result<&[u8], ChainError> {
    let start = index
        .checked_mul(WORD)
        .ok_or_else(|| ChainError::Decode(format!("word index {index} overflows")))?;
    let end = start
        .checked_add(WORD)
        .ok_or_else(|| ChainError::Decode(format!("word index {index} overflows")))?;
    data.get(start..end).ok_or_else(|| {
        ChainError::Decode(format!(
            "return data has {} bytes, word {index} needs {end}",
            data.len()
        ))
    })
}

/// Decode the word at `index` as `uint256`.
pub fn decode_uint(data: &[u8], index: usize) -> Result<U256, ChainError> {
    word_at(data, index).map(U256::from_be_slice)
}

/// Decode the word at `index` as an `address`.
pub fn decode_address(data: &[u8], index: usize) -> Result<Address, ChainError> {
    let word = word_at(data, index)?;
    let tail = word
        .get(12..WORD)
        .ok_or_else(|| ChainError::Decode("address word truncated".to_owned()))?;
    Ok(Address::from_slice(tail))
}

/// Decode return data consisting of a single dynamic `string`.
pub fn decode_string(data: &[u8]) -> Result<String, ChainError> {
    let offset = to_usize(decode_uint(data, 0)?)?;
    let len_bytes = data
        .get(offset..)
        .ok_or_else(|| ChainError::Decode(format!("string offset {offset} out of range")))?;
    let len = to_usize(decode_uint(len_bytes, 0)?)?;
    let start = offset
        .checked_add(WORD)
        .ok_or_else(|| ChainError::Decode("string offset overflows".to_owned()))?;
    let end = start
        .checked_add(len)
        .ok_or_else(|| ChainError::Decode("string length overflows".to_owned()))?;
    let bytes = data
        .get(start..end)
        .ok_or_else(|| ChainError::Decode(format!("string of {len} bytes truncated")))?;
    String::from_utf8(bytes.to_vec()).map_err(|e| ChainError::Decode(format!("string is not UTF-8: {e}")))
}

/// Narrow a 256-bit word to `u64`, failing if it does not fit.
pub fn to_u64(value: U256) -> Result<u64, ChainError> {
    if value > U256::from(u64::MAX) {
        return Err(ChainError::Decode(format!("{value} does not fit in 64 bits")));
    }
    Ok(value.to::<u64>())
}

/// Narrow a 256-bit word to `u32`, failing if it does not fit.
pub fn to_u32(value: U256) -> Result<u32, ChainError> {
    let wide = to_u64(value)?;
    u32::try_from(wide).map_err(|e| ChainError::Decode(format!("{wide} does not fit in 32 bits: {e}")))
}

fn to_usize(value: U256) -> Result<usize, ChainError> {
    let wide = to_u64(value)?;
    usize::try_from(wide).map_err(|e| ChainError::Decode(format!("{wide} is not a valid length: {e}")))
}
