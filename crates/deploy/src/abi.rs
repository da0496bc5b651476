//! Calldata encoding for constructor arguments and wiring calls.
//!
//! Every argument type the suite needs (addresses, unsigned integers,
//! 32-byte identifiers) encodes as a single static 32-byte word, so calldata
//! is built word-by-word: a 4-byte selector (for calls) followed by one word
//! per argument. Constructor arguments are the same words appended to the
//! init bytecode, with no selector.

use alloy_core::primitives::{Address, B256, Bytes, U256, keccak256};

/// Compute the 4-byte function selector for a canonical method signature,
/// e.g. `"transferOwnership(address)"`.
pub fn selector(signature: &str) -> [u8; 4] {
    let digest = keccak256(signature.as_bytes());
    [digest[0], digest[1], digest[2], digest[3]]
}

/// Number of parameters a canonical method signature declares, or `None` if
/// the signature is not of the form `name(type,...)`.
pub fn arity(signature: &str) -> Option<usize> {
    let open = signature.find('(')?;
    let inner = signature.get(open + 1..signature.len().checked_sub(1)?)?;
    if !signature.ends_with(')') || open == 0 {
        return None;
    }
    if inner.is_empty() {
        return Some(0);
    }
    if inner.split(',').any(|param| param.trim().is_empty()) {
        return None;
    }
    Some(inner.split(',').count())
}

/// Left-pad an address into a 32-byte word.
pub fn encode_address(address: Address) -> B256 {
    B256::left_padding_from(address.as_slice())
}

/// Big-endian encode an unsigned integer into a 32-byte word.
pub fn encode_uint(value: U256) -> B256 {
    B256::from(value.to_be_bytes::<32>())
}

/// Build calldata for a method call: selector followed by one word per
/// argument.
pub fn encode_call(signature: &str, words: &[B256]) -> Bytes {
    let mut data = Vec::with_capacity(4 + 32 * words.len());
    data.extend_from_slice(&selector(signature));
    for word in words {
        data.extend_from_slice(word.as_slice());
    }
    Bytes::from(data)
}

/// Append constructor argument words to init bytecode.
pub fn encode_constructor(init_code: &[u8], words: &[B256]) -> Bytes {
    let mut data = Vec::with_capacity(init_code.len() + 32 * words.len());
    data.extend_from_slice(init_code);
    for word in words {
        data.extend_from_slice(word.as_slice());
    }
    Bytes::from(data)
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum LabelError {
    #[error("label is {0} bytes; a bytes32 identifier holds at most 32")]
    TooLong(usize),
}

/// Encode a short ASCII label as a right-zero-padded bytes32 identifier,
/// matching how the gateway expects merchant ids to be formed.
pub fn bytes32_label(label: &str) -> Result<B256, LabelError> {
    let raw = label.as_bytes();
    if raw.len() > 32 {
        return Err(LabelError::TooLong(raw.len()));
    }
    let mut word = [0u8; 32];
    word[..raw.len()].copy_from_slice(raw);
    Ok(B256::from(word))
}
