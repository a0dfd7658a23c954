//! Reverse alias resolution through the ENS registry.
//!
//! An address has an alias when the reverse node
//! `<hex-address>.addr.reverse` points to a resolver whose `name` record
//! is set, and that name resolves forward to the same address. The forward
//! check stops anyone from claiming an arbitrary name in their reverse
//! record.

use alloy_primitives::{Address, B256, hex, keccak256};

use crate::abi;
use crate::error::ChainError;
use crate::rpc::JsonRpcClient;

const RESOLVER: &str = "resolver(bytes32)";
const NAME: &str = "name(bytes32)";
const ADDR: &str = "addr(bytes32)";

/// The EIP-137 namehash of a dotted name.
pub fn namehash(name: &str) -> B256 {
    if name.is_empty() {
        return B256::ZERO;
    }
    name.rsplit('.').fold(B256::ZERO, |node, label| {
        let label_hash = keccak256(label.as_bytes());
        keccak256([node.as_slice(), label_hash.as_slice()].concat())
    })
}

/// The reverse-registrar name for an address.
pub fn reverse_name(address: Address) -> String {
    format!("{}.addr.reverse", hex::encode(address))
}

/// Look up the verified primary name of `address`.
///
/// Returns `Ok(None)` when any link of the chain is unset.
pub async fn reverse_lookup(
    rpc: &JsonRpcClient,
    registry: Address,
    address: Address,
) -> Result<Option<String>, ChainError> {
    let reverse_node = namehash(&reverse_name(address));
    let Some(reverse_resolver) = resolver_of(rpc, registry, reverse_node).await? else {
        return Ok(None);
    };

    let data = rpc
        .eth_call(reverse_resolver, &abi::encode_call(NAME, &[reverse_node]))
        .await?;
    let name = abi::decode_string(&data)?;
    if name.is_empty() {
        return Ok(None);
    }

    let forward_node = namehash(&name);
    let Some(forward_resolver) = resolver_of(rpc, registry, forward_node).await? else {
        return Ok(None);
    };
    let data = rpc
        .eth_call(forward_resolver, &abi::encode_call(ADDR, &[forward_node]))
        .await?;
    let resolved = abi::decode_address(&data, 0)?;

    Ok((resolved == address).then_some(name))
}

async fn resolver_of(
    rpc: &JsonRpcClient,
    registry: Address,
    node: B256,
) -> Result<Option<Address>, ChainError> {
    let data = rpc
        .eth_call(registry, &abi::encode_call(RESOLVER, &[node]))
        .await?;
    let resolver = abi::decode_address(&data, 0)?;
    Ok((resolver != Address::ZERO).then_some(resolver))
}
