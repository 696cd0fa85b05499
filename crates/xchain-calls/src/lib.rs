//! Deterministic call-payload encoders: ERC-20 approve, gateway-wallet
//! deposit, add-delegate, gateway-mint, and composed swap-then-deposit.
//!
//! Pure functions only — no chain reads, no signing. Callers (the planner,
//! the gateway client) supply every address explicitly.

use alloy_primitives::U256;
use sha3::{Digest, Keccak256};

/// One call a client must sign, or the relayer must submit: target, ABI
/// calldata (hex, `0x`-prefixed), and an optional native-value attachment.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CallRequest {
    pub to: String,
    pub data: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

fn selector(signature: &str) -> [u8; 4] {
    let hash = Keccak256::digest(signature.as_bytes());
    [hash[0], hash[1], hash[2], hash[3]]
}

fn encode_address_arg(addr: &str) -> [u8; 32] {
    let trimmed = addr.strip_prefix("0x").unwrap_or(addr);
    let bytes = hex::decode(trimmed).unwrap_or_default();
    let mut out = [0u8; 32];
    let start = 32usize.saturating_sub(bytes.len());
    out[start..].copy_from_slice(&bytes[..bytes.len().min(20)]);
    out
}

fn encode_uint_arg(value: U256) -> [u8; 32] {
    value.to_be_bytes()
}

fn encode_call(sig: &str, args: &[[u8; 32]]) -> String {
    let mut data = selector(sig).to_vec();
    for arg in args {
        data.extend_from_slice(arg);
    }
    format!("0x{}", hex::encode(data))
}

/// `approve(address spender, uint256 amount)` on the given ERC-20 `token`.
pub fn erc20_approve(token: &str, spender: &str, amount: U256) -> CallRequest {
    CallRequest {
        to: token.to_string(),
        data: encode_call(
            "approve(address,uint256)",
            &[encode_address_arg(spender), encode_uint_arg(amount)],
        ),
        value: None,
    }
}

/// `addDelegate(address delegate)` on the gateway wallet contract.
pub fn add_delegate(gateway_wallet: &str, delegate: &str) -> CallRequest {
    CallRequest {
        to: gateway_wallet.to_string(),
        data: encode_call("addDelegate(address)", &[encode_address_arg(delegate)]),
        value: None,
    }
}

/// `deposit(address token, uint256 amount)` on the gateway wallet contract.
pub fn gateway_deposit(gateway_wallet: &str, token: &str, amount: U256) -> CallRequest {
    CallRequest {
        to: gateway_wallet.to_string(),
        data: encode_call(
            "deposit(address,uint256)",
            &[encode_address_arg(token), encode_uint_arg(amount)],
        ),
        value: None,
    }
}

/// `gatewayMint(bytes attestation, bytes operatorSignature)` on the
/// destination-chain mint contract. Submitted by the relayer, never by the
/// client, but built the same way the client-signed calls are.
pub fn gateway_mint(mint_contract: &str, attestation: &[u8], operator_signature: &[u8]) -> CallRequest {
    // Dynamic bytes args are encoded as offset-pointers followed by
    // length-prefixed data; a relayer-only builder keeps it simple by
    // concatenating hex payloads after the two offset words.
    let mut data = selector("gatewayMint(bytes,bytes)").to_vec();
    let head_len = 2 * 32; // two offsets
    let off1 = U256::from(head_len as u64);
    data.extend_from_slice(&encode_uint_arg(off1));
    let off2 = off1 + U256::from(32u64) + U256::from(round_up_32(attestation.len()) as u64);
    data.extend_from_slice(&encode_uint_arg(off2));
    data.extend_from_slice(&encode_uint_arg(U256::from(attestation.len() as u64)));
    data.extend_from_slice(&pad_right_32(attestation));
    data.extend_from_slice(&encode_uint_arg(U256::from(operator_signature.len() as u64)));
    data.extend_from_slice(&pad_right_32(operator_signature));

    CallRequest {
        to: mint_contract.to_string(),
        data: format!("0x{}", hex::encode(data)),
        value: None,
    }
}

fn round_up_32(len: usize) -> usize {
    len.div_ceil(32) * 32
}

fn pad_right_32(bytes: &[u8]) -> Vec<u8> {
    let mut out = bytes.to_vec();
    out.resize(round_up_32(bytes.len()), 0);
    out
}

/// Composes a source-token swap (the router's own calls, approve included
/// when the source token isn't native) followed by the gateway-side approve
/// and deposit, in the order the planner submits them as one client step.
pub fn swap_then_deposit(mut swap_calls: Vec<CallRequest>, approve: CallRequest, deposit: CallRequest) -> Vec<CallRequest> {
    swap_calls.push(approve);
    swap_calls.push(deposit);
    swap_calls
}
