//! Token contracts and typed call helpers.
//!
//! The custody contracts move ERC20, ERC721 and ERC1155 assets exclusively
//! through message calls. This module hosts reference token implementations
//! that follow the standards closely enough for that (including the receiver
//! hooks on safe transfers) and the helpers contracts use to call any token.

use crate::Chain;
use alloy_primitives::{Address, Bytes, FixedBytes, U256};
use alloy_sol_types::SolCall;
use custody_types::abi::{IERC1155, IERC165, IERC20, IERC721};
use custody_types::CustodyError;

mod erc1155;
mod erc20;
mod erc721;

pub use erc1155::{Erc1155State, Erc1155Token};
pub use erc20::{Erc20State, Erc20Token};
pub use erc721::{Erc721State, Erc721Token};

fn require_code(chain: &Chain, token: Address) -> Result<(), CustodyError> {
	if chain.has_code(&token) {
		Ok(())
	} else {
		Err(CustodyError::Revert(format!("token {} has no code", token)))
	}
}

/// Reads the ERC20 balance of `account` from inside a contract call.
pub fn erc20_balance_of(
	chain: &mut Chain,
	caller: Address,
	token: Address,
	account: Address,
) -> Result<U256, CustodyError> {
	require_code(chain, token)?;
	let ret = chain.call_contract(
		caller,
		token,
		U256::ZERO,
		&IERC20::balanceOfCall { account },
		None,
	)?;
	Ok(ret.balance)
}

/// Transfers ERC20 tokens held by `caller`.
///
/// Tokens that return nothing are treated as successful; tokens that return
/// `false` make the transfer fail.
pub fn erc20_transfer(
	chain: &mut Chain,
	caller: Address,
	token: Address,
	to: Address,
	amount: U256,
) -> Result<(), CustodyError> {
	require_code(chain, token)?;
	let input = IERC20::transferCall { to, amount }.abi_encode();
	let output = chain.call(caller, token, U256::ZERO, &input, None)?;
	check_bool_return(&output, "transfer")
}

/// Moves ERC20 tokens from `from` using the allowance granted to `caller`.
pub fn erc20_transfer_from(
	chain: &mut Chain,
	caller: Address,
	token: Address,
	from: Address,
	to: Address,
	amount: U256,
) -> Result<(), CustodyError> {
	require_code(chain, token)?;
	let input = IERC20::transferFromCall { from, to, amount }.abi_encode();
	let output = chain.call(caller, token, U256::ZERO, &input, None)?;
	check_bool_return(&output, "transferFrom")
}

fn check_bool_return(output: &Bytes, method: &str) -> Result<(), CustodyError> {
	if output.is_empty() {
		return Ok(());
	}
	let success = match method {
		"transferFrom" => IERC20::transferFromCall::abi_decode_returns(output, true)?.success,
		_ => IERC20::transferCall::abi_decode_returns(output, true)?.success,
	};
	if success {
		Ok(())
	} else {
		Err(CustodyError::Revert(format!("token {} returned false", method)))
	}
}

/// Reads the owner of an ERC721 token.
pub fn erc721_owner_of(
	chain: &mut Chain,
	caller: Address,
	token: Address,
	token_id: U256,
) -> Result<Address, CustodyError> {
	require_code(chain, token)?;
	let ret = chain.call_contract(
		caller,
		token,
		U256::ZERO,
		&IERC721::ownerOfCall { tokenId: token_id },
		None,
	)?;
	Ok(ret.owner)
}

/// Safe-transfers an ERC721 token, running the recipient hook.
pub fn erc721_safe_transfer_from(
	chain: &mut Chain,
	caller: Address,
	token: Address,
	from: Address,
	to: Address,
	token_id: U256,
) -> Result<(), CustodyError> {
	require_code(chain, token)?;
	let input = IERC721::safeTransferFromCall {
		from,
		to,
		tokenId: token_id,
		data: Bytes::new(),
	}
	.abi_encode();
	chain.call(caller, token, U256::ZERO, &input, None)?;
	Ok(())
}

/// Reads an ERC1155 balance.
pub fn erc1155_balance_of(
	chain: &mut Chain,
	caller: Address,
	token: Address,
	account: Address,
	id: U256,
) -> Result<U256, CustodyError> {
	require_code(chain, token)?;
	let ret = chain.call_contract(
		caller,
		token,
		U256::ZERO,
		&IERC1155::balanceOfCall { account, id },
		None,
	)?;
	Ok(ret.balance)
}

/// Safe-transfers one ERC1155 id, running the recipient hook.
pub fn erc1155_safe_transfer_from(
	chain: &mut Chain,
	caller: Address,
	token: Address,
	from: Address,
	to: Address,
	id: U256,
	amount: U256,
) -> Result<(), CustodyError> {
	require_code(chain, token)?;
	let input = IERC1155::safeTransferFromCall {
		from,
		to,
		id,
		amount,
		data: Bytes::new(),
	}
	.abi_encode();
	chain.call(caller, token, U256::ZERO, &input, None)?;
	Ok(())
}

/// Safe-transfers several ERC1155 ids at once, running the batch recipient hook.
pub fn erc1155_safe_batch_transfer_from(
	chain: &mut Chain,
	caller: Address,
	token: Address,
	from: Address,
	to: Address,
	ids: Vec<U256>,
	amounts: Vec<U256>,
) -> Result<(), CustodyError> {
	require_code(chain, token)?;
	let input = IERC1155::safeBatchTransferFromCall {
		from,
		to,
		ids,
		amounts,
		data: Bytes::new(),
	}
	.abi_encode();
	chain.call(caller, token, U256::ZERO, &input, None)?;
	Ok(())
}

/// ERC165 probe; any failure counts as "not supported".
pub fn supports_interface(
	chain: &mut Chain,
	caller: Address,
	target: Address,
	interface_id: FixedBytes<4>,
) -> bool {
	if !chain.has_code(&target) {
		return false;
	}
	chain
		.call_contract(
			caller,
			target,
			U256::ZERO,
			&IERC165::supportsInterfaceCall {
				interfaceId: interface_id,
			},
			None,
		)
		.map(|ret| ret.supported)
		.unwrap_or(false)
}
