use crate::{decode_call, CallContext, Chain, Contract};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use custody_types::abi::IERC721::{self, IERC721Calls};
use custody_types::abi::{IERC721Receiver, ERC165_INTERFACE_ID, ERC721_INTERFACE_ID};
use custody_types::CustodyError;
use std::collections::{HashMap, HashSet};

/// Storage layout of an [`Erc721Token`].
#[derive(Debug, Clone, Default)]
pub struct Erc721State {
	pub minter: Address,
	pub owners: HashMap<U256, Address>,
	pub balances: HashMap<Address, U256>,
	pub operators: HashSet<(Address, Address)>,
}

impl Erc721State {
	fn owner_of(&self, token_id: &U256) -> Result<Address, CustodyError> {
		self.owners
			.get(token_id)
			.copied()
			.ok_or_else(|| CustodyError::Revert(format!("ERC721: invalid token ID {}", token_id)))
	}

	fn move_token(
		&mut self,
		operator: Address,
		from: Address,
		to: Address,
		token_id: U256,
	) -> Result<(), CustodyError> {
		if self.owner_of(&token_id)? != from {
			return Err(CustodyError::Revert("ERC721: transfer from incorrect owner".into()));
		}
		if operator != from && !self.operators.contains(&(from, operator)) {
			return Err(CustodyError::Unauthorized(operator));
		}
		if to == Address::ZERO {
			return Err(CustodyError::Revert("ERC721: transfer to the zero address".into()));
		}
		self.owners.insert(token_id, to);
		let from_balance = self.balances.get(&from).copied().unwrap_or_default();
		self.balances.insert(from, from_balance.saturating_sub(U256::from(1)));
		let to_balance = self.balances.get(&to).copied().unwrap_or_default();
		self.balances.insert(to, to_balance + U256::from(1));
		Ok(())
	}
}

/// Non-fungible token; the deployer is the only account allowed to mint.
#[derive(Debug, Clone, Default)]
pub struct Erc721Token;

impl Erc721Token {
	/// Owner lookup for tests and tooling that inspect the host directly.
	pub fn owner(chain: &Chain, token: &Address, token_id: &U256) -> Option<Address> {
		chain
			.storage::<Erc721State>(token)
			.and_then(|state| state.owners.get(token_id).copied())
	}

	fn check_received(
		chain: &mut Chain,
		token: Address,
		operator: Address,
		from: Address,
		to: Address,
		token_id: U256,
		data: Bytes,
	) -> Result<(), CustodyError> {
		if !chain.has_code(&to) {
			return Ok(());
		}
		let hook = IERC721Receiver::onERC721ReceivedCall {
			operator,
			from,
			tokenId: token_id,
			data,
		};
		let ret = chain.call_contract(token, to, U256::ZERO, &hook, None)?;
		if ret.selector.0 != IERC721Receiver::onERC721ReceivedCall::SELECTOR {
			return Err(CustodyError::Revert(
				"ERC721: transfer to non ERC721Receiver implementer".into(),
			));
		}
		Ok(())
	}
}

impl Contract for Erc721Token {
	fn name(&self) -> &'static str {
		"ERC721"
	}

	fn construct(&self, chain: &mut Chain, ctx: &CallContext) -> Result<(), CustodyError> {
		let minter = ctx.caller;
		chain.store(ctx.address, |state: &mut Erc721State| state.minter = minter)
	}

	fn execute(
		&self,
		chain: &mut Chain,
		ctx: &CallContext,
		input: &[u8],
	) -> Result<Bytes, CustodyError> {
		if !ctx.value.is_zero() {
			return Err(CustodyError::Revert("ERC721: not payable".into()));
		}
		let Some(call) = decode_call::<IERC721Calls>(input)? else {
			return Err(CustodyError::InvalidFallback);
		};
		let token = ctx.address;
		let operator = ctx.caller;
		let output = match call {
			IERC721Calls::ownerOf(c) => {
				let owner = chain
					.storage::<Erc721State>(&token)
					.ok_or_else(|| CustodyError::Revert("ERC721: invalid token ID".into()))?
					.owner_of(&c.tokenId)?;
				IERC721::ownerOfCall::abi_encode_returns(&(owner,))
			},
			IERC721Calls::balanceOf(c) => {
				let balance = chain
					.storage::<Erc721State>(&token)
					.and_then(|s| s.balances.get(&c.owner).copied())
					.unwrap_or_default();
				IERC721::balanceOfCall::abi_encode_returns(&(balance,))
			},
			IERC721Calls::safeTransferFrom(c) => {
				chain.try_store(token, |state: &mut Erc721State| {
					state.move_token(operator, c.from, c.to, c.tokenId)
				})?;
				Self::check_received(chain, token, operator, c.from, c.to, c.tokenId, c.data)?;
				Vec::new()
			},
			IERC721Calls::transferFrom(c) => {
				chain.try_store(token, |state: &mut Erc721State| {
					state.move_token(operator, c.from, c.to, c.tokenId)
				})?;
				Vec::new()
			},
			IERC721Calls::setApprovalForAll(c) => {
				chain.store(token, |state: &mut Erc721State| {
					if c.approved {
						state.operators.insert((operator, c.operator));
					} else {
						state.operators.remove(&(operator, c.operator));
					}
				})?;
				Vec::new()
			},
			IERC721Calls::mint(c) => {
				chain.try_store(token, |state: &mut Erc721State| {
					if operator != state.minter {
						return Err(CustodyError::Unauthorized(operator));
					}
					if state.owners.contains_key(&c.tokenId) {
						return Err(CustodyError::Revert("ERC721: token already minted".into()));
					}
					state.owners.insert(c.tokenId, c.to);
					let balance = state.balances.get(&c.to).copied().unwrap_or_default();
					state.balances.insert(c.to, balance + U256::from(1));
					Ok(())
				})?;
				Self::check_received(
					chain,
					token,
					operator,
					Address::ZERO,
					c.to,
					c.tokenId,
					Bytes::new(),
				)?;
				Vec::new()
			},
			IERC721Calls::supportsInterface(c) => {
				let supported =
					c.interfaceId == ERC165_INTERFACE_ID || c.interfaceId == ERC721_INTERFACE_ID;
				IERC721::supportsInterfaceCall::abi_encode_returns(&(supported,))
			},
		};
		Ok(output.into())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::RejectingReceiver;
	use crate::Transaction;
	use std::sync::Arc;

	fn mint(chain: &mut Chain, minter: Address, token: Address, to: Address, id: u64) {
		chain
			.transact(Transaction::call(
				minter,
				token,
				IERC721::mintCall { to, tokenId: U256::from(id) }.abi_encode(),
			))
			.unwrap();
	}

	#[test]
	fn test_safe_transfer_moves_ownership() {
		let mut chain = Chain::with_timestamp(1);
		let minter = Address::repeat_byte(1);
		let alice = Address::repeat_byte(2);
		let bob = Address::repeat_byte(3);
		let token = chain.deploy(minter, Arc::new(Erc721Token)).unwrap();
		mint(&mut chain, minter, token, alice, 7);

		chain
			.transact(Transaction::call(
				alice,
				token,
				IERC721::safeTransferFromCall {
					from: alice,
					to: bob,
					tokenId: U256::from(7),
					data: Bytes::new(),
				}
				.abi_encode(),
			))
			.unwrap();
		assert_eq!(Erc721Token::owner(&chain, &token, &U256::from(7)), Some(bob));
	}

	#[test]
	fn test_safe_transfer_to_non_receiver_reverts() {
		let mut chain = Chain::with_timestamp(1);
		let minter = Address::repeat_byte(1);
		let alice = Address::repeat_byte(2);
		let token = chain.deploy(minter, Arc::new(Erc721Token)).unwrap();
		let sink = chain.deploy(minter, Arc::new(RejectingReceiver)).unwrap();
		mint(&mut chain, minter, token, alice, 1);

		let result = chain.transact(Transaction::call(
			alice,
			token,
			IERC721::safeTransferFromCall {
				from: alice,
				to: sink,
				tokenId: U256::from(1),
				data: Bytes::new(),
			}
			.abi_encode(),
		));
		assert!(result.is_err());
		assert_eq!(Erc721Token::owner(&chain, &token, &U256::from(1)), Some(alice));
	}
}
