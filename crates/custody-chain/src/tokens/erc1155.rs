use crate::{decode_call, CallContext, Chain, Contract};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use custody_types::abi::IERC1155::{self, IERC1155Calls};
use custody_types::abi::{IERC1155Receiver, ERC1155_INTERFACE_ID, ERC165_INTERFACE_ID};
use custody_types::CustodyError;
use std::collections::{HashMap, HashSet};

/// Storage layout of an [`Erc1155Token`].
#[derive(Debug, Clone, Default)]
pub struct Erc1155State {
	pub minter: Address,
	pub balances: HashMap<(U256, Address), U256>,
	pub operators: HashSet<(Address, Address)>,
}

impl Erc1155State {
	pub fn balance_of(&self, account: &Address, id: &U256) -> U256 {
		self.balances.get(&(*id, *account)).copied().unwrap_or_default()
	}

	fn move_balance(
		&mut self,
		operator: Address,
		from: Address,
		to: Address,
		id: U256,
		amount: U256,
	) -> Result<(), CustodyError> {
		if operator != from && !self.operators.contains(&(from, operator)) {
			return Err(CustodyError::Unauthorized(operator));
		}
		if to == Address::ZERO {
			return Err(CustodyError::Revert("ERC1155: transfer to the zero address".into()));
		}
		let available = self.balance_of(&from, &id);
		if available < amount {
			return Err(CustodyError::Revert(
				"ERC1155: insufficient balance for transfer".into(),
			));
		}
		self.balances.insert((id, from), available - amount);
		let credited = self.balance_of(&to, &id).saturating_add(amount);
		self.balances.insert((id, to), credited);
		Ok(())
	}
}

/// Multi-token; the deployer is the only account allowed to mint.
#[derive(Debug, Clone, Default)]
pub struct Erc1155Token;

impl Erc1155Token {
	/// Balance lookup for tests and tooling that inspect the host directly.
	pub fn balance(chain: &Chain, token: &Address, account: &Address, id: u64) -> U256 {
		chain
			.storage::<Erc1155State>(token)
			.map(|state| state.balance_of(account, &U256::from(id)))
			.unwrap_or_default()
	}

	#[allow(clippy::too_many_arguments)]
	fn check_received(
		chain: &mut Chain,
		token: Address,
		operator: Address,
		from: Address,
		to: Address,
		id: U256,
		amount: U256,
		data: Bytes,
	) -> Result<(), CustodyError> {
		if !chain.has_code(&to) {
			return Ok(());
		}
		let hook = IERC1155Receiver::onERC1155ReceivedCall {
			operator,
			from,
			id,
			value: amount,
			data,
		};
		let ret = chain.call_contract(token, to, U256::ZERO, &hook, None)?;
		if ret.selector.0 != IERC1155Receiver::onERC1155ReceivedCall::SELECTOR {
			return Err(CustodyError::Revert("ERC1155: ERC1155Receiver rejected tokens".into()));
		}
		Ok(())
	}

	#[allow(clippy::too_many_arguments)]
	fn check_batch_received(
		chain: &mut Chain,
		token: Address,
		operator: Address,
		from: Address,
		to: Address,
		ids: Vec<U256>,
		amounts: Vec<U256>,
		data: Bytes,
	) -> Result<(), CustodyError> {
		if !chain.has_code(&to) {
			return Ok(());
		}
		let hook = IERC1155Receiver::onERC1155BatchReceivedCall {
			operator,
			from,
			ids,
			values: amounts,
			data,
		};
		let ret = chain.call_contract(token, to, U256::ZERO, &hook, None)?;
		if ret.selector.0 != IERC1155Receiver::onERC1155BatchReceivedCall::SELECTOR {
			return Err(CustodyError::Revert("ERC1155: ERC1155Receiver rejected tokens".into()));
		}
		Ok(())
	}
}

impl Contract for Erc1155Token {
	fn name(&self) -> &'static str {
		"ERC1155"
	}

	fn construct(&self, chain: &mut Chain, ctx: &CallContext) -> Result<(), CustodyError> {
		let minter = ctx.caller;
		chain.store(ctx.address, |state: &mut Erc1155State| state.minter = minter)
	}

	fn execute(
		&self,
		chain: &mut Chain,
		ctx: &CallContext,
		input: &[u8],
	) -> Result<Bytes, CustodyError> {
		if !ctx.value.is_zero() {
			return Err(CustodyError::Revert("ERC1155: not payable".into()));
		}
		let Some(call) = decode_call::<IERC1155Calls>(input)? else {
			return Err(CustodyError::InvalidFallback);
		};
		let token = ctx.address;
		let operator = ctx.caller;
		let output = match call {
			IERC1155Calls::balanceOf(c) => {
				let balance = chain
					.storage::<Erc1155State>(&token)
					.map(|s| s.balance_of(&c.account, &c.id))
					.unwrap_or_default();
				IERC1155::balanceOfCall::abi_encode_returns(&(balance,))
			},
			IERC1155Calls::safeTransferFrom(c) => {
				chain.try_store(token, |state: &mut Erc1155State| {
					state.move_balance(operator, c.from, c.to, c.id, c.amount)
				})?;
				Self::check_received(chain, token, operator, c.from, c.to, c.id, c.amount, c.data)?;
				Vec::new()
			},
			IERC1155Calls::safeBatchTransferFrom(c) => {
				if c.ids.len() != c.amounts.len() {
					return Err(CustodyError::Revert(
						"ERC1155: ids and amounts length mismatch".into(),
					));
				}
				chain.try_store(token, |state: &mut Erc1155State| {
					for (id, amount) in c.ids.iter().zip(c.amounts.iter()) {
						state.move_balance(operator, c.from, c.to, *id, *amount)?;
					}
					Ok(())
				})?;
				Self::check_batch_received(
					chain, token, operator, c.from, c.to, c.ids, c.amounts, c.data,
				)?;
				Vec::new()
			},
			IERC1155Calls::setApprovalForAll(c) => {
				chain.store(token, |state: &mut Erc1155State| {
					if c.approved {
						state.operators.insert((operator, c.operator));
					} else {
						state.operators.remove(&(operator, c.operator));
					}
				})?;
				Vec::new()
			},
			IERC1155Calls::mint(c) => {
				chain.try_store(token, |state: &mut Erc1155State| {
					if operator != state.minter {
						return Err(CustodyError::Unauthorized(operator));
					}
					let credited = state.balance_of(&c.to, &c.id).saturating_add(c.amount);
					state.balances.insert((c.id, c.to), credited);
					Ok(())
				})?;
				Self::check_received(
					chain,
					token,
					operator,
					Address::ZERO,
					c.to,
					c.id,
					c.amount,
					Bytes::new(),
				)?;
				Vec::new()
			},
			IERC1155Calls::supportsInterface(c) => {
				let supported =
					c.interfaceId == ERC165_INTERFACE_ID || c.interfaceId == ERC1155_INTERFACE_ID;
				IERC1155::supportsInterfaceCall::abi_encode_returns(&(supported,))
			},
		};
		Ok(output.into())
	}
}
