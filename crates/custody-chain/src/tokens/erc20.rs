use crate::{decode_call, CallContext, Chain, Contract};
use alloy_primitives::{Address, Bytes, U256};
use alloy_sol_types::SolCall;
use custody_types::abi::IERC20::{self, IERC20Calls};
use custody_types::CustodyError;
use std::collections::HashMap;

/// Storage layout of an [`Erc20Token`].
#[derive(Debug, Clone, Default)]
pub struct Erc20State {
	pub minter: Address,
	pub balances: HashMap<Address, U256>,
	pub allowances: HashMap<(Address, Address), U256>,
}

impl Erc20State {
	pub fn balance_of(&self, account: &Address) -> U256 {
		self.balances.get(account).copied().unwrap_or_default()
	}

	fn move_balance(
		&mut self,
		from: Address,
		to: Address,
		amount: U256,
	) -> Result<(), CustodyError> {
		let available = self.balance_of(&from);
		if available < amount {
			return Err(CustodyError::Revert(
				"ERC20: transfer amount exceeds balance".into(),
			));
		}
		self.balances.insert(from, available - amount);
		let credited = self.balance_of(&to).saturating_add(amount);
		self.balances.insert(to, credited);
		Ok(())
	}
}

/// Fungible token; the deployer is the only account allowed to mint.
///
/// When `return_false` is set, transfers that should fail return `false`
/// instead of reverting, like some non-compliant tokens in the wild.
#[derive(Debug, Clone, Default)]
pub struct Erc20Token {
	pub return_false: bool,
}

impl Erc20Token {
	pub fn new() -> Self {
		Self::default()
	}

	/// Balance lookup for tests and tooling that inspect the host directly.
	pub fn balance(chain: &Chain, token: &Address, account: &Address) -> U256 {
		chain
			.storage::<Erc20State>(token)
			.map(|state| state.balance_of(account))
			.unwrap_or_default()
	}

	fn transfer(
		&self,
		chain: &mut Chain,
		token: Address,
		from: Address,
		to: Address,
		amount: U256,
	) -> Result<bool, CustodyError> {
		let moved = chain.try_store(token, |state: &mut Erc20State| {
			state.move_balance(from, to, amount)
		});
		match moved {
			Ok(()) => Ok(true),
			Err(CustodyError::Revert(_)) if self.return_false => Ok(false),
			Err(e) => Err(e),
		}
	}
}

impl Contract for Erc20Token {
	fn name(&self) -> &'static str {
		"ERC20"
	}

	fn construct(&self, chain: &mut Chain, ctx: &CallContext) -> Result<(), CustodyError> {
		let minter = ctx.caller;
		chain.store(ctx.address, |state: &mut Erc20State| state.minter = minter)
	}

	fn execute(
		&self,
		chain: &mut Chain,
		ctx: &CallContext,
		input: &[u8],
	) -> Result<Bytes, CustodyError> {
		if !ctx.value.is_zero() {
			return Err(CustodyError::Revert("ERC20: not payable".into()));
		}
		let Some(call) = decode_call::<IERC20Calls>(input)? else {
			return Err(CustodyError::InvalidFallback);
		};
		let token = ctx.address;
		let output = match call {
			IERC20Calls::balanceOf(c) => {
				let balance = Self::balance(chain, &token, &c.account);
				IERC20::balanceOfCall::abi_encode_returns(&(balance,))
			},
			IERC20Calls::allowance(c) => {
				let remaining = chain
					.storage::<Erc20State>(&token)
					.and_then(|s| s.allowances.get(&(c.owner, c.spender)).copied())
					.unwrap_or_default();
				IERC20::allowanceCall::abi_encode_returns(&(remaining,))
			},
			IERC20Calls::transfer(c) => {
				let success = self.transfer(chain, token, ctx.caller, c.to, c.amount)?;
				IERC20::transferCall::abi_encode_returns(&(success,))
			},
			IERC20Calls::transferFrom(c) => {
				let spender = ctx.caller;
				let allowed = chain
					.storage::<Erc20State>(&token)
					.and_then(|s| s.allowances.get(&(c.from, spender)).copied())
					.unwrap_or_default();
				if allowed < c.amount {
					if self.return_false {
						return Ok(IERC20::transferFromCall::abi_encode_returns(&(false,)).into());
					}
					return Err(CustodyError::Revert("ERC20: insufficient allowance".into()));
				}
				let success = self.transfer(chain, token, c.from, c.to, c.amount)?;
				if success && allowed != U256::MAX {
					chain.store(token, |state: &mut Erc20State| {
						state.allowances.insert((c.from, spender), allowed - c.amount)
					})?;
				}
				IERC20::transferFromCall::abi_encode_returns(&(success,))
			},
			IERC20Calls::approve(c) => {
				let owner = ctx.caller;
				chain.store(token, |state: &mut Erc20State| {
					state.allowances.insert((owner, c.spender), c.amount)
				})?;
				IERC20::approveCall::abi_encode_returns(&(true,))
			},
			IERC20Calls::mint(c) => {
				let minter = chain
					.storage::<Erc20State>(&token)
					.map(|s| s.minter)
					.unwrap_or_default();
				if ctx.caller != minter {
					return Err(CustodyError::Unauthorized(ctx.caller));
				}
				chain.store(token, |state: &mut Erc20State| {
					let credited = state.balance_of(&c.to).saturating_add(c.amount);
					state.balances.insert(c.to, credited);
				})?;
				Vec::new()
			},
		};
		Ok(output.into())
	}
}
