//! End-to-end flows across factories, wallets, forwarders and the Batcher.

use crate::{Protocol, ProtocolBuilder};
use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_signer::SignerSync;
use alloy_signer_local::PrivateKeySigner;
use alloy_sol_types::SolCall;
use custody_chain::tokens::{Erc1155Token, Erc20Token, Erc721Token};
use custody_chain::{Chain, Transaction};
use custody_config::{Config, ConfigBuilder};
use custody_forwarder::ForwarderSettings;
use custody_types::abi::{IBatcher, IERC1155, IERC20, IERC721, IForwarder, IWalletSimple};
use custody_types::{CustodyError, CustodyEvent, NativeOperation, Operation};
use std::sync::Arc;

const NOW: u64 = 1_700_000_000;

const KEYS: [&str; 3] = [
	"0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
	"0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d",
	"0x5de4111afa1a4b94908f83103eb1f1706367c2e68ca870fc3fb9a804cdab365a",
];

struct Deployment {
	chain: Chain,
	protocol: Protocol,
	keys: Vec<PrivateKeySigner>,
}

impl Deployment {
	fn new(config: Config) -> Self {
		let builder = ProtocolBuilder::new(config);
		let mut chain = builder.chain();
		let protocol = builder.build(&mut chain, Address::repeat_byte(0xde)).unwrap();
		let keys = KEYS.iter().map(|k| k.parse().unwrap()).collect();
		Self {
			chain,
			protocol,
			keys,
		}
	}

	fn signers(&self) -> Vec<Address> {
		self.keys.iter().map(|k| k.address()).collect()
	}

	fn create_wallet(&mut self, salt: B256) -> Address {
		let signers = self.signers();
		self.protocol
			.create_wallet(&mut self.chain, Address::repeat_byte(0xaa), signers, salt)
			.unwrap()
	}

	fn sign(&self, key: usize, operation: &Operation) -> Bytes {
		let hash = self.protocol.operation_hash(operation);
		Bytes::copy_from_slice(&self.keys[key].sign_hash_sync(&hash).unwrap().as_bytes())
	}

	fn send(
		&mut self,
		wallet: Address,
		to: Address,
		value: u64,
		sequence_id: u64,
	) -> Result<(), CustodyError> {
		let op = NativeOperation {
			to,
			value: U256::from(value),
			data: Bytes::new(),
			expire_time: NOW + 3_600,
			sequence_id,
		};
		let signature = self.sign(1, &op.clone().into());
		let call = IWalletSimple::sendMultiSigCall {
			toAddress: to,
			value: op.value,
			data: op.data,
			expireTime: U256::from(op.expire_time),
			sequenceId: U256::from(sequence_id),
			signature,
		};
		let sender = self.keys[0].address();
		self.chain
			.transact(Transaction::call(sender, wallet, call.abi_encode()))
			.map(|_| ())
	}
}

fn config() -> Config {
	ConfigBuilder::new().timestamp(NOW).build()
}

#[test]
fn test_wallet_clone_send_and_replay() {
	let mut d = Deployment::new(config());
	let salt = B256::repeat_byte(1);
	let predicted = d.protocol.predict_wallet(&d.signers(), &salt);
	let wallet = d.create_wallet(salt);
	assert_eq!(wallet, predicted);

	d.chain.fund(wallet, U256::from(2_000));
	let destination = Address::repeat_byte(0x05);
	d.send(wallet, destination, 50, 1).unwrap();
	assert_eq!(d.chain.balance(&wallet), U256::from(1_950));
	assert_eq!(d.chain.balance(&destination), U256::from(50));

	assert_eq!(
		d.send(wallet, destination, 50, 1).unwrap_err(),
		CustodyError::SequenceIdAlreadyUsed(1)
	);
	assert_eq!(d.chain.balance(&wallet), U256::from(1_950));
	assert_eq!(d.chain.balance(&destination), U256::from(50));
}

#[test]
fn test_expiry_follows_chain_clock() {
	let mut d = Deployment::new(config());
	let wallet = d.create_wallet(B256::ZERO);
	d.chain.fund(wallet, U256::from(100));
	let destination = Address::repeat_byte(0x05);

	// Signed for NOW + 3600; an hour later it is no longer valid.
	d.chain.advance_time(3_600);
	assert_eq!(
		d.send(wallet, destination, 10, 1).unwrap_err(),
		CustodyError::Expired {
			expire_time: NOW + 3_600,
			now: NOW + 3_600
		}
	);

	// The rejected attempt consumed nothing, so the same ID still works.
	d.chain.set_timestamp(NOW);
	d.send(wallet, destination, 10, 1).unwrap();
	let events: Vec<_> = d.chain.events_from(&wallet).map(|e| e.name()).collect();
	assert_eq!(events, vec!["Transacted"]);
}

#[test]
fn test_gas_limited_transaction_leaves_no_trace() {
	let mut d = Deployment::new(config());
	let wallet = d.create_wallet(B256::ZERO);
	d.chain.fund(wallet, U256::from(100));
	let op = NativeOperation {
		to: Address::repeat_byte(0x05),
		value: U256::from(10),
		data: Bytes::new(),
		expire_time: NOW + 60,
		sequence_id: 1,
	};
	let call = IWalletSimple::sendMultiSigCall {
		toAddress: op.to,
		value: op.value,
		data: Bytes::new(),
		expireTime: U256::from(op.expire_time),
		sequenceId: U256::from(1),
		signature: d.sign(1, &op.clone().into()),
	};
	let sender = d.keys[0].address();
	let tx = Transaction::call(sender, wallet, call.abi_encode());

	let err = d.chain.transact(tx.clone().with_gas_limit(30_000)).unwrap_err();
	assert_eq!(err.root_cause(), &CustodyError::OutOfGas);
	assert_eq!(d.chain.balance(&wallet), U256::from(100));

	d.chain.transact(tx).unwrap();
	assert_eq!(d.chain.balance(&op.to), U256::from(10));
}

#[test]
fn test_same_signers_and_salt_cannot_deploy_twice() {
	let mut d = Deployment::new(config());
	let salt = B256::repeat_byte(1);
	let wallet = d.create_wallet(salt);
	let signers = d.signers();
	let err = d
		.protocol
		.create_wallet(&mut d.chain, Address::repeat_byte(0xaa), signers, salt)
		.unwrap_err();
	assert_eq!(err, CustodyError::AlreadyDeployed(wallet));

	let other = d.create_wallet(B256::repeat_byte(2));
	assert_ne!(other, wallet);
}

#[test]
fn test_signatures_do_not_cross_deployments() {
	let mut ether = Deployment::new(config());
	let mut polygon =
		Deployment::new(ConfigBuilder::new().timestamp(NOW).flavor("polygon").build());
	let ether_wallet = ether.create_wallet(B256::ZERO);
	let polygon_wallet = polygon.create_wallet(B256::ZERO);
	polygon.chain.fund(polygon_wallet, U256::from(100));

	// Signed under the ether prefixes, submitted to the polygon wallet.
	let op = NativeOperation {
		to: Address::repeat_byte(0x05),
		value: U256::from(10),
		data: Bytes::new(),
		expire_time: NOW + 60,
		sequence_id: 1,
	};
	let call = IWalletSimple::sendMultiSigCall {
		toAddress: op.to,
		value: op.value,
		data: Bytes::new(),
		expireTime: U256::from(op.expire_time),
		sequenceId: U256::from(1),
		signature: ether.sign(1, &op.clone().into()),
	};
	let sender = polygon.keys[0].address();
	let err = polygon
		.chain
		.transact(Transaction::call(sender, polygon_wallet, call.abi_encode()))
		.unwrap_err();
	assert!(matches!(err, CustodyError::InvalidSigner(_)));
	assert_ne!(ether_wallet, Address::ZERO);
}

#[test]
fn test_forwarder_deposits_reach_wallet() {
	let mut d = Deployment::new(config());
	let wallet = d.create_wallet(B256::ZERO);
	let salt = B256::repeat_byte(9);
	let predicted = d.protocol.predict_forwarder(&wallet, None, &salt);

	// Funds sent before the forwarder exists are swept at creation.
	d.chain.fund(predicted, U256::from(7));
	let forwarder = d
		.protocol
		.create_forwarder(&mut d.chain, Address::repeat_byte(0xaa), wallet, None, salt)
		.unwrap();
	assert_eq!(forwarder, predicted);
	assert_eq!(d.chain.balance(&wallet), U256::from(7));

	let depositor = Address::repeat_byte(0x44);
	d.chain.fund(depositor, U256::from(100));
	let receipt = d
		.chain
		.transact(Transaction::transfer(depositor, forwarder, U256::from(100)))
		.unwrap();
	assert_eq!(d.chain.balance(&wallet), U256::from(107));
	let names: Vec<_> = receipt.logs.iter().map(|l| l.event.name()).collect();
	assert_eq!(names, vec!["ForwarderDeposited", "Deposited"]);
	assert!(matches!(
		&receipt.logs[1].event,
		CustodyEvent::Deposited { from, .. } if *from == forwarder
	));
}

#[test]
fn test_wallet_flushes_forwarder_tokens() {
	let mut d = Deployment::new(config());
	let wallet = d.create_wallet(B256::ZERO);
	let forwarder = d
		.protocol
		.create_forwarder_with(
			&mut d.chain,
			Address::repeat_byte(0xaa),
			wallet,
			None,
			B256::ZERO,
			ForwarderSettings {
				auto_flush_721: false,
				auto_flush_1155: false,
			},
		)
		.unwrap();

	let minter = Address::repeat_byte(0x11);
	let token = d.chain.deploy(minter, Arc::new(Erc20Token::new())).unwrap();
	d.chain
		.transact(Transaction::call(
			minter,
			token,
			IERC20::mintCall { to: forwarder, amount: U256::from(25) }.abi_encode(),
		))
		.unwrap();

	let flush = IWalletSimple::flushForwarderTokensCall {
		forwarderAddress: forwarder,
		tokenContractAddress: token,
	};
	let outsider = Address::repeat_byte(0x33);
	assert_eq!(
		d.chain
			.transact(Transaction::call(outsider, wallet, flush.abi_encode()))
			.unwrap_err(),
		CustodyError::NonSignerCaller(outsider)
	);

	let signer = d.keys[2].address();
	d.chain
		.transact(Transaction::call(signer, wallet, flush.abi_encode()))
		.unwrap();
	assert_eq!(Erc20Token::balance(&d.chain, &token, &wallet), U256::from(25));
	assert_eq!(Erc20Token::balance(&d.chain, &token, &forwarder), U256::ZERO);
}

#[test]
fn test_wallet_relays_nft_flushes_and_settings() {
	let mut d = Deployment::new(config());
	let wallet = d.create_wallet(B256::ZERO);
	let forwarder = d
		.protocol
		.create_forwarder_with(
			&mut d.chain,
			Address::repeat_byte(0xaa),
			wallet,
			None,
			B256::ZERO,
			ForwarderSettings {
				auto_flush_721: false,
				auto_flush_1155: false,
			},
		)
		.unwrap();
	let signer = d.keys[1].address();
	let minter = Address::repeat_byte(0x11);
	let relay = |chain: &mut Chain, input: Vec<u8>| {
		chain.transact(Transaction::call(signer, wallet, input)).unwrap();
	};

	let nft = d.chain.deploy(minter, Arc::new(Erc721Token)).unwrap();
	d.chain
		.transact(Transaction::call(
			minter,
			nft,
			IERC721::mintCall { to: forwarder, tokenId: U256::from(5) }.abi_encode(),
		))
		.unwrap();
	assert_eq!(Erc721Token::owner(&d.chain, &nft, &U256::from(5)), Some(forwarder));
	relay(
		&mut d.chain,
		IWalletSimple::flushERC721ForwarderTokensCall {
			forwarderAddress: forwarder,
			tokenContractAddress: nft,
			tokenId: U256::from(5),
		}
		.abi_encode(),
	);
	assert_eq!(Erc721Token::owner(&d.chain, &nft, &U256::from(5)), Some(wallet));

	let multi = d.chain.deploy(minter, Arc::new(Erc1155Token)).unwrap();
	for (id, amount) in [(1u64, 10u64), (2, 3), (3, 4)] {
		d.chain
			.transact(Transaction::call(
				minter,
				multi,
				IERC1155::mintCall {
					to: forwarder,
					id: U256::from(id),
					amount: U256::from(amount),
				}
				.abi_encode(),
			))
			.unwrap();
	}
	relay(
		&mut d.chain,
		IWalletSimple::batchFlushERC1155ForwarderTokensCall {
			forwarderAddress: forwarder,
			tokenContractAddress: multi,
			tokenIds: vec![U256::from(1), U256::from(2)],
		}
		.abi_encode(),
	);
	relay(
		&mut d.chain,
		IWalletSimple::flushERC1155ForwarderTokensCall {
			forwarderAddress: forwarder,
			tokenContractAddress: multi,
			tokenId: U256::from(3),
		}
		.abi_encode(),
	);
	for (id, amount) in [(1u64, 10u64), (2, 3), (3, 4)] {
		assert_eq!(Erc1155Token::balance(&d.chain, &multi, &wallet, id), U256::from(amount));
		assert_eq!(Erc1155Token::balance(&d.chain, &multi, &forwarder, id), U256::ZERO);
	}

	// Once the wallet turns auto-flush on, new NFTs pass straight through.
	relay(
		&mut d.chain,
		IWalletSimple::setAutoFlush721Call {
			forwarderAddress: forwarder,
			autoFlush: true,
		}
		.abi_encode(),
	);
	let enabled = d
		.chain
		.view_call(forwarder, &IForwarder::autoFlush721Call {})
		.unwrap()
		.enabled;
	assert!(enabled);
	d.chain
		.transact(Transaction::call(
			minter,
			nft,
			IERC721::mintCall { to: forwarder, tokenId: U256::from(6) }.abi_encode(),
		))
		.unwrap();
	assert_eq!(Erc721Token::owner(&d.chain, &nft, &U256::from(6)), Some(wallet));
}

#[test]
fn test_auto_flushed_nft_lands_in_wallet() {
	let mut d = Deployment::new(config());
	let wallet = d.create_wallet(B256::ZERO);
	let forwarder = d
		.protocol
		.create_forwarder(&mut d.chain, Address::repeat_byte(0xaa), wallet, None, B256::ZERO)
		.unwrap();

	let minter = Address::repeat_byte(0x11);
	let nft = d.chain.deploy(minter, Arc::new(Erc721Token)).unwrap();
	d.chain
		.transact(Transaction::call(
			minter,
			nft,
			IERC721::mintCall { to: forwarder, tokenId: U256::from(77) }.abi_encode(),
		))
		.unwrap();
	assert_eq!(Erc721Token::owner(&d.chain, &nft, &U256::from(77)), Some(wallet));
}

#[test]
fn test_batcher_pays_exact_total() {
	let mut d = Deployment::new(config());
	let batcher = d.protocol.addresses().batcher;
	let payer = Address::repeat_byte(0x44);
	d.chain.fund(payer, U256::from(100));
	let (a, b) = (Address::repeat_byte(0x0a), Address::repeat_byte(0x0b));

	let call = IBatcher::batchCall {
		recipients: vec![a, b],
		values: vec![U256::from(30), U256::from(40)],
	};
	let err = d
		.chain
		.transact(Transaction::call(payer, batcher, call.abi_encode()).with_value(U256::from(71)))
		.unwrap_err();
	assert!(matches!(err, CustodyError::TotalSentMustEqualTotalReceived { .. }));

	d.chain
		.transact(Transaction::call(payer, batcher, call.abi_encode()).with_value(U256::from(70)))
		.unwrap();
	assert_eq!(d.chain.balance(&a), U256::from(30));
	assert_eq!(d.chain.balance(&b), U256::from(40));
	assert_eq!(d.chain.balance(&payer), U256::from(30));
	assert_eq!(d.chain.balance(&batcher), U256::ZERO);
}

#[tokio::test]
async fn test_deploy_from_config_file() {
	let dir = tempfile::TempDir::new().unwrap();
	let path = dir.path().join("custody.toml");
	std::fs::write(
		&path,
		format!(
			"[chain]\ntimestamp = {}\n\n[wallet]\nflavor = \"optimism\"\n",
			NOW
		),
	)
	.unwrap();

	let config = Config::from_file(path.to_str().unwrap()).await.unwrap();
	let config = ConfigBuilder::from(config).wallet_batch_limit(2).build();
	let mut d = Deployment::new(config);
	let wallet = d.create_wallet(B256::ZERO);
	d.chain.fund(wallet, U256::from(10));

	let recipients = vec![
		Address::repeat_byte(1),
		Address::repeat_byte(2),
		Address::repeat_byte(3),
	];
	let values = vec![U256::from(1); 3];
	let op = custody_types::BatchOperation {
		recipients: recipients.clone(),
		values: values.clone(),
		expire_time: NOW + 60,
		sequence_id: 1,
	};
	let call = IWalletSimple::sendMultiSigBatchCall {
		recipients,
		values,
		expireTime: U256::from(NOW + 60),
		sequenceId: U256::from(1),
		signature: d.sign(1, &op.into()),
	};
	let sender = d.keys[0].address();
	let err = d
		.chain
		.transact(Transaction::call(sender, wallet, call.abi_encode()))
		.unwrap_err();
	assert_eq!(err, CustodyError::TooManyRecipients { count: 3, limit: 2 });
}
