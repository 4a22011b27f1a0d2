//! Contract ABI definitions.
//!
//! Every contract hosted by the custody system is dispatched by the 4-byte
//! selector of the calldata it receives, exactly like an on-chain contract.
//! The interfaces below are the single source of those selectors and of the
//! argument encodings.

use alloy_primitives::FixedBytes;
use alloy_sol_types::sol;

sol! {
	/// Standard ERC165 introspection.
	interface IERC165 {
		function supportsInterface(bytes4 interfaceId) external view returns (bool supported);
	}

	/// Standard fungible token, plus a deployer-gated mint used by fixtures.
	interface IERC20 {
		function balanceOf(address account) external view returns (uint256 balance);
		function allowance(address owner, address spender) external view returns (uint256 remaining);
		function transfer(address to, uint256 amount) external returns (bool success);
		function transferFrom(address from, address to, uint256 amount) external returns (bool success);
		function approve(address spender, uint256 amount) external returns (bool success);
		function mint(address to, uint256 amount) external;
	}

	/// Standard non-fungible token (the data-carrying safe transfer only).
	interface IERC721 {
		function ownerOf(uint256 tokenId) external view returns (address owner);
		function balanceOf(address owner) external view returns (uint256 balance);
		function safeTransferFrom(address from, address to, uint256 tokenId, bytes data) external;
		function transferFrom(address from, address to, uint256 tokenId) external;
		function setApprovalForAll(address operator, bool approved) external;
		function mint(address to, uint256 tokenId) external;
		function supportsInterface(bytes4 interfaceId) external view returns (bool supported);
	}

	interface IERC721Receiver {
		function onERC721Received(address operator, address from, uint256 tokenId, bytes data) external returns (bytes4 selector);
	}

	/// Standard multi-token.
	interface IERC1155 {
		function balanceOf(address account, uint256 id) external view returns (uint256 balance);
		function safeTransferFrom(address from, address to, uint256 id, uint256 amount, bytes data) external;
		function safeBatchTransferFrom(address from, address to, uint256[] ids, uint256[] amounts, bytes data) external;
		function setApprovalForAll(address operator, bool approved) external;
		function mint(address to, uint256 id, uint256 amount) external;
		function supportsInterface(bytes4 interfaceId) external view returns (bool supported);
	}

	interface IERC1155Receiver {
		function onERC1155Received(address operator, address from, uint256 id, uint256 value, bytes data) external returns (bytes4 selector);
		function onERC1155BatchReceived(address operator, address from, uint256[] ids, uint256[] values, bytes data) external returns (bytes4 selector);
	}

	/// Multi-signature wallet.
	interface IWalletSimple {
		function init(address[] allowedSigners) external;
		function initialized() external view returns (bool isInitialized);
		function isSigner(address signer) external view returns (bool isAllowed);
		function getSigners() external view returns (address[] signers);
		function safeMode() external view returns (bool isActive);
		function getNextSequenceId() external view returns (uint256 sequenceId);
		function sendMultiSig(address toAddress, uint256 value, bytes data, uint256 expireTime, uint256 sequenceId, bytes signature) external;
		function sendMultiSigToken(address toAddress, uint256 value, address tokenContractAddress, uint256 expireTime, uint256 sequenceId, bytes signature) external;
		function sendMultiSigBatch(address[] recipients, uint256[] values, uint256 expireTime, uint256 sequenceId, bytes signature) external;
		function activateSafeMode() external;
		function flushForwarderTokens(address forwarderAddress, address tokenContractAddress) external;
		function flushERC721ForwarderTokens(address forwarderAddress, address tokenContractAddress, uint256 tokenId) external;
		function flushERC1155ForwarderTokens(address forwarderAddress, address tokenContractAddress, uint256 tokenId) external;
		function batchFlushERC1155ForwarderTokens(address forwarderAddress, address tokenContractAddress, uint256[] tokenIds) external;
		function setAutoFlush721(address forwarderAddress, bool autoFlush) external;
		function setAutoFlush1155(address forwarderAddress, bool autoFlush) external;
		function onERC721Received(address operator, address from, uint256 tokenId, bytes data) external returns (bytes4 selector);
		function onERC1155Received(address operator, address from, uint256 id, uint256 value, bytes data) external returns (bytes4 selector);
		function onERC1155BatchReceived(address operator, address from, uint256[] ids, uint256[] values, bytes data) external returns (bytes4 selector);
		function supportsInterface(bytes4 interfaceId) external view returns (bool supported);
	}

	/// Deposit forwarder.
	interface IForwarder {
		function init(address parentAddress, address feeAddress, bool autoFlush721, bool autoFlush1155) external;
		function parentAddress() external view returns (address parent);
		function feeAddress() external view returns (address fee);
		function autoFlush721() external view returns (bool enabled);
		function autoFlush1155() external view returns (bool enabled);
		function setAutoFlush721(bool autoFlush) external;
		function setAutoFlush1155(bool autoFlush) external;
		function flush() external;
		function flushTokens(address tokenContractAddress) external;
		function batchFlushERC20Tokens(address[] tokenContractAddresses) external;
		function flushERC721Token(address tokenContractAddress, uint256 tokenId) external;
		function flushERC1155Tokens(address tokenContractAddress, uint256 tokenId) external;
		function batchFlushERC1155Tokens(address tokenContractAddress, uint256[] tokenIds) external;
		function callFromParent(address target, uint256 value, bytes data) external returns (bytes result);
		function onERC721Received(address operator, address from, uint256 tokenId, bytes data) external returns (bytes4 selector);
		function onERC1155Received(address operator, address from, uint256 id, uint256 value, bytes data) external returns (bytes4 selector);
		function onERC1155BatchReceived(address operator, address from, uint256[] ids, uint256[] values, bytes data) external returns (bytes4 selector);
		function supportsInterface(bytes4 interfaceId) external view returns (bool supported);
	}

	/// Standalone batch payout contract.
	interface IBatcher {
		function owner() external view returns (address currentOwner);
		function transferGasLimit() external view returns (uint256 gasLimit);
		function batchTransferLimit() external view returns (uint256 limit);
		function tokenBatchTransferLimit() external view returns (uint256 limit);
		function batch(address[] recipients, uint256[] values) external payable;
		function batchTransferFrom(address token, address[] recipients, uint256[] amounts) external;
		function recover(address to, uint256 value, bytes data) external returns (bytes result);
		function transferOwnership(address newOwner) external;
		function changeTransferGasLimit(uint256 newTransferGasLimit) external;
		function changeBatchTransferLimit(uint256 newBatchTransferLimit) external;
		function changeTokenBatchTransferLimit(uint256 newTokenBatchTransferLimit) external;
	}

	/// Clone factory for wallets.
	interface IWalletFactory {
		function implementationAddress() external view returns (address implementation);
		function createWallet(address[] allowedSigners, bytes32 salt) external returns (address wallet);
	}

	/// Clone factory for forwarders.
	interface IForwarderFactory {
		function implementationAddress() external view returns (address implementation);
		function createForwarder(address parent, address feeAddress, bytes32 salt, bool shouldAutoFlushERC721, bool shouldAutoFlushERC1155) external returns (address forwarder);
	}
}

/// ERC165 interface id of ERC165 itself.
pub const ERC165_INTERFACE_ID: FixedBytes<4> = FixedBytes([0x01, 0xff, 0xc9, 0xa7]);
/// ERC165 interface id of ERC721.
pub const ERC721_INTERFACE_ID: FixedBytes<4> = FixedBytes([0x80, 0xac, 0x58, 0xcd]);
/// ERC165 interface id of ERC1155.
pub const ERC1155_INTERFACE_ID: FixedBytes<4> = FixedBytes([0xd9, 0xb6, 0x7a, 0x26]);
/// ERC165 interface id of the ERC721 receiver hook.
pub const ERC721_RECEIVER_INTERFACE_ID: FixedBytes<4> = FixedBytes([0x15, 0x0b, 0x7a, 0x02]);
/// ERC165 interface id of the ERC1155 receiver hooks.
pub const ERC1155_RECEIVER_INTERFACE_ID: FixedBytes<4> = FixedBytes([0x4e, 0x23, 0x12, 0xe0]);

#[cfg(test)]
mod tests {
	use super::*;
	use alloy_primitives::keccak256;
	use alloy_sol_types::SolCall;

	#[test]
	fn test_receiver_selectors_match_interface_ids() {
		// Single-function interfaces have an id equal to their selector.
		assert_eq!(
			IERC721Receiver::onERC721ReceivedCall::SELECTOR,
			ERC721_RECEIVER_INTERFACE_ID.0
		);
		let single = IERC1155Receiver::onERC1155ReceivedCall::SELECTOR;
		let batch = IERC1155Receiver::onERC1155BatchReceivedCall::SELECTOR;
		let xor: Vec<u8> = single.iter().zip(batch.iter()).map(|(a, b)| a ^ b).collect();
		assert_eq!(xor.as_slice(), ERC1155_RECEIVER_INTERFACE_ID.as_slice());
	}

	#[test]
	fn test_erc165_interface_id() {
		let selector = &keccak256("supportsInterface(bytes4)")[..4];
		assert_eq!(selector, ERC165_INTERFACE_ID.as_slice());
	}
}
