//! Engine request and response types
//!
//! This module contains the typed request/response surface of the payment
//! engine, mirroring the wire shapes the engine uses.
//!
//! # Type Definitions
//!
//! All types use `camelCase` serialization to match the engine's JSON format.
//!
//! ## Payment States
//!
//! [`PaymentState`] covers the full swap lifecycle:
//! - `PENDING` - the swap service holds the payment and has broadcast a lockup transaction
//! - `WAITING_CONFIRMATION` - claim transaction broadcast or direct transaction seen
//! - `SUCCEEDED` - claim or direct transaction confirmed
//! - `FAILED` - swap expired or the lockup transaction failed
//! - `WAITING_FEE_ACCEPTANCE` - payment requires explicit fee acceptance
//! - `REFUNDED` - lockup funds returned to the sender
//! - `UNKNOWN` - sentinel for "not found", never assigned by the engine
//!
//! ## Amount Selection
//!
//! Outgoing payments pick exactly one mode via [`PayAmount`]: a satoshi
//! amount, an asset amount, or a full drain.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Payment lifecycle state reported by the engine
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentState {
    /// Swap service holds the payment, lockup transaction broadcast
    Pending,
    /// Claim transaction broadcast or direct transaction seen
    WaitingConfirmation,
    /// Claim or direct transaction confirmed
    Succeeded,
    /// Swap expired or the lockup transaction failed
    Failed,
    /// Payment requires explicit fee acceptance
    WaitingFeeAcceptance,
    /// Lockup funds returned to the sender
    Refunded,
    /// Payment not found or state undeterminable
    Unknown,
}

impl PaymentState {
    /// States the engine will not transition out of
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PaymentState::Succeeded | PaymentState::Failed | PaymentState::Refunded
        )
    }

    /// States reported as paid to merchants
    ///
    /// `WAITING_CONFIRMATION` counts: the payment is irreversible at that
    /// point, it is only waiting for onchain confirmation.
    pub fn is_paid(&self) -> bool {
        matches!(
            self,
            PaymentState::WaitingConfirmation | PaymentState::Succeeded
        )
    }
}

impl fmt::Display for PaymentState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            PaymentState::Pending => "PENDING",
            PaymentState::WaitingConfirmation => "WAITING_CONFIRMATION",
            PaymentState::Succeeded => "SUCCEEDED",
            PaymentState::Failed => "FAILED",
            PaymentState::WaitingFeeAcceptance => "WAITING_FEE_ACCEPTANCE",
            PaymentState::Refunded => "REFUNDED",
            PaymentState::Unknown => "UNKNOWN",
        };
        write!(f, "{}", s)
    }
}

/// Direction of a payment
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentType {
    /// Outgoing payment
    Send,
    /// Incoming payment
    Receive,
}

/// How a receive destination is generated
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentMethod {
    /// BOLT11 invoice over a Lightning swap
    Lightning,
    /// Onchain Bitcoin address over a chain swap
    BitcoinAddress,
    /// Direct Liquid address
    LiquidAddress,
}

impl FromStr for PaymentMethod {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "LIGHTNING" => Ok(PaymentMethod::Lightning),
            "BITCOIN_ADDRESS" => Ok(PaymentMethod::BitcoinAddress),
            "LIQUID_ADDRESS" => Ok(PaymentMethod::LiquidAddress),
            _ => Err(format!("unknown payment method: {}", s)),
        }
    }
}

/// Amount selector for outgoing payments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PayAmount {
    /// Pay a fixed satoshi amount
    #[serde(rename_all = "camelCase")]
    Bitcoin {
        /// Amount to send in satoshis
        amount_sat: u64,
    },
    /// Pay an amount of a non-Bitcoin asset
    #[serde(rename_all = "camelCase")]
    Asset {
        /// Asset identifier
        asset_id: String,
        /// Amount in the asset's own precision
        amount: f64,
        /// Whether asset-denominated fees should be estimated
        estimate_asset_fees: bool,
    },
    /// Send the entire spendable balance
    Drain,
}

/// Amount selector for incoming payments
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ReceiveAmount {
    /// Receive a fixed satoshi amount
    #[serde(rename_all = "camelCase")]
    Bitcoin {
        /// Amount to receive in satoshis
        amount_sat: u64,
    },
    /// Receive an amount of a non-Bitcoin asset
    #[serde(rename_all = "camelCase")]
    Asset {
        /// Asset identifier
        asset_id: String,
        /// Amount in the asset's own precision
        amount: f64,
    },
}

/// Request to quote an outgoing payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareSendRequest {
    /// BOLT11 invoice, BIP21 URI or bare address
    pub destination: String,
    /// Amount mode
    pub amount: PayAmount,
}

/// Quoted outgoing payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareSendResponse {
    /// Destination the quote was issued for
    pub destination: String,
    /// Amount mode the quote was issued for
    pub amount: PayAmount,
    /// Quoted fee in satoshis
    pub fees_sat: u64,
}

/// Request to execute a quoted outgoing payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendPaymentRequest {
    /// The quote returned by the prepare call
    pub prepare_response: PrepareSendResponse,
}

/// Result of executing an outgoing payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendPaymentResponse {
    /// The initiated payment, usually still `PENDING`
    pub payment: Payment,
}

/// Request to quote an incoming payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareReceiveRequest {
    /// Destination kind to generate
    pub payment_method: PaymentMethod,
    /// Amount mode
    pub amount: ReceiveAmount,
}

/// Quoted incoming payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareReceiveResponse {
    /// Destination kind the quote was issued for
    pub payment_method: PaymentMethod,
    /// Amount mode the quote was issued for
    pub amount: ReceiveAmount,
    /// Quoted fee in satoshis
    pub fees_sat: u64,
}

/// Request to execute a quoted incoming payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivePaymentRequest {
    /// The quote returned by the prepare call
    pub prepare_response: PrepareReceiveResponse,
    /// Optional invoice description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Generated receive destination
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReceivePaymentResponse {
    /// Invoice or address the payer should use
    pub destination: String,
}

/// Filters for listing payments
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListPaymentsRequest {
    /// Only payments at or after this unix timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from_timestamp: Option<u64>,
    /// Only payments at or before this unix timestamp
    #[serde(skip_serializing_if = "Option::is_none")]
    pub to_timestamp: Option<u64>,
    /// Pagination offset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub offset: Option<u32>,
    /// Pagination limit
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    /// Only payments in these states
    #[serde(skip_serializing_if = "Option::is_none")]
    pub states: Option<Vec<PaymentState>>,
    /// Only payments of these directions
    #[serde(skip_serializing_if = "Option::is_none")]
    pub type_filters: Option<Vec<PaymentType>>,
}

/// Lookup key for a single payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum GetPaymentRequest {
    /// Look up by Lightning payment hash
    #[serde(rename_all = "camelCase")]
    PaymentHash {
        /// Hex payment hash
        payment_hash: String,
    },
    /// Look up by swap identifier
    #[serde(rename_all = "camelCase")]
    SwapId {
        /// Swap identifier
        swap_id: String,
    },
}

/// A payment known to the engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Payment {
    /// Unix timestamp of the last state change
    pub timestamp: u64,
    /// Amount in satoshis
    pub amount_sat: u64,
    /// Fees in satoshis
    pub fees_sat: u64,
    /// Direction
    pub payment_type: PaymentType,
    /// Current state
    pub status: PaymentState,
    /// Destination the payment was sent to or received on
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    /// Claim or direct transaction id, once known
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<String>,
    /// Method-specific details
    pub details: PaymentDetails,
}

impl Payment {
    /// Lightning payment hash, when the payment has one
    pub fn payment_hash(&self) -> Option<&str> {
        match &self.details {
            PaymentDetails::Lightning { payment_hash, .. } => payment_hash.as_deref(),
            _ => None,
        }
    }

    /// Swap identifier, when the payment went through a swap
    pub fn swap_id(&self) -> Option<&str> {
        match &self.details {
            PaymentDetails::Lightning { swap_id, .. } => Some(swap_id.as_str()),
            PaymentDetails::Bitcoin { swap_id, .. } => Some(swap_id.as_str()),
            PaymentDetails::Liquid { .. } => None,
        }
    }

    /// Failure reason, for failed swaps
    pub fn error(&self) -> Option<&str> {
        match &self.details {
            PaymentDetails::Lightning { error, .. } => error.as_deref(),
            PaymentDetails::Bitcoin { error, .. } => error.as_deref(),
            PaymentDetails::Liquid { .. } => None,
        }
    }
}

/// Method-specific payment details
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum PaymentDetails {
    /// Lightning swap details
    #[serde(rename_all = "camelCase")]
    Lightning {
        /// Swap identifier
        swap_id: String,
        /// Hex payment hash of the invoice
        #[serde(skip_serializing_if = "Option::is_none")]
        payment_hash: Option<String>,
        /// BOLT11 invoice
        #[serde(skip_serializing_if = "Option::is_none")]
        invoice: Option<String>,
        /// Payment preimage, once settled
        #[serde(skip_serializing_if = "Option::is_none")]
        preimage: Option<String>,
        /// Invoice description
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
        /// Refund transaction id, for failed swaps that were refunded
        #[serde(skip_serializing_if = "Option::is_none")]
        refund_tx_id: Option<String>,
        /// Failure reason
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
    /// Direct Liquid transaction details
    #[serde(rename_all = "camelCase")]
    Liquid {
        /// Destination address
        destination: String,
        /// Asset identifier
        asset_id: String,
        /// Transaction description
        #[serde(skip_serializing_if = "Option::is_none")]
        description: Option<String>,
    },
    /// Onchain Bitcoin swap details
    #[serde(rename_all = "camelCase")]
    Bitcoin {
        /// Swap identifier
        swap_id: String,
        /// Refund transaction id, for failed swaps that were refunded
        #[serde(skip_serializing_if = "Option::is_none")]
        refund_tx_id: Option<String>,
        /// Failure reason
        #[serde(skip_serializing_if = "Option::is_none")]
        error: Option<String>,
    },
}

/// A satoshi range the engine accepts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Limits {
    /// Smallest accepted amount
    pub min_sat: u64,
    /// Largest accepted amount
    pub max_sat: u64,
    /// Largest amount accepted without confirmation
    pub max_zero_conf_sat: u64,
}

/// Send and receive limits for one payment rail
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentLimits {
    /// Limits for incoming payments
    pub receive: Limits,
    /// Limits for outgoing payments
    pub send: Limits,
}

/// Current fee-rate estimates in sat/vbyte
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedFees {
    /// Next-block fee rate
    pub fastest_fee: u64,
    /// Half hour target
    pub half_hour_fee: u64,
    /// One hour target
    pub hour_fee: u64,
    /// Economy target
    pub economy_fee: u64,
    /// Relay floor
    pub minimum_fee: u64,
}

/// Wallet and chain snapshot
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GetInfoResponse {
    /// Wallet balances and identity
    pub wallet_info: WalletInfo,
    /// Chain tips the engine is synced to
    pub blockchain_info: BlockchainInfo,
}

/// Wallet balances and identity
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WalletInfo {
    /// Confirmed spendable balance in satoshis
    pub balance_sat: u64,
    /// Satoshis locked in outgoing swaps
    pub pending_send_sat: u64,
    /// Satoshis expected from incoming swaps
    pub pending_receive_sat: u64,
    /// Wallet public key
    pub pubkey: String,
    /// Non-Bitcoin asset balances
    #[serde(default)]
    pub asset_balances: Vec<AssetBalance>,
}

/// Balance of a single non-Bitcoin asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetBalance {
    /// Asset identifier
    pub asset_id: String,
    /// Balance in the asset's base units
    pub balance_sat: u64,
    /// Human-readable asset name
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Asset ticker
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ticker: Option<String>,
}

/// Chain tips the engine is synced to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BlockchainInfo {
    /// Liquid chain tip height
    pub liquid_tip: u32,
    /// Bitcoin chain tip height
    pub bitcoin_tip: u32,
}

/// Fiat rate quoted against BTC
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FiatRate {
    /// Currency code, e.g. `USD`
    pub coin: String,
    /// Units of the currency per BTC
    pub value: f64,
}

/// Request to quote an onchain payout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparePayOnchainRequest {
    /// Amount mode
    pub amount: PayAmount,
    /// Custom fee rate for the claim transaction
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fee_rate_sat_per_vbyte: Option<u32>,
}

/// Quoted onchain payout
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PreparePayOnchainResponse {
    /// Satoshis the receiver will get
    pub receiver_amount_sat: u64,
    /// Claim transaction fee
    pub claim_fees_sat: u64,
    /// Total fees including the swap service fee
    pub total_fees_sat: u64,
}

/// Request to execute a quoted onchain payout
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayOnchainRequest {
    /// Destination Bitcoin address
    pub address: String,
    /// The quote returned by the prepare call
    pub prepare_response: PreparePayOnchainResponse,
}

/// A failed chain swap whose lockup funds can be reclaimed
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundableSwap {
    /// Lockup address of the swap
    pub swap_address: String,
    /// Unix timestamp of the swap
    pub timestamp: u64,
    /// Locked amount in satoshis
    pub amount_sat: u64,
    /// Id of the last broadcast refund attempt, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_refund_tx_id: Option<String>,
}

/// Request to refund a failed chain swap
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundRequest {
    /// Lockup address of the swap to refund
    pub swap_address: String,
    /// Address the refund should be sent to
    pub refund_address: String,
    /// Fee rate for the refund transaction
    pub fee_rate_sat_per_vbyte: u32,
}

/// Broadcast refund transaction
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RefundResponse {
    /// Refund transaction id
    pub refund_tx_id: String,
}

/// Fiat on-ramp provider
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BuyBitcoinProvider {
    /// Moonpay
    Moonpay,
}

impl FromStr for BuyBitcoinProvider {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "MOONPAY" => Ok(BuyBitcoinProvider::Moonpay),
            _ => Err(format!("unknown buy bitcoin provider: {}", s)),
        }
    }
}

/// Request to quote a Bitcoin purchase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareBuyBitcoinRequest {
    /// On-ramp provider
    pub provider: BuyBitcoinProvider,
    /// Amount to buy in satoshis
    pub amount_sat: u64,
}

/// Quoted Bitcoin purchase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareBuyBitcoinResponse {
    /// On-ramp provider the quote was issued for
    pub provider: BuyBitcoinProvider,
    /// Amount the quote was issued for
    pub amount_sat: u64,
    /// Quoted fee in satoshis
    pub fees_sat: u64,
}

/// Request to execute a quoted Bitcoin purchase
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuyBitcoinRequest {
    /// The quote returned by the prepare call
    pub prepare_response: PrepareBuyBitcoinResponse,
    /// URL the provider should redirect to after checkout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_url: Option<String>,
}

/// Parsed user input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum InputType {
    /// Bare Bitcoin address
    #[serde(rename_all = "camelCase")]
    BitcoinAddress {
        /// The address
        address: String,
    },
    /// Bare Liquid address
    #[serde(rename_all = "camelCase")]
    LiquidAddress {
        /// The address
        address: String,
    },
    /// BOLT11 invoice
    #[serde(rename_all = "camelCase")]
    Bolt11 {
        /// The invoice
        invoice: String,
        /// Hex payment hash of the invoice
        payment_hash: String,
        /// Invoice amount, when present
        #[serde(skip_serializing_if = "Option::is_none")]
        amount_msat: Option<u64>,
    },
    /// LNURL-pay endpoint
    #[serde(rename_all = "camelCase")]
    LnUrlPay {
        /// Endpoint parameters
        data: LnUrlPayRequestData,
    },
    /// LNURL-auth challenge
    #[serde(rename_all = "camelCase")]
    LnUrlAuth {
        /// Challenge parameters
        data: LnUrlAuthRequestData,
    },
    /// LNURL-withdraw endpoint
    #[serde(rename_all = "camelCase")]
    LnUrlWithdraw {
        /// Endpoint parameters
        data: LnUrlWithdrawRequestData,
    },
    /// BIP21 URI
    #[serde(rename_all = "camelCase")]
    Bip21 {
        /// The full URI
        uri: String,
    },
    /// Lightning node id
    #[serde(rename_all = "camelCase")]
    NodeId {
        /// Hex node public key
        node_id: String,
    },
}

/// LNURL-pay endpoint parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LnUrlPayRequestData {
    /// Callback URL of the service
    pub callback: String,
    /// Smallest payable amount in millisatoshis
    pub min_sendable: u64,
    /// Largest payable amount in millisatoshis
    pub max_sendable: u64,
    /// Raw metadata JSON string
    pub metadata_str: String,
    /// Maximum accepted comment length, zero when comments are unsupported
    pub comment_allowed: u16,
    /// Domain the endpoint was served from
    pub domain: String,
    /// BIP353 address the LNURL was resolved from, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bip353_address: Option<String>,
}

/// LNURL-auth challenge parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LnUrlAuthRequestData {
    /// Hex challenge to sign
    pub k1: String,
    /// Domain requesting the authentication
    pub domain: String,
    /// Full callback URL
    pub url: String,
    /// Requested action, e.g. `login`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

/// LNURL-withdraw endpoint parameters
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LnUrlWithdrawRequestData {
    /// Callback URL of the service
    pub callback: String,
    /// Hex secret to pass back to the service
    pub k1: String,
    /// Description suggested by the service
    pub default_description: String,
    /// Smallest withdrawable amount in millisatoshis
    pub min_withdrawable: u64,
    /// Largest withdrawable amount in millisatoshis
    pub max_withdrawable: u64,
}

/// Request to quote an LNURL-pay payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareLnUrlPayRequest {
    /// Endpoint parameters from a parsed LNURL
    pub data: LnUrlPayRequestData,
    /// Amount mode
    pub amount: PayAmount,
    /// Optional comment forwarded to the payee
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
    /// Whether the success action URL must match the endpoint domain
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validate_success_action_url: Option<bool>,
}

/// Quoted LNURL-pay payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareLnUrlPayResponse {
    /// Resolved BOLT11 destination
    pub destination: String,
    /// Quoted fee in satoshis
    pub fees_sat: u64,
    /// Endpoint parameters the quote was issued for
    pub data: LnUrlPayRequestData,
    /// Comment the quote was issued with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Request to execute a quoted LNURL-pay payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LnUrlPayRequest {
    /// The quote returned by the prepare call
    pub prepare_response: PrepareLnUrlPayResponse,
}

/// Result of an LNURL-pay payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LnUrlPayResult {
    /// The initiated payment
    pub payment: Payment,
    /// Success action returned by the payee, verbatim
    #[serde(skip_serializing_if = "Option::is_none")]
    pub success_action: Option<serde_json::Value>,
}

/// Request to execute an LNURL-withdraw
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LnUrlWithdrawRequest {
    /// Endpoint parameters from a parsed LNURL
    pub data: LnUrlWithdrawRequestData,
    /// Amount to withdraw in millisatoshis
    pub amount_msat: u64,
    /// Optional comment forwarded to the service
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Terminal status of an LNURL callback
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum LnUrlCallbackStatus {
    /// The service accepted the callback
    Ok,
    /// The service rejected the callback
    #[serde(rename_all = "camelCase")]
    ErrorStatus {
        /// Reason given by the service
        reason: String,
    },
}

/// Request to sign a message with the wallet key
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignMessageRequest {
    /// Message to sign
    pub message: String,
}

/// Signature over a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignMessageResponse {
    /// zbase-encoded signature
    pub signature: String,
}

/// Request to verify a message signature
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckMessageRequest {
    /// Original message
    pub message: String,
    /// Public key the message was supposedly signed with
    pub pubkey: String,
    /// Signature to verify
    pub signature: String,
}

/// Signature verification result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckMessageResponse {
    /// Whether the signature is valid
    pub is_valid: bool,
}

/// Request for the currently proposed fees of a held payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchPaymentProposedFeesRequest {
    /// Swap identifier of the held payment
    pub swap_id: String,
}

/// Currently proposed fees of a held payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchPaymentProposedFeesResponse {
    /// Swap identifier of the held payment
    pub swap_id: String,
    /// Proposed fee in satoshis
    pub fees_sat: u64,
    /// Amount the payer locked up
    pub payer_amount_sat: u64,
    /// Amount the receiver would get at the proposed fee
    pub receiver_amount_sat: u64,
}

/// Request to accept proposed fees and release a held payment
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptPaymentProposedFeesRequest {
    /// The proposal returned by the fetch call
    pub response: FetchPaymentProposedFeesResponse,
}

/// Metadata for a non-Bitcoin asset the engine should recognize
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssetMetadata {
    /// Asset identifier
    pub asset_id: String,
    /// Human-readable asset name
    pub name: String,
    /// Asset ticker
    pub ticker: String,
    /// Decimal precision
    pub precision: u8,
}

/// Custom input parser the engine should consult
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalInputParser {
    /// Parser identifier
    pub provider_id: String,
    /// Regex selecting inputs this parser handles
    pub input_regex: String,
    /// URL template the input is resolved against
    pub parser_url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payment_state_classes() {
        assert!(PaymentState::Succeeded.is_terminal());
        assert!(PaymentState::Failed.is_terminal());
        assert!(PaymentState::Refunded.is_terminal());
        assert!(!PaymentState::WaitingConfirmation.is_terminal());
        assert!(!PaymentState::Pending.is_terminal());

        assert!(PaymentState::Succeeded.is_paid());
        assert!(PaymentState::WaitingConfirmation.is_paid());
        assert!(!PaymentState::Failed.is_paid());
        assert!(!PaymentState::Unknown.is_paid());
    }

    #[test]
    fn test_payment_method_from_str() {
        assert_eq!(
            "lightning".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::Lightning
        );
        assert_eq!(
            "Bitcoin_Address".parse::<PaymentMethod>().unwrap(),
            PaymentMethod::BitcoinAddress
        );
        assert!("sepa".parse::<PaymentMethod>().is_err());
    }

    #[test]
    fn test_payment_state_serialization() {
        let json = serde_json::to_string(&PaymentState::WaitingFeeAcceptance).unwrap();
        assert_eq!(json, "\"WAITING_FEE_ACCEPTANCE\"");
        assert_eq!(PaymentState::WaitingFeeAcceptance.to_string(), "WAITING_FEE_ACCEPTANCE");
    }

    #[test]
    fn test_payment_accessors() {
        let payment = Payment {
            timestamp: 1,
            amount_sat: 1000,
            fees_sat: 10,
            payment_type: PaymentType::Send,
            status: PaymentState::Failed,
            destination: Some("lnbc1".to_string()),
            tx_id: None,
            details: PaymentDetails::Lightning {
                swap_id: "swap-1".to_string(),
                payment_hash: Some("abcd".to_string()),
                invoice: None,
                preimage: None,
                description: None,
                refund_tx_id: None,
                error: Some("swap expired".to_string()),
            },
        };

        assert_eq!(payment.payment_hash(), Some("abcd"));
        assert_eq!(payment.swap_id(), Some("swap-1"));
        assert_eq!(payment.error(), Some("swap expired"));
    }
}
