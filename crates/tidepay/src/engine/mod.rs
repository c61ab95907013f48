//! Payment engine abstraction
//!
//! The gateway never talks to the vendor SDK directly. Everything it needs --
//! the asynchronous event stream plus the synchronous request/response
//! surface -- is expressed by the [`PaymentEngine`] trait, and connections
//! are produced by an [`EngineConnector`]. The connector indirection is what
//! lets the sync watchdog tear a stuck connection down and build a fresh one,
//! and what lets tests substitute the in-tree [`fake::FakeEngine`].
//!
//! # Surface
//!
//! | Group | Operations |
//! |-------|------------|
//! | Events | `subscribe_events` |
//! | Wallet | `get_info`, `sign_message`, `check_message` |
//! | Send | `prepare_send_payment`, `send_payment` |
//! | Receive | `prepare_receive_payment`, `receive_payment` |
//! | Queries | `get_payment`, `list_payments`, `fetch_lightning_limits`, `fetch_onchain_limits`, `recommended_fees`, `fetch_fiat_rates` |
//! | Onchain | `prepare_pay_onchain`, `pay_onchain`, `list_refundables`, `refund`, `rescan_onchain_swaps` |
//! | On-ramp | `prepare_buy_bitcoin`, `buy_bitcoin` |
//! | LNURL | `parse_input`, `prepare_lnurl_pay`, `lnurl_pay`, `lnurl_auth`, `lnurl_withdraw` |
//! | Held payments | `fetch_payment_proposed_fees`, `accept_payment_proposed_fees` |
//! | Webhooks | `register_webhook`, `unregister_webhook` |
//! | Lifecycle | `disconnect` |

pub mod error;
pub mod events;
pub mod fake;
pub mod types;

use std::pin::Pin;
use std::sync::Arc;

use async_trait::async_trait;
use futures::Stream;

use crate::config::EngineConfig;
pub use error::EngineError;
pub use events::{EngineEvent, PaymentEventDetails};
use types::*;

/// Shared handle to a connected engine
pub type DynPaymentEngine = Arc<dyn PaymentEngine>;

/// Stream of engine events
pub type EventStream = Pin<Box<dyn Stream<Item = EngineEvent> + Send>>;

/// A connected payment engine
///
/// All operations may block on network I/O to the engine's backend services
/// and return [`EngineError`] on failure. Implementations must be safe to
/// share across tasks.
#[async_trait]
pub trait PaymentEngine: Send + Sync {
    /// Subscribe to the engine's event stream
    ///
    /// Each call returns an independent subscription starting at the next
    /// delivered event.
    fn subscribe_events(&self) -> EventStream;

    /// Fetch wallet balances and chain state
    async fn get_info(&self) -> Result<GetInfoResponse, EngineError>;

    /// Quote an outgoing payment
    async fn prepare_send_payment(
        &self,
        req: PrepareSendRequest,
    ) -> Result<PrepareSendResponse, EngineError>;

    /// Execute a quoted outgoing payment
    async fn send_payment(
        &self,
        req: SendPaymentRequest,
    ) -> Result<SendPaymentResponse, EngineError>;

    /// Quote an incoming payment
    async fn prepare_receive_payment(
        &self,
        req: PrepareReceiveRequest,
    ) -> Result<PrepareReceiveResponse, EngineError>;

    /// Execute a quoted incoming payment, generating the destination
    async fn receive_payment(
        &self,
        req: ReceivePaymentRequest,
    ) -> Result<ReceivePaymentResponse, EngineError>;

    /// List payments matching the given filters
    async fn list_payments(&self, req: ListPaymentsRequest)
        -> Result<Vec<Payment>, EngineError>;

    /// Look up a single payment by hash or swap id
    async fn get_payment(&self, req: GetPaymentRequest) -> Result<Payment, EngineError>;

    /// Fetch current Lightning swap limits
    async fn fetch_lightning_limits(&self) -> Result<PaymentLimits, EngineError>;

    /// Fetch current onchain swap limits
    async fn fetch_onchain_limits(&self) -> Result<PaymentLimits, EngineError>;

    /// Fetch recommended onchain fee rates
    async fn recommended_fees(&self) -> Result<RecommendedFees, EngineError>;

    /// Fetch current fiat exchange rates
    async fn fetch_fiat_rates(&self) -> Result<Vec<FiatRate>, EngineError>;

    /// Quote an onchain payout
    async fn prepare_pay_onchain(
        &self,
        req: PreparePayOnchainRequest,
    ) -> Result<PreparePayOnchainResponse, EngineError>;

    /// Execute a quoted onchain payout
    async fn pay_onchain(&self, req: PayOnchainRequest) -> Result<(), EngineError>;

    /// List failed chain swaps with reclaimable lockup funds
    async fn list_refundables(&self) -> Result<Vec<RefundableSwap>, EngineError>;

    /// Broadcast a refund for a failed chain swap
    async fn refund(&self, req: RefundRequest) -> Result<RefundResponse, EngineError>;

    /// Rescan the chain for swap transactions
    async fn rescan_onchain_swaps(&self) -> Result<(), EngineError>;

    /// Quote a Bitcoin purchase through a fiat on-ramp
    async fn prepare_buy_bitcoin(
        &self,
        req: PrepareBuyBitcoinRequest,
    ) -> Result<PrepareBuyBitcoinResponse, EngineError>;

    /// Execute a quoted Bitcoin purchase, returning the checkout URL
    async fn buy_bitcoin(&self, req: BuyBitcoinRequest) -> Result<String, EngineError>;

    /// Parse arbitrary user input into a typed destination
    async fn parse_input(&self, input: &str) -> Result<InputType, EngineError>;

    /// Quote an LNURL-pay payment
    async fn prepare_lnurl_pay(
        &self,
        req: PrepareLnUrlPayRequest,
    ) -> Result<PrepareLnUrlPayResponse, EngineError>;

    /// Execute a quoted LNURL-pay payment
    async fn lnurl_pay(&self, req: LnUrlPayRequest) -> Result<LnUrlPayResult, EngineError>;

    /// Answer an LNURL-auth challenge
    async fn lnurl_auth(
        &self,
        data: LnUrlAuthRequestData,
    ) -> Result<LnUrlCallbackStatus, EngineError>;

    /// Execute an LNURL-withdraw
    async fn lnurl_withdraw(
        &self,
        req: LnUrlWithdrawRequest,
    ) -> Result<LnUrlCallbackStatus, EngineError>;

    /// Sign a message with the wallet key
    async fn sign_message(
        &self,
        req: SignMessageRequest,
    ) -> Result<SignMessageResponse, EngineError>;

    /// Verify a message signature
    async fn check_message(
        &self,
        req: CheckMessageRequest,
    ) -> Result<CheckMessageResponse, EngineError>;

    /// Fetch the proposed fees of a payment held for fee acceptance
    async fn fetch_payment_proposed_fees(
        &self,
        req: FetchPaymentProposedFeesRequest,
    ) -> Result<FetchPaymentProposedFeesResponse, EngineError>;

    /// Accept proposed fees, releasing a held payment
    async fn accept_payment_proposed_fees(
        &self,
        req: AcceptPaymentProposedFeesRequest,
    ) -> Result<(), EngineError>;

    /// Register a webhook URL with the engine's notification service
    async fn register_webhook(&self, url: &str) -> Result<(), EngineError>;

    /// Unregister the currently registered webhook
    async fn unregister_webhook(&self) -> Result<(), EngineError>;

    /// Tear down the connection
    ///
    /// Must be safe to call more than once.
    async fn disconnect(&self) -> Result<(), EngineError>;
}

/// Factory producing connected engines
///
/// Owned by the [`Gateway`](crate::gateway::Gateway) so the watchdog can
/// rebuild the connection after repeated sync failures.
#[async_trait]
pub trait EngineConnector: Send + Sync {
    /// Open a new engine connection
    async fn connect(&self, config: &EngineConfig) -> Result<DynPaymentEngine, EngineError>;
}
