//! Payment handler facade
//!
//! [`PaymentHandler`] owns exactly one live engine connection, wires the
//! [`PaymentTracker`] into the engine's event stream as its sole subscriber,
//! and exposes the request/response operations the REST layer calls. Every
//! operation validates its arguments before touching the engine and logs
//! engine failures with operation context before propagating them.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;

use crate::config::EngineConfig;
use crate::engine::types::*;
use crate::engine::{DynPaymentEngine, EngineConnector};
use crate::error::Error;
use crate::tracker::PaymentTracker;
use crate::util;

const PAYMENT_POLL_INTERVAL: Duration = Duration::from_millis(250);

/// Arguments for an outgoing payment
///
/// Exactly one amount mode must be set: `amount_sat`, the
/// `(amount_asset, asset_id)` pair, or `drain`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SendPaymentArgs {
    /// BOLT11 invoice, BIP21 URI or bare address
    pub destination: String,
    /// Satoshi amount, for Bitcoin payments
    pub amount_sat: Option<u64>,
    /// Asset amount, for asset payments
    pub amount_asset: Option<f64>,
    /// Asset id, required with `amount_asset`
    pub asset_id: Option<String>,
    /// Send the entire spendable balance
    #[serde(default)]
    pub drain: bool,
}

impl SendPaymentArgs {
    fn resolve_amount(&self) -> Result<PayAmount, Error> {
        if self.destination.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "destination must be a non-empty string".to_string(),
            ));
        }

        let asset_mode = self.amount_asset.is_some() || self.asset_id.is_some();
        let selected = [self.drain, self.amount_sat.is_some(), asset_mode]
            .iter()
            .filter(|mode| **mode)
            .count();
        if selected != 1 {
            return Err(Error::InvalidArgument(
                "provide either amount_sat, or (amount_asset and asset_id), or drain".to_string(),
            ));
        }

        if self.drain {
            return Ok(PayAmount::Drain);
        }
        if let Some(amount_sat) = self.amount_sat {
            return Ok(PayAmount::Bitcoin { amount_sat });
        }
        match (self.amount_asset, self.asset_id.as_ref()) {
            (Some(amount), Some(asset_id)) => Ok(PayAmount::Asset {
                asset_id: asset_id.clone(),
                amount,
                estimate_asset_fees: false,
            }),
            _ => Err(Error::InvalidArgument(
                "asset payments require both amount_asset and asset_id".to_string(),
            )),
        }
    }
}

/// Result of initiating an outgoing payment
#[derive(Debug, Clone, Serialize)]
pub struct SendPaymentOutcome {
    /// Initial payment state, usually `PENDING`
    pub status: PaymentState,
    /// Destination as reported back by the engine
    pub destination: Option<String>,
    /// Quoted fee in satoshis
    pub fees_sat: u64,
    /// Lightning payment hash, when present
    pub payment_hash: Option<String>,
    /// Swap identifier, when present
    pub swap_id: Option<String>,
}

/// Result of generating a receive destination
#[derive(Debug, Clone, Serialize)]
pub struct ReceivePaymentOutcome {
    /// Invoice or address the payer should use
    pub destination: String,
    /// Quoted fee in satoshis
    pub fees_sat: u64,
}

/// Signature produced by the wallet key
#[derive(Debug, Clone, Serialize)]
pub struct SignedMessage {
    /// zbase-encoded signature
    pub signature: String,
    /// Public key the message was signed with
    pub pubkey: String,
}

/// Status report for a payment identifier
///
/// `status` is `UNKNOWN` when neither the engine nor the tracker knows the
/// identifier; that outcome is a normal result, never an error.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentStatus {
    /// Current payment state
    pub status: PaymentState,
    /// Full engine payment snapshot, when a fresh lookup succeeded
    pub payment_details: Option<serde_json::Value>,
    /// Failure reason, for failed payments
    pub error: Option<String>,
    /// Unix timestamp of the payment or its last tracked change
    pub timestamp: Option<u64>,
    /// Amount in satoshis, when known
    pub amount_sat: Option<u64>,
    /// Fees in satoshis, when known
    pub fees_sat: Option<u64>,
}

/// Facade over one live engine connection
pub struct PaymentHandler {
    engine: DynPaymentEngine,
    tracker: Arc<PaymentTracker>,
    events_cancel: CancellationToken,
    disconnected: AtomicBool,
}

impl PaymentHandler {
    /// Open an engine connection and start tracking its events
    ///
    /// Fails fast on missing credentials or an unusable working directory.
    /// The initial sync wait is best effort: a timeout is logged, not
    /// returned, since keeping the connection synced is the watchdog's job.
    pub async fn connect(
        connector: &dyn EngineConnector,
        config: &EngineConfig,
    ) -> Result<Arc<Self>, Error> {
        config.validate()?;

        let working_dir = util::expand_working_dir(&config.working_dir)?;
        std::fs::create_dir_all(&working_dir).map_err(|e| {
            Error::Config(format!(
                "failed to create working directory {}: {}",
                working_dir.display(),
                e
            ))
        })?;

        let engine = connector.connect(config).await.map_err(|e| {
            tracing::error!("failed to connect to payment engine: {}", e);
            Error::Engine(e)
        })?;
        tracing::info!("payment engine connected");

        let tracker = Arc::new(PaymentTracker::new());
        let events_cancel = CancellationToken::new();

        let mut stream = engine.subscribe_events();
        {
            let tracker = tracker.clone();
            let cancel = events_cancel.clone();
            tokio::spawn(async move {
                loop {
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        event = stream.next() => match event {
                            Some(event) => tracker.handle_event(&event),
                            None => {
                                tracing::warn!("engine event stream ended");
                                break;
                            }
                        }
                    }
                }
            });
        }

        let handler = Arc::new(Self {
            engine,
            tracker,
            events_cancel,
            disconnected: AtomicBool::new(false),
        });

        if !handler.wait_for_sync(config.sync_wait()).await {
            tracing::warn!("initial engine sync timed out, continuing unsynced");
        }

        Ok(handler)
    }

    /// The state tracker fed by this connection's events
    pub fn tracker(&self) -> Arc<PaymentTracker> {
        self.tracker.clone()
    }

    /// Whether the engine has reported a completed sync
    pub fn is_synced(&self) -> bool {
        self.tracker.is_synced()
    }

    /// Wait until the engine reports synced, bounded by `timeout`
    pub async fn wait_for_sync(&self, timeout: Duration) -> bool {
        self.tracker.wait_for_sync(timeout).await
    }

    /// Poll the tracker until a payment settles or `timeout` elapses
    ///
    /// Returns true once the payment is succeeded or pending, false when it
    /// failed, was refunded, or the wait timed out.
    pub async fn wait_for_payment(&self, identifier: &str, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            match self.tracker.status_of(identifier) {
                Some(PaymentState::Succeeded) | Some(PaymentState::Pending) => return true,
                Some(PaymentState::Failed) => {
                    tracing::error!("payment {} failed during wait", identifier);
                    return false;
                }
                Some(PaymentState::Refunded) => {
                    tracing::info!("swap for {} was refunded during wait", identifier);
                    return false;
                }
                _ => {}
            }
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!("wait for payment {} timed out", identifier);
                return false;
            }
            tokio::time::sleep(PAYMENT_POLL_INTERVAL).await;
        }
    }

    /// Prepare and execute an outgoing payment
    pub async fn send_payment(&self, args: SendPaymentArgs) -> Result<SendPaymentOutcome, Error> {
        let amount = args.resolve_amount()?;

        let prepare = self
            .engine
            .prepare_send_payment(PrepareSendRequest {
                destination: args.destination.clone(),
                amount,
            })
            .await
            .map_err(|e| {
                tracing::error!("failed to prepare send to {}: {}", args.destination, e);
                Error::Engine(e)
            })?;
        tracing::info!(
            "prepared send payment to {}, fees: {} sat",
            prepare.destination,
            prepare.fees_sat
        );

        let fees_sat = prepare.fees_sat;
        let response = self
            .engine
            .send_payment(SendPaymentRequest {
                prepare_response: prepare,
            })
            .await
            .map_err(|e| {
                tracing::error!("failed to send payment to {}: {}", args.destination, e);
                Error::Engine(e)
            })?;

        let payment = response.payment;
        tracing::info!("send payment initiated to {}", args.destination);
        Ok(SendPaymentOutcome {
            status: payment.status,
            destination: payment.destination.clone(),
            fees_sat,
            payment_hash: payment.payment_hash().map(str::to_string),
            swap_id: payment.swap_id().map(str::to_string),
        })
    }

    /// Prepare and execute an incoming payment, generating the destination
    pub async fn receive_payment(
        &self,
        amount: u64,
        method: &str,
        description: Option<String>,
        asset_id: Option<String>,
    ) -> Result<ReceivePaymentOutcome, Error> {
        let payment_method: PaymentMethod = method
            .parse()
            .map_err(|e: String| Error::InvalidArgument(e))?;

        let receive_amount = match asset_id {
            Some(asset_id) => ReceiveAmount::Asset {
                asset_id,
                amount: amount as f64,
            },
            None => ReceiveAmount::Bitcoin { amount_sat: amount },
        };

        let prepare = self
            .engine
            .prepare_receive_payment(PrepareReceiveRequest {
                payment_method,
                amount: receive_amount,
            })
            .await
            .map_err(|e| {
                tracing::error!("failed to prepare receive ({}): {}", method, e);
                Error::Engine(e)
            })?;
        tracing::info!(
            "prepared receive payment ({:?}), fees: {} sat",
            payment_method,
            prepare.fees_sat
        );

        let fees_sat = prepare.fees_sat;
        let response = self
            .engine
            .receive_payment(ReceivePaymentRequest {
                prepare_response: prepare,
                description,
            })
            .await
            .map_err(|e| {
                tracing::error!("failed to generate receive destination: {}", e);
                Error::Engine(e)
            })?;

        tracing::info!("receive destination generated: {}", response.destination);
        Ok(ReceivePaymentOutcome {
            destination: response.destination,
            fees_sat,
        })
    }

    /// List payments matching the given filters
    pub async fn list_payments(
        &self,
        request: ListPaymentsRequest,
    ) -> Result<Vec<Payment>, Error> {
        self.engine.list_payments(request).await.map_err(|e| {
            tracing::error!("failed to list payments: {}", e);
            Error::Engine(e)
        })
    }

    /// Check the status of a payment by identifier
    ///
    /// Tries a fresh engine lookup by payment hash, then by swap id, writing
    /// any fresh result through to the tracker. When both lookups fail the
    /// tracked state answers instead: paid-set membership reports
    /// `SUCCEEDED`, a cached status is returned as-is, and an unknown
    /// identifier yields `UNKNOWN` with a not-found message.
    pub async fn check_payment_status(&self, identifier: &str) -> Result<PaymentStatus, Error> {
        if identifier.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "payment identifier must be a non-empty string".to_string(),
            ));
        }

        let lookups = [
            GetPaymentRequest::PaymentHash {
                payment_hash: identifier.to_string(),
            },
            GetPaymentRequest::SwapId {
                swap_id: identifier.to_string(),
            },
        ];
        for lookup in lookups {
            match self.engine.get_payment(lookup).await {
                Ok(payment) => return Ok(self.record_fresh_status(identifier, payment)),
                Err(e) => {
                    tracing::debug!("engine lookup for {} failed: {}", identifier, e);
                }
            }
        }

        // The engine's direct lookup can be transiently unavailable even for
        // payments already seen via events, so the tracked state answers.
        if self.tracker.in_paid_set(identifier) {
            tracing::debug!("{} found in paid set, reporting SUCCEEDED", identifier);
            return Ok(PaymentStatus {
                status: PaymentState::Succeeded,
                payment_details: None,
                error: None,
                timestamp: self.tracker.timestamp_of(identifier),
                amount_sat: None,
                fees_sat: None,
            });
        }

        if let Some(status) = self.tracker.status_of(identifier) {
            tracing::debug!("using tracked status for {}: {}", identifier, status);
            return Ok(PaymentStatus {
                status,
                payment_details: None,
                error: self.tracker.error_of(identifier),
                timestamp: self.tracker.timestamp_of(identifier),
                amount_sat: None,
                fees_sat: None,
            });
        }

        tracing::debug!("no payment found for identifier {}", identifier);
        Ok(PaymentStatus {
            status: PaymentState::Unknown,
            payment_details: None,
            error: Some("payment not found".to_string()),
            timestamp: None,
            amount_sat: None,
            fees_sat: None,
        })
    }

    fn record_fresh_status(&self, identifier: &str, payment: Payment) -> PaymentStatus {
        let snapshot = serde_json::to_value(&payment).ok();
        let error = payment.error().map(str::to_string);
        self.tracker
            .update_state(identifier, payment.status, snapshot.clone(), error.clone());

        PaymentStatus {
            status: payment.status,
            payment_details: snapshot,
            error: match payment.status {
                PaymentState::Failed => error.or_else(|| Some("payment failed".to_string())),
                _ => None,
            },
            timestamp: Some(payment.timestamp),
            amount_sat: Some(payment.amount_sat),
            fees_sat: Some(payment.fees_sat),
        }
    }

    /// Fetch wallet balances and chain state
    pub async fn get_info(&self) -> Result<GetInfoResponse, Error> {
        self.engine.get_info().await.map_err(|e| {
            tracing::error!("failed to fetch wallet info: {}", e);
            Error::Engine(e)
        })
    }

    /// Fetch current Lightning swap limits
    pub async fn fetch_lightning_limits(&self) -> Result<PaymentLimits, Error> {
        self.engine.fetch_lightning_limits().await.map_err(|e| {
            tracing::error!("failed to fetch lightning limits: {}", e);
            Error::Engine(e)
        })
    }

    /// Fetch current onchain swap limits
    pub async fn fetch_onchain_limits(&self) -> Result<PaymentLimits, Error> {
        self.engine.fetch_onchain_limits().await.map_err(|e| {
            tracing::error!("failed to fetch onchain limits: {}", e);
            Error::Engine(e)
        })
    }

    /// Fetch recommended onchain fee rates
    pub async fn recommended_fees(&self) -> Result<RecommendedFees, Error> {
        self.engine.recommended_fees().await.map_err(|e| {
            tracing::error!("failed to fetch recommended fees: {}", e);
            Error::Engine(e)
        })
    }

    /// Fetch all current fiat exchange rates
    pub async fn fetch_fiat_rates(&self) -> Result<Vec<FiatRate>, Error> {
        self.engine.fetch_fiat_rates().await.map_err(|e| {
            tracing::error!("failed to fetch fiat rates: {}", e);
            Error::Engine(e)
        })
    }

    /// Fetch the exchange rate for a single currency
    pub async fn exchange_rate(&self, currency: &str) -> Result<FiatRate, Error> {
        let wanted = currency.to_uppercase();
        let rates = self.fetch_fiat_rates().await?;
        rates
            .into_iter()
            .find(|rate| rate.coin == wanted)
            .ok_or(Error::RateUnavailable(wanted))
    }

    /// Quote an onchain payout
    pub async fn prepare_pay_onchain(
        &self,
        amount_sat: Option<u64>,
        drain: bool,
        fee_rate_sat_per_vbyte: Option<u32>,
    ) -> Result<PreparePayOnchainResponse, Error> {
        let amount = if drain {
            PayAmount::Drain
        } else if let Some(amount_sat) = amount_sat {
            PayAmount::Bitcoin { amount_sat }
        } else {
            return Err(Error::InvalidArgument(
                "amount_sat is required for non-drain payments".to_string(),
            ));
        };
        if fee_rate_sat_per_vbyte == Some(0) {
            return Err(Error::InvalidArgument(
                "fee_rate_sat_per_vbyte must be a positive integer".to_string(),
            ));
        }

        let response = self
            .engine
            .prepare_pay_onchain(PreparePayOnchainRequest {
                amount,
                fee_rate_sat_per_vbyte,
            })
            .await
            .map_err(|e| {
                tracing::error!("failed to prepare onchain payout: {}", e);
                Error::Engine(e)
            })?;
        tracing::info!(
            "prepared onchain payout, total fees: {} sat",
            response.total_fees_sat
        );
        Ok(response)
    }

    /// Execute a quoted onchain payout
    pub async fn pay_onchain(
        &self,
        address: &str,
        prepare_response: PreparePayOnchainResponse,
    ) -> Result<(), Error> {
        if address.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "destination address must be a non-empty string".to_string(),
            ));
        }

        self.engine
            .pay_onchain(PayOnchainRequest {
                address: address.to_string(),
                prepare_response,
            })
            .await
            .map_err(|e| {
                tracing::error!("failed to execute onchain payout to {}: {}", address, e);
                Error::Engine(e)
            })?;
        tracing::info!("onchain payout initiated to {}", address);
        Ok(())
    }

    /// List failed chain swaps with reclaimable lockup funds
    pub async fn list_refundables(&self) -> Result<Vec<RefundableSwap>, Error> {
        self.engine.list_refundables().await.map_err(|e| {
            tracing::error!("failed to list refundable swaps: {}", e);
            Error::Engine(e)
        })
    }

    /// Broadcast a refund for a failed chain swap
    pub async fn execute_refund(
        &self,
        swap: &RefundableSwap,
        refund_address: &str,
        fee_rate_sat_per_vbyte: u32,
    ) -> Result<RefundResponse, Error> {
        if refund_address.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "refund address must be a non-empty string".to_string(),
            ));
        }
        if fee_rate_sat_per_vbyte == 0 {
            return Err(Error::InvalidArgument(
                "fee_rate_sat_per_vbyte must be a positive integer".to_string(),
            ));
        }

        let response = self
            .engine
            .refund(RefundRequest {
                swap_address: swap.swap_address.clone(),
                refund_address: refund_address.to_string(),
                fee_rate_sat_per_vbyte,
            })
            .await
            .map_err(|e| {
                tracing::error!("failed to refund swap {}: {}", swap.swap_address, e);
                Error::Engine(e)
            })?;
        tracing::info!(
            "refund initiated for swap {} to {}",
            swap.swap_address,
            refund_address
        );
        Ok(response)
    }

    /// Rescan the chain for swap transactions
    pub async fn rescan_swaps(&self) -> Result<(), Error> {
        self.engine.rescan_onchain_swaps().await.map_err(|e| {
            tracing::error!("failed to rescan swaps: {}", e);
            Error::Engine(e)
        })
    }

    /// Quote a Bitcoin purchase through a fiat on-ramp
    pub async fn prepare_buy_bitcoin(
        &self,
        provider: &str,
        amount_sat: u64,
    ) -> Result<PrepareBuyBitcoinResponse, Error> {
        let provider: BuyBitcoinProvider = provider
            .parse()
            .map_err(|e: String| Error::InvalidArgument(e))?;

        self.engine
            .prepare_buy_bitcoin(PrepareBuyBitcoinRequest {
                provider,
                amount_sat,
            })
            .await
            .map_err(|e| {
                tracing::error!("failed to prepare buy bitcoin: {}", e);
                Error::Engine(e)
            })
    }

    /// Execute a quoted Bitcoin purchase, returning the checkout URL
    pub async fn buy_bitcoin(
        &self,
        prepare_response: PrepareBuyBitcoinResponse,
    ) -> Result<String, Error> {
        self.engine
            .buy_bitcoin(BuyBitcoinRequest {
                prepare_response,
                redirect_url: None,
            })
            .await
            .map_err(|e| {
                tracing::error!("failed to execute buy bitcoin: {}", e);
                Error::Engine(e)
            })
    }

    /// Parse arbitrary user input into a typed destination
    pub async fn parse_input(&self, input: &str) -> Result<InputType, Error> {
        if input.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "input must be a non-empty string".to_string(),
            ));
        }
        self.engine.parse_input(input).await.map_err(|e| {
            tracing::error!("failed to parse input: {}", e);
            Error::Engine(e)
        })
    }

    /// Quote an LNURL-pay payment
    pub async fn prepare_lnurl_pay(
        &self,
        data: LnUrlPayRequestData,
        amount_sat: u64,
        comment: Option<String>,
        validate_success_action_url: Option<bool>,
    ) -> Result<PrepareLnUrlPayResponse, Error> {
        let response = self
            .engine
            .prepare_lnurl_pay(PrepareLnUrlPayRequest {
                data,
                amount: PayAmount::Bitcoin { amount_sat },
                comment,
                validate_success_action_url,
            })
            .await
            .map_err(|e| {
                tracing::error!("failed to prepare LNURL-pay: {}", e);
                Error::Engine(e)
            })?;
        tracing::info!("prepared LNURL-pay, fees: {} sat", response.fees_sat);
        Ok(response)
    }

    /// Execute a quoted LNURL-pay payment
    pub async fn lnurl_pay(
        &self,
        prepare_response: PrepareLnUrlPayResponse,
    ) -> Result<LnUrlPayResult, Error> {
        self.engine
            .lnurl_pay(LnUrlPayRequest { prepare_response })
            .await
            .map_err(|e| {
                tracing::error!("failed to execute LNURL-pay: {}", e);
                Error::Engine(e)
            })
    }

    /// Answer an LNURL-auth challenge
    pub async fn lnurl_auth(&self, data: LnUrlAuthRequestData) -> Result<bool, Error> {
        let status = self.engine.lnurl_auth(data).await.map_err(|e| {
            tracing::error!("failed to perform LNURL-auth: {}", e);
            Error::Engine(e)
        })?;
        match status {
            LnUrlCallbackStatus::Ok => Ok(true),
            LnUrlCallbackStatus::ErrorStatus { reason } => {
                tracing::warn!("LNURL-auth rejected: {}", reason);
                Ok(false)
            }
        }
    }

    /// Execute an LNURL-withdraw
    pub async fn lnurl_withdraw(
        &self,
        data: LnUrlWithdrawRequestData,
        amount_msat: u64,
        description: Option<String>,
    ) -> Result<LnUrlCallbackStatus, Error> {
        if amount_msat == 0 {
            return Err(Error::InvalidArgument(
                "amount_msat must be a positive integer".to_string(),
            ));
        }
        self.engine
            .lnurl_withdraw(LnUrlWithdrawRequest {
                data,
                amount_msat,
                description,
            })
            .await
            .map_err(|e| {
                tracing::error!("failed to execute LNURL-withdraw: {}", e);
                Error::Engine(e)
            })
    }

    /// Sign a message with the wallet key
    pub async fn sign_message(&self, message: &str) -> Result<SignedMessage, Error> {
        if message.trim().is_empty() {
            return Err(Error::InvalidArgument(
                "message to sign must be a non-empty string".to_string(),
            ));
        }

        let signed = self
            .engine
            .sign_message(SignMessageRequest {
                message: message.to_string(),
            })
            .await
            .map_err(|e| {
                tracing::error!("failed to sign message: {}", e);
                Error::Engine(e)
            })?;

        let info = self.get_info().await?;
        Ok(SignedMessage {
            signature: signed.signature,
            pubkey: info.wallet_info.pubkey,
        })
    }

    /// Verify a message signature
    pub async fn check_message(
        &self,
        message: &str,
        pubkey: &str,
        signature: &str,
    ) -> Result<bool, Error> {
        for (name, value) in [
            ("message", message),
            ("pubkey", pubkey),
            ("signature", signature),
        ] {
            if value.trim().is_empty() {
                return Err(Error::InvalidArgument(format!(
                    "{} must be a non-empty string",
                    name
                )));
            }
        }

        let response = self
            .engine
            .check_message(CheckMessageRequest {
                message: message.to_string(),
                pubkey: pubkey.to_string(),
                signature: signature.to_string(),
            })
            .await
            .map_err(|e| {
                tracing::error!("failed to check message signature: {}", e);
                Error::Engine(e)
            })?;
        Ok(response.is_valid)
    }

    /// Accept proposed fees for every payment currently held for acceptance
    ///
    /// Returns how many held payments were released.
    pub async fn handle_payments_waiting_fee_acceptance(&self) -> Result<u32, Error> {
        let waiting = self
            .engine
            .list_payments(ListPaymentsRequest {
                states: Some(vec![PaymentState::WaitingFeeAcceptance]),
                ..Default::default()
            })
            .await
            .map_err(|e| {
                tracing::error!("failed to list payments waiting fee acceptance: {}", e);
                Error::Engine(e)
            })?;

        let mut handled = 0;
        for payment in waiting {
            let Some(swap_id) = payment.swap_id().map(str::to_string) else {
                tracing::warn!("skipping held payment without a swap id");
                continue;
            };

            let proposal = self
                .engine
                .fetch_payment_proposed_fees(FetchPaymentProposedFeesRequest {
                    swap_id: swap_id.clone(),
                })
                .await
                .map_err(|e| {
                    tracing::error!("failed to fetch proposed fees for {}: {}", swap_id, e);
                    Error::Engine(e)
                })?;
            tracing::info!(
                "payer sent {} sat, proposed fees {} sat for swap {}",
                proposal.payer_amount_sat,
                proposal.fees_sat,
                swap_id
            );

            self.engine
                .accept_payment_proposed_fees(AcceptPaymentProposedFeesRequest {
                    response: proposal,
                })
                .await
                .map_err(|e| {
                    tracing::error!("failed to accept proposed fees for {}: {}", swap_id, e);
                    Error::Engine(e)
                })?;
            tracing::info!("accepted proposed fees for swap {}", swap_id);
            handled += 1;
        }

        Ok(handled)
    }

    /// Register a webhook URL with the engine's notification service
    pub async fn register_webhook(&self, url: &str) -> Result<(), Error> {
        if !url.starts_with("https://") {
            return Err(Error::InvalidArgument(
                "webhook URL must be a valid HTTPS URL".to_string(),
            ));
        }
        self.engine.register_webhook(url).await.map_err(|e| {
            tracing::error!("failed to register webhook {}: {}", url, e);
            Error::Engine(e)
        })?;
        tracing::info!("webhook registered: {}", url);
        Ok(())
    }

    /// Unregister the currently registered webhook
    pub async fn unregister_webhook(&self) -> Result<(), Error> {
        self.engine.unregister_webhook().await.map_err(|e| {
            tracing::error!("failed to unregister webhook: {}", e);
            Error::Engine(e)
        })?;
        tracing::info!("webhook unregistered");
        Ok(())
    }

    /// Tear down the event listener, tracker state and engine connection
    ///
    /// Safe to call more than once; later calls are no-ops. Failures during
    /// engine teardown are logged, never raised.
    pub async fn disconnect(&self) {
        if self.disconnected.swap(true, Ordering::SeqCst) {
            tracing::debug!("disconnect called on an already disconnected handler");
            return;
        }

        self.events_cancel.cancel();
        self.tracker.reset();
        if let Err(e) = self.engine.disconnect().await {
            tracing::warn!("engine disconnect failed: {}", e);
        }
        tracing::info!("payment handler disconnected");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::events::{EngineEvent, PaymentEventDetails};
    use crate::engine::fake::{FakeConnector, FakeEngine};

    fn test_config() -> EngineConfig {
        let mut config = EngineConfig::new("test-key", "test mnemonic words");
        config.working_dir = std::env::temp_dir()
            .join("tidepay-handler-tests")
            .to_string_lossy()
            .into_owned();
        config.sync_wait_secs = 2;
        config
    }

    async fn connect_handler() -> (Arc<PaymentHandler>, Arc<FakeEngine>) {
        let connector = FakeConnector::new(true);
        let handler = PaymentHandler::connect(&connector, &test_config())
            .await
            .unwrap();
        let engine = connector.current().unwrap();
        (handler, engine)
    }

    fn lightning_payment(hash: &str, swap: &str, status: PaymentState) -> Payment {
        Payment {
            timestamp: 1_700_000_000,
            amount_sat: 5_000,
            fees_sat: 21,
            payment_type: PaymentType::Receive,
            status,
            destination: Some("lnbc5u1fake".to_string()),
            tx_id: None,
            details: PaymentDetails::Lightning {
                swap_id: swap.to_string(),
                payment_hash: Some(hash.to_string()),
                invoice: None,
                preimage: None,
                description: None,
                refund_tx_id: None,
                error: None,
            },
        }
    }

    #[tokio::test]
    async fn test_connect_rejects_missing_credentials() {
        let connector = FakeConnector::new(true);
        let mut config = test_config();
        config.api_key = String::new();

        let err = PaymentHandler::connect(&connector, &config)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::Config(_)));
        // Failed fast: no engine connection was attempted
        assert_eq!(connector.connections(), 0);
    }

    #[tokio::test]
    async fn test_send_rejects_conflicting_amounts() {
        let (handler, engine) = connect_handler().await;

        let err = handler
            .send_payment(SendPaymentArgs {
                destination: "lnbc1fake".to_string(),
                amount_sat: Some(1_000),
                amount_asset: Some(1.0),
                asset_id: Some("usdt".to_string()),
                drain: false,
            })
            .await
            .err()
            .unwrap();

        assert!(matches!(err, Error::InvalidArgument(_)));
        // Validation failed before any engine interaction
        assert_eq!(engine.call_count(), 0);
    }

    #[tokio::test]
    async fn test_send_rejects_missing_amount() {
        let (handler, engine) = connect_handler().await;

        let err = handler
            .send_payment(SendPaymentArgs {
                destination: "lnbc1fake".to_string(),
                ..Default::default()
            })
            .await
            .err()
            .unwrap();

        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(engine.call_count(), 0);
    }

    #[tokio::test]
    async fn test_send_payment_prepares_then_executes() {
        let (handler, engine) = connect_handler().await;

        let outcome = handler
            .send_payment(SendPaymentArgs {
                destination: "lnbc1fake".to_string(),
                amount_sat: Some(1_000),
                ..Default::default()
            })
            .await
            .unwrap();

        assert_eq!(outcome.status, PaymentState::Pending);
        assert!(outcome.payment_hash.is_some());
        assert!(outcome.swap_id.is_some());
        assert_eq!(engine.calls(), vec!["prepare_send_payment", "send_payment"]);
    }

    #[tokio::test]
    async fn test_receive_rejects_unknown_method() {
        let (handler, engine) = connect_handler().await;

        let err = handler
            .receive_payment(1_000, "SEPA", None, None)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(engine.call_count(), 0);
    }

    #[tokio::test]
    async fn test_receive_method_is_case_insensitive() {
        let (handler, _engine) = connect_handler().await;

        let outcome = handler
            .receive_payment(1_000, "lightning", Some("order 42".to_string()), None)
            .await
            .unwrap();
        assert!(outcome.destination.starts_with("lnbc"));
        assert_eq!(outcome.fees_sat, 100);
    }

    #[tokio::test]
    async fn test_check_status_fresh_lookup_updates_tracker() {
        let (handler, engine) = connect_handler().await;
        engine.insert_payment(lightning_payment("abc", "swap-abc", PaymentState::Succeeded));

        let status = handler.check_payment_status("abc").await.unwrap();

        assert_eq!(status.status, PaymentState::Succeeded);
        assert!(status.payment_details.is_some());
        assert_eq!(status.amount_sat, Some(5_000));
        // Fresh result written through to the tracker
        assert_eq!(
            handler.tracker().status_of("abc"),
            Some(PaymentState::Succeeded)
        );
        assert!(handler.tracker().is_paid("abc"));
    }

    #[tokio::test]
    async fn test_check_status_falls_back_to_swap_id_lookup() {
        let (handler, engine) = connect_handler().await;
        engine.insert_payment(lightning_payment("hash-1", "swap-1", PaymentState::Pending));

        let status = handler.check_payment_status("swap-1").await.unwrap();
        assert_eq!(status.status, PaymentState::Pending);
    }

    #[tokio::test]
    async fn test_check_status_paid_set_wins_when_lookups_fail() {
        let (handler, engine) = connect_handler().await;
        engine.set_fail_lookups(true);

        // Paid membership takes precedence over the cached (non-final) status
        handler
            .tracker()
            .update_state("dest-1", PaymentState::WaitingConfirmation, None, None);

        let status = handler.check_payment_status("dest-1").await.unwrap();
        assert_eq!(status.status, PaymentState::Succeeded);
        assert!(status.payment_details.is_none());
        assert!(status.error.is_none());
    }

    #[tokio::test]
    async fn test_check_status_cached_failure_reports_error() {
        let (handler, engine) = connect_handler().await;
        engine.set_fail_lookups(true);

        handler.tracker().update_state(
            "xyz",
            PaymentState::Failed,
            None,
            Some("swap expired".to_string()),
        );

        let status = handler.check_payment_status("xyz").await.unwrap();
        assert_eq!(status.status, PaymentState::Failed);
        assert_eq!(status.error, Some("swap expired".to_string()));
    }

    #[tokio::test]
    async fn test_check_status_unknown_is_not_an_error() {
        let (handler, engine) = connect_handler().await;
        engine.set_fail_lookups(true);

        let status = handler.check_payment_status("nope").await.unwrap();
        assert_eq!(status.status, PaymentState::Unknown);
        assert_eq!(status.error, Some("payment not found".to_string()));
    }

    #[tokio::test]
    async fn test_event_flow_reaches_tracker() {
        let (handler, engine) = connect_handler().await;

        let details = PaymentEventDetails {
            payment_hash: Some("abc".to_string()),
            ..Default::default()
        };
        engine.emit(EngineEvent::PaymentPending {
            details: details.clone(),
        });
        engine.emit(EngineEvent::PaymentSucceeded { details });

        assert!(
            handler
                .wait_for_payment("abc", Duration::from_secs(2))
                .await
        );
        let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
        while handler.tracker().status_of("abc") != Some(PaymentState::Succeeded) {
            assert!(tokio::time::Instant::now() < deadline, "event never applied");
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(handler.tracker().is_paid("abc"));
        assert_eq!(handler.tracker().error_of("abc"), None);
    }

    #[tokio::test]
    async fn test_wait_for_payment_failure() {
        let (handler, engine) = connect_handler().await;

        engine.emit(EngineEvent::PaymentFailed {
            details: PaymentEventDetails {
                payment_hash: Some("bad".to_string()),
                error: Some("swap expired".to_string()),
                ..Default::default()
            },
        });

        assert!(
            !handler
                .wait_for_payment("bad", Duration::from_secs(2))
                .await
        );
    }

    #[tokio::test]
    async fn test_fee_acceptance_sweep() {
        let (handler, engine) = connect_handler().await;
        engine.insert_payment(lightning_payment(
            "held",
            "swap-held",
            PaymentState::WaitingFeeAcceptance,
        ));

        let handled = handler.handle_payments_waiting_fee_acceptance().await.unwrap();
        assert_eq!(handled, 1);
        assert!(engine
            .calls()
            .contains(&"accept_payment_proposed_fees"));
    }

    #[tokio::test]
    async fn test_register_webhook_requires_https() {
        let (handler, engine) = connect_handler().await;

        let err = handler
            .register_webhook("http://merchant.invalid/hook")
            .await
            .err()
            .unwrap();
        assert!(matches!(err, Error::InvalidArgument(_)));
        assert_eq!(engine.call_count(), 0);

        handler
            .register_webhook("https://merchant.invalid/hook")
            .await
            .unwrap();
        assert_eq!(
            engine.webhook_url(),
            Some("https://merchant.invalid/hook".to_string())
        );
    }

    #[tokio::test]
    async fn test_exchange_rate_lookup() {
        let (handler, _engine) = connect_handler().await;

        let rate = handler.exchange_rate("usd").await.unwrap();
        assert_eq!(rate.coin, "USD");

        let err = handler.exchange_rate("XXX").await.err().unwrap();
        assert!(matches!(err, Error::RateUnavailable(_)));
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let (handler, engine) = connect_handler().await;
        handler.tracker().update_state("a", PaymentState::Pending, None, None);

        handler.disconnect().await;
        handler.disconnect().await;

        assert_eq!(engine.disconnects(), 1);
        assert!(handler.tracker().is_empty());
        assert!(!handler.is_synced());
    }
}
