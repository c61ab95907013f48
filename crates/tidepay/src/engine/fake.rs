//! Scripted in-memory engine backend
//!
//! Stands in for a real vendor SDK in tests and development deployments.
//! Payments and events are injected by the caller; every request-path call is
//! recorded so tests can assert which engine operations ran.

use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use parking_lot::Mutex;
use rand::Rng;
use tokio_stream::wrappers::BroadcastStream;
use uuid::Uuid;

use super::error::EngineError;
use super::events::EngineEvent;
use super::types::*;
use super::{DynPaymentEngine, EngineConnector, EventStream, PaymentEngine};
use crate::config::EngineConfig;
use crate::util::unix_time;

const QUOTE_FEE_SAT: u64 = 100;
const EVENT_CHANNEL_CAPACITY: usize = 256;

fn random_hex(len: usize) -> String {
    let mut rng = rand::rng();
    (0..len)
        .map(|_| {
            let idx = rng.random_range(0..16);
            let chars = b"0123456789abcdef";
            chars[idx] as char
        })
        .collect()
}

/// In-memory engine with caller-scripted behavior
pub struct FakeEngine {
    events: tokio::sync::broadcast::Sender<EngineEvent>,
    state: Mutex<FakeState>,
}

#[derive(Default)]
struct FakeState {
    payments: Vec<Payment>,
    replay: Vec<EngineEvent>,
    webhook_url: Option<String>,
    fail_lookups: bool,
    calls: Vec<&'static str>,
    disconnects: u32,
}

impl FakeEngine {
    /// Create an engine that never syncs on its own
    pub fn new() -> Arc<Self> {
        let (events, _) = tokio::sync::broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Arc::new(Self {
            events,
            state: Mutex::new(FakeState::default()),
        })
    }

    /// Create an engine that reports `SYNCED` to every new subscriber
    pub fn synced() -> Arc<Self> {
        let engine = Self::new();
        engine.state.lock().replay.push(EngineEvent::Synced);
        engine
    }

    /// Push an event to all current subscribers
    pub fn emit(&self, event: EngineEvent) {
        let _ = self.events.send(event);
    }

    /// Seed a payment the engine knows about
    pub fn insert_payment(&self, payment: Payment) {
        self.state.lock().payments.push(payment);
    }

    /// Make every `get_payment` lookup fail with a transport error
    pub fn set_fail_lookups(&self, fail: bool) {
        self.state.lock().fail_lookups = fail;
    }

    /// Names of the request-path operations invoked so far
    pub fn calls(&self) -> Vec<&'static str> {
        self.state.lock().calls.clone()
    }

    /// Number of request-path operations invoked so far
    pub fn call_count(&self) -> usize {
        self.state.lock().calls.len()
    }

    /// Number of times `disconnect` ran
    pub fn disconnects(&self) -> u32 {
        self.state.lock().disconnects
    }

    /// Currently registered webhook URL
    pub fn webhook_url(&self) -> Option<String> {
        self.state.lock().webhook_url.clone()
    }

    fn record(&self, op: &'static str) {
        tracing::trace!("fake engine call: {}", op);
        self.state.lock().calls.push(op);
    }

    fn new_lightning_payment(&self, destination: &str, amount_sat: u64, fees_sat: u64) -> Payment {
        Payment {
            timestamp: unix_time(),
            amount_sat,
            fees_sat,
            payment_type: PaymentType::Send,
            status: PaymentState::Pending,
            destination: Some(destination.to_string()),
            tx_id: None,
            details: PaymentDetails::Lightning {
                swap_id: Uuid::new_v4().to_string(),
                payment_hash: Some(random_hex(64)),
                invoice: Some(destination.to_string()),
                preimage: None,
                description: None,
                refund_tx_id: None,
                error: None,
            },
        }
    }
}

#[async_trait]
impl PaymentEngine for FakeEngine {
    fn subscribe_events(&self) -> EventStream {
        let replay = self.state.lock().replay.clone();
        let live = BroadcastStream::new(self.events.subscribe()).filter_map(|result| async move {
            match result {
                Ok(event) => Some(event),
                Err(err) => {
                    tracing::warn!("fake engine event stream lagged: {}", err);
                    None
                }
            }
        });
        Box::pin(stream::iter(replay).chain(live))
    }

    async fn get_info(&self) -> Result<GetInfoResponse, EngineError> {
        self.record("get_info");
        Ok(GetInfoResponse {
            wallet_info: WalletInfo {
                balance_sat: 1_000_000,
                pending_send_sat: 0,
                pending_receive_sat: 0,
                pubkey: "02fa161077eb8b4b12ea1e0ad75e23957d3d6b1a424ad1ceb3aeb2a39a4cdcfa42"
                    .to_string(),
                asset_balances: Vec::new(),
            },
            blockchain_info: BlockchainInfo {
                liquid_tip: 3_333_333,
                bitcoin_tip: 877_000,
            },
        })
    }

    async fn prepare_send_payment(
        &self,
        req: PrepareSendRequest,
    ) -> Result<PrepareSendResponse, EngineError> {
        self.record("prepare_send_payment");
        Ok(PrepareSendResponse {
            destination: req.destination,
            amount: req.amount,
            fees_sat: QUOTE_FEE_SAT,
        })
    }

    async fn send_payment(
        &self,
        req: SendPaymentRequest,
    ) -> Result<SendPaymentResponse, EngineError> {
        self.record("send_payment");
        let amount_sat = match &req.prepare_response.amount {
            PayAmount::Bitcoin { amount_sat } => *amount_sat,
            PayAmount::Asset { .. } | PayAmount::Drain => 0,
        };
        let payment = self.new_lightning_payment(
            &req.prepare_response.destination,
            amount_sat,
            req.prepare_response.fees_sat,
        );
        self.insert_payment(payment.clone());
        Ok(SendPaymentResponse { payment })
    }

    async fn prepare_receive_payment(
        &self,
        req: PrepareReceiveRequest,
    ) -> Result<PrepareReceiveResponse, EngineError> {
        self.record("prepare_receive_payment");
        Ok(PrepareReceiveResponse {
            payment_method: req.payment_method,
            amount: req.amount,
            fees_sat: QUOTE_FEE_SAT,
        })
    }

    async fn receive_payment(
        &self,
        req: ReceivePaymentRequest,
    ) -> Result<ReceivePaymentResponse, EngineError> {
        self.record("receive_payment");
        let destination = match req.prepare_response.payment_method {
            PaymentMethod::Lightning => format!("lnbc1{}", random_hex(40)),
            PaymentMethod::BitcoinAddress => format!("bc1q{}", random_hex(38)),
            PaymentMethod::LiquidAddress => format!("lq1qq{}", random_hex(40)),
        };
        Ok(ReceivePaymentResponse { destination })
    }

    async fn list_payments(
        &self,
        req: ListPaymentsRequest,
    ) -> Result<Vec<Payment>, EngineError> {
        self.record("list_payments");
        let state = self.state.lock();
        let filtered: Vec<Payment> = state
            .payments
            .iter()
            .filter(|p| req.from_timestamp.map_or(true, |t| p.timestamp >= t))
            .filter(|p| req.to_timestamp.map_or(true, |t| p.timestamp <= t))
            .filter(|p| {
                req.states
                    .as_ref()
                    .map_or(true, |states| states.contains(&p.status))
            })
            .filter(|p| {
                req.type_filters
                    .as_ref()
                    .map_or(true, |types| types.contains(&p.payment_type))
            })
            .cloned()
            .collect();

        let offset = req.offset.unwrap_or(0) as usize;
        let limit = req.limit.map(|l| l as usize).unwrap_or(usize::MAX);
        Ok(filtered.into_iter().skip(offset).take(limit).collect())
    }

    async fn get_payment(&self, req: GetPaymentRequest) -> Result<Payment, EngineError> {
        self.record("get_payment");
        let state = self.state.lock();
        if state.fail_lookups {
            return Err(EngineError::Transport("lookup unavailable".to_string()));
        }
        let found = match &req {
            GetPaymentRequest::PaymentHash { payment_hash } => state
                .payments
                .iter()
                .rev()
                .find(|p| p.payment_hash() == Some(payment_hash.as_str())),
            GetPaymentRequest::SwapId { swap_id } => state
                .payments
                .iter()
                .rev()
                .find(|p| p.swap_id() == Some(swap_id.as_str())),
        };
        found.cloned().ok_or(EngineError::NotFound)
    }

    async fn fetch_lightning_limits(&self) -> Result<PaymentLimits, EngineError> {
        self.record("fetch_lightning_limits");
        Ok(PaymentLimits {
            receive: Limits {
                min_sat: 1_000,
                max_sat: 25_000_000,
                max_zero_conf_sat: 100_000,
            },
            send: Limits {
                min_sat: 1_000,
                max_sat: 25_000_000,
                max_zero_conf_sat: 100_000,
            },
        })
    }

    async fn fetch_onchain_limits(&self) -> Result<PaymentLimits, EngineError> {
        self.record("fetch_onchain_limits");
        Ok(PaymentLimits {
            receive: Limits {
                min_sat: 10_000,
                max_sat: 1_000_000_000,
                max_zero_conf_sat: 0,
            },
            send: Limits {
                min_sat: 10_000,
                max_sat: 1_000_000_000,
                max_zero_conf_sat: 0,
            },
        })
    }

    async fn recommended_fees(&self) -> Result<RecommendedFees, EngineError> {
        self.record("recommended_fees");
        Ok(RecommendedFees {
            fastest_fee: 12,
            half_hour_fee: 8,
            hour_fee: 6,
            economy_fee: 4,
            minimum_fee: 1,
        })
    }

    async fn fetch_fiat_rates(&self) -> Result<Vec<FiatRate>, EngineError> {
        self.record("fetch_fiat_rates");
        Ok(vec![
            FiatRate {
                coin: "USD".to_string(),
                value: 97_000.0,
            },
            FiatRate {
                coin: "EUR".to_string(),
                value: 89_500.0,
            },
        ])
    }

    async fn prepare_pay_onchain(
        &self,
        req: PreparePayOnchainRequest,
    ) -> Result<PreparePayOnchainResponse, EngineError> {
        self.record("prepare_pay_onchain");
        let receiver_amount_sat = match req.amount {
            PayAmount::Bitcoin { amount_sat } => amount_sat,
            PayAmount::Asset { .. } | PayAmount::Drain => 0,
        };
        let claim_fees_sat = u64::from(req.fee_rate_sat_per_vbyte.unwrap_or(2)) * 110;
        Ok(PreparePayOnchainResponse {
            receiver_amount_sat,
            claim_fees_sat,
            total_fees_sat: claim_fees_sat + QUOTE_FEE_SAT,
        })
    }

    async fn pay_onchain(&self, _req: PayOnchainRequest) -> Result<(), EngineError> {
        self.record("pay_onchain");
        Ok(())
    }

    async fn list_refundables(&self) -> Result<Vec<RefundableSwap>, EngineError> {
        self.record("list_refundables");
        Ok(Vec::new())
    }

    async fn refund(&self, _req: RefundRequest) -> Result<RefundResponse, EngineError> {
        self.record("refund");
        Ok(RefundResponse {
            refund_tx_id: random_hex(64),
        })
    }

    async fn rescan_onchain_swaps(&self) -> Result<(), EngineError> {
        self.record("rescan_onchain_swaps");
        Ok(())
    }

    async fn prepare_buy_bitcoin(
        &self,
        req: PrepareBuyBitcoinRequest,
    ) -> Result<PrepareBuyBitcoinResponse, EngineError> {
        self.record("prepare_buy_bitcoin");
        Ok(PrepareBuyBitcoinResponse {
            provider: req.provider,
            amount_sat: req.amount_sat,
            fees_sat: QUOTE_FEE_SAT,
        })
    }

    async fn buy_bitcoin(&self, req: BuyBitcoinRequest) -> Result<String, EngineError> {
        self.record("buy_bitcoin");
        Ok(format!(
            "https://onramp.invalid/checkout?amount_sat={}",
            req.prepare_response.amount_sat
        ))
    }

    async fn parse_input(&self, input: &str) -> Result<InputType, EngineError> {
        self.record("parse_input");
        let trimmed = input.trim();
        let lower = trimmed.to_lowercase();
        if lower.starts_with("lnurl") {
            return Ok(InputType::LnUrlPay {
                data: LnUrlPayRequestData {
                    callback: "https://service.invalid/lnurl/callback".to_string(),
                    min_sendable: 1_000,
                    max_sendable: 100_000_000,
                    metadata_str: "[[\"text/plain\",\"fake\"]]".to_string(),
                    comment_allowed: 120,
                    domain: "service.invalid".to_string(),
                    bip353_address: None,
                },
            });
        }
        if lower.starts_with("lnbc") || lower.starts_with("lntb") {
            return Ok(InputType::Bolt11 {
                invoice: trimmed.to_string(),
                payment_hash: random_hex(64),
                amount_msat: None,
            });
        }
        if lower.starts_with("bitcoin:") {
            return Ok(InputType::Bip21 {
                uri: trimmed.to_string(),
            });
        }
        if lower.starts_with("bc1") {
            return Ok(InputType::BitcoinAddress {
                address: trimmed.to_string(),
            });
        }
        if lower.starts_with("lq1") {
            return Ok(InputType::LiquidAddress {
                address: trimmed.to_string(),
            });
        }
        Err(EngineError::Rejected(format!(
            "unrecognized input: {}",
            trimmed
        )))
    }

    async fn prepare_lnurl_pay(
        &self,
        req: PrepareLnUrlPayRequest,
    ) -> Result<PrepareLnUrlPayResponse, EngineError> {
        self.record("prepare_lnurl_pay");
        Ok(PrepareLnUrlPayResponse {
            destination: format!("lnbc1{}", random_hex(40)),
            fees_sat: QUOTE_FEE_SAT,
            data: req.data,
            comment: req.comment,
        })
    }

    async fn lnurl_pay(&self, req: LnUrlPayRequest) -> Result<LnUrlPayResult, EngineError> {
        self.record("lnurl_pay");
        let payment = self.new_lightning_payment(
            &req.prepare_response.destination,
            0,
            req.prepare_response.fees_sat,
        );
        self.insert_payment(payment.clone());
        Ok(LnUrlPayResult {
            payment,
            success_action: None,
        })
    }

    async fn lnurl_auth(
        &self,
        _data: LnUrlAuthRequestData,
    ) -> Result<LnUrlCallbackStatus, EngineError> {
        self.record("lnurl_auth");
        Ok(LnUrlCallbackStatus::Ok)
    }

    async fn lnurl_withdraw(
        &self,
        _req: LnUrlWithdrawRequest,
    ) -> Result<LnUrlCallbackStatus, EngineError> {
        self.record("lnurl_withdraw");
        Ok(LnUrlCallbackStatus::Ok)
    }

    async fn sign_message(
        &self,
        req: SignMessageRequest,
    ) -> Result<SignMessageResponse, EngineError> {
        self.record("sign_message");
        Ok(SignMessageResponse {
            signature: format!("fakesig{}", hex::encode(req.message.as_bytes())),
        })
    }

    async fn check_message(
        &self,
        req: CheckMessageRequest,
    ) -> Result<CheckMessageResponse, EngineError> {
        self.record("check_message");
        let expected = format!("fakesig{}", hex::encode(req.message.as_bytes()));
        Ok(CheckMessageResponse {
            is_valid: req.signature == expected && !req.pubkey.is_empty(),
        })
    }

    async fn fetch_payment_proposed_fees(
        &self,
        req: FetchPaymentProposedFeesRequest,
    ) -> Result<FetchPaymentProposedFeesResponse, EngineError> {
        self.record("fetch_payment_proposed_fees");
        let state = self.state.lock();
        let payment = state
            .payments
            .iter()
            .rev()
            .find(|p| p.swap_id() == Some(req.swap_id.as_str()))
            .ok_or(EngineError::NotFound)?;
        let fees_sat = 250;
        Ok(FetchPaymentProposedFeesResponse {
            swap_id: req.swap_id,
            fees_sat,
            payer_amount_sat: payment.amount_sat,
            receiver_amount_sat: payment.amount_sat.saturating_sub(fees_sat),
        })
    }

    async fn accept_payment_proposed_fees(
        &self,
        req: AcceptPaymentProposedFeesRequest,
    ) -> Result<(), EngineError> {
        self.record("accept_payment_proposed_fees");
        let mut state = self.state.lock();
        for payment in state.payments.iter_mut() {
            if payment.swap_id() == Some(req.response.swap_id.as_str())
                && payment.status == PaymentState::WaitingFeeAcceptance
            {
                payment.status = PaymentState::Pending;
            }
        }
        Ok(())
    }

    async fn register_webhook(&self, url: &str) -> Result<(), EngineError> {
        self.record("register_webhook");
        self.state.lock().webhook_url = Some(url.to_string());
        Ok(())
    }

    async fn unregister_webhook(&self) -> Result<(), EngineError> {
        self.record("unregister_webhook");
        self.state.lock().webhook_url = None;
        Ok(())
    }

    async fn disconnect(&self) -> Result<(), EngineError> {
        self.state.lock().disconnects += 1;
        Ok(())
    }
}

/// Connector producing [`FakeEngine`] instances
pub struct FakeConnector {
    synced_on_connect: bool,
    fail_connect: Mutex<bool>,
    engines: Mutex<Vec<Arc<FakeEngine>>>,
}

impl FakeConnector {
    /// Create a connector; `synced_on_connect` makes every produced engine
    /// report `SYNCED` immediately
    pub fn new(synced_on_connect: bool) -> Self {
        Self {
            synced_on_connect,
            fail_connect: Mutex::new(false),
            engines: Mutex::new(Vec::new()),
        }
    }

    /// Make subsequent `connect` calls fail
    pub fn set_fail_connect(&self, fail: bool) {
        *self.fail_connect.lock() = fail;
    }

    /// The most recently produced engine
    pub fn current(&self) -> Option<Arc<FakeEngine>> {
        self.engines.lock().last().cloned()
    }

    /// How many engines this connector has produced
    pub fn connections(&self) -> usize {
        self.engines.lock().len()
    }
}

#[async_trait]
impl EngineConnector for FakeConnector {
    async fn connect(&self, _config: &EngineConfig) -> Result<DynPaymentEngine, EngineError> {
        if *self.fail_connect.lock() {
            return Err(EngineError::Connection("connect disabled".to_string()));
        }
        let engine = if self.synced_on_connect {
            FakeEngine::synced()
        } else {
            FakeEngine::new()
        };
        self.engines.lock().push(engine.clone());
        let engine: DynPaymentEngine = engine;
        Ok(engine)
    }
}
