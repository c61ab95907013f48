//! Payment state tracking and engine facade for the Tidepay gateway
//!
//! Tidepay fronts an opaque third-party Lightning/Liquid swap engine with a
//! REST-friendly facade. This crate carries everything below the HTTP layer:
//!
//! - [`engine`] -- the trait boundary to the vendor SDK: its event stream,
//!   its request/response surface, and a scripted in-memory backend for
//!   development and tests
//! - [`tracker`] -- the in-memory payment state tracker fed by engine events
//! - [`handler`] -- the facade combining engine calls with tracker lookups
//! - [`gateway`] -- the application-scoped lifecycle owner of the single
//!   handler/engine/tracker triple
//! - [`sync`] -- the background watchdog keeping the connection synced and
//!   reconciling pending payments after sync gaps
//! - [`notify`] -- signed webhook delivery of settled payments to the
//!   merchant backend

#![warn(missing_docs)]
#![warn(rustdoc::bare_urls)]

pub mod config;
pub mod engine;
pub mod error;
pub mod gateway;
pub mod handler;
pub mod notify;
pub mod sync;
pub mod tracker;
mod util;

pub use config::{EngineConfig, Network};
pub use engine::{DynPaymentEngine, EngineConnector, EngineError, EngineEvent, PaymentEngine};
pub use error::Error;
pub use gateway::Gateway;
pub use handler::{PaymentHandler, PaymentStatus, SendPaymentArgs};
pub use notify::{PaymentNotifier, PaymentUpdate, WebhookNotifier};
pub use sync::{SyncWatchdog, WatchdogConfig};
pub use tracker::PaymentTracker;
