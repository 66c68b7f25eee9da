//! Realtime drawing-game core: session orchestration and collaborative
//! drawing over an ordered, dense-indexed action log.
//!
//! The transport layer (websocket, socket framing, auth) lives outside this
//! crate. It registers connections with the [`fabric::BroadcastFabric`],
//! feeds inbound frames to the [`gateway::EventGateway`], and reports dead
//! connections to the [`reconciler::DisconnectReconciler`]; everything else
//! happens in here.

pub mod action_log;
pub mod config;
pub mod drawing;
pub mod error;
pub mod event;
pub mod fabric;
pub mod gateway;
pub mod metrics;
pub mod reconciler;
pub mod registry;
pub mod roster;
pub mod session;
pub mod storage;
pub mod testing;
pub mod types;
pub mod words;

pub use config::GameConfig;
pub use error::GameError;
