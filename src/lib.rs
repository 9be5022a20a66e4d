//! Courier Gateway - WhatsApp-style messaging gateway for CRM backends
//!
//! This library provides the core functionality for the Courier gateway:
//! - Provider session lifecycle (create, QR pairing, status, disconnect)
//! - Outbound message dispatch with an ordered request-shape cascade
//! - Media ingestion to blob storage with signed serving URLs
//! - A persistent outbound log where every attempt leaves exactly one row
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────┐
//! │                    CRM Backend                       │
//! └────────────────────┬────────────────────────────────┘
//!                      │ HTTP
//! ┌────────────────────▼────────────────────────────────┐
//! │                Courier Gateway                       │
//! │  Sessions  │  Dispatch  │  Media  │  Outbound log   │
//! └────────────────────┬────────────────────────────────┘
//!                      │ HTTP
//! ┌────────────────────▼────────────────────────────────┐
//! │          Messaging Provider (per-session auth)       │
//! └─────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod binding;
pub mod config;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod media;
pub mod provider;
pub mod session;

pub use config::Config;
pub use error::{Error, Result};
