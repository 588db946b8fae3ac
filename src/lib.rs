//! # skillswap-gateway
//!
//! REST backend for a peer-to-peer skill-exchange marketplace. Members
//! teach what they know and spend the credits they earn on learning from
//! others, or on cheaper AI-assisted sessions.
//!
//! Every balance change is a row in an append-only credit ledger written
//! in the same atomic step as the balance update, so a member's balance
//! always equals the sum of their ledger rows.
//!
//! ## Architecture
//!
//! ```text
//! Clients (HTTP + bearer JWT)
//!     │
//!     ├── REST Handlers (api/)
//!     ├── AuthUser extractor (auth)
//!     │
//!     ├── Profile / Request / Session / Messaging / Review services (service/)
//!     ├── Entities and lifecycles (domain/)
//!     │
//!     └── MarketStore (store/)
//!         ├── InMemoryStore
//!         └── PostgresStore
//! ```

pub mod api;
pub mod app_state;
pub mod auth;
pub mod config;
pub mod domain;
pub mod error;
pub mod service;
pub mod store;
