//! Database layer for data persistence and access.
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (api::handlers, alerts, auth, retention)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │ Repositories│  (db::handlers - tenant-scoped queries)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   Models    │  (db::models - plain request/response data)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │  PostgreSQL │
//! └─────────────┘
//! ```
//!
//! # Transactions
//!
//! Repositories borrow a `PgConnection`, so the caller decides the transaction boundary. A
//! multi-step mutation inside a repository (deleting a device group, redeeming an invite, moving a
//! user to a new organization) opens its own transaction with `Connection::begin`, which nests as
//! a savepoint when the caller already holds one:
//!
//! ```ignore
//! let mut tx = pool.begin().await?;
//! Invites::new(&mut tx).redeem("alice", invite_id).await?;
//! tx.commit().await?;
//! ```
//!
//! # Migrations
//!
//! Migrations live in `migrations/` and run at startup through [`crate::migrator`].

pub mod errors;
pub mod handlers;
pub mod models;
