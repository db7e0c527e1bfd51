//! Domain services used by websocket and HTTP routes.
//!
//! ARCHITECTURE
//! ============
//! Service modules own editing, persistence, and export logic so route
//! handlers can stay focused on protocol translation. A `Session` is the
//! per-connection editing state; `SyncEngine` keeps it converged with the
//! shared document; `slides` and `presentation` are the operations the
//! routes expose.

pub mod export;
pub mod persistence;
pub mod presentation;
pub mod role;
pub mod session;
pub mod slides;
pub mod sync;
