//! The DO-side control plane server: per-kind CRUD handlers behind the
//! permission gate, job lifecycle guards, and orphan cleanup. Handlers are
//! transport-agnostic; the same registry serves the mailbox watcher and
//! in-process mock transports.

pub mod app;
pub mod handlers;
pub mod policy;

pub use app::{create_app, serve, RdsApp};
pub use policy::{require_admin, role_for, Role};
