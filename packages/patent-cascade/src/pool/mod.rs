//! Shared-mutable pools of egress proxies and API credentials.
//!
//! Both pools are constructed once at engine start and passed by handle
//! to every concurrent query task. Every entry carries its own lock, so
//! concurrent queries never serialize on a single pool-wide mutex; the
//! only pool-level shared state is a relaxed rotation cursor.

pub mod credential;
pub mod proxy;

pub use credential::{Credential, CredentialPool, CredentialSpec};
pub use proxy::{Proxy, ProxyEndpoint, ProxyPool, ProxyPoolStats};
