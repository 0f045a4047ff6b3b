//! LoadTrace Adapter Implementations
//!
//! Thin adapters for the external collaborators behind the `lt-ports`
//! traits:
//! - Platform tracking API (load lookup)
//! - Network relationship API
//! - Warehouse SQL (load validation, company permalinks)
//! - Carrier-portal scrape history
//! - Webhook delivery history
//! - Structured log search
//! - Wiki/chat/issue-tracker document search
//! - The reasoning-oracle HTTP client (plus a deterministic offline oracle)
//!
//! Each adapter realizes operation signatures and failure shapes only; all
//! policy (deadlines, retention clamping, caching) lives in the engine's
//! registry.

pub mod oracle;
pub mod sources;

pub use oracle::{HttpOracle, OracleConfig, StaticOracle};
pub use sources::canned::CannedSource;
pub use sources::docs::DocSearchSource;
pub use sources::logs::LogSearchSource;
pub use sources::network::NetworkApiSource;
pub use sources::platform::PlatformApiSource;
pub use sources::portal::PortalHistorySource;
pub use sources::warehouse::WarehouseSource;
pub use sources::webhook::WebhookHistorySource;
