//! Report generation and signing.
//!
//! - `lifecycle` - prepare, sign, download and send
//! - `gateway` - public QR verification
//! - `store` / `memory` - record access
//! - `delivery` - background worker for sent reports

pub mod delivery;
pub mod gateway;
pub mod handlers;
pub mod lifecycle;
pub mod memory;
pub mod model;
pub mod store;

pub use gateway::VerificationGateway;
pub use lifecycle::ReportLifecycle;
pub use memory::MemoryReportStore;
pub use store::ReportStore;
