//! Glimpse Fabric - Ordered delivery of dumps to a viewer
//!
//! Provides the transmission queue that serializes canonical trees and
//! sends them, strictly in submission order and one at a time, over an
//! HTTP transport. Also home to the dumper front end, configuration,
//! call-site attribution and local rendering.
//!
//! # Example
//!
//! ```no_run
//! use glimpse_fabric::{DumpConfig, Dumper};
//! use glimpse_core::Inspect;
//!
//! #[derive(Inspect)]
//! struct Order { id: u64, total: f64 }
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let dumper = Dumper::http(DumpConfig::from_env()?)?;
//!
//! // Queued immediately; awaiting is optional
//! dumper.dump(&Order { id: 7, total: 12.5 }, Some("latest order"));
//! dumper.clear().await?;
//!
//! dumper.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod dumper;
pub mod error;
pub mod queue;
pub mod render;
pub mod source;
pub mod transport;

// Re-exports for convenience
pub use config::{DumpConfig, SourceFormatter};
pub use dumper::{DumpExt, Dumper};
pub use error::{Error, Result};
pub use queue::{Completion, Intent, TransmissionQueue};
pub use render::{ConsoleRenderer, LocalRenderer};
pub use transport::{Endpoint, HttpTransport, Transport};
