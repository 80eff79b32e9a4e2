//! Exporter for the MINT metric ingest protocol.
//!
//! Converts metric aggregation records into MINT lines, enriches them with default and process metadata dimensions,
//! and sends them to an ingest endpoint over HTTP in bounded payloads.
#![deny(missing_docs)]

mod error;
pub use self::error::{ErrorContext, GenericError};

pub mod config;
pub mod logging;
pub mod metadata;
pub mod record;
pub mod transport;

mod exporter;
pub use self::exporter::{ExportError, ExportOutcome, MintExporter, PAYLOAD_LINES_LIMIT};
