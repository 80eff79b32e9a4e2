//! Normalization and serialization engine for the MINT metric ingestion line protocol.
//!
//! Everything in this crate is pure and synchronous: it turns externally-supplied metric names, dimensions, and values
//! into lines of the form `metric.key[,dim=val]* payload timestamp_ms`, and leaves transport concerns to the caller.
#![deny(missing_docs)]

pub mod histogram;
pub mod normalize;
pub mod number;

mod point;
pub use self::point::{Dimension, MetricPoint, MetricValue};

mod serializer;
pub use self::serializer::{LineSerializer, SkippedMetric, MAX_DIMENSIONS, MAX_LINE_LENGTH};
