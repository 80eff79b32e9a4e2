use std::fmt::Write as _;

use snafu::Snafu;

use crate::{
    normalize::{escape_dimension_value, normalize_dimension_key, normalize_dimension_value, normalize_metric_key},
    number::write_number,
    Dimension, MetricPoint, MetricValue,
};

/// Maximum number of dimensions written for a single metric line.
pub const MAX_DIMENSIONS: usize = 50;

/// Maximum length, in characters, of a single metric line.
pub const MAX_LINE_LENGTH: usize = 2000;

/// Reason a metric point could not be serialized.
///
/// A skipped metric only affects the point being serialized: callers are expected to log it, drop the point, and carry
/// on with the rest of their batch.
#[derive(Debug, PartialEq, Snafu)]
#[snafu(context(suffix(false)))]
pub enum SkippedMetric {
    /// The metric key was invalid after normalization.
    #[snafu(display("metric key '{}' is invalid after normalization", key))]
    InvalidKey {
        /// Metric key prior to normalization.
        key: String,
    },

    /// A metric value was NaN or infinite.
    #[snafu(display("metric '{}' has non-finite value {}", key, value))]
    NonFiniteValue {
        /// Normalized metric key.
        key: String,

        /// Offending value.
        value: f64,
    },

    /// The serialized line exceeded the maximum line length.
    #[snafu(display(
        "metric '{}' serialized to {} characters, exceeding the line length limit of {}",
        key,
        line_len,
        MAX_LINE_LENGTH
    ))]
    LineTooLong {
        /// Normalized metric key.
        key: String,

        /// Length of the serialized line, in characters.
        line_len: usize,
    },
}

/// Serializes metric points into lines of the MINT line protocol.
///
/// Each point becomes exactly one line of the form `metric.key[,dim=val]* payload timestamp_ms`, without a trailing
/// newline. Joining lines into a request payload is left to the caller.
#[derive(Clone, Debug, Default)]
pub struct LineSerializer {
    prefix: Option<String>,
}

impl LineSerializer {
    /// Creates a new `LineSerializer` which prepends the given prefix, if any, to every metric key.
    ///
    /// An empty prefix is treated the same as no prefix at all.
    pub fn new(prefix: Option<String>) -> Self {
        Self {
            prefix: prefix.filter(|prefix| !prefix.is_empty()),
        }
    }

    /// Returns the metric key prefix, if any.
    pub fn prefix(&self) -> Option<&str> {
        self.prefix.as_deref()
    }

    /// Serializes a single metric point.
    ///
    /// The point's own dimensions are written first, followed by `extra_dimensions`, in order. Dimensions whose key is
    /// invalid after normalization are skipped, and at most [`MAX_DIMENSIONS`] dimensions are written in total.
    ///
    /// # Errors
    ///
    /// If the metric key is invalid after normalization, if any value is not finite, or if the resulting line exceeds
    /// [`MAX_LINE_LENGTH`], the point is skipped and an error describing why is returned.
    pub fn serialize(&self, point: &MetricPoint, extra_dimensions: &[Dimension]) -> Result<String, SkippedMetric> {
        let raw_key = self.raw_metric_key(point);
        let key = match normalize_metric_key(&raw_key) {
            Some(key) => key,
            None => return Err(SkippedMetric::InvalidKey { key: raw_key }),
        };

        if let Some(value) = first_non_finite_value(point.value()) {
            return Err(SkippedMetric::NonFiniteValue { key, value });
        }

        let mut line = String::with_capacity(key.len() + 128);
        line.push_str(&key);

        write_dimensions(&mut line, point.dimensions().iter().chain(extra_dimensions));

        line.push(' ');
        write_payload(&mut line, point.value());

        line.push(' ');
        let _ = write!(line, "{}", point.timestamp_ms());

        let line_len = line.chars().count();
        if line_len > MAX_LINE_LENGTH {
            return Err(SkippedMetric::LineTooLong { key, line_len });
        }

        Ok(line)
    }

    fn raw_metric_key(&self, point: &MetricPoint) -> String {
        let segments = [self.prefix.as_deref(), point.namespace(), Some(point.name())];
        segments
            .into_iter()
            .flatten()
            .filter(|segment| !segment.is_empty())
            .collect::<Vec<_>>()
            .join(".")
    }
}

fn first_non_finite_value(value: &MetricValue) -> Option<f64> {
    match value {
        MetricValue::CounterDelta(value) | MetricValue::Gauge(value) => Some(*value).filter(|v| !v.is_finite()),
        MetricValue::Summary { min, max, sum, .. } => [*min, *max, *sum].into_iter().find(|v| !v.is_finite()),
    }
}

fn write_dimensions<'a, I>(line: &mut String, dimensions: I)
where
    I: Iterator<Item = &'a Dimension>,
{
    let mut written = 0;
    for dimension in dimensions {
        if written == MAX_DIMENSIONS {
            break;
        }

        let key = match normalize_dimension_key(dimension.key()) {
            Some(key) => key,
            None => continue,
        };
        let value = escape_dimension_value(&normalize_dimension_value(dimension.value()));

        line.push(',');
        line.push_str(&key);
        line.push('=');
        line.push_str(&value);
        written += 1;
    }
}

fn write_payload(line: &mut String, value: &MetricValue) {
    match value {
        MetricValue::CounterDelta(delta) => {
            line.push_str("count,delta=");
            write_number(line, *delta);
        }
        MetricValue::Gauge(value) => {
            line.push_str("gauge,");
            write_number(line, *value);
        }
        MetricValue::Summary { min, max, sum, count } => {
            line.push_str("gauge,min=");
            write_number(line, *min);
            line.push_str(",max=");
            write_number(line, *max);
            line.push_str(",sum=");
            write_number(line, *sum);
            line.push_str(",count=");
            let _ = write!(line, "{}", count);
        }
    }
}
