//! Metric records as handed over by the instrumentation SDK.

use mint_protocol::{histogram::estimate_min_max, Dimension, MetricPoint, MetricValue};
use tracing::warn;

/// The value of a data point attribute.
#[derive(Clone, Debug, PartialEq)]
pub enum AttributeValue {
    /// String value.
    String(String),

    /// Signed integer value.
    Int(i64),

    /// Floating-point value.
    Double(f64),

    /// Boolean value.
    Bool(bool),
}

impl AttributeValue {
    fn type_name(&self) -> &'static str {
        match self {
            Self::String(_) => "string",
            Self::Int(_) => "int",
            Self::Double(_) => "double",
            Self::Bool(_) => "bool",
        }
    }
}

impl From<&str> for AttributeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for AttributeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for AttributeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for AttributeValue {
    fn from(value: f64) -> Self {
        Self::Double(value)
    }
}

impl From<bool> for AttributeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// A single data point of a metric record.
#[derive(Clone, Debug, PartialEq)]
pub struct DataPoint<V> {
    attributes: Vec<(String, AttributeValue)>,
    value: V,
    end_time_ms: u64,
}

impl<V> DataPoint<V> {
    /// Creates a new `DataPoint` with the given value and end timestamp, in milliseconds since the Unix epoch.
    pub fn new(value: V, end_time_ms: u64) -> Self {
        Self {
            attributes: Vec::new(),
            value,
            end_time_ms,
        }
    }

    /// Adds an attribute to the data point.
    pub fn with_attribute<K, A>(mut self, key: K, value: A) -> Self
    where
        K: Into<String>,
        A: Into<AttributeValue>,
    {
        self.attributes.push((key.into(), value.into()));
        self
    }

    /// Returns the attributes of the data point.
    pub fn attributes(&self) -> &[(String, AttributeValue)] {
        &self.attributes
    }

    /// Returns the value of the data point.
    pub fn value(&self) -> &V {
        &self.value
    }

    /// Returns the end timestamp of the data point, in milliseconds since the Unix epoch.
    pub fn end_time_ms(&self) -> u64 {
        self.end_time_ms
    }
}

/// Bucketed histogram data.
#[derive(Clone, Debug, PartialEq)]
pub struct HistogramData {
    boundaries: Vec<f64>,
    bucket_counts: Vec<u64>,
    sum: f64,
    count: u64,
    min: Option<f64>,
    max: Option<f64>,
}

impl HistogramData {
    /// Creates a new `HistogramData` from explicit bucket boundaries and per-bucket counts.
    ///
    /// There is one more bucket than there are boundaries: the first bucket is unbounded below, and the last bucket is
    /// unbounded above. The total count is derived from the bucket counts.
    pub fn new(boundaries: Vec<f64>, bucket_counts: Vec<u64>, sum: f64) -> Self {
        let count = bucket_counts.iter().sum();
        Self {
            boundaries,
            bucket_counts,
            sum,
            count,
            min: None,
            max: None,
        }
    }

    /// Sets the exact minimum and maximum, when the SDK tracked them.
    ///
    /// When set, these are used as-is instead of being estimated from the buckets.
    pub fn with_min_max(mut self, min: f64, max: f64) -> Self {
        self.min = Some(min);
        self.max = Some(max);
        self
    }

    /// Returns the total number of values recorded.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Returns the sum of all values recorded.
    pub fn sum(&self) -> f64 {
        self.sum
    }

    fn to_summary(&self) -> MetricValue {
        let (estimated_min, estimated_max) = estimate_min_max(&self.boundaries, &self.bucket_counts, self.sum, self.count);
        MetricValue::Summary {
            min: self.min.unwrap_or(estimated_min),
            max: self.max.unwrap_or(estimated_max),
            sum: self.sum,
            count: self.count,
        }
    }
}

/// Aggregated data of a metric record.
#[derive(Clone, Debug, PartialEq)]
pub enum MetricData {
    /// Monotonic sum, with delta temporality.
    Sum(Vec<DataPoint<f64>>),

    /// Last observed value.
    Gauge(Vec<DataPoint<f64>>),

    /// Bucketed histogram.
    Histogram(Vec<DataPoint<HistogramData>>),
}

/// A metric aggregation record.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricRecord {
    name: String,
    namespace: Option<String>,
    data: MetricData,
}

impl MetricRecord {
    /// Creates a new `MetricRecord`.
    pub fn new<N>(name: N, data: MetricData) -> Self
    where
        N: Into<String>,
    {
        Self {
            name: name.into(),
            namespace: None,
            data,
        }
    }

    /// Sets the namespace of the record.
    pub fn with_namespace<N>(mut self, namespace: N) -> Self
    where
        N: Into<String>,
    {
        self.namespace = Some(namespace.into());
        self
    }

    /// Returns the name of the record.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Converts this record into metric points, one per data point.
    ///
    /// Only string attributes become dimensions. Attributes with any other value type are logged and dropped, while the
    /// data point itself is kept.
    pub fn into_points(self) -> Vec<MetricPoint> {
        let Self { name, namespace, data } = self;

        let build_point = |attributes: &[(String, AttributeValue)], value: MetricValue, end_time_ms: u64| {
            let point = MetricPoint::new(name.clone(), value, end_time_ms)
                .with_dimensions(string_dimensions(&name, attributes));
            match &namespace {
                Some(namespace) => point.with_namespace(namespace.clone()),
                None => point,
            }
        };

        match data {
            MetricData::Sum(points) => points
                .iter()
                .map(|dp| build_point(&dp.attributes, MetricValue::CounterDelta(dp.value), dp.end_time_ms))
                .collect(),
            MetricData::Gauge(points) => points
                .iter()
                .map(|dp| build_point(&dp.attributes, MetricValue::Gauge(dp.value), dp.end_time_ms))
                .collect(),
            MetricData::Histogram(points) => points
                .iter()
                .map(|dp| build_point(&dp.attributes, dp.value.to_summary(), dp.end_time_ms))
                .collect(),
        }
    }
}

fn string_dimensions<'a>(
    metric_name: &'a str, attributes: &'a [(String, AttributeValue)],
) -> impl Iterator<Item = Dimension> + 'a {
    attributes.iter().filter_map(move |(key, value)| match value {
        AttributeValue::String(value) => Some(Dimension::new(key.clone(), value.clone())),
        other => {
            warn!(
                metric_name,
                attribute_key = %key,
                attribute_type = other.type_name(),
                "Unsupported attribute value type. Dropping dimension."
            );
            None
        }
    })
}
