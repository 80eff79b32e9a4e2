/// A metric dimension.
///
/// Dimensions are key/value pairs attached to a metric point. Neither the key nor the value is normalized when the
/// dimension is created: that happens when the point is serialized.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct Dimension {
    key: String,
    value: String,
}

impl Dimension {
    /// Creates a new `Dimension` from the given key and value.
    pub fn new<K, V>(key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }

    /// Returns the key of the dimension.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the value of the dimension.
    pub fn value(&self) -> &str {
        &self.value
    }
}

impl<K, V> From<(K, V)> for Dimension
where
    K: Into<String>,
    V: Into<String>,
{
    fn from((key, value): (K, V)) -> Self {
        Self::new(key, value)
    }
}

/// The value of a metric point.
#[derive(Clone, Debug, PartialEq)]
pub enum MetricValue {
    /// Change of a counter since the last export.
    CounterDelta(f64),

    /// Point-in-time value.
    Gauge(f64),

    /// Summary of a distribution of values.
    Summary {
        /// Smallest value.
        min: f64,

        /// Largest value.
        max: f64,

        /// Sum of all values.
        sum: f64,

        /// Number of values.
        count: u64,
    },
}

impl MetricValue {
    /// Returns the name of the value type.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::CounterDelta(_) => "counter_delta",
            Self::Gauge(_) => "gauge",
            Self::Summary { .. } => "summary",
        }
    }
}

/// A fully-resolved metric measurement.
#[derive(Clone, Debug, PartialEq)]
pub struct MetricPoint {
    name: String,
    namespace: Option<String>,
    dimensions: Vec<Dimension>,
    timestamp_ms: u64,
    value: MetricValue,
}

impl MetricPoint {
    /// Creates a new `MetricPoint` with the given name, value, and timestamp, in milliseconds since the Unix epoch.
    pub fn new<N>(name: N, value: MetricValue, timestamp_ms: u64) -> Self
    where
        N: Into<String>,
    {
        Self {
            name: name.into(),
            namespace: None,
            dimensions: Vec::new(),
            timestamp_ms,
            value,
        }
    }

    /// Sets the namespace of the metric.
    ///
    /// The namespace is placed between the exporter's prefix, if any, and the metric name when building the metric key.
    pub fn with_namespace<N>(mut self, namespace: N) -> Self
    where
        N: Into<String>,
    {
        self.namespace = Some(namespace.into());
        self
    }

    /// Adds a dimension to the metric.
    pub fn with_dimension<D>(mut self, dimension: D) -> Self
    where
        D: Into<Dimension>,
    {
        self.dimensions.push(dimension.into());
        self
    }

    /// Adds multiple dimensions to the metric, in order.
    pub fn with_dimensions<I, D>(mut self, dimensions: I) -> Self
    where
        I: IntoIterator<Item = D>,
        D: Into<Dimension>,
    {
        self.dimensions.extend(dimensions.into_iter().map(Into::into));
        self
    }

    /// Returns the name of the metric.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the namespace of the metric, if any.
    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    /// Returns the dimensions of the metric.
    pub fn dimensions(&self) -> &[Dimension] {
        &self.dimensions
    }

    /// Returns the timestamp of the metric, in milliseconds since the Unix epoch.
    pub const fn timestamp_ms(&self) -> u64 {
        self.timestamp_ms
    }

    /// Returns the value of the metric.
    pub const fn value(&self) -> &MetricValue {
        &self.value
    }
}
