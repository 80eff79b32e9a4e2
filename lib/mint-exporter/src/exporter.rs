use mint_protocol::{Dimension, LineSerializer, MetricPoint};
use snafu::Snafu;
use tracing::{debug, warn};

use crate::{
    config::MintExporterConfiguration,
    metadata::ProcessMetadata,
    record::MetricRecord,
    transport::{HttpTransport, IngestTransport, TransportError},
    GenericError,
};

/// Maximum number of lines sent in a single ingest request.
pub const PAYLOAD_LINES_LIMIT: usize = 1000;

/// Result of an export call.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ExportOutcome {
    /// Every point was serialized and every payload was accepted.
    Success,

    /// Some points were dropped during serialization, but every payload was accepted.
    PartialFailure {
        /// Number of points dropped.
        dropped: usize,
    },

    /// At least one payload was rejected by the ingest endpoint.
    TransmissionFailure {
        /// Number of payloads rejected.
        failed_groups: usize,

        /// Number of payloads sent.
        total_groups: usize,
    },
}

/// An export error.
#[derive(Debug, Snafu)]
#[snafu(context(suffix(false)))]
pub enum ExportError {
    /// A payload could not be delivered to the ingest endpoint.
    #[snafu(display("failed to send payload {} of {}: {}", group + 1, total_groups, source))]
    Transport {
        /// Zero-based index of the payload that failed.
        group: usize,

        /// Number of payloads in the export call.
        total_groups: usize,

        /// Error source.
        source: TransportError,
    },
}

/// Exports metrics to a MINT ingest endpoint.
///
/// Each export call enriches points with the extra dimensions resolved at construction (configured defaults, followed
/// by process metadata), serializes them into lines, and sends the lines in payloads of at most
/// [`PAYLOAD_LINES_LIMIT`] lines, one request at a time.
///
/// Points that cannot be serialized are logged and dropped without affecting the rest of the batch. A payload rejected
/// by the ingest endpoint does not stop the remaining payloads from being sent, while a transport error aborts the
/// export call.
pub struct MintExporter<T = HttpTransport> {
    serializer: LineSerializer,
    extra_dimensions: Vec<Dimension>,
    transport: T,
}

impl MintExporter<HttpTransport> {
    /// Creates a new `MintExporter` sending over HTTP, based on the given configuration.
    ///
    /// # Errors
    ///
    /// If the ingest URL is invalid, or the HTTP transport cannot be created, an error will be returned.
    pub fn from_configuration(config: &MintExporterConfiguration) -> Result<Self, GenericError> {
        let transport = HttpTransport::new(config.endpoint()?, config.api_token(), config.request_timeout())?;
        Ok(Self::with_transport(config, transport))
    }
}

impl<T> MintExporter<T>
where
    T: IngestTransport,
{
    /// Creates a new `MintExporter` sending over the given transport.
    ///
    /// Process metadata, when enabled, is read once here and reused by every export call.
    pub fn with_transport(config: &MintExporterConfiguration, transport: T) -> Self {
        let mut extra_dimensions = config.default_dimensions();
        if config.enrich_with_metadata() {
            let metadata = ProcessMetadata::from_indirection_file(config.metadata_file());
            extra_dimensions.extend(metadata.read_dimensions());
        }

        debug!(
            prefix = config.prefix().unwrap_or_default(),
            extra_dimensions = extra_dimensions.len(),
            "Created MINT exporter."
        );

        Self {
            serializer: LineSerializer::new(config.prefix().map(ToString::to_string)),
            extra_dimensions,
            transport,
        }
    }

    /// Returns the dimensions added to every exported point, after the point's own dimensions.
    pub fn extra_dimensions(&self) -> &[Dimension] {
        &self.extra_dimensions
    }

    /// Exports the given metric records.
    ///
    /// # Errors
    ///
    /// If a payload could not be delivered, an error will be returned. Payloads sent before the failing one are not
    /// retracted.
    pub async fn export<I>(&self, records: I) -> Result<ExportOutcome, ExportError>
    where
        I: IntoIterator<Item = MetricRecord>,
    {
        let points = records
            .into_iter()
            .flat_map(MetricRecord::into_points)
            .collect::<Vec<_>>();
        self.export_points(&points).await
    }

    /// Exports the given metric points.
    ///
    /// # Errors
    ///
    /// If a payload could not be delivered, an error will be returned. Payloads sent before the failing one are not
    /// retracted.
    pub async fn export_points(&self, points: &[MetricPoint]) -> Result<ExportOutcome, ExportError> {
        let (lines, dropped) = self.serialize_points(points);

        let payloads = lines
            .chunks(PAYLOAD_LINES_LIMIT)
            .map(|chunk| chunk.join("\n"))
            .collect::<Vec<_>>();
        let total_groups = payloads.len();

        let mut failed_groups = 0;
        for (group, payload) in payloads.into_iter().enumerate() {
            let status = self
                .transport
                .send(payload)
                .await
                .map_err(|source| ExportError::Transport {
                    group,
                    total_groups,
                    source,
                })?;

            if !status.is_success() {
                warn!(status = status.as_u16(), group, total_groups, "Ingest endpoint rejected payload.");
                failed_groups += 1;
            }
        }

        debug!(points = points.len(), dropped, total_groups, failed_groups, "Finished export.");

        Ok(if failed_groups > 0 {
            ExportOutcome::TransmissionFailure {
                failed_groups,
                total_groups,
            }
        } else if dropped > 0 {
            ExportOutcome::PartialFailure { dropped }
        } else {
            ExportOutcome::Success
        })
    }

    fn serialize_points(&self, points: &[MetricPoint]) -> (Vec<String>, usize) {
        points
            .iter()
            .fold((Vec::with_capacity(points.len()), 0), |(mut lines, dropped), point| {
                match self.serializer.serialize(point, &self.extra_dimensions) {
                    Ok(line) => {
                        lines.push(line);
                        (lines, dropped)
                    }
                    Err(e) => {
                        warn!(
                            metric_name = point.name(),
                            value_type = point.value().as_str(),
                            error = %e,
                            "Skipping metric."
                        );
                        (lines, dropped + 1)
                    }
                }
            })
    }
}

#[cfg(test)]
mod tests {
    use std::{collections::VecDeque, sync::Mutex, time::Duration};

    use async_trait::async_trait;
    use http::StatusCode;
    use mint_protocol::MetricValue;

    use super::*;
    use crate::record::{DataPoint, HistogramData, MetricData};

    /// Records every payload and answers with scripted responses, defaulting to `202 Accepted`.
    #[derive(Default)]
    struct RecordingTransport {
        payloads: Mutex<Vec<String>>,
        responses: Mutex<VecDeque<Result<StatusCode, TransportError>>>,
    }

    impl RecordingTransport {
        fn with_responses<I>(responses: I) -> Self
        where
            I: IntoIterator<Item = Result<StatusCode, TransportError>>,
        {
            Self {
                payloads: Mutex::new(Vec::new()),
                responses: Mutex::new(responses.into_iter().collect()),
            }
        }

        fn payloads(&self) -> Vec<String> {
            self.payloads.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl IngestTransport for RecordingTransport {
        async fn send(&self, payload: String) -> Result<StatusCode, TransportError> {
            self.payloads.lock().unwrap().push(payload);
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(Ok(StatusCode::ACCEPTED))
        }
    }

    fn test_config() -> MintExporterConfiguration {
        MintExporterConfiguration::default().with_metadata_enrichment(false)
    }

    fn gauges(count: usize) -> Vec<MetricPoint> {
        (0..count)
            .map(|i| MetricPoint::new(format!("gauge{}", i), MetricValue::Gauge(i as f64), 1_000))
            .collect()
    }

    #[tokio::test]
    async fn partitions_payloads() {
        let exporter = MintExporter::with_transport(&test_config(), RecordingTransport::default());

        let outcome = exporter.export_points(&gauges(2500)).await.unwrap();
        assert_eq!(outcome, ExportOutcome::Success);

        let payloads = exporter.transport.payloads();
        let line_counts = payloads.iter().map(|p| p.lines().count()).collect::<Vec<_>>();
        assert_eq!(line_counts, vec![1000, 1000, 500]);

        assert!(payloads[0].starts_with("gauge0 gauge,0 1000\n"));
        assert!(payloads[1].starts_with("gauge1000 gauge,1000 1000\n"));
        assert!(payloads[2].ends_with("gauge2499 gauge,2499 1000"));
    }

    #[tokio::test]
    async fn rejected_payload_does_not_stop_remaining_payloads() {
        let transport = RecordingTransport::with_responses([Ok(StatusCode::BAD_REQUEST), Ok(StatusCode::ACCEPTED)]);
        let exporter = MintExporter::with_transport(&test_config(), transport);

        let outcome = exporter.export_points(&gauges(1500)).await.unwrap();
        assert_eq!(
            outcome,
            ExportOutcome::TransmissionFailure {
                failed_groups: 1,
                total_groups: 2
            }
        );
        assert_eq!(exporter.transport.payloads().len(), 2);
    }

    #[tokio::test]
    async fn transport_error_aborts_export() {
        let transport = RecordingTransport::with_responses([
            Ok(StatusCode::OK),
            Err(TransportError::Timeout {
                timeout: Duration::from_secs(20),
            }),
        ]);
        let exporter = MintExporter::with_transport(&test_config(), transport);

        let result = exporter.export_points(&gauges(3000)).await;
        assert!(matches!(
            result,
            Err(ExportError::Transport {
                group: 1,
                total_groups: 3,
                ..
            })
        ));
        assert_eq!(exporter.transport.payloads().len(), 2);
    }

    #[tokio::test]
    async fn dropped_points_are_partial_failure() {
        let exporter = MintExporter::with_transport(&test_config(), RecordingTransport::default());

        let points = vec![
            MetricPoint::new("valid", MetricValue::CounterDelta(1.0), 1_000),
            MetricPoint::new(".a.", MetricValue::CounterDelta(1.0), 1_000),
            MetricPoint::new("nan", MetricValue::Gauge(f64::NAN), 1_000),
        ];
        let outcome = exporter.export_points(&points).await.unwrap();
        assert_eq!(outcome, ExportOutcome::PartialFailure { dropped: 2 });
        assert_eq!(exporter.transport.payloads(), vec!["valid count,delta=1 1000".to_string()]);
    }

    #[tokio::test]
    async fn oversized_line_sends_nothing() {
        let exporter = MintExporter::with_transport(&test_config(), RecordingTransport::default());

        let point = (0..20).fold(MetricPoint::new("metric", MetricValue::Gauge(1.0), 1_000), |point, i| {
            point.with_dimension((format!("dim{}", i), "v".repeat(100)))
        });
        let outcome = exporter.export_points(&[point]).await.unwrap();
        assert_eq!(outcome, ExportOutcome::PartialFailure { dropped: 1 });
        assert!(exporter.transport.payloads().is_empty());
    }

    #[tokio::test]
    async fn empty_batch() {
        let exporter = MintExporter::with_transport(&test_config(), RecordingTransport::default());

        assert_eq!(exporter.export(Vec::new()).await.unwrap(), ExportOutcome::Success);
        assert!(exporter.transport.payloads().is_empty());
    }

    #[tokio::test]
    async fn enrichment_order() {
        let dir = tempfile::tempdir().unwrap();
        let metadata_file = dir.path().join("metadata.properties");
        std::fs::write(&metadata_file, "dt.entity.process_group_instance=PGI-1\n").unwrap();
        let indirection_file = dir.path().join("indirection");
        std::fs::write(&indirection_file, metadata_file.display().to_string()).unwrap();

        let config = MintExporterConfiguration::default()
            .with_prefix("otel")
            .with_default_dimension("env", "prod")
            .with_metadata_file(&indirection_file);
        let exporter = MintExporter::with_transport(&config, RecordingTransport::default());

        let record = MetricRecord::new(
            "requests",
            MetricData::Sum(vec![DataPoint::new(3.0, 1_000).with_attribute("route", "/home")]),
        );
        let outcome = exporter.export([record]).await.unwrap();
        assert_eq!(outcome, ExportOutcome::Success);
        assert_eq!(
            exporter.transport.payloads(),
            vec![
                "otel.requests,route=/home,env=prod,dt.entity.process_group_instance=PGI-1 count,delta=3 1000".to_string()
            ]
        );
    }

    #[tokio::test]
    async fn histogram_records_export_as_summaries() {
        let exporter = MintExporter::with_transport(&test_config(), RecordingTransport::default());

        let histogram = HistogramData::new(vec![1.0, 2.0, 3.0, 4.0, 5.0], vec![0, 1, 0, 3, 2, 0], 21.1);
        let record = MetricRecord::new("latency", MetricData::Histogram(vec![DataPoint::new(histogram, 1_000)]))
            .with_namespace("http");
        let outcome = exporter.export([record]).await.unwrap();
        assert_eq!(outcome, ExportOutcome::Success);
        assert_eq!(
            exporter.transport.payloads(),
            vec!["http.latency gauge,min=1,max=5,sum=21.1,count=6 1000".to_string()]
        );
    }
}
