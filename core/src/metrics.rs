//! Summary artifacts and metric publication

use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::config::MetricSpec;
use crate::error::{BenchError, BenchResult};
use crate::traits::MetricsSink;

/// Aggregate fields of a measurement pass, keyed by field name
///
/// Only numeric fields are kept; strings that parse as numbers count as
/// numeric, everything else (nested objects, model names, ...) is dropped.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryArtifact {
    fields: BTreeMap<String, f64>,
}

impl SummaryArtifact {
    /// Empty artifact; publishes nothing
    pub fn empty() -> Self {
        Self::default()
    }

    /// Build from a JSON document; the top level must be an object
    pub fn from_json_slice(raw: &[u8]) -> BenchResult<Self> {
        let value: serde_json::Value = serde_json::from_slice(raw)?;
        let serde_json::Value::Object(map) = value else {
            return Err(BenchError::metrics("summary artifact is not a JSON object"));
        };

        let fields = map
            .into_iter()
            .filter_map(|(name, value)| {
                let number = match &value {
                    serde_json::Value::Number(n) => n.as_f64(),
                    serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
                    _ => None,
                };
                if number.is_none() {
                    tracing::trace!(field = %name, "skipping non-numeric summary field");
                }
                number.map(|n| (name, n))
            })
            .collect();

        Ok(Self { fields })
    }

    /// Read and parse a summary file
    pub async fn read(path: &Path) -> BenchResult<Self> {
        let raw = tokio::fs::read(path).await?;
        Self::from_json_slice(&raw)
    }

    /// Field value
    pub fn get(&self, field: &str) -> Option<f64> {
        self.fields.get(field).copied()
    }

    /// Number of numeric fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the artifact has no fields
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate fields in name order
    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.fields.iter().map(|(k, v)| (k.as_str(), *v))
    }
}

impl FromIterator<(String, f64)> for SummaryArtifact {
    fn from_iter<T: IntoIterator<Item = (String, f64)>>(iter: T) -> Self {
        Self {
            fields: iter.into_iter().collect(),
        }
    }
}

/// Dimension set attached to every data point
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dimensions {
    /// Model identifier
    pub model: String,
    /// Platform label
    pub endpoint: String,
    /// Logical container name
    pub container: String,
    /// Host instance type
    pub instance_type: String,
    /// Concurrency level, decimal
    pub concurrency: String,
}

impl Dimensions {
    /// `(name, value)` pairs in backend order
    pub fn pairs(&self) -> [(&'static str, &str); 5] {
        [
            ("Model", self.model.as_str()),
            ("Endpoint", self.endpoint.as_str()),
            ("Container", self.container.as_str()),
            ("InstanceType", self.instance_type.as_str()),
            ("Concurrency", self.concurrency.as_str()),
        ]
    }
}

impl fmt::Display for Dimensions {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "model={} endpoint={} container={} instance_type={} concurrency={}",
            self.model, self.endpoint, self.container, self.instance_type, self.concurrency
        )
    }
}

/// One data point sent to the metrics backend
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PublishedMetric {
    /// Backend metric name
    pub name: String,
    /// Value
    pub value: f64,
    /// Backend unit
    pub unit: String,
    /// Dimensions
    pub dimensions: Dimensions,
}

/// Maps summary fields onto configured metrics and emits them
pub struct MetricsPublisher {
    sink: Arc<dyn MetricsSink>,
    namespace: String,
    metrics: BTreeMap<String, MetricSpec>,
}

impl MetricsPublisher {
    /// Publisher writing to `sink` under `namespace`
    pub fn new(
        sink: Arc<dyn MetricsSink>,
        namespace: impl Into<String>,
        metrics: BTreeMap<String, MetricSpec>,
    ) -> Self {
        Self {
            sink,
            namespace: namespace.into(),
            metrics,
        }
    }

    /// Data points for the configured fields present in `summary`
    pub fn data_points(&self, summary: &SummaryArtifact, dimensions: &Dimensions) -> Vec<PublishedMetric> {
        summary
            .iter()
            .filter_map(|(field, value)| {
                self.metrics.get(field).map(|spec| PublishedMetric {
                    name: spec.metric_name.clone(),
                    value,
                    unit: spec.unit.clone(),
                    dimensions: dimensions.clone(),
                })
            })
            .collect()
    }

    /// Emit one point per known field
    ///
    /// Every point is attempted; the first sink error is returned afterwards.
    /// Returns the number of points the sink accepted.
    pub async fn publish(
        &self,
        summary: &SummaryArtifact,
        dimensions: &Dimensions,
    ) -> BenchResult<usize> {
        let mut published = 0;
        let mut first_error = None;

        for point in self.data_points(summary, dimensions) {
            match self.sink.put_metric(&self.namespace, &point).await {
                Ok(()) => {
                    published += 1;
                    tracing::info!(
                        metric = %point.name,
                        value = point.value,
                        unit = %point.unit,
                        model = %dimensions.model,
                        endpoint = %dimensions.endpoint,
                        container = %dimensions.container,
                        instance_type = %dimensions.instance_type,
                        concurrency = %dimensions.concurrency,
                        sink = self.sink.name(),
                        "published metric"
                    );
                }
                Err(e) => {
                    tracing::error!(metric = %point.name, %dimensions, error = %e, "failed to publish metric");
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(published),
        }
    }
}

impl fmt::Debug for MetricsPublisher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MetricsPublisher")
            .field("sink", &self.sink.name())
            .field("namespace", &self.namespace)
            .field("metrics", &self.metrics.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingSink {
        points: Mutex<Vec<(String, PublishedMetric)>>,
        fail_on: Option<String>,
    }

    #[async_trait]
    impl MetricsSink for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }

        async fn put_metric(&self, namespace: &str, metric: &PublishedMetric) -> BenchResult<()> {
            if self.fail_on.as_deref() == Some(metric.name.as_str()) {
                return Err(BenchError::metrics("throttled"));
            }
            self.points
                .lock()
                .unwrap()
                .push((namespace.to_string(), metric.clone()));
            Ok(())
        }
    }

    fn dims() -> Dimensions {
        Dimensions {
            model: "m".into(),
            endpoint: "ec2".into(),
            container: "lmi".into(),
            instance_type: "g5.12xlarge".into(),
            concurrency: "4".into(),
        }
    }

    fn metric_map() -> BTreeMap<String, MetricSpec> {
        let mut metrics = BTreeMap::new();
        metrics.insert(
            "results_ttft_s_mean".to_string(),
            MetricSpec {
                metric_name: "TTFT_Mean".into(),
                unit: "Seconds".into(),
            },
        );
        metrics.insert(
            "results_mean_output_throughput_token_per_s".to_string(),
            MetricSpec {
                metric_name: "Throughput".into(),
                unit: "Count/Second".into(),
            },
        );
        metrics
    }

    #[test]
    fn test_summary_keeps_numeric_fields() {
        let raw = br#"{
            "model": "m",
            "num_concurrent_requests": 4,
            "results_ttft_s_mean": 0.25,
            "results_number_errors": "0",
            "results_ttft_s_quantiles": {"p50": 0.2}
        }"#;
        let summary = SummaryArtifact::from_json_slice(raw).unwrap();
        assert_eq!(summary.len(), 3);
        assert_eq!(summary.get("results_ttft_s_mean"), Some(0.25));
        assert_eq!(summary.get("results_number_errors"), Some(0.0));
        assert_eq!(summary.get("model"), None);
    }

    #[test]
    fn test_summary_rejects_non_object() {
        assert!(SummaryArtifact::from_json_slice(b"[1, 2]").is_err());
        assert!(SummaryArtifact::from_json_slice(b"{not json").is_err());
    }

    #[tokio::test]
    async fn test_publish_known_fields_only() {
        let sink = Arc::new(RecordingSink::default());
        let publisher = MetricsPublisher::new(sink.clone(), "Bench", metric_map());
        let summary: SummaryArtifact = [
            ("results_ttft_s_mean".to_string(), 0.5),
            ("results_unknown_field".to_string(), 7.0),
        ]
        .into_iter()
        .collect();

        let published = publisher.publish(&summary, &dims()).await.unwrap();
        assert_eq!(published, 1);

        let points = sink.points.lock().unwrap();
        assert_eq!(points.len(), 1);
        assert_eq!(points[0].0, "Bench");
        assert_eq!(points[0].1.name, "TTFT_Mean");
        assert_eq!(points[0].1.value, 0.5);
        assert_eq!(points[0].1.unit, "Seconds");
        assert_eq!(points[0].1.dimensions, dims());
    }

    #[tokio::test]
    async fn test_publish_unknown_fields_emit_nothing() {
        let sink = Arc::new(RecordingSink::default());
        let publisher = MetricsPublisher::new(sink.clone(), "Bench", metric_map());
        let summary: SummaryArtifact = [("foo".to_string(), 1.0)].into_iter().collect();

        assert_eq!(publisher.publish(&summary, &dims()).await.unwrap(), 0);
        assert_eq!(
            publisher
                .publish(&SummaryArtifact::empty(), &dims())
                .await
                .unwrap(),
            0
        );
        assert!(sink.points.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_publish_continues_after_sink_error() {
        let sink = Arc::new(RecordingSink {
            fail_on: Some("Throughput".into()),
            ..Default::default()
        });
        let publisher = MetricsPublisher::new(sink.clone(), "Bench", metric_map());
        let summary: SummaryArtifact = [
            ("results_mean_output_throughput_token_per_s".to_string(), 900.0),
            ("results_ttft_s_mean".to_string(), 0.5),
        ]
        .into_iter()
        .collect();

        assert!(publisher.publish(&summary, &dims()).await.is_err());
        assert_eq!(sink.points.lock().unwrap().len(), 1);
    }

    #[test]
    fn test_dimension_pairs_order() {
        let names: Vec<_> = dims().pairs().iter().map(|(n, _)| *n).collect();
        assert_eq!(
            names,
            ["Model", "Endpoint", "Container", "InstanceType", "Concurrency"]
        );
    }
}
