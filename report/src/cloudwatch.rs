//! AWS CloudWatch metrics sink

use async_trait::async_trait;
use aws_config::{BehaviorVersion, Region};
use aws_sdk_cloudwatch::error::DisplayErrorContext;
use aws_sdk_cloudwatch::types::{Dimension, MetricDatum, StandardUnit};
use aws_sdk_cloudwatch::Client;
use llmperf_bench_core::{BenchError, BenchResult, MetricsSink, PublishedMetric};

/// Sends one `PutMetricData` call per data point
#[derive(Debug, Clone)]
pub struct CloudWatchSink {
    client: Client,
}

impl CloudWatchSink {
    /// Client for `region` using the default credential chain
    pub async fn from_region(region: &str) -> Self {
        let config = aws_config::defaults(BehaviorVersion::latest())
            .region(Region::new(region.to_string()))
            .load()
            .await;
        Self::from_client(Client::new(&config))
    }

    /// Wrap an existing client
    pub fn from_client(client: Client) -> Self {
        Self { client }
    }
}

fn datum(metric: &PublishedMetric) -> MetricDatum {
    let dimensions = metric
        .dimensions
        .pairs()
        .into_iter()
        .map(|(name, value)| Dimension::builder().name(name).value(value).build())
        .collect::<Vec<_>>();

    MetricDatum::builder()
        .metric_name(&metric.name)
        .set_dimensions(Some(dimensions))
        .unit(StandardUnit::from(metric.unit.as_str()))
        .value(metric.value)
        .build()
}

#[async_trait]
impl MetricsSink for CloudWatchSink {
    fn name(&self) -> &str {
        "cloudwatch"
    }

    async fn put_metric(&self, namespace: &str, metric: &PublishedMetric) -> BenchResult<()> {
        self.client
            .put_metric_data()
            .namespace(namespace)
            .metric_data(datum(metric))
            .send()
            .await
            .map_err(|e| {
                BenchError::metrics(format!("put {}: {}", metric.name, DisplayErrorContext(&e)))
            })?;
        Ok(())
    }
}
