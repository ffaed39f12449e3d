//! Metrics sinks

pub mod influx;

pub use influx::InfluxSink;

use async_trait::async_trait;

use crate::core::{ApiError, MetricPoint};

/// Accepts batches of time-series points
#[async_trait]
pub trait MetricsSink: Send + Sync {
    async fn write_points(&self, points: &[MetricPoint]) -> Result<(), ApiError>;
}

#[cfg(test)]
pub mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Sink that keeps every batch in memory
    #[derive(Default)]
    pub struct RecordingSink {
        pub batches: Mutex<Vec<Vec<MetricPoint>>>,
    }

    impl RecordingSink {
        pub fn batches(&self) -> Vec<Vec<MetricPoint>> {
            self.batches.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl MetricsSink for RecordingSink {
        async fn write_points(&self, points: &[MetricPoint]) -> Result<(), ApiError> {
            self.batches.lock().unwrap().push(points.to_vec());
            Ok(())
        }
    }
}
