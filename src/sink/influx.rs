//! InfluxDB 1.x sink using the line protocol over HTTP

use async_trait::async_trait;

use super::MetricsSink;
use crate::core::{ApiError, FieldValue, MetricPoint};

pub struct InfluxSink {
    client: reqwest::Client,
    url: String,
    database: String,
}

impl InfluxSink {
    pub fn new(client: reqwest::Client, url: &str, database: &str) -> Self {
        Self {
            client,
            url: url.trim_end_matches('/').to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl MetricsSink for InfluxSink {
    async fn write_points(&self, points: &[MetricPoint]) -> Result<(), ApiError> {
        if points.is_empty() {
            return Ok(());
        }

        let body = points.iter().map(line).collect::<Vec<_>>().join("\n");
        tracing::debug!("Writing {} point(s) to {}", points.len(), self.database);

        let response = self
            .client
            .post(format!("{}/write", self.url))
            .query(&[("db", self.database.as_str()), ("precision", "ms")])
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ApiError::from_status(status.as_u16(), &text));
        }
        Ok(())
    }
}

/// Render one point as a line-protocol record
pub fn line(point: &MetricPoint) -> String {
    let mut out = escape(&point.series, &[',', ' ']);
    for (key, value) in &point.tags {
        out.push(',');
        out.push_str(&escape(key, &[',', '=', ' ']));
        out.push('=');
        out.push_str(&escape(value, &[',', '=', ' ']));
    }

    let fields = point
        .fields
        .iter()
        .map(|(key, value)| format!("{}={}", escape(key, &[',', '=', ' ']), field_value(value)))
        .collect::<Vec<_>>()
        .join(",");

    format!("{} {} {}", out, fields, point.timestamp)
}

fn field_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Float(v) => format!("{}", v),
        FieldValue::Integer(v) => format!("{}i", v),
        FieldValue::Text(s) => format!("\"{}\"", s.replace('\\', "\\\\").replace('"', "\\\"")),
    }
}

fn escape(s: &str, special: &[char]) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        if special.contains(&c) {
            out.push('\\');
        }
        out.push(c);
    }
    out
}
