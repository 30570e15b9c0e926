//! InfluxDB v1 sink: line protocol encoding and the `/write` endpoint.

use reqwest::StatusCode;
use url::Url;

use thinqpoll_core::{FieldValue, Measurement, MetricsSink, SinkError};

use crate::config::InfluxSection;
use crate::error::CliError;

pub struct InfluxSink {
    http: reqwest::Client,
    write_url: Url,
    credentials: Option<(String, String)>,
}

impl InfluxSink {
    pub fn new(config: &InfluxSection) -> Result<Self, CliError> {
        let base: Url = config.url.parse().map_err(|_| CliError::Validation {
            field: "influx.url".into(),
            reason: format!("invalid URL: {}", config.url),
        })?;
        let mut write_url = base.join("write").map_err(|_| CliError::Validation {
            field: "influx.url".into(),
            reason: "URL cannot serve as a base".into(),
        })?;
        write_url
            .query_pairs_mut()
            .append_pair("db", &config.database);

        let credentials = match (&config.username, &config.password) {
            (Some(user), Some(pass)) => Some((user.clone(), pass.clone())),
            _ => None,
        };

        Ok(Self {
            http: reqwest::Client::new(),
            write_url,
            credentials,
        })
    }
}

impl MetricsSink for InfluxSink {
    async fn write_point(&self, point: &Measurement) -> Result<(), SinkError> {
        let line = encode_line(point);
        tracing::debug!(%line, "writing point");

        let mut request = self.http.post(self.write_url.clone()).body(line);
        if let Some((user, pass)) = &self.credentials {
            request = request.basic_auth(user, Some(pass));
        }

        let response = request.send().await.map_err(|e| SinkError {
            message: format!("request failed: {e}"),
        })?;

        let status = response.status();
        if status == StatusCode::NO_CONTENT || status.is_success() {
            return Ok(());
        }

        let body = response.text().await.unwrap_or_default();
        Err(SinkError {
            message: format!("server returned {status}: {body}"),
        })
    }
}

// ── Line protocol encoding ───────────────────────────────────────────

/// Encode one measurement as an InfluxDB v1 line without a timestamp;
/// the server assigns arrival time.
fn encode_line(point: &Measurement) -> String {
    let mut line = escape_measurement(&point.name);

    for (key, value) in &point.tags {
        line.push(',');
        line.push_str(&escape_tag(key));
        line.push('=');
        line.push_str(&escape_tag(value));
    }

    line.push(' ');
    let mut first = true;
    for (key, value) in &point.fields {
        if !first {
            line.push(',');
        }
        first = false;
        line.push_str(&escape_tag(key));
        line.push('=');
        line.push_str(&encode_field_value(value));
    }

    line
}

fn encode_field_value(value: &FieldValue) -> String {
    match value {
        FieldValue::Int(n) => format!("{n}i"),
        FieldValue::Str(s) => {
            let escaped = s.replace('\\', "\\\\").replace('"', "\\\"");
            format!("\"{escaped}\"")
        }
    }
}

fn escape_measurement(name: &str) -> String {
    name.replace(',', "\\,").replace(' ', "\\ ")
}

/// Tag keys, tag values, and field keys share one escape set.
fn escape_tag(s: &str) -> String {
    s.replace(',', "\\,").replace('=', "\\=").replace(' ', "\\ ")
}
