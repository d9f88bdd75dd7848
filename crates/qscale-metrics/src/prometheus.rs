//! Prometheus instant-query client.
//!
//! Issues `GET /api/v1/query?query=…` over a plain HTTP/1 connection and
//! extracts the first sample of the instant vector. One request per
//! signal, one connection per request — observation cadence is seconds,
//! not milliseconds, and a pooled client buys nothing here.

use std::time::Duration;

use async_trait::async_trait;
use http_body_util::BodyExt;
use tracing::debug;

use qscale_core::{MetricsConfig, Observation};

use crate::error::MetricsError;
use crate::source::MetricsSource;

/// Metrics source backed by a Prometheus-compatible query API.
pub struct PrometheusSource {
    /// `host:port` of the query API.
    address: String,
    utilization_query: String,
    rtt_query: String,
    replicas_query: String,
    timeout: Duration,
}

impl PrometheusSource {
    /// Build a source from config. Fails on URLs this client cannot
    /// reach (anything but plain `http://host[:port]`).
    pub fn new(config: &MetricsConfig) -> Result<Self, MetricsError> {
        let address = host_from_url(&config.prometheus_url)?;
        Ok(Self {
            address,
            utilization_query: config.utilization_query.clone(),
            rtt_query: config.rtt_query.clone(),
            replicas_query: config.replicas_query.clone(),
            timeout: config.request_timeout().unwrap_or(Duration::from_secs(5)),
        })
    }

    /// Run one instant query and return its first sample value.
    pub async fn query_value(&self, query: &str) -> Result<f64, MetricsError> {
        let uri = format!(
            "http://{}/api/v1/query?query={}",
            self.address,
            encode_query(query)
        );

        let body = tokio::time::timeout(self.timeout, self.fetch(&uri))
            .await
            .map_err(|_| MetricsError::Unavailable {
                reason: format!("query timed out after {:?}", self.timeout),
            })??;

        parse_instant_value(&body, query)
    }

    async fn fetch(&self, uri: &str) -> Result<bytes::Bytes, MetricsError> {
        let stream = tokio::net::TcpStream::connect(&self.address)
            .await
            .map_err(|e| MetricsError::Unavailable {
                reason: format!("connect {}: {e}", self.address),
            })?;

        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| MetricsError::Unavailable {
                reason: format!("handshake: {e}"),
            })?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = http::Request::builder()
            .method("GET")
            .uri(uri)
            .header("host", &self.address)
            .header("user-agent", "qscale-metrics/0.1")
            .body(http_body_util::Empty::<bytes::Bytes>::new())
            .map_err(|e| MetricsError::Unavailable {
                reason: format!("request build: {e}"),
            })?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| MetricsError::Unavailable {
                reason: format!("request: {e}"),
            })?;

        if !resp.status().is_success() {
            return Err(MetricsError::Unavailable {
                reason: format!("query API returned {}", resp.status()),
            });
        }

        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| MetricsError::Unavailable {
                reason: format!("body read: {e}"),
            })?
            .to_bytes();

        Ok(body)
    }
}

#[async_trait]
impl MetricsSource for PrometheusSource {
    async fn observe(&self) -> Result<Observation, MetricsError> {
        let utilization = self.query_value(&self.utilization_query).await?;
        let rtt_ms = self.query_value(&self.rtt_query).await?;
        let replicas_raw = self.query_value(&self.replicas_query).await?;

        let replicas = replicas_raw.round();
        if !(0.0..=u32::MAX as f64).contains(&replicas) {
            return Err(MetricsError::Malformed {
                reason: format!("replica count out of range: {replicas_raw}"),
            });
        }

        let obs = Observation {
            utilization,
            rtt_ms,
            replicas: replicas as u32,
        };
        debug!(
            utilization = obs.utilization,
            rtt_ms = obs.rtt_ms,
            replicas = obs.replicas,
            "observed"
        );
        Ok(obs)
    }
}

/// Extract `host:port` from a plain-http base URL.
fn host_from_url(url: &str) -> Result<String, MetricsError> {
    let rest = url.strip_prefix("http://").ok_or_else(|| {
        MetricsError::Unavailable {
            reason: format!("unsupported metrics url (need http://): {url}"),
        }
    })?;
    let host = rest.split('/').next().unwrap_or_default();
    if host.is_empty() {
        return Err(MetricsError::Unavailable {
            reason: format!("metrics url has no host: {url}"),
        });
    }
    Ok(if host.contains(':') {
        host.to_string()
    } else {
        format!("{host}:80")
    })
}

/// Percent-encode a PromQL expression for use as a query-string value.
fn encode_query(query: &str) -> String {
    let mut out = String::with_capacity(query.len() * 3);
    for byte in query.bytes() {
        match byte {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => {
                out.push(byte as char)
            }
            _ => {
                out.push('%');
                out.push_str(&format!("{byte:02X}"));
            }
        }
    }
    out
}

/// Pull the first sample value out of an instant-vector response.
fn parse_instant_value(body: &[u8], query: &str) -> Result<f64, MetricsError> {
    let parsed: serde_json::Value =
        serde_json::from_slice(body).map_err(|e| MetricsError::Malformed {
            reason: format!("response is not JSON: {e}"),
        })?;

    if parsed["status"] != "success" {
        return Err(MetricsError::Malformed {
            reason: format!("query status {:?}", parsed["status"]),
        });
    }

    let result = parsed["data"]["result"]
        .as_array()
        .ok_or_else(|| MetricsError::Malformed {
            reason: "missing data.result".to_string(),
        })?;

    let first = result.first().ok_or_else(|| MetricsError::EmptyResult {
        query: query.to_string(),
    })?;

    // Instant vectors carry [timestamp, "value-as-string"].
    let value = first["value"][1]
        .as_str()
        .ok_or_else(|| MetricsError::Malformed {
            reason: "sample value is not a string".to_string(),
        })?;

    value.parse::<f64>().map_err(|e| MetricsError::Malformed {
        reason: format!("sample value {value:?}: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_instant_vector_sample() {
        let body = br#"{"status":"success","data":{"resultType":"vector",
            "result":[{"metric":{},"value":[1712000000.0,"42.5"]}]}}"#;
        assert_eq!(parse_instant_value(body, "q").unwrap(), 42.5);
    }

    #[test]
    fn empty_result_is_its_own_error() {
        let body = br#"{"status":"success","data":{"resultType":"vector","result":[]}}"#;
        assert!(matches!(
            parse_instant_value(body, "up"),
            Err(MetricsError::EmptyResult { query }) if query == "up"
        ));
    }

    #[test]
    fn error_status_is_malformed() {
        let body = br#"{"status":"error","errorType":"bad_data","error":"parse error"}"#;
        assert!(matches!(
            parse_instant_value(body, "q"),
            Err(MetricsError::Malformed { .. })
        ));
    }

    #[test]
    fn non_json_body_is_malformed() {
        assert!(matches!(
            parse_instant_value(b"<html>502</html>", "q"),
            Err(MetricsError::Malformed { .. })
        ));
    }

    #[test]
    fn host_extraction() {
        assert_eq!(host_from_url("http://prom:9090").unwrap(), "prom:9090");
        assert_eq!(
            host_from_url("http://prom:9090/api").unwrap(),
            "prom:9090"
        );
        assert_eq!(host_from_url("http://prom").unwrap(), "prom:80");
        assert!(host_from_url("https://prom:9090").is_err());
    }

    #[test]
    fn query_encoding_escapes_reserved_bytes() {
        assert_eq!(encode_query("up"), "up");
        assert_eq!(
            encode_query("rate(x{pod=~'a.*'}[1m])"),
            "rate%28x%7Bpod%3D~%27a.%2A%27%7D%5B1m%5D%29"
        );
    }
}
