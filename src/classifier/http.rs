//! Remote classifier over JSON/HTTP.
//!
//! POSTs `{sender, subject, body, reference_time}` and expects
//! `{is_task, urgency_tier, deadline}` back, with `urgency_tier` in 1..=3.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::classifier::{ClassifyRequest, Classifier, Verdict};
use crate::error::ClassifyError;
use crate::model::UrgencyTier;

const CLASSIFIER_NAME: &str = "http";

/// Classifier backed by a remote model endpoint.
pub struct HttpClassifier {
    endpoint: String,
    timeout: Duration,
    client: reqwest::Client,
}

/// Response body returned by the remote model.
#[derive(Debug, Deserialize)]
struct WireVerdict {
    is_task: bool,
    urgency_tier: u8,
    #[serde(default)]
    deadline: Option<DateTime<Utc>>,
}

impl WireVerdict {
    fn into_verdict(self) -> Result<Verdict, ClassifyError> {
        let urgency =
            UrgencyTier::from_level(self.urgency_tier).ok_or_else(|| ClassifyError::InvalidVerdict {
                name: CLASSIFIER_NAME.into(),
                reason: format!("urgency_tier {} outside 1..=3", self.urgency_tier),
            })?;
        Ok(Verdict {
            is_task: self.is_task,
            urgency,
            deadline: self.deadline,
        })
    }
}

impl HttpClassifier {
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ClassifyError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| ClassifyError::Unavailable {
                name: CLASSIFIER_NAME.into(),
                reason: format!("Failed to create HTTP client: {e}"),
            })?;
        Ok(Self {
            endpoint: endpoint.into(),
            timeout,
            client,
        })
    }

    fn transport_error(&self, e: reqwest::Error) -> ClassifyError {
        if e.is_timeout() {
            ClassifyError::Timeout {
                name: CLASSIFIER_NAME.into(),
                timeout: self.timeout,
            }
        } else {
            ClassifyError::Unavailable {
                name: CLASSIFIER_NAME.into(),
                reason: e.to_string(),
            }
        }
    }
}

#[async_trait]
impl Classifier for HttpClassifier {
    fn name(&self) -> &str {
        CLASSIFIER_NAME
    }

    async fn classify(&self, request: &ClassifyRequest) -> Result<Verdict, ClassifyError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(request)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(ClassifyError::Unavailable {
                name: CLASSIFIER_NAME.into(),
                reason: format!("HTTP {status}: {error_text}"),
            });
        }

        let wire: WireVerdict = response.json().await.map_err(|e| {
            if e.is_timeout() {
                self.transport_error(e)
            } else {
                ClassifyError::InvalidVerdict {
                    name: CLASSIFIER_NAME.into(),
                    reason: e.to_string(),
                }
            }
        })?;
        wire.into_verdict()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn request() -> ClassifyRequest {
        ClassifyRequest {
            sender: "boss@example.com".into(),
            subject: "Report due".into(),
            body: "Please submit by tomorrow".into(),
            reference_time: Utc.with_ymd_and_hms(2026, 3, 10, 8, 0, 0).unwrap(),
        }
    }

    /// Serve exactly one HTTP response and hand back the raw request.
    async fn one_shot_server(status: &'static str, body: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut raw = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                raw.extend_from_slice(&buf[..n]);
                let text = String::from_utf8_lossy(&raw);
                if let Some(split) = text.find("\r\n\r\n") {
                    let content_length = text[..split]
                        .lines()
                        .find_map(|l| {
                            let lower = l.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if raw.len() >= split + 4 + content_length {
                        break;
                    }
                }
            }
            let response = format!(
                "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            socket.shutdown().await.unwrap();
            String::from_utf8_lossy(&raw).to_string()
        });
        (format!("http://{addr}/classify"), handle)
    }

    #[test]
    fn wire_verdict_maps_tier() {
        let wire: WireVerdict = serde_json::from_str(
            r#"{"is_task": true, "urgency_tier": 2, "deadline": "2026-03-11T08:00:00Z"}"#,
        )
        .unwrap();
        let v = wire.into_verdict().unwrap();
        assert!(v.is_task);
        assert_eq!(v.urgency, UrgencyTier::SomewhatUrgent);
        assert_eq!(v.deadline, Some(Utc.with_ymd_and_hms(2026, 3, 11, 8, 0, 0).unwrap()));
    }

    #[test]
    fn wire_verdict_null_deadline() {
        let wire: WireVerdict =
            serde_json::from_str(r#"{"is_task": false, "urgency_tier": 1, "deadline": null}"#).unwrap();
        assert!(wire.into_verdict().unwrap().deadline.is_none());
    }

    #[test]
    fn wire_verdict_rejects_out_of_range_tier() {
        let wire: WireVerdict =
            serde_json::from_str(r#"{"is_task": true, "urgency_tier": 4}"#).unwrap();
        let err = wire.into_verdict().unwrap_err();
        assert!(matches!(err, ClassifyError::InvalidVerdict { .. }));
    }

    #[tokio::test]
    async fn classify_posts_request_and_parses_verdict() {
        let (url, server) = one_shot_server(
            "200 OK",
            r#"{"is_task": true, "urgency_tier": 3, "deadline": null}"#,
        )
        .await;
        let classifier = HttpClassifier::new(url, Duration::from_secs(5)).unwrap();

        let verdict = classifier.classify(&request()).await.unwrap();
        assert!(verdict.is_task);
        assert_eq!(verdict.urgency, UrgencyTier::Urgent);

        let raw = server.await.unwrap();
        assert!(raw.starts_with("POST /classify"));
        assert!(raw.contains("\"subject\":\"Report due\""));
        assert!(raw.contains("\"reference_time\":\"2026-03-10T08:00:00Z\""));
    }

    #[tokio::test]
    async fn classify_maps_server_error_to_unavailable() {
        let (url, _server) = one_shot_server("503 Service Unavailable", r#"{"error":"busy"}"#).await;
        let classifier = HttpClassifier::new(url, Duration::from_secs(5)).unwrap();

        let err = classifier.classify(&request()).await.unwrap_err();
        assert!(matches!(err, ClassifyError::Unavailable { .. }));
    }

    #[tokio::test]
    async fn classify_unreachable_endpoint_is_unavailable() {
        // Bind then drop to get a port with nothing listening.
        let addr = TcpListener::bind("127.0.0.1:0")
            .await
            .unwrap()
            .local_addr()
            .unwrap();
        let classifier =
            HttpClassifier::new(format!("http://{addr}/classify"), Duration::from_secs(2)).unwrap();

        let err = classifier.classify(&request()).await.unwrap_err();
        assert!(matches!(
            err,
            ClassifyError::Unavailable { .. } | ClassifyError::Timeout { .. }
        ));
    }
}
