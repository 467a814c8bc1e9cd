// HTTP transport to the spreadsheet collection endpoint.

use log::{debug, warn};
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::submission::{
    NotConfiguredSnafu, RemoteReply, SubmissionResult, Transport, TransportSnafu,
};

/// How the payload is encoded in the POST request.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    /// A url-encoded form with a single `data` field holding the JSON document.
    /// This is what a browser form posted to the endpoint sends.
    #[default]
    Form,
    /// The JSON document as the request body.
    Direct,
}

#[derive(Deserialize, Debug)]
struct EndpointReply {
    success: Option<bool>,
    message: Option<String>,
    error: Option<String>,
    #[serde(rename = "rowsAdded")]
    rows_added: Option<u64>,
}

/// Reads the reply of the endpoint: `{success, message|error, rowsAdded}`.
///
/// Anything that is not such a document is indeterminate.
pub fn interpret_reply(text: &str) -> RemoteReply {
    match serde_json::from_str::<EndpointReply>(text) {
        Ok(EndpointReply {
            success: Some(true),
            rows_added,
            ..
        }) => RemoteReply::Accepted { rows_added },
        Ok(EndpointReply {
            success: Some(false),
            message,
            error,
            ..
        }) => RemoteReply::Rejected {
            message: error
                .or(message)
                .unwrap_or_else(|| "unknown error".to_string()),
        },
        Ok(reply) => {
            debug!("interpret_reply: no success flag in {:?}", reply);
            RemoteReply::Indeterminate
        }
        Err(_) => RemoteReply::Indeterminate,
    }
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    url: String,
    mode: TransportMode,
}

impl HttpTransport {
    pub fn new(url: &str, mode: TransportMode) -> SubmissionResult<HttpTransport> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("word_intensity/", env!("CARGO_PKG_VERSION")))
            .build()
            .context(TransportSnafu { url })?;
        Ok(HttpTransport {
            client,
            url: url.to_string(),
            mode,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

impl Transport for HttpTransport {
    async fn send(&self, body: &str) -> SubmissionResult<RemoteReply> {
        let request = match self.mode {
            TransportMode::Direct => self
                .client
                .post(&self.url)
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_string()),
            TransportMode::Form => self.client.post(&self.url).form(&[("data", body)]),
        };
        let response = request
            .send()
            .await
            .context(TransportSnafu { url: &self.url })?;
        let status = response.status();
        if !status.is_success() {
            // An error status is a rejection, whether or not its body can be read.
            let text = response.text().await.unwrap_or_default();
            debug!("send: status {} reply {:?}", status, text);
            let excerpt: String = text.chars().take(200).collect();
            return Ok(RemoteReply::Rejected {
                message: format!("HTTP {}: {}", status.as_u16(), excerpt),
            });
        }
        let text = match response.text().await {
            Ok(t) => t,
            Err(e) => {
                warn!("Could not read the reply of {}: {}", self.url, e);
                return Ok(RemoteReply::Indeterminate);
            }
        };
        debug!("send: status {} reply {:?}", status, text);
        let reply = interpret_reply(&text);
        if reply == RemoteReply::Indeterminate {
            warn!("Could not read the reply of {}, assuming the responses were stored", self.url);
        }
        Ok(reply)
    }
}

/// The collection endpoint, when one is configured.
#[derive(Debug, Clone)]
pub enum Endpoint {
    Http(HttpTransport),
    Unconfigured,
}

impl Transport for Endpoint {
    async fn send(&self, body: &str) -> SubmissionResult<RemoteReply> {
        match self {
            Endpoint::Http(t) => t.send(body).await,
            Endpoint::Unconfigured => NotConfiguredSnafu {}.fail(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, body_string, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SAVED: &str = r#"{"success":true,"message":"Data saved successfully","rowsAdded":2}"#;

    #[test]
    fn success_reply_reports_rows() {
        assert_eq!(
            interpret_reply(r#"{"success":true,"message":"Data saved successfully","rowsAdded":12}"#),
            RemoteReply::Accepted {
                rows_added: Some(12)
            }
        );
    }

    #[test]
    fn error_reply_is_rejected() {
        assert_eq!(
            interpret_reply(r#"{"success":false,"error":"Exception: sheet is locked"}"#),
            RemoteReply::Rejected {
                message: "Exception: sheet is locked".to_string()
            }
        );
        assert_eq!(
            interpret_reply(r#"{"success":false}"#),
            RemoteReply::Rejected {
                message: "unknown error".to_string()
            }
        );
    }

    #[test]
    fn unreadable_reply_is_indeterminate() {
        assert_eq!(
            interpret_reply("<html><body>Moved Temporarily</body></html>"),
            RemoteReply::Indeterminate
        );
        assert_eq!(interpret_reply(""), RemoteReply::Indeterminate);
        assert_eq!(interpret_reply(r#"{"rowsAdded":3}"#), RemoteReply::Indeterminate);
    }

    #[test]
    fn transport_mode_names() {
        assert_eq!(
            serde_json::from_str::<TransportMode>("\"direct\"").unwrap(),
            TransportMode::Direct
        );
        assert_eq!(TransportMode::default(), TransportMode::Form);
    }

    #[tokio::test]
    async fn unconfigured_endpoint_fails() {
        let res = Endpoint::Unconfigured.send("{}").await;
        assert!(matches!(
            res,
            Err(crate::submission::SubmissionError::NotConfigured {})
        ));
    }

    #[tokio::test]
    async fn form_mode_posts_a_data_field() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/exec"))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string("data=%7B%22selectedSurvey%22%3A%221%22%7D"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SAVED))
            .expect(1)
            .mount(&server)
            .await;

        let t = HttpTransport::new(&format!("{}/exec", server.uri()), TransportMode::Form).unwrap();
        assert_eq!(
            t.send(r#"{"selectedSurvey":"1"}"#).await.unwrap(),
            RemoteReply::Accepted {
                rows_added: Some(2)
            }
        );
    }

    #[tokio::test]
    async fn direct_mode_posts_the_document() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(header("content-type", "application/json"))
            .and(body_json(serde_json::json!({"selectedSurvey": "4"})))
            .respond_with(ResponseTemplate::new(200).set_body_string(SAVED))
            .expect(1)
            .mount(&server)
            .await;

        let endpoint = Endpoint::Http(HttpTransport::new(&server.uri(), TransportMode::Direct).unwrap());
        assert_eq!(
            endpoint.send(r#"{"selectedSurvey":"4"}"#).await.unwrap(),
            RemoteReply::Accepted {
                rows_added: Some(2)
            }
        );
    }

    #[tokio::test]
    async fn error_status_is_rejected() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string(SAVED))
            .mount(&server)
            .await;

        let t = HttpTransport::new(&server.uri(), TransportMode::Direct).unwrap();
        match t.send("{}").await.unwrap() {
            RemoteReply::Rejected { message } => {
                assert!(message.starts_with("HTTP 503"), "{}", message);
            }
            other => panic!("unexpected reply {:?}", other),
        }

        // Nothing listens on port 1.
        let t = HttpTransport::new("http://127.0.0.1:1/exec", TransportMode::Form).unwrap();
        assert!(matches!(
            t.send("{}").await,
            Err(crate::submission::SubmissionError::Transport { .. })
        ));
    }

    #[tokio::test]
    async fn html_page_on_success_is_indeterminate() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>Moved Temporarily</html>"))
            .mount(&server)
            .await;

        let t = HttpTransport::new(&server.uri(), TransportMode::Form).unwrap();
        assert_eq!(t.send("{}").await.unwrap(), RemoteReply::Indeterminate);
    }
}
