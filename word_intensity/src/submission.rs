// Building and sending the collected responses to the collection endpoint.

use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;

use chrono::{SecondsFormat, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::attention::is_attention_check;
use crate::config::{Participant, SubmissionRules, SurveyId};
use crate::fallback::{Fallback, FallbackError};
use crate::questions::QuestionBank;
use crate::responses::ResponseStore;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SubmissionError {
    #[snafu(display("Submission timeout after {after:?}"))]
    Timeout { after: Duration },
    #[snafu(display("The collection endpoint returned an error: {message}"))]
    Remote { message: String },
    #[snafu(display("Error sending the responses to {url}"))]
    Transport { source: reqwest::Error, url: String },
    #[snafu(display("Error encoding the responses"))]
    Encoding { source: serde_json::Error },
    #[snafu(display("No collection endpoint is configured"))]
    NotConfigured {},
    #[snafu(display(
        "Submission failed at chunk {chunk_number} of {total_chunks}. Some data may have been saved."
    ))]
    ChunkFailed {
        chunk_number: usize,
        total_chunks: usize,
        source: Box<SubmissionError>,
    },
}

impl SubmissionError {
    /// True if earlier messages of this submission may already be stored remotely.
    pub fn partially_persisted(&self) -> bool {
        matches!(self, SubmissionError::ChunkFailed { chunk_number, .. } if *chunk_number > 1)
    }
}

pub type SubmissionResult<T> = Result<T, SubmissionError>;

/// One complete response, as transmitted.
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmittedResponse {
    /// 1-indexed
    pub question_number: usize,
    pub meaning: String,
    pub most_intense: String,
    pub least_intense: String,
    pub words: Vec<String>,
    /// Set for the attention check questions.
    pub is_example: bool,
}

/// A read-only view of a finished session, rebuilt for each submission attempt.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct SubmissionBatch {
    pub participant: Participant,
    pub selected_survey: SurveyId,
    pub responses: Vec<SubmittedResponse>,
}

impl SubmissionBatch {
    /// Collects the complete responses in question order.
    pub fn build(
        participant: &Participant,
        selected_survey: SurveyId,
        bank: &QuestionBank,
        store: &ResponseStore,
    ) -> SubmissionBatch {
        let responses = store
            .completed()
            .filter_map(|(idx, r)| {
                let question = bank.get(idx)?;
                Some(SubmittedResponse {
                    question_number: idx + 1,
                    meaning: question.meaning.clone(),
                    most_intense: r.most_intense.clone()?,
                    least_intense: r.least_intense.clone()?,
                    words: question.words.to_vec(),
                    is_example: is_attention_check(&question.words),
                })
            })
            .collect();
        SubmissionBatch {
            participant: participant.clone(),
            selected_survey,
            responses,
        }
    }

    /// A single made-up response from a test participant, for checking that the
    /// endpoint stores what it is sent.
    pub fn connection_test() -> SubmissionBatch {
        let words = ["slightly", "somewhat", "very", "extremely"];
        SubmissionBatch {
            participant: Participant {
                name: "Test User".to_string(),
                age: "25".to_string(),
                gender: "Test".to_string(),
                country: "Test Country".to_string(),
                first_language: "English".to_string(),
                timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            },
            selected_survey: SurveyId::ALL[0],
            responses: vec![SubmittedResponse {
                question_number: 1,
                meaning: "test meaning".to_string(),
                most_intense: "very".to_string(),
                least_intense: "slightly".to_string(),
                words: words.iter().map(|w| w.to_string()).collect(),
                is_example: false,
            }],
        }
    }
}

#[derive(PartialEq, Eq, Debug, Clone, Copy, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChunkInfo {
    pub chunk_number: usize,
    pub total_chunks: usize,
    pub is_chunked: bool,
}

#[derive(PartialEq, Eq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantFields<'a> {
    pub name: &'a str,
    pub age: &'a str,
    pub gender: &'a str,
    pub country: &'a str,
    pub first_language: &'a str,
}

/// The JSON document posted to the endpoint.
#[derive(PartialEq, Eq, Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionPayload<'a> {
    pub timestamp: String,
    pub selected_survey: SurveyId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub chunk_info: Option<ChunkInfo>,
    pub participant: ParticipantFields<'a>,
    pub responses: &'a [SubmittedResponse],
}

impl<'a> SubmissionPayload<'a> {
    pub fn new(
        batch: &'a SubmissionBatch,
        responses: &'a [SubmittedResponse],
        chunk_info: Option<ChunkInfo>,
    ) -> SubmissionPayload<'a> {
        let p = &batch.participant;
        SubmissionPayload {
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
            selected_survey: batch.selected_survey,
            chunk_info,
            participant: ParticipantFields {
                name: &p.name,
                age: &p.age,
                gender: &p.gender,
                country: &p.country,
                first_language: &p.first_language,
            },
            responses,
        }
    }
}

/// What the endpoint said about one message.
#[derive(PartialEq, Eq, Debug, Clone)]
pub enum RemoteReply {
    Accepted { rows_added: Option<u64> },
    Rejected { message: String },
    /// The reply could not be read. The message is assumed to be stored.
    Indeterminate,
}

/// Sends one serialized payload to the collection endpoint.
pub trait Transport {
    fn send(&self, body: &str) -> impl Future<Output = SubmissionResult<RemoteReply>> + Send;
}

/// The remote part of a successful submission.
#[derive(PartialEq, Eq, Debug, Clone, Default)]
pub struct Receipt {
    /// Rows confirmed by the endpoint.
    pub rows_added: u64,
    pub messages: usize,
    /// Messages whose reply could not be read.
    pub unconfirmed: usize,
}

impl Receipt {
    fn record(&mut self, reply: &RemoteReply) {
        self.messages += 1;
        match reply {
            RemoteReply::Accepted {
                rows_added: Some(n),
            } => self.rows_added += n,
            RemoteReply::Accepted { rows_added: None } | RemoteReply::Indeterminate => {
                self.unconfirmed += 1
            }
            RemoteReply::Rejected { .. } => {}
        }
    }
}

/// The final result of delivering a batch, including the fallbacks.
#[derive(Debug)]
pub enum SubmissionOutcome {
    /// The endpoint accepted every message.
    Submitted(Receipt),
    /// The endpoint failed but the responses were saved by at least one fallback.
    SavedLocally {
        cause: SubmissionError,
        record_id: Option<String>,
        export_path: Option<PathBuf>,
        failures: Vec<FallbackError>,
    },
    /// Nothing could be saved.
    Lost {
        cause: SubmissionError,
        store_error: FallbackError,
        export_error: FallbackError,
    },
}

impl SubmissionOutcome {
    pub fn is_submitted(&self) -> bool {
        matches!(self, SubmissionOutcome::Submitted(_))
    }
}

pub struct SubmissionPipeline<T: Transport> {
    transport: T,
    rules: SubmissionRules,
    fallback: Fallback,
}

impl<T: Transport> SubmissionPipeline<T> {
    pub fn new(transport: T, rules: SubmissionRules, fallback: Fallback) -> SubmissionPipeline<T> {
        SubmissionPipeline {
            transport,
            rules,
            fallback,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn rules(&self) -> &SubmissionRules {
        &self.rules
    }

    pub fn fallback(&self) -> &Fallback {
        &self.fallback
    }

    /// Sends the batch, split in chunks when it is larger than the chunk size.
    ///
    /// Chunks are sent one after the other. The first failing chunk stops the submission.
    pub async fn submit(&self, batch: &SubmissionBatch) -> SubmissionResult<Receipt> {
        let chunk_size = self.rules.chunk_size.max(1);
        let count = batch.responses.len();
        info!(
            "Submitting {} responses for participant {:?} (survey {})",
            count, batch.participant.name, batch.selected_survey
        );
        let mut receipt = Receipt::default();
        if count <= chunk_size {
            let payload = SubmissionPayload::new(batch, &batch.responses, None);
            let reply = self.send_one(&payload, self.rules.timeout).await?;
            receipt.record(&reply);
            return Ok(receipt);
        }

        let chunks: Vec<&[SubmittedResponse]> = batch.responses.chunks(chunk_size).collect();
        let total_chunks = chunks.len();
        info!(
            "Submitting {} responses in {} chunks of {}",
            count, total_chunks, chunk_size
        );
        for (idx, chunk) in chunks.iter().enumerate() {
            let chunk_info = ChunkInfo {
                chunk_number: idx + 1,
                total_chunks,
                is_chunked: true,
            };
            debug!(
                "submit: chunk {}/{} ({} responses)",
                chunk_info.chunk_number,
                total_chunks,
                chunk.len()
            );
            let payload = SubmissionPayload::new(batch, chunk, Some(chunk_info));
            match self.send_one(&payload, self.rules.chunk_timeout).await {
                Ok(reply) => receipt.record(&reply),
                Err(e) => {
                    warn!("Chunk {}/{} failed: {}", idx + 1, total_chunks, e);
                    return Err(SubmissionError::ChunkFailed {
                        chunk_number: idx + 1,
                        total_chunks,
                        source: Box::new(e),
                    });
                }
            }
            if idx + 1 < total_chunks && !self.rules.chunk_delay.is_zero() {
                tokio::time::sleep(self.rules.chunk_delay).await;
            }
        }
        info!("All {} chunks submitted", total_chunks);
        Ok(receipt)
    }

    async fn send_one(
        &self,
        payload: &SubmissionPayload<'_>,
        limit: Duration,
    ) -> SubmissionResult<RemoteReply> {
        let body = serde_json::to_string(payload).context(EncodingSnafu {})?;
        match tokio::time::timeout(limit, self.transport.send(&body)).await {
            Err(_) => TimeoutSnafu { after: limit }.fail(),
            Ok(Err(e)) => Err(e),
            Ok(Ok(RemoteReply::Rejected { message })) => RemoteSnafu { message }.fail(),
            Ok(Ok(reply)) => {
                debug!("send_one: reply {:?}", reply);
                Ok(reply)
            }
        }
    }

    /// Submits the batch, and saves it with the fallbacks if the submission failed.
    pub async fn deliver(&self, batch: &SubmissionBatch) -> SubmissionOutcome {
        let cause = match self.submit(batch).await {
            Ok(receipt) => return SubmissionOutcome::Submitted(receipt),
            Err(e) => e,
        };
        warn!("Submission failed, using the local fallbacks: {}", cause);
        let report = self.fallback.save(batch);
        match (report.local, report.export) {
            (Err(store_error), Err(export_error)) => SubmissionOutcome::Lost {
                cause,
                store_error,
                export_error,
            },
            (local, export) => {
                let mut failures: Vec<FallbackError> = Vec::new();
                let record_id = local.map_err(|e| failures.push(e)).ok();
                let export_path = export.map_err(|e| failures.push(e)).ok();
                SubmissionOutcome::SavedLocally {
                    cause,
                    record_id,
                    export_path,
                    failures,
                }
            }
        }
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::sync::Mutex;

    /// Records every body and fails on demand.
    #[derive(Default)]
    pub struct RecordingTransport {
        pub bodies: Mutex<Vec<serde_json::Value>>,
        /// 1-based number of the call that fails.
        pub fail_on_call: Option<usize>,
        pub reply: Option<RemoteReply>,
        pub delay: Option<Duration>,
    }

    impl RecordingTransport {
        pub fn failing_on(call: usize) -> RecordingTransport {
            RecordingTransport {
                fail_on_call: Some(call),
                ..Default::default()
            }
        }

        pub fn sent(&self) -> Vec<serde_json::Value> {
            self.bodies.lock().unwrap().clone()
        }
    }

    impl Transport for RecordingTransport {
        async fn send(&self, body: &str) -> SubmissionResult<RemoteReply> {
            if let Some(d) = self.delay {
                tokio::time::sleep(d).await;
            }
            let js: serde_json::Value = serde_json::from_str(body).unwrap();
            let rows = js["responses"].as_array().map(|a| a.len()).unwrap_or(0);
            let call = {
                let mut bodies = self.bodies.lock().unwrap();
                bodies.push(js);
                bodies.len()
            };
            if self.fail_on_call == Some(call) {
                return RemoteSnafu {
                    message: format!("call {} refused", call),
                }
                .fail();
            }
            Ok(self.reply.clone().unwrap_or(RemoteReply::Accepted {
                rows_added: Some(rows as u64),
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingTransport;
    use super::*;
    use crate::config::Question;

    fn rules() -> SubmissionRules {
        SubmissionRules {
            chunk_delay: Duration::ZERO,
            ..SubmissionRules::DEFAULT_RULES
        }
    }

    fn participant() -> Participant {
        Participant {
            name: "Ada Lovelace".to_string(),
            age: "36".to_string(),
            gender: "female".to_string(),
            country: "UK".to_string(),
            first_language: "English".to_string(),
            timestamp: "2024-05-01T10:00:00.000Z".to_string(),
        }
    }

    fn batch_of(n: usize) -> SubmissionBatch {
        let responses = (0..n)
            .map(|idx| SubmittedResponse {
                question_number: idx + 1,
                meaning: format!("meaning {}", idx + 1),
                most_intense: "d".to_string(),
                least_intense: "a".to_string(),
                words: vec!["a".into(), "b".into(), "c".into(), "d".into()],
                is_example: false,
            })
            .collect();
        SubmissionBatch {
            participant: participant(),
            selected_survey: SurveyId::new(1).unwrap(),
            responses,
        }
    }

    fn pipeline(
        transport: RecordingTransport,
        dir: &std::path::Path,
    ) -> SubmissionPipeline<RecordingTransport> {
        SubmissionPipeline::new(
            transport,
            rules(),
            Fallback::new(dir.join("store"), dir.join("exports")),
        )
    }

    #[test]
    fn batch_keeps_complete_responses_in_order_and_flags_checks() {
        let bank = QuestionBank::new(vec![
            Question::new("brightness", ["dim", "bright", "brilliant", "radiant"]),
            Question::new("boredom", ["boring", "tedious", "dull", "amazing"]),
            Question::new("speed", ["slow", "moderate", "fast", "rapid"]),
        ])
        .unwrap();
        let mut store = ResponseStore::new();
        for idx in [2, 1, 0] {
            let q = bank.get(idx).unwrap();
            store.select_word(idx, q, &q.words[3]);
            store.select_word(idx, q, &q.words[0]);
        }
        // Incomplete responses are left out.
        store.select_word(0, bank.get(0).unwrap(), "dim");

        let batch = SubmissionBatch::build(
            &participant(),
            SurveyId::new(1).unwrap(),
            &bank,
            &store,
        );
        let numbers: Vec<usize> = batch.responses.iter().map(|r| r.question_number).collect();
        assert_eq!(numbers, vec![2, 3]);
        assert!(batch.responses[0].is_example);
        assert!(!batch.responses[1].is_example);
        assert_eq!(batch.responses[0].most_intense, "amazing");
        assert_eq!(batch.responses[0].least_intense, "boring");
    }

    #[test]
    fn payload_uses_endpoint_field_names() {
        let batch = batch_of(1);
        let payload = SubmissionPayload::new(
            &batch,
            &batch.responses,
            Some(ChunkInfo {
                chunk_number: 1,
                total_chunks: 2,
                is_chunked: true,
            }),
        );
        let js = serde_json::to_value(&payload).unwrap();
        assert_eq!(js["selectedSurvey"], "1");
        assert_eq!(js["participant"]["firstLanguage"], "English");
        assert!(js["participant"].get("timestamp").is_none());
        assert_eq!(js["chunkInfo"]["totalChunks"], 2);
        assert_eq!(js["responses"][0]["questionNumber"], 1);
        assert_eq!(js["responses"][0]["isExample"], false);

        let whole = serde_json::to_value(SubmissionPayload::new(&batch, &batch.responses, None)).unwrap();
        assert!(whole.get("chunkInfo").is_none());
    }

    #[tokio::test]
    async fn small_batch_is_sent_whole() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(RecordingTransport::default(), dir.path());
        let receipt = p.submit(&batch_of(25)).await.unwrap();
        assert_eq!(receipt.messages, 1);
        assert_eq!(receipt.rows_added, 25);
        let sent = p.transport.sent();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].get("chunkInfo").is_none());
    }

    #[tokio::test]
    async fn large_batch_is_chunked_in_order() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(RecordingTransport::default(), dir.path());
        let receipt = p.submit(&batch_of(60)).await.unwrap();
        assert_eq!(receipt.messages, 3);
        assert_eq!(receipt.rows_added, 60);

        let sent = p.transport.sent();
        let sizes: Vec<usize> = sent
            .iter()
            .map(|js| js["responses"].as_array().unwrap().len())
            .collect();
        assert_eq!(sizes, vec![25, 25, 10]);
        for (idx, js) in sent.iter().enumerate() {
            assert_eq!(js["chunkInfo"]["chunkNumber"], idx + 1);
            assert_eq!(js["chunkInfo"]["totalChunks"], 3);
            assert_eq!(js["chunkInfo"]["isChunked"], true);
            assert_eq!(js["responses"][0]["questionNumber"], idx * 25 + 1);
        }
    }

    #[tokio::test]
    async fn failing_chunk_stops_the_submission() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(RecordingTransport::failing_on(2), dir.path());
        let err = p.submit(&batch_of(60)).await.unwrap_err();
        assert!(matches!(
            err,
            SubmissionError::ChunkFailed {
                chunk_number: 2,
                total_chunks: 3,
                ..
            }
        ));
        assert!(err.partially_persisted());
        assert!(err.to_string().contains("Some data may have been saved"));
        // The third chunk was never sent.
        assert_eq!(p.transport.sent().len(), 2);
    }

    #[tokio::test]
    async fn first_chunk_failure_is_not_partial() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(RecordingTransport::failing_on(1), dir.path());
        let err = p.submit(&batch_of(30)).await.unwrap_err();
        assert!(!err.partially_persisted());
        assert_eq!(p.transport.sent().len(), 1);
    }

    #[tokio::test]
    async fn slow_endpoint_times_out() {
        let dir = tempfile::tempdir().unwrap();
        let transport = RecordingTransport {
            delay: Some(Duration::from_secs(5)),
            ..Default::default()
        };
        let p = SubmissionPipeline::new(
            transport,
            SubmissionRules {
                timeout: Duration::from_millis(20),
                ..rules()
            },
            Fallback::new(dir.path(), dir.path()),
        );
        let err = p.submit(&batch_of(3)).await.unwrap_err();
        assert!(matches!(err, SubmissionError::Timeout { .. }));
    }

    #[tokio::test]
    async fn rejection_is_an_error_and_indeterminate_is_not() {
        let dir = tempfile::tempdir().unwrap();
        let rejecting = RecordingTransport {
            reply: Some(RemoteReply::Rejected {
                message: "sheet not found".to_string(),
            }),
            ..Default::default()
        };
        let p = pipeline(rejecting, dir.path());
        assert!(matches!(
            p.submit(&batch_of(2)).await,
            Err(SubmissionError::Remote { .. })
        ));

        let silent = RecordingTransport {
            reply: Some(RemoteReply::Indeterminate),
            ..Default::default()
        };
        let p = pipeline(silent, dir.path());
        let receipt = p.submit(&batch_of(2)).await.unwrap();
        assert_eq!(receipt.unconfirmed, 1);
        assert_eq!(receipt.rows_added, 0);
    }

    #[tokio::test]
    async fn failed_delivery_is_saved_and_exported() {
        let dir = tempfile::tempdir().unwrap();
        let p = pipeline(RecordingTransport::failing_on(1), dir.path());
        let batch = batch_of(4);
        let outcome = p.deliver(&batch).await;
        let (record_id, export_path) = match outcome {
            SubmissionOutcome::SavedLocally {
                record_id,
                export_path,
                failures,
                ..
            } => {
                assert!(failures.is_empty());
                (record_id.unwrap(), export_path.unwrap())
            }
            other => panic!("unexpected outcome {:?}", other),
        };
        let records = p.fallback().store.records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].id, record_id);
        assert_eq!(records[0].participant, batch.participant);
        assert_eq!(records[0].responses, batch.responses);
        assert!(export_path
            .file_name()
            .unwrap()
            .to_str()
            .unwrap()
            .contains("Ada_Lovelace"));
        assert!(export_path.exists());
    }

    #[tokio::test]
    async fn delivery_is_lost_when_every_fallback_fails() {
        let dir = tempfile::tempdir().unwrap();
        // Regular files where directories are expected.
        let blocked = dir.path().join("blocked");
        std::fs::write(&blocked, "").unwrap();
        let p = SubmissionPipeline::new(
            RecordingTransport::failing_on(1),
            rules(),
            Fallback::new(blocked.join("store"), blocked.join("exports")),
        );
        let outcome = p.deliver(&batch_of(2)).await;
        assert!(matches!(outcome, SubmissionOutcome::Lost { .. }));
    }
}
