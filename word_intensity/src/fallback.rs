//! The fallbacks used when the collection endpoint cannot be reached: an append-only
//! local store, and an export file the participant can send to the researcher.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, SecondsFormat, Utc};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use crate::config::{Participant, SurveyId};
use crate::submission::{SubmissionBatch, SubmittedResponse};

/// The namespace of the local store. Records live in `<directory>/surveyResponses.json`.
pub const STORE_NAMESPACE: &str = "surveyResponses";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum FallbackError {
    #[snafu(display("Error accessing the local store {path}"))]
    StoreIo {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("The local store {path} is not a valid list of records"))]
    StoreFormat {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error writing the export file {path}"))]
    ExportIo {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing the export file {path}"))]
    ExportCsv { source: csv::Error, path: String },
}

pub type FallbackResult<T> = Result<T, FallbackError>;

/// A submission saved locally.
#[derive(PartialEq, Eq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredSubmission {
    pub participant: Participant,
    pub selected_survey: SurveyId,
    pub responses: Vec<SubmittedResponse>,
    pub timestamp: String,
    pub id: String,
}

/// A JSON file holding the list of locally saved submissions.
///
/// New submissions are appended; existing records are never rewritten.
#[derive(Debug, Clone)]
pub struct LocalStore {
    path: PathBuf,
}

impl LocalStore {
    pub fn in_directory(dir: impl AsRef<Path>) -> LocalStore {
        LocalStore {
            path: dir.as_ref().join(format!("{}.json", STORE_NAMESPACE)),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All the saved records, oldest first. A missing store is empty.
    pub fn records(&self) -> FallbackResult<Vec<StoredSubmission>> {
        let path = self.path.display().to_string();
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path).context(StoreIoSnafu { path: &path })?;
        if contents.trim().is_empty() {
            return Ok(Vec::new());
        }
        serde_json::from_str(&contents).context(StoreFormatSnafu { path })
    }

    /// Appends the batch and returns the id of the new record.
    pub fn append(&self, batch: &SubmissionBatch, now: DateTime<Utc>) -> FallbackResult<String> {
        let path = self.path.display().to_string();
        let mut records = self.records()?;

        let timestamp = now.to_rfc3339_opts(SecondsFormat::Millis, true);
        let id = record_id(&batch.participant, &timestamp, records.len());
        records.push(StoredSubmission {
            participant: batch.participant.clone(),
            selected_survey: batch.selected_survey,
            responses: batch.responses.clone(),
            timestamp,
            id: id.clone(),
        });

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).context(StoreIoSnafu { path: &path })?;
        }
        let contents = serde_json::to_string_pretty(&records).context(StoreFormatSnafu { path: &path })?;
        // Write next to the store and swap, so that a crash leaves the old list intact.
        let tmp = self.path.with_extension("json.tmp");
        fs::write(&tmp, contents).context(StoreIoSnafu { path: &path })?;
        fs::rename(&tmp, &self.path).context(StoreIoSnafu { path: &path })?;
        info!(
            "Saved {} responses locally in {} (record {}, {} records in store)",
            batch.responses.len(),
            path,
            id,
            records.len()
        );
        Ok(id)
    }
}

fn record_id(participant: &Participant, timestamp: &str, position: usize) -> String {
    let digest = sha256::digest(
        format!(
            "{}|{}|{}|{}",
            participant.name, participant.timestamp, timestamp, position
        )
        .as_str(),
    );
    digest[..16].to_string()
}

/// The export file name: the participant name with every character that is not
/// alphanumeric replaced by `_`, followed by the date.
pub fn export_file_name(participant_name: &str, now: DateTime<Utc>) -> String {
    let name: String = participant_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();
    format!(
        "Word_Intensity_Survey_{}_{}.csv",
        name,
        now.format("%Y-%m-%d")
    )
}

/// Creates a new export file in `dir`. An existing export is never replaced: when the
/// name is taken, `_2`, `_3` and so on are added before the extension.
fn create_export_file(
    dir: &Path,
    participant_name: &str,
    now: DateTime<Utc>,
) -> FallbackResult<(PathBuf, fs::File)> {
    let base = export_file_name(participant_name, now);
    let stem = base.trim_end_matches(".csv");
    let mut n = 1;
    loop {
        let p = if n == 1 {
            dir.join(&base)
        } else {
            dir.join(format!("{}_{}.csv", stem, n))
        };
        match fs::OpenOptions::new().write(true).create_new(true).open(&p) {
            Ok(file) => return Ok((p, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                debug!("create_export_file: {} exists", p.display());
                n += 1;
            }
            Err(e) => {
                return Err(e).context(ExportIoSnafu {
                    path: p.display().to_string(),
                })
            }
        }
    }
}

/// Writes the participant block and the response table to a new CSV file in `dir`.
pub fn export_csv(dir: &Path, batch: &SubmissionBatch, now: DateTime<Utc>) -> FallbackResult<PathBuf> {
    fs::create_dir_all(dir).context(ExportIoSnafu {
        path: dir.display().to_string(),
    })?;
    let (p, file) = create_export_file(dir, &batch.participant.name, now)?;
    let path = p.display().to_string();

    let mut wtr = csv::WriterBuilder::new().flexible(true).from_writer(file);

    let participant = &batch.participant;
    let completion_date = DateTime::parse_from_rfc3339(&participant.timestamp)
        .map(|d| d.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|_| participant.timestamp.clone());
    let survey = batch.selected_survey.to_string();
    let info_rows: [&[&str]; 8] = [
        &["Participant Information"],
        &["Name", &participant.name],
        &["Age", &participant.age],
        &["Gender", &participant.gender],
        &["Country", &participant.country],
        &["First Language", &participant.first_language],
        &["Completion Date", &completion_date],
        &["Survey", &survey],
    ];
    for row in info_rows {
        wtr.write_record(row).context(ExportCsvSnafu { path: &path })?;
    }
    wtr.write_record([""]).context(ExportCsvSnafu { path: &path })?;
    wtr.write_record(["Survey Responses"])
        .context(ExportCsvSnafu { path: &path })?;
    wtr.write_record(["Question #", "Meaning", "Most Intense", "Least Intense"])
        .context(ExportCsvSnafu { path: &path })?;
    for r in batch.responses.iter() {
        wtr.write_record([
            r.question_number.to_string().as_str(),
            r.meaning.as_str(),
            r.most_intense.as_str(),
            r.least_intense.as_str(),
        ])
        .context(ExportCsvSnafu { path: &path })?;
    }
    wtr.flush().context(ExportIoSnafu { path: &path })?;
    info!("Exported {} responses to {}", batch.responses.len(), path);
    Ok(p)
}

/// Where the fallbacks write to.
#[derive(Debug, Clone)]
pub struct Fallback {
    pub store: LocalStore,
    pub export_directory: PathBuf,
}

/// The result of running both fallbacks.
#[derive(Debug)]
pub struct FallbackReport {
    pub local: FallbackResult<String>,
    pub export: FallbackResult<PathBuf>,
}

impl FallbackReport {
    /// True if the responses survived in at least one place.
    pub fn saved(&self) -> bool {
        self.local.is_ok() || self.export.is_ok()
    }
}

impl Fallback {
    pub fn new(store_directory: impl AsRef<Path>, export_directory: impl Into<PathBuf>) -> Fallback {
        Fallback {
            store: LocalStore::in_directory(store_directory),
            export_directory: export_directory.into(),
        }
    }

    /// Saves to the local store, then writes the export file. The export is written
    /// even when the local store succeeded.
    pub fn save(&self, batch: &SubmissionBatch) -> FallbackReport {
        let now = Utc::now();
        let local = self.store.append(batch, now);
        if let Err(e) = &local {
            warn!("Local save failed: {}", e);
        }
        let export = export_csv(&self.export_directory, batch, now);
        if let Err(e) = &export {
            warn!("Export failed: {}", e);
        }
        FallbackReport { local, export }
    }
}
