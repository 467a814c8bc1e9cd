use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use log::debug;
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use word_intensity::*;

use crate::args::Args;
use crate::runner::*;

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct QuestionSourceConfig {
    /// csv, excel or http
    pub provider: Option<String>,
    pub path: Option<String>,
    pub url: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct EndpointConfig {
    pub url: Option<String>,
    /// form or direct
    pub transport: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionConfig {
    pub chunk_size: Option<usize>,
    pub chunk_delay_ms: Option<u64>,
    pub timeout_secs: Option<u64>,
    pub chunk_timeout_secs: Option<u64>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct FallbackConfig {
    pub store_directory: Option<String>,
    pub export_directory: Option<String>,
}

#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct SurveyConfig {
    #[serde(default)]
    pub question_source: QuestionSourceConfig,
    #[serde(default)]
    pub endpoint: EndpointConfig,
    #[serde(default)]
    pub submission: SubmissionConfig,
    #[serde(default)]
    pub fallback: FallbackConfig,
}

pub fn read_config(path: &str) -> BAppResult<SurveyConfig> {
    let contents = fs::read_to_string(path).context(OpeningConfigSnafu { path })?;
    debug!("read config: {:?}", contents);
    let config: SurveyConfig =
        serde_json::from_str(contents.as_str()).context(ParsingConfigSnafu { path })?;
    Ok(config)
}

fn provider_kind(provider: &str) -> AppResult<&'static str> {
    match provider {
        "csv" => Ok("csv"),
        "excel" | "xlsx" => Ok("excel"),
        "http" | "https" => Ok("http"),
        x => whatever!(
            "Unknown question provider {:?}: expected csv, excel or http",
            x
        ),
    }
}

fn transport_mode(transport: &str) -> AppResult<TransportMode> {
    match transport {
        "form" => Ok(TransportMode::Form),
        "direct" => Ok(TransportMode::Direct),
        x => whatever!("Unknown transport {:?}: expected form or direct", x),
    }
}

/// A relative path is resolved against the directory of the configuration file.
fn resolve(root: &str, path: &str) -> PathBuf {
    let p = Path::new(path);
    if p.is_absolute() || root.is_empty() {
        p.to_path_buf()
    } else {
        [root, path].iter().collect()
    }
}

impl SurveyConfig {
    /// Applies the command line options, which take precedence over the file.
    pub fn with_args(mut self, args: &Args) -> SurveyConfig {
        if let Some(q) = &args.questions {
            if q.starts_with("http://") || q.starts_with("https://") {
                self.question_source.url = Some(q.clone());
                self.question_source.path = None;
            } else {
                self.question_source.path = Some(q.clone());
                self.question_source.url = None;
            }
            // A new source invalidates the provider of the file.
            self.question_source.provider = None;
        }
        if let Some(t) = &args.input_type {
            self.question_source.provider = Some(t.clone());
        }
        if let Some(e) = &args.endpoint {
            self.endpoint.url = Some(e.clone());
        }
        if let Some(t) = &args.transport {
            self.endpoint.transport = Some(t.clone());
        }
        if let Some(s) = &args.store {
            self.fallback.store_directory = Some(s.clone());
        }
        if let Some(d) = &args.export_dir {
            self.fallback.export_directory = Some(d.clone());
        }
        if let Some(n) = args.chunk_size {
            self.submission.chunk_size = Some(n);
        }
        self
    }

    /// The question source, if one is configured.
    ///
    /// Without explicit provider, a URL is read over http, a path ending in .xlsx as a
    /// workbook, and any other path as a directory of CSV files.
    pub fn question_provider(&self, root: &str) -> BAppResult<Option<QuestionProvider>> {
        let qs = &self.question_source;
        let kind = match (&qs.provider, &qs.url, &qs.path) {
            (Some(p), _, _) => provider_kind(p)?,
            (None, Some(_), _) => "http",
            (None, None, Some(p)) if p.ends_with(".xlsx") => "excel",
            (None, None, Some(_)) => "csv",
            (None, None, None) => return Ok(None),
        };
        let provider = match kind {
            "http" => {
                let url = qs
                    .url
                    .as_ref()
                    .or(qs.path.as_ref())
                    .whatever_context::<_, AppError>("The http question source needs a url")?;
                QuestionProvider::Http(HttpQuestions::new(url))
            }
            _ => {
                let path = qs.path.as_ref().whatever_context::<_, AppError>(format!(
                    "The {} question source needs a path",
                    kind
                ))?;
                let p = resolve(root, path);
                if kind == "excel" {
                    QuestionProvider::Excel(ExcelWorkbook::new(p))
                } else {
                    QuestionProvider::Csv(CsvDirectory::new(p))
                }
            }
        };
        Ok(Some(provider))
    }

    pub fn endpoint(&self) -> BAppResult<Endpoint> {
        let mode = match &self.endpoint.transport {
            Some(t) => transport_mode(t)?,
            None => TransportMode::default(),
        };
        match &self.endpoint.url {
            Some(url) if !url.trim().is_empty() => {
                let transport = HttpTransport::new(url.trim(), mode).context(EndpointSnafu {})?;
                Ok(Endpoint::Http(transport))
            }
            _ => Ok(Endpoint::Unconfigured),
        }
    }

    pub fn rules(&self) -> SubmissionRules {
        let s = &self.submission;
        let default = SubmissionRules::DEFAULT_RULES;
        SubmissionRules {
            chunk_size: s.chunk_size.unwrap_or(default.chunk_size).max(1),
            chunk_delay: s
                .chunk_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(default.chunk_delay),
            timeout: s
                .timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(default.timeout),
            chunk_timeout: s
                .chunk_timeout_secs
                .map(Duration::from_secs)
                .unwrap_or(default.chunk_timeout),
        }
    }

    pub fn fallback(&self, root: &str) -> Fallback {
        let f = &self.fallback;
        let store = resolve(root, f.store_directory.as_deref().unwrap_or("."));
        let export = resolve(root, f.export_directory.as_deref().unwrap_or("."));
        Fallback::new(store, export)
    }
}
