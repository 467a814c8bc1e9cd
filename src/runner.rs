use log::{debug, info, warn};
use snafu::prelude::*;

use std::path::Path;

use word_intensity::*;

use crate::args::Args;
use crate::runner::config_reader::*;

pub mod config_reader;
mod io_script;
mod io_terminal;

#[derive(Debug, Snafu)]
pub enum AppError {
    #[snafu(display("Error opening the configuration file {path}"))]
    OpeningConfig {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing the configuration file {path}"))]
    ParsingConfig {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error opening the answers file {path}"))]
    OpeningAnswers {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing the answers file {path}"))]
    ParsingAnswers {
        source: serde_json::Error,
        path: String,
    },
    #[snafu(display("Error reading from or writing to the terminal"))]
    Terminal { source: std::io::Error },
    #[snafu(display("{source}"))]
    Survey { source: SurveyError },
    #[snafu(display("Error setting up the collection endpoint"))]
    Endpoint { source: SubmissionError },
    #[snafu(display("The collection endpoint did not accept the test response"))]
    EndpointTest { source: SubmissionError },
    #[snafu(display("Question {question_number}: the word {word:?} could not be selected"))]
    UnexpectedWord {
        question_number: usize,
        word: String,
    },
    #[snafu(display("There is no survey {number}, choose one between 1 and 5"))]
    UnknownSurvey { number: u8 },
    #[snafu(display("The answers cover {answered} questions, but the survey has {total}"))]
    AnswerCount { answered: usize, total: usize },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

pub type AppResult<T> = Result<T, AppError>;
pub type BAppResult<T> = Result<T, Box<AppError>>;

/// Loads the questions of the selected survey. When they cannot be loaded, the
/// built-in questions are used instead.
///
/// Returns true if the built-in questions were substituted.
pub async fn start_questions<S: QuestionSource>(
    session: &mut SurveySession,
    source: Option<&S>,
) -> BAppResult<bool> {
    match source {
        Some(s) => match session.start_questions(s).await {
            Ok(()) => return Ok(false),
            Err(SurveyError::Load { source }) => {
                warn!(
                    "Could not load the survey questions, using the built-in questions instead: {}",
                    source
                );
            }
            Err(e) => return Err(Box::new(AppError::Survey { source: e })),
        },
        None => {
            warn!("No question source configured, using the built-in questions");
        }
    }
    session
        .start_with_bank(QuestionBank::fallback())
        .context(SurveySnafu {})?;
    Ok(true)
}

/// The message shown to the participant after a submission attempt.
pub fn outcome_message(outcome: &SubmissionOutcome) -> String {
    match outcome {
        SubmissionOutcome::Submitted(receipt) if receipt.unconfirmed > 0 => {
            "Thank you! Your responses have been sent.".to_string()
        }
        SubmissionOutcome::Submitted(receipt) => format!(
            "Thank you! Your responses have been recorded ({} rows).",
            receipt.rows_added
        ),
        SubmissionOutcome::SavedLocally {
            cause,
            record_id,
            export_path,
            ..
        } => {
            let mut lines = vec![format!("Your responses could not be submitted: {}", cause)];
            if cause.partially_persisted() {
                lines.push("Some of your responses may already have been recorded.".to_string());
            }
            if let Some(id) = record_id {
                lines.push(format!("A copy was saved on this computer (record {}).", id));
            }
            if let Some(p) = export_path {
                lines.push(format!(
                    "Please send the file {} to the researcher.",
                    p.display()
                ));
            }
            lines.join("\n")
        }
        SubmissionOutcome::Lost {
            cause,
            store_error,
            export_error,
        } => format!(
            "Your responses could not be submitted ({}) and could not be saved ({}; {}). Please contact the researcher.",
            cause, store_error, export_error
        ),
    }
}

/// Sends a made-up response to the endpoint, without any fallback.
pub async fn check_endpoint<T: Transport>(pipeline: &SubmissionPipeline<T>) -> BAppResult<Receipt> {
    let batch = SubmissionBatch::connection_test();
    info!(
        "Sending a test response from {:?} to the collection endpoint",
        batch.participant.name
    );
    let receipt = pipeline.submit(&batch).await.context(EndpointTestSnafu {})?;
    if receipt.unconfirmed > 0 {
        warn!("The endpoint answered, but its reply could not be read. Check the spreadsheet for a row from Test User.");
    } else {
        info!("The endpoint stored the test response ({} rows added)", receipt.rows_added);
    }
    Ok(receipt)
}

fn check_outcome(outcome: &SubmissionOutcome) -> AppResult<()> {
    if let SubmissionOutcome::Lost { cause, .. } = outcome {
        whatever!("The responses were neither submitted nor saved: {}", cause)
    }
    Ok(())
}

fn read_survey_config(args: &Args) -> BAppResult<(SurveyConfig, String)> {
    match &args.config {
        Some(path) => {
            let config = read_config(path)?;
            let root = Path::new(path)
                .parent()
                .map(|p| p.display().to_string())
                .unwrap_or_default();
            Ok((config, root))
        }
        None => Ok((SurveyConfig::default(), String::new())),
    }
}

pub async fn run(args: &Args) -> BAppResult<()> {
    let (file_config, root) = read_survey_config(args)?;
    let config = file_config.with_args(args);
    info!("config: {:?}", config);

    let provider = config.question_provider(&root)?;
    let endpoint = config.endpoint()?;
    if let Endpoint::Unconfigured = endpoint {
        warn!("No collection endpoint configured: responses will only be saved locally");
    }
    let pipeline = SubmissionPipeline::new(endpoint, config.rules(), config.fallback(&root));
    debug!("submission rules: {:?}", pipeline.rules());

    if args.test_endpoint {
        check_endpoint(&pipeline).await?;
        return Ok(());
    }

    let survey = match args.survey {
        Some(n) => Some(SurveyId::new(n).context(UnknownSurveySnafu { number: n })?),
        None => None,
    };

    if let Some(answers) = &args.answers {
        let script = io_script::read_script(answers)?;
        let outcome = io_script::replay(&script, provider.as_ref(), &pipeline).await?;
        let message = outcome_message(&outcome);
        if outcome.is_submitted() {
            info!("{}", message);
        } else {
            warn!("{}", message);
        }
        check_outcome(&outcome)?;
        return Ok(());
    }

    let stdin = std::io::stdin();
    let mut terminal = io_terminal::Terminal::new(stdin.lock(), std::io::stdout());
    let mut session = SurveySession::new();
    let end = terminal
        .run(&mut session, provider.as_ref(), &pipeline, survey)
        .await?;
    info!("Session ended: {:?}", end);
    Ok(())
}
