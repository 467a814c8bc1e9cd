// The survey state machine.

use chrono::{SecondsFormat, Utc};
use log::{debug, info, warn};
use snafu::prelude::*;

use crate::config::{Demographics, Participant, Question, SurveyId};
use crate::questions::{LoadError, QuestionBank, QuestionSource};
use crate::responses::{ResponseStore, SelectionChange};
use crate::submission::{SubmissionBatch, SubmissionOutcome, SubmissionPipeline, Transport};

/// The screens of the survey, in order.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum SurveyState {
    Instructions,
    Demographics,
    SurveySelection,
    Questioning { cursor: usize },
    Completion,
    Submitting,
    Success,
    RetryPrompt,
}

/// Reasons for refusing to move forward. They never change the state.
#[derive(Debug, Snafu, PartialEq, Eq, Clone)]
#[snafu(visibility(pub(crate)))]
pub enum ValidationError {
    #[snafu(display("Please fill in the {field} field before continuing."))]
    MissingDemographic { field: &'static str },
    #[snafu(display("Please select a survey first."))]
    NoSurveySelected {},
    #[snafu(display(
        "Please select both a MOST INTENSE and LEAST INTENSE word before continuing (question {question_number})."
    ))]
    IncompleteQuestion { question_number: usize },
    #[snafu(display(
        "Please complete all questions before finishing the survey. Incomplete: {}",
        missing.iter().map(|n| n.to_string()).collect::<Vec<_>>().join(", ")
    ))]
    IncompleteSurvey { missing: Vec<usize> },
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum SurveyError {
    #[snafu(display("{source}"))]
    Validation { source: ValidationError },
    #[snafu(display("Error loading survey questions"))]
    Load { source: LoadError },
    #[snafu(display("{operation} is not possible in state {state:?}"))]
    InvalidState {
        operation: &'static str,
        state: SurveyState,
    },
}

impl From<ValidationError> for SurveyError {
    fn from(source: ValidationError) -> Self {
        SurveyError::Validation { source }
    }
}

pub type SurveyResult<T> = Result<T, SurveyError>;

/// Completion of the current survey.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub struct Progress {
    pub completed: usize,
    pub total: usize,
}

impl Progress {
    pub fn percent(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            (self.completed as f64 / self.total as f64) * 100.0
        }
    }
}

/// The answers to one question, as listed before submitting.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct AnswerSummary<'a> {
    /// 1-indexed
    pub question_number: usize,
    pub meaning: &'a str,
    pub most_intense: Option<&'a str>,
    pub least_intense: Option<&'a str>,
}

/// One participant session, from the instructions to the submission.
///
/// All the session state lives here. The submission only reads it.
#[derive(Debug, Clone)]
pub struct SurveySession {
    state: SurveyState,
    store: ResponseStore,
    selected_survey: Option<SurveyId>,
    bank: Option<QuestionBank>,
    fallback_saved: bool,
}

impl Default for SurveySession {
    fn default() -> Self {
        SurveySession::new()
    }
}

impl SurveySession {
    pub fn new() -> SurveySession {
        SurveySession {
            state: SurveyState::Instructions,
            store: ResponseStore::new(),
            selected_survey: None,
            bank: None,
            fallback_saved: false,
        }
    }

    pub fn state(&self) -> SurveyState {
        self.state
    }

    pub fn store(&self) -> &ResponseStore {
        &self.store
    }

    pub fn participant(&self) -> Option<&Participant> {
        self.store.participant()
    }

    pub fn selected_survey(&self) -> Option<SurveyId> {
        self.selected_survey
    }

    pub fn question_count(&self) -> usize {
        self.bank.as_ref().map(|b| b.len()).unwrap_or(0)
    }

    /// The question under the cursor, with its index.
    pub fn current_question(&self) -> Option<(usize, &Question)> {
        match self.state {
            SurveyState::Questioning { cursor } => {
                self.bank.as_ref()?.get(cursor).map(|q| (cursor, q))
            }
            _ => None,
        }
    }

    pub fn progress(&self) -> Progress {
        Progress {
            completed: self.store.completion_count(),
            total: self.question_count(),
        }
    }

    /// Every question of the survey with the words selected so far.
    pub fn answer_summary(&self) -> Vec<AnswerSummary<'_>> {
        let questions = match &self.bank {
            Some(b) => b.questions(),
            None => return Vec::new(),
        };
        questions
            .iter()
            .enumerate()
            .map(|(idx, q)| {
                let response = self.store.response(idx);
                AnswerSummary {
                    question_number: idx + 1,
                    meaning: &q.meaning,
                    most_intense: response.and_then(|r| r.most_intense.as_deref()),
                    least_intense: response.and_then(|r| r.least_intense.as_deref()),
                }
            })
            .collect()
    }

    fn expect_state(&self, operation: &'static str, allowed: bool) -> SurveyResult<()> {
        ensure!(
            allowed,
            InvalidStateSnafu {
                operation,
                state: self.state
            }
        );
        Ok(())
    }

    /// Leaves the instructions for the demographics form.
    pub fn begin(&mut self) -> SurveyResult<()> {
        self.expect_state("begin", self.state == SurveyState::Instructions)?;
        self.state = SurveyState::Demographics;
        Ok(())
    }

    /// Accepts the demographics and records the participant with the current time.
    pub fn submit_demographics(&mut self, form: &Demographics) -> SurveyResult<&Participant> {
        self.expect_state("submit_demographics", self.state == SurveyState::Demographics)?;
        for (field, value) in form.fields() {
            ensure!(!value.trim().is_empty(), MissingDemographicSnafu { field });
        }
        let participant = Participant {
            name: form.name.trim().to_string(),
            age: form.age.trim().to_string(),
            gender: form.gender.trim().to_string(),
            country: form.country.trim().to_string(),
            first_language: form.first_language.trim().to_string(),
            timestamp: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
        };
        info!("Participant {:?} registered at {}", participant.name, participant.timestamp);
        self.store.set_participant(participant);
        self.state = SurveyState::SurveySelection;
        self.store
            .participant()
            .context(InvalidStateSnafu {
                operation: "submit_demographics",
                state: self.state,
            })
    }

    /// Chooses the survey. It can be changed until the questions start.
    pub fn choose_survey(&mut self, survey: SurveyId) -> SurveyResult<()> {
        self.expect_state("choose_survey", self.state == SurveyState::SurveySelection)?;
        debug!("choose_survey: {}", survey);
        self.selected_survey = Some(survey);
        Ok(())
    }

    /// Loads the questions of the selected survey and shows the first one.
    ///
    /// If the questions cannot be loaded, the session stays on the survey selection.
    pub async fn start_questions<S: QuestionSource>(&mut self, source: &S) -> SurveyResult<()> {
        let survey = self.selection_for_start()?;
        match source.load(survey).await {
            Ok(bank) => self.start_with_bank(bank),
            Err(e) => {
                warn!("Failed to load questions for survey {}: {}", survey, e);
                Err(e).context(LoadSnafu {})
            }
        }
    }

    /// Starts the questions with a bank that was loaded elsewhere, for example the
    /// built-in fallback questions.
    pub fn start_with_bank(&mut self, bank: QuestionBank) -> SurveyResult<()> {
        let survey = self.selection_for_start()?;
        info!("Starting survey {} with {} questions", survey, bank.len());
        self.bank = Some(bank);
        self.state = SurveyState::Questioning { cursor: 0 };
        Ok(())
    }

    fn selection_for_start(&self) -> SurveyResult<SurveyId> {
        self.expect_state("start_questions", self.state == SurveyState::SurveySelection)?;
        self.selected_survey
            .context(NoSurveySelectedSnafu {})
            .context(ValidationSnafu {})
    }

    /// Toggles a word of the current question.
    pub fn select_word(&mut self, word: &str) -> SurveyResult<SelectionChange> {
        let cursor = self.cursor("select_word")?;
        let question = self
            .bank
            .as_ref()
            .and_then(|b| b.get(cursor))
            .context(InvalidStateSnafu {
                operation: "select_word",
                state: self.state,
            })?;
        Ok(self.store.select_word(cursor, question, word))
    }

    fn cursor(&self, operation: &'static str) -> SurveyResult<usize> {
        match self.state {
            SurveyState::Questioning { cursor } => Ok(cursor),
            state => InvalidStateSnafu { operation, state }.fail(),
        }
    }

    /// Moves to the next question, or to the completion screen from the last one.
    ///
    /// The current question must be complete. Leaving the last question requires every
    /// question to be complete.
    pub fn next(&mut self) -> SurveyResult<SurveyState> {
        let cursor = self.cursor("next")?;
        ensure!(
            self.store.is_complete(cursor),
            IncompleteQuestionSnafu {
                question_number: cursor + 1
            }
        );
        let total = self.question_count();
        if cursor + 1 < total {
            self.state = SurveyState::Questioning { cursor: cursor + 1 };
        } else {
            self.validate_all()?;
            info!("All {} questions complete", total);
            self.state = SurveyState::Completion;
        }
        Ok(self.state)
    }

    pub fn previous(&mut self) -> SurveyResult<SurveyState> {
        let cursor = self.cursor("previous")?;
        if cursor > 0 {
            self.state = SurveyState::Questioning { cursor: cursor - 1 };
        }
        Ok(self.state)
    }

    /// Returns from the completion screen to the last question.
    pub fn back_to_questions(&mut self) -> SurveyResult<SurveyState> {
        self.expect_state(
            "back_to_questions",
            matches!(self.state, SurveyState::Completion | SurveyState::RetryPrompt),
        )?;
        let last = self.question_count().saturating_sub(1);
        // The answers may change, so an earlier local copy no longer covers them.
        self.fallback_saved = false;
        self.state = SurveyState::Questioning { cursor: last };
        Ok(self.state)
    }

    fn validate_all(&self) -> SurveyResult<()> {
        let missing: Vec<usize> = self
            .store
            .incomplete(self.question_count())
            .iter()
            .map(|idx| idx + 1)
            .collect();
        if !missing.is_empty() {
            debug!("validate_all: incomplete questions {:?}", missing);
        }
        ensure!(missing.is_empty(), IncompleteSurveySnafu { missing });
        Ok(())
    }

    /// The data to submit. Only available once all the questions are answered.
    pub fn submission_batch(&self) -> SurveyResult<SubmissionBatch> {
        self.expect_state(
            "submission_batch",
            matches!(
                self.state,
                SurveyState::Completion | SurveyState::RetryPrompt | SurveyState::Submitting
            ),
        )?;
        self.validate_all()?;
        let state = self.state;
        let invalid = || InvalidStateSnafu {
            operation: "submission_batch",
            state,
        };
        let participant = self.store.participant().with_context(invalid)?;
        let survey = self.selected_survey.with_context(invalid)?;
        let bank = self.bank.as_ref().with_context(invalid)?;
        Ok(SubmissionBatch::build(participant, survey, bank, &self.store))
    }

    /// Submits the responses. Success leads to the success screen; any failure leads to
    /// the retry prompt, with the responses saved by the fallbacks when possible.
    pub async fn submit<T: Transport>(
        &mut self,
        pipeline: &SubmissionPipeline<T>,
    ) -> SurveyResult<SubmissionOutcome> {
        self.expect_state(
            "submit",
            matches!(self.state, SurveyState::Completion | SurveyState::RetryPrompt),
        )?;
        let batch = self.submission_batch()?;
        self.fallback_saved = false;
        self.state = SurveyState::Submitting;
        let outcome = pipeline.deliver(&batch).await;
        match &outcome {
            SubmissionOutcome::Submitted(receipt) => {
                info!(
                    "Survey submitted ({} messages, {} rows confirmed)",
                    receipt.messages, receipt.rows_added
                );
                self.state = SurveyState::Success;
            }
            SubmissionOutcome::SavedLocally { .. } => {
                self.fallback_saved = true;
                self.state = SurveyState::RetryPrompt;
            }
            SubmissionOutcome::Lost { .. } => {
                self.state = SurveyState::RetryPrompt;
            }
        }
        Ok(outcome)
    }

    /// Gives up on a submission that did not finish, for example after the participant
    /// cancelled it.
    pub fn abandon_submission(&mut self) -> SurveyResult<()> {
        self.expect_state("abandon_submission", self.state == SurveyState::Submitting)?;
        self.state = SurveyState::RetryPrompt;
        Ok(())
    }

    /// Finishes the session with the fallback copy instead of a remote submission.
    pub fn accept_fallback(&mut self) -> SurveyResult<()> {
        self.expect_state(
            "accept_fallback",
            self.state == SurveyState::RetryPrompt && self.fallback_saved,
        )?;
        self.state = SurveyState::Success;
        Ok(())
    }

    /// Forgets the participant and all the responses, and goes back to the demographics.
    pub fn reset(&mut self) {
        info!("Resetting the survey session");
        self.store.clear();
        self.selected_survey = None;
        self.bank = None;
        self.fallback_saved = false;
        self.state = SurveyState::Demographics;
    }
}
