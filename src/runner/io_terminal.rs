// Line-oriented terminal front end.

use std::io::{BufRead, Write};

use log::{debug, info};
use snafu::prelude::*;

use word_intensity::*;

use crate::runner::*;

const WELCOME: &str = "Welcome to the word intensity survey.

For each question you will see a meaning and four words. Select the word that expresses
the meaning MOST INTENSELY and the word that expresses it LEAST INTENSELY. The first word
you select is the most intense one, the second is the least intense one. Selecting a word
again deselects it.

Commands: 1-4 select a word, n next question, p previous question, r restart, q quit.";

/// How a terminal session ended.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum SessionEnd {
    Finished,
    Quit,
}

enum Flow {
    Continue,
    Quit,
}

pub struct Terminal<R: BufRead, W: Write> {
    input: R,
    output: W,
}

impl<R: BufRead, W: Write> Terminal<R, W> {
    pub fn new(input: R, output: W) -> Terminal<R, W> {
        Terminal { input, output }
    }

    fn say(&mut self, text: &str) -> BAppResult<()> {
        writeln!(self.output, "{}", text).context(TerminalSnafu {})?;
        Ok(())
    }

    /// Reads one trimmed line. None at the end of the input.
    fn ask(&mut self, prompt: &str) -> BAppResult<Option<String>> {
        write!(self.output, "{} ", prompt).context(TerminalSnafu {})?;
        self.output.flush().context(TerminalSnafu {})?;
        let mut line = String::new();
        let n = self.input.read_line(&mut line).context(TerminalSnafu {})?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(line.trim().to_string()))
    }

    pub async fn run<S: QuestionSource, T: Transport>(
        &mut self,
        session: &mut SurveySession,
        source: Option<&S>,
        pipeline: &SubmissionPipeline<T>,
        mut preset_survey: Option<SurveyId>,
    ) -> BAppResult<SessionEnd> {
        loop {
            debug!("run: state {:?}", session.state());
            let flow = match session.state() {
                SurveyState::Instructions => self.instructions(session)?,
                SurveyState::Demographics => self.demographics(session)?,
                SurveyState::SurveySelection => {
                    self.survey_selection(session, source, preset_survey.take())
                        .await?
                }
                SurveyState::Questioning { .. } => self.question(session)?,
                SurveyState::Completion => self.completion(session, pipeline).await?,
                SurveyState::Submitting => {
                    session.abandon_submission().context(SurveySnafu {})?;
                    Flow::Continue
                }
                SurveyState::RetryPrompt => self.retry_prompt(session, pipeline).await?,
                SurveyState::Success => {
                    self.say("Thank you for taking part in this survey.")?;
                    return Ok(SessionEnd::Finished);
                }
            };
            if let Flow::Quit = flow {
                info!("The participant left the survey in state {:?}", session.state());
                return Ok(SessionEnd::Quit);
            }
        }
    }

    fn instructions(&mut self, session: &mut SurveySession) -> BAppResult<Flow> {
        self.say(WELCOME)?;
        if self.ask("Press Enter to begin.")?.is_none() {
            return Ok(Flow::Quit);
        }
        session.begin().context(SurveySnafu {})?;
        Ok(Flow::Continue)
    }

    fn demographics(&mut self, session: &mut SurveySession) -> BAppResult<Flow> {
        self.say("\nAbout you")?;
        let mut values: Vec<String> = Vec::with_capacity(5);
        for label in ["Name", "Age", "Gender", "Country", "First language"] {
            match self.ask(&format!("{}:", label))? {
                Some(v) => values.push(v),
                None => return Ok(Flow::Quit),
            }
        }
        let [name, age, gender, country, first_language]: [String; 5] = match values.try_into() {
            Ok(v) => v,
            Err(_) => return Ok(Flow::Quit),
        };
        let form = Demographics {
            name,
            age,
            gender,
            country,
            first_language,
        };
        match session.submit_demographics(&form) {
            Ok(_) => {}
            Err(SurveyError::Validation { source }) => self.say(&source.to_string())?,
            Err(e) => return Err(Box::new(AppError::Survey { source: e })),
        }
        Ok(Flow::Continue)
    }

    async fn survey_selection<S: QuestionSource>(
        &mut self,
        session: &mut SurveySession,
        source: Option<&S>,
        preset: Option<SurveyId>,
    ) -> BAppResult<Flow> {
        let survey = match preset {
            Some(s) => s,
            None => match self.ask("\nChoose a survey (1-5):")? {
                None => return Ok(Flow::Quit),
                Some(answer) => match SurveyId::parse(&answer) {
                    Some(s) => s,
                    None => {
                        self.say("Please select a survey first.")?;
                        return Ok(Flow::Continue);
                    }
                },
            },
        };
        session.choose_survey(survey).context(SurveySnafu {})?;

        self.say(&format!("\nSurvey {}", survey))?;
        for category in categories_for(survey) {
            self.say(&format!("\n{}: {}", category.name, category.meaning))?;
            for example in category.examples.iter() {
                self.say(&format!("  - {}", example))?;
            }
            self.say(category.rating)?;
        }
        if self.ask("\nPress Enter to start the questions.")?.is_none() {
            return Ok(Flow::Quit);
        }
        if start_questions(session, source).await? {
            self.say("The survey questions could not be loaded. Demonstration questions are used instead.")?;
        }
        Ok(Flow::Continue)
    }

    fn render_question(&mut self, session: &SurveySession) -> BAppResult<()> {
        let (cursor, question) = match session.current_question() {
            Some(q) => q,
            None => return Ok(()),
        };
        let progress = session.progress();
        let mut lines = vec![format!(
            "\nQuestion {} of {} ({:.0}% complete)",
            cursor + 1,
            progress.total,
            progress.percent()
        )];
        lines.push(format!("Meaning: {}", question.meaning));
        let response = session.store().response(cursor);
        for (idx, word) in question.words.iter().enumerate() {
            let mark = match response.and_then(|r| r.role_of(word)) {
                Some(role) => format!("  <- {}", role),
                None => String::new(),
            };
            lines.push(format!("  {}. {}{}", idx + 1, word, mark));
        }
        self.say(&lines.join("\n"))
    }

    fn question(&mut self, session: &mut SurveySession) -> BAppResult<Flow> {
        self.render_question(session)?;
        let command = match self.ask(">")? {
            Some(c) => c,
            None => return Ok(Flow::Quit),
        };
        match command.as_str() {
            "1" | "2" | "3" | "4" => {
                let word = session
                    .current_question()
                    .and_then(|(_, q)| q.words.get(command.parse::<usize>().ok()? - 1).cloned());
                if let Some(word) = word {
                    let change = session.select_word(&word).context(SurveySnafu {})?;
                    if change == SelectionChange::SlotsFull {
                        self.say("Both words are already selected. Deselect one of them first.")?;
                    }
                }
            }
            "n" => match session.next() {
                Ok(_) => {}
                Err(SurveyError::Validation { source }) => self.say(&source.to_string())?,
                Err(e) => return Err(Box::new(AppError::Survey { source: e })),
            },
            "p" => {
                session.previous().context(SurveySnafu {})?;
            }
            "r" => {
                if self.confirm("Restart the survey and discard your answers? (y/n)")? {
                    session.reset();
                }
            }
            "q" => return Ok(Flow::Quit),
            x => self.say(&format!("Unknown command {:?}", x))?,
        }
        Ok(Flow::Continue)
    }

    fn confirm(&mut self, prompt: &str) -> BAppResult<bool> {
        Ok(matches!(self.ask(prompt)?.as_deref(), Some("y") | Some("yes")))
    }

    async fn completion<T: Transport>(
        &mut self,
        session: &mut SurveySession,
        pipeline: &SubmissionPipeline<T>,
    ) -> BAppResult<Flow> {
        let progress = session.progress();
        self.say(&format!(
            "\nYou have answered all {} questions.",
            progress.total
        ))?;
        match self.ask("Submit your responses? (Enter to submit, v to view your answers, b to go back, q to quit)")? {
            None => Ok(Flow::Quit),
            Some(a) if a == "q" => Ok(Flow::Quit),
            Some(a) if a == "b" => {
                session.back_to_questions().context(SurveySnafu {})?;
                Ok(Flow::Continue)
            }
            Some(a) if a == "v" => {
                self.show_answers(session)?;
                Ok(Flow::Continue)
            }
            Some(_) => self.submit(session, pipeline).await,
        }
    }

    fn show_answers(&mut self, session: &SurveySession) -> BAppResult<()> {
        let mut lines: Vec<String> = Vec::new();
        for answer in session.answer_summary() {
            lines.push(format!("\nQ{}: {}", answer.question_number, answer.meaning));
            lines.push(format!(
                "  Most intense: {}",
                answer.most_intense.unwrap_or("Not selected")
            ));
            lines.push(format!(
                "  Least intense: {}",
                answer.least_intense.unwrap_or("Not selected")
            ));
        }
        self.say(&lines.join("\n"))
    }

    async fn submit<T: Transport>(
        &mut self,
        session: &mut SurveySession,
        pipeline: &SubmissionPipeline<T>,
    ) -> BAppResult<Flow> {
        self.say("Submitting your responses...")?;
        let outcome = session.submit(pipeline).await.context(SurveySnafu {})?;
        debug!("submit: outcome {:?}", outcome);
        self.say(&outcome_message(&outcome))?;
        Ok(Flow::Continue)
    }

    async fn retry_prompt<T: Transport>(
        &mut self,
        session: &mut SurveySession,
        pipeline: &SubmissionPipeline<T>,
    ) -> BAppResult<Flow> {
        let answer = self.ask("\nr to retry the submission, a to finish with the saved copy, q to quit:")?;
        match answer.as_deref() {
            None | Some("q") => Ok(Flow::Quit),
            Some("r") => self.submit(session, pipeline).await,
            Some("a") => {
                if session.accept_fallback().is_err() {
                    self.say("No copy of your responses could be saved. Please retry.")?;
                }
                Ok(Flow::Continue)
            }
            Some(x) => {
                self.say(&format!("Unknown command {:?}", x))?;
                Ok(Flow::Continue)
            }
        }
    }
}
