// Replaying the answers of a participant from a JSON file.

use std::fs;

use log::{debug, info};
use serde::{Deserialize, Serialize};
use snafu::prelude::*;

use word_intensity::*;

use crate::runner::*;

/// The answers of one participant, as prepared for batch entry.
///
/// ```text
/// {"participant": {"name": "Ada", "age": "36", "gender": "female", "country": "UK", "firstLanguage": "English"},
///  "survey": "1",
///  "answers": [["radiant", "dim"], ["rapid", "slow"]]}
/// ```
///
/// Each answer is the most intense word followed by the least intense word, in question order.
#[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScriptedSession {
    pub participant: Demographics,
    pub survey: SurveyId,
    pub answers: Vec<[String; 2]>,
}

pub fn read_script(path: &str) -> BAppResult<ScriptedSession> {
    let contents = fs::read_to_string(path).context(OpeningAnswersSnafu { path })?;
    let script: ScriptedSession =
        serde_json::from_str(contents.as_str()).context(ParsingAnswersSnafu { path })?;
    info!(
        "Read {} answers for survey {} from {}",
        script.answers.len(),
        script.survey,
        path
    );
    Ok(script)
}

fn select(session: &mut SurveySession, question_number: usize, word: &str, role: Role) -> BAppResult<()> {
    let change = session.select_word(word).context(SurveySnafu {})?;
    debug!("select: question {}: {:?} -> {:?}", question_number, word, change);
    ensure!(
        change == SelectionChange::Marked(role),
        UnexpectedWordSnafu {
            question_number,
            word
        }
    );
    Ok(())
}

/// Runs the session of the script through the survey screens, then submits it.
pub async fn replay<S: QuestionSource, T: Transport>(
    script: &ScriptedSession,
    source: Option<&S>,
    pipeline: &SubmissionPipeline<T>,
) -> BAppResult<SubmissionOutcome> {
    let mut session = SurveySession::new();
    session.begin().context(SurveySnafu {})?;
    session
        .submit_demographics(&script.participant)
        .context(SurveySnafu {})?;
    session
        .choose_survey(script.survey)
        .context(SurveySnafu {})?;
    if start_questions(&mut session, source).await? {
        info!("The answers are replayed against the built-in questions");
    }

    let total = session.question_count();
    ensure!(
        script.answers.len() == total,
        AnswerCountSnafu {
            answered: script.answers.len(),
            total
        }
    );
    for (idx, [most, least]) in script.answers.iter().enumerate() {
        select(&mut session, idx + 1, most, Role::MostIntense)?;
        select(&mut session, idx + 1, least, Role::LeastIntense)?;
        session.next().context(SurveySnafu {})?;
    }

    let outcome = session.submit(pipeline).await.context(SurveySnafu {})?;
    if let SubmissionOutcome::SavedLocally { .. } = outcome {
        // Batch entry has nobody to ask: the local copy is final.
        session.accept_fallback().context(SurveySnafu {})?;
    }
    Ok(outcome)
}
