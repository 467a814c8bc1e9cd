/*!

# Quick start with a spreadsheet endpoint

This example shows how to run a survey end to end and collect the responses in an online
spreadsheet. Any HTTP endpoint that accepts a POST request and answers with a small JSON
document works; a script attached to a Google Sheet is the common choice because it is
free and needs no server.

**Preparing the questions** Each survey has its own list of questions. The simplest
format is a directory with one CSV file per survey, named `survey1.csv` to `survey5.csv`.
The first row is a header and is ignored. Every other row holds the meaning of the question
followed by exactly four words:

```text
meaning,word1,word2,word3,word4
degree of brightness,dim,bright,brilliant,radiant
speed of movement,slow,moderate,fast,rapid
```

A row with a missing word, an extra word or the same word twice rejects the whole file.
The same layout can be used in an Excel workbook with one worksheet per survey
(`survey1` to `survey5`), or served by an HTTP endpoint that returns the CSV text for
`?surveyId=<N>`.

**Preparing the endpoint** The endpoint receives the responses either as a form with a
single `data` field (the default), or as a JSON body. In both cases the document looks
like this:

```text
{
  "timestamp": "2024-05-01T10:12:31.482Z",
  "selectedSurvey": "1",
  "participant": {"name": "Ada", "age": "36", "gender": "female", "country": "UK", "firstLanguage": "English"},
  "responses": [
    {"questionNumber": 1, "meaning": "degree of brightness", "mostIntense": "radiant",
     "leastIntense": "dim", "words": ["dim", "bright", "brilliant", "radiant"], "isExample": false}
  ]
}
```

More than 25 responses are sent in several messages, each one with an extra `chunkInfo`
object (`chunkNumber`, `totalChunks`, `isChunked`). The endpoint should answer
`{"success": true, "rowsAdded": 12}` or `{"success": false, "error": "..."}`.

**Running a session** With the library:

```rust,no_run
use word_intensity::*;

# async fn run() -> Result<(), Box<dyn std::error::Error>> {
let source = CsvDirectory::new("surveys");
let endpoint = Endpoint::Http(HttpTransport::new(
    "https://example.org/collect",
    TransportMode::Form,
)?);
let pipeline = SubmissionPipeline::new(
    endpoint,
    SubmissionRules::default(),
    Fallback::new("data", "exports"),
);

let mut session = SurveySession::new();
session.begin()?;
session.submit_demographics(&Demographics {
    name: "Ada".to_string(),
    age: "36".to_string(),
    gender: "female".to_string(),
    country: "UK".to_string(),
    first_language: "English".to_string(),
})?;
session.choose_survey(SurveyId::new(1).ok_or("unknown survey")?)?;
session.start_questions(&source).await?;

while let Some((_, question)) = session.current_question() {
    let words = question.words.clone();
    session.select_word(&words[3])?;
    session.select_word(&words[0])?;
    session.next()?;
}

match session.submit(&pipeline).await? {
    SubmissionOutcome::Submitted(receipt) => println!("stored {} rows", receipt.rows_added),
    SubmissionOutcome::SavedLocally { export_path, .. } => {
        println!("saved locally, export file: {:?}", export_path)
    }
    SubmissionOutcome::Lost { cause, .. } => println!("could not save the responses: {}", cause),
}
# Ok(())
# }
```

The `next` call after the last question moves the session to the completion screen, which
ends the loop.

Or with the command line program, using the same directory of questions:

```bash
wisurvey --questions surveys --endpoint https://example.org/collect
```

Before running a survey, `wisurvey --endpoint https://example.org/collect --test-endpoint`
sends a single row from a `Test User` participant and reports what the endpoint answered.

If the endpoint cannot be reached, the responses are appended to
`surveyResponses.json` in the store directory and written to a CSV file named
`Word_Intensity_Survey_<name>_<date>.csv` that the participant can send by email. An
existing export is never replaced: a second export with the same name gets a `_2` suffix.

*/
