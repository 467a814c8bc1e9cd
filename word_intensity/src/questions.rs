// Loading and validation of the question banks.

use std::collections::HashSet;
use std::future::Future;
use std::path::{Path, PathBuf};

use calamine::{open_workbook, DataType, Reader, Xlsx};
use log::{debug, info};
use snafu::prelude::*;

use crate::config::{Question, SurveyId};

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum LoadError {
    #[snafu(display("Error opening question file {path}"))]
    OpeningFile {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error opening question workbook {path}"))]
    OpeningExcel {
        source: calamine::XlsxError,
        path: String,
    },
    #[snafu(display("Worksheet {worksheet} is missing from {path}"))]
    MissingWorksheet { worksheet: String, path: String },
    #[snafu(display("Line {lineno}: could not understand cell {content}"))]
    ExcelWrongCellType { lineno: usize, content: String },
    #[snafu(display("Error fetching questions from {url}"))]
    Fetching { source: reqwest::Error, url: String },
    #[snafu(display("Question source {url} answered with status {status}"))]
    SourceStatus { url: String, status: u16 },
    #[snafu(display("Error parsing CSV line {lineno}"))]
    CsvLineParse { source: csv::Error, lineno: usize },
    #[snafu(display(
        "Question {number} has invalid format: expected a meaning and exactly 4 words, found {found} fields"
    ))]
    WrongFieldCount { number: usize, found: usize },
    #[snafu(display("Question {number} has invalid format: the meaning is empty"))]
    MissingMeaning { number: usize },
    #[snafu(display("Question {number} has invalid format: one of the words is empty"))]
    EmptyWord { number: usize },
    #[snafu(display("Question {number} has invalid format: the word {word:?} appears twice"))]
    DuplicateWord { number: usize, word: String },
    #[snafu(display("No questions found or invalid format"))]
    EmptyBank {},
}

pub type LoadResult<T> = Result<T, LoadError>;

/// The ordered questions of one survey.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct QuestionBank {
    questions: Vec<Question>,
}

impl QuestionBank {
    /// Builds a bank from raw records (meaning followed by the words).
    ///
    /// A single bad record rejects the whole bank.
    pub fn from_records(records: &[Vec<String>]) -> LoadResult<QuestionBank> {
        let mut questions: Vec<Question> = Vec::with_capacity(records.len());
        for (idx, record) in records.iter().enumerate() {
            questions.push(validate_record(idx + 1, record)?);
        }
        QuestionBank::new(questions)
    }

    pub fn new(questions: Vec<Question>) -> LoadResult<QuestionBank> {
        ensure!(!questions.is_empty(), EmptyBankSnafu {});
        Ok(QuestionBank { questions })
    }

    /// The demonstration questions used when no survey file can be read.
    pub fn fallback() -> QuestionBank {
        QuestionBank {
            questions: FALLBACK_QUESTIONS
                .iter()
                .map(|(meaning, words)| Question::new(meaning, *words))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.questions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Question> {
        self.questions.get(index)
    }

    pub fn questions(&self) -> &[Question] {
        &self.questions
    }
}

const FALLBACK_QUESTIONS: [(&str, [&str; 4]); 10] = [
    ("degree of brightness", ["dim", "bright", "brilliant", "radiant"]),
    ("speed of movement", ["slow", "moderate", "fast", "rapid"]),
    ("emotional intensity", ["calm", "excited", "thrilled", "ecstatic"]),
    ("level of difficulty", ["easy", "moderate", "challenging", "impossible"]),
    ("temperature sensation", ["cool", "warm", "hot", "scorching"]),
    ("volume of sound", ["quiet", "audible", "loud", "deafening"]),
    ("physical strength", ["weak", "average", "strong", "powerful"]),
    ("level of happiness", ["sad", "content", "happy", "ecstatic"]),
    ("size of object", ["tiny", "small", "large", "enormous"]),
    ("quality of taste", ["bland", "mild", "flavorful", "intense"]),
];

fn validate_record(number: usize, record: &[String]) -> LoadResult<Question> {
    ensure!(
        record.len() == 5,
        WrongFieldCountSnafu {
            number,
            found: record.len()
        }
    );
    let meaning = record[0].trim();
    ensure!(!meaning.is_empty(), MissingMeaningSnafu { number });

    let mut seen: HashSet<&str> = HashSet::new();
    for w in record[1..].iter().map(|w| w.trim()) {
        ensure!(!w.is_empty(), EmptyWordSnafu { number });
        ensure!(
            seen.insert(w),
            DuplicateWordSnafu {
                number,
                word: w.to_string()
            }
        );
    }
    Ok(Question::new(
        meaning,
        [
            record[1].trim(),
            record[2].trim(),
            record[3].trim(),
            record[4].trim(),
        ],
    ))
}

/// Parses the tabular text format: a header row, then `meaning,word1,word2,word3,word4`.
pub fn parse_csv(text: &str) -> LoadResult<QuestionBank> {
    let rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(text.as_bytes());
    let mut records: Vec<Vec<String>> = Vec::new();
    for (idx, line_r) in rdr.into_records().enumerate() {
        // The header is line 1
        let lineno = idx + 2;
        let line = line_r.context(CsvLineParseSnafu { lineno })?;
        debug!("parse_csv: lineno: {:?} row: {:?}", lineno, line);
        records.push(line.iter().map(|s| s.to_string()).collect());
    }
    QuestionBank::from_records(&records)
}

/// Somewhere the question banks can be loaded from.
pub trait QuestionSource {
    fn load(&self, survey: SurveyId) -> impl Future<Output = LoadResult<QuestionBank>> + Send;
}

/// A directory holding one `survey<N>.csv` file per survey.
#[derive(Debug, Clone)]
pub struct CsvDirectory {
    root: PathBuf,
}

impl CsvDirectory {
    pub fn new(root: impl Into<PathBuf>) -> CsvDirectory {
        CsvDirectory { root: root.into() }
    }

    pub fn file_for(&self, survey: SurveyId) -> PathBuf {
        self.root.join(format!("survey{}.csv", survey))
    }
}

impl QuestionSource for CsvDirectory {
    async fn load(&self, survey: SurveyId) -> LoadResult<QuestionBank> {
        let p = self.file_for(survey);
        let path = p.display().to_string();
        info!("Attempting to read question file {:?}", path);
        let text = std::fs::read_to_string(&p).context(OpeningFileSnafu { path: path.clone() })?;
        let bank = parse_csv(&text)?;
        info!("Loaded {} questions from {}", bank.len(), path);
        Ok(bank)
    }
}

/// An Excel workbook with one worksheet per survey, named `survey<N>`.
///
/// The worksheets follow the same layout as the CSV files.
#[derive(Debug, Clone)]
pub struct ExcelWorkbook {
    path: PathBuf,
}

impl ExcelWorkbook {
    pub fn new(path: impl Into<PathBuf>) -> ExcelWorkbook {
        ExcelWorkbook { path: path.into() }
    }
}

impl QuestionSource for ExcelWorkbook {
    async fn load(&self, survey: SurveyId) -> LoadResult<QuestionBank> {
        let worksheet = format!("survey{}", survey);
        let records = read_worksheet(&self.path, &worksheet)?;
        let bank = QuestionBank::from_records(&records)?;
        info!(
            "Loaded {} questions from worksheet {} of {:?}",
            bank.len(),
            worksheet,
            self.path
        );
        Ok(bank)
    }
}

fn read_worksheet(p: &Path, worksheet: &str) -> LoadResult<Vec<Vec<String>>> {
    let path = p.display().to_string();
    debug!("read_worksheet: path: {:?} worksheet: {:?}", &path, worksheet);
    let mut workbook: Xlsx<_> = open_workbook(p).context(OpeningExcelSnafu { path: path.clone() })?;
    let wrange = workbook
        .worksheet_range(worksheet)
        .context(MissingWorksheetSnafu {
            worksheet,
            path: path.clone(),
        })?
        .context(OpeningExcelSnafu { path })?;

    let mut iter = wrange.rows();
    // Header row
    iter.next();
    let mut records: Vec<Vec<String>> = Vec::new();
    for (idx, row) in iter.enumerate() {
        let lineno = idx + 2;
        let mut cells: Vec<String> = Vec::new();
        for cell in row {
            cells.push(read_cell(cell, lineno)?);
        }
        // Calamine pads rows to the width of the sheet.
        while cells.last().map(|c| c.is_empty()).unwrap_or(false) {
            cells.pop();
        }
        if cells.is_empty() {
            continue;
        }
        debug!("read_worksheet: lineno: {:?} row: {:?}", lineno, &cells);
        records.push(cells);
    }
    Ok(records)
}

fn read_cell(cell: &DataType, lineno: usize) -> LoadResult<String> {
    match cell {
        DataType::String(s) => Ok(s.trim().to_string()),
        DataType::Empty => Ok("".to_string()),
        DataType::Int(i) => Ok(i.to_string()),
        DataType::Float(f) => Ok(f.to_string()),
        _ => ExcelWrongCellTypeSnafu {
            lineno,
            content: format!("{:?}", cell),
        }
        .fail(),
    }
}

/// A remote source queried with `GET <url>?surveyId=<id>`, answering with the CSV format.
#[derive(Debug, Clone)]
pub struct HttpQuestions {
    client: reqwest::Client,
    url: String,
}

impl HttpQuestions {
    pub fn new(url: &str) -> HttpQuestions {
        HttpQuestions {
            client: reqwest::Client::new(),
            url: url.to_string(),
        }
    }
}

impl QuestionSource for HttpQuestions {
    async fn load(&self, survey: SurveyId) -> LoadResult<QuestionBank> {
        info!("Fetching questions for survey {} from {}", survey, self.url);
        let response = self
            .client
            .get(&self.url)
            .query(&[("surveyId", survey.to_string())])
            .send()
            .await
            .context(FetchingSnafu { url: &self.url })?;
        let status = response.status();
        ensure!(
            status.is_success(),
            SourceStatusSnafu {
                url: &self.url,
                status: status.as_u16()
            }
        );
        let text = response
            .text()
            .await
            .context(FetchingSnafu { url: &self.url })?;
        parse_csv(&text)
    }
}

/// The question sources that can be selected from the configuration.
#[derive(Debug, Clone)]
pub enum QuestionProvider {
    Csv(CsvDirectory),
    Excel(ExcelWorkbook),
    Http(HttpQuestions),
}

impl QuestionSource for QuestionProvider {
    async fn load(&self, survey: SurveyId) -> LoadResult<QuestionBank> {
        match self {
            QuestionProvider::Csv(s) => s.load(survey).await,
            QuestionProvider::Excel(s) => s.load(survey).await,
            QuestionProvider::Http(s) => s.load(survey).await,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SURVEY: &str = "meaning,word1,word2,word3,word4
degree of brightness,dim,bright,brilliant,radiant
speed of movement, slow , moderate,fast,rapid
";

    #[test]
    fn parses_questions_in_order() {
        let bank = parse_csv(SURVEY).unwrap();
        assert_eq!(bank.len(), 2);
        assert_eq!(
            bank.get(1),
            Some(&Question::new(
                "speed of movement",
                ["slow", "moderate", "fast", "rapid"]
            ))
        );
        assert!(bank.get(2).is_none());
    }

    #[test]
    fn short_row_invalidates_load() {
        let text = format!("{}level of difficulty,easy,hard,impossible\n", SURVEY);
        let err = parse_csv(&text).unwrap_err();
        assert!(matches!(
            err,
            LoadError::WrongFieldCount {
                number: 3,
                found: 4
            }
        ));
    }

    #[test]
    fn long_row_invalidates_load() {
        let text = format!("{}size,tiny,small,large,huge,enormous\n", SURVEY);
        assert!(matches!(
            parse_csv(&text),
            Err(LoadError::WrongFieldCount { found: 6, .. })
        ));
    }

    #[test]
    fn missing_meaning_invalidates_load() {
        let text = format!("{},cool,warm,hot,scorching\n", SURVEY);
        assert!(matches!(
            parse_csv(&text),
            Err(LoadError::MissingMeaning { number: 3 })
        ));
    }

    #[test]
    fn repeated_word_invalidates_load() {
        let text = "meaning,w1,w2,w3,w4\nvolume,quiet,loud,loud,deafening\n";
        assert!(matches!(
            parse_csv(text),
            Err(LoadError::DuplicateWord { number: 1, .. })
        ));
    }

    #[test]
    fn header_only_is_empty() {
        assert!(matches!(
            parse_csv("meaning,word1,word2,word3,word4\n"),
            Err(LoadError::EmptyBank {})
        ));
    }

    #[test]
    fn fallback_bank_is_valid() {
        let bank = QuestionBank::fallback();
        assert_eq!(bank.len(), 10);
        let records: Vec<Vec<String>> = bank
            .questions()
            .iter()
            .map(|q| {
                let mut r = vec![q.meaning.clone()];
                r.extend(q.words.iter().cloned());
                r
            })
            .collect();
        assert_eq!(QuestionBank::from_records(&records).unwrap(), bank);
    }

    #[tokio::test]
    async fn csv_directory_reads_survey_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut f = std::fs::File::create(dir.path().join("survey3.csv")).unwrap();
        f.write_all(SURVEY.as_bytes()).unwrap();

        let source = CsvDirectory::new(dir.path());
        let bank = source.load(SurveyId::new(3).unwrap()).await.unwrap();
        assert_eq!(bank.len(), 2);

        let missing = source.load(SurveyId::new(4).unwrap()).await;
        assert!(matches!(missing, Err(LoadError::OpeningFile { .. })));
    }

    #[tokio::test]
    async fn http_source_asks_for_the_survey() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/questions"))
            .and(query_param("surveyId", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_string(SURVEY))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/questions"))
            .and(query_param("surveyId", "5"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let source = HttpQuestions::new(&format!("{}/questions", server.uri()));
        let bank = source.load(SurveyId::new(2).unwrap()).await.unwrap();
        assert_eq!(bank.len(), 2);
        assert_eq!(bank.get(0).unwrap().meaning, "degree of brightness");

        assert!(matches!(
            source.load(SurveyId::new(5).unwrap()).await,
            Err(LoadError::SourceStatus { status: 503, .. })
        ));
    }

    /// Writes a minimal workbook with one worksheet of shared strings.
    fn write_workbook(p: &Path, worksheet: &str, rows: &[&[&str]]) {
        let mut strings: Vec<String> = Vec::new();
        let mut sheet_rows = String::new();
        for (r, row) in rows.iter().enumerate() {
            sheet_rows.push_str(&format!("<row r=\"{}\">", r + 1));
            for (c, cell) in row.iter().enumerate() {
                let column = (b'A' + c as u8) as char;
                sheet_rows.push_str(&format!(
                    "<c r=\"{}{}\" t=\"s\"><v>{}</v></c>",
                    column,
                    r + 1,
                    strings.len()
                ));
                strings.push(format!("<si><t>{}</t></si>", cell));
            }
            sheet_rows.push_str("</row>");
        }
        let main = "http://schemas.openxmlformats.org/spreadsheetml/2006/main";
        let rels = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
        let files = [
            (
                "xl/workbook.xml",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?><workbook xmlns="{}" xmlns:r="{}"><sheets><sheet name="{}" sheetId="1" r:id="rId1"/></sheets></workbook>"#,
                    main, rels, worksheet
                ),
            ),
            (
                "xl/_rels/workbook.xml.rels",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="{}/worksheet" Target="worksheets/sheet1.xml"/></Relationships>"#,
                    rels
                ),
            ),
            (
                "xl/worksheets/sheet1.xml",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?><worksheet xmlns="{}"><sheetData>{}</sheetData></worksheet>"#,
                    main, sheet_rows
                ),
            ),
            (
                "xl/sharedStrings.xml",
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8"?><sst xmlns="{}">{}</sst>"#,
                    main,
                    strings.join("")
                ),
            ),
        ];
        let mut zip = zip::ZipWriter::new(std::fs::File::create(p).unwrap());
        let options =
            zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Stored);
        for (name, contents) in files.iter() {
            zip.start_file(*name, options).unwrap();
            zip.write_all(contents.as_bytes()).unwrap();
        }
        zip.finish().unwrap();
    }

    #[tokio::test]
    async fn excel_workbook_reads_survey_worksheet() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("surveys.xlsx");
        write_workbook(
            &p,
            "survey1",
            &[
                &["meaning", "word1", "word2", "word3", "word4"],
                &["degree of brightness", "dim", "bright", "brilliant", "radiant"],
                &["speed of movement", " slow ", "moderate", "fast", "rapid"],
            ],
        );

        let source = ExcelWorkbook::new(&p);
        let bank = source.load(SurveyId::new(1).unwrap()).await.unwrap();
        assert_eq!(bank.len(), 2);
        assert_eq!(
            bank.get(1),
            Some(&Question::new(
                "speed of movement",
                ["slow", "moderate", "fast", "rapid"]
            ))
        );

        assert!(matches!(
            source.load(SurveyId::new(2).unwrap()).await,
            Err(LoadError::MissingWorksheet { .. })
        ));
        assert!(matches!(
            ExcelWorkbook::new(dir.path().join("none.xlsx"))
                .load(SurveyId::new(1).unwrap())
                .await,
            Err(LoadError::OpeningExcel { .. })
        ));
    }

    #[tokio::test]
    async fn excel_short_row_invalidates_load() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("surveys.xlsx");
        write_workbook(
            &p,
            "survey3",
            &[
                &["meaning", "word1", "word2", "word3", "word4"],
                &["degree of brightness", "dim", "bright", "brilliant", "radiant"],
                &["level of difficulty", "easy", "hard", "impossible"],
            ],
        );
        assert!(matches!(
            ExcelWorkbook::new(&p).load(SurveyId::new(3).unwrap()).await,
            Err(LoadError::WrongFieldCount {
                number: 2,
                found: 4
            })
        ));
    }
}
