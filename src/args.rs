use clap::Parser;

/// This is a terminal program for running word intensity surveys.
#[derive(Parser, Debug, Clone, Default)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path, optional) The JSON file describing the question source, the collection endpoint,
    /// the submission rules and the fallback directories. Relative paths in this file are resolved
    /// against its directory.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,

    /// (directory, file path or URL) Where to read the questions from. Setting this option overrides
    /// the question source that may be specified with the --config option.
    #[clap(short, long, value_parser)]
    pub questions: Option<String>,

    /// (default csv) The type of the question source: csv (a directory of survey<N>.csv files),
    /// excel (a workbook with survey<N> worksheets) or http.
    #[clap(long, value_parser)]
    pub input_type: Option<String>,

    /// (URL) The collection endpoint receiving the responses. Without endpoint, the responses are
    /// only saved locally.
    #[clap(short, long, value_parser)]
    pub endpoint: Option<String>,

    /// (default form) How the responses are posted: form or direct.
    #[clap(long, value_parser)]
    pub transport: Option<String>,

    /// (1 to 5) The survey to run. If not specified, the participant chooses one.
    #[clap(short, long, value_parser)]
    pub survey: Option<u8>,

    /// (file path) A JSON file with the demographics and the answers of a participant. The answers
    /// are replayed without prompting, then submitted.
    #[clap(short, long, value_parser)]
    pub answers: Option<String>,

    /// (directory, default current directory) Where the local copy of failed submissions is kept.
    #[clap(long, value_parser)]
    pub store: Option<String>,

    /// (directory, default current directory) Where the export file of failed submissions is written.
    #[clap(long, value_parser)]
    pub export_dir: Option<String>,

    /// (default 25) The maximum number of responses sent in a single message.
    #[clap(long, value_parser)]
    pub chunk_size: Option<usize>,

    /// If passed as an argument, sends a single test response from a test participant to the
    /// collection endpoint, reports the reply and exits. No survey is run.
    #[clap(long, takes_value = false)]
    pub test_endpoint: bool,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
