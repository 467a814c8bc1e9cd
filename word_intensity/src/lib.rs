/*!
Response collection and submission for word intensity surveys.

A participant sees a sequence of questions. Each question has a meaning and four words,
and the participant marks the most intense and the least intense of the four words.
This crate holds everything behind the screens of such a survey:

- [`SurveySession`] is the state machine of a participant session, from the instructions
  to the final submission.
- [`QuestionSource`] loads the question bank of a survey from a directory of CSV files,
  an Excel workbook or an HTTP endpoint.
- [`SubmissionPipeline`] sends the responses to the collection endpoint, in chunks when
  there are many of them, and saves them locally and to an export file when the endpoint
  cannot be reached.

See the [quick_start] module for an end to end example.
*/

mod attention;
mod config;
mod fallback;
mod instructions;
mod questions;
mod responses;
mod session;
mod submission;
mod transport;

pub mod quick_start;

pub use crate::attention::*;
pub use crate::config::*;
pub use crate::fallback::*;
pub use crate::instructions::*;
pub use crate::questions::*;
pub use crate::responses::*;
pub use crate::session::*;
pub use crate::submission::*;
pub use crate::transport::*;
