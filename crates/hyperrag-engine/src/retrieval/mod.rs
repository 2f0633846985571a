//! Query side: keyword extraction and answer synthesis.

pub mod answer;
pub mod keywords;

pub use answer::{Answer, AnswerOptions, Answerer};
pub use keywords::{KeywordExtractor, parse_keywords};
