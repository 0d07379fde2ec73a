//! Read-only question catalog loaded once at startup and shared across duels.

use std::{env, fs, io::ErrorKind, path::PathBuf};

use indexmap::IndexMap;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, warn};

/// Default location on disk where the server looks for the question set.
const DEFAULT_CATALOG_PATH: &str = "config/questions.json";
/// Environment variable that overrides [`DEFAULT_CATALOG_PATH`].
const CATALOG_PATH_ENV: &str = "VERSUS_BACK_CATALOG_PATH";

/// A single quiz question. Immutable and shared once the catalog is built.
#[derive(Debug, Clone)]
pub struct Question {
    /// Stable identifier used by clients when selecting and answering.
    pub id: u32,
    /// Category label the question is filed under.
    pub category: String,
    /// Prompt text shown to the answering player.
    pub prompt: String,
    /// Ordered answer options.
    pub options: Vec<String>,
    /// Index into `options` of the correct answer.
    pub correct_option: usize,
}

/// Fixed, in-memory set of quiz questions keyed by identifier.
///
/// Insertion order is preserved so clients always see the catalog in the same
/// order it was authored.
#[derive(Debug)]
pub struct QuestionCatalog {
    questions: IndexMap<u32, Question>,
}

/// Errors raised while validating a question set.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The question set contained no entries.
    #[error("question catalog must not be empty")]
    Empty,
    /// Two questions shared the same identifier.
    #[error("duplicate question id `{0}`")]
    DuplicateId(u32),
    /// A question declared fewer than two answer options.
    #[error("question `{0}` must offer at least two options")]
    TooFewOptions(u32),
    /// A question's correct option index pointed outside its options.
    #[error("question `{id}` declares correct option {index} but only {count} options")]
    CorrectOptionOutOfRange {
        /// Offending question identifier.
        id: u32,
        /// Declared correct option index.
        index: usize,
        /// Number of options the question actually offers.
        count: usize,
    },
}

impl QuestionCatalog {
    /// Load the catalog from disk, falling back to the built-in default set.
    ///
    /// A present-but-invalid file is rejected loudly rather than silently
    /// truncated, so a misconfigured deployment still boots with a playable
    /// catalog.
    pub fn load() -> Self {
        let path = resolve_catalog_path();
        match fs::read_to_string(&path) {
            Ok(contents) => match serde_json::from_str::<RawCatalog>(&contents) {
                Ok(raw) => match Self::from_questions(raw.into_questions()) {
                    Ok(catalog) => {
                        info!(
                            path = %path.display(),
                            count = catalog.len(),
                            "loaded question catalog"
                        );
                        catalog
                    }
                    Err(err) => {
                        warn!(
                            path = %path.display(),
                            error = %err,
                            "invalid question catalog; falling back to defaults"
                        );
                        Self::default()
                    }
                },
                Err(err) => {
                    warn!(
                        path = %path.display(),
                        error = %err,
                        "failed to parse question catalog; falling back to defaults"
                    );
                    Self::default()
                }
            },
            Err(err) if err.kind() == ErrorKind::NotFound => {
                info!(
                    path = %path.display(),
                    "question catalog not found; using built-in defaults"
                );
                Self::default()
            }
            Err(err) => {
                warn!(
                    path = %path.display(),
                    error = %err,
                    "failed to read question catalog; falling back to defaults"
                );
                Self::default()
            }
        }
    }

    /// Build a catalog from a list of questions, validating every entry.
    pub fn from_questions(questions: Vec<Question>) -> Result<Self, CatalogError> {
        if questions.is_empty() {
            return Err(CatalogError::Empty);
        }

        let mut map = IndexMap::with_capacity(questions.len());
        for question in questions {
            if question.options.len() < 2 {
                return Err(CatalogError::TooFewOptions(question.id));
            }
            if question.correct_option >= question.options.len() {
                return Err(CatalogError::CorrectOptionOutOfRange {
                    id: question.id,
                    index: question.correct_option,
                    count: question.options.len(),
                });
            }
            let id = question.id;
            if map.insert(id, question).is_some() {
                return Err(CatalogError::DuplicateId(id));
            }
        }

        Ok(Self { questions: map })
    }

    /// Look up a question by identifier.
    pub fn get(&self, id: u32) -> Option<&Question> {
        self.questions.get(&id)
    }

    /// Whether the catalog contains the given question identifier.
    pub fn contains(&self, id: u32) -> bool {
        self.questions.contains_key(&id)
    }

    /// Number of questions in the catalog.
    pub fn len(&self) -> usize {
        self.questions.len()
    }

    /// Whether the catalog is empty. Never true for a validated catalog.
    pub fn is_empty(&self) -> bool {
        self.questions.is_empty()
    }

    /// Iterate over the questions in authored order.
    pub fn iter(&self) -> impl Iterator<Item = &Question> {
        self.questions.values()
    }
}

impl Default for QuestionCatalog {
    fn default() -> Self {
        Self::from_questions(default_questions()).expect("built-in question set is valid")
    }
}

#[derive(Debug, Deserialize)]
/// JSON representation of the catalog file located at [`DEFAULT_CATALOG_PATH`].
struct RawCatalog {
    questions: Vec<RawQuestion>,
}

#[derive(Debug, Deserialize)]
/// JSON representation of a single question inside the catalog file.
struct RawQuestion {
    id: u32,
    category: String,
    prompt: String,
    options: Vec<String>,
    correct_option: usize,
}

impl RawCatalog {
    fn into_questions(self) -> Vec<Question> {
        self.questions
            .into_iter()
            .map(|raw| Question {
                id: raw.id,
                category: raw.category,
                prompt: raw.prompt,
                options: raw.options,
                correct_option: raw.correct_option,
            })
            .collect()
    }
}

/// Resolve the catalog path from the environment, defaulting to the baked-in location.
fn resolve_catalog_path() -> PathBuf {
    env::var(CATALOG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CATALOG_PATH))
}

/// Built-in question set used when no catalog file is present.
fn default_questions() -> Vec<Question> {
    let entries: [(u32, &str, &str, [&str; 4], usize); 10] = [
        (
            1,
            "Geography",
            "Which is the largest ocean on Earth?",
            ["Atlantic", "Indian", "Pacific", "Arctic"],
            2,
        ),
        (
            2,
            "Science",
            "What planet is known as the Red Planet?",
            ["Venus", "Mars", "Jupiter", "Mercury"],
            1,
        ),
        (
            3,
            "History",
            "In which year did the Berlin Wall fall?",
            ["1985", "1989", "1991", "1993"],
            1,
        ),
        (
            4,
            "Science",
            "What is the chemical symbol for gold?",
            ["Ag", "Go", "Au", "Gd"],
            2,
        ),
        (
            5,
            "Geography",
            "What is the capital of Australia?",
            ["Sydney", "Melbourne", "Canberra", "Perth"],
            2,
        ),
        (
            6,
            "Mathematics",
            "What is the value of 7 factorial?",
            ["720", "5040", "40320", "362880"],
            1,
        ),
        (
            7,
            "Technology",
            "Which data structure uses first-in first-out ordering?",
            ["Stack", "Queue", "Tree", "Graph"],
            1,
        ),
        (
            8,
            "History",
            "Who was the first person to walk on the Moon?",
            [
                "Buzz Aldrin",
                "Yuri Gagarin",
                "Neil Armstrong",
                "Michael Collins",
            ],
            2,
        ),
        (
            9,
            "Science",
            "What gas do plants primarily absorb for photosynthesis?",
            ["Oxygen", "Nitrogen", "Carbon dioxide", "Hydrogen"],
            2,
        ),
        (
            10,
            "Technology",
            "What does CPU stand for?",
            [
                "Central Processing Unit",
                "Computer Processing Unit",
                "Central Program Unit",
                "Core Processing Unit",
            ],
            0,
        ),
    ];

    entries
        .into_iter()
        .map(|(id, category, prompt, options, correct_option)| Question {
            id,
            category: category.to_string(),
            prompt: prompt.to_string(),
            options: options.iter().map(|option| option.to_string()).collect(),
            correct_option,
        })
        .collect()
}
