//! Question bank decoding and validation
//!
//! A question bank is supplied from outside the crate as JSON. It is
//! checked against a fixed structural contract: a non-empty title, the
//! exact value ladder from [`crate::constants::board::REQUIRED_VALUES`],
//! exactly [`crate::constants::board::CATEGORY_COUNT`] categories, and one
//! question per value in every category. Validation stops at the first
//! violated rule and never hands out a partially valid [`GameData`].

use std::{
    collections::HashSet,
    path::{Path, PathBuf},
};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::constants::board::{CATEGORY_COUNT, REQUIRED_VALUES};

/// Identifier of a question, unique across the whole bank
#[derive(
    Debug,
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    derive_more::Display,
    derive_more::From,
)]
#[serde(transparent)]
pub struct QuestionId(String);

impl From<&str> for QuestionId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

impl QuestionId {
    /// Returns the id as a string slice
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// A single question of the bank
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Question {
    /// Identifier, unique across all categories
    pub id: QuestionId,
    /// Point value, one of the required values
    pub value: u32,
    /// Question text shown when the cell is opened
    pub question: String,
    /// Answer text revealed by the host
    pub answer: String,
}

/// A column of the board
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Category {
    /// Identifier, unique across the bank
    pub id: String,
    /// Display name
    pub name: String,
    /// One question per required value
    pub questions: Vec<Question>,
}

impl Category {
    /// Returns the question worth `value`, if any
    pub fn question_with_value(&self, value: u32) -> Option<&Question> {
        self.questions.iter().find(|question| question.value == value)
    }
}

/// A validated question bank
///
/// Values of this type can only be produced by [`validate`], [`parse`] or
/// [`load_from_path`], so every instance satisfies the bank contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GameData {
    title: String,
    values: Vec<u32>,
    categories: Vec<Category>,
}

/// A question located in the bank together with its category name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuestionView {
    /// Identifier of the question
    pub id: QuestionId,
    /// Point value awarded for a correct answer
    pub value: u32,
    /// Question text
    pub question: String,
    /// Answer text
    pub answer: String,
    /// Name of the category the question belongs to
    pub category_name: String,
}

impl GameData {
    /// The title of the bank
    pub fn title(&self) -> &str {
        &self.title
    }

    /// The value ladder, always equal to [`REQUIRED_VALUES`]
    pub fn values(&self) -> &[u32] {
        &self.values
    }

    /// The categories in bank order
    pub fn categories(&self) -> &[Category] {
        &self.categories
    }

    /// Finds a question by id across all categories
    ///
    /// The first category holding the id wins. The category name is
    /// attached for display.
    pub fn find_question(&self, id: &QuestionId) -> Option<QuestionView> {
        self.categories.iter().find_map(|category| {
            category
                .questions
                .iter()
                .find(|question| &question.id == id)
                .map(|question| QuestionView {
                    id: question.id.clone(),
                    value: question.value,
                    question: question.question.clone(),
                    answer: question.answer.clone(),
                    category_name: category.name.clone(),
                })
        })
    }
}

/// A violated rule of the question bank contract
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// The document root is not an object
    #[error("question bank must be a JSON object")]
    NotAnObject,
    /// The title is missing or blank
    #[error("field `title` must be a non-empty string")]
    MissingTitle,
    /// `values` is not an array
    #[error("field `values` must be an array")]
    ValuesNotArray,
    /// `values` has the wrong number of entries
    #[error("field `values` must contain {} values, found {found}", REQUIRED_VALUES.len())]
    ValuesLength {
        /// Number of entries present
        found: usize,
    },
    /// An entry of `values` differs from the required ladder
    #[error("expected value {expected} at values[{index}]")]
    UnexpectedValue {
        /// Position in the array
        index: usize,
        /// Value required at that position
        expected: u32,
    },
    /// `categories` is not an array
    #[error("field `categories` must be an array")]
    CategoriesNotArray,
    /// `categories` has the wrong number of entries
    #[error("there must be exactly {} categories, found {found}", CATEGORY_COUNT)]
    CategoryCount {
        /// Number of categories present
        found: usize,
    },
    /// A category entry is not an object
    #[error("found a category that is not an object")]
    InvalidCategory,
    /// A category has no usable id
    #[error("every category must have a non-empty id")]
    MissingCategoryId,
    /// Two categories share an id
    #[error("duplicate category id: {0}")]
    DuplicateCategoryId(String),
    /// A category has no usable name
    #[error("category {category} has no name")]
    MissingCategoryName {
        /// Category id
        category: String,
    },
    /// A category's `questions` is not an array
    #[error("category {category} has no questions array")]
    QuestionsNotArray {
        /// Category id
        category: String,
    },
    /// A category has the wrong number of questions
    #[error("category {category} must have exactly {expected} questions, found {found}")]
    QuestionCount {
        /// Category id
        category: String,
        /// Required number of questions
        expected: usize,
        /// Number of questions present
        found: usize,
    },
    /// A question entry is not an object
    #[error("category {category} contains a malformed question")]
    InvalidQuestion {
        /// Category id
        category: String,
    },
    /// A question has no usable id
    #[error("a question in category {category} has no id")]
    MissingQuestionId {
        /// Category id
        category: String,
    },
    /// Two questions share an id
    #[error("duplicate question id: {0}")]
    DuplicateQuestionId(String),
    /// A question's value is not one of the required values
    #[error("question {question} has an invalid value: {value}")]
    InvalidQuestionValue {
        /// Question id
        question: String,
        /// The offending value as written in the document
        value: String,
    },
    /// A question has no question text
    #[error("question {question} has no question text")]
    MissingQuestionText {
        /// Question id
        question: String,
    },
    /// A question has no answer text
    #[error("question {question} has no answer text")]
    MissingAnswerText {
        /// Question id
        question: String,
    },
    /// Two questions of a category share a value
    #[error("category {category} has several questions worth {value}")]
    DuplicateValue {
        /// Category id
        category: String,
        /// The repeated value
        value: u32,
    },
    /// A category lacks a question for a required value
    #[error("category {category} has no question worth {value}")]
    MissingValue {
        /// Category id
        category: String,
        /// The uncovered value
        value: u32,
    },
}

/// Errors produced while loading a question bank from its source
#[derive(Error, Debug)]
pub enum LoadError {
    /// The source could not be read
    #[error("could not read {}: {source}", path.display())]
    Io {
        /// Location of the bank
        path: PathBuf,
        /// Underlying error
        source: std::io::Error,
    },
    /// The source is not JSON
    #[error("question bank contains invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// The source is JSON but breaks the bank contract
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value
        .and_then(Value::as_str)
        .filter(|text| !text.trim().is_empty())
}

/// Reads a non-negative integer, accepting integral floats such as `1.0`
pub(crate) fn as_integer(value: &Value) -> Option<u64> {
    value.as_u64().or_else(|| {
        value
            .as_f64()
            .filter(|number| number.fract() == 0.0 && *number >= 0.0)
            .map(|number| number as u64)
    })
}

fn validate_values(values: Option<&Value>) -> Result<Vec<u32>, ValidationError> {
    let values = values
        .and_then(Value::as_array)
        .ok_or(ValidationError::ValuesNotArray)?;

    if values.len() != REQUIRED_VALUES.len() {
        return Err(ValidationError::ValuesLength {
            found: values.len(),
        });
    }

    for (index, (value, expected)) in values.iter().zip(REQUIRED_VALUES).enumerate() {
        if as_integer(value) != Some(u64::from(expected)) {
            return Err(ValidationError::UnexpectedValue { index, expected });
        }
    }

    Ok(REQUIRED_VALUES.to_vec())
}

fn validate_question(
    raw: &Value,
    category: &str,
    values: &[u32],
    question_ids: &mut HashSet<String>,
) -> Result<Question, ValidationError> {
    let object = raw
        .as_object()
        .ok_or_else(|| ValidationError::InvalidQuestion {
            category: category.to_owned(),
        })?;

    let id = non_empty_str(object.get("id")).ok_or_else(|| ValidationError::MissingQuestionId {
        category: category.to_owned(),
    })?;
    if !question_ids.insert(id.to_owned()) {
        return Err(ValidationError::DuplicateQuestionId(id.to_owned()));
    }

    let value = object
        .get("value")
        .and_then(as_integer)
        .and_then(|value| u32::try_from(value).ok())
        .filter(|value| values.contains(value))
        .ok_or_else(|| ValidationError::InvalidQuestionValue {
            question: id.to_owned(),
            value: object.get("value").unwrap_or(&Value::Null).to_string(),
        })?;

    let question =
        non_empty_str(object.get("question")).ok_or_else(|| ValidationError::MissingQuestionText {
            question: id.to_owned(),
        })?;
    let answer =
        non_empty_str(object.get("answer")).ok_or_else(|| ValidationError::MissingAnswerText {
            question: id.to_owned(),
        })?;

    Ok(Question {
        id: id.into(),
        value,
        question: question.to_owned(),
        answer: answer.to_owned(),
    })
}

fn validate_category(
    raw: &Value,
    values: &[u32],
    category_ids: &mut HashSet<String>,
    question_ids: &mut HashSet<String>,
) -> Result<Category, ValidationError> {
    let object: &Map<String, Value> = raw.as_object().ok_or(ValidationError::InvalidCategory)?;

    let id = non_empty_str(object.get("id")).ok_or(ValidationError::MissingCategoryId)?;
    if !category_ids.insert(id.to_owned()) {
        return Err(ValidationError::DuplicateCategoryId(id.to_owned()));
    }

    let name =
        non_empty_str(object.get("name")).ok_or_else(|| ValidationError::MissingCategoryName {
            category: id.to_owned(),
        })?;

    let raw_questions = object
        .get("questions")
        .and_then(Value::as_array)
        .ok_or_else(|| ValidationError::QuestionsNotArray {
            category: id.to_owned(),
        })?;
    if raw_questions.len() != values.len() {
        return Err(ValidationError::QuestionCount {
            category: id.to_owned(),
            expected: values.len(),
            found: raw_questions.len(),
        });
    }

    let mut covered = HashSet::new();
    let mut questions = Vec::with_capacity(raw_questions.len());
    for raw_question in raw_questions {
        let question = validate_question(raw_question, id, values, question_ids)?;
        if !covered.insert(question.value) {
            return Err(ValidationError::DuplicateValue {
                category: id.to_owned(),
                value: question.value,
            });
        }
        questions.push(question);
    }

    if let Some(value) = values.iter().find(|value| !covered.contains(*value)) {
        return Err(ValidationError::MissingValue {
            category: id.to_owned(),
            value: *value,
        });
    }

    Ok(Category {
        id: id.to_owned(),
        name: name.to_owned(),
        questions,
    })
}

/// Validates an untyped document against the question bank contract
///
/// Rules are checked in document order and the first violation is
/// returned.
///
/// # Errors
///
/// Returns the [`ValidationError`] describing the first violated rule.
pub fn validate(raw: &Value) -> Result<GameData, ValidationError> {
    let object = raw.as_object().ok_or(ValidationError::NotAnObject)?;
    let title = non_empty_str(object.get("title")).ok_or(ValidationError::MissingTitle)?;
    let values = validate_values(object.get("values"))?;

    let raw_categories = object
        .get("categories")
        .and_then(Value::as_array)
        .ok_or(ValidationError::CategoriesNotArray)?;
    if raw_categories.len() != CATEGORY_COUNT {
        return Err(ValidationError::CategoryCount {
            found: raw_categories.len(),
        });
    }

    let mut category_ids = HashSet::new();
    let mut question_ids = HashSet::new();
    let categories = raw_categories
        .iter()
        .map(|raw_category| {
            validate_category(raw_category, &values, &mut category_ids, &mut question_ids)
        })
        .collect::<Result<Vec<_>, _>>()?;

    Ok(GameData {
        title: title.to_owned(),
        values,
        categories,
    })
}

/// Parses and validates a question bank from JSON text
///
/// # Errors
///
/// Returns [`LoadError::Json`] for malformed JSON and
/// [`LoadError::Validation`] when the contract is broken.
pub fn parse(text: &str) -> Result<GameData, LoadError> {
    let raw: Value = serde_json::from_str(text)?;
    Ok(validate(&raw)?)
}

/// Reads, parses and validates a question bank file
///
/// # Errors
///
/// Returns [`LoadError::Io`] if the file cannot be read, otherwise the
/// errors of [`parse`].
pub fn load_from_path(path: impl AsRef<Path>) -> Result<GameData, LoadError> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let data = parse(&text)?;
    tracing::info!(
        "Loaded question bank {:?} from {}",
        data.title,
        path.display()
    );
    Ok(data)
}
