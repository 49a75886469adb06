//! Classification of backend errors.
//!
//! Backends report failures as free-form code/message pairs. The repair loop
//! only needs to know whether a failure is worth reformulating, and if a
//! missing object is named, which one.

use std::fmt;
use std::ops::Range;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use super::error::BackendError;

static TIMEOUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\btimed out\b|\btimeout\b|\binterrupted\b|operationinterrupted|canceling statement")
        .unwrap()
});

static CONNECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)unable to open database|could not connect|connection (refused|reset|closed|lost)|broken pipe|server closed",
    )
    .unwrap()
});

static TYPE_MISMATCH: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)datatype mismatch|type mismatch|cannot (be )?cast|could not convert|conversion (error|failed)|invalid input syntax for type|operator does not exist|no matching signature",
    )
    .unwrap()
});

static MISSING_OBJECT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)no such (table|column|function)|does not exist|not found|unknown column|invalid identifier|unrecognized name").unwrap()
});

static SYNTAX: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)syntax error|parse error|parser error|incomplete input|unterminated|unexpected token").unwrap()
});

/// Quoted identifiers and literals, which never decide the class.
static QUOTED: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#""[^"]*"|'[^']*'|`[^`]*`"#).unwrap());

/// Patterns that name the missing object, with the kind each names.
static OBJECT_NAME: LazyLock<Vec<(Regex, Option<ObjectKind>)>> = LazyLock::new(|| {
    vec![
        (
            Regex::new(r"(?i)no such (table|column|function): ([\w.]+)").unwrap(),
            None,
        ),
        (
            Regex::new(r#"(?i)(column|relation|table|function) "?([\w.]+)"? does not exist"#).unwrap(),
            None,
        ),
        (
            Regex::new(r#"(?i)referenced (column|table) "?([\w.]+)"? not found"#).unwrap(),
            None,
        ),
        (
            Regex::new(r#"(?i)(unknown column|invalid identifier) '?"?([\w.]+)"?'?"#).unwrap(),
            Some(ObjectKind::Column),
        ),
        (
            Regex::new(r"(?i)(unrecognized name): ([\w.]+)").unwrap(),
            Some(ObjectKind::Column),
        ),
    ]
});

/// Failure class of a backend error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureClass {
    Syntax,
    MissingObject,
    TypeMismatch,
    Timeout,
    Connection,
    Other,
}

impl FailureClass {
    /// Whether a reformulated statement could plausibly succeed.
    pub fn is_repairable(&self) -> bool {
        matches!(
            self,
            FailureClass::Syntax | FailureClass::MissingObject | FailureClass::TypeMismatch
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            FailureClass::Syntax => "syntax",
            FailureClass::MissingObject => "missing-object",
            FailureClass::TypeMismatch => "type-mismatch",
            FailureClass::Timeout => "timeout",
            FailureClass::Connection => "connection",
            FailureClass::Other => "other",
        }
    }
}

impl fmt::Display for FailureClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ObjectKind {
    Table,
    Column,
    Function,
}

/// An object named by an error message, possibly qualified (`t.col`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ObjectRef {
    pub kind: ObjectKind,
    pub name: String,
}

impl ObjectRef {
    /// Split a qualified name into (qualifier, name).
    pub fn parts(&self) -> (Option<&str>, &str) {
        match self.name.rsplit_once('.') {
            Some((q, n)) => (Some(q), n),
            None => (None, self.name.as_str()),
        }
    }
}

/// A backend error with its class attached.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedError {
    pub class: FailureClass,
    pub code: String,
    pub message: String,
    /// The missing object, for `MissingObject` and `TypeMismatch` errors
    /// whose message names one.
    pub object: Option<ObjectRef>,
}

/// Classify a backend error by its code and message.
///
/// Object names and quoted text are removed before matching, so a column
/// called `timeout` cannot turn a missing-column error into a timeout.
pub fn classify(error: &BackendError) -> ClassifiedError {
    let (named, message) = match named_object(&error.message) {
        Some((object, span)) => {
            let mut rest = error.message.clone();
            rest.replace_range(span, "");
            (Some(object), rest)
        }
        None => (None, error.message.clone()),
    };
    let text = format!("{} {}", error.code, QUOTED.replace_all(&message, ""));

    let class = if TIMEOUT.is_match(&text) {
        FailureClass::Timeout
    } else if CONNECTION.is_match(&text) {
        FailureClass::Connection
    } else if TYPE_MISMATCH.is_match(&text) {
        FailureClass::TypeMismatch
    } else if MISSING_OBJECT.is_match(&text) {
        FailureClass::MissingObject
    } else if SYNTAX.is_match(&text) {
        FailureClass::Syntax
    } else {
        FailureClass::Other
    };

    let object = match class {
        FailureClass::MissingObject | FailureClass::TypeMismatch => named,
        _ => None,
    };

    ClassifiedError {
        class,
        code: error.code.clone(),
        message: error.message.clone(),
        object,
    }
}

/// The object a message names, with the byte span of its name.
fn named_object(message: &str) -> Option<(ObjectRef, Range<usize>)> {
    OBJECT_NAME.iter().find_map(|(re, fixed)| {
        let caps = re.captures(message)?;
        let kind = fixed.or_else(|| {
            let word = caps.get(1)?.as_str().to_ascii_lowercase();
            Some(match word.as_str() {
                "column" => ObjectKind::Column,
                "function" => ObjectKind::Function,
                _ => ObjectKind::Table,
            })
        })?;
        let name = caps.get(2)?;
        Some((
            ObjectRef {
                kind,
                name: name.as_str().to_string(),
            },
            name.range(),
        ))
    })
}
