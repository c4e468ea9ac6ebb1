use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value;
use thiserror::Error;

/// A single failed check on a procedure input.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Issue {
    /// Field path from the input root, e.g. `["items", "0", "name"]`. Empty for
    /// failures on the input as a whole.
    pub path: Vec<String>,
    pub message: String,
}

impl Issue {
    pub fn new(path: &[&str], message: impl Into<String>) -> Self {
        Self {
            path: path.iter().map(|s| s.to_string()).collect(),
            message: message.into(),
        }
    }

    fn path_display(&self) -> String {
        let mut out = String::new();
        for segment in &self.path {
            if segment.parse::<usize>().is_ok() {
                out.push_str(&format!("[{}]", segment));
            } else {
                if !out.is_empty() {
                    out.push('.');
                }
                out.push_str(segment);
            }
        }
        out
    }
}

/// ValidationError
///
/// Structured input-validation failure. `Display` yields the raw issue list as
/// JSON (what the client sees as `error.message`); [`ValidationError::readable`]
/// yields the sentence placed in `data.zodError`.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub struct ValidationError {
    issues: Vec<Issue>,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let raw = serde_json::to_string_pretty(&self.issues).map_err(|_| std::fmt::Error)?;
        f.write_str(&raw)
    }
}

impl ValidationError {
    pub fn new(issues: Vec<Issue>) -> Self {
        Self { issues }
    }

    pub fn single(path: &[&str], message: impl Into<String>) -> Self {
        Self::new(vec![Issue::new(path, message)])
    }

    pub fn issues(&self) -> &[Issue] {
        &self.issues
    }

    /// `Validation error: Required at "name"; Too long at "tags[2]"`
    pub fn readable(&self) -> String {
        let details = self
            .issues
            .iter()
            .map(|issue| {
                let path = issue.path_display();
                if path.is_empty() {
                    issue.message.clone()
                } else {
                    format!("{} at \"{}\"", issue.message, path)
                }
            })
            .collect::<Vec<_>>()
            .join("; ");

        if details.is_empty() {
            "Validation error".to_string()
        } else {
            format!("Validation error: {}", details)
        }
    }
}

/// Validate
///
/// Semantic checks run after an input deserialized successfully. The default
/// accepts everything, so plain data inputs only need an empty impl.
pub trait Validate {
    fn validate(&self) -> Result<(), ValidationError> {
        Ok(())
    }
}

macro_rules! accept_any {
    ($($ty:ty),* $(,)?) => {
        $(impl Validate for $ty {})*
    };
}

accept_any!((), Value, String, bool, i32, i64, u32, u64, f64, uuid::Uuid);

impl<T: Validate> Validate for Vec<T> {
    fn validate(&self) -> Result<(), ValidationError> {
        self.iter().try_for_each(Validate::validate)
    }
}

impl<T: Validate> Validate for Option<T> {
    fn validate(&self) -> Result<(), ValidationError> {
        match self {
            Some(inner) => inner.validate(),
            None => Ok(()),
        }
    }
}

/// parse_input
///
/// Turns the raw (already transformer-decoded) input into the procedure's
/// input type. Shape errors from serde and semantic errors from [`Validate`]
/// both come back as a [`ValidationError`].
pub fn parse_input<I>(raw: Value) -> Result<I, ValidationError>
where
    I: DeserializeOwned + Validate,
{
    let input: I =
        serde_json::from_value(raw).map_err(|e| ValidationError::single(&[], e.to_string()))?;
    input.validate()?;
    Ok(input)
}
