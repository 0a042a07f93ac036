//! Validation module for collection and field names
//!
//! Checks table labels and column names against the document-store naming rules
//! (MongoDB-compatible). Only an empty name is rejected outright; the other rules
//! are advisory unless the Strict level is requested.

/// Maximum length for names
pub const MAX_NAME_LENGTH: usize = 64;

/// Prefix reserved for internal collections
pub const RESERVED_COLLECTION_PREFIX: &str = "system.";

/// What kind of name is being validated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NameKind {
    /// Label of a top-level or nested table
    Collection,
    /// Name of a column (document field)
    Field,
}

/// Validation error types
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// Name is empty
    Empty,
    /// Name is too long
    TooLong { max: usize, actual: usize },
    /// Name contains characters the document store rejects
    InvalidCharacters { invalid: Vec<char> },
    /// Collection name uses the reserved `system.` prefix
    ReservedPrefix,
    /// Field name starts with `$` (operator syntax)
    StartsWithDollar,
    /// Field name contains a `.` (path syntax)
    ContainsDot,
    /// Name contains whitespace
    ContainsWhitespace,
    /// Name has leading or trailing whitespace
    UntrimmedWhitespace,
}

impl std::fmt::Display for ValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ValidationError::Empty => write!(f, "Name cannot be empty"),
            ValidationError::TooLong { max, actual } => {
                write!(f, "Name is too long ({} chars, max {})", actual, max)
            }
            ValidationError::InvalidCharacters { invalid } => {
                let chars: String = invalid.iter().collect();
                write!(f, "Name contains invalid characters: '{}'", chars.escape_debug())
            }
            ValidationError::ReservedPrefix => write!(
                f,
                "Collection names cannot start with '{}'",
                RESERVED_COLLECTION_PREFIX
            ),
            ValidationError::StartsWithDollar => {
                write!(f, "Field names cannot start with '$'")
            }
            ValidationError::ContainsDot => write!(f, "Field names cannot contain '.'"),
            ValidationError::ContainsWhitespace => write!(f, "Name should not contain spaces"),
            ValidationError::UntrimmedWhitespace => {
                write!(f, "Name should not start or end with whitespace")
            }
        }
    }
}

impl std::error::Error for ValidationError {}

/// Validation strictness level
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum ValidationLevel {
    /// Only empty names fail; naming rules are reported as warnings
    #[default]
    Standard,
    /// Every naming rule is reported as an error
    Strict,
}

/// Validation result containing errors and warnings
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    /// Critical errors that must be fixed
    pub errors: Vec<ValidationError>,
    /// Warnings that are recommended to fix
    pub warnings: Vec<ValidationError>,
}

impl ValidationResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn has_warnings(&self) -> bool {
        !self.warnings.is_empty()
    }

    fn report(&mut self, error: ValidationError, level: ValidationLevel) {
        match level {
            ValidationLevel::Standard => self.warnings.push(error),
            ValidationLevel::Strict => self.errors.push(error),
        }
    }

    /// Convert to Result, returning first error if any
    pub fn to_result(&self) -> Result<(), ValidationError> {
        match self.errors.first() {
            Some(error) => Err(error.clone()),
            None => Ok(()),
        }
    }
}

/// Validates a collection or field name
pub fn validate(name: &str, kind: NameKind, level: ValidationLevel) -> ValidationResult {
    let mut result = ValidationResult::new();

    let trimmed = name.trim();
    if trimmed.is_empty() {
        result.errors.push(ValidationError::Empty);
        return result;
    }

    let length = name.chars().count();
    if length > MAX_NAME_LENGTH {
        let error = ValidationError::TooLong {
            max: MAX_NAME_LENGTH,
            actual: length,
        };
        result.report(error, level);
    }

    let invalid: Vec<char> = name
        .chars()
        .filter(|c| is_invalid_char(*c, kind))
        .collect();
    if !invalid.is_empty() {
        result.report(ValidationError::InvalidCharacters { invalid }, level);
    }

    match kind {
        NameKind::Collection => {
            if trimmed.starts_with(RESERVED_COLLECTION_PREFIX) {
                result.report(ValidationError::ReservedPrefix, level);
            }
        }
        NameKind::Field => {
            if trimmed.starts_with('$') {
                result.report(ValidationError::StartsWithDollar, level);
            }
            if trimmed.contains('.') {
                result.report(ValidationError::ContainsDot, level);
            }
        }
    }

    if trimmed.len() != name.len() {
        result.report(ValidationError::UntrimmedWhitespace, level);
    } else if trimmed.contains(' ') {
        result.report(ValidationError::ContainsWhitespace, level);
    }

    result
}

fn is_invalid_char(c: char, kind: NameKind) -> bool {
    c == '\0' || (c != ' ' && c.is_control()) || (kind == NameKind::Collection && c == '$')
}

/// Validate a table label with the Standard level
pub fn validate_table_label(label: &str) -> ValidationResult {
    validate(label, NameKind::Collection, ValidationLevel::Standard)
}

/// Validate a column name with the Standard level
pub fn validate_column_name(name: &str) -> ValidationResult {
    validate(name, NameKind::Field, ValidationLevel::Standard)
}
