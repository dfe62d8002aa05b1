//! Schema validation.
//!
//! [`SchemaValidator`] is the port the validation middleware calls. Any
//! validator that turns a JSON input into a conformant JSON value (or a list
//! of [`ValidationIssue`]s) can be plugged in.
//!
//! [`Schema`] is the built-in implementation. Fields are required unless
//! marked [`Schema::optional`], unknown object keys are stripped from the
//! output, and every issue is collected rather than stopping at the first.
//! Issue codes use the familiar `invalid_type` / `too_small` / `too_big` /
//! `invalid_string` / `invalid_enum_value` vocabulary.
//!
//! # Example
//!
//! ```
//! use trellis_core::schema::Schema;
//! use serde_json::json;
//!
//! let login = Schema::object([
//!     ("email", Schema::string().email()),
//!     ("password", Schema::string()),
//!     ("channel", Schema::string()),
//! ]);
//!
//! let issues = login.check(&json!({ "email": "a@b.com", "channel": "web" })).unwrap_err();
//! assert_eq!(issues.len(), 1);
//! assert_eq!(issues[0].code, "invalid_type");
//! assert_eq!(issues[0].dotted_path(), "password");
//! ```

use crate::{BoxFuture, PathSegment, ValidationIssue};
use regex::Regex;
use serde_json::{Map, Number, Value};
use std::sync::OnceLock;

/// Validates and normalizes an input value.
pub trait SchemaValidator: Send + Sync + 'static {
    /// Returns the conformant value, or every issue found.
    fn parse<'a>(&'a self, input: &'a Value) -> BoxFuture<'a, Result<Value, Vec<ValidationIssue>>>;
}

impl SchemaValidator for Schema {
    fn parse<'a>(&'a self, input: &'a Value) -> BoxFuture<'a, Result<Value, Vec<ValidationIssue>>> {
        Box::pin(async move { self.check(input) })
    }
}

/// Format constraint on string values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StringFormat {
    /// An email address.
    Email,
    /// An absolute URL with a scheme.
    Url,
    /// An RFC 3339 timestamp.
    DateTime,
}

impl StringFormat {
    const fn name(self) -> &'static str {
        match self {
            Self::Email => "email",
            Self::Url => "url",
            Self::DateTime => "datetime",
        }
    }

    fn matches(self, value: &str) -> bool {
        match self {
            Self::Email => is_email(value),
            Self::Url => is_url(value),
            Self::DateTime => chrono::DateTime::parse_from_rfc3339(value).is_ok(),
        }
    }
}

const EMAIL_PATTERN: &str = r"^[A-Za-z0-9._%+'-]+@[A-Za-z0-9-]+(\.[A-Za-z0-9-]+)*\.[A-Za-z]{2,}$";
const URL_PATTERN: &str = r"^[A-Za-z][A-Za-z0-9+.-]*://[^\s/?#]+[^\s]*$";

/// Matches `value` against a lazily compiled pattern.
///
/// A pattern that fails to compile matches nothing.
fn pattern_matches(cell: &'static OnceLock<Option<Regex>>, pattern: &str, value: &str) -> bool {
    cell.get_or_init(|| Regex::new(pattern).ok())
        .as_ref()
        .is_some_and(|regex| regex.is_match(value))
}

fn is_email(value: &str) -> bool {
    static EMAIL: OnceLock<Option<Regex>> = OnceLock::new();
    pattern_matches(&EMAIL, EMAIL_PATTERN, value)
}

fn is_url(value: &str) -> bool {
    static URL: OnceLock<Option<Regex>> = OnceLock::new();
    pattern_matches(&URL, URL_PATTERN, value)
}

#[derive(Debug, Clone)]
enum Kind {
    String {
        min_length: Option<usize>,
        max_length: Option<usize>,
        format: Option<StringFormat>,
    },
    Number {
        integer: bool,
        minimum: Option<f64>,
        maximum: Option<f64>,
    },
    Boolean,
    Array {
        items: Box<Schema>,
        min_items: Option<usize>,
        max_items: Option<usize>,
    },
    Object {
        properties: Vec<(String, Schema)>,
    },
    Enum(Vec<String>),
    Any,
}

/// A JSON schema built from combinators.
#[derive(Debug, Clone)]
pub struct Schema {
    kind: Kind,
    optional: bool,
    coerce: bool,
}

impl Schema {
    const fn of(kind: Kind) -> Self {
        Self {
            kind,
            optional: false,
            coerce: false,
        }
    }

    /// A string.
    #[must_use]
    pub const fn string() -> Self {
        Self::of(Kind::String {
            min_length: None,
            max_length: None,
            format: None,
        })
    }

    /// Any finite number.
    #[must_use]
    pub const fn number() -> Self {
        Self::of(Kind::Number {
            integer: false,
            minimum: None,
            maximum: None,
        })
    }

    /// A whole number.
    #[must_use]
    pub const fn integer() -> Self {
        Self::of(Kind::Number {
            integer: true,
            minimum: None,
            maximum: None,
        })
    }

    /// A boolean.
    #[must_use]
    pub const fn boolean() -> Self {
        Self::of(Kind::Boolean)
    }

    /// An array whose elements match `items`.
    #[must_use]
    pub fn array(items: Schema) -> Self {
        Self::of(Kind::Array {
            items: Box::new(items),
            min_items: None,
            max_items: None,
        })
    }

    /// An object with the given properties, in declaration order.
    #[must_use]
    pub fn object<I, K>(properties: I) -> Self
    where
        I: IntoIterator<Item = (K, Schema)>,
        K: Into<String>,
    {
        Self::of(Kind::Object {
            properties: properties
                .into_iter()
                .map(|(name, schema)| (name.into(), schema))
                .collect(),
        })
    }

    /// One of a fixed set of strings.
    #[must_use]
    pub fn enumeration<I, S>(values: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::of(Kind::Enum(values.into_iter().map(Into::into).collect()))
    }

    /// Accepts any present value.
    #[must_use]
    pub const fn any() -> Self {
        Self::of(Kind::Any)
    }

    /// Allows the field to be absent.
    #[must_use]
    pub const fn optional(mut self) -> Self {
        self.optional = true;
        self
    }

    /// Accepts string input for numbers and booleans (query parameters).
    #[must_use]
    pub const fn coerce(mut self) -> Self {
        self.coerce = true;
        self
    }

    /// Minimum string length.
    #[must_use]
    pub fn min_length(mut self, len: usize) -> Self {
        if let Kind::String { min_length, .. } = &mut self.kind {
            *min_length = Some(len);
        }
        self
    }

    /// Maximum string length.
    #[must_use]
    pub fn max_length(mut self, len: usize) -> Self {
        if let Kind::String { max_length, .. } = &mut self.kind {
            *max_length = Some(len);
        }
        self
    }

    /// Requires an email address.
    #[must_use]
    pub fn email(self) -> Self {
        self.format(StringFormat::Email)
    }

    /// Requires an absolute URL.
    #[must_use]
    pub fn url(self) -> Self {
        self.format(StringFormat::Url)
    }

    /// Requires an RFC 3339 timestamp.
    #[must_use]
    pub fn datetime(self) -> Self {
        self.format(StringFormat::DateTime)
    }

    fn format(mut self, required: StringFormat) -> Self {
        if let Kind::String { format, .. } = &mut self.kind {
            *format = Some(required);
        }
        self
    }

    /// Inclusive lower bound for numbers.
    #[must_use]
    pub fn min(mut self, bound: f64) -> Self {
        if let Kind::Number { minimum, .. } = &mut self.kind {
            *minimum = Some(bound);
        }
        self
    }

    /// Inclusive upper bound for numbers.
    #[must_use]
    pub fn max(mut self, bound: f64) -> Self {
        if let Kind::Number { maximum, .. } = &mut self.kind {
            *maximum = Some(bound);
        }
        self
    }

    /// Minimum number of array items.
    #[must_use]
    pub fn min_items(mut self, count: usize) -> Self {
        if let Kind::Array { min_items, .. } = &mut self.kind {
            *min_items = Some(count);
        }
        self
    }

    /// Maximum number of array items.
    #[must_use]
    pub fn max_items(mut self, count: usize) -> Self {
        if let Kind::Array { max_items, .. } = &mut self.kind {
            *max_items = Some(count);
        }
        self
    }

    /// Returns `true` if the field may be absent.
    #[must_use]
    pub const fn is_optional(&self) -> bool {
        self.optional
    }

    /// Validates `input` synchronously.
    ///
    /// Returns the normalized value (unknown keys stripped, coerced scalars
    /// converted) or every issue found.
    pub fn check(&self, input: &Value) -> Result<Value, Vec<ValidationIssue>> {
        let mut issues = Vec::new();
        let mut path = Vec::new();
        let output = self.walk(Some(input), &mut path, &mut issues);
        if issues.is_empty() {
            Ok(output.unwrap_or(Value::Null))
        } else {
            Err(issues)
        }
    }

    fn walk(
        &self,
        value: Option<&Value>,
        path: &mut Vec<PathSegment>,
        issues: &mut Vec<ValidationIssue>,
    ) -> Option<Value> {
        let Some(value) = value else {
            if !self.optional {
                issues.push(ValidationIssue::new(path.clone(), "invalid_type", "Required"));
            }
            return None;
        };

        match &self.kind {
            Kind::Any => Some(value.clone()),
            Kind::Boolean => self.walk_boolean(value, path, issues),
            Kind::String {
                min_length,
                max_length,
                format,
            } => {
                let Some(s) = value.as_str() else {
                    issues.push(type_issue(path, "string", value));
                    return None;
                };
                let length = s.chars().count();
                if let Some(min) = min_length.filter(|min| length < *min) {
                    issues.push(ValidationIssue::new(
                        path.clone(),
                        "too_small",
                        format!("String must contain at least {min} character(s)"),
                    ));
                }
                if let Some(max) = max_length.filter(|max| length > *max) {
                    issues.push(ValidationIssue::new(
                        path.clone(),
                        "too_big",
                        format!("String must contain at most {max} character(s)"),
                    ));
                }
                if let Some(format) = format.filter(|f| !f.matches(s)) {
                    issues.push(ValidationIssue::new(
                        path.clone(),
                        "invalid_string",
                        format!("Invalid {}", format.name()),
                    ));
                }
                Some(value.clone())
            }
            Kind::Number {
                integer,
                minimum,
                maximum,
            } => self.walk_number(value, *integer, *minimum, *maximum, path, issues),
            Kind::Enum(options) => {
                let Some(s) = value.as_str() else {
                    issues.push(type_issue(path, "string", value));
                    return None;
                };
                if !options.iter().any(|o| o == s) {
                    let expected = options
                        .iter()
                        .map(|o| format!("'{o}'"))
                        .collect::<Vec<_>>()
                        .join(" | ");
                    issues.push(ValidationIssue::new(
                        path.clone(),
                        "invalid_enum_value",
                        format!("Invalid enum value. Expected {expected}, received '{s}'"),
                    ));
                }
                Some(value.clone())
            }
            Kind::Array {
                items,
                min_items,
                max_items,
            } => {
                let Some(elements) = value.as_array() else {
                    issues.push(type_issue(path, "array", value));
                    return None;
                };
                if let Some(min) = min_items.filter(|min| elements.len() < *min) {
                    issues.push(ValidationIssue::new(
                        path.clone(),
                        "too_small",
                        format!("Array must contain at least {min} element(s)"),
                    ));
                }
                if let Some(max) = max_items.filter(|max| elements.len() > *max) {
                    issues.push(ValidationIssue::new(
                        path.clone(),
                        "too_big",
                        format!("Array must contain at most {max} element(s)"),
                    ));
                }
                let mut output = Vec::with_capacity(elements.len());
                for (idx, element) in elements.iter().enumerate() {
                    path.push(PathSegment::Index(idx));
                    if let Some(item) = items.walk(Some(element), path, issues) {
                        output.push(item);
                    }
                    path.pop();
                }
                Some(Value::Array(output))
            }
            Kind::Object { properties } => {
                let Some(object) = value.as_object() else {
                    issues.push(type_issue(path, "object", value));
                    return None;
                };
                let mut output = Map::new();
                for (name, schema) in properties {
                    path.push(PathSegment::Key(name.clone()));
                    if let Some(field) = schema.walk(object.get(name), path, issues) {
                        output.insert(name.clone(), field);
                    }
                    path.pop();
                }
                Some(Value::Object(output))
            }
        }
    }

    fn walk_boolean(
        &self,
        value: &Value,
        path: &[PathSegment],
        issues: &mut Vec<ValidationIssue>,
    ) -> Option<Value> {
        match value {
            Value::Bool(_) => Some(value.clone()),
            Value::String(s) if self.coerce => match s.as_str() {
                "true" => Some(Value::Bool(true)),
                "false" => Some(Value::Bool(false)),
                _ => {
                    issues.push(type_issue(path, "boolean", value));
                    None
                }
            },
            _ => {
                issues.push(type_issue(path, "boolean", value));
                None
            }
        }
    }

    fn walk_number(
        &self,
        value: &Value,
        integer: bool,
        minimum: Option<f64>,
        maximum: Option<f64>,
        path: &[PathSegment],
        issues: &mut Vec<ValidationIssue>,
    ) -> Option<Value> {
        let number = match value {
            Value::Number(n) => n.as_f64(),
            Value::String(s) if self.coerce => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            _ => None,
        };
        let Some(number) = number else {
            issues.push(type_issue(path, "number", value));
            return None;
        };

        if integer && number.fract() != 0.0 {
            issues.push(ValidationIssue::new(
                path.to_vec(),
                "invalid_type",
                "Expected integer, received float",
            ));
            return None;
        }
        if let Some(min) = minimum.filter(|min| number < *min) {
            issues.push(ValidationIssue::new(
                path.to_vec(),
                "too_small",
                format!("Number must be greater than or equal to {min}"),
            ));
        }
        if let Some(max) = maximum.filter(|max| number > *max) {
            issues.push(ValidationIssue::new(
                path.to_vec(),
                "too_big",
                format!("Number must be less than or equal to {max}"),
            ));
        }

        if value.is_number() {
            return Some(value.clone());
        }
        // Coerced from a string.
        if integer {
            #[allow(clippy::cast_possible_truncation)]
            let whole = number as i64;
            Some(Value::Number(Number::from(whole)))
        } else {
            Number::from_f64(number).map(Value::Number)
        }
    }
}

fn type_issue(path: &[PathSegment], expected: &str, received: &Value) -> ValidationIssue {
    ValidationIssue::new(
        path.to_vec(),
        "invalid_type",
        format!("Expected {expected}, received {}", type_name(received)),
    )
}

const fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
