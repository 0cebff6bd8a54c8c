//! Purpose: Declarative field descriptors with validation and wire/native coercion.
//! Exports: `Field`, `FieldKind`, `FieldValue`, `Choice`.
//! Role: Shared per-model schema entries; per-instance values live in `Model`, never here.
//! Invariants: `validate` runs before `to_python` on every assignment; errors carry the field name.
//! Invariants: `to_python(to_native(x)) == x` for in-domain values (datetimes at microsecond precision).
//! Invariants: Datetimes serialize as UTC ISO-8601 with a `Z` suffix instead of `+00:00`.
use crate::core::error::{ApiResult, Error, ErrorKind};
use regex::Regex;
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::LazyLock;
use time::macros::format_description;
use time::{Date, Month, OffsetDateTime, PrimitiveDateTime, Time, UtcOffset};

static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[-a-zA-Z0-9_]+$").expect("slug regex"));
static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[a-zA-Z0-9_.+-]+@[a-zA-Z0-9-]+\.[a-zA-Z0-9.-]+$").expect("email regex")
});
static DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(?P<year>\d{4})-(?P<month>\d{1,2})-(?P<day>\d{1,2})$").expect("date regex")
});
static DATETIME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?P<year>\d{4})-(?P<month>\d{1,2})-(?P<day>\d{1,2})T(?P<hour>\d{1,2}):(?P<minute>\d{1,2}):(?P<second>\d{1,2})(?:\.(?P<fraction>\d{1,6}))?$",
    )
    .expect("datetime regex")
});

const REQUIRED: &str = "This field is required.";
const READ_ONLY: &str = "Field is read only.";
const INVALID: &str = "Invalid value.";

/// One allowed value of a choice field, as reported by the server.
#[derive(Clone, Debug, PartialEq)]
pub struct Choice {
    pub display_name: String,
    pub value: Value,
}

impl Choice {
    pub fn new(display_name: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            display_name: display_name.into(),
            value: value.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub enum FieldKind {
    /// Opaque JSON, stored untouched.
    Field,
    String,
    Integer,
    Float,
    Boolean,
    Slug,
    Email,
    Choice(Vec<Choice>),
    Date,
    DateTime,
    /// Named hyperlinks to related resources.
    Links,
}

impl FieldKind {
    /// Map a schema type name onto a kind; unknown names become opaque fields.
    pub fn from_type_name(name: &str, choices: Vec<Choice>) -> Self {
        match name {
            "string" | "text" => FieldKind::String,
            "integer" => FieldKind::Integer,
            "float" => FieldKind::Float,
            "boolean" => FieldKind::Boolean,
            "slug" => FieldKind::Slug,
            "email" => FieldKind::Email,
            "choice" => FieldKind::Choice(choices),
            "date" => FieldKind::Date,
            "datetime" => FieldKind::DateTime,
            "links" => FieldKind::Links,
            _ => FieldKind::Field,
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            FieldKind::Field => "field",
            FieldKind::String => "string",
            FieldKind::Integer => "integer",
            FieldKind::Float => "float",
            FieldKind::Boolean => "boolean",
            FieldKind::Slug => "slug",
            FieldKind::Email => "email",
            FieldKind::Choice(_) => "choice",
            FieldKind::Date => "date",
            FieldKind::DateTime => "datetime",
            FieldKind::Links => "links",
        }
    }
}

/// Native representation of a field value.
#[derive(Clone, Debug, PartialEq)]
pub enum FieldValue {
    Null,
    String(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(Date),
    DateTime(OffsetDateTime),
    Links(BTreeMap<String, String>),
    Json(Value),
}

impl FieldValue {
    pub fn is_empty(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::String(text) => text.is_empty(),
            FieldValue::Links(links) => links.is_empty(),
            FieldValue::Json(value) => is_blank(value),
            _ => false,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            FieldValue::Integer(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_links(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            FieldValue::Links(links) => Some(links),
            _ => None,
        }
    }

    /// Wire form of the value. Datetimes are normalized to UTC.
    pub fn to_json(&self) -> ApiResult<Value> {
        Ok(match self {
            FieldValue::Null => Value::Null,
            FieldValue::String(text) => Value::String(text.clone()),
            FieldValue::Integer(value) => Value::from(*value),
            FieldValue::Float(value) => Value::from(*value),
            FieldValue::Boolean(value) => Value::Bool(*value),
            FieldValue::Date(date) => Value::String(format_date(*date)?),
            FieldValue::DateTime(datetime) => Value::String(format_datetime(*datetime)?),
            FieldValue::Links(links) => Value::Object(
                links
                    .iter()
                    .map(|(name, path)| (name.clone(), Value::String(path.clone())))
                    .collect(),
            ),
            FieldValue::Json(value) => value.clone(),
        })
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

/// A typed attribute descriptor. Created once per model definition and shared
/// by every instance of that model.
#[derive(Clone, Debug, PartialEq)]
pub struct Field {
    pub name: String,
    pub kind: FieldKind,
    pub label: Option<String>,
    pub required: bool,
    pub read_only: bool,
    pub default: Option<FieldValue>,
    pub min_length: Option<usize>,
    pub max_length: Option<usize>,
    /// Extra schema keywords kept verbatim.
    pub schema: Map<String, Value>,
}

impl Field {
    /// An unnamed, required field; the name is adopted when attached to a model.
    pub fn new(kind: FieldKind) -> Self {
        Self {
            name: String::new(),
            kind,
            label: None,
            required: true,
            read_only: false,
            default: None,
            min_length: None,
            max_length: None,
            schema: Map::new(),
        }
    }

    pub fn named(name: impl Into<String>, kind: FieldKind) -> Self {
        let mut field = Self::new(kind);
        field.name = name.into();
        field
    }

    pub fn field() -> Self {
        Self::new(FieldKind::Field)
    }

    pub fn string() -> Self {
        Self::new(FieldKind::String)
    }

    pub fn integer() -> Self {
        Self::new(FieldKind::Integer)
    }

    pub fn float() -> Self {
        Self::new(FieldKind::Float)
    }

    pub fn boolean() -> Self {
        Self::new(FieldKind::Boolean)
    }

    pub fn slug() -> Self {
        Self::new(FieldKind::Slug)
    }

    pub fn email() -> Self {
        Self::new(FieldKind::Email)
    }

    pub fn choice(choices: Vec<Choice>) -> Self {
        Self::new(FieldKind::Choice(choices))
    }

    pub fn date() -> Self {
        Self::new(FieldKind::Date)
    }

    pub fn datetime() -> Self {
        Self::new(FieldKind::DateTime)
    }

    /// Hyperlinks are always server-provided.
    pub fn links() -> Self {
        Self::new(FieldKind::Links).optional().read_only()
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn with_default(mut self, default: impl Into<FieldValue>) -> Self {
        self.default = Some(default.into());
        self
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_min_length(mut self, min_length: usize) -> Self {
        self.min_length = Some(min_length);
        self
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = Some(max_length);
        self
    }

    pub fn with_schema(mut self, key: impl Into<String>, value: Value) -> Self {
        self.schema.insert(key.into(), value);
        self
    }

    /// Build a field from a server-reported definition such as
    /// `{"type": "string", "required": true, "max_length": 64}`.
    pub fn from_schema(name: &str, definition: &Value) -> ApiResult<Self> {
        let Some(definition) = definition.as_object() else {
            return Err(Error::field(name, "schema definition must be an object"));
        };
        let choices = definition
            .get("choices")
            .and_then(Value::as_array)
            .map(|choices| choices.iter().filter_map(choice_from_json).collect())
            .unwrap_or_default();
        let kind = FieldKind::from_type_name(
            definition
                .get("type")
                .and_then(Value::as_str)
                .unwrap_or("field"),
            choices,
        );

        let mut field = Field::named(name, kind);
        field.required = definition
            .get("required")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        field.read_only = definition
            .get("read_only")
            .and_then(Value::as_bool)
            .unwrap_or(false);
        field.label = definition
            .get("label")
            .and_then(Value::as_str)
            .map(str::to_string);
        field.max_length = definition
            .get("max_length")
            .and_then(Value::as_u64)
            .map(|n| n as usize);
        field.min_length = definition
            .get("min_length")
            .and_then(Value::as_u64)
            .map(|n| n as usize);

        const KNOWN: [&str; 8] = [
            "name",
            "type",
            "required",
            "read_only",
            "label",
            "max_length",
            "min_length",
            "choices",
        ];
        for (key, value) in definition {
            if !KNOWN.contains(&key.as_str()) {
                field.schema.insert(key.clone(), value.clone());
            }
        }
        Ok(field)
    }

    fn error(&self, message: impl Into<String>) -> Error {
        Error::field(self.name.clone(), message)
    }

    /// Check an incoming wire/user value against this field's constraints.
    /// `current` is the value the owning instance already holds.
    pub fn validate(&self, value: &Value, current: Option<&FieldValue>) -> ApiResult<()> {
        if self.required && is_blank(value) {
            return Err(self.error(REQUIRED));
        }

        if self.read_only && current.is_some_and(|held| !held.is_empty()) {
            return Err(self.error(READ_ONLY));
        }

        if let Value::String(text) = value {
            let len = text.chars().count();
            if self.max_length.is_some_and(|max| len > max) {
                return Err(self.error("Max length reached"));
            }
            if self.min_length.is_some_and(|min| len < min) {
                return Err(self.error("Min length not reached"));
            }
        }

        match &self.kind {
            FieldKind::Slug => match value {
                Value::Null => {}
                Value::String(text) if SLUG_RE.is_match(text) => {}
                _ => return Err(self.error(INVALID)),
            },
            FieldKind::Email => {
                if value.is_null() && !self.required {
                    return Ok(());
                }
                let valid = value
                    .as_str()
                    .is_some_and(|text| text.contains('@') && EMAIL_RE.is_match(text));
                if !valid {
                    return Err(self.error("Enter a valid email address."));
                }
            }
            FieldKind::Choice(choices) => {
                if !choices.is_empty()
                    && !value.is_null()
                    && !choices.iter().any(|choice| choice.value == *value)
                {
                    return Err(self.error("Invalid choice."));
                }
            }
            _ => {}
        }
        Ok(())
    }

    /// Coerce a wire/user value into the native representation.
    pub fn to_python(&self, value: &Value) -> ApiResult<FieldValue> {
        if value.is_null() {
            return Ok(FieldValue::Null);
        }
        match &self.kind {
            FieldKind::Field => Ok(FieldValue::Json(value.clone())),
            FieldKind::String | FieldKind::Slug | FieldKind::Email => match value {
                Value::String(text) => Ok(FieldValue::String(text.clone())),
                Value::Number(number) => Ok(FieldValue::String(number.to_string())),
                Value::Bool(flag) => Ok(FieldValue::String(flag.to_string())),
                _ => Err(self.error(INVALID)),
            },
            FieldKind::Integer => self.integer_from(value),
            FieldKind::Float => match value {
                Value::Number(number) => number
                    .as_f64()
                    .map(FieldValue::Float)
                    .ok_or_else(|| self.error(INVALID)),
                Value::String(text) => text
                    .trim()
                    .parse::<f64>()
                    .map(FieldValue::Float)
                    .map_err(|_| self.error(INVALID)),
                Value::Bool(flag) => Ok(FieldValue::Float(if *flag { 1.0 } else { 0.0 })),
                _ => Err(self.error(INVALID)),
            },
            FieldKind::Boolean => match value {
                Value::Bool(flag) => Ok(FieldValue::Boolean(*flag)),
                Value::String(text) => match text.as_str() {
                    "t" | "True" | "1" => Ok(FieldValue::Boolean(true)),
                    "f" | "False" | "0" => Ok(FieldValue::Boolean(false)),
                    _ => Err(self.error(INVALID)),
                },
                Value::Number(number) => match number.as_i64() {
                    Some(1) => Ok(FieldValue::Boolean(true)),
                    Some(0) => Ok(FieldValue::Boolean(false)),
                    _ => Err(self.error(INVALID)),
                },
                _ => Err(self.error(INVALID)),
            },
            FieldKind::Choice(_) => Ok(scalar_from_json(value)),
            FieldKind::Date => value
                .as_str()
                .and_then(parse_date)
                .map(FieldValue::Date)
                .ok_or_else(|| self.error("Invalid date.")),
            FieldKind::DateTime => value
                .as_str()
                .and_then(parse_datetime)
                .map(FieldValue::DateTime)
                .ok_or_else(|| self.error(INVALID)),
            FieldKind::Links => match value {
                Value::Object(map) => Ok(FieldValue::Links(
                    map.iter()
                        .filter_map(|(name, path)| {
                            path.as_str().map(|path| (name.clone(), path.to_string()))
                        })
                        .collect(),
                )),
                _ => Err(self.error(INVALID)),
            },
        }
    }

    /// Coerce an already-native value, accepting dates for datetime fields and
    /// datetimes for date fields.
    pub fn coerce(&self, value: FieldValue) -> ApiResult<FieldValue> {
        match (&self.kind, value) {
            (_, FieldValue::Null) => Ok(FieldValue::Null),
            (FieldKind::Date, FieldValue::Date(date)) => Ok(FieldValue::Date(date)),
            (FieldKind::Date, FieldValue::DateTime(datetime)) => {
                Ok(FieldValue::Date(datetime.to_offset(UtcOffset::UTC).date()))
            }
            (FieldKind::DateTime, FieldValue::DateTime(datetime)) => Ok(FieldValue::DateTime(
                datetime.to_offset(UtcOffset::UTC),
            )),
            (FieldKind::DateTime, FieldValue::Date(date)) => Ok(FieldValue::DateTime(
                PrimitiveDateTime::new(date, Time::MIDNIGHT).assume_utc(),
            )),
            (_, other) => self.to_python(&other.to_json()?),
        }
    }

    /// Serialize a native value to its wire form.
    pub fn to_native(&self, value: &FieldValue) -> ApiResult<Value> {
        value.to_json().map_err(|err| err.with_field(self.name.clone()))
    }

    fn integer_from(&self, value: &Value) -> ApiResult<FieldValue> {
        match value {
            Value::Number(number) => {
                if let Some(int) = number.as_i64() {
                    return Ok(FieldValue::Integer(int));
                }
                // `i64::MAX as f64` rounds up to 2^63, so the upper bound is exclusive.
                match number.as_f64().map(f64::trunc) {
                    Some(float) if float >= i64::MIN as f64 && float < i64::MAX as f64 => {
                        Ok(FieldValue::Integer(float as i64))
                    }
                    _ => Err(self.error(INVALID)),
                }
            }
            Value::String(text) => text
                .trim()
                .parse::<i64>()
                .map(FieldValue::Integer)
                .map_err(|_| self.error(INVALID)),
            Value::Bool(flag) => Ok(FieldValue::Integer(i64::from(*flag))),
            _ => Err(self.error(INVALID)),
        }
    }
}

/// Absent for the purpose of `required`: null or an empty string/array/object.
pub fn is_blank(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn scalar_from_json(value: &Value) -> FieldValue {
    match value {
        Value::Null => FieldValue::Null,
        Value::String(text) => FieldValue::String(text.clone()),
        Value::Bool(flag) => FieldValue::Boolean(*flag),
        Value::Number(number) => match number.as_i64() {
            Some(int) => FieldValue::Integer(int),
            None => number
                .as_f64()
                .map(FieldValue::Float)
                .unwrap_or_else(|| FieldValue::Json(value.clone())),
        },
        other => FieldValue::Json(other.clone()),
    }
}

fn choice_from_json(value: &Value) -> Option<Choice> {
    let map = value.as_object()?;
    let choice_value = map.get("value")?.clone();
    let display_name = map
        .get("display_name")
        .and_then(Value::as_str)
        .map(str::to_string)
        .unwrap_or_else(|| match &choice_value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        });
    Some(Choice {
        display_name,
        value: choice_value,
    })
}

fn capture_u32(captures: &regex::Captures<'_>, name: &str) -> Option<u32> {
    captures.name(name)?.as_str().parse().ok()
}

fn date_from_parts(year: u32, month: u32, day: u32) -> Option<Date> {
    let month = Month::try_from(u8::try_from(month).ok()?).ok()?;
    Date::from_calendar_date(i32::try_from(year).ok()?, month, u8::try_from(day).ok()?).ok()
}

/// Parse `YYYY-M-D`.
fn parse_date(raw: &str) -> Option<Date> {
    let captures = DATE_RE.captures(raw)?;
    date_from_parts(
        capture_u32(&captures, "year")?,
        capture_u32(&captures, "month")?,
        capture_u32(&captures, "day")?,
    )
}

/// Parse `YYYY-MM-DDTHH:MM:SS[.ffffff]`, ignoring anything from the first `Z`.
/// A bare date yields midnight. The result is taken to be UTC.
fn parse_datetime(raw: &str) -> Option<OffsetDateTime> {
    let raw = raw.split('Z').next().unwrap_or(raw);
    if let Some(captures) = DATETIME_RE.captures(raw) {
        let date = date_from_parts(
            capture_u32(&captures, "year")?,
            capture_u32(&captures, "month")?,
            capture_u32(&captures, "day")?,
        )?;
        let micros = match captures.name("fraction") {
            Some(fraction) => format!("{:0<6}", fraction.as_str()).parse::<u32>().ok()?,
            None => 0,
        };
        let time = Time::from_hms_micro(
            u8::try_from(capture_u32(&captures, "hour")?).ok()?,
            u8::try_from(capture_u32(&captures, "minute")?).ok()?,
            u8::try_from(capture_u32(&captures, "second")?).ok()?,
            micros,
        )
        .ok()?;
        return Some(PrimitiveDateTime::new(date, time).assume_utc());
    }
    parse_date(raw).map(|date| PrimitiveDateTime::new(date, Time::MIDNIGHT).assume_utc())
}

fn format_date(date: Date) -> ApiResult<String> {
    date.format(format_description!("[year]-[month]-[day]"))
        .map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to format date")
                .with_source(err)
        })
}

fn format_datetime(datetime: OffsetDateTime) -> ApiResult<String> {
    let formatted = datetime
        .to_offset(UtcOffset::UTC)
        .format(format_description!(
            "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:6][offset_hour sign:mandatory]:[offset_minute]"
        ))
        .map_err(|err| {
            Error::new(ErrorKind::Internal)
                .with_message("failed to format datetime")
                .with_source(err)
        })?;
    Ok(match formatted.strip_suffix("+00:00") {
        Some(stripped) => format!("{stripped}Z"),
        None => formatted,
    })
}

#[cfg(test)]
mod tests {
    use super::{Choice, Field, FieldKind, FieldValue};
    use crate::core::error::ErrorKind;
    use serde_json::{Value, json};
    use time::macros::{date, datetime};

    fn named(field: Field, name: &str) -> Field {
        let mut field = field;
        field.name = name.to_string();
        field
    }

    #[test]
    fn required_rejects_blank_values() {
        let field = named(Field::string(), "label");
        for blank in [Value::Null, json!(""), json!([]), json!({})] {
            let err = field.validate(&blank, None).expect_err("required");
            assert_eq!(err.kind(), ErrorKind::Field);
            assert_eq!(err.field_name(), Some("label"));
        }
        field.validate(&json!("ok"), None).expect("valid");
        named(Field::integer(), "n")
            .validate(&json!(0), None)
            .expect("zero is present");
    }

    #[test]
    fn read_only_rejects_overwrite_of_held_value() {
        let field = named(Field::string().read_only(), "key");
        field.validate(&json!("a"), None).expect("first write");
        field
            .validate(&json!("b"), Some(&FieldValue::Null))
            .expect("empty holder");
        let err = field
            .validate(&json!("b"), Some(&FieldValue::from("a")))
            .expect_err("read only");
        assert_eq!(err.message(), Some("Field is read only."));
    }

    #[test]
    fn string_length_bounds() {
        let field = named(
            Field::string().with_min_length(2).with_max_length(4),
            "code",
        );
        assert!(field.validate(&json!("a"), None).is_err());
        assert!(field.validate(&json!("abcde"), None).is_err());
        field.validate(&json!("abc"), None).expect("in range");
    }

    #[test]
    fn boolean_accepts_known_spellings_only() {
        let field = named(Field::boolean(), "flag");
        for truthy in [json!(true), json!("t"), json!("True"), json!("1"), json!(1)] {
            assert_eq!(field.to_python(&truthy).expect("bool"), FieldValue::Boolean(true));
        }
        for falsy in [json!(false), json!("f"), json!("False"), json!("0")] {
            assert_eq!(field.to_python(&falsy).expect("bool"), FieldValue::Boolean(false));
        }
        assert!(field.to_python(&json!("yes")).is_err());
    }

    #[test]
    fn integer_and_float_coercion() {
        let int = named(Field::integer(), "n");
        assert_eq!(int.to_python(&json!("42")).expect("int"), FieldValue::Integer(42));
        assert_eq!(int.to_python(&json!(7.9)).expect("int"), FieldValue::Integer(7));
        assert!(int.to_python(&json!("4.2")).is_err());
        assert_eq!(int.to_python(&json!(-2.5e3)).expect("int"), FieldValue::Integer(-2500));
        for out_of_range in [json!(1e30), json!(-1e30), json!(9.3e18)] {
            let err = int.to_python(&out_of_range).expect_err("out of range");
            assert_eq!(err.message(), Some("Invalid value."));
            assert_eq!(err.field_name(), Some("n"));
        }

        let float = named(Field::float(), "x");
        assert_eq!(float.to_python(&json!("1.5")).expect("float"), FieldValue::Float(1.5));
        assert!(float.to_python(&json!([1])).is_err());
    }

    #[test]
    fn slug_and_email_validation() {
        let slug = named(Field::slug(), "name");
        slug.validate(&json!("my-instance_01"), None).expect("slug");
        assert!(slug.validate(&json!("has space"), None).is_err());

        let email = named(Field::email(), "email");
        email.validate(&json!("dev@example.com"), None).expect("email");
        assert!(email.validate(&json!("dev.example.com"), None).is_err());
        assert!(email.validate(&json!("dev@localhost"), None).is_err());
        named(Field::email().optional(), "email")
            .validate(&Value::Null, None)
            .expect("optional null");
    }

    #[test]
    fn choice_membership() {
        let field = named(
            Field::choice(vec![Choice::new("full", "full"), Choice::new("read", "read")]),
            "role",
        );
        field.validate(&json!("read"), None).expect("allowed");
        let err = field.validate(&json!("admin"), None).expect_err("not allowed");
        assert_eq!(err.message(), Some("Invalid choice."));
    }

    #[test]
    fn date_parsing_accepts_short_components() {
        let field = named(Field::date(), "day");
        assert_eq!(
            field.to_python(&json!("2015-1-5")).expect("date"),
            FieldValue::Date(date!(2015 - 01 - 05))
        );
        assert!(field.to_python(&json!("2015-13-01")).is_err());
        assert!(field.to_python(&json!("05/01/2015")).is_err());
    }

    #[test]
    fn datetime_parsing_truncates_z_and_falls_back_to_date() {
        let field = named(Field::datetime(), "created_at");
        assert_eq!(
            field
                .to_python(&json!("2015-02-10T15:31:08.123456Z"))
                .expect("datetime"),
            FieldValue::DateTime(datetime!(2015-02-10 15:31:08.123456 UTC))
        );
        assert_eq!(
            field.to_python(&json!("2015-02-10T15:31:08.5Z")).expect("datetime"),
            FieldValue::DateTime(datetime!(2015-02-10 15:31:08.5 UTC))
        );
        assert_eq!(
            field.to_python(&json!("2015-2-10")).expect("date fallback"),
            FieldValue::DateTime(datetime!(2015-02-10 0:00 UTC))
        );
        assert!(field.to_python(&json!("yesterday")).is_err());
    }

    #[test]
    fn datetime_native_form_uses_z_suffix() {
        let field = named(Field::datetime(), "created_at");
        let native = field
            .to_native(&FieldValue::DateTime(datetime!(2015-02-10 15:31:08.000120 +2)))
            .expect("native");
        assert_eq!(native, json!("2015-02-10T13:31:08.000120Z"));
    }

    #[test]
    fn coerce_crosses_date_and_datetime() {
        let field = named(Field::datetime(), "at");
        assert_eq!(
            field.coerce(FieldValue::Date(date!(2020 - 03 - 04))).expect("coerce"),
            FieldValue::DateTime(datetime!(2020-03-04 0:00 UTC))
        );
        let field = named(Field::date(), "on");
        assert_eq!(
            field
                .coerce(FieldValue::DateTime(datetime!(2020-03-04 10:00 UTC)))
                .expect("coerce"),
            FieldValue::Date(date!(2020 - 03 - 04))
        );
    }

    #[test]
    fn native_round_trip_per_kind() {
        let cases = [
            (Field::string(), FieldValue::from("hello")),
            (Field::integer(), FieldValue::Integer(-12)),
            (Field::float(), FieldValue::Float(2.25)),
            (Field::boolean(), FieldValue::Boolean(true)),
            (Field::slug(), FieldValue::from("a-slug")),
            (Field::email(), FieldValue::from("a@b.io")),
            (
                Field::choice(vec![Choice::new("ruby", "ruby")]),
                FieldValue::from("ruby"),
            ),
            (Field::date(), FieldValue::Date(date!(1999 - 12 - 31))),
            (
                Field::datetime(),
                FieldValue::DateTime(datetime!(2016-07-01 08:09:10.654321 UTC)),
            ),
            (
                Field::links(),
                FieldValue::Links(
                    [("self".to_string(), "/v1/instances/a/".to_string())]
                        .into_iter()
                        .collect(),
                ),
            ),
            (Field::field(), FieldValue::Json(json!({"nested": [1, 2]}))),
        ];
        for (field, value) in cases {
            let kind = field.kind.type_name();
            let native = field.to_native(&value).expect("native");
            assert_eq!(field.to_python(&native).expect("python"), value, "kind {kind}");
        }
    }

    #[test]
    fn from_schema_reads_known_keys_and_keeps_the_rest() {
        let field = Field::from_schema(
            "color",
            &json!({
                "type": "choice",
                "required": true,
                "label": "Color",
                "choices": [{"display_name": "Red", "value": "red"}],
                "filter_index": true
            }),
        )
        .expect("field");
        assert_eq!(field.name, "color");
        assert!(field.required);
        assert_eq!(field.label.as_deref(), Some("Color"));
        assert_eq!(
            field.kind,
            FieldKind::Choice(vec![Choice::new("Red", "red")])
        );
        assert_eq!(field.schema.get("filter_index"), Some(&json!(true)));

        let unknown = Field::from_schema("blob", &json!({"type": "file"})).expect("field");
        assert_eq!(unknown.kind, FieldKind::Field);
        assert!(!unknown.required);
    }
}
