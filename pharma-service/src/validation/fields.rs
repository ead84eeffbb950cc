//! Field reader used by [`Schema`](super::Schema) implementations

use std::str::FromStr;

use serde_json::{Map, Value};

use super::ValidationErrors;

/// Reads typed fields out of a JSON object while collecting violations
///
/// Every accessor returns `None` when the field is absent or invalid and
/// records the reason, so a schema can read all of its fields before calling
/// [`Fields::finish`]. `null` is treated the same as an absent field. String
/// values are coerced into numbers and booleans because query strings and
/// route parameters only carry text.
#[derive(Debug)]
pub struct Fields<'a> {
    object: Option<&'a Map<String, Value>>,
    prefix: Option<String>,
    errors: ValidationErrors,
}

impl<'a> Fields<'a> {
    /// Start reading `input`; a non-object input is itself a violation
    pub fn new(input: &'a Value) -> Self {
        Self::scoped(input, None)
    }

    fn scoped(input: &'a Value, prefix: Option<String>) -> Self {
        let mut errors = ValidationErrors::new();
        let object = match input {
            Value::Object(map) => Some(map),
            _ => {
                errors.push(
                    prefix.clone().unwrap_or_default(),
                    "invalid_type",
                    "Expected an object",
                );
                None
            }
        };
        Self {
            object,
            prefix,
            errors,
        }
    }

    /// Full dotted path of `name` relative to the root input
    pub fn path(&self, name: &str) -> String {
        match &self.prefix {
            Some(prefix) => format!("{prefix}.{name}"),
            None => name.to_string(),
        }
    }

    /// True when the field is present and not null
    pub fn is_present(&self, name: &str) -> bool {
        self.raw(name).is_some()
    }

    /// True when at least one violation has been recorded
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    fn raw(&self, name: &str) -> Option<&'a Value> {
        self.object
            .and_then(|map| map.get(name))
            .filter(|value| !value.is_null())
    }

    fn missing(&mut self, name: &str) {
        let path = self.path(name);
        self.errors
            .push(path, "required", format!("{name} is required"));
    }

    fn invalid_type(&mut self, name: &str, expected: &str) {
        let path = self.path(name);
        self.errors
            .push(path, "invalid_type", format!("{name} must be {expected}"));
    }

    /// Record a violation on `name` unless `ok` holds
    pub fn ensure(&mut self, ok: bool, name: &str, code: &str, message: impl Into<String>) {
        if !ok {
            let path = self.path(name);
            self.errors.push(path, code, message);
        }
    }

    /// Optional trimmed string; blank strings count as absent
    pub fn optional_str(&mut self, name: &str) -> Option<String> {
        match self.raw(name)? {
            Value::String(s) => {
                let trimmed = s.trim();
                (!trimmed.is_empty()).then(|| trimmed.to_string())
            }
            _ => {
                self.invalid_type(name, "a string");
                None
            }
        }
    }

    /// Required trimmed, non-blank string
    pub fn required_str(&mut self, name: &str) -> Option<String> {
        self.object?;
        if !self.is_present(name) {
            self.missing(name);
            return None;
        }
        let value = self.optional_str(name);
        if value.is_none() && !self.last_error_is(name) {
            self.missing(name);
        }
        value
    }

    /// Optional string constrained to `min..=max` characters
    pub fn optional_str_len(&mut self, name: &str, min: usize, max: usize) -> Option<String> {
        let value = self.optional_str(name)?;
        self.check_len(name, &value, min, max);
        Some(value)
    }

    /// Required string constrained to `min..=max` characters
    pub fn required_str_len(&mut self, name: &str, min: usize, max: usize) -> Option<String> {
        let value = self.required_str(name)?;
        self.check_len(name, &value, min, max);
        Some(value)
    }

    fn check_len(&mut self, name: &str, value: &str, min: usize, max: usize) {
        let len = value.chars().count();
        self.ensure(
            len >= min,
            name,
            "too_small",
            format!("{name} must contain at least {min} character(s)"),
        );
        self.ensure(
            len <= max,
            name,
            "too_big",
            format!("{name} must contain at most {max} character(s)"),
        );
    }

    /// Optional number; numeric strings are accepted
    pub fn optional_f64(&mut self, name: &str) -> Option<f64> {
        let value = self.raw(name)?;
        let number = coerce_f64(value);
        if number.is_none() {
            self.invalid_type(name, "a number");
        }
        number
    }

    /// Required number
    pub fn required_f64(&mut self, name: &str) -> Option<f64> {
        self.object?;
        if !self.is_present(name) {
            self.missing(name);
            return None;
        }
        self.optional_f64(name)
    }

    /// Optional integer; integral strings and floats without a fraction are accepted
    pub fn optional_i64(&mut self, name: &str) -> Option<i64> {
        let value = self.raw(name)?;
        let number = coerce_i64(value);
        if number.is_none() {
            self.invalid_type(name, "an integer");
        }
        number
    }

    /// Required integer
    pub fn required_i64(&mut self, name: &str) -> Option<i64> {
        self.object?;
        if !self.is_present(name) {
            self.missing(name);
            return None;
        }
        self.optional_i64(name)
    }

    /// Optional non-negative integer that fits in a `u32`
    pub fn optional_u32(&mut self, name: &str) -> Option<u32> {
        let value = self.optional_i64(name)?;
        match u32::try_from(value) {
            Ok(v) => Some(v),
            Err(_) if value < 0 => {
                self.ensure(false, name, "too_small", format!("{name} must not be negative"));
                None
            }
            Err(_) => {
                self.ensure(false, name, "too_big", format!("{name} is too large"));
                None
            }
        }
    }

    /// Required identifier: an integer of at least 1
    pub fn required_id(&mut self, name: &str) -> Option<i64> {
        let id = self.required_i64(name)?;
        if id < 1 {
            self.ensure(
                false,
                name,
                "too_small",
                format!("{name} must be a positive integer"),
            );
            return None;
        }
        Some(id)
    }

    /// Optional boolean; `"true"`, `"false"`, `"1"` and `"0"` are accepted
    pub fn optional_bool(&mut self, name: &str) -> Option<bool> {
        let value = self.raw(name)?;
        let flag = match value {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" => Some(true),
                "false" | "0" => Some(false),
                _ => None,
            },
            _ => None,
        };
        if flag.is_none() {
            self.invalid_type(name, "a boolean");
        }
        flag
    }

    /// Optional value parsed from one of `allowed` (case-insensitive)
    pub fn optional_enum<T: FromStr>(&mut self, name: &str, allowed: &[&str]) -> Option<T> {
        let raw = self.optional_str(name)?;
        let parsed = T::from_str(&raw.to_ascii_lowercase()).ok();
        if parsed.is_none() {
            self.ensure(
                false,
                name,
                "invalid_enum",
                format!("{name} must be one of: {}", allowed.join(", ")),
            );
        }
        parsed
    }

    /// Record `too_small` unless `value >= min`; absent values pass
    pub fn check_min_f64(&mut self, name: &str, value: Option<f64>, min: f64) {
        if let Some(v) = value {
            self.ensure(v >= min, name, "too_small", format!("{name} must be at least {min}"));
        }
    }

    /// Record `too_small` unless `value >= min`; absent values pass
    pub fn check_min_i64(&mut self, name: &str, value: Option<i64>, min: i64) {
        if let Some(v) = value {
            self.ensure(v >= min, name, "too_small", format!("{name} must be at least {min}"));
        }
    }

    /// Optional array of objects, each parsed with `parse`
    ///
    /// Violations inside element `i` are reported under `name.i.<field>`.
    pub fn optional_objects<T>(
        &mut self,
        name: &str,
        parse: impl FnMut(&mut Fields<'a>) -> Option<T>,
    ) -> Option<Vec<T>> {
        self.objects(name, false, parse)
    }

    /// Required, non-empty array of objects, each parsed with `parse`
    pub fn required_objects<T>(
        &mut self,
        name: &str,
        parse: impl FnMut(&mut Fields<'a>) -> Option<T>,
    ) -> Option<Vec<T>> {
        self.objects(name, true, parse)
    }

    fn objects<T>(
        &mut self,
        name: &str,
        required: bool,
        mut parse: impl FnMut(&mut Fields<'a>) -> Option<T>,
    ) -> Option<Vec<T>> {
        self.object?;
        let items = match self.raw(name) {
            None => {
                if required {
                    self.missing(name);
                }
                return None;
            }
            Some(Value::Array(items)) => items,
            Some(_) => {
                self.invalid_type(name, "an array");
                return None;
            }
        };

        if required && items.is_empty() {
            self.ensure(
                false,
                name,
                "too_small",
                format!("{name} must contain at least 1 item"),
            );
            return None;
        }

        let mut parsed = Vec::with_capacity(items.len());
        let mut valid = true;
        for (index, item) in items.iter().enumerate() {
            let mut element = Fields::scoped(item, Some(self.path(&format!("{name}.{index}"))));
            let value = parse(&mut element);
            if element.errors.is_empty() {
                parsed.extend(value);
            } else {
                valid = false;
                self.errors.extend(element.errors);
            }
        }
        valid.then_some(parsed)
    }

    fn last_error_is(&self, name: &str) -> bool {
        let path = self.path(name);
        self.errors
            .violations()
            .last()
            .is_some_and(|v| v.field == path)
    }

    /// Finish reading; `Err` carries every violation recorded so far
    pub fn finish(self) -> Result<(), ValidationErrors> {
        if self.errors.is_empty() {
            Ok(())
        } else {
            Err(self.errors)
        }
    }
}

fn coerce_f64(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok().filter(|v| v.is_finite()),
        _ => None,
    }
}

fn coerce_i64(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|v| v.fract() == 0.0 && v.abs() < i64::MAX as f64)
                .map(|v| v as i64)
        }),
        Value::String(s) => s.trim().parse::<i64>().ok(),
        _ => None,
    }
}
