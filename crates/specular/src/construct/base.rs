//! Built-in `base` construction
//!
//! Schemata and constructors for `.bool`, `.bytes`, `.integer` and
//! `.text`, plus the argument-only predicates `.number` and
//! `.documentation`.

use super::constructor::{construct_skip_no_value, Constructor, Field, Interrupt};
use super::context::Context;
use super::ConstructorTable;
use crate::domain::Domain;
use crate::error::{Error, Result, What};
use crate::path::Path;
use crate::value::truthy;
use once_cell::sync::Lazy;
use rand::seq::IndexedRandom;
use rand::Rng;
use regex::Regex;
use serde_json::{json, Map, Value};
use tracing::debug;

/// Name of the built-in construction
pub const BASE: &str = "base";

static DEFAULT_ALPHABET: Lazy<Vec<char>> = Lazy::new(|| (0u8..=255).map(char::from).collect());

const DEFAULT_RANDOM_MAXLEN: usize = 32;

fn base_schemata() -> Vec<(&'static str, Value)> {
    vec![
        (".bool", json!({".bool": {}})),
        (".bytes", json!({".bytes": {}})),
        (".number", json!({".number": {}})),
        (".documentation", json!({".documentation": {}})),
        (".integer", json!({".integer": {}})),
        (
            ".integer.min",
            json!({".integer.min": {
                ".number": null,
                ".documentation": "minimum permitted value",
            }}),
        ),
        (
            ".integer.max",
            json!({".integer.max": {
                ".number": null,
                ".documentation": "maximum permitted value",
            }}),
        ),
        (
            ".integer.randomize",
            json!({".integer.randomize": {
                ".bool": null,
                ".documentation": "create a random conforming value if no value exists at construction time",
            }}),
        ),
        (".text", json!({".text": {}, ".bytes": {}})),
        (
            ".text.minlen",
            json!({".text.minlen": {
                ".integer": {"min": 0},
                ".documentation": "minimum permitted character length",
            }}),
        ),
        (
            ".text.maxlen",
            json!({".text.maxlen": {
                ".integer": {"min": 0},
                ".documentation": "maximum permitted character length",
            }}),
        ),
        (
            ".text.regex",
            json!({".text.regex": {
                ".bytes": {},
                ".documentation": "a regular expression to be matched against the value",
            }}),
        ),
        (".text.alphabet", json!({".text.alphabet": {".bytes": {}}})),
        (
            ".text.encoding",
            json!({".text.encoding": {
                ".bytes": {},
                ".documentation": "if given, use it to decode bytes to text",
            }}),
        ),
        (
            ".text.excluded",
            json!({".text.excluded": {
                ".bytes": {},
                ".documentation": "characters that must not appear in the value",
            }}),
        ),
        (
            ".text.randomize",
            json!({".text.randomize": {
                ".bool": {},
                ".documentation": "create a random conforming value if the instance provides no value",
            }}),
        ),
    ]
}

/// Constructor table of the `base` construction
#[must_use]
pub fn base_constructors() -> ConstructorTable {
    let mut table = ConstructorTable::new();
    table.insert(
        ".bool".into(),
        Constructor::with_fields("construct_bool", [Field::Value], construct_bool),
    );
    table.insert(
        ".bytes".into(),
        Constructor::with_fields("construct_bytes", [Field::Value], construct_bytes),
    );
    table.insert(
        ".integer".into(),
        Constructor::with_fields(
            "construct_integer",
            [Field::Value, Field::Args, Field::Loc],
            construct_integer,
        ),
    );
    table.insert(
        ".text".into(),
        Constructor::with_fields(
            "construct_text",
            [Field::Value, Field::Args, Field::Loc],
            construct_text,
        ),
    );
    table
}

impl Domain {
    /// Fresh domain with the built-in schemata and the `base` construction
    ///
    /// # Errors
    /// `compile-failed` if a built-in schema fails to register.
    pub fn base() -> Result<Self> {
        let domain = Self::new();
        let mut scratch = crate::spec::Spec::with_domain(domain.clone());
        scratch.compile_with(&json!({"$/?": {}}), None, true)?;
        domain.compile_schemata(base_schemata())?;
        domain.add_construction(BASE, base_constructors());
        debug!(constructors = 4, "base domain ready");
        Ok(domain)
    }
}

fn invalid(loc: &Path, data: Value, message: impl Into<String>) -> Interrupt {
    Interrupt::Fail(
        Error::invalid(message)
            .at(loc.clone())
            .with_data("data", data),
    )
}

fn construct_bool(context: &Context<'_>) -> Result<Value, Interrupt> {
    let value = construct_skip_no_value(context.value()?)?;
    Ok(Value::Bool(truthy(value)))
}

fn construct_bytes(context: &Context<'_>) -> Result<Value, Interrupt> {
    let value = construct_skip_no_value(context.value()?)?;
    Ok(match value {
        Value::String(text) => Value::String(text.clone()),
        other => Value::String(other.to_string()),
    })
}

fn integer_arg(args: &Map<String, Value>, name: &str, loc: &Path) -> Result<Option<i64>, Interrupt> {
    match args.get(name) {
        None => Ok(None),
        Some(value) => value
            .as_i64()
            .map(Some)
            .ok_or_else(|| invalid(loc, value.clone(), format!("argument {name:?} is not an integer"))),
    }
}

fn construct_integer(context: &Context<'_>) -> Result<Value, Interrupt> {
    let args = context.args()?;
    let loc = context.loc()?;
    let min = integer_arg(args, "min", loc)?;
    let max = integer_arg(args, "max", loc)?;
    let randomize = args.get("randomize").is_some_and(truthy);

    let output = match context.value()? {
        None if randomize => {
            let low = min.unwrap_or(i64::MIN);
            let high = max.unwrap_or(i64::MAX);
            if low > high {
                return Err(invalid(loc, json!([low, high]), "empty integer range"));
            }
            rand::rng().random_range(low..=high)
        }
        None => return Err(Interrupt::Skip),
        Some(Value::String(digits)) => {
            if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
                return Err(invalid(loc, json!(digits), "data given not made of integer digits"));
            }
            digits
                .parse::<i64>()
                .map_err(|e| invalid(loc, json!(digits), format!("integer out of range: {e}")))?
        }
        Some(Value::Number(number)) => number.as_i64().ok_or_else(|| {
            invalid(loc, json!(number), "cannot make out an integer out of data given")
        })?,
        Some(other) => {
            return Err(invalid(loc, other.clone(), "cannot make out an integer out of data given"));
        }
    };

    if let Some(min) = min.filter(|min| output < *min) {
        return Err(invalid(loc, json!([output, min]), format!("integer {output} less than min {min}")));
    }
    if let Some(max) = max.filter(|max| output > *max) {
        return Err(invalid(loc, json!([output, max]), format!("integer {output} greater than max {max}")));
    }
    Ok(Value::from(output))
}

fn string_arg<'a>(args: &'a Map<String, Value>, name: &str, loc: &Path) -> Result<Option<&'a str>, Interrupt> {
    match args.get(name) {
        None => Ok(None),
        Some(Value::String(text)) => Ok(Some(text)),
        Some(other) => Err(invalid(loc, other.clone(), format!("argument {name:?} is not text"))),
    }
}

fn length_arg(args: &Map<String, Value>, name: &str, loc: &Path) -> Result<Option<usize>, Interrupt> {
    match args.get(name) {
        None => Ok(None),
        Some(value) => value
            .as_u64()
            .and_then(|n| usize::try_from(n).ok())
            .map(Some)
            .ok_or_else(|| invalid(loc, value.clone(), format!("argument {name:?} is not a length"))),
    }
}

fn decode(bytes: &[Value], encoding: Option<&str>, loc: &Path) -> Result<String, Interrupt> {
    if let Some(encoding) = encoding {
        let normalized = encoding.to_ascii_lowercase().replace(['-', '_'], "");
        if normalized != "utf8" {
            return Err(Interrupt::Fail(
                Error::new(What::Unsupported)
                    .with_message(format!("cannot decode text with encoding {encoding:?}"))
                    .at(loc.clone()),
            ));
        }
    }
    let raw: Option<Vec<u8>> = bytes
        .iter()
        .map(|b| b.as_u64().and_then(|n| u8::try_from(n).ok()))
        .collect();
    let raw = raw.ok_or_else(|| invalid(loc, Value::Array(bytes.to_vec()), "text data is not a byte sequence"))?;
    String::from_utf8(raw).map_err(|e| invalid(loc, Value::Array(bytes.to_vec()), format!("text data is not utf-8: {e}")))
}

fn construct_text(context: &Context<'_>) -> Result<Value, Interrupt> {
    let args = context.args()?;
    let loc = context.loc()?;
    let regex = string_arg(args, "regex", loc)?;
    let encoding = string_arg(args, "encoding", loc)?;
    let minlen = length_arg(args, "minlen", loc)?.unwrap_or(0);
    let maxlen = length_arg(args, "maxlen", loc)?;
    let alphabet = string_arg(args, "alphabet", loc)?;
    let excluded = string_arg(args, "excluded", loc)?.unwrap_or("");
    let randomize = args.get("randomize").is_some_and(truthy);

    let text = match context.value()? {
        None if randomize => {
            if regex.is_some() {
                return Err(Interrupt::Fail(
                    Error::new(What::Unsupported)
                        .with_message("cannot randomize when 'regex' is given")
                        .at(loc.clone()),
                ));
            }
            let pool: Vec<char> = match alphabet {
                Some(alphabet) => alphabet.chars().collect(),
                None => DEFAULT_ALPHABET.clone(),
            }
            .into_iter()
            .filter(|c| !excluded.contains(*c))
            .collect();

            let high = maxlen.unwrap_or_else(|| minlen.max(DEFAULT_RANDOM_MAXLEN));
            if minlen > high {
                return Err(invalid(loc, json!([minlen, high]), "minlen greater than maxlen"));
            }
            let mut rng = rand::rng();
            let len = rng.random_range(minlen..=high);
            if len > 0 && pool.is_empty() {
                return Err(invalid(loc, json!(alphabet), "no characters left to randomize from"));
            }
            (0..len).filter_map(|_| pool.choose(&mut rng).copied()).collect()
        }
        None => return Err(Interrupt::Skip),
        Some(Value::String(text)) => text.clone(),
        Some(Value::Array(bytes)) => decode(bytes, encoding, loc)?,
        Some(other) => {
            return Err(invalid(loc, other.clone(), "text data is neither text nor bytes"));
        }
    };

    if let Some(pattern) = regex {
        let anchored = Regex::new(&format!(r"\A(?:{pattern})"))
            .map_err(|e| invalid(loc, json!(pattern), format!("bad regex: {e}")))?;
        if !anchored.is_match(&text) {
            return Err(invalid(loc, json!(text), format!("text data does not match regex {pattern:?}")));
        }
    }

    let len = text.chars().count();
    if len < minlen {
        return Err(invalid(loc, json!(text), format!("text data length {len} less than minlen {minlen}")));
    }
    if let Some(maxlen) = maxlen.filter(|maxlen| len > *maxlen) {
        return Err(invalid(loc, json!(text), format!("text data length {len} greater than maxlen {maxlen}")));
    }

    if let Some(alphabet) = alphabet {
        if let Some(c) = text.chars().find(|c| !alphabet.contains(*c) || excluded.contains(*c)) {
            return Err(invalid(loc, json!(text), format!("char {c:?} in text data is not in alphabet {alphabet:?}")));
        }
    } else if let Some(c) = excluded.chars().find(|c| text.contains(*c)) {
        return Err(invalid(loc, json!(text), format!("forbidden char {c:?} found in text data")));
    }

    Ok(Value::String(text))
}
