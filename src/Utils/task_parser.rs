//! Configuration documents for the calculator core.
//!
//! A document is a sequence of sections: a title followed by `key: value, value` entries.
//!
//! ```text
//! controller
//!  allow_loops: true
//!  allow_random: false
//!  scratch_pool: 8
//!  sleep_poll_ms: 1
//! logging
//!  level: debug
//!  file: calc.log
//! ```
//!
//! Lines starting with `//`, `#`, `%` or `;` are comments. Values are typed on the fly: integers,
//! floats and booleans are recognized, anything else is text.
//!
//! ## Key Methods
//! - `parse_document(input)` - the raw section map
//! - `CalcConfig::from_str(input)` / `CalcConfig::from_file(path)` - the typed configuration;
//!   missing keys keep their defaults and unknown keys are ignored
//! - `CalcConfig::init_logger()` - installs the logger described in the `logging` section

use crate::Utils::logger;
use crate::symbolic::symbolic_controller::{DEFAULT_POOL_CAPACITY, DEFAULT_SLEEP_POLL};
use nom::{
    IResult, Parser,
    branch::alt,
    bytes::complete::{tag, take_while1},
    character::complete::{alpha1, alphanumeric1, multispace0, space0},
    combinator::{map, map_res, recognize},
    multi::{many0, many1, separated_list0},
    sequence::{delimited, pair, separated_pair, terminated},
};
use simplelog::LevelFilter;
use std::collections::HashMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

pub type Section = HashMap<String, Vec<Value>>;
pub type Document = HashMap<String, Section>;

/// A typed value of an entry.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Text(String),
    Float(f64),
    Integer(i64),
    Boolean(bool),
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Text(s) => write!(f, "{}", s),
            Value::Float(v) => write!(f, "{}", v),
            Value::Integer(v) => write!(f, "{}", v),
            Value::Boolean(v) => write!(f, "{}", v),
        }
    }
}

#[derive(Debug)]
pub enum ConfigError {
    /// the document does not follow the section grammar
    Parse(String),
    /// a known key holds a value of the wrong type or arity
    InvalidValue { key: String, found: String },
    Io(std::io::Error),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::Parse(msg) => write!(f, "configuration parse error: {}", msg),
            ConfigError::InvalidValue { key, found } => {
                write!(f, "invalid value '{}' for key '{}'", found, key)
            }
            ConfigError::Io(e) => write!(f, "configuration file error: {}", e),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<std::io::Error> for ConfigError {
    fn from(e: std::io::Error) -> Self {
        ConfigError::Io(e)
    }
}

////////////////////////////////////GRAMMAR//////////////////////////////////////////

/// Section titles and keys: a letter or underscore, then letters, digits and underscores.
fn parse_identifier(input: &str) -> IResult<&str, String> {
    let parser = recognize(pair(
        alt((alpha1, tag("_"))),
        many0(alt((alphanumeric1, tag("_")))),
    ));
    let mut parser = map(parser, String::from);
    parser.parse(input)
}

fn parse_value(input: &str) -> IResult<&str, Value> {
    let raw = take_while1(|c: char| !matches!(c, ',' | ' ' | '\t' | '\r' | '\n' | ';'));
    let mut parser = map_res(raw, |s: &str| -> Result<Value, String> {
        if let Ok(v) = s.parse::<i64>() {
            Ok(Value::Integer(v))
        } else if let Ok(v) = s.parse::<f64>() {
            Ok(Value::Float(v))
        } else if let Ok(v) = s.parse::<bool>() {
            Ok(Value::Boolean(v))
        } else {
            Ok(Value::Text(s.to_string()))
        }
    });
    parser.parse(input)
}

/// Comma separated values on one line; an empty list is allowed.
fn parse_value_list(input: &str) -> IResult<&str, Vec<Value>> {
    let (input, _) = space0(input)?;
    let comma = delimited(space0, tag(","), space0);
    let mut parser = separated_list0(comma, parse_value);
    parser.parse(input)
}

fn parse_entry(input: &str) -> IResult<&str, (String, Vec<Value>)> {
    let colon = delimited(space0, tag(":"), space0);
    let mut parser = separated_pair(parse_identifier, colon, parse_value_list);
    parser.parse(input)
}

fn parse_section(input: &str) -> IResult<&str, (String, Section)> {
    let (input, _) = multispace0(input)?;
    let (input, title) = parse_identifier(input)?;
    let (input, _) = multispace0(input)?;
    let mut entries = many1(terminated(parse_entry, multispace0));
    let (input, pairs) = entries.parse(input)?;
    Ok((input, (title, pairs.into_iter().collect())))
}

fn strip_comments(input: &str) -> String {
    input
        .lines()
        .filter(|line| {
            let trimmed = line.trim();
            !(trimmed.starts_with("//")
                || trimmed.starts_with('#')
                || trimmed.starts_with('%')
                || trimmed.starts_with(';'))
        })
        .collect::<Vec<&str>>()
        .join("\n")
}

/// Parses a whole document into its section map. Sections with the same title are merged.
pub fn parse_document(input: &str) -> Result<Document, ConfigError> {
    let cleaned = strip_comments(input);
    if cleaned.trim().is_empty() {
        return Ok(Document::new());
    }
    let mut parser = many1(parse_section);
    let (remaining, sections) = parser
        .parse(cleaned.as_str())
        .map_err(|e| ConfigError::Parse(format!("{:?}", e)))?;
    if !remaining.trim().is_empty() {
        return Err(ConfigError::Parse(format!(
            "unexpected text: '{}'",
            remaining.trim()
        )));
    }
    let mut document = Document::new();
    for (title, section) in sections {
        document.entry(title).or_default().extend(section);
    }
    Ok(document)
}

////////////////////////////////////CONFIG///////////////////////////////////////////

/// Typed configuration of the calculator core.
#[derive(Debug, Clone, PartialEq)]
pub struct CalcConfig {
    pub allow_loops: bool,
    pub allow_random: bool,
    /// scratch buffers kept by a controller
    pub scratch_pool: usize,
    pub sleep_poll_ms: u64,
    pub log_level: LevelFilter,
    pub log_file: Option<PathBuf>,
}

impl Default for CalcConfig {
    fn default() -> Self {
        CalcConfig {
            allow_loops: false,
            allow_random: false,
            scratch_pool: DEFAULT_POOL_CAPACITY,
            sleep_poll_ms: DEFAULT_SLEEP_POLL.as_millis() as u64,
            log_level: LevelFilter::Info,
            log_file: None,
        }
    }
}

fn invalid(key: &str, found: &Value) -> ConfigError {
    ConfigError::InvalidValue {
        key: key.to_string(),
        found: found.to_string(),
    }
}

/// The single value of `section.key`, `None` when the key is absent.
fn single<'d>(doc: &'d Document, section: &str, key: &str) -> Result<Option<&'d Value>, ConfigError> {
    let Some(values) = doc.get(section).and_then(|s| s.get(key)) else {
        return Ok(None);
    };
    match values.as_slice() {
        [value] => Ok(Some(value)),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            found: values.iter().map(Value::to_string).collect::<Vec<_>>().join(", "),
        }),
    }
}

fn read_bool(doc: &Document, section: &str, key: &str, target: &mut bool) -> Result<(), ConfigError> {
    match single(doc, section, key)? {
        None => Ok(()),
        Some(Value::Boolean(b)) => {
            *target = *b;
            Ok(())
        }
        Some(other) => Err(invalid(key, other)),
    }
}

fn read_count<T: TryFrom<i64>>(
    doc: &Document,
    section: &str,
    key: &str,
    target: &mut T,
) -> Result<(), ConfigError> {
    match single(doc, section, key)? {
        None => Ok(()),
        Some(value) => match value {
            Value::Integer(v) => {
                *target = T::try_from(*v).map_err(|_| invalid(key, value))?;
                Ok(())
            }
            _ => Err(invalid(key, value)),
        },
    }
}

impl FromStr for CalcConfig {
    type Err = ConfigError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let doc = parse_document(input)?;
        let mut config = CalcConfig::default();
        read_bool(&doc, "controller", "allow_loops", &mut config.allow_loops)?;
        read_bool(&doc, "controller", "allow_random", &mut config.allow_random)?;
        read_count(&doc, "controller", "scratch_pool", &mut config.scratch_pool)?;
        read_count(&doc, "controller", "sleep_poll_ms", &mut config.sleep_poll_ms)?;
        if let Some(value) = single(&doc, "logging", "level")? {
            config.log_level =
                LevelFilter::from_str(&value.to_string()).map_err(|_| invalid("level", value))?;
        }
        if let Some(value) = single(&doc, "logging", "file")? {
            config.log_file = Some(PathBuf::from(value.to_string()));
        }
        Ok(config)
    }
}

impl CalcConfig {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        CalcConfig::from_str(&text)
    }

    /// Installs the logger of the `logging` section, see [`logger::init_logger`].
    pub fn init_logger(&self) -> bool {
        logger::init_logger(self.log_level, self.log_file.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_identifier() {
        let (rest, name) = parse_identifier("allow_loops: true").unwrap();
        assert_eq!(name, "allow_loops");
        assert_eq!(rest, ": true");
        assert!(parse_identifier("9lives").is_err());
    }

    #[test]
    fn test_parse_value_types() {
        assert_eq!(parse_value("12 x").unwrap().1, Value::Integer(12));
        assert_eq!(parse_value("0.5,").unwrap().1, Value::Float(0.5));
        assert_eq!(parse_value("false").unwrap().1, Value::Boolean(false));
        assert_eq!(
            parse_value("calc.log").unwrap().1,
            Value::Text("calc.log".to_string())
        );
    }

    #[test]
    fn test_parse_entry_stops_at_line_end() {
        let (rest, (key, values)) = parse_entry("pool: 1, 2\nnext: 3").unwrap();
        assert_eq!(key, "pool");
        assert_eq!(values, vec![Value::Integer(1), Value::Integer(2)]);
        assert_eq!(rest, "\nnext: 3");
        let (_, (_, empty)) = parse_entry("key:\nnext: 3").unwrap();
        assert!(empty.is_empty());
    }
}
