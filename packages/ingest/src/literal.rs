//! Parser for the dict-like `location` cells found in Socrata CSV exports.
//!
//! When a Socrata JSON payload is flattened to CSV, nested objects are written
//! as Python literal reprs, e.g.
//! `{'latitude': '41.87', 'longitude': '-87.62', 'human_address': '{...}'}`.
//! This module parses that literal grammar (which is a superset of JSON
//! objects) into a small value tree.

use std::collections::BTreeMap;

/// Deepest list/dict nesting accepted before parsing gives up.
pub const MAX_DEPTH: usize = 64;

/// A parsed literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum LiteralValue {
    /// Quoted string.
    Str(String),
    /// Integer or float.
    Num(f64),
    /// `True`/`False` (or JSON `true`/`false`).
    Bool(bool),
    /// `None` (or JSON `null`).
    Null,
    /// List or tuple.
    List(Vec<Self>),
    /// Dictionary with string keys.
    Dict(BTreeMap<String, Self>),
}

impl LiteralValue {
    /// Interprets the value as a float the way Python's `float()` would for
    /// strings and numbers. Everything else is `None`.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Num(n) => Some(*n),
            Self::Str(s) => s.trim().parse::<f64>().ok(),
            _ => None,
        }
    }

    /// Looks up a key when this value is a dictionary.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&Self> {
        match self {
            Self::Dict(map) => map.get(key),
            _ => None,
        }
    }
}

/// Errors raised while parsing a literal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LiteralError {
    /// Input ended in the middle of a value.
    #[error("unexpected end of input")]
    UnexpectedEnd,

    /// A character that cannot start or continue a value at this position.
    #[error("unexpected character {found:?} at offset {offset}")]
    UnexpectedChar {
        /// The offending character.
        found: char,
        /// Byte offset into the input.
        offset: usize,
    },

    /// A dictionary key that is not a string.
    #[error("dictionary key at offset {offset} is not a string")]
    NonStringKey {
        /// Byte offset into the input.
        offset: usize,
    },

    /// Lists and dicts nested deeper than [`MAX_DEPTH`].
    #[error("nesting deeper than {MAX_DEPTH} at offset {offset}")]
    TooDeep {
        /// Byte offset of the container that crossed the limit.
        offset: usize,
    },

    /// Extra characters after the top-level value.
    #[error("trailing characters at offset {offset}")]
    Trailing {
        /// Byte offset into the input.
        offset: usize,
    },
}

/// Parses a complete literal string.
///
/// # Errors
///
/// Returns [`LiteralError`] if the input is not a single well-formed literal.
pub fn parse_literal(input: &str) -> Result<LiteralValue, LiteralError> {
    let mut parser = Parser {
        input,
        pos: 0,
        depth: 0,
    };
    let value = parser.value()?;
    parser.skip_ws();
    if parser.pos < input.len() {
        return Err(LiteralError::Trailing { offset: parser.pos });
    }
    Ok(value)
}

struct Parser<'a> {
    input: &'a str,
    pos: usize,
    depth: usize,
}

impl Parser<'_> {
    fn peek(&self) -> Option<char> {
        self.input[self.pos..].chars().next()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn skip_ws(&mut self) {
        while let Some(c) = self.peek() {
            if !c.is_whitespace() {
                break;
            }
            self.pos += c.len_utf8();
        }
    }

    fn expect(&mut self, want: char) -> Result<(), LiteralError> {
        self.skip_ws();
        match self.bump() {
            Some(c) if c == want => Ok(()),
            Some(c) => Err(LiteralError::UnexpectedChar {
                found: c,
                offset: self.pos - c.len_utf8(),
            }),
            None => Err(LiteralError::UnexpectedEnd),
        }
    }

    fn value(&mut self) -> Result<LiteralValue, LiteralError> {
        self.skip_ws();
        match self.peek() {
            None => Err(LiteralError::UnexpectedEnd),
            Some('{') => self.nested(Self::dict),
            Some('[' | '(') => self.nested(Self::list),
            Some('\'' | '"') => self.string().map(LiteralValue::Str),
            Some(c) if c == '-' || c == '+' || c == '.' || c.is_ascii_digit() => self.number(),
            Some(c) if c.is_ascii_alphabetic() => self.keyword(),
            Some(c) => Err(LiteralError::UnexpectedChar {
                found: c,
                offset: self.pos,
            }),
        }
    }

    fn nested(
        &mut self,
        parse: fn(&mut Self) -> Result<LiteralValue, LiteralError>,
    ) -> Result<LiteralValue, LiteralError> {
        if self.depth >= MAX_DEPTH {
            return Err(LiteralError::TooDeep { offset: self.pos });
        }
        self.depth += 1;
        let value = parse(self);
        self.depth -= 1;
        value
    }

    fn dict(&mut self) -> Result<LiteralValue, LiteralError> {
        self.expect('{')?;
        let mut map = BTreeMap::new();
        loop {
            self.skip_ws();
            if self.peek() == Some('}') {
                self.bump();
                return Ok(LiteralValue::Dict(map));
            }
            let key_offset = self.pos;
            let LiteralValue::Str(key) = self.value()? else {
                return Err(LiteralError::NonStringKey { offset: key_offset });
            };
            self.expect(':')?;
            let value = self.value()?;
            map.insert(key, value);

            self.skip_ws();
            match self.bump() {
                Some(',') => {}
                Some('}') => return Ok(LiteralValue::Dict(map)),
                Some(c) => {
                    return Err(LiteralError::UnexpectedChar {
                        found: c,
                        offset: self.pos - c.len_utf8(),
                    });
                }
                None => return Err(LiteralError::UnexpectedEnd),
            }
        }
    }

    fn list(&mut self) -> Result<LiteralValue, LiteralError> {
        let close = match self.bump() {
            Some('(') => ')',
            _ => ']',
        };
        let mut items = Vec::new();
        loop {
            self.skip_ws();
            if self.peek() == Some(close) {
                self.bump();
                return Ok(LiteralValue::List(items));
            }
            items.push(self.value()?);

            self.skip_ws();
            match self.bump() {
                Some(',') => {}
                Some(c) if c == close => return Ok(LiteralValue::List(items)),
                Some(c) => {
                    return Err(LiteralError::UnexpectedChar {
                        found: c,
                        offset: self.pos - c.len_utf8(),
                    });
                }
                None => return Err(LiteralError::UnexpectedEnd),
            }
        }
    }

    fn string(&mut self) -> Result<String, LiteralError> {
        let quote = self.bump().ok_or(LiteralError::UnexpectedEnd)?;
        let mut out = String::new();
        loop {
            match self.bump() {
                None => return Err(LiteralError::UnexpectedEnd),
                Some(c) if c == quote => return Ok(out),
                Some('\\') => match self.bump() {
                    None => return Err(LiteralError::UnexpectedEnd),
                    Some('n') => out.push('\n'),
                    Some('t') => out.push('\t'),
                    Some('r') => out.push('\r'),
                    Some(other) => out.push(other),
                },
                Some(c) => out.push(c),
            }
        }
    }

    fn number(&mut self) -> Result<LiteralValue, LiteralError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_digit() || matches!(c, '-' | '+' | '.' | 'e' | 'E') {
                self.pos += 1;
            } else {
                break;
            }
        }
        let text = &self.input[start..self.pos];
        text.parse::<f64>()
            .map(LiteralValue::Num)
            .map_err(|_| LiteralError::UnexpectedChar {
                found: text.chars().next().unwrap_or('?'),
                offset: start,
            })
    }

    fn keyword(&mut self) -> Result<LiteralValue, LiteralError> {
        let start = self.pos;
        while let Some(c) = self.peek() {
            if c.is_ascii_alphanumeric() || c == '_' {
                self.pos += 1;
            } else {
                break;
            }
        }
        match &self.input[start..self.pos] {
            "True" | "true" => Ok(LiteralValue::Bool(true)),
            "False" | "false" => Ok(LiteralValue::Bool(false)),
            "None" | "null" => Ok(LiteralValue::Null),
            "nan" | "NaN" => Ok(LiteralValue::Num(f64::NAN)),
            other => Err(LiteralError::UnexpectedChar {
                found: other.chars().next().unwrap_or('?'),
                offset: start,
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_python_dict_with_nested_json_string() {
        let value = parse_literal(
            "{'latitude': '41.87', 'longitude': '-87.62', \
             'human_address': '{\"address\": \"\", \"city\": \"\"}'}",
        )
        .unwrap();
        assert_eq!(value.get("latitude").and_then(LiteralValue::as_f64), Some(41.87));
        assert_eq!(value.get("longitude").and_then(LiteralValue::as_f64), Some(-87.62));
        assert!(matches!(value.get("human_address"), Some(LiteralValue::Str(_))));
    }

    #[test]
    fn parses_json_object_with_numbers() {
        let value = parse_literal(r#"{"latitude": 41.5, "longitude": -87.25, "ok": true}"#).unwrap();
        assert_eq!(value.get("latitude").and_then(LiteralValue::as_f64), Some(41.5));
        assert_eq!(value.get("ok"), Some(&LiteralValue::Bool(true)));
    }

    #[test]
    fn parses_lists_tuples_and_none() {
        let value = parse_literal("{'a': [1, 2], 'b': (None,), 'c': {}}").unwrap();
        assert_eq!(
            value.get("a"),
            Some(&LiteralValue::List(vec![
                LiteralValue::Num(1.0),
                LiteralValue::Num(2.0)
            ]))
        );
        assert_eq!(
            value.get("b"),
            Some(&LiteralValue::List(vec![LiteralValue::Null]))
        );
    }

    #[test]
    fn rejects_malformed_input() {
        assert!(parse_literal("").is_err());
        assert!(parse_literal("{'latitude': '41.8'").is_err());
        assert!(parse_literal("{latitude: 1}").is_err());
        assert!(parse_literal("{1: 'x'}").is_err());
        assert!(parse_literal("{'a': 1} extra").is_err());
        assert!(parse_literal("not a dict").is_err());
    }

    #[test]
    fn limits_nesting_depth() {
        let ok = format!("{}1{}", "[".repeat(MAX_DEPTH), "]".repeat(MAX_DEPTH));
        assert!(parse_literal(&ok).is_ok());

        let deep = format!("{}1{}", "[".repeat(MAX_DEPTH + 1), "]".repeat(MAX_DEPTH + 1));
        assert_eq!(
            parse_literal(&deep),
            Err(LiteralError::TooDeep { offset: MAX_DEPTH })
        );

        let unterminated = format!("{{'latitude': {}", "(".repeat(100_000));
        assert!(matches!(
            parse_literal(&unterminated),
            Err(LiteralError::TooDeep { .. })
        ));
    }

    #[test]
    fn non_numeric_strings_do_not_convert() {
        assert_eq!(LiteralValue::Str("abc".to_string()).as_f64(), None);
        assert_eq!(LiteralValue::Null.as_f64(), None);
        assert_eq!(LiteralValue::Str(" 1.5 ".to_string()).as_f64(), Some(1.5));
    }
}
