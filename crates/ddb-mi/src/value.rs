//! The GDB/MI value grammar: quoted C-strings, brace tuples (maps) and
//! bracket lists (ordered sequences), plus the small recursive-descent
//! parser that turns a comma-separated result tail into an [`IndexMap`].
//!
//! Grounded in `bench/bench_gdbmiparser.py`'s regex-driven value grammar,
//! re-expressed as a hand-written parser over a peekable `Chars` iterator
//! (the grammar is small enough that pulling in a parser-combinator crate
//! the teacher workspace doesn't otherwise use would be overkill).

use std::iter::Peekable;
use std::str::Chars;

use indexmap::IndexMap;

use crate::error::{MiParseError, MiParseResult};

/// A parsed GDB/MI value: a quoted string, an ordered list, or a tuple
/// (rendered as a map since tuple keys are always distinct in practice,
/// except for repeated-key lists such as `stack=[frame={...},frame={...}]`
/// which parse as a [`MiValue::List`] of single-key maps).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MiValue {
    /// A C-string value with escapes already decoded.
    String(String),
    /// A bracketed, ordered sequence (`[..]`).
    List(Vec<MiValue>),
    /// A braced tuple (`{..}`), or a flat key=value result list.
    Map(IndexMap<String, MiValue>),
}

impl MiValue {
    /// Returns the inner string if this value is a [`MiValue::String`].
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the inner map if this value is a [`MiValue::Map`].
    #[must_use]
    pub fn as_map(&self) -> Option<&IndexMap<String, MiValue>> {
        match self {
            Self::Map(m) => Some(m),
            _ => None,
        }
    }

    /// Returns the inner list if this value is a [`MiValue::List`].
    #[must_use]
    pub fn as_list(&self) -> Option<&[MiValue]> {
        match self {
            Self::List(l) => Some(l),
            _ => None,
        }
    }
}

/// Parses the comma-separated `var=value` tail of a result/async record
/// (the text following the message identifier) into an ordered map.
pub fn parse_result_list(input: &str) -> MiParseResult<IndexMap<String, MiValue>> {
    let mut chars = input.chars().peekable();
    let mut map = IndexMap::new();
    skip_ws(&mut chars);
    if chars.peek().is_none() {
        return Ok(map);
    }
    loop {
        skip_ws(&mut chars);
        let (key, value) = parse_result(&mut chars)?;
        map.insert(key, value);
        skip_ws(&mut chars);
        match chars.peek() {
            Some(',') => {
                chars.next();
            }
            None => break,
            Some(other) => return Err(MiParseError::UnexpectedChar(*other)),
        }
    }
    Ok(map)
}

fn parse_result(chars: &mut Peekable<Chars<'_>>) -> MiParseResult<(String, MiValue)> {
    let key = parse_variable(chars)?;
    skip_ws(chars);
    match chars.next() {
        Some('=') => {}
        Some(other) => return Err(MiParseError::UnexpectedChar(other)),
        None => return Err(MiParseError::UnexpectedEof),
    }
    skip_ws(chars);
    let value = parse_value(chars)?;
    Ok((key, value))
}

fn parse_variable(chars: &mut Peekable<Chars<'_>>) -> MiParseResult<String> {
    let mut out = String::new();
    while let Some(&c) = chars.peek() {
        if c.is_alphanumeric() || c == '-' || c == '_' {
            out.push(c);
            chars.next();
        } else {
            break;
        }
    }
    if out.is_empty() {
        return Err(MiParseError::UnexpectedEof);
    }
    Ok(out)
}

fn parse_value(chars: &mut Peekable<Chars<'_>>) -> MiParseResult<MiValue> {
    match chars.peek() {
        Some('"') => parse_cstring(chars).map(MiValue::String),
        Some('{') => parse_tuple(chars),
        Some('[') => parse_list(chars),
        Some(other) => Err(MiParseError::UnexpectedChar(*other)),
        None => Err(MiParseError::UnexpectedEof),
    }
}

fn parse_cstring(chars: &mut Peekable<Chars<'_>>) -> MiParseResult<String> {
    match chars.next() {
        Some('"') => {}
        Some(other) => return Err(MiParseError::UnexpectedChar(other)),
        None => return Err(MiParseError::UnexpectedEof),
    }
    let mut out = String::new();
    loop {
        match chars.next() {
            Some('"') => return Ok(out),
            Some('\\') => match chars.next() {
                Some('n') => out.push('\n'),
                Some('t') => out.push('\t'),
                Some('r') => out.push('\r'),
                Some('"') => out.push('"'),
                Some('\\') => out.push('\\'),
                Some(other) => out.push(other),
                None => return Err(MiParseError::UnexpectedEof),
            },
            Some(c) => out.push(c),
            None => return Err(MiParseError::UnexpectedEof),
        }
    }
}

fn parse_tuple(chars: &mut Peekable<Chars<'_>>) -> MiParseResult<MiValue> {
    match chars.next() {
        Some('{') => {}
        Some(other) => return Err(MiParseError::UnexpectedChar(other)),
        None => return Err(MiParseError::UnexpectedEof),
    }
    let mut map = IndexMap::new();
    skip_ws(chars);
    if chars.peek() == Some(&'}') {
        chars.next();
        return Ok(MiValue::Map(map));
    }
    loop {
        skip_ws(chars);
        let (key, value) = parse_result(chars)?;
        map.insert(key, value);
        skip_ws(chars);
        match chars.next() {
            Some(',') => continue,
            Some('}') => break,
            Some(other) => return Err(MiParseError::UnexpectedChar(other)),
            None => return Err(MiParseError::UnexpectedEof),
        }
    }
    Ok(MiValue::Map(map))
}

fn parse_list(chars: &mut Peekable<Chars<'_>>) -> MiParseResult<MiValue> {
    match chars.next() {
        Some('[') => {}
        Some(other) => return Err(MiParseError::UnexpectedChar(other)),
        None => return Err(MiParseError::UnexpectedEof),
    }
    let mut items = Vec::new();
    skip_ws(chars);
    if chars.peek() == Some(&']') {
        chars.next();
        return Ok(MiValue::List(items));
    }
    loop {
        skip_ws(chars);
        let item = parse_list_item(chars)?;
        items.push(item);
        skip_ws(chars);
        match chars.next() {
            Some(',') => continue,
            Some(']') => break,
            Some(other) => return Err(MiParseError::UnexpectedChar(other)),
            None => return Err(MiParseError::UnexpectedEof),
        }
    }
    Ok(MiValue::List(items))
}

/// A list item is either a bare value or a `key=value` result (the latter
/// shows up in lists like `stack=[frame={...},frame={...}]`).
fn parse_list_item(chars: &mut Peekable<Chars<'_>>) -> MiParseResult<MiValue> {
    match chars.peek() {
        Some('"') | Some('{') | Some('[') => parse_value(chars),
        Some(c) if c.is_alphanumeric() || *c == '-' || *c == '_' => {
            let (key, value) = parse_result(chars)?;
            let mut map = IndexMap::new();
            map.insert(key, value);
            Ok(MiValue::Map(map))
        }
        Some(other) => Err(MiParseError::UnexpectedChar(*other)),
        None => Err(MiParseError::UnexpectedEof),
    }
}

fn skip_ws(chars: &mut Peekable<Chars<'_>>) {
    while matches!(chars.peek(), Some(' ')) {
        chars.next();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_flat_result_list() {
        let map = parse_result_list(r#"id="1",group-id="i1""#).unwrap();
        assert_eq!(map["id"], MiValue::String("1".into()));
        assert_eq!(map["group-id"], MiValue::String("i1".into()));
    }

    #[test]
    fn parses_nested_tuple() {
        let map = parse_result_list(r#"bkpt={number="1",type="breakpoint"}"#).unwrap();
        let bkpt = map["bkpt"].as_map().unwrap();
        assert_eq!(bkpt["number"], MiValue::String("1".into()));
    }

    #[test]
    fn parses_frame_list_with_repeated_keys() {
        let map =
            parse_result_list(r#"stack=[frame={level="0"},frame={level="1"}]"#).unwrap();
        let stack = map["stack"].as_list().unwrap();
        assert_eq!(stack.len(), 2);
        assert_eq!(
            stack[0].as_map().unwrap()["level"],
            MiValue::String("0".into())
        );
    }

    #[test]
    fn parses_escaped_string() {
        let map = parse_result_list(r#"msg="line one\nline two""#).unwrap();
        assert_eq!(map["msg"], MiValue::String("line one\nline two".into()));
    }

    #[test]
    fn empty_tail_is_empty_map() {
        let map = parse_result_list("").unwrap();
        assert!(map.is_empty());
    }
}
