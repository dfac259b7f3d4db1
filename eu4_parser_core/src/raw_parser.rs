//! Recursive-descent parser for the brace-delimited save format.
//!
//! The format gives no syntactic hint whether `{ ... }` is a dict or an
//! array; that is decided by content. Parsing therefore commits to a dict
//! first and falls back to an array from the saved stream position. Failures
//! are reported as `None` all the way up; callers decide which positions are
//! required.

use std::collections::HashMap;

use crate::eu4_date::EU4Date;
use crate::stream::ByteStream;

#[derive(Debug, Clone, PartialEq)]
pub enum EU4Scalar {
    Int(i64),
    Float(f64),
    Date(EU4Date),
    Bool(bool),
    Str(String),
}

impl EU4Scalar {
    /// Classifies one raw token. Order matters: dates beat floats (`1444.11.11`
    /// has dots), quoting beats the `yes`/`no` keywords, and anything
    /// unrecognised falls back to a bare string.
    pub fn parse(token: &str) -> EU4Scalar {
        let token = token.trim();

        // dates may be quoted; two dots and three integer parts
        if token.matches('.').count() == 2 {
            if let Ok(date) = token.trim_matches('"').parse::<EU4Date>() {
                return EU4Scalar::Date(date);
            }
        }

        if let Some(quoted) = token.strip_prefix('"').and_then(|s| s.strip_suffix('"')) {
            return EU4Scalar::Str(quoted.to_string());
        }

        match token {
            "yes" => return EU4Scalar::Bool(true),
            "no" => return EU4Scalar::Bool(false),
            _ => {}
        }

        if token.contains('.') {
            if let Ok(float) = token.parse::<f64>() {
                return EU4Scalar::Float(float);
            }
        } else if let Ok(int) = token.parse::<i64>() {
            return EU4Scalar::Int(int);
        }

        return EU4Scalar::Str(token.to_string());
    }

    pub fn as_int(&self) -> Option<i64> {
        if let EU4Scalar::Int(int) = self {
            return Some(*int);
        }
        return None;
    }

    pub fn as_float(&self) -> Option<f64> {
        return match self {
            EU4Scalar::Float(float) => Some(*float),
            EU4Scalar::Int(int) => Some(*int as f64),
            _ => None,
        };
    }

    pub fn as_date(&self) -> Option<EU4Date> {
        if let EU4Scalar::Date(date) = self {
            return Some(*date);
        }
        return None;
    }

    pub fn as_bool(&self) -> Option<bool> {
        if let EU4Scalar::Bool(value) = self {
            return Some(*value);
        }
        return None;
    }

    pub fn as_str(&self) -> Option<&str> {
        if let EU4Scalar::Str(text) = self {
            return Some(text);
        }
        return None;
    }
}

/// An insertion-ordered map with the duplicate-key merge rules the game's
/// writer forces on us. Lookup goes through a side index so repeated keys in
/// multi-thousand-entry save sections stay cheap.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObjectMap {
    entries: Vec<(String, EU4Value)>,
    index: HashMap<String, usize>,
}

impl ObjectMap {
    pub fn new() -> ObjectMap {
        return ObjectMap::default();
    }

    pub fn len(&self) -> usize {
        return self.entries.len();
    }

    pub fn is_empty(&self) -> bool {
        return self.entries.is_empty();
    }

    pub fn get(&self, key: &str) -> Option<&EU4Value> {
        return self.index.get(key).map(|at| &self.entries[*at].1);
    }

    pub fn get_object(&self, key: &str) -> Option<&ObjectMap> {
        return self.get(key)?.as_object();
    }

    pub fn get_array(&self, key: &str) -> Option<&[EU4Value]> {
        return self.get(key)?.as_array();
    }

    pub fn get_scalar(&self, key: &str) -> Option<&EU4Scalar> {
        return self.get(key)?.as_scalar();
    }

    pub fn get_int(&self, key: &str) -> Option<i64> {
        return self.get_scalar(key)?.as_int();
    }

    pub fn get_date(&self, key: &str) -> Option<EU4Date> {
        return self.get_scalar(key)?.as_date();
    }

    pub fn get_string(&self, key: &str) -> Option<&str> {
        return self.get_scalar(key)?.as_str();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &EU4Value)> {
        return self.entries.iter().map(|(k, v)| (k.as_str(), v));
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        return self.entries.iter().map(|(k, _)| k.as_str());
    }

    /// Inserts a key, applying the merge rules when it already exists:
    /// two maps merge with the *existing* side winning shared keys, two
    /// lists concatenate, an existing list absorbs the newcomer, and
    /// anything else collapses into a two-element list.
    pub fn insert_merged(&mut self, key: String, value: EU4Value) {
        let Some(&at) = self.index.get(&key) else {
            self.index.insert(key.clone(), self.entries.len());
            self.entries.push((key, value));
            return;
        };

        let existing = std::mem::replace(&mut self.entries[at].1, EU4Value::None);
        self.entries[at].1 = match (existing, value) {
            (EU4Value::Object(first), EU4Value::Object(second)) => {
                EU4Value::Object(ObjectMap::merge_keep_existing(first, second))
            }
            (EU4Value::Array(mut first), EU4Value::Array(second)) => {
                first.extend(second);
                EU4Value::Array(first)
            }
            (EU4Value::Array(mut first), second) => {
                first.push(second);
                EU4Value::Array(first)
            }
            (first, second) => EU4Value::Array(vec![first, second]),
        };
    }

    /// Shallow merge: shared keys keep the value (and position) from the
    /// first occurrence; keys only the newcomer has are appended in order.
    fn merge_keep_existing(existing: ObjectMap, newcomer: ObjectMap) -> ObjectMap {
        let mut out = existing;
        for (key, value) in newcomer.entries {
            if !out.index.contains_key(&key) {
                out.index.insert(key.clone(), out.entries.len());
                out.entries.push((key, value));
            }
        }
        return out;
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EU4Value {
    Scalar(EU4Scalar),
    Object(ObjectMap),
    Array(Vec<EU4Value>),
    /// An empty or unparseable sub-block. Kept in place rather than dropped:
    /// callers tell "key absent" apart from "key present with empty object".
    None,
}

impl From<EU4Scalar> for EU4Value {
    #[inline]
    fn from(value: EU4Scalar) -> Self {
        return EU4Value::Scalar(value);
    }
}

impl EU4Value {
    pub fn as_scalar(&self) -> Option<&EU4Scalar> {
        if let EU4Value::Scalar(scalar) = self {
            return Some(scalar);
        }
        return None;
    }

    pub fn as_object(&self) -> Option<&ObjectMap> {
        if let EU4Value::Object(object) = self {
            return Some(object);
        }
        return None;
    }

    pub fn as_array(&self) -> Option<&[EU4Value]> {
        if let EU4Value::Array(items) = self {
            return Some(items);
        }
        return None;
    }

    pub fn is_none(&self) -> bool {
        return matches!(self, EU4Value::None);
    }
}

/// Keys arrive with their surrounding whitespace (whitespace is not a key
/// terminator) and occasionally quoted.
fn clean_key(raw: &str) -> &str {
    let key = raw.trim();
    return key
        .strip_prefix('"')
        .and_then(|k| k.strip_suffix('"'))
        .unwrap_or(key);
}

/// Parses one `{ ... }` body (or a whole file when `allow_eof`). Tries a
/// dict first; if that fails, rewinds and retries the same bytes as an
/// array. `None` means neither worked.
pub fn parse_object(stream: &mut ByteStream, allow_eof: bool) -> Option<EU4Value> {
    let pos = stream.tell();
    if let Some(map) = parse_object_dict(stream, allow_eof) {
        return Some(EU4Value::Object(map));
    }

    stream.seek(pos);
    return parse_object_array(stream).map(EU4Value::Array);
}

fn parse_object_dict(stream: &mut ByteStream, allow_eof: bool) -> Option<ObjectMap> {
    let mut map = ObjectMap::new();

    loop {
        let (raw_key, terminator) = stream.read_key();
        let key = clean_key(raw_key);

        match terminator {
            // a well-formed object terminates with nothing pending in the key
            None => {
                if !allow_eof || !key.is_empty() {
                    return None;
                }
                break;
            }
            Some(b'}') => {
                if !key.is_empty() {
                    return None;
                }
                break;
            }
            // stray blocks sit at key position in real saves; consume and drop
            Some(b'{') => {
                parse_object(stream, true);
                continue;
            }
            Some(b'=') => {
                let (raw_value, value_terminator) = stream.read_value();
                let token = raw_value.trim();

                match value_terminator {
                    // a nested object can never legally run into EOF
                    Some(b'{') => {
                        let child = parse_object(stream, false).unwrap_or(EU4Value::None);
                        map.insert_merged(key.to_string(), child);
                    }
                    Some(b'\n') => {
                        map.insert_merged(key.to_string(), EU4Scalar::parse(token).into());
                    }
                    Some(b'}') => {
                        if token.is_empty() {
                            return None;
                        }
                        map.insert_merged(key.to_string(), EU4Scalar::parse(token).into());
                        break;
                    }
                    None => {
                        if !allow_eof || token.is_empty() {
                            return None;
                        }
                        map.insert_merged(key.to_string(), EU4Scalar::parse(token).into());
                        break;
                    }
                    Some(_) => return None,
                }
            }
            Some(_) => return None,
        }
    }

    // no keys at all means this was not a dict (maybe an array, maybe junk)
    if map.is_empty() {
        return None;
    }
    return Some(map);
}

fn is_quoted_line(line: &str) -> bool {
    return line.len() >= 2
        && line.starts_with('"')
        && line.ends_with('"')
        && line.matches('"').count() == 2;
}

fn parse_object_array(stream: &mut ByteStream) -> Option<Vec<EU4Value>> {
    let (body, terminator) = stream.read_array_body();

    // arrays never occur at file scope, and a `=` means this was a dict
    if terminator != Some(b'}') {
        return None;
    }
    if body.trim().is_empty() {
        return None;
    }

    // one fully-quoted string per line, or whitespace-separated tokens
    let lines = body
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect::<Vec<&str>>();
    if lines.iter().all(|line| is_quoted_line(line)) {
        return Some(
            lines
                .into_iter()
                .map(|line| EU4Scalar::parse(line).into())
                .collect(),
        );
    }

    return Some(
        body.split_whitespace()
            .map(|token| EU4Scalar::parse(token).into())
            .collect(),
    );
}

/// Parses a whole headerless file (country files, province histories,
/// `default.map`).
pub fn parse_text(text: &str) -> Option<EU4Value> {
    let mut stream = ByteStream::new(text);
    return parse_object(&mut stream, true);
}

/// Parses a save body: the first line is an ASCII header (`EU4txt...`) and
/// is discarded before the top-level dict.
pub fn parse_save_text(text: &str) -> Option<EU4Value> {
    let body = text.split_once('\n').map(|(_, rest)| rest)?;
    return parse_text(body);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::eu4_date::Month;

    fn int(value: i64) -> EU4Value {
        return EU4Value::Scalar(EU4Scalar::Int(value));
    }

    fn string(value: &str) -> EU4Value {
        return EU4Value::Scalar(EU4Scalar::Str(value.to_string()));
    }

    fn parse_map(text: &str) -> ObjectMap {
        let EU4Value::Object(map) = parse_text(text).expect("parse failed") else {
            panic!("expected a dict from {:?}", text);
        };
        return map;
    }

    #[test]
    fn test_scalar_coercion() {
        assert_eq!(EU4Scalar::parse("0"), EU4Scalar::Int(0));
        assert_eq!(EU4Scalar::parse("-1"), EU4Scalar::Int(-1));
        assert_eq!(EU4Scalar::parse("12352"), EU4Scalar::Int(12352));
        assert_eq!(EU4Scalar::parse("0.1"), EU4Scalar::Float(0.1));
        assert_eq!(EU4Scalar::parse("-9.1"), EU4Scalar::Float(-9.1));
        assert_eq!(EU4Scalar::parse("yes"), EU4Scalar::Bool(true));
        assert_eq!(EU4Scalar::parse("no"), EU4Scalar::Bool(false));
        assert_eq!(EU4Scalar::parse("hi"), EU4Scalar::Str("hi".to_string()));
        assert_eq!(EU4Scalar::parse("\"hi\""), EU4Scalar::Str("hi".to_string()));
        assert_eq!(
            EU4Scalar::parse("1444.1.1"),
            EU4Scalar::Date(EU4Date::new(1444, Month::JAN, 1).unwrap())
        );
        assert_eq!(
            EU4Scalar::parse("\"1444.1.1\""),
            EU4Scalar::Date(EU4Date::new(1444, Month::JAN, 1).unwrap())
        );
    }

    #[test]
    fn test_scalar_coercion_near_misses() {
        // failed dates fall through to strings, quoted yes stays a string
        assert_eq!(
            EU4Scalar::parse("1444.0.11"),
            EU4Scalar::Str("1444.0.11".to_string())
        );
        assert_eq!(
            EU4Scalar::parse("1.2.3.4"),
            EU4Scalar::Str("1.2.3.4".to_string())
        );
        assert_eq!(EU4Scalar::parse("--91"), EU4Scalar::Str("--91".to_string()));
        assert_eq!(EU4Scalar::parse("\"yes\""), EU4Scalar::Str("yes".to_string()));
        assert_eq!(
            EU4Scalar::parse("1444.11.11.11"),
            EU4Scalar::Str("1444.11.11.11".to_string())
        );
    }

    #[test]
    fn test_single_key_value() {
        let map = parse_map("key=value\n");
        assert_eq!(map.len(), 1);
        assert_eq!(map.get("key"), Some(&string("value")));
    }

    #[test]
    fn test_key_absent_vs_empty_object() {
        let map = parse_map("a={}\n");
        assert_eq!(map.get("a"), Some(&EU4Value::None));
        assert_eq!(map.get("b"), None);
    }

    #[test]
    fn test_whitespace_insensitivity() {
        let plain = parse_map("k=1\nj={1 2}\n");
        let spaced = parse_map("k  =  1\nj  =  {  1  2  }\n");
        let broken = parse_map("k =\n1\nj =\n{\n1 2\n}\n");
        assert_eq!(plain, spaced);
        assert_eq!(plain, broken);
    }

    #[test]
    fn test_crlf_line_endings() {
        let map = parse_map("k=1\r\nj=hello\r\n");
        assert_eq!(map.get("k"), Some(&int(1)));
        assert_eq!(map.get("j"), Some(&string("hello")));
    }

    #[test]
    fn test_dict_vs_array_disambiguation() {
        let map = parse_map("k={1 2 3}\n");
        assert_eq!(
            map.get("k"),
            Some(&EU4Value::Array(vec![int(1), int(2), int(3)]))
        );

        let map = parse_map("k={x=1 y=2}\n");
        let inner = map.get_object("k").unwrap();
        assert_eq!(inner.get("x"), Some(&int(1)));
        assert_eq!(inner.get("y"), Some(&int(2)));

        let map = parse_map("k={ a b c d }\n");
        assert_eq!(map.get_array("k").unwrap().len(), 4);
    }

    #[test]
    fn test_string_arrays() {
        let map = parse_map("k={\n\"Multiple Word String\"\n\"Another String\"\n}\n");
        assert_eq!(
            map.get("k"),
            Some(&EU4Value::Array(vec![
                string("Multiple Word String"),
                string("Another String"),
            ]))
        );

        // two quoted strings on one line split on whitespace
        let map = parse_map("k={ \"x\" \"y\" }\n");
        assert_eq!(
            map.get("k"),
            Some(&EU4Value::Array(vec![string("x"), string("y")]))
        );
    }

    #[test]
    fn test_repeated_scalar_keys_build_a_list() {
        let map = parse_map("a=1\na=2\na=3\n");
        assert_eq!(
            map.get("a"),
            Some(&EU4Value::Array(vec![int(1), int(2), int(3)]))
        );
    }

    #[test]
    fn test_repeated_keys_with_dict_values_merge() {
        let map = parse_map("k={a=1}\nk={b=2}\n");
        let inner = map.get_object("k").unwrap();
        assert_eq!(inner.len(), 2);
        assert_eq!(inner.get("a"), Some(&int(1)));
        assert_eq!(inner.get("b"), Some(&int(2)));
    }

    #[test]
    fn test_repeated_keys_with_dict_values_with_repeated_keys_take_first() {
        let map = parse_map("k={a=1}\nk={a=2}\n");
        let inner = map.get_object("k").unwrap();
        assert_eq!(inner.len(), 1);
        assert_eq!(inner.get("a"), Some(&int(1)));
    }

    #[test]
    fn test_repeated_keys_with_list_values_concatenate() {
        let map = parse_map("a={1 2}\na={3 4}\n");
        assert_eq!(
            map.get("a"),
            Some(&EU4Value::Array(vec![int(1), int(2), int(3), int(4)]))
        );
    }

    #[test]
    fn test_repeated_keys_mixed_values_collapse_to_list() {
        let map = parse_map("a={1 2}\na=5\n");
        assert_eq!(
            map.get("a"),
            Some(&EU4Value::Array(vec![int(1), int(2), int(5)]))
        );

        let map = parse_map("a=1\na={x=2}\n");
        let EU4Value::Array(items) = map.get("a").unwrap() else {
            panic!("expected list");
        };
        assert_eq!(items.len(), 2);
        assert_eq!(items[0], int(1));
        assert!(items[1].as_object().is_some());
    }

    #[test]
    fn test_extraneous_empty_objects_are_skipped() {
        let map = parse_map("a=1\n{ }\nb=2\n");
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("a"), Some(&int(1)));
        assert_eq!(map.get("b"), Some(&int(2)));
    }

    #[test]
    fn test_nested_objects() {
        let map = parse_map("outer={\ninner={\nk=1\n}\nlist={ 5 6 }\n}\n");
        let outer = map.get_object("outer").unwrap();
        let inner = outer.get_object("inner").unwrap();
        assert_eq!(inner.get("k"), Some(&int(1)));
        assert_eq!(
            outer.get("list"),
            Some(&EU4Value::Array(vec![int(5), int(6)]))
        );
    }

    #[test]
    fn test_date_keys_survive_as_strings() {
        let map = parse_map("history={\n1500.1.1={\nowner=BBB\n}\n}\n");
        let history = map.get_object("history").unwrap();
        let event = history.get_object("1500.1.1").unwrap();
        assert_eq!(event.get_string("owner"), Some("BBB"));
    }

    #[test]
    fn test_unterminated_nested_object_fails() {
        assert_eq!(parse_text("a={\nb=1\n"), None);
    }

    #[test]
    fn test_array_at_file_scope_fails() {
        assert_eq!(parse_text("1 2 3"), None);
        assert_eq!(parse_text("   \n  "), None);
    }

    #[test]
    fn test_save_header_is_discarded() {
        let save = parse_save_text("EU4txt\ndate=1500.1.1\n").unwrap();
        let map = save.as_object().unwrap();
        assert_eq!(
            map.get_date("date"),
            EU4Date::new(1500, Month::JAN, 1)
        );
    }

    #[test]
    fn test_quoted_values_with_structure_chars() {
        // value reading stops at newline, so quoted text keeps its spaces
        let map = parse_map("name=\"Duchy of Milan\"\n");
        assert_eq!(map.get_string("name"), Some("Duchy of Milan"));
    }

    #[test]
    fn test_negative_province_keys() {
        let map = parse_map("provinces={\n-1={\nowner=AAA\n}\n-2={\nowner=BBB\n}\n}\n");
        let provinces = map.get_object("provinces").unwrap();
        let keys = provinces.keys().collect::<Vec<&str>>();
        assert_eq!(keys, vec!["-1", "-2"]);
    }
}
