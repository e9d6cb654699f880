//! JSON-pointer paths and tree resolution.
//!
//! A [`Path`] is an ordered list of [`Token`]s. Its external form is an
//! RFC 6901 JSON pointer (`/PORT/Ethernet0/speed`), with `~` escaped as `~0`
//! and `/` escaped as `~1`. Resolution is literal: a token against an object
//! is always a key lookup (so `"1"` looks up the key `"1"`), while a token
//! against an array must parse as a non-negative index.

use crate::value::ConfigValue;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Broad class of a resolution failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveErrorKind {
    /// Missing object key.
    Key,
    /// Bad or out-of-range array index.
    Index,
    /// Descent into a scalar, or a malformed pointer.
    Type,
}

/// Errors raised while resolving or editing a tree by path.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("key '{key}' not found at '{at}'")]
    KeyNotFound { at: String, key: String },

    #[error("index {index} out of range at '{at}' (length {len})")]
    IndexOutOfRange { at: String, index: usize, len: usize },

    #[error("'{token}' is not a valid array index at '{at}'")]
    InvalidIndex { at: String, token: String },

    #[error("cannot resolve '{token}' under {kind} value at '{at}'")]
    NotAContainer {
        at: String,
        token: String,
        kind: &'static str,
    },

    #[error("invalid JSON pointer '{pointer}': {reason}")]
    InvalidPointer { pointer: String, reason: String },
}

impl ResolveError {
    pub fn kind(&self) -> ResolveErrorKind {
        match self {
            ResolveError::KeyNotFound { .. } => ResolveErrorKind::Key,
            ResolveError::IndexOutOfRange { .. } | ResolveError::InvalidIndex { .. } => {
                ResolveErrorKind::Index
            }
            ResolveError::NotAContainer { .. } | ResolveError::InvalidPointer { .. } => {
                ResolveErrorKind::Type
            }
        }
    }
}

/// A single path step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Token {
    Key(String),
    Index(usize),
}

impl Token {
    /// Token text as it appears in the pointer, unescaped.
    pub fn as_string(&self) -> String {
        match self {
            Token::Key(k) => k.clone(),
            Token::Index(i) => i.to_string(),
        }
    }

    /// Interprets the token as an array index for a list of `len` items.
    ///
    /// `allow_end` accepts `len` itself and the `-` marker (insert position).
    fn array_index(&self, len: usize, allow_end: bool, at: &Path) -> Result<usize, ResolveError> {
        let index = match self {
            Token::Index(i) => *i,
            Token::Key(k) if allow_end && k == "-" => return Ok(len),
            Token::Key(k) => parse_index(k).ok_or_else(|| ResolveError::InvalidIndex {
                at: at.to_string(),
                token: k.clone(),
            })?,
        };
        let limit = if allow_end { len + 1 } else { len };
        if index >= limit {
            return Err(ResolveError::IndexOutOfRange {
                at: at.to_string(),
                index,
                len,
            });
        }
        Ok(index)
    }
}

fn parse_index(token: &str) -> Option<usize> {
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if token.len() > 1 && token.starts_with('0') {
        return None;
    }
    token.parse().ok()
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Token::Key(k) => f.write_str(&escape(k)),
            Token::Index(i) => write!(f, "{}", i),
        }
    }
}

impl From<&str> for Token {
    fn from(s: &str) -> Self {
        Token::Key(s.to_string())
    }
}

impl From<String> for Token {
    fn from(s: String) -> Self {
        Token::Key(s)
    }
}

impl From<usize> for Token {
    fn from(i: usize) -> Self {
        Token::Index(i)
    }
}

/// Escapes one reference token (`~` → `~0`, `/` → `~1`).
pub fn escape(token: &str) -> String {
    token.replace('~', "~0").replace('/', "~1")
}

fn unescape(raw: &str, pointer: &str) -> Result<String, ResolveError> {
    let mut out = String::with_capacity(raw.len());
    let mut chars = raw.chars();
    while let Some(c) = chars.next() {
        if c != '~' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('0') => out.push('~'),
            Some('1') => out.push('/'),
            _ => {
                return Err(ResolveError::InvalidPointer {
                    pointer: pointer.to_string(),
                    reason: "'~' must be followed by '0' or '1'".to_string(),
                })
            }
        }
    }
    Ok(out)
}

/// Location of a node inside a configuration tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Path(Vec<Token>);

impl Path {
    /// The empty path, addressing the whole tree.
    pub fn root() -> Self {
        Path(Vec::new())
    }

    pub fn new(tokens: Vec<Token>) -> Self {
        Path(tokens)
    }

    /// Builds a path of string keys, e.g. `["PORT", "Ethernet0", "speed"]`.
    pub fn from_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Path(keys.into_iter().map(|k| Token::Key(k.into())).collect())
    }

    /// Parses an RFC 6901 pointer.
    pub fn parse(pointer: &str) -> Result<Self, ResolveError> {
        if pointer.is_empty() {
            return Ok(Path::root());
        }
        let Some(rest) = pointer.strip_prefix('/') else {
            return Err(ResolveError::InvalidPointer {
                pointer: pointer.to_string(),
                reason: "pointer must be empty or start with '/'".to_string(),
            });
        };
        let tokens = rest
            .split('/')
            .map(|raw| unescape(raw, pointer).map(Token::Key))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Path(tokens))
    }

    pub fn tokens(&self) -> &[Token] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn is_root(&self) -> bool {
        self.0.is_empty()
    }

    pub fn push(&mut self, token: impl Into<Token>) {
        self.0.push(token.into());
    }

    /// Returns a new path with `token` appended.
    pub fn child(&self, token: impl Into<Token>) -> Path {
        let mut next = self.clone();
        next.push(token);
        next
    }

    pub fn parent(&self) -> Option<Path> {
        if self.0.is_empty() {
            None
        } else {
            Some(Path(self.0[..self.0.len() - 1].to_vec()))
        }
    }

    pub fn last(&self) -> Option<&Token> {
        self.0.last()
    }

    /// First `n` tokens of this path.
    pub fn prefix(&self, n: usize) -> Path {
        Path(self.0[..n.min(self.0.len())].to_vec())
    }

    /// Token at `depth`, rendered as a string.
    pub fn segment(&self, depth: usize) -> Option<String> {
        self.0.get(depth).map(Token::as_string)
    }

    /// Table name (first token), if any.
    pub fn table(&self) -> Option<String> {
        self.segment(0)
    }

    /// Entry key (second token), if any.
    pub fn entry_key(&self) -> Option<String> {
        self.segment(1)
    }

    /// True when `self` equals `other` or lies beneath it.
    pub fn starts_with(&self, other: &Path) -> bool {
        other.0.len() <= self.0.len()
            && other
                .0
                .iter()
                .zip(&self.0)
                .all(|(a, b)| a.as_string() == b.as_string())
    }

    /// True when `self` lies strictly beneath `other`.
    pub fn is_descendant_of(&self, other: &Path) -> bool {
        self.0.len() > other.0.len() && self.starts_with(other)
    }
}

impl fmt::Display for Path {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for token in &self.0 {
            write!(f, "/{}", token)?;
        }
        Ok(())
    }
}

impl FromStr for Path {
    type Err = ResolveError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Path::parse(s)
    }
}

impl TryFrom<String> for Path {
    type Error = ResolveError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        Path::parse(&s)
    }
}

impl From<Path> for String {
    fn from(path: Path) -> Self {
        path.to_string()
    }
}

/// Resolves `path` against `tree`.
pub fn resolve<'a>(tree: &'a ConfigValue, path: &Path) -> Result<&'a ConfigValue, ResolveError> {
    let mut node = tree;
    for (depth, token) in path.0.iter().enumerate() {
        node = step(node, token, &path.prefix(depth))?;
    }
    Ok(node)
}

fn step<'a>(
    node: &'a ConfigValue,
    token: &Token,
    at: &Path,
) -> Result<&'a ConfigValue, ResolveError> {
    match node {
        ConfigValue::Object(map) => {
            let key = token.as_string();
            map.get(&key).ok_or_else(|| ResolveError::KeyNotFound {
                at: at.to_string(),
                key,
            })
        }
        ConfigValue::Array(items) => {
            let index = token.array_index(items.len(), false, at)?;
            Ok(&items[index])
        }
        ConfigValue::Scalar(_) => Err(ResolveError::NotAContainer {
            at: at.to_string(),
            token: token.as_string(),
            kind: node.kind(),
        }),
    }
}

/// Mutable counterpart of [`resolve`].
pub fn resolve_mut<'a>(
    tree: &'a mut ConfigValue,
    path: &Path,
) -> Result<&'a mut ConfigValue, ResolveError> {
    let mut node = tree;
    for (depth, token) in path.0.iter().enumerate() {
        let at = path.prefix(depth);
        let kind = node.kind();
        node = match node {
            ConfigValue::Object(map) => {
                let key = token.as_string();
                match map.get_mut(&key) {
                    Some(child) => child,
                    None => {
                        return Err(ResolveError::KeyNotFound {
                            at: at.to_string(),
                            key,
                        })
                    }
                }
            }
            ConfigValue::Array(items) => {
                let index = token.array_index(items.len(), false, &at)?;
                &mut items[index]
            }
            ConfigValue::Scalar(_) => {
                return Err(ResolveError::NotAContainer {
                    at: at.to_string(),
                    token: token.as_string(),
                    kind,
                })
            }
        };
    }
    Ok(node)
}

/// Returns true when `path` resolves in `tree`.
pub fn exists(tree: &ConfigValue, path: &Path) -> bool {
    resolve(tree, path).is_ok()
}

/// Inserts `value` at `path` with JSON Patch `add` semantics.
///
/// An existing object member is overwritten; an array index shifts later
/// items right and `-` appends. Adding at the root replaces the tree.
pub fn insert(tree: &mut ConfigValue, path: &Path, value: ConfigValue) -> Result<(), ResolveError> {
    let Some((last, parent_path)) = split_last(path) else {
        *tree = value;
        return Ok(());
    };
    let parent = resolve_mut(tree, &parent_path)?;
    let kind = parent.kind();
    match parent {
        ConfigValue::Object(map) => {
            map.insert(last.as_string(), value);
            Ok(())
        }
        ConfigValue::Array(items) => {
            let index = last.array_index(items.len(), true, &parent_path)?;
            items.insert(index, value);
            Ok(())
        }
        ConfigValue::Scalar(_) => Err(ResolveError::NotAContainer {
            at: parent_path.to_string(),
            token: last.as_string(),
            kind,
        }),
    }
}

/// Removes and returns the node at `path`.
///
/// Removing the root leaves an empty object behind.
pub fn remove(tree: &mut ConfigValue, path: &Path) -> Result<ConfigValue, ResolveError> {
    let Some((last, parent_path)) = split_last(path) else {
        return Ok(std::mem::replace(tree, ConfigValue::empty_object()));
    };
    let parent = resolve_mut(tree, &parent_path)?;
    let kind = parent.kind();
    match parent {
        ConfigValue::Object(map) => {
            let key = last.as_string();
            map.remove(&key).ok_or_else(|| ResolveError::KeyNotFound {
                at: parent_path.to_string(),
                key,
            })
        }
        ConfigValue::Array(items) => {
            let index = last.array_index(items.len(), false, &parent_path)?;
            Ok(items.remove(index))
        }
        ConfigValue::Scalar(_) => Err(ResolveError::NotAContainer {
            at: parent_path.to_string(),
            token: last.as_string(),
            kind,
        }),
    }
}

/// Replaces the existing node at `path`, returning the previous value.
pub fn replace(
    tree: &mut ConfigValue,
    path: &Path,
    value: ConfigValue,
) -> Result<ConfigValue, ResolveError> {
    let slot = resolve_mut(tree, path)?;
    Ok(std::mem::replace(slot, value))
}

fn split_last(path: &Path) -> Option<(&Token, Path)> {
    let (last, init) = path.0.split_last()?;
    Some((last, Path(init.to_vec())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tree() -> ConfigValue {
        ConfigValue::from(json!({
            "VLAN": {"Vlan1000": {"vlanid": "1000", "members": ["Ethernet0", "Ethernet4"]}},
            "NUMBERED": {"1": {"x": "y"}},
            "a/b": {"c~d": "v"}
        }))
    }

    #[test]
    fn test_parse_and_display_escapes() {
        let path = Path::parse("/a~1b/c~0d").unwrap();
        assert_eq!(path.tokens(), &[Token::from("a/b"), Token::from("c~d")]);
        assert_eq!(path.to_string(), "/a~1b/c~0d");
        assert_eq!(resolve(&tree(), &path).unwrap(), &ConfigValue::string("v"));
    }

    #[test]
    fn test_parse_rejects_bad_pointers() {
        assert!(matches!(
            Path::parse("PORT"),
            Err(ResolveError::InvalidPointer { .. })
        ));
        assert!(matches!(
            Path::parse("/a~2"),
            Err(ResolveError::InvalidPointer { .. })
        ));
        assert!(Path::parse("").unwrap().is_root());
    }

    #[test]
    fn test_numeric_token_against_object_is_key_lookup() {
        let path = Path::parse("/NUMBERED/1/x").unwrap();
        assert_eq!(resolve(&tree(), &path).unwrap(), &ConfigValue::string("y"));
    }

    #[test]
    fn test_array_index_as_string_and_int() {
        let t = tree();
        let by_string = Path::parse("/VLAN/Vlan1000/members/1").unwrap();
        let by_int = Path::from_keys(["VLAN", "Vlan1000", "members"]).child(1usize);
        assert_eq!(resolve(&t, &by_string).unwrap(), &ConfigValue::string("Ethernet4"));
        assert_eq!(resolve(&t, &by_int).unwrap(), &ConfigValue::string("Ethernet4"));
    }

    #[test]
    fn test_resolution_error_kinds() {
        let t = tree();
        let missing = resolve(&t, &Path::parse("/VLAN/Vlan2000").unwrap()).unwrap_err();
        assert_eq!(missing.kind(), ResolveErrorKind::Key);

        let out_of_range =
            resolve(&t, &Path::parse("/VLAN/Vlan1000/members/10").unwrap()).unwrap_err();
        assert_eq!(out_of_range.kind(), ResolveErrorKind::Index);

        let not_number =
            resolve(&t, &Path::parse("/VLAN/Vlan1000/members/abc").unwrap()).unwrap_err();
        assert_eq!(not_number.kind(), ResolveErrorKind::Index);

        let past_scalar =
            resolve(&t, &Path::parse("/VLAN/Vlan1000/vlanid/more").unwrap()).unwrap_err();
        assert_eq!(past_scalar.kind(), ResolveErrorKind::Type);
    }

    #[test]
    fn test_insert_append_and_overwrite() {
        let mut t = tree();
        let members = Path::parse("/VLAN/Vlan1000/members").unwrap();
        insert(&mut t, &members.child("-"), ConfigValue::string("Ethernet8")).unwrap();
        insert(&mut t, &members.child(0usize), ConfigValue::string("Ethernet12")).unwrap();
        assert_eq!(
            resolve(&t, &members).unwrap().to_json(),
            json!(["Ethernet12", "Ethernet0", "Ethernet4", "Ethernet8"])
        );

        let vlanid = Path::parse("/VLAN/Vlan1000/vlanid").unwrap();
        insert(&mut t, &vlanid, ConfigValue::string("1001")).unwrap();
        assert_eq!(resolve(&t, &vlanid).unwrap(), &ConfigValue::string("1001"));
    }

    #[test]
    fn test_insert_requires_parent() {
        let mut t = tree();
        let err = insert(
            &mut t,
            &Path::parse("/PORT/Ethernet0/speed").unwrap(),
            ConfigValue::string("1000"),
        )
        .unwrap_err();
        assert_eq!(err.kind(), ResolveErrorKind::Key);
    }

    #[test]
    fn test_remove_and_replace() {
        let mut t = tree();
        let removed = remove(&mut t, &Path::parse("/NUMBERED").unwrap()).unwrap();
        assert_eq!(removed.to_json(), json!({"1": {"x": "y"}}));
        assert!(!exists(&t, &Path::parse("/NUMBERED").unwrap()));

        let prior = replace(
            &mut t,
            &Path::parse("/VLAN/Vlan1000/vlanid").unwrap(),
            ConfigValue::string("7"),
        )
        .unwrap();
        assert_eq!(prior, ConfigValue::string("1000"));

        let err = replace(&mut t, &Path::parse("/VLAN/Vlan9").unwrap(), ConfigValue::null());
        assert!(err.is_err());
    }

    #[test]
    fn test_remove_root_leaves_empty_object() {
        let mut t = tree();
        remove(&mut t, &Path::root()).unwrap();
        assert_eq!(t, ConfigValue::empty_object());
    }

    #[test]
    fn test_prefix_relationships() {
        let entry = Path::parse("/LOOPBACK_INTERFACE/Loopback0").unwrap();
        let field = entry.child("admin_status");
        assert!(field.starts_with(&entry));
        assert!(field.is_descendant_of(&entry));
        assert!(!entry.is_descendant_of(&entry));
        assert_eq!(field.parent(), Some(entry.clone()));
        assert_eq!(entry.table().as_deref(), Some("LOOPBACK_INTERFACE"));
        assert_eq!(entry.entry_key().as_deref(), Some("Loopback0"));
    }

    #[test]
    fn test_serde_as_pointer_string() {
        let path: Path = serde_json::from_str(r#""/PORT/Ethernet0""#).unwrap();
        assert_eq!(path, Path::from_keys(["PORT", "Ethernet0"]));
        assert_eq!(serde_json::to_string(&path).unwrap(), r#""/PORT/Ethernet0""#);
    }
}
