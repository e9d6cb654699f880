//! CONFIG_DB entry keys.
//!
//! Entries are addressed by a simple key (`Ethernet0`) or a compound key
//! whose components are joined with `|` (`Vlan10|Ethernet0`,
//! `Loopback0|10.1.0.32/32`). Components keep their order and the original
//! separator on the way back out.

use std::fmt;

/// Separator between compound key components.
pub const KEY_SEPARATOR: char = '|';

/// A simple or compound entry key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntryKey {
    components: Vec<String>,
}

impl EntryKey {
    /// Splits an external key string into components.
    pub fn parse(raw: &str) -> Self {
        Self {
            components: raw.split(KEY_SEPARATOR).map(str::to_string).collect(),
        }
    }

    pub fn from_components<I, S>(components: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            components: components.into_iter().map(Into::into).collect(),
        }
    }

    pub fn components(&self) -> &[String] {
        &self.components
    }

    pub fn is_compound(&self) -> bool {
        self.components.len() > 1
    }

    /// First component, e.g. `Loopback0` for `Loopback0|10.1.0.32/32`.
    pub fn base(&self) -> &str {
        self.components.first().map(String::as_str).unwrap_or("")
    }

    /// Key with the last component dropped; `None` for simple keys.
    pub fn parent(&self) -> Option<EntryKey> {
        if !self.is_compound() {
            return None;
        }
        Some(Self {
            components: self.components[..self.components.len() - 1].to_vec(),
        })
    }

    /// True when `other` extends this key with more components.
    pub fn is_ancestor_of(&self, other: &EntryKey) -> bool {
        other.components.len() > self.components.len()
            && other.components.starts_with(&self.components)
    }
}

impl fmt::Display for EntryKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for component in &self.components {
            if !first {
                write!(f, "{}", KEY_SEPARATOR)?;
            }
            f.write_str(component)?;
            first = false;
        }
        Ok(())
    }
}

impl From<&str> for EntryKey {
    fn from(raw: &str) -> Self {
        EntryKey::parse(raw)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_simple_key() {
        let key = EntryKey::parse("Ethernet0");
        assert!(!key.is_compound());
        assert_eq!(key.base(), "Ethernet0");
        assert_eq!(key.parent(), None);
        assert_eq!(key.to_string(), "Ethernet0");
    }

    #[test]
    fn test_compound_key_round_trip() {
        let key = EntryKey::parse("Loopback0|10.1.0.32/32");
        assert!(key.is_compound());
        assert_eq!(key.components(), &["Loopback0", "10.1.0.32/32"]);
        assert_eq!(key.base(), "Loopback0");
        assert_eq!(key.to_string(), "Loopback0|10.1.0.32/32");
    }

    #[test]
    fn test_ancestry() {
        let parent = EntryKey::parse("Vlan10");
        let child = EntryKey::parse("Vlan10|Ethernet0");
        assert!(parent.is_ancestor_of(&child));
        assert!(!child.is_ancestor_of(&parent));
        assert!(!parent.is_ancestor_of(&parent));
        assert_eq!(child.parent(), Some(parent));
        assert!(!EntryKey::parse("Vlan1").is_ancestor_of(&EntryKey::parse("Vlan10|Ethernet0")));
    }

    #[test]
    fn test_three_component_key() {
        let key = EntryKey::from_components(["Ethernet0", "Ethernet4", "3"]);
        assert_eq!(key.to_string(), "Ethernet0|Ethernet4|3");
        assert_eq!(key.parent().unwrap().to_string(), "Ethernet0|Ethernet4");
    }
}
