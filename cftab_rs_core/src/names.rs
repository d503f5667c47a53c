//! # names
//!
//! position <-> name bookkeeping for a single axis.
//!
//! # Design
//!
//! An axis that was never named only stores its length and the first default index it
//! will hand out. Strings are generated on first read through a [`OnceLock`], so read-only
//! accessors (and [`crate::View`]s) can stay `&self`. Default names look like
//! `_DEFAULT_#<n>`, where `n` comes from a counter owned by the registry that never goes
//! backwards, so a default name is never handed out twice by the same registry.

use crate::error::{bail, ensure, Result};
use itertools::Itertools;
use std::{collections::HashMap, fmt, sync::OnceLock};

pub const DEFAULT_PREFIX: &str = "_DEFAULT_#";

#[inline]
pub fn is_default_name(name: &str) -> bool {
    name.starts_with(DEFAULT_PREFIX)
}

fn default_number(name: &str) -> Option<usize> {
    name.strip_prefix(DEFAULT_PREFIX)?.parse().ok()
}

fn default_name(number: usize) -> String {
    format!("{DEFAULT_PREFIX}{number}")
}

/// a position (negative values count from the end) or a name along one axis
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identifier {
    Index(i64),
    Name(String),
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identifier::Index(index) => write!(f, "{index}"),
            Identifier::Name(name) => write!(f, "'{name}'"),
        }
    }
}

impl From<&str> for Identifier {
    fn from(name: &str) -> Self {
        Identifier::Name(name.to_string())
    }
}
impl From<String> for Identifier {
    fn from(name: String) -> Self {
        Identifier::Name(name)
    }
}
impl From<&String> for Identifier {
    fn from(name: &String) -> Self {
        Identifier::Name(name.clone())
    }
}
macro_rules! identifier_from_int {
    ($($int:ty),*) => {
        $(
            impl From<$int> for Identifier {
                fn from(index: $int) -> Self {
                    Identifier::Index(index as i64)
                }
            }
        )*
    };
}
identifier_from_int!(usize, isize, i64, i32, u32);

/// how the names of an axis should be (re)assigned
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NameAssignment {
    /// forget every name, positions fall back to default names
    Automatic,
    /// one entry per position, `None` asks for a fresh default name
    List(Vec<Option<String>>),
    /// name -> position, covering every position exactly once
    Map(HashMap<String, usize>),
}

impl<S: Into<String>> From<Vec<S>> for NameAssignment {
    fn from(names: Vec<S>) -> Self {
        NameAssignment::List(names.into_iter().map(|n| Some(n.into())).collect())
    }
}
impl<const N: usize> From<[&str; N]> for NameAssignment {
    fn from(names: [&str; N]) -> Self {
        NameAssignment::List(names.iter().map(|n| Some(n.to_string())).collect())
    }
}
impl From<HashMap<String, usize>> for NameAssignment {
    fn from(names: HashMap<String, usize>) -> Self {
        NameAssignment::Map(names)
    }
}

#[derive(Debug, Clone)]
struct Names {
    inverse: Vec<String>,
    forward: HashMap<String, usize>,
    next_default: usize,
}

impl Names {
    fn new(inverse: Vec<String>, next_default: usize) -> Self {
        let mut names = Self {
            inverse,
            forward: HashMap::new(),
            next_default,
        };
        names.rebuild();
        names
    }

    fn rebuild(&mut self) {
        self.forward = self
            .inverse
            .iter()
            .enumerate()
            .map(|(i, name)| (name.clone(), i))
            .collect();
        for name in &self.inverse {
            if let Some(number) = default_number(name) {
                self.next_default = self.next_default.max(number + 1);
            }
        }
    }

    fn fresh_default(&mut self) -> String {
        let name = default_name(self.next_default);
        self.next_default += 1;
        name
    }
}

#[derive(Debug, Clone, Default)]
pub struct NameRegistry {
    len: usize,
    /// first default index handed out when the names get materialized
    base: usize,
    names: OnceLock<Names>,
}

impl NameRegistry {
    pub fn new(len: usize) -> Self {
        Self {
            len,
            base: 0,
            names: OnceLock::new(),
        }
    }

    /// builds a registry from explicit names, `None` entries get default names
    pub fn from_names(names: Vec<Option<String>>) -> Result<Self> {
        let mut registry = Self::new(names.len());
        registry.set_names(NameAssignment::List(names))?;
        Ok(registry)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// the next default index this registry would hand out
    pub fn next_default(&self) -> usize {
        match self.names.get() {
            Some(names) => names.next_default,
            None => self.base + self.len,
        }
    }

    fn generate(&self) -> Names {
        let inverse = (self.base..self.base + self.len).map(default_name).collect();
        Names::new(inverse, self.base + self.len)
    }

    fn materialized(&self) -> &Names {
        self.names.get_or_init(|| self.generate())
    }

    fn with_names_mut<R>(&mut self, f: impl FnOnce(&mut Names) -> R) -> R {
        let mut names = match self.names.take() {
            Some(names) => names,
            None => self.generate(),
        };
        let result = f(&mut names);
        self.len = names.inverse.len();
        self.names = OnceLock::from(names);
        result
    }

    /// whether names were ever generated or assigned
    #[inline]
    pub fn is_materialized(&self) -> bool {
        self.names.get().is_some()
    }

    /// every name, generating defaults if this is the first read
    pub fn names(&self) -> &[String] {
        &self.materialized().inverse
    }

    /// the names, without generating defaults
    pub fn names_if_created(&self) -> Option<&[String]> {
        self.names.get().map(|names| names.inverse.as_slice())
    }

    /// the names as an explicit assignment, `None` where a default name is (or would be) used
    pub fn assignment(&self) -> Vec<Option<String>> {
        match self.names_if_created() {
            None => vec![None; self.len],
            Some(names) => names
                .iter()
                .map(|n| (!is_default_name(n)).then(|| n.clone()))
                .collect(),
        }
    }

    pub fn name(&self, position: usize) -> Result<&str> {
        ensure!(
            position < self.len,
            InvalidIdentifier,
            "position {position} is out of range for an axis of length {}",
            self.len
        );
        Ok(&self.materialized().inverse[position])
    }

    /// looks a name up; a default name that was never generated gets materialized, so it
    /// keeps its position through later structural edits
    pub fn lookup(&self, name: &str) -> Option<usize> {
        if self.names.get().is_none() {
            default_number(name).filter(|&n| n >= self.base && n < self.base + self.len)?;
        }
        self.materialized().forward.get(name).copied()
    }

    pub fn has_name(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }

    /// resolves an integer position, negative values counting from the end
    pub fn position(&self, index: i64) -> Result<usize> {
        let len = self.len as i64;
        let resolved = if index < 0 { index + len } else { index };
        ensure!(
            resolved >= 0 && resolved < len,
            InvalidIdentifier,
            "index {index} is out of range for an axis of length {len}"
        );
        Ok(resolved as usize)
    }

    pub fn index_of(&self, identifier: &Identifier) -> Result<usize> {
        match identifier {
            Identifier::Index(index) => self.position(*index),
            Identifier::Name(name) => match self.lookup(name) {
                Some(position) => Ok(position),
                None => bail!(InvalidIdentifier, "the name '{name}' does not exist"),
            },
        }
    }

    /// whether any position holds (or would hold) a default name
    pub fn any_default(&self) -> bool {
        match self.names_if_created() {
            None => self.len > 0,
            Some(names) => names.iter().any(|n| is_default_name(n)),
        }
    }

    /// whether every position holds (or would hold) a default name
    pub fn all_default(&self) -> bool {
        match self.names_if_created() {
            None => true,
            Some(names) => names.iter().all(|n| is_default_name(n)),
        }
    }

    /// the user-assigned names, in positional order
    pub fn non_default(&self) -> Vec<&str> {
        self.names_if_created()
            .map(|names| {
                names
                    .iter()
                    .filter(|n| !is_default_name(n))
                    .map(String::as_str)
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn set_names(&mut self, assignment: NameAssignment) -> Result<()> {
        let assigned = match assignment {
            NameAssignment::Automatic => {
                self.base = self.next_default();
                self.names = OnceLock::new();
                return Ok(());
            }
            NameAssignment::List(names) => {
                ensure!(
                    names.len() == self.len,
                    ArgumentValue,
                    "count mismatch: {} names were given for an axis of length {}",
                    names.len(),
                    self.len
                );
                names
            }
            NameAssignment::Map(mapping) => {
                ensure!(
                    mapping.len() == self.len,
                    ArgumentValue,
                    "count mismatch: {} names were given for an axis of length {}",
                    mapping.len(),
                    self.len
                );
                let mut assigned: Vec<Option<String>> = vec![None; self.len];
                for (name, index) in mapping {
                    ensure!(
                        index < self.len,
                        ArgumentValue,
                        "the index {index} assigned to '{name}' is out of range"
                    );
                    ensure!(
                        assigned[index].is_none(),
                        ArgumentValue,
                        "the index {index} was assigned more than once"
                    );
                    assigned[index] = Some(name);
                }
                assigned
            }
        };
        if let Some(duplicate) = assigned.iter().flatten().duplicates().next() {
            bail!(NameConflict, "duplicate name '{duplicate}'");
        }
        let mut next_default = self.next_default();
        for name in assigned.iter().flatten() {
            if let Some(number) = default_number(name) {
                next_default = next_default.max(number + 1);
            }
        }
        let inverse = assigned
            .into_iter()
            .map(|name| {
                name.unwrap_or_else(|| {
                    next_default += 1;
                    default_name(next_default - 1)
                })
            })
            .collect();
        self.names = OnceLock::from(Names::new(inverse, next_default));
        Ok(())
    }

    /// renames a single position, `None` gives it a fresh default name
    pub fn set_name(&mut self, position: usize, name: Option<&str>) -> Result<()> {
        ensure!(
            position < self.len,
            InvalidIdentifier,
            "position {position} is out of range for an axis of length {}",
            self.len
        );
        if let Some(name) = name {
            if let Some(existing) = self.lookup(name) {
                ensure!(
                    existing == position,
                    NameConflict,
                    "the name '{name}' is already used at position {existing}"
                );
                return Ok(());
            }
        }
        self.with_names_mut(|names| {
            let name = match name {
                Some(name) => name.to_string(),
                None => names.fresh_default(),
            };
            names.inverse[position] = name;
            names.rebuild();
        });
        Ok(())
    }

    /// a registry for the given positions, in the given order
    pub fn select(&self, positions: &[usize]) -> NameRegistry {
        match self.names_if_created() {
            None => NameRegistry {
                len: positions.len(),
                base: self.base,
                names: OnceLock::new(),
            },
            Some(names) => {
                let inverse = positions.iter().map(|&p| names[p].clone()).collect();
                let names = Names::new(inverse, self.next_default());
                NameRegistry {
                    len: positions.len(),
                    base: 0,
                    names: OnceLock::from(names),
                }
            }
        }
    }

    /// drops the given (sorted, unique) positions
    pub fn remove(&mut self, positions: &[usize]) {
        if self.names_if_created().is_none() {
            self.len -= positions.len();
            return;
        }
        self.with_names_mut(|names| {
            let mut cursor = 0;
            let mut position = 0;
            names.inverse.retain(|_| {
                let removed = cursor < positions.len() && positions[cursor] == position;
                if removed {
                    cursor += 1;
                }
                position += 1;
                !removed
            });
            names.rebuild();
        });
    }

    /// inserts the names of `incoming` before `at`; its default names are replaced by
    /// fresh defaults of this registry
    pub fn insert(&mut self, at: usize, incoming: &NameRegistry) {
        if self.names_if_created().is_none() && incoming.names_if_created().is_none() {
            self.len += incoming.len;
            return;
        }
        let incoming = incoming.assignment();
        self.with_names_mut(|names| {
            let fresh: Vec<String> = incoming
                .into_iter()
                .map(|name| name.unwrap_or_else(|| names.fresh_default()))
                .collect();
            names.inverse.splice(at..at, fresh);
            names.rebuild();
        });
    }

    /// reorders the names so that new position `i` holds the old `order[i]`
    pub fn permute(&mut self, order: &[usize]) {
        if self.names_if_created().is_none() {
            return;
        }
        self.with_names_mut(|names| {
            names.inverse = order.iter().map(|&i| names.inverse[i].clone()).collect();
            names.rebuild();
        });
    }

    /// names after repeating every position `copies` times, either each name in turn
    /// (`by_value`) or the whole axis as a block; user names get `_1.._k` suffixes
    pub fn repeated(&self, copies: usize, by_value: bool) -> NameRegistry {
        let Some(names) = self.names_if_created() else {
            return NameRegistry {
                len: self.len * copies,
                base: self.base,
                names: OnceLock::new(),
            };
        };
        let order: Vec<(usize, usize)> = if by_value {
            (0..names.len())
                .cartesian_product(1..=copies)
                .collect()
        } else {
            (1..=copies)
                .cartesian_product(0..names.len())
                .map(|(k, i)| (i, k))
                .collect()
        };
        let mut next_default = self.next_default();
        let inverse = order
            .into_iter()
            .map(|(i, k)| {
                if is_default_name(&names[i]) {
                    next_default += 1;
                    default_name(next_default - 1)
                } else {
                    format!("{}_{k}", names[i])
                }
            })
            .collect();
        NameRegistry {
            len: self.len * copies,
            base: 0,
            names: OnceLock::from(Names::new(inverse, next_default)),
        }
    }

    /// positional consistency: no position holds two different user names
    pub fn is_consistent_with(&self, other: &NameRegistry) -> bool {
        if self.len != other.len {
            return false;
        }
        let (Some(lhs), Some(rhs)) = (self.names_if_created(), other.names_if_created()) else {
            return true;
        };
        lhs.iter()
            .zip(rhs)
            .all(|(l, r)| l == r || is_default_name(l) || is_default_name(r))
    }

    /// positional merge preferring user names over default names
    pub fn merged_with(&self, other: &NameRegistry) -> Vec<Option<String>> {
        self.assignment()
            .into_iter()
            .zip(other.assignment())
            .map(|(l, r)| l.or(r))
            .collect()
    }
}

impl PartialEq for NameRegistry {
    /// two registries are equal when they agree on every user-assigned name
    fn eq(&self, other: &Self) -> bool {
        self.len == other.len && self.assignment() == other.assignment()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    fn named(names: &[&str]) -> NameRegistry {
        NameRegistry::from_names(names.iter().map(|n| Some(n.to_string())).collect()).unwrap()
    }

    #[test]
    fn test_lazy_defaults() {
        let registry = NameRegistry::new(3);
        assert!(!registry.is_materialized());
        assert_eq!(registry.lookup("a"), None);
        assert_eq!(registry.lookup("_DEFAULT_#3"), None);
        assert!(!registry.is_materialized());
        assert_eq!(registry.name(2).unwrap(), "_DEFAULT_#2");
        assert!(registry.is_materialized());
        assert_eq!(registry.next_default(), 3);
        assert!(registry.all_default());
    }

    #[test]
    fn test_looked_up_defaults_persist() {
        let mut registry = NameRegistry::new(4);
        assert_eq!(registry.lookup("_DEFAULT_#2"), Some(2));
        assert!(registry.is_materialized());
        registry.remove(&[0]);
        assert_eq!(registry.lookup("_DEFAULT_#2"), Some(1));
        assert_eq!(registry.name(1).unwrap(), "_DEFAULT_#2");
        assert_eq!(registry.lookup("_DEFAULT_#0"), None);
    }

    #[test]
    fn test_index_of() {
        let registry = named(&["a", "b", "c"]);
        assert_eq!(registry.index_of(&"b".into()).unwrap(), 1);
        assert_eq!(registry.index_of(&(-1).into()).unwrap(), 2);
        assert_eq!(registry.index_of(&2usize.into()).unwrap(), 2);
        assert!(matches!(
            registry.index_of(&3usize.into()),
            Err(Error::InvalidIdentifier(_))
        ));
        assert!(matches!(
            registry.index_of(&(-4).into()),
            Err(Error::InvalidIdentifier(_))
        ));
        assert!(matches!(
            registry.index_of(&"z".into()),
            Err(Error::InvalidIdentifier(_))
        ));
    }

    #[test]
    fn test_set_names() {
        let mut registry = NameRegistry::new(3);
        assert!(matches!(
            registry.set_names(vec!["a", "b"].into()),
            Err(Error::ArgumentValue(_))
        ));
        assert!(matches!(
            registry.set_names(vec!["a", "b", "a"].into()),
            Err(Error::NameConflict(_))
        ));
        assert!(!registry.is_materialized());
        registry
            .set_names(NameAssignment::List(vec![Some("a".into()), None, Some("c".into())]))
            .unwrap();
        assert_eq!(registry.names()[1], "_DEFAULT_#3");
        assert!(registry.any_default());
        assert_eq!(registry.non_default(), vec!["a", "c"]);

        let mapping = HashMap::from([("x".to_string(), 1), ("y".to_string(), 0), ("z".to_string(), 2)]);
        registry.set_names(mapping.into()).unwrap();
        assert_eq!(registry.names(), ["y", "x", "z"]);
        let bad = HashMap::from([("x".to_string(), 1), ("y".to_string(), 1), ("z".to_string(), 2)]);
        assert!(matches!(
            registry.set_names(bad.into()),
            Err(Error::ArgumentValue(_))
        ));
        registry.set_names(NameAssignment::Automatic).unwrap();
        assert!(!registry.is_materialized());
        assert_eq!(registry.name(0).unwrap(), "_DEFAULT_#4");
    }

    #[test]
    fn test_default_names_never_reused() {
        let mut registry = NameRegistry::new(2);
        registry
            .set_names(NameAssignment::List(vec![Some("_DEFAULT_#7".into()), None]))
            .unwrap();
        assert_eq!(registry.names(), ["_DEFAULT_#7", "_DEFAULT_#8"]);
        registry.remove(&[1]);
        registry.insert(1, &NameRegistry::new(1));
        assert_eq!(registry.names(), ["_DEFAULT_#7", "_DEFAULT_#9"]);
    }

    #[test]
    fn test_set_name() {
        let mut registry = named(&["a", "b"]);
        registry.set_name(0, Some("z")).unwrap();
        assert_eq!(registry.index_of(&"z".into()).unwrap(), 0);
        assert!(!registry.has_name("a"));
        assert!(matches!(
            registry.set_name(1, Some("z")),
            Err(Error::NameConflict(_))
        ));
        registry.set_name(1, None).unwrap();
        assert!(is_default_name(registry.name(1).unwrap()));
    }

    #[test]
    fn test_structural_helpers() {
        let mut registry = named(&["a", "b", "c", "d"]);
        let selected = registry.select(&[3, 1]);
        assert_eq!(selected.names(), ["d", "b"]);
        registry.remove(&[0, 2]);
        assert_eq!(registry.names(), ["b", "d"]);
        assert_eq!(registry.index_of(&"d".into()).unwrap(), 1);
        registry.insert(1, &named(&["x", "y"]));
        assert_eq!(registry.names(), ["b", "x", "y", "d"]);
        registry.permute(&[3, 2, 1, 0]);
        assert_eq!(registry.names(), ["d", "y", "x", "b"]);

        let mut lazy = NameRegistry::new(4);
        lazy.remove(&[1, 2]);
        assert_eq!(lazy.len(), 2);
        assert!(!lazy.is_materialized());
    }

    #[test]
    fn test_repeated() {
        let registry = named(&["a", "b"]);
        assert_eq!(registry.repeated(2, true).names(), ["a_1", "a_2", "b_1", "b_2"]);
        assert_eq!(registry.repeated(2, false).names(), ["a_1", "b_1", "a_2", "b_2"]);
        let lazy = NameRegistry::new(2).repeated(3, false);
        assert_eq!(lazy.len(), 6);
        assert!(!lazy.is_materialized());
    }

    #[test]
    fn test_consistency() {
        let lhs = NameRegistry::from_names(vec![Some("a".into()), None]).unwrap();
        let rhs = NameRegistry::from_names(vec![None, Some("b".into())]).unwrap();
        assert!(lhs.is_consistent_with(&rhs));
        assert_eq!(
            lhs.merged_with(&rhs),
            vec![Some("a".to_string()), Some("b".to_string())]
        );
        assert!(!named(&["a", "b"]).is_consistent_with(&named(&["a", "c"])));
        assert_eq!(named(&["a", "b"]), named(&["a", "b"]));
        assert_ne!(named(&["a", "b"]), named(&["b", "a"]));
    }
}
