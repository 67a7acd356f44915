//! Suite model and category-based reordering

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Setup/teardown category of a test unit
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKind {
    /// Runs inside a database transaction that is rolled back afterwards
    Database,
    /// Commits to the database and flushes it afterwards
    Transactional,
    #[default]
    Simple,
}

/// Categories that run first in a merged suite, in priority order
pub const DEFAULT_PRIORITY: &[UnitKind] = &[UnitKind::Database];

/// A single executable test unit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TestUnit {
    /// Unique identifier, `<app>.<namespace>.<name>` for discovered units
    pub id: String,

    /// Short name inside its manifest
    pub name: String,

    #[serde(default)]
    pub kind: UnitKind,

    /// Program and arguments that execute the unit
    pub command: Vec<String>,

    /// Kill the unit if it runs longer than this
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

impl TestUnit {
    pub fn new(id: impl Into<String>, kind: UnitKind, command: Vec<String>) -> Self {
        let id = id.into();
        let name = id.rsplit('.').next().unwrap_or(&id).to_string();
        Self {
            id,
            name,
            kind,
            command,
            timeout_secs: None,
        }
    }
}

/// Ordered collection of test units
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Suite {
    units: Vec<TestUnit>,
}

impl Suite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, unit: TestUnit) {
        self.units.push(unit);
    }

    /// Append every unit of `other`, preserving its order.
    pub fn extend(&mut self, other: Suite) {
        self.units.extend(other.units);
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TestUnit> {
        self.units.iter()
    }

    pub fn ids(&self) -> Vec<&str> {
        self.units.iter().map(|u| u.id.as_str()).collect()
    }

    pub fn into_units(self) -> Vec<TestUnit> {
        self.units
    }
}

impl From<Vec<TestUnit>> for Suite {
    fn from(units: Vec<TestUnit>) -> Self {
        Self { units }
    }
}

impl FromIterator<TestUnit> for Suite {
    fn from_iter<I: IntoIterator<Item = TestUnit>>(iter: I) -> Self {
        Self {
            units: iter.into_iter().collect(),
        }
    }
}

impl IntoIterator for Suite {
    type Item = TestUnit;
    type IntoIter = std::vec::IntoIter<TestUnit>;

    fn into_iter(self) -> Self::IntoIter {
        self.units.into_iter()
    }
}

impl<'a> IntoIterator for &'a Suite {
    type Item = &'a TestUnit;
    type IntoIter = std::slice::Iter<'a, TestUnit>;

    fn into_iter(self) -> Self::IntoIter {
        self.units.iter()
    }
}

/// Reorder a suite so units of the priority kinds run first.
///
/// Units are bucketed by the first priority kind they match, buckets are
/// emitted in priority order, and everything else follows. Order within a
/// bucket is preserved. A repeated id keeps only its first occurrence.
pub fn reorder_suite(suite: Suite, priority: &[UnitKind]) -> Suite {
    let mut seen = HashSet::new();
    let mut buckets: Vec<Vec<TestUnit>> = vec![Vec::new(); priority.len() + 1];

    for unit in suite {
        if !seen.insert(unit.id.clone()) {
            continue;
        }
        let slot = priority
            .iter()
            .position(|kind| *kind == unit.kind)
            .unwrap_or(priority.len());
        buckets[slot].push(unit);
    }

    buckets.into_iter().flatten().collect()
}

/// Which suites a run builds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BrowserMode {
    StandardOnly,
    BrowserOnly,
    Both,
}

impl BrowserMode {
    /// Derive the mode from the two CLI switches; `exclusive` implies `enable`.
    pub fn from_flags(enable: bool, exclusive: bool) -> Self {
        match (enable, exclusive) {
            (_, true) => BrowserMode::BrowserOnly,
            (true, false) => BrowserMode::Both,
            (false, false) => BrowserMode::StandardOnly,
        }
    }

    pub fn includes_standard(self) -> bool {
        !matches!(self, BrowserMode::BrowserOnly)
    }

    pub fn includes_browser(self) -> bool {
        !matches!(self, BrowserMode::StandardOnly)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn unit(id: &str, kind: UnitKind) -> TestUnit {
        TestUnit::new(id, kind, vec!["true".to_string()])
    }

    #[test]
    fn test_reorder_puts_priority_first_and_keeps_relative_order() {
        let suite = Suite::from(vec![
            unit("a.tests.one", UnitKind::Simple),
            unit("a.tests.two", UnitKind::Database),
            unit("a.seltests.three", UnitKind::Transactional),
            unit("a.seltests.four", UnitKind::Database),
            unit("a.seltests.five", UnitKind::Simple),
        ]);

        let ordered = reorder_suite(suite, DEFAULT_PRIORITY);

        assert_eq!(
            ordered.ids(),
            vec![
                "a.tests.two",
                "a.seltests.four",
                "a.tests.one",
                "a.seltests.three",
                "a.seltests.five",
            ]
        );
    }

    #[test]
    fn test_reorder_multiple_priorities() {
        let suite = Suite::from(vec![
            unit("x.simple", UnitKind::Simple),
            unit("x.tx", UnitKind::Transactional),
            unit("x.db", UnitKind::Database),
        ]);

        let ordered = reorder_suite(suite, &[UnitKind::Transactional, UnitKind::Database]);

        assert_eq!(ordered.ids(), vec!["x.tx", "x.db", "x.simple"]);
    }

    #[test]
    fn test_reorder_drops_repeated_ids() {
        let suite = Suite::from(vec![
            unit("a.tests.one", UnitKind::Simple),
            unit("a.tests.one", UnitKind::Simple),
            unit("a.tests.two", UnitKind::Database),
        ]);

        let ordered = reorder_suite(suite, DEFAULT_PRIORITY);

        assert_eq!(ordered.ids(), vec!["a.tests.two", "a.tests.one"]);
    }

    #[test]
    fn test_reorder_empty_priority_is_identity() {
        let suite = Suite::from(vec![
            unit("b", UnitKind::Database),
            unit("a", UnitKind::Simple),
        ]);
        assert_eq!(reorder_suite(suite.clone(), &[]), suite);
    }

    #[test]
    fn test_unit_name_from_id() {
        assert_eq!(unit("shop.seltests.checkout", UnitKind::Simple).name, "checkout");
        assert_eq!(unit("plain", UnitKind::Simple).name, "plain");
    }

    #[test_case(false, false => BrowserMode::StandardOnly ; "disabled")]
    #[test_case(true, false => BrowserMode::Both ; "enabled")]
    #[test_case(true, true => BrowserMode::BrowserOnly ; "exclusive")]
    #[test_case(false, true => BrowserMode::BrowserOnly ; "exclusive implies enabled")]
    fn test_mode_from_flags(enable: bool, exclusive: bool) -> BrowserMode {
        BrowserMode::from_flags(enable, exclusive)
    }

    #[test]
    fn test_mode_includes() {
        assert!(BrowserMode::Both.includes_standard());
        assert!(BrowserMode::Both.includes_browser());
        assert!(!BrowserMode::BrowserOnly.includes_standard());
        assert!(!BrowserMode::StandardOnly.includes_browser());
    }
}
