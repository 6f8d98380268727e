// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fact base and TSV fact files

use crate::error::{ReasoningError, Result};
use ifc_graph::{Fact, HAS_TYPE, IN_STOREY};
use rustc_hash::{FxHashMap, FxHashSet};
use std::fs::File;
use std::io::{BufWriter, Read, Write};
use std::path::Path;

/// De-duplicated triples in insertion order, indexed by predicate
#[derive(Debug, Default, Clone)]
pub struct FactBase {
    facts: Vec<Fact>,
    seen: FxHashSet<Fact>,
    by_predicate: FxHashMap<String, Vec<usize>>,
}

impl FactBase {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_facts(facts: impl IntoIterator<Item = Fact>) -> Self {
        let mut base = Self::new();
        base.extend(facts);
        base
    }

    /// Add a fact; returns false if it was already known
    pub fn add(&mut self, fact: Fact) -> bool {
        if self.seen.contains(&fact) {
            return false;
        }
        self.by_predicate
            .entry(fact.predicate.clone())
            .or_default()
            .push(self.facts.len());
        self.seen.insert(fact.clone());
        self.facts.push(fact);
        true
    }

    /// Add every fact; returns how many were new
    pub fn extend(&mut self, facts: impl IntoIterator<Item = Fact>) -> usize {
        facts.into_iter().filter(|f| self.add(f.clone())).count()
    }

    pub fn contains(&self, subject: &str, predicate: &str, object: &str) -> bool {
        if !self.by_predicate.contains_key(predicate) {
            return false;
        }
        self.seen.contains(&Fact::new(subject, predicate, object))
    }

    /// Facts with a predicate, in insertion order
    pub fn with_predicate<'a>(&'a self, predicate: &str) -> impl Iterator<Item = &'a Fact> + 'a {
        self.by_predicate
            .get(predicate)
            .into_iter()
            .flatten()
            .map(move |&i| &self.facts[i])
    }

    pub fn iter(&self) -> impl Iterator<Item = &Fact> {
        self.facts.iter()
    }

    pub fn len(&self) -> usize {
        self.facts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.facts.is_empty()
    }

    /// IFC type of each subject; a later `has_type` wins
    pub fn types(&self) -> FxHashMap<&str, &str> {
        self.with_predicate(HAS_TYPE)
            .map(|f| (f.subject.as_str(), f.object.as_str()))
            .collect()
    }

    /// Storeys of each subject
    pub fn storeys(&self) -> FxHashMap<&str, Vec<&str>> {
        let mut storeys: FxHashMap<&str, Vec<&str>> = FxHashMap::default();
        for fact in self.with_predicate(IN_STOREY) {
            storeys
                .entry(fact.subject.as_str())
                .or_default()
                .push(fact.object.as_str());
        }
        storeys
    }
}

/// Read a tab-separated fact file
///
/// A `subject predicate object` header line is skipped, as are blank lines
/// and rows with fewer than three fields. Fields are trimmed.
pub fn read_facts(reader: impl Read) -> Result<Vec<Fact>> {
    let mut tsv = csv::ReaderBuilder::new()
        .delimiter(b'\t')
        .has_headers(false)
        .quoting(false)
        .flexible(true)
        .from_reader(reader);

    let mut facts = Vec::new();
    for record in tsv.records() {
        let record = record?;
        let field = |i: usize| record.get(i).map(str::trim).unwrap_or_default();
        let (subject, predicate, object) = (field(0), field(1), field(2));
        if record.len() < 3 || subject.is_empty() || predicate.is_empty() {
            continue;
        }
        if subject == "subject" && predicate == "predicate" {
            continue;
        }
        facts.push(Fact::new(subject, predicate, object));
    }
    Ok(facts)
}

pub fn read_facts_file(path: impl AsRef<Path>) -> Result<Vec<Fact>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| ReasoningError::io(path, e))?;
    read_facts(file)
}

/// Write facts with a `subject predicate object` header line
pub fn write_facts_with_header<W: Write>(facts: &[Fact], writer: W) -> Result<()> {
    let mut tsv = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(csv::QuoteStyle::Never)
        .has_headers(false)
        .from_writer(writer);
    tsv.write_record(["subject", "predicate", "object"])?;
    for fact in facts {
        tsv.write_record([&fact.subject, &fact.predicate, &fact.object])?;
    }
    tsv.flush().map_err(csv::Error::from)?;
    Ok(())
}

pub fn write_facts_file(path: impl AsRef<Path>, facts: &[Fact]) -> Result<()> {
    let path = path.as_ref();
    let file = File::create(path).map_err(|e| ReasoningError::io(path, e))?;
    let mut writer = BufWriter::new(file);
    write_facts_with_header(facts, &mut writer)?;
    writer.flush().map_err(|e| ReasoningError::io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_add_dedups_and_indexes() {
        let mut base = FactBase::new();
        assert!(base.add(Fact::new("a", "adjacent", "b")));
        assert!(base.add(Fact::new("a", "has_type", "IfcWall")));
        assert!(!base.add(Fact::new("a", "adjacent", "b")));
        assert!(base.add(Fact::new("b", "adjacent", "a")));

        assert_eq!(base.len(), 3);
        let adjacent: Vec<&str> = base
            .with_predicate("adjacent")
            .map(|f| f.subject.as_str())
            .collect();
        assert_eq!(adjacent, vec!["a", "b"]);
        assert!(base.contains("a", "has_type", "IfcWall"));
        assert!(!base.contains("a", "supports", "b"));
    }

    #[test]
    fn test_read_tolerates_header_and_junk() {
        let text = "subject\tpredicate\tobject\n\
                    IfcWall_a\thas_type\tIfcWall\n\
                    \n\
                    short\trow\n\
                    IfcWall_a\thas_name\tWall \"A\", west\n";
        let facts = read_facts(text.as_bytes()).unwrap();
        assert_eq!(
            facts,
            vec![
                Fact::new("IfcWall_a", "has_type", "IfcWall"),
                Fact::new("IfcWall_a", "has_name", "Wall \"A\", west"),
            ]
        );
    }

    #[test]
    fn test_types_and_storeys() {
        let base = FactBase::from_facts([
            Fact::new("w", "has_type", "IfcWall"),
            Fact::new("w", "in_storey", "L0"),
            Fact::new("w", "in_storey", "L1"),
        ]);
        assert_eq!(base.types().get("w"), Some(&"IfcWall"));
        assert_eq!(base.storeys()["w"], vec!["L0", "L1"]);
    }

    #[test]
    fn test_write_then_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("derived_facts.tsv");
        let facts = vec![Fact::new("s", "supports", "x")];
        write_facts_file(&path, &facts).unwrap();
        assert_eq!(
            std::fs::read_to_string(&path).unwrap(),
            "subject\tpredicate\tobject\ns\tsupports\tx\n"
        );
        assert_eq!(read_facts_file(&path).unwrap(), facts);
    }
}
