// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! `facts.tsv`: subject, predicate, object triples for symbolic reasoning

use super::GraphDocument;
use crate::error::Result;
use crate::storey::StoreyIndex;
use crate::types::{EdgeType, NodeType};
use serde::{Deserialize, Serialize};
use std::io::Write;

pub const HAS_TYPE: &str = "has_type";
pub const HAS_NAME: &str = "has_name";
pub const IN_STOREY: &str = "in_storey";

#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fact {
    pub subject: String,
    pub predicate: String,
    pub object: String,
}

impl Fact {
    pub fn new(
        subject: impl Into<String>,
        predicate: impl Into<String>,
        object: impl Into<String>,
    ) -> Self {
        Self {
            subject: subject.into(),
            predicate: predicate.into(),
            object: object.into(),
        }
    }
}

/// Derive every fact of a document, in a fixed order
///
/// Node facts first (`has_type`, `has_name`), then one fact per edge with
/// `adjacent` in both directions, then `in_storey` for each storey a node
/// reaches over CONTAINS/PART_OF links.
pub fn derive_facts(document: &GraphDocument) -> Vec<Fact> {
    let mut facts = Vec::with_capacity(document.nodes.len() * 3 + document.edges.len());

    for node in &document.nodes {
        facts.push(Fact::new(&node.id, HAS_TYPE, &node.ifc_type));
        if let Some(name) = node.name.as_deref().filter(|n| !n.trim().is_empty()) {
            facts.push(Fact::new(&node.id, HAS_NAME, name));
        }
    }

    for edge in &document.edges {
        let predicate = edge.edge_type.predicate();
        facts.push(Fact::new(&edge.src, predicate, &edge.dst));
        if edge.edge_type == EdgeType::Adjacent {
            facts.push(Fact::new(&edge.dst, predicate, &edge.src));
        }
    }

    let node_types: Vec<NodeType> = document.nodes.iter().map(|n| n.node_type).collect();
    let storeys = StoreyIndex::build(
        &node_types,
        document
            .edges
            .iter()
            .map(|e| (e.src_idx, e.dst_idx, e.edge_type)),
    );
    for node in &document.nodes {
        for &storey in storeys.storeys_of(node.idx) {
            facts.push(Fact::new(&node.id, IN_STOREY, &document.nodes[storey].id));
        }
    }

    facts
}

/// Write facts as headerless tab-separated rows
pub fn write_facts<W: Write>(facts: &[Fact], writer: W) -> Result<()> {
    let mut tsv = csv::WriterBuilder::new()
        .delimiter(b'\t')
        .quote_style(csv::QuoteStyle::Never)
        .has_headers(false)
        .from_writer(writer);
    for fact in facts {
        tsv.write_record([
            &*sanitize(&fact.subject),
            &*sanitize(&fact.predicate),
            &*sanitize(&fact.object),
        ])?;
    }
    tsv.flush().map_err(csv::Error::from)?;
    Ok(())
}

/// Tabs and line breaks would split a row
fn sanitize(value: &str) -> std::borrow::Cow<'_, str> {
    if value.contains(['\t', '\n', '\r']) {
        value.replace(['\t', '\n', '\r'], " ").into()
    } else {
        value.into()
    }
}
