// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Node and edge type tables
//!
//! The numeric ids are part of the export format. Downstream training code
//! keys embeddings on them, so they never change between runs or versions.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Node category
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum NodeType {
    /// Physical building, MEP or furnishing element
    Element,
    /// Component that only exists as part of, or a feature in, a host element
    ElementSubtype,
    Space,
    Storey,
    System,
}

impl NodeType {
    /// All node types in id order
    pub const ALL: [NodeType; 5] = [
        NodeType::Element,
        NodeType::ElementSubtype,
        NodeType::Space,
        NodeType::Storey,
        NodeType::System,
    ];

    /// Stable numeric id
    pub fn id(self) -> u8 {
        match self {
            NodeType::Element => 0,
            NodeType::ElementSubtype => 1,
            NodeType::Space => 2,
            NodeType::Storey => 3,
            NodeType::System => 4,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            NodeType::Element => "Element",
            NodeType::ElementSubtype => "ElementSubtype",
            NodeType::Space => "Space",
            NodeType::Storey => "Storey",
            NodeType::System => "System",
        }
    }

    /// Look up by name, case-insensitive
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Whether nodes of this type take part in spatial inference
    pub fn is_physical(self) -> bool {
        matches!(
            self,
            NodeType::Element | NodeType::ElementSubtype | NodeType::Space
        )
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Edge category
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EdgeType {
    /// Spatial container to contained element
    Contains,
    /// Part to whole (aggregation, system membership)
    PartOf,
    /// Explicit element-to-element connection
    Connects,
    /// Bounding boxes touch or overlap; stored once per unordered pair
    Adjacent,
    /// Higher element to lower element
    Above,
    /// Lower element to higher element, inverse of `Above`
    Below,
}

impl EdgeType {
    /// All edge types in id order
    pub const ALL: [EdgeType; 6] = [
        EdgeType::Contains,
        EdgeType::PartOf,
        EdgeType::Connects,
        EdgeType::Adjacent,
        EdgeType::Above,
        EdgeType::Below,
    ];

    /// Stable numeric id
    pub fn id(self) -> u8 {
        match self {
            EdgeType::Contains => 0,
            EdgeType::PartOf => 1,
            EdgeType::Connects => 2,
            EdgeType::Adjacent => 3,
            EdgeType::Above => 4,
            EdgeType::Below => 5,
        }
    }

    /// Upper-case export name, e.g. `PART_OF`
    pub fn name(self) -> &'static str {
        match self {
            EdgeType::Contains => "CONTAINS",
            EdgeType::PartOf => "PART_OF",
            EdgeType::Connects => "CONNECTS",
            EdgeType::Adjacent => "ADJACENT",
            EdgeType::Above => "ABOVE",
            EdgeType::Below => "BELOW",
        }
    }

    /// Fact predicate, e.g. `part_of`
    pub fn predicate(self) -> &'static str {
        match self {
            EdgeType::Contains => "contains",
            EdgeType::PartOf => "part_of",
            EdgeType::Connects => "connects",
            EdgeType::Adjacent => "adjacent",
            EdgeType::Above => "above",
            EdgeType::Below => "below",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .into_iter()
            .find(|t| t.name().eq_ignore_ascii_case(name.trim()))
    }

    /// Relations that hold in both directions
    pub fn is_symmetric(self) -> bool {
        self == EdgeType::Adjacent
    }

    /// Edge types produced by geometric inference rather than IFC relations
    pub fn is_inferred(self) -> bool {
        matches!(self, EdgeType::Adjacent | EdgeType::Above | EdgeType::Below)
    }

    /// Links that lead from a node towards its storey
    pub fn is_structural(self) -> bool {
        matches!(self, EdgeType::Contains | EdgeType::PartOf)
    }
}

impl fmt::Display for EdgeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_dense_and_ordered() {
        for (i, t) in NodeType::ALL.iter().enumerate() {
            assert_eq!(t.id() as usize, i);
        }
        for (i, t) in EdgeType::ALL.iter().enumerate() {
            assert_eq!(t.id() as usize, i);
        }
    }

    #[test]
    fn test_names_round_trip() {
        assert_eq!(EdgeType::from_name("part_of"), Some(EdgeType::PartOf));
        assert_eq!(NodeType::from_name("storey"), Some(NodeType::Storey));
        assert_eq!(EdgeType::from_name("NEAR"), None);
    }

    #[test]
    fn test_edge_type_serializes_upper_case() {
        assert_eq!(
            serde_json::to_string(&EdgeType::PartOf).unwrap(),
            "\"PART_OF\""
        );
        assert_eq!(
            serde_json::to_string(&NodeType::ElementSubtype).unwrap(),
            "\"ElementSubtype\""
        );
    }
}
