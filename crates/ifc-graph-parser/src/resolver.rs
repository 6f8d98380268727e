// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! EntityResolver trait implementation

use crate::scanner::{line_of, EntityIndex};
use crate::tokenizer::parse_entity_at;
use ifc_graph_model::{DecodedEntity, EntityId, EntityResolver, IfcType, ParseError, Result};
use rustc_hash::FxHashMap;
use std::sync::{Arc, RwLock};

/// Thread-safe entity resolver over the raw file content
pub struct ResolverImpl {
    /// Raw IFC content (owned for thread safety)
    content: String,
    /// Entity ID -> (start, end) byte offsets
    index: EntityIndex,
    /// Decoded entity cache
    cache: RwLock<FxHashMap<u32, Arc<DecodedEntity>>>,
    /// Type -> entity IDs, in file order
    type_index: FxHashMap<IfcType, Vec<EntityId>>,
}

impl ResolverImpl {
    /// Create resolver with a type index built while scanning
    pub fn new(
        content: String,
        index: EntityIndex,
        type_index: FxHashMap<IfcType, Vec<EntityId>>,
    ) -> Self {
        Self {
            content,
            index,
            cache: RwLock::new(FxHashMap::default()),
            type_index,
        }
    }

    /// Decode every record once, failing on the first malformed one
    ///
    /// Records are checked in file order so the reported error is the
    /// earliest bad line.
    pub fn decode_all(&self) -> Result<()> {
        let mut ids: Vec<(usize, u32)> = self
            .index
            .iter()
            .map(|(&id, &(start, _))| (start, id))
            .collect();
        ids.sort_unstable();

        for (_, id) in ids {
            self.decode(EntityId(id))?;
        }
        Ok(())
    }

    fn cached(&self, id: u32) -> Option<Arc<DecodedEntity>> {
        let cache = self.cache.read().ok()?;
        cache.get(&id).map(Arc::clone)
    }
}

impl EntityResolver for ResolverImpl {
    fn decode(&self, id: EntityId) -> Result<Arc<DecodedEntity>> {
        if let Some(cached) = self.cached(id.0) {
            return Ok(cached);
        }

        let &(start, end) = self
            .index
            .get(&id.0)
            .ok_or(ParseError::EntityNotFound(id))?;

        let entity = parse_entity_at(&self.content, start, end)
            .map_err(|msg| ParseError::entity_parse(id, line_of(&self.content, start), msg))?;
        let arc = Arc::new(entity);

        if let Ok(mut cache) = self.cache.write() {
            cache.insert(id.0, Arc::clone(&arc));
        }

        Ok(arc)
    }

    fn ids_by_type(&self, ifc_type: &IfcType) -> Vec<EntityId> {
        self.type_index.get(ifc_type).cloned().unwrap_or_default()
    }

    fn count_by_type(&self, ifc_type: &IfcType) -> usize {
        self.type_index.get(ifc_type).map_or(0, Vec::len)
    }

    fn all_ids(&self) -> Vec<EntityId> {
        let mut ids: Vec<EntityId> = self.index.keys().map(|&id| EntityId(id)).collect();
        ids.sort_unstable();
        ids
    }

    fn entity_count(&self) -> usize {
        self.index.len()
    }

    fn raw_bytes(&self, id: EntityId) -> Option<&[u8]> {
        let &(start, end) = self.index.get(&id.0)?;
        Some(self.content[start..end].as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scanner::EntityScanner;

    const TEST_IFC: &str = r#"ISO-10303-21;
HEADER;
FILE_SCHEMA(('IFC2X3'));
ENDSEC;
DATA;
#10=IFCWALL('guid3',$,'Wall 2',$,$,$,$,$);
#1=IFCPROJECT('guid',$,'Project',$,$,$,$,$,#2);
#2=IFCUNITASSIGNMENT((#3));
#3=IFCSIUNIT(*,.LENGTHUNIT.,.MILLI.,.METRE.);
#4=IFCWALL('guid2',$,'Wall 1',$,$,$,$,$);
ENDSEC;
END-ISO-10303-21;
"#;

    fn resolver_for(content: &str) -> ResolverImpl {
        let mut scanner = EntityScanner::new(content);
        let mut index = EntityIndex::default();
        let mut type_index: FxHashMap<IfcType, Vec<EntityId>> = FxHashMap::default();
        while let Some(record) = scanner.next_entity() {
            index.insert(record.id, (record.start, record.end));
            type_index
                .entry(IfcType::parse(record.type_name))
                .or_default()
                .push(EntityId(record.id));
        }
        ResolverImpl::new(content.to_string(), index, type_index)
    }

    #[test]
    fn test_resolver_get() {
        let resolver = resolver_for(TEST_IFC);
        let entity = resolver.get(EntityId(1)).unwrap();
        assert_eq!(entity.id, EntityId(1));
        assert_eq!(entity.get_string(2), Some("Project"));
    }

    #[test]
    fn test_type_queries_keep_file_order() {
        let resolver = resolver_for(TEST_IFC);
        let walls = resolver.entities_by_type(&IfcType::IfcWall);
        let ids: Vec<_> = walls.iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![EntityId(10), EntityId(4)]);
        assert_eq!(resolver.count_by_type(&IfcType::IfcWall), 2);
        assert_eq!(resolver.find_by_type_name("IfcProject").len(), 1);
    }

    #[test]
    fn test_all_ids_sorted() {
        let resolver = resolver_for(TEST_IFC);
        let ids: Vec<u32> = resolver.all_ids().into_iter().map(u32::from).collect();
        assert_eq!(ids, vec![1, 2, 3, 4, 10]);
    }

    #[test]
    fn test_decode_reports_missing_and_malformed() {
        let content = "ISO-10303-21;\nDATA;\n#1=IFCWALL('a',$);\n#2=IFCSLAB('b',,);\n";
        let resolver = resolver_for(content);

        assert!(matches!(
            resolver.decode(EntityId(99)),
            Err(ParseError::EntityNotFound(EntityId(99)))
        ));

        match resolver.decode_all() {
            Err(ParseError::EntityParse { id, line, .. }) => {
                assert_eq!(id, EntityId(2));
                assert_eq!(line, 4);
            }
            other => panic!("expected EntityParse, got {other:?}"),
        }
    }

    #[test]
    fn test_resolver_thread_safe() {
        use std::thread;

        let resolver = Arc::new(resolver_for(TEST_IFC));

        let handles: Vec<_> = (0..4)
            .map(|_| {
                let resolver = Arc::clone(&resolver);
                thread::spawn(move || {
                    for id in [1, 2, 3, 4, 10] {
                        assert!(resolver.get(EntityId(id)).is_some());
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }
    }
}
