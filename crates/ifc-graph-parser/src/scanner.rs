// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Fast entity scanner using SIMD-accelerated byte searching
//!
//! Finds record boundaries in the DATA section without decoding attributes.

use memchr::{memchr, memchr_iter, memmem};
use rustc_hash::FxHashMap;

/// Entity index mapping ID to byte offsets
pub type EntityIndex = FxHashMap<u32, (usize, usize)>;

/// One record found by the scanner
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ScannedRecord<'a> {
    pub id: u32,
    pub type_name: &'a str,
    pub start: usize,
    pub end: usize,
}

/// Fast entity scanner for IFC files
pub struct EntityScanner<'a> {
    content: &'a str,
    pos: usize,
    /// Start offset of a record that never reached its closing `;`
    unterminated: Option<usize>,
}

impl<'a> EntityScanner<'a> {
    /// Create a new scanner positioned after the `DATA;` marker
    pub fn new(content: &'a str) -> Self {
        let pos = data_section_start(content).unwrap_or(0);
        Self {
            content,
            pos,
            unterminated: None,
        }
    }

    /// Offset of a record that ran to end of file without a terminator
    pub fn unterminated(&self) -> Option<usize> {
        self.unterminated
    }

    /// Scan to find the next entity record
    pub fn next_entity(&mut self) -> Option<ScannedRecord<'a>> {
        let bytes = self.content.as_bytes();

        while self.pos < bytes.len() {
            let hash_pos = memchr(b'#', &bytes[self.pos..])?;
            self.pos += hash_pos;

            // Records start a line or follow another record; references inside
            // attribute lists are never followed by `=` so they fall out below.
            let is_entity_start = self.pos == 0
                || bytes[self.pos - 1].is_ascii_whitespace()
                || bytes[self.pos - 1] == b';';

            if !is_entity_start {
                self.pos += 1;
                continue;
            }

            let start = self.pos;
            self.pos += 1;
            let id_start = self.pos;

            while self.pos < bytes.len() && bytes[self.pos].is_ascii_digit() {
                self.pos += 1;
            }

            if self.pos == id_start {
                continue;
            }

            let Ok(id) = self.content[id_start..self.pos].parse::<u32>() else {
                continue;
            };

            self.skip_blanks();
            if self.pos >= bytes.len() || bytes[self.pos] != b'=' {
                continue;
            }
            self.pos += 1;
            self.skip_blanks();

            let type_start = self.pos;
            while self.pos < bytes.len()
                && (bytes[self.pos].is_ascii_alphanumeric() || bytes[self.pos] == b'_')
            {
                self.pos += 1;
            }

            if self.pos == type_start {
                continue;
            }

            let type_name = &self.content[type_start..self.pos];

            let Some(end) = self.find_entity_end() else {
                self.unterminated = Some(start);
                return None;
            };

            return Some(ScannedRecord {
                id,
                type_name,
                start,
                end,
            });
        }

        None
    }

    fn skip_blanks(&mut self) {
        let bytes = self.content.as_bytes();
        while self.pos < bytes.len() && (bytes[self.pos] == b' ' || bytes[self.pos] == b'\t') {
            self.pos += 1;
        }
    }

    /// Find the end of an entity (semicolon), handling quoted strings
    fn find_entity_end(&mut self) -> Option<usize> {
        let bytes = self.content.as_bytes();
        let mut in_string = false;

        while self.pos < bytes.len() {
            match bytes[self.pos] {
                b'\'' => {
                    if in_string && self.pos + 1 < bytes.len() && bytes[self.pos + 1] == b'\'' {
                        self.pos += 2;
                        continue;
                    }
                    in_string = !in_string;
                }
                b';' if !in_string => {
                    self.pos += 1;
                    return Some(self.pos);
                }
                _ => {}
            }
            self.pos += 1;
        }

        None
    }

    /// Build an index of all entities (ID -> byte offsets)
    pub fn build_index(content: &'a str) -> EntityIndex {
        let mut scanner = Self::new(content);
        let mut index = FxHashMap::default();

        while let Some(record) = scanner.next_entity() {
            index.insert(record.id, (record.start, record.end));
        }

        index
    }

    /// Count entities by upper-cased type name
    pub fn count_by_type(content: &'a str) -> FxHashMap<String, usize> {
        let mut scanner = Self::new(content);
        let mut counts: FxHashMap<String, usize> = FxHashMap::default();

        while let Some(record) = scanner.next_entity() {
            *counts
                .entry(record.type_name.to_ascii_uppercase())
                .or_insert(0) += 1;
        }

        counts
    }
}

/// Byte offset just past the `DATA;` marker, if the file has one
pub fn data_section_start(content: &str) -> Option<usize> {
    memmem::find(content.as_bytes(), b"DATA;").map(|p| p + 5)
}

/// 1-based line number of a byte offset
pub fn line_of(content: &str, offset: usize) -> usize {
    let end = offset.min(content.len());
    memchr_iter(b'\n', &content.as_bytes()[..end]).count() + 1
}

/// Header information extracted from IFC file
#[derive(Clone, Debug, Default)]
pub struct HeaderInfo {
    pub schema_version: String,
    pub file_description: Option<String>,
    pub file_name: Option<String>,
    pub timestamp: Option<String>,
    pub author: Option<String>,
    pub organization: Option<String>,
    pub preprocessor_version: Option<String>,
    pub originating_system: Option<String>,
}

/// Parse the header section to extract metadata
pub fn parse_header(content: &str) -> HeaderInfo {
    let mut info = HeaderInfo::default();

    let header_start = content.find("HEADER;").unwrap_or(0);
    let header_end = content[header_start..]
        .find("ENDSEC;")
        .map(|p| header_start + p)
        .unwrap_or(content.len());
    let header = &content[header_start..header_end];

    if let Some(args) = header_args(header, "FILE_SCHEMA") {
        if let Some((schemas, _)) = parse_header_list(args) {
            info.schema_version = schemas.into_iter().next().unwrap_or_default();
        }
    }

    if let Some(args) = header_args(header, "FILE_DESCRIPTION") {
        if let Some((descriptions, _)) = parse_header_list(args) {
            if !descriptions.is_empty() {
                info.file_description = Some(descriptions.join("; "));
            }
        }
    }

    // FILE_NAME(name, timestamp, (author), (organization), preprocessor, originating_system, authorization)
    if let Some(args) = header_args(header, "FILE_NAME") {
        let mut rest = args;
        let mut fields: Vec<Option<String>> = Vec::new();
        for position in 0..6 {
            let parsed = if position == 2 || position == 3 {
                parse_header_list(rest).map(|(items, r)| (items.into_iter().next(), r))
            } else {
                parse_header_string(rest).map(|(s, r)| (Some(s).filter(|s| !s.is_empty()), r))
            };
            let Some((value, r)) = parsed else { break };
            fields.push(value);
            rest = r.trim_start().strip_prefix(',').unwrap_or(r);
        }
        let mut fields = fields.into_iter();
        info.file_name = fields.next().flatten();
        info.timestamp = fields.next().flatten();
        info.author = fields.next().flatten();
        info.organization = fields.next().flatten();
        info.preprocessor_version = fields.next().flatten();
        info.originating_system = fields.next().flatten();
    }

    info
}

/// Text after `KEYWORD(` in the header, if the keyword is present
fn header_args<'h>(header: &'h str, keyword: &str) -> Option<&'h str> {
    let at = header.find(keyword)?;
    let after = &header[at + keyword.len()..];
    let paren = after.find('(')?;
    Some(&after[paren + 1..])
}

/// Parse a string from header ('value')
fn parse_header_string(s: &str) -> Option<(String, &str)> {
    let s = s.trim_start();
    if let Some(rest) = s.strip_prefix('$') {
        return Some((String::new(), rest));
    }
    let body = s.strip_prefix('\'')?;

    let bytes = body.as_bytes();
    let mut end = 0;
    loop {
        match bytes.get(end) {
            Some(b'\'') if bytes.get(end + 1) == Some(&b'\'') => end += 2,
            Some(b'\'') => break,
            Some(_) => end += 1,
            None => return None,
        }
    }

    Some((body[..end].replace("''", "'"), &body[end + 1..]))
}

/// Parse a list from header (('value1', 'value2'))
fn parse_header_list(s: &str) -> Option<(Vec<String>, &str)> {
    let s = s.trim_start();
    let Some(mut current) = s.strip_prefix('(') else {
        // A bare string where a list is expected
        return parse_header_string(s).map(|(v, r)| (vec![v], r));
    };

    let mut items = Vec::new();
    loop {
        current = current.trim_start();
        if let Some(rest) = current.strip_prefix(')') {
            return Some((items, rest));
        }

        let (item, rest) = parse_header_string(current)?;
        if !item.is_empty() {
            items.push(item);
        }
        current = rest.trim_start();
        current = current.strip_prefix(',').unwrap_or(current);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_IFC: &str = r#"ISO-10303-21;
HEADER;
FILE_DESCRIPTION(('ViewDefinition [CoordinationView]'),'2;1');
FILE_NAME('test.ifc','2024-01-01T00:00:00',('Author'),('Org'),'Preprocessor','App','');
FILE_SCHEMA(('IFC4'));
ENDSEC;
DATA;
#1=IFCPROJECT('guid',$,'Project',$,$,$,$,$,#2);
#2=IFCUNITASSIGNMENT((#3));
#3=IFCSIUNIT(*,.LENGTHUNIT.,.MILLI.,.METRE.);
  #4 = IFCWALL('guid;with#4=semicolon',$,'Wall 1',$,$,#5,#6,$);
ENDSEC;
END-ISO-10303-21;
"#;

    #[test]
    fn test_scanner_finds_entities_in_order() {
        let mut scanner = EntityScanner::new(TEST_IFC);
        let mut entities = Vec::new();

        while let Some(record) = scanner.next_entity() {
            entities.push((record.id, record.type_name.to_string()));
        }

        assert_eq!(entities.len(), 4);
        assert_eq!(entities[0], (1, "IFCPROJECT".to_string()));
        assert_eq!(entities[3], (4, "IFCWALL".to_string()));
        assert_eq!(scanner.unterminated(), None);
    }

    #[test]
    fn test_build_index() {
        let index = EntityScanner::build_index(TEST_IFC);
        assert_eq!(index.len(), 4);
        let (start, end) = index[&4];
        assert!(TEST_IFC[start..end].ends_with("$);"));
    }

    #[test]
    fn test_count_by_type() {
        let counts = EntityScanner::count_by_type(TEST_IFC);
        assert_eq!(counts.get("IFCPROJECT"), Some(&1));
        assert_eq!(counts.get("IFCWALL"), Some(&1));
    }

    #[test]
    fn test_unterminated_record_is_flagged() {
        let content = "ISO-10303-21;\nDATA;\n#1=IFCWALL('a',$);\n#2=IFCSLAB('b',$\n";
        let mut scanner = EntityScanner::new(content);
        assert_eq!(scanner.next_entity().map(|r| r.id), Some(1));
        assert_eq!(scanner.next_entity(), None);
        let start = scanner.unterminated().unwrap();
        assert_eq!(line_of(content, start), 4);
    }

    #[test]
    fn test_parse_header() {
        let info = parse_header(TEST_IFC);
        assert_eq!(info.schema_version, "IFC4");
        assert_eq!(info.file_name.as_deref(), Some("test.ifc"));
        assert_eq!(info.author.as_deref(), Some("Author"));
        assert_eq!(info.organization.as_deref(), Some("Org"));
        assert_eq!(info.originating_system.as_deref(), Some("App"));
        assert_eq!(
            info.file_description.as_deref(),
            Some("ViewDefinition [CoordinationView]")
        );
    }
}
