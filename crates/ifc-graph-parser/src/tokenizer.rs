// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! STEP file tokenizer using nom combinators
//!
//! Parses STEP/IFC entity records into tokens. Every malformed record is an
//! error here; nothing is silently defaulted.

use ifc_graph_model::{AttributeValue, DecodedEntity, EntityId, IfcType};
use nom::{
    branch::alt,
    bytes::complete::{tag, take_until, take_while, take_while1},
    character::complete::{char, multispace0, multispace1},
    combinator::{opt, recognize},
    error::{Error, ErrorKind},
    multi::{many0, separated_list0},
    sequence::{delimited, pair},
    IResult, Parser,
};

/// Raw token from STEP file (before conversion to AttributeValue)
#[derive(Clone, Debug, PartialEq)]
pub enum Token<'a> {
    /// Entity reference (#123)
    EntityRef(u32),
    /// String value ('text'), still escaped
    String(&'a str),
    /// Integer value
    Integer(i64),
    /// Float value
    Float(f64),
    /// Enumeration (.VALUE.)
    Enum(&'a str),
    /// List of tokens
    List(Vec<Token<'a>>),
    /// Typed value like IFCLABEL('text')
    TypedValue(&'a str, Vec<Token<'a>>),
    /// Null value ($)
    Null,
    /// Derived value (*)
    Derived,
}

impl<'a> Token<'a> {
    /// Convert token to owned AttributeValue
    pub fn to_attribute_value(&self) -> AttributeValue {
        match self {
            Token::EntityRef(id) => AttributeValue::EntityRef(EntityId(*id)),
            Token::String(s) => AttributeValue::String(decode_step_string(s)),
            Token::Integer(i) => AttributeValue::Integer(*i),
            Token::Float(f) => AttributeValue::Float(*f),
            Token::Enum(s) => AttributeValue::Enum((*s).to_string()),
            Token::List(items) => {
                AttributeValue::List(items.iter().map(|t| t.to_attribute_value()).collect())
            }
            Token::TypedValue(name, args) => AttributeValue::TypedValue(
                (*name).to_string(),
                args.iter().map(|t| t.to_attribute_value()).collect(),
            ),
            Token::Null => AttributeValue::Null,
            Token::Derived => AttributeValue::Derived,
        }
    }
}

/// Undo STEP string escaping
///
/// Handles doubled quotes, `\\`, `\X\hh` (ISO 8859-1) and `\X2\...\X0\`
/// (UTF-16 hex). Unrecognised escapes are kept verbatim.
pub fn decode_step_string(raw: &str) -> String {
    let unquoted = raw.replace("''", "'");
    if !unquoted.contains('\\') {
        return unquoted;
    }

    let mut out = String::with_capacity(unquoted.len());
    let mut rest = unquoted.as_str();
    while let Some(pos) = rest.find('\\') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];

        if let Some(after) = rest.strip_prefix("\\X2\\") {
            if let Some(end) = after.find("\\X0\\") {
                let units: Vec<u16> = after[..end]
                    .as_bytes()
                    .chunks(4)
                    .filter_map(|chunk| {
                        std::str::from_utf8(chunk)
                            .ok()
                            .and_then(|hex| u16::from_str_radix(hex, 16).ok())
                    })
                    .collect();
                out.push_str(&String::from_utf16_lossy(&units));
                rest = &after[end + 4..];
                continue;
            }
        } else if let Some(after) = rest.strip_prefix("\\X\\") {
            if let Some(byte) = after.get(..2).and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(byte as char);
                rest = &after[2..];
                continue;
            }
        } else if let Some(after) = rest.strip_prefix("\\\\") {
            out.push('\\');
            rest = after;
            continue;
        }

        out.push('\\');
        rest = &rest[1..];
    }
    out.push_str(rest);
    out
}

// ============================================================================
// Parsing Primitives
// ============================================================================

/// Parse a `/* ... */` comment
fn comment(input: &str) -> IResult<&str, &str> {
    delimited(tag("/*"), take_until("*/"), tag("*/")).parse(input)
}

/// Parse whitespace (including comments)
fn ws(input: &str) -> IResult<&str, ()> {
    let (input, _) = multispace0(input)?;
    let (input, _) = many0(alt((comment, multispace1))).parse(input)?;
    Ok((input, ()))
}

/// Parse an entity reference (#123)
fn entity_ref(input: &str) -> IResult<&str, Token<'_>> {
    let (rest, _) = char('#')(input)?;
    let (rest, digits) = take_while1(|c: char| c.is_ascii_digit())(rest)?;
    let id = digits
        .parse::<u32>()
        .map_err(|_| nom::Err::Failure(Error::new(input, ErrorKind::Digit)))?;
    Ok((rest, Token::EntityRef(id)))
}

/// Parse a STEP string ('text' with '' for escaped quotes)
fn step_string(input: &str) -> IResult<&str, Token<'_>> {
    let (body, _) = char('\'')(input)?;

    // Find the end of the string, handling escaped quotes ('')
    let bytes = body.as_bytes();
    let mut end = 0;
    loop {
        match bytes.get(end) {
            Some(b'\'') if bytes.get(end + 1) == Some(&b'\'') => end += 2,
            Some(b'\'') => break,
            Some(_) => end += 1,
            None => return Err(nom::Err::Failure(Error::new(input, ErrorKind::Char))),
        }
    }

    Ok((&body[end + 1..], Token::String(&body[..end])))
}

/// Parse a number (integer or float)
fn number(input: &str) -> IResult<&str, Token<'_>> {
    let (rest, num_str) = recognize((
        opt(alt((char('-'), char('+')))),
        take_while1(|c: char| c.is_ascii_digit()),
        opt(pair(char('.'), take_while(|c: char| c.is_ascii_digit()))),
        opt((
            alt((char('e'), char('E'))),
            opt(alt((char('+'), char('-')))),
            take_while1(|c: char| c.is_ascii_digit()),
        )),
    ))
    .parse(input)?;

    let bad_number = |_| nom::Err::Failure(Error::new(input, ErrorKind::Float));
    let digits = num_str.strip_prefix('+').unwrap_or(num_str);

    // Use lexical-core for fast parsing
    if digits.contains(['.', 'e', 'E']) {
        let f: f64 = lexical_core::parse(digits.as_bytes()).map_err(bad_number)?;
        Ok((rest, Token::Float(f)))
    } else {
        let i: i64 = lexical_core::parse(digits.as_bytes()).map_err(bad_number)?;
        Ok((rest, Token::Integer(i)))
    }
}

/// Parse an enumeration (.VALUE.)
fn enumeration(input: &str) -> IResult<&str, Token<'_>> {
    let (input, _) = char('.')(input)?;
    let (input, name) = take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)?;
    let (input, _) = char('.')(input)?;
    Ok((input, Token::Enum(name)))
}

/// Parse null ($)
fn null_value(input: &str) -> IResult<&str, Token<'_>> {
    let (input, _) = char('$')(input)?;
    Ok((input, Token::Null))
}

/// Parse derived (*)
fn derived_value(input: &str) -> IResult<&str, Token<'_>> {
    let (input, _) = char('*')(input)?;
    Ok((input, Token::Derived))
}

/// Parenthesised, comma separated tokens
fn token_list(input: &str) -> IResult<&str, Vec<Token<'_>>> {
    delimited(
        pair(char('('), ws),
        separated_list0((ws, char(','), ws), token),
        pair(ws, char(')')),
    )
    .parse(input)
}

/// Parse a list of tokens
fn list(input: &str) -> IResult<&str, Token<'_>> {
    let (input, items) = token_list(input)?;
    Ok((input, Token::List(items)))
}

/// Parse a typed value like IFCLABEL('text')
fn typed_value(input: &str) -> IResult<&str, Token<'_>> {
    let (input, type_name) = take_while1(|c: char| c.is_alphanumeric() || c == '_')(input)?;
    let (input, _) = ws(input)?;
    let (input, args) = token_list(input)?;
    Ok((input, Token::TypedValue(type_name, args)))
}

/// Parse any token
fn token(input: &str) -> IResult<&str, Token<'_>> {
    alt((
        entity_ref,
        step_string,
        null_value,
        derived_value,
        enumeration,
        number,
        list,
        typed_value,
    ))
    .parse(input)
}

// ============================================================================
// Entity Parsing
// ============================================================================

/// Describe a nom failure relative to the record it happened in
fn describe(record: &str, err: nom::Err<Error<&str>>) -> String {
    match err {
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            let offset = record.len() - e.input.len();
            let near: String = e.input.chars().take(24).collect();
            format!("{:?} at byte {} near `{}`", e.code, offset, near)
        }
        nom::Err::Incomplete(_) => "unexpected end of record".to_string(),
    }
}

/// Parse a complete entity definition
///
/// Format: `#123=IFCWALL(attr1,attr2,...);`
pub fn parse_entity(record: &str) -> Result<DecodedEntity, String> {
    let input = record.trim_start();

    let (input, _) = char::<&str, Error<&str>>('#')
        .parse(input)
        .map_err(|_| "Expected # at start of entity".to_string())?;

    let (input, id_str) = take_while1::<_, &str, Error<&str>>(|c: char| c.is_ascii_digit())
        .parse(input)
        .map_err(|_| "Expected entity ID".to_string())?;

    let id: u32 = id_str
        .parse()
        .map_err(|_| format!("Invalid entity ID `{}`", id_str))?;

    let (input, _) = (ws, char('='), ws)
        .parse(input)
        .map_err(|_: nom::Err<Error<&str>>| "Expected = after entity ID".to_string())?;

    let (input, type_name) =
        take_while1::<_, &str, Error<&str>>(|c: char| c.is_alphanumeric() || c == '_')
            .parse(input)
            .map_err(|_| "Expected type name".to_string())?;

    let (input, _) = ws(input).map_err(|e| describe(record, e))?;

    let (input, tokens) = token_list(input)
        .map_err(|e| format!("Failed to parse attributes: {}", describe(record, e)))?;

    let (input, _) = ws(input).map_err(|e| describe(record, e))?;
    if !(input.is_empty() || input.starts_with(';')) {
        return Err(format!(
            "Unexpected content after attribute list: `{}`",
            input.chars().take(24).collect::<String>()
        ));
    }

    Ok(DecodedEntity {
        id: EntityId(id),
        ifc_type: IfcType::parse(type_name),
        attributes: tokens.iter().map(|t| t.to_attribute_value()).collect(),
    })
}

/// Parse entity from raw content at given byte range
pub fn parse_entity_at(content: &str, start: usize, end: usize) -> Result<DecodedEntity, String> {
    content
        .get(start..end)
        .ok_or_else(|| format!("Record range {}..{} is out of bounds", start, end))
        .and_then(parse_entity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_entity_ref() {
        let (remaining, token) = entity_ref("#123").unwrap();
        assert_eq!(remaining, "");
        assert_eq!(token, Token::EntityRef(123));
    }

    #[test]
    fn test_parse_string_keeps_raw_escapes() {
        let (remaining, token) = step_string("'it''s a test'").unwrap();
        assert_eq!(remaining, "");
        assert_eq!(token, Token::String("it''s a test"));
        assert_eq!(
            token.to_attribute_value(),
            AttributeValue::String("it's a test".to_string())
        );
    }

    #[test]
    fn test_unterminated_string_fails() {
        assert!(step_string("'never closed").is_err());
    }

    #[test]
    fn test_decode_step_string_escapes() {
        assert_eq!(decode_step_string("Stra\\X\\DFe"), "Straße");
        assert_eq!(decode_step_string("\\X2\\00C400D6\\X0\\ra"), "ÄÖra");
        assert_eq!(decode_step_string("a\\\\b"), "a\\b");
        assert_eq!(decode_step_string("plain"), "plain");
    }

    #[test]
    fn test_parse_numbers() {
        assert_eq!(number("42").unwrap().1, Token::Integer(42));
        assert_eq!(number("-7").unwrap().1, Token::Integer(-7));

        let Token::Float(f) = number("1.5E-3").unwrap().1 else {
            panic!("Expected float");
        };
        approx::assert_relative_eq!(f, 0.0015);

        let Token::Float(f) = number("3.").unwrap().1 else {
            panic!("Expected float");
        };
        approx::assert_relative_eq!(f, 3.0);
    }

    #[test]
    fn test_parse_enum() {
        let (remaining, token) = enumeration(".TRUE.").unwrap();
        assert_eq!(remaining, "");
        assert_eq!(token, Token::Enum("TRUE"));
    }

    #[test]
    fn test_parse_nested_list() {
        let (remaining, token) = list("((0.,0.,0.), (1.,0.,0.))").unwrap();
        assert_eq!(remaining, "");
        let Token::List(items) = token else {
            panic!("Expected list");
        };
        assert_eq!(items.len(), 2);
        assert!(matches!(&items[0], Token::List(inner) if inner.len() == 3));
    }

    #[test]
    fn test_parse_entity() {
        let entity = parse_entity("#1=IFCWALL('abc',$,#2);").unwrap();
        assert_eq!(entity.id, EntityId(1));
        assert_eq!(entity.ifc_type, IfcType::IfcWall);
        assert_eq!(entity.attributes.len(), 3);
    }

    #[test]
    fn test_parse_entity_with_typed_value_and_comment() {
        let entity =
            parse_entity("#9 = IFCPROPERTYSINGLEVALUE('Width', /* mm */ $, IFCLENGTHMEASURE(250.), $);")
                .unwrap();
        assert_eq!(entity.get_float(2), Some(250.0));
    }

    #[test]
    fn test_malformed_entity_reports_position() {
        let err = parse_entity("#4=IFCWALL('guid',$,'Wall 1',@@,$);").unwrap_err();
        assert!(err.starts_with("Failed to parse attributes"), "{err}");

        let err = parse_entity("#4=IFCWALL('guid') trailing;").unwrap_err();
        assert!(err.contains("Unexpected content"), "{err}");
    }
}
