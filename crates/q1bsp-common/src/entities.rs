// entities.rs — entity lump parsing
//
// The entity lump is a sequence of `{ "key" "value" ... }` blocks, tokenized with
// `com_parse`. Values are kept as text; interpreting them is up to the caller.

use crate::error::LoadError;
use crate::q_shared::{com_parse, Vec3};
use crate::qfiles::LumpKind;

/// One entity: its key/value pairs in file order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Entity {
    pub pairs: Vec<(String, String)>,
}

impl Entity {
    /// Value of `key`. When a key repeats, the last one wins.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.pairs.iter().rev().find(|(k, _)| k == key).map(|(_, v)| v.as_str())
    }

    pub fn classname(&self) -> Option<&str> {
        self.get("classname")
    }

    /// The `origin` key as a vector, if present and well formed.
    pub fn origin(&self) -> Option<Vec3> {
        let mut parts = self.get("origin")?.split_whitespace().map(|s| s.parse::<f32>());
        let v = [parts.next()?.ok()?, parts.next()?.ok()?, parts.next()?.ok()?];
        Some(v)
    }
}

fn malformed(reason: &str) -> LoadError {
    LoadError::bad_data(LumpKind::Entities, reason)
}

/// Parses the key/value pairs up to the closing brace. `data` starts just after the
/// opening brace.
fn parse_entity(data: &str) -> Result<(Entity, Option<&str>), LoadError> {
    let mut entity = Entity::default();
    let mut remaining = data;

    loop {
        // parse key
        let (key, rest) = com_parse(remaining);
        if key == "}" {
            return Ok((entity, rest));
        }
        let rest = rest.ok_or_else(|| malformed("EOF without closing brace"))?;

        // parse value
        let (value, rest) = com_parse(rest);
        if value == "}" {
            return Err(malformed("closing brace without data"));
        }
        let rest = rest.ok_or_else(|| malformed("EOF without closing brace"))?;

        entity.pairs.push((key, value));
        remaining = rest;
    }
}

/// Parses the whole entity lump.
pub fn parse_entities(text: &str) -> Result<Vec<Entity>, LoadError> {
    let mut entities = Vec::new();
    let mut rest = Some(text);

    while let Some(data) = rest {
        let (token, after) = com_parse(data);
        if token.is_empty() && after.is_none() {
            break;
        }
        if token != "{" {
            return Err(malformed(&format!("found {} when expecting {{", token)));
        }
        let after = after.ok_or_else(|| malformed("EOF without closing brace"))?;

        let (entity, after) = parse_entity(after)?;
        entities.push(entity);
        rest = after;
    }

    Ok(entities)
}

#[cfg(test)]
mod tests {
    use super::*;

    const START: &str = r#"
{
"classname" "worldspawn"
"wad" "gfx/base.wad"
"message" "the Slipgate Complex"
}
// spawn point
{
"classname" "info_player_start"
"origin" "480 -352 88"
"angle" "90"
}
"#;

    #[test]
    fn test_parse_blocks() {
        let ents = parse_entities(START).unwrap();
        assert_eq!(ents.len(), 2);
        assert_eq!(ents[0].classname(), Some("worldspawn"));
        assert_eq!(ents[0].get("message"), Some("the Slipgate Complex"));
        assert_eq!(ents[1].origin(), Some([480.0, -352.0, 88.0]));
        assert_eq!(ents[1].get("missing"), None);
    }

    #[test]
    fn test_empty_text() {
        assert!(parse_entities("").unwrap().is_empty());
        assert!(parse_entities("  \n\t ").unwrap().is_empty());
    }

    #[test]
    fn test_last_duplicate_wins() {
        let ents = parse_entities(r#"{ "a" "1" "a" "2" }"#).unwrap();
        assert_eq!(ents[0].get("a"), Some("2"));
        assert_eq!(ents[0].pairs.len(), 2);
    }

    #[test]
    fn test_eof_inside_block() {
        let err = parse_entities(r#"{ "classname" "light""#).unwrap_err();
        assert!(matches!(err, LoadError::BadLumpData { kind: LumpKind::Entities, .. }));
    }

    #[test]
    fn test_brace_without_value() {
        let err = parse_entities(r#"{ "classname" }"#).unwrap_err();
        assert!(err.to_string().contains("closing brace without data"));
    }

    #[test]
    fn test_missing_open_brace() {
        let err = parse_entities(r#""classname" "light""#).unwrap_err();
        assert!(err.to_string().contains("expecting"));
    }

    #[test]
    fn test_bad_origin() {
        let ents = parse_entities(r#"{ "origin" "1 two 3" }"#).unwrap();
        assert_eq!(ents[0].origin(), None);
    }
}
