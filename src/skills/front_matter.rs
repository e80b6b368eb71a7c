use serde_yaml::Value;
use std::collections::BTreeMap;

pub type FrontMatter = BTreeMap<String, Value>;

const MARKER: &str = "---";

/// Split a leading `---` delimited YAML block from a markdown document.
///
/// Anything short of a well-formed block (no closing marker, YAML that does
/// not parse to a mapping) yields an empty map and the untouched document.
pub fn split_front_matter(content: &str) -> (FrontMatter, String) {
    match try_split(content) {
        Some((meta, body)) => (meta, body),
        None => (FrontMatter::new(), content.to_string()),
    }
}

fn try_split(content: &str) -> Option<(FrontMatter, String)> {
    let mut lines = content.split_inclusive('\n');
    let first = lines.next()?;
    if first.trim_end() != MARKER {
        return None;
    }

    let mut offset = first.len();
    let yaml_start = offset;
    for line in lines {
        if line.trim_end() == MARKER {
            let yaml = &content[yaml_start..offset];
            let body = content[offset + line.len()..].trim();
            let meta = parse_mapping(yaml)?;
            return Some((meta, body.to_string()));
        }
        offset += line.len();
    }
    None
}

fn parse_mapping(yaml: &str) -> Option<FrontMatter> {
    match serde_yaml::from_str::<Value>(yaml).ok()? {
        Value::Null => Some(FrontMatter::new()),
        Value::Mapping(map) => {
            let mut out = FrontMatter::new();
            for (key, value) in map {
                let key = match key {
                    Value::String(s) => s,
                    other => serde_yaml::to_string(&other).ok()?.trim().to_string(),
                };
                out.insert(key, value);
            }
            Some(out)
        }
        _ => None,
    }
}
