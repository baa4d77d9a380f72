use anyhow::{bail, Result};
use serde_yaml::{Mapping, Value};

/// Dot-path addressing into a YAML document, with `name[0]` array indices.
/// `set` creates intermediate mappings and pads sequences as needed, so the
/// projector can target keys the template does not carry yet.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Segment {
    Key(String),
    Index(usize),
}

fn parse_path(path: &str) -> Result<Vec<Segment>> {
    let mut segments = Vec::new();
    for part in path.split('.') {
        if part.is_empty() {
            bail!("empty segment in key path `{path}`");
        }
        let (name, indices) = match part.find('[') {
            Some(open) => part.split_at(open),
            None => (part, ""),
        };
        if name.is_empty() {
            bail!("key path `{path}`: segment `{part}` has no name");
        }
        segments.push(Segment::Key(name.to_owned()));
        if !indices.is_empty() {
            if !indices.ends_with(']') {
                bail!("key path `{path}`: unterminated index in `{part}`");
            }
            for index in indices[1..indices.len() - 1].split("][") {
                let index: usize = index
                    .parse()
                    .map_err(|_| anyhow::anyhow!("key path `{path}`: bad index in `{part}`"))?;
                segments.push(Segment::Index(index));
            }
        }
    }
    Ok(segments)
}

pub fn set(doc: &mut Value, path: &str, value: Value) -> Result<()> {
    let segments = parse_path(path)?;
    let mut current = doc;
    let last = segments.len() - 1;
    for (i, segment) in segments.iter().enumerate() {
        match segment {
            Segment::Key(k) => {
                if current.is_null() {
                    *current = Value::Mapping(Mapping::new());
                }
                let Some(map) = current.as_mapping_mut() else {
                    bail!("key path `{path}`: `{k}` addresses a non-mapping value");
                };
                let key = Value::String(k.clone());
                if i == last {
                    map.insert(key, value);
                    return Ok(());
                }
                if !map.contains_key(&key) {
                    map.insert(key.clone(), Value::Null);
                }
                current = map.get_mut(&key).unwrap();
            }
            Segment::Index(n) => {
                if current.is_null() {
                    *current = Value::Sequence(Vec::new());
                }
                let Some(seq) = current.as_sequence_mut() else {
                    bail!("key path `{path}`: index {n} addresses a non-sequence value");
                };
                while seq.len() <= *n {
                    seq.push(Value::Null);
                }
                if i == last {
                    seq[*n] = value;
                    return Ok(());
                }
                current = &mut seq[*n];
            }
        }
    }
    Ok(())
}

pub fn get<'a>(doc: &'a Value, path: &str) -> Result<Option<&'a Value>> {
    let mut current = doc;
    for segment in parse_path(path)? {
        let next = match segment {
            Segment::Key(k) => current
                .as_mapping()
                .and_then(|m| m.get(&Value::String(k))),
            Segment::Index(n) => current.as_sequence().and_then(|s| s.get(n)),
        };
        match next {
            Some(v) => current = v,
            None => return Ok(None),
        }
    }
    Ok(Some(current))
}
