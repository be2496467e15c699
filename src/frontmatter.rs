use std::collections::BTreeMap;

use crate::value::Value;

/// The front-matter block of a template, if present.
#[derive(Debug, Clone, PartialEq)]
pub struct FrontMatter {
    /// The raw text between the `---` fences, without the fences.
    pub raw: String,
    /// Flat `key: value` scalar lines parsed out of the block. Nested YAML
    /// structures are kept only in `raw`; the engine itself consumes nothing
    /// from here.
    pub entries: BTreeMap<String, Value>,
}

/// Split an optional leading front-matter block off a template source.
///
/// Front matter starts with a `---` line at the very beginning of the
/// document and ends at the next `---` line. Returns the parsed block (if
/// any) and the byte offset at which the template body starts. Without a
/// closing fence the document is treated as having no front matter.
pub fn split(source: &str) -> (Option<FrontMatter>, usize) {
    let Some(after_open) = strip_fence_line(source) else {
        return (None, 0);
    };

    let mut cursor = after_open;
    while cursor <= source.len() {
        let rest = &source[cursor..];
        match strip_fence_line(rest) {
            Some(consumed) => {
                let raw = source[after_open..cursor].to_owned();
                let entries = parse_scalars(&raw);
                return (Some(FrontMatter { raw, entries }), cursor + consumed);
            }
            None => match rest.find('\n') {
                Some(newline) => cursor += newline + 1,
                None => break,
            },
        }
    }

    (None, 0)
}

/// If `text` begins with a `---` fence line, return the byte count of that
/// line including its newline.
fn strip_fence_line(text: &str) -> Option<usize> {
    let line_end = text.find('\n').map(|index| index + 1).unwrap_or(text.len());
    let line = text[..line_end].trim_end_matches(['\n', '\r']);

    (line == "---").then_some(line_end)
}

fn parse_scalars(raw: &str) -> BTreeMap<String, Value> {
    let mut entries = BTreeMap::new();

    for line in raw.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }

        let Some((key, value)) = trimmed.split_once(':') else {
            continue;
        };

        let key = key.trim();
        // Indented lines belong to nested structures we do not model.
        if key.is_empty() || line.starts_with([' ', '\t']) {
            continue;
        }

        entries.insert(key.to_owned(), parse_scalar(value.trim()));
    }

    entries
}

fn parse_scalar(text: &str) -> Value {
    match text {
        "" | "~" | "null" => Value::Null,
        "true" => Value::Bool(true),
        "false" => Value::Bool(false),
        _ => {
            if let Ok(value) = text.parse::<i64>() {
                return Value::Int(value);
            }
            if let Ok(value) = text.parse::<f64>() {
                return Value::Float(value);
            }

            let unquoted = text
                .strip_prefix('"')
                .and_then(|rest| rest.strip_suffix('"'))
                .or_else(|| {
                    text.strip_prefix('\'')
                        .and_then(|rest| rest.strip_suffix('\''))
                })
                .unwrap_or(text);

            Value::from(unquoted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_front_matter() {
        let (front_matter, offset) = split("Hello, world!");

        assert_eq!(None, front_matter);
        assert_eq!(0, offset);
    }

    #[test]
    fn test_basic_block() {
        let source = "---\nname: greeting\nversion: 2\n---\nHello!";
        let (front_matter, offset) = split(source);

        let front_matter = front_matter.expect("should detect front matter");
        assert_eq!("name: greeting\nversion: 2\n", front_matter.raw);
        assert_eq!(
            Some(&Value::from("greeting")),
            front_matter.entries.get("name")
        );
        assert_eq!(Some(&Value::Int(2)), front_matter.entries.get("version"));
        assert_eq!("Hello!", &source[offset..]);
    }

    #[test]
    fn test_unclosed_fence_is_plain_text() {
        let (front_matter, offset) = split("---\nname: greeting\nHello!");

        assert_eq!(None, front_matter);
        assert_eq!(0, offset);
    }

    #[test]
    fn test_scalar_types() {
        let source = "---\nflag: true\nratio: 0.5\nempty:\nquoted: \"a: b\"\n---\n";
        let (front_matter, _) = split(source);

        let entries = front_matter.expect("should detect front matter").entries;
        assert_eq!(Some(&Value::Bool(true)), entries.get("flag"));
        assert_eq!(Some(&Value::Float(0.5)), entries.get("ratio"));
        assert_eq!(Some(&Value::Null), entries.get("empty"));
        assert_eq!(Some(&Value::from("a: b")), entries.get("quoted"));
    }

    #[test]
    fn test_nested_lines_are_skipped() {
        let source = "---\nagent:\n  model: big\nname: x\n---\nbody";
        let (front_matter, _) = split(source);

        let entries = front_matter.expect("should detect front matter").entries;
        assert_eq!(None, entries.get("model"));
        assert_eq!(Some(&Value::from("x")), entries.get("name"));
    }

    #[test]
    fn test_fence_must_open_document() {
        let (front_matter, offset) = split("x\n---\nname: y\n---\n");

        assert_eq!(None, front_matter);
        assert_eq!(0, offset);
    }
}
