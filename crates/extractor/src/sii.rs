//! Minimal text-config decoder.
//!
//! Turns the game's unit text format into a JSON value tree: units and
//! nested blocks become objects, `key[]` attributes accumulate into arrays,
//! tuples become number arrays. This covers the icon-material and locale
//! schemas; it is not a general parser for the whole config language.

use anyhow::{bail, Context};
use serde_json::{Map, Value};

struct Frame {
    /// `class : name` header this block will be nested under; `None` for
    /// transparent wrappers like the file-level `SiiNunit` unit.
    target: Option<(String, Option<String>)>,
    map: Map<String, Value>,
}

pub fn decode(data: &[u8]) -> anyhow::Result<Value> {
    let text = String::from_utf8_lossy(data);
    let mut stack = vec![Frame {
        target: None,
        map: Map::new(),
    }];
    // Header line seen, waiting for its `{` on a following line.
    let mut pending: Option<Option<(String, Option<String>)>> = None;

    for (lineno, raw) in text.lines().enumerate() {
        let line = strip_comment(raw).trim();
        if line.is_empty() {
            continue;
        }
        let err = |msg: &str| format!("line {}: {msg}", lineno + 1);

        if line == "{" {
            let target = pending.take().context(err("unexpected '{'"))?;
            stack.push(Frame {
                target,
                map: Map::new(),
            });
            continue;
        }
        if pending.is_some() {
            bail!(err("expected '{' after block header"));
        }

        if line == "}" {
            let frame = stack.pop().context(err("unbalanced '}'"))?;
            if stack.is_empty() {
                bail!(err("unbalanced '}'"));
            }
            close_frame(stack.last_mut().unwrap(), frame);
            continue;
        }

        if let Some(header) = line.strip_suffix('{') {
            let header = header.trim();
            let target = parse_header(header);
            stack.push(Frame {
                target,
                map: Map::new(),
            });
            continue;
        }

        if let Some((key, value)) = line.split_once(':') {
            let key = key.trim();
            let value = value.trim();
            if value.is_empty() {
                // `class : name` on its own line; the `{` follows.
                pending = Some(parse_header(line));
                continue;
            }
            let top = stack.last_mut().unwrap();
            if let Some(base) = key.strip_suffix(']').and_then(|k| k.split_once('[')) {
                let entry = top
                    .map
                    .entry(base.0.trim().to_string())
                    .or_insert_with(|| Value::Array(Vec::new()));
                entry
                    .as_array_mut()
                    .context(err("array attribute clashes with a scalar"))?
                    .push(parse_value(value));
            } else {
                top.map.insert(key.to_string(), parse_value(value));
            }
            continue;
        }

        if line == "SiiNunit" {
            pending = Some(None);
            continue;
        }

        bail!(err("unrecognized line"));
    }

    if stack.len() != 1 {
        bail!("unbalanced blocks at end of input");
    }
    Ok(Value::Object(stack.pop().unwrap().map))
}

fn close_frame(parent: &mut Frame, frame: Frame) {
    let value = Value::Object(frame.map);
    match frame.target {
        None => {
            // Transparent wrapper: merge children into the parent.
            if let Value::Object(map) = value {
                parent.map.extend(map);
            }
        }
        Some((class, None)) => {
            parent.map.insert(class, value);
        }
        Some((class, Some(name))) => {
            let slot = parent
                .map
                .entry(class)
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(map) = slot {
                map.insert(name, value);
            }
        }
    }
}

fn parse_header(header: &str) -> Option<(String, Option<String>)> {
    if header == "SiiNunit" || header.is_empty() {
        return None;
    }
    match header.split_once(':') {
        Some((class, name)) => Some((
            class.trim().to_string(),
            Some(dequote(name.trim()).to_string()),
        )),
        None => Some((header.to_string(), None)),
    }
}

fn parse_value(value: &str) -> Value {
    let value = value.trim();
    if let Some(inner) = value.strip_prefix('(').and_then(|v| v.strip_suffix(')')) {
        return Value::Array(inner.split(',').map(parse_value).collect());
    }
    if value.starts_with('"') {
        return Value::String(dequote(value).to_string());
    }
    if value == "true" {
        return Value::Bool(true);
    }
    if value == "false" {
        return Value::Bool(false);
    }
    if let Ok(i) = value.parse::<i64>() {
        return Value::from(i);
    }
    if let Ok(f) = value.parse::<f64>() {
        return Value::from(f);
    }
    Value::String(value.to_string())
}

fn dequote(s: &str) -> &str {
    s.strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(s)
}

fn strip_comment(line: &str) -> &str {
    // Comments never occur inside quoted strings in the files we read.
    let cut = line.find('#').into_iter().chain(line.find("//")).min();
    match cut {
        Some(idx) => &line[..idx],
        None => line,
    }
}
