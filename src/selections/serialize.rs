//! Selections document (de)serialization (spec.md §4.7, §6).
//!
//! Scoped to exactly the one namespace and element set spec.md §6
//! names — `<selections>`, `<selection>`, `<requires>`, and the
//! binding elements — so this is hand-written text assembly/parsing
//! rather than a pull in a general XML parser dependency. Foreign
//! namespaces are round-tripped through synthetic `nsN:` prefixes
//! declared on whichever `<selection>` uses them.

use std::collections::BTreeSet;

use indexmap::IndexMap;

use crate::core::{Binding, Version};
use crate::errors::{Error, Result};
use crate::selections::{Selection, Selections};

const NS: &str = "http://zero-install.sourceforge.net/2004/injector/interface";

pub fn serialize(selections: &Selections) -> String {
    let mut out = String::new();
    out.push_str("<?xml version=\"1.0\" ?>\n");
    out.push_str(&format!(
        "<selections xmlns=\"{NS}\" interface=\"{}\">\n",
        escape(&selections.root_uri)
    ));
    for (uri, selection) in &selections.selections {
        write_selection(&mut out, uri, selection);
    }
    out.push_str("</selections>\n");
    out
}

fn write_selection(out: &mut String, uri: &str, selection: &Selection) {
    let attrs: Vec<(&(String, String), &String)> = selection
        .attrs
        .iter()
        .filter(|((namespace, local_name), _)| {
            !(namespace.is_empty() && super::TRANSIENT_ATTRS.contains(&local_name.as_str()))
        })
        .collect();

    let mut prefixes: IndexMap<String, String> = IndexMap::new();
    for (namespace, _) in attrs.iter().map(|(key, _)| key) {
        if namespace.is_empty() {
            continue;
        }
        if !prefixes.contains_key(namespace) {
            prefixes.insert(namespace.clone(), format!("ns{}", prefixes.len()));
        }
    }

    out.push_str(&format!("  <selection interface=\"{}\" id=\"{}\" version=\"{}\"", escape(uri), escape(&selection.id), escape(&selection.version.to_string())));
    if let Some(local_path) = &selection.local_path {
        out.push_str(&format!(" local-path=\"{}\"", escape(local_path)));
    }
    if !selection.digests.is_empty() {
        let joined = selection.digests.iter().cloned().collect::<Vec<_>>().join(" ");
        out.push_str(&format!(" digests=\"{}\"", escape(&joined)));
    }
    for (namespace, prefix) in &prefixes {
        out.push_str(&format!(" xmlns:{prefix}=\"{}\"", escape(namespace)));
    }
    for ((namespace, local_name), value) in &attrs {
        if namespace.is_empty() {
            out.push_str(&format!(" {}=\"{}\"", local_name, escape(value)));
        } else {
            let prefix = &prefixes[namespace];
            out.push_str(&format!(" {prefix}:{local_name}=\"{}\"", escape(value)));
        }
    }
    out.push_str(">\n");

    for (dep_uri, bindings) in &selection.dependencies {
        if bindings.is_empty() {
            out.push_str(&format!("    <requires interface=\"{}\"/>\n", escape(dep_uri)));
        } else {
            out.push_str(&format!("    <requires interface=\"{}\">\n", escape(dep_uri)));
            for binding in bindings {
                write_binding(out, binding, "      ");
            }
            out.push_str("    </requires>\n");
        }
    }
    for binding in &selection.bindings {
        write_binding(out, binding, "    ");
    }

    out.push_str("  </selection>\n");
}

fn write_binding(out: &mut String, binding: &Binding, indent: &str) {
    match binding {
        Binding::InsertPath { name, insert, separator } => {
            out.push_str(&format!("{indent}<binding-insert-path name=\"{}\" insert=\"{}\"", escape(name), escape(insert)));
            if let Some(separator) = separator {
                out.push_str(&format!(" separator=\"{}\"", escape(separator)));
            }
            out.push_str("/>\n");
        }
        Binding::SetEnv { name, value } => {
            out.push_str(&format!("{indent}<binding-set-env name=\"{}\" value=\"{}\"/>\n", escape(name), escape(value)));
        }
    }
}

/// Parse a document produced by [`serialize`]. Round-trips every field
/// `Selections`/`Selection` carry, including foreign-namespace attrs
/// (spec.md §8 "Round-trip").
pub fn deserialize(document: &str) -> Result<Selections> {
    let root_tag_start = document
        .find("<selections")
        .ok_or_else(|| bad_document("missing <selections> root"))?;
    let root_tag_end = document[root_tag_start..]
        .find('>')
        .map(|i| root_tag_start + i)
        .ok_or_else(|| bad_document("unterminated <selections> root tag"))?;
    let root_attrs = parse_attrs(&document[root_tag_start + "<selections".len()..root_tag_end])?;
    let root_uri = attr_value(&root_attrs, "", "interface").ok_or_else(|| bad_document("root missing interface"))?;

    let mut selections = IndexMap::new();
    let mut cursor = root_tag_end + 1;
    while let Some(rel_start) = document[cursor..].find("<selection ") {
        let start = cursor + rel_start;
        let (uri, selection, next) = parse_selection(document, start)?;
        selections.insert(uri, selection);
        cursor = next;
    }

    Ok(Selections { root_uri, selections })
}

fn parse_selection(document: &str, start: usize) -> Result<(String, Selection, usize)> {
    let tag_close = document[start..]
        .find('>')
        .map(|i| start + i)
        .ok_or_else(|| bad_document("unterminated <selection> tag"))?;
    let self_closing = document.as_bytes()[tag_close - 1] == b'/';
    let attrs_end = if self_closing { tag_close - 1 } else { tag_close };
    let raw_attrs = parse_attrs(&document[start + "<selection".len()..attrs_end])?;

    let interface = attr_value(&raw_attrs, "", "interface").ok_or_else(|| bad_document("selection missing interface"))?;
    let id = attr_value(&raw_attrs, "", "id").ok_or_else(|| bad_document("selection missing id"))?;
    let version_text = attr_value(&raw_attrs, "", "version").ok_or_else(|| bad_document("selection missing version"))?;
    let version: Version = version_text
        .parse()
        .map_err(|_| bad_document(&format!("bad version '{version_text}' for {interface}")))?;
    let local_path = attr_value(&raw_attrs, "", "local-path");
    let digests: BTreeSet<String> = attr_value(&raw_attrs, "", "digests")
        .map(|joined| joined.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();

    let prefixes = prefix_map(&raw_attrs);
    let mut attrs = IndexMap::new();
    for (key, value) in &raw_attrs {
        if key == "interface" || key == "id" || key == "version" || key == "local-path" || key == "digests" || key.starts_with("xmlns") {
            continue;
        }
        match key.split_once(':') {
            Some((prefix, local_name)) => {
                let namespace = prefixes.get(prefix).cloned().unwrap_or_default();
                attrs.insert((namespace, local_name.to_string()), value.clone());
            }
            None => {
                attrs.insert((String::new(), key.clone()), value.clone());
            }
        }
    }

    if self_closing {
        return Ok((
            interface.clone(),
            Selection {
                interface,
                id,
                version,
                local_path,
                digests,
                bindings: Vec::new(),
                dependencies: IndexMap::new(),
                attrs,
            },
            tag_close + 1,
        ));
    }

    let close_tag = document[tag_close + 1..]
        .find("</selection>")
        .map(|i| tag_close + 1 + i)
        .ok_or_else(|| bad_document("unterminated <selection> body"))?;
    let body = &document[tag_close + 1..close_tag];

    let (dependencies, bindings) = parse_selection_body(body)?;

    Ok((
        interface.clone(),
        Selection {
            interface,
            id,
            version,
            local_path,
            digests,
            bindings,
            dependencies,
            attrs,
        },
        close_tag + "</selection>".len(),
    ))
}

fn parse_selection_body(body: &str) -> Result<(IndexMap<String, Vec<Binding>>, Vec<Binding>)> {
    let mut dependencies = IndexMap::new();
    let mut bindings = Vec::new();
    let mut cursor = 0;

    while cursor < body.len() {
        let rest = &body[cursor..];
        let next_requires = rest.find("<requires ").or_else(|| rest.find("<requires>"));
        let next_binding = rest.find("<binding-");

        match (next_requires, next_binding) {
            (Some(r), Some(b)) if r < b => cursor += parse_requires(body, cursor, &mut dependencies)?,
            (Some(_), None) => cursor += parse_requires(body, cursor, &mut dependencies)?,
            (_, Some(_)) => cursor += parse_binding_tag(body, cursor, &mut bindings)?,
            _ => break,
        }
    }

    Ok((dependencies, bindings))
}

fn parse_requires(body: &str, offset: usize, out: &mut IndexMap<String, Vec<Binding>>) -> Result<usize> {
    let rest = &body[offset..];
    let start = rest.find("<requires").ok_or_else(|| bad_document("expected <requires>"))?;
    let tag_close = rest[start..].find('>').map(|i| start + i).ok_or_else(|| bad_document("unterminated <requires>"))?;
    let self_closing = rest.as_bytes()[tag_close - 1] == b'/';
    let attrs_end = if self_closing { tag_close - 1 } else { tag_close };
    let attrs = parse_attrs(&rest[start + "<requires".len()..attrs_end])?;
    let uri = attr_value(&attrs, "", "interface").ok_or_else(|| bad_document("<requires> missing interface"))?;

    if self_closing {
        out.insert(uri, Vec::new());
        return Ok(tag_close + 1);
    }

    let close = rest[tag_close + 1..]
        .find("</requires>")
        .map(|i| tag_close + 1 + i)
        .ok_or_else(|| bad_document("unterminated <requires> body"))?;
    let inner = &rest[tag_close + 1..close];
    let mut bindings = Vec::new();
    let mut inner_cursor = 0;
    while inner_cursor < inner.len() {
        if inner[inner_cursor..].find("<binding-").is_none() {
            break;
        }
        inner_cursor += parse_binding_tag(inner, inner_cursor, &mut bindings)?;
    }
    out.insert(uri, bindings);
    Ok(close + "</requires>".len())
}

fn parse_binding_tag(body: &str, offset: usize, out: &mut Vec<Binding>) -> Result<usize> {
    let rest = &body[offset..];
    let start = rest.find("<binding-").ok_or_else(|| bad_document("expected a binding element"))?;
    let tag_close = rest[start..].find("/>").map(|i| start + i).ok_or_else(|| bad_document("binding element must be self-closing"))?;
    let tag = &rest[start..tag_close];

    let (name_part, attrs_part) = tag.split_once(char::is_whitespace).unwrap_or((tag, ""));
    let attrs = parse_attrs(attrs_part)?;

    let binding = match name_part {
        "<binding-insert-path" => Binding::InsertPath {
            name: attr_value(&attrs, "", "name").ok_or_else(|| bad_document("binding-insert-path missing name"))?,
            insert: attr_value(&attrs, "", "insert").ok_or_else(|| bad_document("binding-insert-path missing insert"))?,
            separator: attr_value(&attrs, "", "separator"),
        },
        "<binding-set-env" => Binding::SetEnv {
            name: attr_value(&attrs, "", "name").ok_or_else(|| bad_document("binding-set-env missing name"))?,
            value: attr_value(&attrs, "", "value").ok_or_else(|| bad_document("binding-set-env missing value"))?,
        },
        other => return Err(bad_document(&format!("unknown binding element {other}"))),
    };
    out.push(binding);
    Ok(tag_close + 2)
}

fn prefix_map(attrs: &[(String, String)]) -> IndexMap<String, String> {
    attrs
        .iter()
        .filter_map(|(key, value)| key.strip_prefix("xmlns:").map(|prefix| (prefix.to_string(), value.clone())))
        .collect()
}

fn attr_value(attrs: &[(String, String)], namespace: &str, local_name: &str) -> Option<String> {
    // Only the default (no-prefix) namespace is looked up by this
    // helper; prefixed attrs are resolved separately via `prefix_map`.
    debug_assert!(namespace.is_empty());
    attrs.iter().find(|(key, _)| key == local_name).map(|(_, value)| value.clone())
}

fn parse_attrs(s: &str) -> Result<Vec<(String, String)>> {
    let s = s.trim().trim_end_matches('/').trim();
    let mut out = Vec::new();
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        while i < bytes.len() && bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        if i >= bytes.len() {
            break;
        }
        let key_start = i;
        while i < bytes.len() && bytes[i] != b'=' && !bytes[i].is_ascii_whitespace() {
            i += 1;
        }
        let key = s[key_start..i].to_string();
        if key.is_empty() {
            break;
        }
        while i < bytes.len() && bytes[i] != b'"' {
            i += 1;
        }
        if i >= bytes.len() {
            return Err(bad_document(&format!("attribute '{key}' has no opening quote")));
        }
        i += 1; // opening quote
        let val_start = i;
        while i < bytes.len() && bytes[i] != b'"' {
            i += 1;
        }
        if i >= bytes.len() {
            return Err(bad_document(&format!("attribute '{key}' value is missing its closing quote")));
        }
        let value = unescape(&s[val_start..i]);
        i += 1; // closing quote
        out.push((key, value));
    }
    Ok(out)
}

fn escape(s: &str) -> String {
    s.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
}

fn unescape(s: &str) -> String {
    s.replace("&quot;", "\"")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&")
}

fn bad_document(reason: &str) -> Error {
    Error::SafeException(format!("malformed selections document: {reason}"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::selections::Selection;

    fn sample() -> Selections {
        let mut compiler_attrs = IndexMap::new();
        compiler_attrs.insert(("".to_string(), "version-modifier".to_string()), "-pre".to_string());

        let compiler = Selection {
            interface: "http://foo/Compiler.xml".into(),
            id: "sha1=345".into(),
            version: "1.0".parse().unwrap(),
            local_path: None,
            digests: BTreeSet::new(),
            bindings: Vec::new(),
            dependencies: IndexMap::new(),
            attrs: compiler_attrs,
        };

        let mut source_attrs = IndexMap::new();
        source_attrs.insert(("http://example.com/ns".to_string(), "foo".to_string()), "bar".to_string());

        let mut source_deps = IndexMap::new();
        source_deps.insert("http://foo/Compiler.xml".to_string(), Vec::new());

        let source = Selection {
            interface: "http://foo/Source.xml".into(),
            id: "sha1=234".into(),
            version: "1.0".parse().unwrap(),
            local_path: None,
            digests: BTreeSet::new(),
            bindings: vec![Binding::InsertPath {
                name: "PATH".into(),
                insert: ".".into(),
                separator: None,
            }],
            dependencies: source_deps,
            attrs: source_attrs,
        };

        let mut selections = IndexMap::new();
        selections.insert("http://foo/Source.xml".to_string(), source);
        selections.insert("http://foo/Compiler.xml".to_string(), compiler);

        Selections {
            root_uri: "http://foo/Source.xml".into(),
            selections,
        }
    }

    #[test]
    fn round_trips_source_and_compiler() {
        let mut expected = sample();
        for selection in expected.selections.values_mut() {
            selection
                .attrs
                .retain(|(namespace, local_name), _| !(namespace.is_empty() && crate::selections::TRANSIENT_ATTRS.contains(&local_name.as_str())));
        }

        let xml = serialize(&sample());
        let parsed = deserialize(&xml).unwrap();
        assert_eq!(parsed, expected);
    }

    #[test]
    fn foreign_attribute_survives_and_version_modifier_does_not() {
        let xml = serialize(&sample());
        let parsed = deserialize(&xml).unwrap();

        let source = &parsed.selections["http://foo/Source.xml"];
        assert_eq!(
            source.attrs.get(&("http://example.com/ns".to_string(), "foo".to_string())),
            Some(&"bar".to_string())
        );

        let compiler = &parsed.selections["http://foo/Compiler.xml"];
        assert!(compiler.attrs.get(&("".to_string(), "version-modifier".to_string())).is_none());
    }

    #[test]
    fn dependency_with_a_binding_round_trips() {
        let mut selections = sample();
        let bound_dep = vec![Binding::SetEnv {
            name: "FOO_HOME".into(),
            value: "/opt/foo".into(),
        }];
        selections
            .selections
            .get_mut("http://foo/Source.xml")
            .unwrap()
            .dependencies
            .insert("http://foo/Compiler.xml".to_string(), bound_dep.clone());

        let xml = serialize(&selections);
        let parsed = deserialize(&xml).unwrap();
        assert_eq!(
            parsed.selections["http://foo/Source.xml"].dependencies["http://foo/Compiler.xml"],
            bound_dep
        );
    }

    #[test]
    fn local_path_is_preserved() {
        let mut selections = sample();
        selections.selections.get_mut("http://foo/Compiler.xml").unwrap().local_path = Some("/opt/gcc".into());
        let xml = serialize(&selections);
        let parsed = deserialize(&xml).unwrap();
        assert_eq!(parsed.selections["http://foo/Compiler.xml"].local_path.as_deref(), Some("/opt/gcc"));
    }
}
