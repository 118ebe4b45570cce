//! Java compilation-unit parsing with tree-sitter.
//!
//! Extracts every declared type (nested types included, named `Outer$Inner`) with
//! its directly declared fields. A field whose modifiers carry the configured
//! annotation gets its elements decoded into [`PropertyMetadata`].

use tree_sitter::{Node, Parser};

use crate::error::ScanError;
use crate::metadata::PropertyMetadata;
use crate::source::{FieldDecl, TypeDecl};

pub const DEFAULT_ANNOTATION: &str = "InjectValue";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompilationUnit {
    pub package: String,
    pub types: Vec<TypeDecl>,
}

/// Parses `source`, naming failures after `origin` (a path or archive entry).
pub fn parse_compilation_unit(
    origin: &str,
    source: &str,
    annotation: &str,
) -> Result<CompilationUnit, ScanError> {
    let mut parser = Parser::new();
    parser
        .set_language(&tree_sitter_java::LANGUAGE.into())
        .map_err(|e| ScanError::Internal(format!("Failed to load Java grammar: {e}")))?;
    let tree = parser.parse(source, None).ok_or_else(|| ScanError::Unresolvable {
        origin: origin.to_string(),
        reason: "parser returned no tree".to_string(),
    })?;
    let root = tree.root_node();
    if root.has_error() {
        let line = first_error(root).map_or(0, |n| n.start_position().row + 1);
        return Err(ScanError::Unresolvable {
            origin: origin.to_string(),
            reason: format!("syntax error near line {line}"),
        });
    }

    let bytes = source.as_bytes();
    let mut package = String::new();
    let mut types = Vec::new();

    let mut cursor = root.walk();
    for child in root.children(&mut cursor) {
        match child.kind() {
            "package_declaration" => package = extract_package(&child, bytes),
            kind if is_type_declaration(kind) => {
                let prefix = if package.is_empty() {
                    String::new()
                } else {
                    format!("{package}.")
                };
                collect_type(&child, bytes, &prefix, annotation, &mut types)?;
            }
            _ => {}
        }
    }

    Ok(CompilationUnit { package, types })
}

fn first_error(node: Node<'_>) -> Option<Node<'_>> {
    if node.is_error() || node.is_missing() {
        return Some(node);
    }
    let mut cursor = node.walk();
    let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
    children
        .into_iter()
        .filter(|c| c.has_error())
        .find_map(first_error)
}

fn is_type_declaration(kind: &str) -> bool {
    matches!(
        kind,
        "class_declaration"
            | "interface_declaration"
            | "enum_declaration"
            | "record_declaration"
            | "annotation_type_declaration"
    )
}

fn extract_package(node: &Node, source: &[u8]) -> String {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        if child.kind() == "scoped_identifier" || child.kind() == "identifier" {
            return node_text(&child, source).to_string();
        }
    }
    String::new()
}

fn collect_type(
    node: &Node,
    source: &[u8],
    prefix: &str,
    annotation: &str,
    out: &mut Vec<TypeDecl>,
) -> Result<(), ScanError> {
    let Some(name) = node.child_by_field_name("name") else {
        return Ok(());
    };
    let class_name = format!("{prefix}{}", node_text(&name, source));
    let mut decl = TypeDecl {
        class_name: class_name.clone(),
        fields: Vec::new(),
    };
    let mut nested = Vec::new();

    // Record components are the record's fields, ahead of anything in its body.
    if node.kind() == "record_declaration"
        && let Some(params) = node.child_by_field_name("parameters")
    {
        let mut cursor = params.walk();
        for param in params.named_children(&mut cursor) {
            if param.kind() == "formal_parameter" {
                decl.fields
                    .push(extract_record_component(&param, source, &class_name, annotation)?);
            }
        }
    }

    if let Some(body) = node.child_by_field_name("body") {
        collect_members(&body, source, &class_name, annotation, &mut decl.fields, &mut nested)?;
    }

    out.push(decl);
    let nested_prefix = format!("{class_name}$");
    for inner in nested {
        collect_type(&inner, source, &nested_prefix, annotation, out)?;
    }
    Ok(())
}

fn collect_members<'a>(
    body: &Node<'a>,
    source: &[u8],
    class_name: &str,
    annotation: &str,
    fields: &mut Vec<FieldDecl>,
    nested: &mut Vec<Node<'a>>,
) -> Result<(), ScanError> {
    let mut cursor = body.walk();
    for child in body.children(&mut cursor) {
        match child.kind() {
            "field_declaration" | "constant_declaration" => {
                fields.extend(extract_fields(&child, source, class_name, annotation)?);
            }
            "enum_body_declarations" => {
                collect_members(&child, source, class_name, annotation, fields, nested)?;
            }
            kind if is_type_declaration(kind) => nested.push(child),
            _ => {}
        }
    }
    Ok(())
}

fn extract_fields(
    node: &Node,
    source: &[u8],
    class_name: &str,
    annotation: &str,
) -> Result<Vec<FieldDecl>, ScanError> {
    let mut names = Vec::new();
    let mut annotation_node = None;

    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        match child.kind() {
            "modifiers" => annotation_node = find_annotation(&child, source, annotation),
            "variable_declarator" => {
                if let Some(name) = child.child_by_field_name("name") {
                    names.push(node_text(&name, source).to_string());
                }
            }
            _ => {}
        }
    }

    let declaration = match annotation_node {
        Some(ann) => {
            let field = names.first().cloned().unwrap_or_default();
            Some(read_metadata(&ann, source, annotation, class_name, &field)?)
        }
        None => None,
    };

    Ok(names
        .into_iter()
        .map(|name| FieldDecl {
            name,
            declaration: declaration.clone(),
        })
        .collect())
}

fn extract_record_component(
    param: &Node,
    source: &[u8],
    class_name: &str,
    annotation: &str,
) -> Result<FieldDecl, ScanError> {
    let name = param
        .child_by_field_name("name")
        .map(|n| node_text(&n, source).to_string())
        .unwrap_or_default();

    let mut cursor = param.walk();
    let annotation_node = param
        .children(&mut cursor)
        .find(|c| c.kind() == "modifiers")
        .and_then(|m| find_annotation(&m, source, annotation));

    let declaration = match annotation_node {
        Some(ann) => Some(read_metadata(&ann, source, annotation, class_name, &name)?),
        None => None,
    };
    Ok(FieldDecl { name, declaration })
}

fn find_annotation<'a>(modifiers: &Node<'a>, source: &[u8], annotation: &str) -> Option<Node<'a>> {
    let mut cursor = modifiers.walk();
    modifiers
        .children(&mut cursor)
        .filter(|c| c.kind() == "annotation" || c.kind() == "marker_annotation")
        .find(|c| {
            c.child_by_field_name("name").is_some_and(|n| {
                let full = node_text(&n, source);
                full.rsplit('.').next() == Some(annotation)
            })
        })
}

fn read_metadata(
    node: &Node,
    source: &[u8],
    annotation: &str,
    class_name: &str,
    field: &str,
) -> Result<PropertyMetadata, ScanError> {
    let mut meta = PropertyMetadata::default();

    if let Some(args) = node.child_by_field_name("arguments") {
        let mut cursor = args.walk();
        for arg in args.named_children(&mut cursor) {
            if arg.kind() == "element_value_pair" {
                let (Some(key), Some(value)) =
                    (arg.child_by_field_name("key"), arg.child_by_field_name("value"))
                else {
                    continue;
                };
                let value = element_value(&value, source);
                match node_text(&key, source) {
                    "value" => meta.expression = value.into_text(),
                    "name" => meta.display_name = value.into_text(),
                    "expireDate" => meta.expire_date = value.into_text(),
                    "description" => meta.description = value.into_text(),
                    "usedBy" => meta.used_by = value.into_list(),
                    "referencedBy" => meta.referenced_by = value.into_list(),
                    "referencedFrom" => meta.referenced_from = value.into_list(),
                    _ => {}
                }
            } else if !arg.kind().ends_with("comment") {
                // Single-element shorthand: @InjectValue("${key}")
                meta.expression = element_value(&arg, source).into_text();
            }
        }
    }

    if meta.expression.trim().is_empty() {
        return Err(ScanError::MissingExpression {
            annotation: annotation.to_string(),
            class: class_name.to_string(),
            field: field.to_string(),
        });
    }
    Ok(meta)
}

enum ElementValue {
    Text(String),
    List(Vec<String>),
}

impl ElementValue {
    fn into_text(self) -> String {
        match self {
            Self::Text(s) => s,
            Self::List(items) => items.join(","),
        }
    }

    fn into_list(self) -> Vec<String> {
        match self {
            Self::Text(s) => vec![s],
            Self::List(items) => items,
        }
    }
}

fn element_value(node: &Node, source: &[u8]) -> ElementValue {
    match node.kind() {
        "string_literal" => ElementValue::Text(decode_string_literal(node_text(node, source))),
        "element_value_array_initializer" | "array_initializer" => {
            let mut cursor = node.walk();
            let items = node
                .named_children(&mut cursor)
                .filter(|c| !c.kind().ends_with("comment"))
                .map(|c| element_value(&c, source).into_text())
                .collect();
            ElementValue::List(items)
        }
        "binary_expression" => {
            let is_concat = node
                .child_by_field_name("operator")
                .is_some_and(|op| node_text(&op, source) == "+");
            match (
                is_concat,
                node.child_by_field_name("left"),
                node.child_by_field_name("right"),
            ) {
                (true, Some(left), Some(right)) => ElementValue::Text(format!(
                    "{}{}",
                    element_value(&left, source).into_text(),
                    element_value(&right, source).into_text()
                )),
                _ => ElementValue::Text(normalize_whitespace(node_text(node, source))),
            }
        }
        "parenthesized_expression" => match node.named_child(0) {
            Some(inner) => element_value(&inner, source),
            None => ElementValue::Text(String::new()),
        },
        _ => ElementValue::Text(normalize_whitespace(node_text(node, source))),
    }
}

fn decode_string_literal(raw: &str) -> String {
    if let Some(body) = raw.strip_prefix("\"\"\"").and_then(|s| s.strip_suffix("\"\"\"")) {
        return unescape_java(&strip_text_block_indent(body));
    }
    let body = raw
        .strip_prefix('"')
        .and_then(|s| s.strip_suffix('"'))
        .unwrap_or(raw);
    unescape_java(body)
}

fn strip_text_block_indent(body: &str) -> String {
    // Content starts after the line terminator following the opening delimiter.
    let body = body.split_once('\n').map_or(body, |(_, rest)| rest);
    let indent = body
        .lines()
        .filter(|l| !l.trim().is_empty())
        .map(|l| l.len() - l.trim_start().len())
        .min()
        .unwrap_or(0);
    body.lines()
        .map(|l| l.get(indent..).unwrap_or("").trim_end())
        .collect::<Vec<_>>()
        .join("\n")
}

fn unescape_java(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => out.push('\n'),
            Some('t') => out.push('\t'),
            Some('r') => out.push('\r'),
            Some('b') => out.push('\u{0008}'),
            Some('f') => out.push('\u{000C}'),
            Some('s') => out.push(' '),
            // Text block line continuation.
            Some('\n') => {}
            Some('u') => {
                while chars.next_if_eq(&'u').is_some() {}
                let hex: String = chars.by_ref().take(4).collect();
                if let Some(ch) = u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32) {
                    out.push(ch);
                }
            }
            Some(first @ '0'..='7') => {
                // Up to three digits, the first at most `3`, so the value stays <= \377.
                let max_digits = if first <= '3' { 3 } else { 2 };
                let mut value = first.to_digit(8).unwrap_or(0);
                for _ in 1..max_digits {
                    match chars.next_if(|d| d.is_digit(8)) {
                        Some(d) => value = value * 8 + d.to_digit(8).unwrap_or(0),
                        None => break,
                    }
                }
                if let Some(ch) = char::from_u32(value) {
                    out.push(ch);
                }
            }
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

fn node_text<'a>(node: &Node, source: &'a [u8]) -> &'a str {
    node.utf8_text(source).unwrap_or("")
}

fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}
