//! Placeholder templates compiled once into a node tree and interpreted per render.
//!
//! Supported syntax: `{{field}}` (dotted paths reach into nested objects),
//! `{{#if field}} ... {{else}} ... {{/if}}` with nesting. Anything else between
//! braces is a compile error, so templates can never execute code.

use std::borrow::Cow;

use serde::Serialize;
use serde_json::Value;

/// Data record handed to a template.
pub type TemplateData = serde_json::Map<String, Value>;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum TemplateError {
    #[error("unterminated tag starting at byte {offset}")]
    UnterminatedTag { offset: usize },
    #[error("tag at byte {offset} has an empty or malformed name")]
    InvalidName { offset: usize },
    #[error("unsupported block helper '{helper}' at byte {offset}")]
    UnsupportedHelper { helper: String, offset: usize },
    #[error("{{{{/if}}}} at byte {offset} closes nothing")]
    UnexpectedClose { offset: usize },
    #[error("{{{{else}}}} at byte {offset} is outside a conditional block")]
    UnexpectedElse { offset: usize },
    #[error("{{{{#if {guard}}}}} opened at byte {offset} is never closed")]
    UnclosedBlock { guard: String, offset: usize },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Node {
    Literal(String),
    Placeholder(String),
    Conditional {
        guard: String,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

/// Whether substituted values are HTML-escaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escaping {
    Html,
    Plain,
}

struct OpenBlock {
    guard: String,
    offset: usize,
    then: Vec<Node>,
    otherwise: Option<Vec<Node>>,
}

impl OpenBlock {
    fn body(&mut self) -> &mut Vec<Node> {
        match self.otherwise.as_mut() {
            Some(otherwise) => otherwise,
            None => &mut self.then,
        }
    }
}

/// A single compiled text source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompiledTemplate {
    nodes: Vec<Node>,
}

impl CompiledTemplate {
    pub fn compile(source: &str) -> Result<Self, TemplateError> {
        let mut root = Vec::new();
        let mut open: Vec<OpenBlock> = Vec::new();
        let mut cursor = 0;

        while let Some(found) = source[cursor..].find("{{") {
            let start = cursor + found;
            let Some(length) = source[start + 2..].find("}}") else {
                return Err(TemplateError::UnterminatedTag { offset: start });
            };
            let end = start + 2 + length;
            let tag = source[start + 2..end].trim();

            let literal = &source[cursor..start];
            if !literal.is_empty() {
                current(&mut root, &mut open).push(Node::Literal(literal.to_string()));
            }
            cursor = end + 2;

            if let Some(helper) = tag.strip_prefix('#') {
                let mut parts = helper.split_whitespace();
                match (parts.next(), parts.next(), parts.next()) {
                    (Some("if"), Some(guard), None) if is_valid_name(guard) => {
                        open.push(OpenBlock {
                            guard: guard.to_string(),
                            offset: start,
                            then: Vec::new(),
                            otherwise: None,
                        });
                    }
                    (Some("if"), _, _) => {
                        return Err(TemplateError::InvalidName { offset: start })
                    }
                    _ => {
                        return Err(TemplateError::UnsupportedHelper {
                            helper: helper.to_string(),
                            offset: start,
                        })
                    }
                }
            } else if let Some(helper) = tag.strip_prefix('/') {
                if helper.trim() != "if" {
                    return Err(TemplateError::UnsupportedHelper {
                        helper: helper.to_string(),
                        offset: start,
                    });
                }
                let block = open
                    .pop()
                    .ok_or(TemplateError::UnexpectedClose { offset: start })?;
                current(&mut root, &mut open).push(Node::Conditional {
                    guard: block.guard,
                    then: block.then,
                    otherwise: block.otherwise.unwrap_or_default(),
                });
            } else if tag == "else" {
                match open.last_mut() {
                    Some(block) if block.otherwise.is_none() => block.otherwise = Some(Vec::new()),
                    _ => return Err(TemplateError::UnexpectedElse { offset: start }),
                }
            } else if is_valid_name(tag) {
                current(&mut root, &mut open).push(Node::Placeholder(tag.to_string()));
            } else {
                return Err(TemplateError::InvalidName { offset: start });
            }
        }

        if let Some(block) = open.pop() {
            return Err(TemplateError::UnclosedBlock {
                guard: block.guard,
                offset: block.offset,
            });
        }

        let tail = &source[cursor..];
        if !tail.is_empty() {
            root.push(Node::Literal(tail.to_string()));
        }

        Ok(Self { nodes: root })
    }

    pub fn render(&self, data: &TemplateData, escaping: Escaping) -> String {
        let mut out = String::new();
        render_nodes(&self.nodes, data, escaping, &mut out);
        out
    }
}

fn current<'a>(root: &'a mut Vec<Node>, open: &'a mut [OpenBlock]) -> &'a mut Vec<Node> {
    match open.last_mut() {
        Some(block) => block.body(),
        None => root,
    }
}

fn is_valid_name(name: &str) -> bool {
    !name.is_empty()
        && name.split('.').all(|segment| {
            !segment.is_empty()
                && segment
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        })
}

fn render_nodes(nodes: &[Node], data: &TemplateData, escaping: Escaping, out: &mut String) {
    for node in nodes {
        match node {
            Node::Literal(text) => out.push_str(text),
            Node::Placeholder(path) => {
                if let Some(value) = lookup(data, path) {
                    let text = display(value);
                    match escaping {
                        Escaping::Html => push_escaped(&text, out),
                        Escaping::Plain => out.push_str(&text),
                    }
                }
            }
            Node::Conditional {
                guard,
                then,
                otherwise,
            } => {
                let branch = if is_truthy(lookup(data, guard)) {
                    then
                } else {
                    otherwise
                };
                render_nodes(branch, data, escaping, out);
            }
        }
    }
}

fn lookup<'a>(data: &'a TemplateData, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let mut value = data.get(segments.next()?)?;
    for segment in segments {
        value = value.as_object()?.get(segment)?;
    }
    Some(value)
}

fn is_truthy(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => false,
        Some(Value::Bool(flag)) => *flag,
        Some(Value::Number(number)) => number.as_f64().map_or(false, |n| n != 0.0),
        Some(Value::String(text)) => !text.is_empty(),
        Some(Value::Array(items)) => !items.is_empty(),
        Some(Value::Object(_)) => true,
    }
}

fn display(value: &Value) -> Cow<'_, str> {
    match value {
        Value::Null | Value::Object(_) => Cow::Borrowed(""),
        Value::Bool(flag) => Cow::Borrowed(if *flag { "true" } else { "false" }),
        Value::String(text) => Cow::Borrowed(text.as_str()),
        Value::Number(number) => match (number.as_i64(), number.as_f64()) {
            (Some(integer), _) => Cow::Owned(integer.to_string()),
            (None, Some(float)) if float.fract() == 0.0 && float.abs() < 1e15 => {
                Cow::Owned(format!("{float:.0}"))
            }
            _ => Cow::Owned(number.to_string()),
        },
        Value::Array(items) => Cow::Owned(
            items
                .iter()
                .map(|item| display(item).into_owned())
                .collect::<Vec<_>>()
                .join(", "),
        ),
    }
}

fn push_escaped(text: &str, out: &mut String) {
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#x27;"),
            '`' => out.push_str("&#x60;"),
            '=' => out.push_str("&#x3D;"),
            _ => out.push(c),
        }
    }
}

/// HTML and plain-text bodies produced for one submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RenderedNotification {
    pub html: String,
    pub text: String,
}

/// Immutable HTML/text template pair.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmailTemplate {
    html: CompiledTemplate,
    text: CompiledTemplate,
}

impl EmailTemplate {
    pub fn compile(html: &str, text: &str) -> Result<Self, TemplateError> {
        Ok(Self {
            html: CompiledTemplate::compile(html)?,
            text: CompiledTemplate::compile(text)?,
        })
    }

    /// Pure: the same data always yields byte-identical output.
    pub fn render(&self, data: &TemplateData) -> RenderedNotification {
        RenderedNotification {
            html: self.html.render(data, Escaping::Html),
            text: self.text.render(data, Escaping::Plain),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn data(value: Value) -> TemplateData {
        match value {
            Value::Object(map) => map,
            _ => panic!("fixture must be an object"),
        }
    }

    #[test]
    fn substitutes_placeholders_and_blanks_missing_fields() {
        let template = CompiledTemplate::compile("Hi {{ name }}, ref {{missing}}.").expect("compiles");
        let rendered = template.render(&data(json!({ "name": "Jane" })), Escaping::Plain);
        assert_eq!(rendered, "Hi Jane, ref .");
    }

    #[test]
    fn nested_conditionals_follow_truthiness() {
        let template = CompiledTemplate::compile(
            "{{#if city}}{{city}}{{#if state}}, {{state}}{{/if}} {{#if zip}}{{zip}}{{/if}}{{/if}}",
        )
        .expect("compiles");

        let full = data(json!({ "city": "Austin", "state": "TX", "zip": "78701" }));
        assert_eq!(template.render(&full, Escaping::Plain), "Austin, TX 78701");

        let no_state = data(json!({ "city": "Austin", "state": "", "zip": 0 }));
        assert_eq!(template.render(&no_state, Escaping::Plain), "Austin ");

        let no_city = data(json!({ "state": "TX" }));
        assert_eq!(template.render(&no_city, Escaping::Plain), "");
    }

    #[test]
    fn else_branch_renders_when_guard_is_falsy() {
        let template =
            CompiledTemplate::compile("{{#if vip}}gold{{else}}standard{{/if}}").expect("compiles");
        assert_eq!(
            template.render(&data(json!({ "vip": false })), Escaping::Plain),
            "standard"
        );
        assert_eq!(
            template.render(&data(json!({ "vip": true })), Escaping::Plain),
            "gold"
        );
    }

    #[test]
    fn html_variant_escapes_and_text_variant_does_not() {
        let template = EmailTemplate::compile("<p>{{message}}</p>", "{{message}}").expect("compiles");
        let rendered = template.render(&data(json!({ "message": "<script>alert('x')</script>" })));
        assert_eq!(
            rendered.html,
            "<p>&lt;script&gt;alert(&#x27;x&#x27;)&lt;/script&gt;</p>"
        );
        assert_eq!(rendered.text, "<script>alert('x')</script>");
    }

    #[test]
    fn numbers_render_without_trailing_fraction() {
        let template = CompiledTemplate::compile("{{a}}|{{b}}|{{c}}|{{d}}").expect("compiles");
        let rendered = template.render(
            &data(json!({ "a": 5.0, "b": 2.5, "c": 7, "d": null })),
            Escaping::Plain,
        );
        assert_eq!(rendered, "5|2.5|7|");
    }

    #[test]
    fn dotted_paths_reach_nested_values() {
        let template = CompiledTemplate::compile("{{client.ip}}").expect("compiles");
        let rendered = template.render(
            &data(json!({ "client": { "ip": "203.0.113.9" } })),
            Escaping::Plain,
        );
        assert_eq!(rendered, "203.0.113.9");
    }

    #[test]
    fn rendering_is_repeatable() {
        let template = EmailTemplate::compile("<b>{{x}}</b>", "{{x}}").expect("compiles");
        let record = data(json!({ "x": "a & b" }));
        assert_eq!(template.render(&record), template.render(&record));
    }

    #[test]
    fn rejects_malformed_sources() {
        assert_eq!(
            CompiledTemplate::compile("{{name"),
            Err(TemplateError::UnterminatedTag { offset: 0 })
        );
        assert!(matches!(
            CompiledTemplate::compile("{{#if a}}open"),
            Err(TemplateError::UnclosedBlock { .. })
        ));
        assert!(matches!(
            CompiledTemplate::compile("x{{/if}}"),
            Err(TemplateError::UnexpectedClose { offset: 1 })
        ));
        assert!(matches!(
            CompiledTemplate::compile("{{else}}"),
            Err(TemplateError::UnexpectedElse { .. })
        ));
        assert!(matches!(
            CompiledTemplate::compile("{{#each items}}{{/each}}"),
            Err(TemplateError::UnsupportedHelper { .. })
        ));
        assert!(matches!(
            CompiledTemplate::compile("{{{raw}}}"),
            Err(TemplateError::InvalidName { .. })
        ));
        assert!(matches!(
            CompiledTemplate::compile("{{}}"),
            Err(TemplateError::InvalidName { .. })
        ));
    }
}
