//! Parser and executor for the template dialect
//!
//! Supported actions:
//!
//! - `{{.Field}}` - context variable
//! - `{{Func .Field}}`, `{{Func "literal"}}` - helper call
//! - `{{.Field | Func | Func}}` - pipeline; each stage receives the previous value
//! - `{{if .Field}}…{{else if .Other}}…{{else}}…{{end}}` - non-empty is true
//! - `{{/* comment */}}`
//! - `{{- …}}` / `{{… -}}` - trim whitespace before / after the action

use super::context::RenderContext;
use super::funcs;
use crate::error::{Result, VpkgError};

const UNSUPPORTED_KEYWORDS: &[&str] = &[
    "range", "with", "define", "template", "block", "break", "continue", "nil", "and", "or",
    "not", "eq", "ne", "len", "index", "printf", "print", "println",
];

#[derive(Debug, Clone, PartialEq)]
enum Token {
    Field(String),
    Str(String),
    Ident(String),
    Pipe,
}

#[derive(Debug, Clone, PartialEq)]
enum Operand {
    Field(String),
    Literal(String),
}

#[derive(Debug, Clone, PartialEq)]
struct Pipeline {
    head: Stage,
    /// Helpers applied in order to the running value
    tail: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
enum Stage {
    Value(Operand),
    Call(String, Operand),
}

#[derive(Debug, Clone, PartialEq)]
enum Node {
    Text(String),
    Output { line: usize, pipeline: Pipeline },
    If {
        line: usize,
        cond: Pipeline,
        then: Vec<Node>,
        otherwise: Vec<Node>,
    },
}

/// Lexed unit of source
#[derive(Debug)]
enum Item {
    Text(String),
    Action { line: usize, tokens: Vec<Token> },
}

/// A parsed template
#[derive(Debug, Clone)]
pub struct Template {
    name: String,
    nodes: Vec<Node>,
}

impl Template {
    pub fn parse(name: &str, source: &str) -> Result<Self> {
        let items = lex(source).map_err(|reason| render_error(name, reason))?;
        let mut parser = Parser {
            items: items.into_iter().peekable(),
        };
        let (nodes, end) = parser
            .parse_list()
            .map_err(|reason| render_error(name, reason))?;

        match end {
            Terminator::Eof => Ok(Self {
                name: name.to_string(),
                nodes,
            }),
            Terminator::End(line) => Err(render_error(
                name,
                format!("line {line}: unexpected {{{{end}}}}"),
            )),
            Terminator::Else(line, _) => Err(render_error(
                name,
                format!("line {line}: unexpected {{{{else}}}}"),
            )),
        }
    }

    pub fn render(&self, ctx: &RenderContext) -> Result<String> {
        let mut out = String::new();
        execute(&self.nodes, ctx, &mut out).map_err(|reason| render_error(&self.name, reason))?;
        Ok(out)
    }
}

/// Parse and render in one step
pub fn render_template(name: &str, source: &str, ctx: &RenderContext) -> Result<String> {
    Template::parse(name, source)?.render(ctx)
}

fn render_error(file: &str, reason: impl Into<String>) -> VpkgError {
    VpkgError::Render {
        file: file.to_string(),
        reason: reason.into(),
    }
}

type ParseResult<T> = std::result::Result<T, String>;

fn lex(source: &str) -> ParseResult<Vec<Item>> {
    let mut items = Vec::new();
    let mut rest = source;
    let mut line = 1;
    let mut trim_next = false;

    loop {
        let Some(open) = rest.find("{{") else {
            push_text(&mut items, rest, trim_next, false);
            break;
        };

        let text = &rest[..open];
        let mut after = &rest[open + 2..];
        let trim_left = after.starts_with('-') && after[1..].starts_with(char::is_whitespace);
        if trim_left {
            after = &after[1..];
        }
        push_text(&mut items, text, trim_next, trim_left);
        line += text.matches('\n').count();
        let action_line = line;

        let (raw, consumed) = if after.trim_start().starts_with("/*") {
            let start = after.len() - after.trim_start().len();
            let close = after[start..]
                .find("*/")
                .ok_or_else(|| format!("line {action_line}: unclosed comment"))?;
            let tail_start = start + close + 2;
            let tail = &after[tail_start..];
            let end = tail
                .find("}}")
                .filter(|&i| matches!(tail[..i].trim(), "" | "-"))
                .ok_or_else(|| format!("line {action_line}: comment must be followed by }}}}"))?;
            (&after[tail_start..tail_start + end], tail_start + end + 2)
        } else {
            let end = find_action_end(after)
                .ok_or_else(|| format!("line {action_line}: unclosed action"))?;
            (&after[..end], end + 2)
        };

        let trim_right = raw.ends_with('-')
            && raw[..raw.len() - 1]
                .chars()
                .last()
                .map_or(false, char::is_whitespace);
        let content = if trim_right {
            &raw[..raw.len() - 1]
        } else {
            raw
        };

        line += after[..consumed].matches('\n').count();
        trim_next = trim_right;

        let is_comment = after.trim_start().starts_with("/*");
        if !is_comment {
            let tokens = tokenize(content).map_err(|e| format!("line {action_line}: {e}"))?;
            if tokens.is_empty() {
                return Err(format!("line {action_line}: empty action"));
            }
            items.push(Item::Action {
                line: action_line,
                tokens,
            });
        }

        rest = &after[consumed..];
    }

    Ok(items)
}

fn push_text(items: &mut Vec<Item>, text: &str, trim_start: bool, trim_end: bool) {
    let mut text = text;
    if trim_start {
        text = text.trim_start();
    }
    if trim_end {
        text = text.trim_end();
    }
    if !text.is_empty() {
        items.push(Item::Text(text.to_string()));
    }
}

/// Byte offset of the closing `}}`, skipping quoted strings
fn find_action_end(s: &str) -> Option<usize> {
    let bytes = s.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'"' {
                    if bytes[i] == b'\\' {
                        i += 1;
                    }
                    i += 1;
                }
            }
            b'`' => {
                i += 1;
                while i < bytes.len() && bytes[i] != b'`' {
                    i += 1;
                }
            }
            b'}' if bytes.get(i + 1) == Some(&b'}') => return Some(i),
            _ => {}
        }
        i += 1;
    }
    None
}

fn tokenize(content: &str) -> ParseResult<Vec<Token>> {
    let mut tokens = Vec::new();
    let mut chars = content.char_indices().peekable();

    while let Some(&(start, c)) = chars.peek() {
        match c {
            c if c.is_whitespace() => {
                chars.next();
            }
            '|' => {
                chars.next();
                tokens.push(Token::Pipe);
            }
            '"' => {
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                while let Some((_, c)) = chars.next() {
                    match c {
                        '"' => {
                            closed = true;
                            break;
                        }
                        '\\' => match chars.next() {
                            Some((_, 'n')) => value.push('\n'),
                            Some((_, 't')) => value.push('\t'),
                            Some((_, other)) => value.push(other),
                            None => break,
                        },
                        other => value.push(other),
                    }
                }
                if !closed {
                    return Err("unterminated string".to_string());
                }
                tokens.push(Token::Str(value));
            }
            '`' => {
                chars.next();
                let mut value = String::new();
                let mut closed = false;
                for (_, c) in chars.by_ref() {
                    if c == '`' {
                        closed = true;
                        break;
                    }
                    value.push(c);
                }
                if !closed {
                    return Err("unterminated raw string".to_string());
                }
                tokens.push(Token::Str(value));
            }
            '.' => {
                chars.next();
                let mut name = String::new();
                while let Some(&(_, c)) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        name.push(c);
                        chars.next();
                    } else {
                        break;
                    }
                }
                if name.is_empty() {
                    return Err("bare '.' is not supported; name a variable".to_string());
                }
                if matches!(chars.peek(), Some(&(_, '.'))) {
                    return Err(format!("nested field access on .{name} is not supported"));
                }
                tokens.push(Token::Field(name));
            }
            c if c.is_alphabetic() || c == '_' => {
                let mut end = start;
                while let Some(&(i, c)) = chars.peek() {
                    if c.is_alphanumeric() || c == '_' {
                        end = i + c.len_utf8();
                        chars.next();
                    } else {
                        break;
                    }
                }
                tokens.push(Token::Ident(content[start..end].to_string()));
            }
            '$' => return Err("template variables ($) are not supported".to_string()),
            other => return Err(format!("unexpected character '{other}'")),
        }
    }

    Ok(tokens)
}

enum Terminator {
    Eof,
    End(usize),
    /// `{{else}}` or `{{else if …}}`
    Else(usize, Option<Pipeline>),
}

struct Parser {
    items: std::iter::Peekable<std::vec::IntoIter<Item>>,
}

impl Parser {
    fn parse_list(&mut self) -> ParseResult<(Vec<Node>, Terminator)> {
        let mut nodes = Vec::new();

        while let Some(item) = self.items.next() {
            let (line, tokens) = match item {
                Item::Text(text) => {
                    nodes.push(Node::Text(text));
                    continue;
                }
                Item::Action { line, tokens } => (line, tokens),
            };

            match tokens.first() {
                Some(Token::Ident(word)) if word == "if" => {
                    let cond = parse_pipeline(&tokens[1..])
                        .map_err(|e| format!("line {line}: {e}"))?;
                    nodes.push(self.parse_if(line, cond)?);
                }
                Some(Token::Ident(word)) if word == "end" => {
                    if tokens.len() > 1 {
                        return Err(format!("line {line}: unexpected tokens after end"));
                    }
                    return Ok((nodes, Terminator::End(line)));
                }
                Some(Token::Ident(word)) if word == "else" => {
                    let branch = match tokens.get(1) {
                        None => None,
                        Some(Token::Ident(w)) if w == "if" => Some(
                            parse_pipeline(&tokens[2..]).map_err(|e| format!("line {line}: {e}"))?,
                        ),
                        Some(_) => return Err(format!("line {line}: unexpected tokens after else")),
                    };
                    return Ok((nodes, Terminator::Else(line, branch)));
                }
                _ => {
                    let pipeline =
                        parse_pipeline(&tokens).map_err(|e| format!("line {line}: {e}"))?;
                    nodes.push(Node::Output { line, pipeline });
                }
            }
        }

        Ok((nodes, Terminator::Eof))
    }

    fn parse_if(&mut self, line: usize, cond: Pipeline) -> ParseResult<Node> {
        let (then, end) = self.parse_list()?;
        let otherwise = match end {
            Terminator::End(_) => Vec::new(),
            Terminator::Else(else_line, None) => {
                let (otherwise, end) = self.parse_list()?;
                match end {
                    Terminator::End(_) => otherwise,
                    Terminator::Else(l, _) => {
                        return Err(format!("line {l}: more than one else for if on line {line}"))
                    }
                    Terminator::Eof => {
                        return Err(format!("line {else_line}: if without matching end"))
                    }
                }
            }
            Terminator::Else(else_line, Some(nested)) => {
                vec![self.parse_if(else_line, nested)?]
            }
            Terminator::Eof => return Err(format!("line {line}: if without matching end")),
        };

        Ok(Node::If {
            line,
            cond,
            then,
            otherwise,
        })
    }
}

fn parse_pipeline(tokens: &[Token]) -> ParseResult<Pipeline> {
    let mut segments = tokens.split(|t| *t == Token::Pipe);
    let head_tokens = segments.next().unwrap_or(&[]);
    let head = parse_stage(head_tokens)?;

    let mut tail = Vec::new();
    for segment in segments {
        match segment {
            [Token::Ident(name)] => {
                check_function(name)?;
                tail.push(name.clone());
            }
            [] => return Err("missing command in pipeline".to_string()),
            [Token::Ident(name), ..] => {
                return Err(format!("{name} takes exactly one argument"));
            }
            _ => return Err("pipeline stage must be a function".to_string()),
        }
    }

    Ok(Pipeline { head, tail })
}

fn parse_stage(tokens: &[Token]) -> ParseResult<Stage> {
    match tokens {
        [] => Err("missing value".to_string()),
        [Token::Field(name)] => Ok(Stage::Value(Operand::Field(name.clone()))),
        [Token::Str(s)] => Ok(Stage::Value(Operand::Literal(s.clone()))),
        [Token::Ident(name), rest @ ..] => {
            check_function(name)?;
            match rest {
                [Token::Field(f)] => Ok(Stage::Call(name.clone(), Operand::Field(f.clone()))),
                [Token::Str(s)] => Ok(Stage::Call(name.clone(), Operand::Literal(s.clone()))),
                _ => Err(format!("{name} takes exactly one argument")),
            }
        }
        _ => Err("expected a value or function call".to_string()),
    }
}

fn check_function(name: &str) -> ParseResult<()> {
    if matches!(name, "if" | "else" | "end") {
        return Err(format!("unexpected keyword \"{name}\""));
    }
    if UNSUPPORTED_KEYWORDS.contains(&name) {
        return Err(format!("unsupported keyword \"{name}\""));
    }
    if !funcs::is_function(name) {
        return Err(format!("function \"{name}\" not defined"));
    }
    Ok(())
}

fn execute(nodes: &[Node], ctx: &RenderContext, out: &mut String) -> ParseResult<()> {
    for node in nodes {
        match node {
            Node::Text(text) => out.push_str(text),
            Node::Output { line, pipeline } => {
                let value = evaluate(pipeline, ctx).map_err(|e| format!("line {line}: {e}"))?;
                out.push_str(&value);
            }
            Node::If {
                line,
                cond,
                then,
                otherwise,
            } => {
                let value = evaluate(cond, ctx).map_err(|e| format!("line {line}: {e}"))?;
                if value.is_empty() {
                    execute(otherwise, ctx, out)?;
                } else {
                    execute(then, ctx, out)?;
                }
            }
        }
    }
    Ok(())
}

fn evaluate(pipeline: &Pipeline, ctx: &RenderContext) -> ParseResult<String> {
    let resolve = |operand: &Operand| -> ParseResult<String> {
        match operand {
            Operand::Literal(s) => Ok(s.clone()),
            Operand::Field(name) => ctx
                .variable(name)
                .map(str::to_string)
                .ok_or_else(|| format!("unknown variable .{name}")),
        }
    };

    let mut value = match &pipeline.head {
        Stage::Value(operand) => resolve(operand)?,
        Stage::Call(func, operand) => apply(func, &resolve(operand)?)?,
    };
    for func in &pipeline.tail {
        value = apply(func, &value)?;
    }
    Ok(value)
}

fn apply(func: &str, arg: &str) -> ParseResult<String> {
    funcs::call(func, arg).ok_or_else(|| format!("function \"{func}\" not defined"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use pretty_assertions::assert_eq;

    fn ctx() -> RenderContext {
        RenderContext {
            module: "example.com/app".to_string(),
            vpkg_name: "acme/redis-cache".to_string(),
            namespace: "acme".to_string(),
            pkg: "redis-cache".to_string(),
            package: "rediscache".to_string(),
            package_path: "vpkg/acme/redis-cache".to_string(),
            version: "1.2.0".to_string(),
            author: "acme".to_string(),
            time: "2024-05-01T12:00:00Z".to_string(),
            title: "Redis cache".to_string(),
            description: String::new(),
        }
    }

    fn render(source: &str) -> Result<String> {
        render_template("test.go.tmpl", source, &ctx())
    }

    #[test]
    fn test_field_substitution() {
        let out = render("package {{.Package}}\n\n// {{ .VpkgName }} v{{.Version}}\n").unwrap();
        assert_eq!(out, "package rediscache\n\n// acme/redis-cache v1.2.0\n");
    }

    #[test]
    fn test_function_calls_and_pipelines() {
        assert_eq!(render("{{Pascal .Pkg}}").unwrap(), "RedisCache");
        assert_eq!(render("{{.Pkg | Pascal | Upper}}").unwrap(), "REDISCACHE");
        assert_eq!(render("{{Snake \"HttpServer\"}}").unwrap(), "http_server");
        assert_eq!(render("{{Camel .Pkg | Title}}").unwrap(), "RedisCache");
    }

    #[test]
    fn test_conditionals() {
        let source = "{{if .Description}}has{{else if .Title}}{{.Title}}{{else}}none{{end}}";
        assert_eq!(render(source).unwrap(), "Redis cache");

        assert_eq!(render("{{if .Author}}by {{.Author}}{{end}}").unwrap(), "by acme");
        assert_eq!(render("a{{if .Description}}x{{end}}b").unwrap(), "ab");
    }

    #[test]
    fn test_comments_and_trim_markers() {
        let source = "a\n{{- /* dropped */ -}}\n  b {{- .Pkg}} {{.Pkg -}}   c";
        assert_eq!(render(source).unwrap(), "abredis-cache redis-cachec");
        assert_eq!(render("x{{/* note */}}y").unwrap(), "xy");
    }

    #[test]
    fn test_braces_inside_strings() {
        assert_eq!(render("{{Lower \"A}}B\"}}").unwrap(), "a}}b");
    }

    #[test]
    fn test_plain_text_unchanged() {
        let source = "no actions here {single braces} ok\n";
        assert_eq!(render(source).unwrap(), source);
    }

    #[test]
    fn test_errors_are_render_errors_naming_file() {
        let cases = [
            ("{{.Missing}}", "unknown variable"),
            ("{{Reverse .Pkg}}", "not defined"),
            ("{{.Pkg", "unclosed action"),
            ("{{if .Pkg}}x", "without matching end"),
            ("x{{end}}", "unexpected"),
            ("{{range .Pkg}}{{end}}", "unsupported keyword"),
            ("{{$x := .Pkg}}", "not supported"),
            ("{{/* open", "unclosed comment"),
            ("{{Upper .Pkg .Namespace}}", "exactly one argument"),
        ];

        for (source, expected) in cases {
            let err = render(source).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::Render, "{source}");
            let message = err.to_string();
            assert!(message.contains("test.go.tmpl"), "{message}");
            assert!(message.contains(expected), "{source}: {message}");
        }
    }

    #[test]
    fn test_error_reports_line() {
        let err = render("line one\nline two {{.Nope}}\n").unwrap_err();
        assert!(err.to_string().contains("line 2"), "{err}");
    }
}
