//! Template parser.
//!
//! A single [`regex`] built from the configured delimiters locates the next
//! tag candidate: an open delimiter (optional in naked mode) followed by an
//! identifier. Delimited candidates are then scanned character by character
//! to find the matching closer, tracking nesting depth and resolving escape
//! sequences. The body of every delimited tag is parsed again with the same
//! options to build the nested [`Ast`].
//!
//! Malformed input never fails: a candidate that is not closed before the
//! end of the input is not a tag, and its text stays literal.

use regex::Regex;

use crate::ast::node::{Ast, Node, TagNode};
use crate::error::ParseError;

mod options;

pub use options::{DEFAULT_MAX_DEPTH, ParseOptions};

const ESCAPE: char = '\\';

/// Parse source text into an [`Ast`] using `{`/`}` delimiters.
///
/// An empty string yields an empty AST.
///
/// ```rust
/// use kurly::parse;
///
/// let ast = parse("Hello, {name}!").unwrap();
/// assert_eq!(ast.len(), 3);
/// assert_eq!(ast[1].as_tag().map(|t| t.name.as_str()), Some("name"));
/// ```
pub fn parse(source: &str) -> Result<Ast, ParseError> {
    parse_with_options(source, &ParseOptions::default())
}

/// Parse source text with custom delimiters, naked-tag mode or depth limit.
///
/// Fails only when `options` are invalid or the nesting limit is exceeded.
///
/// ```rust
/// use kurly::{parse_with_options, ParseOptions};
///
/// let opts = ParseOptions::new().optional(true);
/// let ast = parse_with_options("file:./my.config url:https://x", &opts).unwrap();
/// assert_eq!(ast.len(), 3);
/// assert_eq!(ast[0].as_tag().unwrap().text, ":./my.config");
/// ```
pub fn parse_with_options(source: &str, options: &ParseOptions) -> Result<Ast, ParseError> {
    options.validate()?;
    let scanner = Scanner::new(options)?;
    let ast = scanner.parse_level(source, 1)?;
    tracing::trace!(source, nodes = ast.len(), "parsed template");
    Ok(ast)
}

// -- Scanner ---------------------------------------------------------------

struct Scanner<'o> {
    options: &'o ParseOptions,
    pattern: Regex,
}

/// A tag whose extent has been determined. Offsets are relative to the
/// slice the candidate was found in.
struct Found {
    end: usize,
    sep: String,
    text: String,
}

impl<'o> Scanner<'o> {
    fn new(options: &'o ParseOptions) -> Result<Self, ParseError> {
        let open = regex::escape(&options.open.to_string());
        let quantifier = if options.optional { "?" } else { "" };
        let source = format!("({open}{quantifier})([_a-zA-Z][_a-zA-Z0-9]*)");
        let pattern = Regex::new(&source)
            .map_err(|e| ParseError::invalid_options(format!("unusable delimiters: {e}")))?;
        Ok(Self { options, pattern })
    }

    fn parse_level(&self, source: &str, level: usize) -> Result<Ast, ParseError> {
        let ends = self.closing_offsets(source);
        let mut ast = Vec::new();
        let mut rest = source;
        let mut base = 0;
        let mut search = 0;

        while let Some(caps) = self.pattern.captures_at(rest, search) {
            let (Some(whole), Some(name)) = (caps.get(0), caps.get(2)) else {
                break;
            };
            let start = whole.start();
            let open = caps.get(1).map_or("", |m| m.as_str());

            let found = if open.is_empty() {
                Some(self.read_naked(rest, name.end()))
            } else {
                ends[base + start].map(|end| self.read_delimited(rest, name.end(), end - base))
            };

            let Some(found) = found else {
                // Not closed: not a tag. Look again just past the delimiter.
                search = start + open.len();
                continue;
            };

            if level > self.options.max_depth {
                return Err(ParseError::recursion_limit(self.options.max_depth));
            }

            if start > 0 {
                ast.push(Node::Text(rest[..start].to_string()));
            }

            let child_ast = if open.is_empty() {
                if found.text.is_empty() {
                    Vec::new()
                } else {
                    vec![Node::Text(found.text.clone())]
                }
            } else {
                self.parse_level(&found.text, level + 1)?
            };

            let close = if open.is_empty() {
                String::new()
            } else {
                self.options.close.to_string()
            };

            ast.push(Node::Tag(TagNode {
                open: open.to_string(),
                name: name.as_str().to_string(),
                sep: found.sep,
                text: found.text,
                close,
                ast: child_ast,
            }));

            rest = &rest[found.end..];
            base += found.end;
            search = 0;
        }

        if !rest.is_empty() {
            ast.push(Node::Text(rest.to_string()));
        }
        Ok(ast)
    }

    /// A naked tag's body runs from the end of its name to the next space.
    fn read_naked(&self, rest: &str, body_start: usize) -> Found {
        let end = rest[body_start..]
            .find(' ')
            .map_or(rest.len(), |i| body_start + i);
        Found {
            end,
            sep: String::new(),
            text: rest[body_start..end].to_string(),
        }
    }

    /// For every open delimiter in `source`, the offset just past its
    /// matching closer, or `None` when it is never closed.
    ///
    /// One pass records the delimiter balance after each character, with
    /// escaped characters counting as neither. An opener is closed by the
    /// first later character whose balance drops below the opener's own.
    fn closing_offsets(&self, source: &str) -> Vec<Option<usize>> {
        let (open, close) = (self.options.open, self.options.close);
        let mut chars = Vec::new();
        let mut balance = 0isize;
        let mut escaped = false;

        for (offset, c) in source.char_indices() {
            if escaped {
                escaped = false;
            } else if c == ESCAPE {
                escaped = true;
            } else if c == open {
                balance += 1;
            } else if c == close {
                balance -= 1;
            }
            chars.push((offset, c, balance));
        }

        let mut ends = vec![None; source.len()];
        let mut lower: Vec<usize> = Vec::new();
        for (k, &(offset, c, balance)) in chars.iter().enumerate().rev() {
            while let Some(&top) = lower.last() {
                if chars[top].2 >= balance {
                    lower.pop();
                } else {
                    break;
                }
            }
            if c == open {
                ends[offset] = lower.last().map(|&j| chars[j].0 + chars[j].1.len_utf8());
            }
            lower.push(k);
        }
        ends
    }

    /// Read a delimited body whose closer ends at `end`, splitting off the
    /// leading whitespace and resolving escape sequences.
    fn read_delimited(&self, rest: &str, body_start: usize, end: usize) -> Found {
        let (open, close) = (self.options.open, self.options.close);
        let body_end = end - close.len_utf8();
        let mut escaped = false;
        let mut sep = String::new();
        let mut text = String::new();

        for c in rest[body_start..body_end].chars() {
            if escaped {
                escaped = false;
                match c {
                    'n' => text.push('\n'),
                    't' => text.push('\t'),
                    c if c == open || c == close || c == ESCAPE => text.push(c),
                    other => {
                        // Unknown escapes pass through unresolved.
                        text.push(ESCAPE);
                        text.push(other);
                    }
                }
                continue;
            }

            if c == ESCAPE {
                escaped = true;
                continue;
            }
            if text.is_empty() && c.is_whitespace() {
                sep.push(c);
                continue;
            }
            text.push(c);
        }

        Found { end, sep, text }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ParseErrorKind;

    fn tag(node: &Node) -> &TagNode {
        match node {
            Node::Tag(t) => t,
            other => panic!("expected tag, got {other:?}"),
        }
    }

    fn text(node: &Node) -> &str {
        match node {
            Node::Text(s) => s,
            other => panic!("expected text, got {other:?}"),
        }
    }

    #[test]
    fn test_empty_input() {
        assert!(parse("").unwrap().is_empty());
    }

    #[test]
    fn test_literal_text() {
        let ast = parse("Hello, world!").unwrap();
        assert_eq!(ast, vec![Node::from("Hello, world!")]);
    }

    #[test]
    fn test_simple_tag() {
        let ast = parse("this is a {test}").unwrap();
        assert_eq!(ast.len(), 2);
        assert_eq!(text(&ast[0]), "this is a ");
        let t = tag(&ast[1]);
        assert_eq!(t.name, "test");
        assert_eq!((t.open.as_str(), t.close.as_str()), ("{", "}"));
        assert!(t.text.is_empty());
        assert!(t.ast.is_empty());
    }

    #[test]
    fn test_sep_keeps_leading_whitespace() {
        let ast = parse("{greet \t world  }").unwrap();
        let t = tag(&ast[0]);
        assert_eq!(t.sep, " \t ");
        assert_eq!(t.text, "world  ");
        assert_eq!(t.source(), "{greet \t world  }");
    }

    #[test]
    fn test_balanced_nesting() {
        let ast = parse("{a {b {c}}}").unwrap();
        assert_eq!(ast.len(), 1);
        let a = tag(&ast[0]);
        assert_eq!(a.name, "a");
        assert_eq!(a.text, "{b {c}}");
        assert_eq!(a.ast.len(), 1);
        let b = tag(&a.ast[0]);
        assert_eq!(b.name, "b");
        assert_eq!(b.ast.len(), 1);
        let c = tag(&b.ast[0]);
        assert_eq!(c.name, "c");
        assert!(c.ast.is_empty());
    }

    #[test]
    fn test_body_mixes_text_and_tags() {
        let ast = parse("{hello, {world}!}").unwrap();
        let hello = tag(&ast[0]);
        assert_eq!(hello.text, ", {world}!");
        assert_eq!(hello.ast.len(), 3);
        assert_eq!(text(&hello.ast[0]), ", ");
        assert_eq!(tag(&hello.ast[1]).name, "world");
        assert_eq!(text(&hello.ast[2]), "!");
    }

    #[test]
    fn test_unterminated_tag_is_text() {
        let ast = parse("a {tag without close").unwrap();
        assert_eq!(ast, vec![Node::from("a {tag without close")]);
    }

    #[test]
    fn test_tag_at_end_of_input_is_text() {
        assert_eq!(parse("x {a").unwrap(), vec![Node::from("x {a")]);
    }

    #[test]
    fn test_inner_tag_survives_unterminated_outer() {
        let ast = parse("x {a {b}").unwrap();
        assert_eq!(ast.len(), 2);
        assert_eq!(text(&ast[0]), "x {a ");
        assert_eq!(tag(&ast[1]).name, "b");
    }

    #[test]
    fn test_stray_closer_is_text() {
        let ast = parse("a } b {c} }").unwrap();
        assert_eq!(ast.len(), 3);
        assert_eq!(text(&ast[0]), "a } b ");
        assert_eq!(tag(&ast[1]).name, "c");
        assert_eq!(text(&ast[2]), " }");
    }

    #[test]
    fn test_open_without_identifier_is_text() {
        assert_eq!(parse("{ a} {1}").unwrap(), vec![Node::from("{ a} {1}")]);
    }

    #[test]
    fn test_escaped_closer() {
        let ast = parse("{a \\}}").unwrap();
        assert_eq!(ast.len(), 1);
        let a = tag(&ast[0]);
        assert_eq!(a.text, "}");
        assert_eq!(a.ast, vec![Node::from("}")]);
    }

    #[test]
    fn test_escape_sequences() {
        let ast = parse(r"{a x\ny\tz\{\\\q}").unwrap();
        assert_eq!(tag(&ast[0]).text, "x\ny\tz{\\\\q");
    }

    #[test]
    fn test_escaped_opener_does_not_nest() {
        let ast = parse(r"{a \{b}").unwrap();
        let a = tag(&ast[0]);
        assert_eq!(a.text, "{b");
        // The resolved body is reparsed, where `{b` is unterminated.
        assert_eq!(a.ast, vec![Node::from("{b")]);
    }

    #[test]
    fn test_custom_delimiters() {
        let opts = ParseOptions::new().delimiters('<', '>');
        let ast = parse_with_options("a <b {c}> d", &opts).unwrap();
        assert_eq!(ast.len(), 3);
        let b = tag(&ast[1]);
        assert_eq!((b.open.as_str(), b.close.as_str()), ("<", ">"));
        assert_eq!(b.ast, vec![Node::from("{c}")]);
    }

    #[test]
    fn test_regex_metacharacter_delimiters() {
        let opts = ParseOptions::new().delimiters('(', ')');
        let ast = parse_with_options("x (y z)", &opts).unwrap();
        assert_eq!(tag(&ast[1]).text, "z");
    }

    #[test]
    fn test_naked_tags_are_space_terminated() {
        let opts = ParseOptions::new().optional(true);
        let ast = parse_with_options("file:./my.config url:https://x", &opts).unwrap();
        assert_eq!(ast.len(), 3);
        let file = tag(&ast[0]);
        assert_eq!(file.name, "file");
        assert_eq!(file.text, ":./my.config");
        assert!(file.open.is_empty() && file.sep.is_empty() && file.close.is_empty());
        assert_eq!(text(&ast[1]), " ");
        let url = tag(&ast[2]);
        assert_eq!(url.name, "url");
        assert_eq!(url.text, ":https://x");
    }

    #[test]
    fn test_naked_body_is_not_reparsed() {
        let opts = ParseOptions::new().optional(true);
        let ast = parse_with_options("inc:{x}", &opts).unwrap();
        let inc = tag(&ast[0]);
        assert_eq!(inc.text, ":{x}");
        assert_eq!(inc.ast, vec![Node::from(":{x}")]);
    }

    #[test]
    fn test_naked_tag_with_empty_body() {
        let opts = ParseOptions::new().optional(true);
        let ast = parse_with_options("a b", &opts).unwrap();
        assert_eq!(ast.len(), 3);
        assert!(tag(&ast[0]).ast.is_empty());
    }

    #[test]
    fn test_optional_mode_prefers_delimited() {
        let opts = ParseOptions::new().optional(true);
        let ast = parse_with_options("{a b c}", &opts).unwrap();
        assert_eq!(ast.len(), 1);
        let a = tag(&ast[0]);
        assert_eq!(a.open, "{");
        assert_eq!(a.text, "b c");
        assert_eq!(a.ast.len(), 3);
    }

    #[test]
    fn test_optional_mode_unterminated_falls_back_to_naked() {
        let opts = ParseOptions::new().optional(true);
        let ast = parse_with_options("{a b", &opts).unwrap();
        assert_eq!(text(&ast[0]), "{");
        assert_eq!(tag(&ast[1]).name, "a");
        assert!(tag(&ast[1]).open.is_empty());
    }

    #[test]
    fn test_depth_limit() {
        let opts = ParseOptions::new().max_depth(2);
        let err = parse_with_options("{a {b {c}}}", &opts).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::RecursionLimit);
        assert!(parse_with_options("{a {b}}", &opts).is_ok());
    }

    #[test]
    fn test_invalid_options_fail_before_scanning() {
        let opts = ParseOptions::new().delimiters('#', '#');
        let err = parse_with_options("", &opts).unwrap_err();
        assert_eq!(err.kind, ParseErrorKind::InvalidOptions);
    }

    #[test]
    fn test_multibyte_text() {
        // Names are ASCII identifiers, so the name stops before `ö`.
        let ast = parse("héllo {wörld ✓} ünd").unwrap();
        assert_eq!(text(&ast[0]), "héllo ");
        assert_eq!(tag(&ast[1]).name, "w");
        assert_eq!(tag(&ast[1]).text, "örld ✓");

        let ast = parse("→ {x ✓} ←").unwrap();
        assert_eq!(text(&ast[0]), "→ ");
        assert_eq!(tag(&ast[1]).text, "✓");
        assert_eq!(text(&ast[2]), " ←");
    }

    #[test]
    fn test_many_unclosed_openers_parse_in_linear_time() {
        let source = "{a".repeat(50_000);
        let started = std::time::Instant::now();
        let ast = parse(&source).unwrap();
        assert!(started.elapsed() < std::time::Duration::from_secs(2));
        assert_eq!(ast, vec![Node::Text(source)]);
    }

    #[test]
    fn test_closed_tag_after_unclosed_run() {
        let source = format!("{}{{b x}}!", "{a ".repeat(1_000));
        let ast = parse(&source).unwrap();
        assert_eq!(ast.len(), 3);
        assert_eq!(text(&ast[0]), "{a ".repeat(1_000));
        assert_eq!(tag(&ast[1]).name, "b");
        assert_eq!(tag(&ast[1]).text, "x");
        assert_eq!(text(&ast[2]), "!");
    }

    #[test]
    fn test_closer_lookup_after_earlier_tags() {
        // Offsets into the level must stay aligned once `rest` has advanced.
        let ast = parse(r"{a} {b {c} \} d} {e").unwrap();
        assert_eq!(ast.len(), 4);
        assert_eq!(tag(&ast[0]).name, "a");
        assert_eq!(tag(&ast[2]).text, "{c} } d");
        assert_eq!(text(&ast[3]), " {e");
    }
}
