//! Source-preserving rewriting of stylesheets and inline styles.
//!
//! The text is tokenized with cssparser only to locate declarations; the
//! output is the input with a handful of byte ranges spliced out or
//! replaced, so formatting, comments and unrelated rules survive as-is.

use std::ops::Range;

use cssparser::{CowRcStr, Delimiter, ParseError, Parser, ParserInput, Token};

use super::policy::{Action, action_for};

type CssParseError<'i> = ParseError<'i, ()>;

/// A pending splice into the source text.
#[derive(Debug)]
struct Edit {
    range: Range<usize>,
    replacement: &'static str,
}

/// The outcome of parsing one declaration.
struct Found {
    action: Action,
    /// Byte offset of the property name.
    start: usize,
    /// Byte range of the value's leading keyword, if it has one.
    keyword: Option<Range<usize>>,
}

/// Rewrite every declaration block of a stylesheet.
///
/// Returns `None` when no declaration needed changing.
pub fn rewrite_stylesheet(css: &str) -> Option<String> {
    let mut input = ParserInput::new(css);
    let mut parser = Parser::new(&mut input);
    let mut edits = Vec::new();

    scan_rules(&mut parser, css, &mut edits);
    apply_edits(css, edits)
}

/// Rewrite the declaration list of a `style` attribute.
///
/// Returns `None` when no declaration needed changing. A changed result
/// is trimmed, so removing every declaration yields an empty string.
pub fn rewrite_inline_style(style: &str) -> Option<String> {
    let mut input = ParserInput::new(style);
    let mut parser = Parser::new(&mut input);
    let mut edits = Vec::new();

    scan_declarations(&mut parser, style, &mut edits);
    apply_edits(style, edits).map(|s| s.trim().to_string())
}

fn scan_rules(parser: &mut Parser<'_, '_>, source: &str, edits: &mut Vec<Edit>) {
    let mut at_rule: Option<String> = None;

    while let Ok(token) = parser.next_including_whitespace_and_comments() {
        match token {
            Token::AtKeyword(name) => at_rule = Some(name.to_ascii_lowercase()),
            Token::Semicolon => at_rule = None,
            Token::CurlyBracketBlock => {
                let group = at_rule.take().is_some_and(|name| is_group_rule(&name));
                let _ = parser.parse_nested_block(|block| {
                    if group {
                        scan_rules(block, source, edits);
                    } else {
                        scan_declarations(block, source, edits);
                    }
                    Ok::<_, CssParseError>(())
                });
            }
            _ => {}
        }
    }
}

/// At-rules whose block holds further rules rather than declarations.
fn is_group_rule(name: &str) -> bool {
    let name = if let Some(rest) = name.strip_prefix('-')
        && let Some((_, base)) = rest.split_once('-')
    {
        base
    } else {
        name
    };

    matches!(
        name,
        "media"
            | "supports"
            | "document"
            | "layer"
            | "container"
            | "scope"
            | "starting-style"
            | "keyframes"
    )
}

fn scan_declarations(parser: &mut Parser<'_, '_>, source: &str, edits: &mut Vec<Edit>) {
    loop {
        let gap_start = parser.position().byte_index();
        parser.skip_whitespace();
        if parser.is_exhausted() {
            break;
        }

        let result = parser.parse_until_after(Delimiter::Semicolon, |p| parse_declaration(p));
        let decl_end = parser.position().byte_index();

        // Malformed declarations come back as errors and are left alone
        match result {
            Ok(Found {
                action: Action::Replace(replacement),
                keyword: Some(range),
                ..
            }) => edits.push(Edit { range, replacement }),
            Ok(Found {
                action: Action::Remove,
                start,
                ..
            }) => {
                // Take the whitespace in front along, but not comments
                let start = gap_start + source[gap_start..start].trim_end().len();
                edits.push(Edit {
                    range: start..decl_end,
                    replacement: "",
                });
            }
            _ => {}
        }
    }
}

fn parse_declaration<'i>(p: &mut Parser<'i, '_>) -> Result<Found, CssParseError<'i>> {
    let (start, property) = loop {
        let location = p.current_source_location();
        let start = p.position().byte_index();
        match p.next_including_whitespace_and_comments()?.clone() {
            Token::WhiteSpace(_) | Token::Comment(_) => continue,
            Token::Ident(name) => break (start, name),
            token => return Err(location.new_unexpected_token_error(token)),
        }
    };
    p.expect_colon()?;

    let mut keyword: Option<(CowRcStr<'i>, Range<usize>)> = None;
    let mut leading = true;

    loop {
        let start = p.position().byte_index();
        let token = match p.next_including_whitespace_and_comments() {
            Ok(token) => token.clone(),
            Err(_) => break,
        };

        match token {
            Token::WhiteSpace(_) | Token::Comment(_) => continue,
            Token::Ident(name) if leading => {
                keyword = Some((name, start..p.position().byte_index()));
            }
            Token::Function(_)
            | Token::ParenthesisBlock
            | Token::SquareBracketBlock
            | Token::CurlyBracketBlock => {
                p.parse_nested_block(|block| {
                    while block.next_including_whitespace_and_comments().is_ok() {}
                    Ok::<_, CssParseError<'i>>(())
                })?;
            }
            _ => {}
        }
        leading = false;
    }

    let action = match &keyword {
        Some((name, _)) => action_for(&property, name),
        None => Action::Unchanged,
    };

    Ok(Found {
        action,
        start,
        keyword: keyword.map(|(_, range)| range),
    })
}

fn apply_edits(source: &str, edits: Vec<Edit>) -> Option<String> {
    if edits.is_empty() {
        return None;
    }

    let mut result = source.to_string();

    // Edits are collected in source order and never overlap; apply from
    // the end so earlier ranges stay valid
    for edit in edits.into_iter().rev() {
        result.replace_range(edit.range, edit.replacement);
    }

    Some(result)
}
