//! Decoding of scalar tokens into their string values

use crate::parser::types::NodeStyle;

/// Plain scalar: line folding only
pub fn decode_plain(raw: &str) -> String {
    fold_flow_lines(raw)
}

/// Single-quoted scalar: strip delimiters, fold, unescape `''`
pub fn decode_single_quoted(raw: &str) -> String {
    let inner = strip_delimiters(raw, '\'');
    fold_flow_lines(inner).replace("''", "'")
}

/// Double-quoted scalar: strip delimiters, fold (honouring escaped line
/// breaks), then process escape sequences
pub fn decode_double_quoted(raw: &str) -> String {
    let inner = strip_delimiters(raw, '"');
    let lines: Vec<&str> = inner.split('\n').collect();
    let last = lines.len().saturating_sub(1);

    let mut folded = String::with_capacity(inner.len());
    let mut pending_breaks = 0usize;
    let mut joined_by_escape = false;
    let mut wrote_any = false;

    for (i, raw_line) in lines.iter().enumerate() {
        let mut line = raw_line.trim_end_matches('\r');
        if i > 0 {
            line = line.trim_start_matches([' ', '\t']);
        }
        if i < last {
            line = line.trim_end_matches([' ', '\t']);
        }

        if i > 0 && i < last && line.is_empty() && !joined_by_escape {
            pending_breaks += 1;
            continue;
        }

        if i > 0 && !joined_by_escape && wrote_any {
            if pending_breaks == 0 {
                folded.push(' ');
            } else {
                folded.push_str(&"\n".repeat(pending_breaks));
            }
        }
        pending_breaks = 0;

        joined_by_escape = i < last && ends_with_unescaped_backslash(line);
        if joined_by_escape {
            line = &line[..line.len() - 1];
        }
        folded.push_str(line);
        wrote_any = true;
    }

    unescape_double_quoted(&folded)
}

/// Block scalar (`|` or `>`): header indicators, indentation, chomping.
///
/// `raw` starts at the indicator and ends at the last content line.
/// `parent_indent` is the indentation of the line holding the indicator,
/// used only with an explicit indentation indicator.
pub fn decode_block(raw: &str, parent_indent: usize) -> (String, NodeStyle) {
    let (header, body) = raw.split_once('\n').unwrap_or((raw, ""));
    let header = header.split('#').next().unwrap_or("").trim();

    let style = if header.starts_with('>') {
        NodeStyle::Folded
    } else {
        NodeStyle::Literal
    };

    let mut chomping = Chomping::Clip;
    let mut explicit_indent = None;
    for c in header.chars().skip(1) {
        match c {
            '-' => chomping = Chomping::Strip,
            '+' => chomping = Chomping::Keep,
            '1'..='9' => explicit_indent = c.to_digit(10).map(|d| d as usize),
            _ => {}
        }
    }

    let lines: Vec<&str> = body
        .split('\n')
        .map(|line| line.trim_end_matches('\r'))
        .collect();

    let indent = explicit_indent
        .map(|d| parent_indent + d)
        .or_else(|| {
            lines
                .iter()
                .find(|line| !line.trim().is_empty())
                .map(|line| line.len() - line.trim_start_matches(' ').len())
        })
        .unwrap_or(0);

    let mut content: Vec<&str> = lines
        .iter()
        .map(|line| {
            if line.trim().is_empty() {
                ""
            } else {
                line.get(indent..).unwrap_or_else(|| line.trim_start())
            }
        })
        .collect();

    let mut trailing_breaks = 0usize;
    while content.last().is_some_and(|line| line.is_empty()) {
        content.pop();
        trailing_breaks += 1;
    }

    let text = match style {
        NodeStyle::Folded => fold_block_lines(&content),
        _ => content.join("\n"),
    };

    let value = match chomping {
        Chomping::Strip => text,
        Chomping::Clip if text.is_empty() => text,
        Chomping::Clip => text + "\n",
        Chomping::Keep => {
            let mut kept = text;
            kept.push('\n');
            // The final break of `body` is not part of the token range.
            kept.push_str(&"\n".repeat(trailing_breaks.saturating_sub(1)));
            kept
        }
    };

    (value, style)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Chomping {
    Clip,
    Strip,
    Keep,
}

fn strip_delimiters(raw: &str, quote: char) -> &str {
    let trimmed = raw.trim();
    let without_open = trimmed.strip_prefix(quote).unwrap_or(trimmed);
    without_open.strip_suffix(quote).unwrap_or(without_open)
}

fn ends_with_unescaped_backslash(line: &str) -> bool {
    let count = line.chars().rev().take_while(|c| *c == '\\').count();
    count % 2 == 1
}

/// Flow folding: single breaks become spaces, runs of empty lines become
/// that many newlines
fn fold_flow_lines(raw: &str) -> String {
    if !raw.contains('\n') {
        return raw.trim_end_matches('\r').to_string();
    }

    let mut out = String::with_capacity(raw.len());
    let mut pending_breaks = 0usize;
    for line in raw.split('\n').map(|line| line.trim_matches([' ', '\t', '\r'])) {
        if line.is_empty() {
            pending_breaks += 1;
            continue;
        }
        if !out.is_empty() {
            if pending_breaks == 0 {
                out.push(' ');
            } else {
                out.push_str(&"\n".repeat(pending_breaks));
            }
        }
        out.push_str(line);
        pending_breaks = 0;
    }
    out
}

fn fold_block_lines(lines: &[&str]) -> String {
    let mut out = String::new();
    let mut breaks = 0usize;
    let mut previous_more_indented: Option<bool> = None;

    for line in lines {
        if line.is_empty() {
            breaks += 1;
            continue;
        }
        let more_indented = line.starts_with([' ', '\t']);
        match previous_more_indented {
            None => out.push_str(&"\n".repeat(breaks)),
            Some(false) if !more_indented && breaks == 0 => out.push(' '),
            Some(false) if !more_indented => out.push_str(&"\n".repeat(breaks)),
            Some(_) => out.push_str(&"\n".repeat(breaks + 1)),
        }
        out.push_str(line);
        previous_more_indented = Some(more_indented);
        breaks = 0;
    }
    out
}

fn unescape_double_quoted(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars();

    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        let Some(escaped) = chars.next() else {
            out.push('\\');
            break;
        };
        let decoded = match escaped {
            '0' => Some('\0'),
            'a' => Some('\x07'),
            'b' => Some('\x08'),
            't' | '\t' => Some('\t'),
            'n' => Some('\n'),
            'v' => Some('\x0b'),
            'f' => Some('\x0c'),
            'r' => Some('\r'),
            'e' => Some('\x1b'),
            ' ' => Some(' '),
            '"' => Some('"'),
            '/' => Some('/'),
            '\\' => Some('\\'),
            'N' => Some('\u{85}'),
            '_' => Some('\u{a0}'),
            'L' => Some('\u{2028}'),
            'P' => Some('\u{2029}'),
            'x' => read_hex(&mut chars, 2),
            'u' => read_hex(&mut chars, 4),
            'U' => read_hex(&mut chars, 8),
            _ => None,
        };
        match decoded {
            Some(decoded) => out.push(decoded),
            None => {
                out.push('\\');
                out.push(escaped);
            }
        }
    }
    out
}

fn read_hex(chars: &mut std::str::Chars<'_>, digits: usize) -> Option<char> {
    let hex: String = chars.by_ref().take(digits).collect();
    u32::from_str_radix(&hex, 16).ok().and_then(char::from_u32)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("plain", "plain")]
    #[case("first\n  second", "first second")]
    #[case("first\n\n  second", "first\nsecond")]
    fn decode_plain_folds_lines(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(decode_plain(raw), expected);
    }

    #[rstest]
    #[case("'it''s'", "it's")]
    #[case("'a\n  b'", "a b")]
    fn decode_single_quoted_returns_expected(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(decode_single_quoted(raw), expected);
    }

    #[rstest]
    #[case(r#""tab\there""#, "tab\there")]
    #[case(r#""quote \" inside""#, "quote \" inside")]
    #[case(r#""\x41é""#, "Aé")]
    #[case("\"joined \\\n  text\"", "joined text")]
    #[case("\"folded\n  line\"", "folded line")]
    fn decode_double_quoted_returns_expected(#[case] raw: &str, #[case] expected: &str) {
        assert_eq!(decode_double_quoted(raw), expected);
    }

    #[rstest]
    #[case("|\n  a\n  b", "a\nb\n", NodeStyle::Literal)]
    #[case("|-\n  a\n  b", "a\nb", NodeStyle::Literal)]
    #[case("|\n  a\n\n  b", "a\n\nb\n", NodeStyle::Literal)]
    #[case(">\n  a\n  b", "a b\n", NodeStyle::Folded)]
    #[case(">-\n  a\n\n  b", "a\nb", NodeStyle::Folded)]
    #[case("|-\n  base\n    indented", "base\n  indented", NodeStyle::Literal)]
    fn decode_block_returns_expected(
        #[case] raw: &str,
        #[case] expected: &str,
        #[case] expected_style: NodeStyle,
    ) {
        let (value, style) = decode_block(raw, 0);
        assert_eq!(value, expected);
        assert_eq!(style, expected_style);
    }

    #[test]
    fn decode_block_with_explicit_indent_keeps_leading_spaces() {
        let (value, _) = decode_block("|2-\n     x\n    y", 2);

        assert_eq!(value, " x\ny");
    }

    #[test]
    fn decode_block_strips_carriage_returns() {
        let (value, _) = decode_block("|-\r\n  a\r\n  b", 0);

        assert_eq!(value, "a\nb");
    }
}
