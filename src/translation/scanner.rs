use std::borrow::Cow;

use super::PlaceholderStyle;
use super::parsers::{
    closes_block_comment, closes_dollar_quote, dollar_quote_tag, escaped_marker, native_index,
    opens_block_comment, opens_line_comment,
};

#[derive(Clone)]
enum State {
    Normal,
    SingleQuoted,
    DoubleQuoted,
    LineComment,
    BlockComment(u32),
    DollarQuoted(String),
}

/// SQL with neutral markers rewritten, plus what placeholders were found.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PositionedSql<'a> {
    pub sql: Cow<'a, str>,
    /// Neutral `?` markers rewritten into the target style.
    pub markers: usize,
    /// Highest index among placeholders already written in the target style (`:2`, `$2`, `?2`).
    pub native: usize,
}

/// Rewrite every neutral `?` marker into `style`, numbering them left to right.
///
/// Markers inside string literals, quoted identifiers, comments and dollar-quoted bodies are
/// left alone. `\?` is an escaped literal and comes out as a bare `?`. Placeholders already in
/// the target style are kept verbatim and only counted, so positioning its own output changes
/// nothing. Returns a borrowed `Cow` when nothing had to change.
#[must_use]
pub fn position_bindings(sql: &str, style: PlaceholderStyle) -> PositionedSql<'_> {
    let bytes = sql.as_bytes();
    let mut out: Option<String> = None;
    let mut copied_to = 0;
    let mut markers = 0;
    let mut native = 0;
    let mut state = State::Normal;
    let mut idx = 0;

    while idx < bytes.len() {
        let b = bytes[idx];
        let mut next_state = None;
        match &state {
            State::Normal => {
                if opens_line_comment(bytes, idx) {
                    next_state = Some(State::LineComment);
                    idx += 1;
                } else if opens_block_comment(bytes, idx) {
                    next_state = Some(State::BlockComment(1));
                    idx += 1;
                } else if escaped_marker(bytes, idx) {
                    let buf = out.get_or_insert_with(|| String::with_capacity(sql.len() + 8));
                    buf.push_str(&sql[copied_to..idx]);
                    buf.push('?');
                    idx += 1;
                    copied_to = idx + 1;
                } else if let Some((index, end)) = native_index(bytes, idx, style) {
                    native = native.max(index);
                    idx = end - 1;
                } else {
                    match b {
                        b'\'' => next_state = Some(State::SingleQuoted),
                        b'"' => next_state = Some(State::DoubleQuoted),
                        b'$' => {
                            if let Some((tag, tag_end)) = dollar_quote_tag(bytes, idx) {
                                next_state = Some(State::DollarQuoted(tag));
                                idx = tag_end;
                            }
                        }
                        b'?' => {
                            markers += 1;
                            let buf =
                                out.get_or_insert_with(|| String::with_capacity(sql.len() + 8));
                            buf.push_str(&sql[copied_to..idx]);
                            style.write_marker(buf, markers);
                            copied_to = idx + 1;
                        }
                        _ => {}
                    }
                }
            }
            State::SingleQuoted => {
                if b == b'\'' {
                    if bytes.get(idx + 1) == Some(&b'\'') {
                        idx += 1;
                    } else {
                        next_state = Some(State::Normal);
                    }
                }
            }
            State::DoubleQuoted => {
                if b == b'"' {
                    if bytes.get(idx + 1) == Some(&b'"') {
                        idx += 1;
                    } else {
                        next_state = Some(State::Normal);
                    }
                }
            }
            State::LineComment => {
                if b == b'\n' {
                    next_state = Some(State::Normal);
                }
            }
            State::BlockComment(depth) => {
                if opens_block_comment(bytes, idx) {
                    next_state = Some(State::BlockComment(depth + 1));
                    idx += 1;
                } else if closes_block_comment(bytes, idx) {
                    next_state = Some(if *depth == 1 {
                        State::Normal
                    } else {
                        State::BlockComment(depth - 1)
                    });
                    idx += 1;
                }
            }
            State::DollarQuoted(tag) => {
                if b == b'$' && closes_dollar_quote(bytes, idx, tag) {
                    idx += 1 + tag.len();
                    next_state = Some(State::Normal);
                }
            }
        }

        if let Some(next) = next_state {
            state = next;
        }
        idx += 1;
    }

    let sql = match out {
        Some(mut buf) => {
            buf.push_str(&sql[copied_to..]);
            Cow::Owned(buf)
        }
        None => Cow::Borrowed(sql),
    };
    PositionedSql {
        sql,
        markers,
        native,
    }
}
