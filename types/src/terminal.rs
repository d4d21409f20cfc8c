//! Escape-sequence stripping for text printed to a terminal.
//!
//! Assistant output is untrusted. Raw escape sequences in it could move the
//! cursor, rewrite earlier lines, or set the clipboard (OSC 52), so anything
//! echoed to a terminal goes through [`strip_escape_sequences`] first.

use std::borrow::Cow;
use std::iter::Peekable;
use std::str::Chars;

const ESC: char = '\x1b';
const BEL: char = '\x07';
const C1_CSI: char = '\u{009b}';

/// Remove escape sequences and control characters, keeping `\n`, `\t`, `\r`.
///
/// Borrows when nothing needs stripping.
///
/// ```
/// use confab_types::strip_escape_sequences;
///
/// assert_eq!(strip_escape_sequences("plain"), "plain");
/// assert_eq!(strip_escape_sequences("a\x1b[31mred\x1b[0m"), "ared");
/// ```
#[must_use]
pub fn strip_escape_sequences(input: &str) -> Cow<'_, str> {
    if !input.chars().any(is_stripped) {
        return Cow::Borrowed(input);
    }

    let mut out = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            ESC => skip_escape(&mut chars),
            C1_CSI => skip_csi(&mut chars),
            c if is_stripped(c) => {}
            c => out.push(c),
        }
    }
    Cow::Owned(out)
}

fn is_stripped(c: char) -> bool {
    let control = c <= '\x1f' || c == '\x7f' || ('\u{0080}'..='\u{009f}').contains(&c);
    control && !matches!(c, '\n' | '\t' | '\r')
}

fn skip_escape(chars: &mut Peekable<Chars<'_>>) {
    let Some(&kind) = chars.peek() else {
        return;
    };
    match kind {
        '[' => {
            chars.next();
            skip_csi(chars);
        }
        // OSC ends at BEL or ST; DCS, PM and APC only at ST.
        ']' => {
            chars.next();
            skip_string(chars, true);
        }
        'P' | '^' | '_' => {
            chars.next();
            skip_string(chars, false);
        }
        // Charset and line-attribute selection take one argument.
        '(' | ')' | '*' | '+' | '#' | ' ' => {
            chars.next();
            chars.next();
        }
        '7' | '8' | 'c' | 'D' | 'E' | 'H' | 'M' | 'N' | 'O' | 'Z' | '=' | '>' | '<' => {
            chars.next();
        }
        _ => {}
    }
}

/// Parameter and intermediate bytes, then one final byte.
fn skip_csi(chars: &mut Peekable<Chars<'_>>) {
    while let Some(&c) = chars.peek() {
        match c {
            '\x20'..='\x3f' => {
                chars.next();
            }
            '\x40'..='\x7e' => {
                chars.next();
                return;
            }
            _ => return,
        }
    }
}

fn skip_string(chars: &mut Peekable<Chars<'_>>, bel_terminates: bool) {
    while let Some(c) = chars.next() {
        if bel_terminates && c == BEL {
            return;
        }
        if c == ESC && chars.next_if_eq(&'\\').is_some() {
            return;
        }
    }
}
