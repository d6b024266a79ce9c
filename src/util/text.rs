use std::borrow::Cow;

use unicode_width::{UnicodeWidthChar, UnicodeWidthStr};

const ELLIPSIS: &str = "...";
const ELLIPSIS_WIDTH: usize = 3;

/// Display width of a string in terminal columns (CJK and emoji count as 2).
pub fn display_width(s: &str) -> usize {
    UnicodeWidthStr::width(s)
}

/// Truncates a string to at most `max_width` terminal columns, appending
/// "..." when something was cut.
///
/// Widths of 3 or less leave no room for the ellipsis, so the string is cut
/// without one. Returns `Cow::Borrowed` when the input already fits.
pub fn truncate_to_width(s: &str, max_width: usize) -> Cow<'_, str> {
    if max_width == 0 {
        return Cow::Borrowed("");
    }
    if display_width(s) <= max_width {
        return Cow::Borrowed(s);
    }

    let budget = if max_width <= ELLIPSIS_WIDTH {
        max_width
    } else {
        max_width - ELLIPSIS_WIDTH
    };

    let mut width = 0;
    let mut cut = 0;
    for (idx, c) in s.char_indices() {
        let w = UnicodeWidthChar::width(c).unwrap_or(0);
        if width + w > budget {
            break;
        }
        width += w;
        cut = idx + c.len_utf8();
    }

    if max_width <= ELLIPSIS_WIDTH {
        Cow::Owned(s[..cut].to_string())
    } else {
        Cow::Owned(format!("{}{}", &s[..cut], ELLIPSIS))
    }
}

/// Keeps the first `max_words` whitespace-separated words of `text`.
///
/// Longer text is re-joined with single spaces and suffixed with "...".
pub fn limit_words(text: &str, max_words: usize) -> Cow<'_, str> {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.len() <= max_words {
        return Cow::Borrowed(text);
    }
    Cow::Owned(format!("{}{}", words[..max_words].join(" "), ELLIPSIS))
}

/// SEC-001: Strip terminal control characters and ANSI escape sequences.
///
/// Article titles and summaries come straight from the backend and end up in
/// the terminal, so CSI (`ESC [ ... final`) and OSC (`ESC ] ... BEL|ST`)
/// sequences, bare ESC, DEL and C0 controls are removed. Tab, newline and
/// carriage return survive.
pub fn strip_control_chars(s: &str) -> Cow<'_, str> {
    let bytes = s.as_bytes();
    if !bytes.iter().any(|&b| is_stripped(b)) {
        return Cow::Borrowed(s);
    }

    let mut out = String::with_capacity(s.len());
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            0x1b if bytes.get(i + 1) == Some(&b'[') => {
                i += 2;
                while i < bytes.len() {
                    let c = bytes[i];
                    i += 1;
                    if (0x40..=0x7e).contains(&c) {
                        break;
                    }
                }
            }
            0x1b if bytes.get(i + 1) == Some(&b']') => {
                i += 2;
                while i < bytes.len() {
                    if bytes[i] == 0x07 {
                        i += 1;
                        break;
                    }
                    if bytes[i] == 0x1b && bytes.get(i + 1) == Some(&b'\\') {
                        i += 2;
                        break;
                    }
                    i += 1;
                }
            }
            b if is_stripped(b) => i += 1,
            _ => {
                let start = i;
                while i < bytes.len() && !is_stripped(bytes[i]) {
                    i += 1;
                }
                // Only ASCII bytes stop the run, so the slice is on a char boundary.
                out.push_str(&s[start..i]);
            }
        }
    }

    Cow::Owned(out)
}

fn is_stripped(b: u8) -> bool {
    b == 0x1b || b == 0x7f || (b < 0x20 && b != b'\t' && b != b'\n' && b != b'\r')
}
