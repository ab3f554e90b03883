//! Bracket- and quote-aware scanning shared by the directive parser and the
//! declaration rewriter.

/// Tracks nesting while walking a string one character at a time.
#[derive(Debug, Default)]
struct Nesting {
    parens: usize,
    braces: usize,
    quote: Option<char>,
}

impl Nesting {
    fn step(&mut self, c: char) {
        if let Some(q) = self.quote {
            if c == q {
                self.quote = None;
            }
            return;
        }
        match c {
            '"' | '\'' => self.quote = Some(c),
            '(' => self.parens += 1,
            ')' => self.parens = self.parens.saturating_sub(1),
            '{' => self.braces += 1,
            '}' => self.braces = self.braces.saturating_sub(1),
            _ => {}
        }
    }

    fn at_top_level(&self) -> bool {
        self.quote.is_none() && self.parens == 0 && self.braces == 0
    }
}

/// Splits `text` on every `separator` that sits outside parentheses, braces and quotes.
///
/// Always returns at least one (possibly empty) segment, so `""` yields `[""]`.
pub fn split_top_level(text: &str, separator: char) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut nesting = Nesting::default();
    let mut start = 0;
    for (i, c) in text.char_indices() {
        if c == separator && nesting.at_top_level() {
            parts.push(&text[start..i]);
            start = i + c.len_utf8();
            continue;
        }
        nesting.step(c);
    }
    parts.push(&text[start..]);
    parts
}

/// Splits `text` at its first top-level `{` into the prefix before it and the
/// contents of the brace block. An unterminated block runs to the end of the text.
pub fn split_block(text: &str) -> Option<(&str, &str)> {
    let mut nesting = Nesting::default();
    let mut open = None;
    for (i, c) in text.char_indices() {
        match open {
            None if c == '{' && nesting.at_top_level() => {
                open = Some(i);
                nesting.step(c);
            }
            Some(start) => {
                nesting.step(c);
                if c == '}' && nesting.at_top_level() {
                    return Some((&text[..start], &text[start + 1..i]));
                }
            }
            None => nesting.step(c),
        }
    }
    open.map(|start| (&text[..start], &text[start + 1..]))
}

/// Returns the contents of `{ ... }` when the whole (trimmed) text is one brace
/// block, or the trimmed text itself otherwise.
pub fn unwrap_braces(text: &str) -> &str {
    let trimmed = text.trim();
    match split_block(trimmed) {
        Some((prefix, inner)) if prefix.trim().is_empty() => {
            let consumed = prefix.len() + inner.len() + 2;
            if trimmed.len() <= consumed {
                inner.trim()
            } else {
                trimmed
            }
        }
        _ => trimmed,
    }
}
