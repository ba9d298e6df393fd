//! Minimal push-style XML tokenizer.
//!
//! Understands elements, self-closing elements, attributes (skipped),
//! comments, processing instructions, `<!DOCTYPE>`, CDATA sections and the
//! predefined and numeric character entities.  Input is consumed line by line
//! and character data is delivered in chunks, so memory stays bounded by the
//! longest line.

use std::io::BufRead;

use super::LoadError;

/// Receives tokenizer events.  Any error stops the parse.
pub trait SaxHandler {
    fn start_tag(&mut self, name: &str) -> Result<(), LoadError>;

    fn character_data(&mut self, text: &str) -> Result<(), LoadError>;

    fn end_tag(&mut self, name: &str) -> Result<(), LoadError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Text,
    Markup,
}

struct Tokenizer {
    mode: Mode,
    line: usize,
    text: String,
    markup: String,
    quote: Option<char>,
    open: Vec<String>,
}

/// Feed a whole document to `handler`.
pub fn tokenize<R: BufRead, H: SaxHandler>(
    mut reader: R,
    handler: &mut H,
) -> Result<(), LoadError> {
    let mut tok = Tokenizer {
        mode: Mode::Text,
        line: 1,
        text: String::new(),
        markup: String::new(),
        quote: None,
        open: Vec::new(),
    };

    let mut buf = String::new();
    loop {
        buf.clear();
        if reader.read_line(&mut buf)? == 0 {
            break;
        }
        for c in buf.chars() {
            tok.push(c, handler)?;
        }
        if tok.mode == Mode::Text {
            tok.flush_text(handler)?;
        }
    }
    tok.finish()
}

impl Tokenizer {
    fn malformed(&self, message: impl Into<String>) -> LoadError {
        LoadError::Malformed {
            line: self.line,
            message: message.into(),
        }
    }

    fn push<H: SaxHandler>(&mut self, c: char, handler: &mut H) -> Result<(), LoadError> {
        match self.mode {
            Mode::Text => {
                if c == '<' {
                    self.flush_text(handler)?;
                    self.mode = Mode::Markup;
                    self.markup.clear();
                    self.quote = None;
                } else {
                    self.text.push(c);
                }
            }
            Mode::Markup => {
                if self.markup_complete(c) {
                    let markup = std::mem::take(&mut self.markup);
                    self.mode = Mode::Text;
                    self.handle_markup(&markup, handler)?;
                } else {
                    self.markup.push(c);
                }
            }
        }
        if c == '\n' {
            self.line += 1;
        }
        Ok(())
    }

    /// True when `c` is the `>` closing the current markup.
    fn markup_complete(&mut self, c: char) -> bool {
        let m = &self.markup;
        if m.starts_with("!--") {
            return c == '>' && m.len() >= 5 && m.ends_with("--");
        }
        if m.starts_with("![CDATA[") {
            return c == '>' && m.ends_with("]]");
        }
        if m.starts_with('?') {
            return c == '>' && m.len() >= 2 && m.ends_with('?');
        }
        match (self.quote, c) {
            (Some(q), c) if c == q => {
                self.quote = None;
                false
            }
            (Some(_), _) => false,
            (None, '"') | (None, '\'') => {
                self.quote = Some(c);
                false
            }
            (None, '>') => true,
            _ => false,
        }
    }

    fn handle_markup<H: SaxHandler>(
        &mut self,
        markup: &str,
        handler: &mut H,
    ) -> Result<(), LoadError> {
        if markup.starts_with('?') || markup.starts_with("!--") || markup.starts_with("!DOCTYPE") {
            return Ok(());
        }
        if let Some(data) = markup
            .strip_prefix("![CDATA[")
            .and_then(|rest| rest.strip_suffix("]]"))
        {
            if self.open.is_empty() {
                return Err(self.malformed("CDATA outside the document element"));
            }
            return handler.character_data(data);
        }
        if let Some(rest) = markup.strip_prefix('/') {
            let name = rest.trim();
            return match self.open.pop() {
                Some(open) if open == name => handler.end_tag(name),
                Some(open) => Err(self.malformed(format!(
                    "</{}> does not close <{}>",
                    name, open
                ))),
                None => Err(self.malformed(format!("unexpected </{}>", name))),
            };
        }

        let (body, self_closing) = match markup.strip_suffix('/') {
            Some(body) => (body, true),
            None => (markup, false),
        };
        let name = body
            .split(|c: char| c.is_whitespace())
            .next()
            .unwrap_or_default();
        if !is_name(name) {
            return Err(self.malformed(format!("invalid element name '{}'", name)));
        }
        handler.start_tag(name)?;
        if self_closing {
            handler.end_tag(name)
        } else {
            self.open.push(name.to_string());
            Ok(())
        }
    }

    fn flush_text<H: SaxHandler>(&mut self, handler: &mut H) -> Result<(), LoadError> {
        if self.text.is_empty() {
            return Ok(());
        }
        let raw = std::mem::take(&mut self.text);
        if self.open.is_empty() {
            if raw.trim().is_empty() {
                return Ok(());
            }
            return Err(self.malformed("text outside the document element"));
        }
        let decoded = decode_entities(&raw).map_err(|m| self.malformed(m))?;
        handler.character_data(&decoded)
    }

    fn finish(self) -> Result<(), LoadError> {
        if self.mode == Mode::Markup {
            return Err(self.malformed("unterminated markup at end of input"));
        }
        if let Some(open) = self.open.last() {
            return Err(self.malformed(format!("<{}> is never closed", open)));
        }
        Ok(())
    }
}

fn is_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_alphabetic() || c == '_' || c == ':' => {}
        _ => return false,
    }
    chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | ':' | '-' | '.'))
}

fn decode_entities(raw: &str) -> Result<String, String> {
    if !raw.contains('&') {
        return Ok(raw.to_string());
    }
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;
    while let Some(amp) = rest.find('&') {
        out.push_str(&rest[..amp]);
        let after = &rest[amp + 1..];
        let semi = after
            .find(';')
            .ok_or_else(|| "unterminated entity reference".to_string())?;
        let entity = &after[..semi];
        let c = match entity {
            "lt" => '<',
            "gt" => '>',
            "amp" => '&',
            "quot" => '"',
            "apos" => '\'',
            _ => {
                let code = if let Some(hex) = entity.strip_prefix("#x") {
                    u32::from_str_radix(hex, 16).ok()
                } else if let Some(dec) = entity.strip_prefix('#') {
                    dec.parse().ok()
                } else {
                    None
                };
                code.and_then(char::from_u32)
                    .ok_or_else(|| format!("unknown entity '&{};'", entity))?
            }
        };
        out.push(c);
        rest = &after[semi + 1..];
    }
    out.push_str(rest);
    Ok(out)
}
