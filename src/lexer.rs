use std::ops::Range;

use crate::error::TranscodeError;

/// One line of a card file, split into its card name and the raw remainder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SplitLine<'a> {
    pub name: &'a str,
    /// Whitespace between the name and the value, kept so the line can be
    /// re-emitted with its original alignment.
    pub spacing: &'a str,
    /// Remainder of the line with trailing whitespace removed.
    pub value: Option<&'a str>,
}

/// A whitespace separated field inside a card value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    /// Byte range of the field inside the value, quotes included.
    pub span: Range<usize>,
    pub quote: Option<char>,
    /// Field content with the surrounding quotes removed.
    pub text: String,
}

impl Field {
    /// Re-quote `text` the same way this field was quoted.
    pub fn requote(&self, text: &str) -> String {
        match self.quote {
            Some(q) => format!("{q}{text}{q}"),
            None => text.to_string(),
        }
    }
}

fn is_quote(ch: char) -> bool {
    ch == '"' || ch == '\''
}

/// Split a card line into name, spacing and value.
///
/// The line must not be blank. [`CardFile::parse`](crate::CardFile::parse)
/// keeps blank lines as trivia and never passes them here.
pub fn split_card_line(line: &str, line_no: usize) -> Result<SplitLine<'_>, TranscodeError> {
    let line = line.trim_end();
    let start = line.len() - line.trim_start().len();
    let body = &line[start..];
    if body.starts_with(is_quote) {
        return Err(TranscodeError::MalformedLine {
            line: line_no,
            reason: "card name cannot be quoted".to_string(),
        });
    }
    let name_end = body.find(char::is_whitespace).unwrap_or(body.len());
    let name = &body[..name_end];
    let rest = &body[name_end..];
    let value = rest.trim_start();
    let spacing = &rest[..rest.len() - value.len()];
    if value.is_empty() {
        return Ok(SplitLine {
            name,
            spacing: "",
            value: None,
        });
    }
    // Reject unbalanced quoting up front; the value itself stays verbatim.
    fields(value, line_no)?;
    Ok(SplitLine {
        name,
        spacing,
        value: Some(value),
    })
}

/// Tokenize a card value into fields, honouring single and double quotes.
pub fn fields(value: &str, line_no: usize) -> Result<Vec<Field>, TranscodeError> {
    let mut out = Vec::new();
    let mut chars = value.char_indices().peekable();
    while let Some(&(start, ch)) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }
        let mut text = String::new();
        let mut quote = None;
        let mut end = start;
        if is_quote(ch) {
            quote = Some(ch);
            chars.next();
            let mut closed = false;
            for (idx, c) in chars.by_ref() {
                if c == ch {
                    end = idx + c.len_utf8();
                    closed = true;
                    break;
                }
                text.push(c);
            }
            if !closed {
                return Err(TranscodeError::MalformedLine {
                    line: line_no,
                    reason: format!("unterminated {ch} quote in value"),
                });
            }
        }
        // Quote characters inside a bare token (e.g. `don't`) are literal.
        while let Some(&(idx, c)) = chars.peek() {
            if c.is_whitespace() {
                break;
            }
            text.push(c);
            end = idx + c.len_utf8();
            chars.next();
        }
        out.push(Field {
            span: start..end,
            quote,
            text,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_name_spacing_and_value() {
        let split = split_card_line("MAP_FREQ          30  \r", 1).unwrap();
        assert_eq!(split.name, "MAP_FREQ");
        assert_eq!(split.spacing, "          ");
        assert_eq!(split.value, Some("30"));
    }

    #[test]
    fn valueless_card() {
        let split = split_card_line("QUIET", 4).unwrap();
        assert_eq!(split.name, "QUIET");
        assert_eq!(split.value, None);
    }

    #[test]
    fn quoted_fields_keep_spans() {
        let value = "\"soil.idx\" \"SOIL TYPE\"";
        let parsed = fields(value, 1).unwrap();
        assert_eq!(parsed.len(), 2);
        assert_eq!(parsed[0].text, "soil.idx");
        assert_eq!(parsed[0].quote, Some('"'));
        assert_eq!(&value[parsed[1].span.clone()], "\"SOIL TYPE\"");
        assert_eq!(parsed[1].text, "SOIL TYPE");
    }

    #[test]
    fn unterminated_quote_is_malformed() {
        let err = split_card_line("ELEVATION \"model.ele", 7).unwrap_err();
        assert!(matches!(err, TranscodeError::MalformedLine { line: 7, .. }));
    }

    #[test]
    fn quoted_name_is_malformed() {
        assert!(split_card_line("\"ELEVATION\" x", 2).is_err());
    }

    #[test]
    fn windows_paths_survive() {
        let parsed = fields("\"C:\\models\\run\\\"", 1).unwrap();
        assert_eq!(parsed[0].text, "C:\\models\\run\\");
    }
}
