//! FITS header card parsing.
//!
//! A header is a sequence of 80-character ASCII cards in 2880-byte blocks,
//! terminated by an `END` card. Only value cards (`KEYWORD = value / comment`)
//! are retained; commentary cards are skipped.

use std::collections::HashMap;

pub const BLOCK_SIZE: usize = 2880;
pub const CARD_SIZE: usize = 80;

/// Parsed value of a header card
#[derive(Debug, Clone, PartialEq)]
pub enum HeaderValue {
    Str(String),
    Logical(bool),
    Int(i64),
    Float(f64),
    /// Value field present but empty
    Undefined,
}

impl HeaderValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            HeaderValue::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i64> {
        match self {
            HeaderValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f64> {
        match self {
            HeaderValue::Int(i) => Some(*i as f64),
            HeaderValue::Float(f) => Some(*f),
            _ => None,
        }
    }
}

/// Value cards of one HDU, in file order
#[derive(Debug, Clone, Default)]
pub struct Header {
    cards: Vec<(String, HeaderValue)>,
    index: HashMap<String, usize>,
}

impl Header {
    /// Feed one block; returns true once the `END` card has been seen
    pub fn push_block(&mut self, block: &[u8]) -> Result<bool, String> {
        for card in block.chunks(CARD_SIZE) {
            let text = std::str::from_utf8(card)
                .map_err(|_| "header card is not ASCII".to_string())?;
            let keyword = text.get(..8).unwrap_or(text).trim_end();

            if keyword == "END" {
                return Ok(true);
            }

            if keyword == "CONTINUE" {
                self.continue_string(text.get(8..).unwrap_or(""));
                continue;
            }

            if text.get(8..10) != Some("= ") || keyword.is_empty() {
                continue;
            }

            let value = parse_value(text.get(10..).unwrap_or(""))
                .map_err(|e| format!("keyword {keyword}: {e}"))?;
            self.insert(keyword.to_string(), value);
        }
        Ok(false)
    }

    pub fn insert(&mut self, keyword: String, value: HeaderValue) {
        match self.index.get(&keyword) {
            Some(&pos) => self.cards[pos].1 = value,
            None => {
                self.index.insert(keyword.clone(), self.cards.len());
                self.cards.push((keyword, value));
            }
        }
    }

    pub fn get(&self, keyword: &str) -> Option<&HeaderValue> {
        self.index.get(keyword).map(|&pos| &self.cards[pos].1)
    }

    pub fn get_str(&self, keyword: &str) -> Option<&str> {
        self.get(keyword).and_then(HeaderValue::as_str)
    }

    pub fn get_int(&self, keyword: &str) -> Option<i64> {
        self.get(keyword).and_then(HeaderValue::as_int)
    }

    pub fn get_float(&self, keyword: &str) -> Option<f64> {
        self.get(keyword).and_then(HeaderValue::as_float)
    }

    /// Required non-negative integer keyword
    pub fn require_usize(&self, keyword: &str) -> Result<usize, String> {
        self.get_int(keyword)
            .and_then(|v| usize::try_from(v).ok())
            .ok_or_else(|| format!("missing or invalid {keyword}"))
    }

    pub fn len(&self) -> usize {
        self.cards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.cards.is_empty()
    }

    /// Long-string convention: a string ending in `&` continues on the
    /// following CONTINUE card.
    fn continue_string(&mut self, rest: &str) {
        let Some((_, HeaderValue::Str(previous))) = self.cards.last_mut() else {
            return;
        };
        let Some(stem) = previous.strip_suffix('&') else {
            return;
        };
        if let Ok(HeaderValue::Str(more)) = parse_value(rest) {
            *previous = format!("{stem}{more}");
        }
    }
}

/// Parse the value field of a card (columns 11-80)
fn parse_value(field: &str) -> Result<HeaderValue, String> {
    let trimmed = field.trim_start();

    if let Some(quoted) = trimmed.strip_prefix('\'') {
        return parse_string(quoted).map(HeaderValue::Str);
    }

    let token = trimmed.split('/').next().unwrap_or("").trim();
    if token.is_empty() {
        return Ok(HeaderValue::Undefined);
    }

    match token {
        "T" => return Ok(HeaderValue::Logical(true)),
        "F" => return Ok(HeaderValue::Logical(false)),
        _ => {}
    }

    if let Ok(i) = token.parse::<i64>() {
        return Ok(HeaderValue::Int(i));
    }

    token
        .replace(['D', 'd'], "E")
        .parse::<f64>()
        .map(HeaderValue::Float)
        .map_err(|_| format!("unparseable value '{token}'"))
}

/// Read a quoted string body; `''` is an escaped quote and trailing blanks
/// are not significant.
fn parse_string(body: &str) -> Result<String, String> {
    let mut out = String::new();
    let mut chars = body.chars().peekable();
    while let Some(c) = chars.next() {
        if c == '\'' {
            if chars.peek() == Some(&'\'') {
                chars.next();
                out.push('\'');
            } else {
                return Ok(out.trim_end().to_string());
            }
        } else {
            out.push(c);
        }
    }
    Err("unterminated string".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn card(text: &str) -> String {
        format!("{:<80}", text)
    }

    fn block(cards: &[&str]) -> Vec<u8> {
        let mut out: String = cards.iter().map(|c| card(c)).collect();
        while out.len() % BLOCK_SIZE != 0 {
            out.push(' ');
        }
        out.into_bytes()
    }

    #[test]
    fn test_parses_value_types() {
        let mut header = Header::default();
        let done = header
            .push_block(&block(&[
                "XTENSION= 'BINTABLE'           / binary table extension",
                "NAXIS   =                    2 / number of axes",
                "TSCAL1  =              1.5D+00",
                "SIMPLE  =                    T",
                "RES-OBS = 'LR      '",
                "COMMENT this card has no value",
                "OBJECT  = 'O''Brien'",
                "END",
            ]))
            .unwrap();

        assert!(done);
        assert_eq!(header.get_str("XTENSION"), Some("BINTABLE"));
        assert_eq!(header.get_int("NAXIS"), Some(2));
        assert_eq!(header.get_float("TSCAL1"), Some(1.5));
        assert_eq!(header.get("SIMPLE"), Some(&HeaderValue::Logical(true)));
        assert_eq!(header.get_str("RES-OBS"), Some("LR"));
        assert_eq!(header.get_str("OBJECT"), Some("O'Brien"));
        assert!(header.get("COMMENT").is_none());
    }

    #[test]
    fn test_header_spanning_blocks() {
        let mut header = Header::default();
        assert!(!header.push_block(&block(&["NAXIS1  =                   16"])).unwrap());
        assert!(header.push_block(&block(&["END"])).unwrap());
        assert_eq!(header.require_usize("NAXIS1"), Ok(16));
        assert!(header.require_usize("NAXIS2").is_err());
    }

    #[test]
    fn test_continue_long_string() {
        let mut header = Header::default();
        header
            .push_block(&block(&[
                "LONGSTR = 'first part &'",
                "CONTINUE  'second part'",
                "END",
            ]))
            .unwrap();
        assert_eq!(header.get_str("LONGSTR"), Some("first part second part"));
    }

    #[test]
    fn test_unterminated_string_is_error() {
        let mut header = Header::default();
        let err = header.push_block(&block(&["BAD     = 'oops"])).unwrap_err();
        assert!(err.contains("BAD"));
    }
}
