//! Source location tracking

use serde::{Deserialize, Serialize};

/// A byte range in one source file, as carried by solc's `src` attribute
/// (`"start:length:fileIndex"`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Span {
    pub start: usize,
    pub end: usize,
    /// Index into the compiler's source list; `None` when solc reports `-1`
    pub file: Option<usize>,
}

impl Span {
    pub fn new(start: usize, end: usize, file: Option<usize>) -> Self {
        Self { start, end, file }
    }

    pub fn len(&self) -> usize {
        self.end - self.start
    }

    pub fn is_empty(&self) -> bool {
        self.start == self.end
    }

    /// 1-based line of `start` within `text`. Offsets past the end clamp to
    /// the last line.
    pub fn line_in(&self, text: &str) -> usize {
        let end = self.start.min(text.len());
        text.as_bytes()[..end].iter().filter(|&&b| b == b'\n').count() + 1
    }
}

impl std::fmt::Display for Span {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

impl From<Span> for std::ops::Range<usize> {
    fn from(span: Span) -> Self {
        span.start..span.end
    }
}

impl std::str::FromStr for Span {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split(':');
        let (Some(start), Some(len), Some(file), None) =
            (parts.next(), parts.next(), parts.next(), parts.next())
        else {
            return Err(format!("malformed src attribute '{s}'"));
        };

        let start: usize = start
            .parse()
            .map_err(|_| format!("bad start offset in src '{s}'"))?;
        let len: usize = len
            .parse()
            .map_err(|_| format!("bad length in src '{s}'"))?;
        let file: i64 = file
            .parse()
            .map_err(|_| format!("bad file index in src '{s}'"))?;

        let end = start
            .checked_add(len)
            .ok_or_else(|| format!("src '{s}' ends past the addressable range"))?;
        Ok(Span::new(start, end, usize::try_from(file).ok()))
    }
}

impl TryFrom<String> for Span {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Span> for String {
    fn from(span: Span) -> Self {
        let file = span.file.map_or(-1, |f| f as i64);
        format!("{}:{}:{}", span.start, span.len(), file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_src() {
        let span: Span = "120:35:0".parse().unwrap();
        assert_eq!(span.start, 120);
        assert_eq!(span.end, 155);
        assert_eq!(span.file, Some(0));
        assert_eq!(span.len(), 35);
    }

    #[test]
    fn test_parse_src_end_overflow() {
        let err = format!("{}:1:0", usize::MAX).parse::<Span>().unwrap_err();
        assert!(err.contains("addressable range"), "{err}");
        assert!(format!("{}:0:0", usize::MAX).parse::<Span>().is_ok());
    }

    #[test]
    fn test_parse_src_without_file() {
        let span: Span = "0:0:-1".parse().unwrap();
        assert_eq!(span.file, None);
        assert!(span.is_empty());
    }

    #[test]
    fn test_parse_src_malformed() {
        assert!("12:3".parse::<Span>().is_err());
        assert!("a:3:0".parse::<Span>().is_err());
        assert!("1:2:3:4".parse::<Span>().is_err());
    }

    #[test]
    fn test_src_string_form() {
        let span = Span::new(10, 14, Some(2));
        assert_eq!(String::from(span), "10:4:2");
        assert_eq!(String::from(Span::new(0, 0, None)), "0:0:-1");
    }

    #[test]
    fn test_line_in() {
        let text = "pragma solidity ^0.5.0;\n\ncontract A {\n}\n";
        assert_eq!(Span::new(0, 6, Some(0)).line_in(text), 1);
        let contract_at = text.find("contract").unwrap();
        assert_eq!(Span::new(contract_at, contract_at + 8, Some(0)).line_in(text), 3);
        assert_eq!(Span::new(10_000, 10_001, Some(0)).line_in(text), 5);
    }
}
