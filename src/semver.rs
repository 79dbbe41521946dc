// src/semver.rs
use std::cmp::Ordering;
use std::fmt;
use std::str::FromStr;

#[derive(Debug, PartialEq)]
pub enum ParseError {
    InvalidSyntax(String),
}

impl fmt::Display for ParseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::InvalidSyntax(msg) => write!(f, "{msg}"),
        }
    }
}

/// A SemVer 2.0 version. Build metadata is accepted but not kept, so two
/// versions differing only in build metadata compare equal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Version {
    pub major: u64,
    pub minor: u64,
    pub patch: u64,
    pub pre: Vec<Identifier>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identifier {
    Numeric(u64),
    AlphaNumeric(String),
}

impl Ord for Identifier {
    fn cmp(&self, other: &Self) -> Ordering {
        match (self, other) {
            (Identifier::Numeric(a), Identifier::Numeric(b)) => a.cmp(b),
            (Identifier::Numeric(_), Identifier::AlphaNumeric(_)) => Ordering::Less,
            (Identifier::AlphaNumeric(_), Identifier::Numeric(_)) => Ordering::Greater,
            (Identifier::AlphaNumeric(a), Identifier::AlphaNumeric(b)) => a.cmp(b),
        }
    }
}

impl PartialOrd for Identifier {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.major
            .cmp(&other.major)
            .then(self.minor.cmp(&other.minor))
            .then(self.patch.cmp(&other.patch))
            .then_with(|| match (self.pre.is_empty(), other.pre.is_empty()) {
                // a release ranks above any of its pre-releases
                (true, true) => Ordering::Equal,
                (true, false) => Ordering::Greater,
                (false, true) => Ordering::Less,
                (false, false) => self.pre.cmp(&other.pre),
            })
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)?;
        for (i, id) in self.pre.iter().enumerate() {
            f.write_str(if i == 0 { "-" } else { "." })?;
            match id {
                Identifier::Numeric(n) => write!(f, "{n}")?,
                Identifier::AlphaNumeric(s) => f.write_str(s)?,
            }
        }
        Ok(())
    }
}

impl FromStr for Version {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse(s)
    }
}

/// Parse `[v]MAJOR.MINOR.PATCH[-PRE][+BUILD]`, surrounding whitespace allowed.
pub fn parse(input: &str) -> Result<Version, ParseError> {
    let mut p = Parser::new(input.trim());
    p.consume_char('v');
    let major = p.parse_numeric()?;
    p.expect('.')?;
    let minor = p.parse_numeric()?;
    p.expect('.')?;
    let patch = p.parse_numeric()?;

    let mut pre = Vec::new();
    if p.consume_char('-') {
        loop {
            pre.push(p.parse_pre_identifier()?);
            if !p.consume_char('.') {
                break;
            }
        }
    }
    if p.consume_char('+') {
        loop {
            p.parse_alphanumeric()?;
            if !p.consume_char('.') {
                break;
            }
        }
    }
    if !p.eof() {
        return Err(ParseError::InvalidSyntax(format!(
            "unexpected trailing input in version '{input}'"
        )));
    }
    Ok(Version {
        major,
        minor,
        patch,
        pre,
    })
}

struct Parser<'a> {
    s: &'a str,
    i: usize,
}

impl<'a> Parser<'a> {
    fn new(s: &'a str) -> Self {
        Self { s, i: 0 }
    }

    fn parse_numeric(&mut self) -> Result<u64, ParseError> {
        let digits = self.take_while(|c| c.is_ascii_digit());
        if digits.is_empty() {
            return Err(ParseError::InvalidSyntax("expected number".into()));
        }
        if digits.len() > 1 && digits.starts_with('0') {
            return Err(ParseError::InvalidSyntax(format!(
                "leading zero in numeric identifier '{digits}'"
            )));
        }
        digits
            .parse::<u64>()
            .map_err(|_| ParseError::InvalidSyntax("number out of range".into()))
    }

    fn parse_alphanumeric(&mut self) -> Result<&'a str, ParseError> {
        let ident = self.take_while(|c| c == '-' || c.is_ascii_alphanumeric());
        if ident.is_empty() {
            return Err(ParseError::InvalidSyntax("identifier expected".into()));
        }
        Ok(ident)
    }

    fn parse_pre_identifier(&mut self) -> Result<Identifier, ParseError> {
        let ident = self.parse_alphanumeric()?;
        if ident.bytes().all(|b| b.is_ascii_digit()) {
            if ident.len() > 1 && ident.starts_with('0') {
                return Err(ParseError::InvalidSyntax(format!(
                    "leading zero in pre-release identifier '{ident}'"
                )));
            }
            let n = ident
                .parse::<u64>()
                .map_err(|_| ParseError::InvalidSyntax("number out of range".into()))?;
            Ok(Identifier::Numeric(n))
        } else {
            Ok(Identifier::AlphaNumeric(ident.to_string()))
        }
    }

    fn take_while(&mut self, pred: impl Fn(char) -> bool) -> &'a str {
        let start = self.i;
        while let Some(c) = self.peek_char() {
            if pred(c) {
                self.i += c.len_utf8();
            } else {
                break;
            }
        }
        &self.s[start..self.i]
    }

    fn expect(&mut self, c: char) -> Result<(), ParseError> {
        if self.consume_char(c) {
            Ok(())
        } else {
            Err(ParseError::InvalidSyntax(format!("expected '{}'", c)))
        }
    }

    fn consume_char(&mut self, c: char) -> bool {
        if self.peek_char() == Some(c) {
            self.i += c.len_utf8();
            true
        } else {
            false
        }
    }

    fn peek_char(&self) -> Option<char> {
        self.s[self.i..].chars().next()
    }

    fn eof(&self) -> bool {
        self.i >= self.s.len()
    }
}
