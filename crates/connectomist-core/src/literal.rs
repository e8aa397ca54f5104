//! Reader for the Python literal files Connectomist leaves behind.
//!
//! Connectomist describes its outputs with small Python scripts made only of
//! literal assignments: `acquisition_parameters.py` in the import directory
//! and the `.minf` sidecar of every `.ima` volume. This module reads
//! `name = <literal>` statements into [`ParamValue`]s without evaluating
//! anything.

use std::collections::BTreeMap;
use std::path::Path;

use crate::error::{Error, Result};
use crate::params::ParamValue;

/// Parses every `name = literal` statement in `source`.
///
/// Later assignments to the same name replace earlier ones.
pub fn parse_assignments(source: &str) -> Result<BTreeMap<String, ParamValue>> {
    let mut parser = Parser::new(source);
    let mut assignments = BTreeMap::new();
    loop {
        parser.skip_trivia(true);
        if parser.at_end() {
            break;
        }
        let name = parser.identifier()?;
        parser.skip_trivia(true);
        parser.expect('=')?;
        let value = parser.value()?;
        assignments.insert(name, value);
        parser.skip_trivia(true);
        parser.eat(';');
    }
    Ok(assignments)
}

/// Parses a single Python literal.
pub fn parse_literal(source: &str) -> Result<ParamValue> {
    let mut parser = Parser::new(source);
    let value = parser.value()?;
    parser.skip_trivia(true);
    if !parser.at_end() {
        return Err(parser.error("unexpected trailing characters"));
    }
    Ok(value)
}

/// Reads and parses the assignments of a Python literal file.
///
/// A missing, unreadable or unparsable file is reported as
/// [`Error::BadFile`].
pub fn read_assignments(path: &Path) -> Result<BTreeMap<String, ParamValue>> {
    let source = std::fs::read_to_string(path).map_err(|_| Error::bad_file(path))?;
    parse_assignments(&source).map_err(|e| {
        tracing::debug!(path = %path.display(), error = %e, "Unparsable literal file");
        Error::bad_file(path)
    })
}

struct Parser {
    chars: Vec<char>,
    pos: usize,
    line: usize,
}

impl Parser {
    fn new(source: &str) -> Self {
        Self {
            chars: source.chars().collect(),
            pos: 0,
            line: 1,
        }
    }

    fn at_end(&self) -> bool {
        self.pos >= self.chars.len()
    }

    fn peek(&self) -> Option<char> {
        self.chars.get(self.pos).copied()
    }

    fn peek_at(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).copied()
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += 1;
        if c == '\n' {
            self.line += 1;
        }
        Some(c)
    }

    fn error<S: Into<String>>(&self, message: S) -> Error {
        Error::Parse {
            line: self.line,
            message: message.into(),
        }
    }

    fn eat(&mut self, expected: char) -> bool {
        if self.peek() == Some(expected) {
            self.bump();
            true
        } else {
            false
        }
    }

    fn expect(&mut self, expected: char) -> Result<()> {
        if self.eat(expected) {
            Ok(())
        } else {
            Err(self.error(format!("expected '{expected}'")))
        }
    }

    /// Skips whitespace, line continuations and comments.
    fn skip_trivia(&mut self, newlines: bool) {
        while let Some(c) = self.peek() {
            match c {
                '#' => {
                    while let Some(c) = self.peek() {
                        if c == '\n' {
                            break;
                        }
                        self.bump();
                    }
                }
                '\\' if self.peek_at(1) == Some('\n') => {
                    self.bump();
                    self.bump();
                }
                '\n' if !newlines => break,
                c if c.is_whitespace() => {
                    self.bump();
                }
                _ => break,
            }
        }
    }

    fn identifier(&mut self) -> Result<String> {
        let mut name = String::new();
        while let Some(c) = self.peek() {
            if c == '_' || c.is_alphanumeric() && !(name.is_empty() && c.is_numeric()) {
                name.push(c);
                self.bump();
            } else {
                break;
            }
        }
        if name.is_empty() {
            Err(self.error("expected an identifier"))
        } else {
            Ok(name)
        }
    }

    fn value(&mut self) -> Result<ParamValue> {
        self.skip_trivia(true);
        match self.peek() {
            Some('{') => self.dict(),
            Some('[') => {
                self.bump();
                self.sequence(']')
            }
            Some('(') => {
                self.bump();
                self.sequence(')')
            }
            Some('\'' | '"') => self.strings(),
            Some(c) if c.is_ascii_digit() || c == '-' || c == '+' || c == '.' => self.number(),
            Some(c) if c.is_alphabetic() || c == '_' => {
                if matches!(c, 'u' | 'U' | 'r' | 'R' | 'b' | 'B')
                    && matches!(self.peek_at(1), Some('\'' | '"'))
                {
                    return self.strings();
                }
                let word = self.identifier()?;
                match word.as_str() {
                    "True" => Ok(ParamValue::Bool(true)),
                    "False" => Ok(ParamValue::Bool(false)),
                    "None" => Ok(ParamValue::None),
                    other => Err(self.error(format!("unsupported name '{other}'"))),
                }
            }
            Some(c) => Err(self.error(format!("unexpected character '{c}'"))),
            None => Err(self.error("unexpected end of input")),
        }
    }

    fn dict(&mut self) -> Result<ParamValue> {
        self.expect('{')?;
        let mut entries = BTreeMap::new();
        loop {
            self.skip_trivia(true);
            if self.eat('}') {
                break;
            }
            let key = match self.value()? {
                ParamValue::Str(s) => s,
                other => other.repr(),
            };
            self.skip_trivia(true);
            self.expect(':')?;
            let value = self.value()?;
            entries.insert(key, value);
            self.skip_trivia(true);
            if self.eat('}') {
                break;
            }
            self.expect(',')?;
        }
        Ok(ParamValue::Dict(entries))
    }

    fn sequence(&mut self, close: char) -> Result<ParamValue> {
        let mut items = Vec::new();
        loop {
            self.skip_trivia(true);
            if self.eat(close) {
                break;
            }
            items.push(self.value()?);
            self.skip_trivia(true);
            if self.eat(close) {
                break;
            }
            self.expect(',')?;
        }
        Ok(ParamValue::List(items))
    }

    /// Adjacent string literals are concatenated, as in Python.
    fn strings(&mut self) -> Result<ParamValue> {
        let mut out = self.string()?;
        loop {
            self.skip_trivia(true);
            match self.peek() {
                Some('\'' | '"') => out.push_str(&self.string()?),
                Some('u' | 'U' | 'r' | 'R' | 'b' | 'B')
                    if matches!(self.peek_at(1), Some('\'' | '"')) =>
                {
                    out.push_str(&self.string()?)
                }
                _ => break,
            }
        }
        Ok(ParamValue::Str(out))
    }

    fn string(&mut self) -> Result<String> {
        let mut raw = false;
        if let Some(prefix @ ('u' | 'U' | 'r' | 'R' | 'b' | 'B')) = self.peek() {
            raw = matches!(prefix, 'r' | 'R');
            self.bump();
        }
        let quote = self
            .bump()
            .ok_or_else(|| self.error("unexpected end of input"))?;
        let triple = self.peek() == Some(quote) && self.peek_at(1) == Some(quote);
        if triple {
            self.bump();
            self.bump();
        }
        let mut out = String::new();
        loop {
            let c = self
                .bump()
                .ok_or_else(|| self.error("unterminated string"))?;
            if c == quote {
                if !triple {
                    break;
                }
                if self.peek() == Some(quote) && self.peek_at(1) == Some(quote) {
                    self.bump();
                    self.bump();
                    break;
                }
                out.push(c);
                continue;
            }
            if c == '\n' && !triple {
                return Err(self.error("unterminated string"));
            }
            if c == '\\' && !raw {
                let escaped = self
                    .bump()
                    .ok_or_else(|| self.error("unterminated string"))?;
                match escaped {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    '0' => out.push('\0'),
                    '\n' => {}
                    'x' => {
                        let hex: String = (0..2).filter_map(|_| self.bump()).collect();
                        let code = u32::from_str_radix(&hex, 16)
                            .map_err(|_| self.error("invalid \\x escape"))?;
                        out.push(char::from_u32(code).unwrap_or('\u{fffd}'));
                    }
                    '\\' | '\'' | '"' => out.push(escaped),
                    other => {
                        out.push('\\');
                        out.push(other);
                    }
                }
                continue;
            }
            out.push(c);
        }
        Ok(out)
    }

    fn number(&mut self) -> Result<ParamValue> {
        let mut text = String::new();
        if let Some(sign @ ('-' | '+')) = self.peek() {
            self.bump();
            self.skip_trivia(false);
            if sign == '-' {
                text.push('-');
            }
        }
        let mut is_float = false;
        while let Some(c) = self.peek() {
            match c {
                '0'..='9' | '_' => {
                    if c != '_' {
                        text.push(c);
                    }
                }
                '.' => {
                    is_float = true;
                    text.push(c);
                }
                'e' | 'E' => {
                    is_float = true;
                    text.push(c);
                    if let Some(sign @ ('-' | '+')) = self.peek_at(1) {
                        self.bump();
                        text.push(sign);
                    }
                }
                'L' | 'l' => {
                    // Python 2 long suffix
                    self.bump();
                    break;
                }
                _ => break,
            }
            self.bump();
        }
        if is_float {
            text.parse::<f64>()
                .map(ParamValue::Float)
                .map_err(|_| self.error(format!("invalid float '{text}'")))
        } else {
            text.parse::<i64>()
                .map(ParamValue::Int)
                .map_err(|_| self.error(format!("invalid integer '{text}'")))
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_acquisition_parameters_file() {
        let source = "acquisitionParameters = {\n  'manufacturer' : 'Siemens HealthCare',\n  'sliceAxis' : 2,\n  'flip' : [ 0, 0, 0 ],\n}\n";
        let assignments = parse_assignments(source).unwrap();
        let params = &assignments["acquisitionParameters"];
        assert_eq!(
            params.get("manufacturer").and_then(ParamValue::as_str),
            Some("Siemens HealthCare")
        );
        assert_eq!(params.get("sliceAxis").and_then(ParamValue::as_i64), Some(2));
        assert_eq!(params.get("flip").and_then(ParamValue::as_list).map(<[_]>::len), Some(3));
    }

    #[test]
    fn test_minf_attributes_with_tuples_and_exponents() {
        let source = "attributes = {\n 'bvalues' : [ 0.0, 1000.0, 1.5e3 ],\n 'diffusion_gradient_orientations' : ( ( 1, 0, 0 ), (0.0,-1.0, 0.0), ),\n 'voxel_size' : [ 2, 2, 2 ] }";
        let assignments = parse_assignments(source).unwrap();
        let attributes = &assignments["attributes"];
        let bvalues = attributes.get("bvalues").and_then(ParamValue::as_list).unwrap();
        assert_eq!(bvalues[2].as_f64(), Some(1500.0));
        let orientations = attributes
            .get("diffusion_gradient_orientations")
            .and_then(ParamValue::as_list)
            .unwrap();
        assert_eq!(orientations.len(), 2);
        assert_eq!(orientations[1].as_list().unwrap()[1].as_f64(), Some(-1.0));
    }

    #[test]
    fn test_comments_and_several_assignments() {
        let source = "# generated\nalgorithmName = 'DWI-Outlier-Detection' # tab\nparameterValues = {'outlierFactor': 3.0, 'flag': True, 'none': None}\n";
        let assignments = parse_assignments(source).unwrap();
        assert_eq!(
            assignments["algorithmName"].as_str(),
            Some("DWI-Outlier-Detection")
        );
        let values = &assignments["parameterValues"];
        assert_eq!(values.get("flag"), Some(&ParamValue::Bool(true)));
        assert!(values.get("none").unwrap().is_none());
    }

    #[test]
    fn test_reads_back_rendered_parameter_file() {
        let set = crate::params! {
            "fileNameDwi" => "/data/it's/dwi.ima",
            "qSpaceChoice5BValue" => 1300,
            "noiseThresholdPercentage" => 2.0,
            "tiny" => 0.00001,
        };
        let text = set.render("DWI-Rough-Mask-Extraction");
        let assignments = parse_assignments(&text).unwrap();
        assert_eq!(ParamValue::from(set), assignments["parameterValues"]);
    }

    #[test]
    fn test_string_escapes_and_concatenation() {
        assert_eq!(
            parse_literal(r#"'a\'b' "c\n""#).unwrap(),
            ParamValue::Str("a'bc\n".to_string())
        );
        assert_eq!(
            parse_literal(r"r'C:\dir'").unwrap(),
            ParamValue::Str("C:\\dir".to_string())
        );
    }

    #[test]
    fn test_negative_numbers() {
        assert_eq!(parse_literal("-3").unwrap(), ParamValue::Int(-3));
        assert_eq!(parse_literal("-2.5e-07").unwrap(), ParamValue::Float(-2.5e-7));
        assert_eq!(parse_literal("12L").unwrap(), ParamValue::Int(12));
    }

    #[test]
    fn test_parse_error_reports_line() {
        let err = parse_assignments("a = 1\nb = {'x': }\n").unwrap_err();
        assert!(matches!(err, Error::Parse { line: 2, .. }));
    }

    #[test]
    fn test_rejects_code() {
        assert!(parse_assignments("a = open('x')").is_err());
        assert!(parse_assignments("import os").is_err());
    }

    #[test]
    fn test_read_assignments_missing_file() {
        let err = read_assignments(Path::new("/nonexistent/acquisition_parameters.py"))
            .unwrap_err();
        assert!(matches!(err, Error::BadFile { .. }));
    }

    #[test]
    fn test_read_assignments_corrupted_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("dw.ima.minf");
        std::fs::write(&path, "attributes = {'bvalues': [0, 1000").unwrap();
        let err = read_assignments(&path).unwrap_err();
        assert!(matches!(err, Error::BadFile { path: p } if p == path));
    }
}
