//! Connectomist parameter values and parameter files.
//!
//! When driven from the command line, Connectomist reads a small Python
//! script per tab:
//!
//! ```text
//! algorithmName = 'DWI-Outlier-Detection'
//! parameterValues = {
//!  '_subjectName': 'jp110183',
//!  'outlierFactor': 3.0,
//!  ...}
//! ```
//!
//! [`ParamValue`] models the Python literals that can appear on the right-hand
//! side and renders them the way Python's `pprint` does (sorted keys, one
//! entry per line once a container no longer fits in 80 columns).

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, Result};

const LINE_WIDTH: usize = 80;

/// A Python literal value.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// `None`
    None,
    /// `True` / `False`
    Bool(bool),
    /// An integer
    Int(i64),
    /// A float
    Float(f64),
    /// A string
    Str(String),
    /// A list (tuples are read as lists)
    List(Vec<ParamValue>),
    /// A dict with string keys, kept sorted
    Dict(BTreeMap<String, ParamValue>),
}

impl ParamValue {
    /// Python `repr` of the value on a single line.
    pub fn repr(&self) -> String {
        let mut out = String::new();
        self.write_repr(&mut out);
        out
    }

    fn write_repr(&self, out: &mut String) {
        match self {
            ParamValue::None => out.push_str("None"),
            ParamValue::Bool(true) => out.push_str("True"),
            ParamValue::Bool(false) => out.push_str("False"),
            ParamValue::Int(i) => {
                let _ = write!(out, "{i}");
            }
            ParamValue::Float(f) => out.push_str(&float_repr(*f)),
            ParamValue::Str(s) => out.push_str(&str_repr(s)),
            ParamValue::List(items) => {
                out.push('[');
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    item.write_repr(out);
                }
                out.push(']');
            }
            ParamValue::Dict(entries) => {
                out.push('{');
                for (i, (key, value)) in entries.iter().enumerate() {
                    if i > 0 {
                        out.push_str(", ");
                    }
                    out.push_str(&str_repr(key));
                    out.push_str(": ");
                    value.write_repr(out);
                }
                out.push('}');
            }
        }
    }

    /// Pretty representation, equivalent to `pprint.pformat`.
    pub fn pformat(&self) -> String {
        let mut out = String::new();
        self.pformat_into(&mut out, 0, 0);
        out
    }

    // `indent` is the column the value starts at, `allowance` the number of
    // closing characters that will follow it on its last line.
    fn pformat_into(&self, out: &mut String, indent: usize, allowance: usize) {
        let rep = self.repr();
        if rep.chars().count() + indent + allowance <= LINE_WIDTH {
            out.push_str(&rep);
            return;
        }
        match self {
            ParamValue::Dict(entries) if !entries.is_empty() => {
                out.push('{');
                let indent = indent + 1;
                let last = entries.len() - 1;
                for (i, (key, value)) in entries.iter().enumerate() {
                    let key_rep = str_repr(key);
                    out.push_str(&key_rep);
                    out.push_str(": ");
                    let value_indent = indent + key_rep.chars().count() + 2;
                    let value_allowance = if i == last { allowance + 1 } else { 1 };
                    value.pformat_into(out, value_indent, value_allowance);
                    if i != last {
                        out.push_str(",\n");
                        out.push_str(&" ".repeat(indent));
                    }
                }
                out.push('}');
            }
            ParamValue::List(items) if !items.is_empty() => {
                out.push('[');
                let indent = indent + 1;
                let last = items.len() - 1;
                for (i, item) in items.iter().enumerate() {
                    let item_allowance = if i == last { allowance + 1 } else { 1 };
                    item.pformat_into(out, indent, item_allowance);
                    if i != last {
                        out.push_str(",\n");
                        out.push_str(&" ".repeat(indent));
                    }
                }
                out.push(']');
            }
            _ => out.push_str(&rep),
        }
    }

    /// Returns the string content, if this is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the value as a float, accepting integers too.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ParamValue::Float(f) => Some(*f),
            ParamValue::Int(i) => Some(*i as f64),
            _ => None,
        }
    }

    /// Returns the integer value.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            ParamValue::Int(i) => Some(*i),
            _ => None,
        }
    }

    /// Returns the list items.
    pub fn as_list(&self) -> Option<&[ParamValue]> {
        match self {
            ParamValue::List(items) => Some(items),
            _ => None,
        }
    }

    /// Returns the dict entries.
    pub fn as_dict(&self) -> Option<&BTreeMap<String, ParamValue>> {
        match self {
            ParamValue::Dict(entries) => Some(entries),
            _ => None,
        }
    }

    /// Looks up a key when this is a dict.
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.as_dict().and_then(|d| d.get(key))
    }

    /// Returns `true` for `None`.
    pub fn is_none(&self) -> bool {
        matches!(self, ParamValue::None)
    }
}

/// Python `repr` of a float: shortest round-trip digits, exponent written
/// with a sign and at least two digits (`1e-05`, `1e+16`).
fn float_repr(value: f64) -> String {
    if value.is_nan() {
        return "nan".to_string();
    }
    if value.is_infinite() {
        return if value > 0.0 { "inf" } else { "-inf" }.to_string();
    }
    let debug = format!("{value:?}");
    match debug.split_once('e') {
        Some((mantissa, exponent)) => {
            let (sign, digits) = match exponent.strip_prefix('-') {
                Some(digits) => ('-', digits),
                None => ('+', exponent),
            };
            format!("{mantissa}e{sign}{digits:0>2}")
        }
        None => debug,
    }
}

/// Python `repr` of a string.
fn str_repr(value: &str) -> String {
    let quote = if value.contains('\'') && !value.contains('"') {
        '"'
    } else {
        '\''
    };
    let mut out = String::with_capacity(value.len() + 2);
    out.push(quote);
    for c in value.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c if (c as u32) < 0x20 || c as u32 == 0x7f => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(i64::from(value))
    }
}

impl From<u32> for ParamValue {
    fn from(value: u32) -> Self {
        ParamValue::Int(i64::from(value))
    }
}

impl From<usize> for ParamValue {
    fn from(value: usize) -> Self {
        ParamValue::Int(i64::try_from(value).unwrap_or(i64::MAX))
    }
}

impl From<f64> for ParamValue {
    fn from(value: f64) -> Self {
        ParamValue::Float(value)
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Str(value)
    }
}

impl From<&String> for ParamValue {
    fn from(value: &String) -> Self {
        ParamValue::Str(value.clone())
    }
}

impl From<&Path> for ParamValue {
    fn from(value: &Path) -> Self {
        ParamValue::Str(value.to_string_lossy().into_owned())
    }
}

impl From<PathBuf> for ParamValue {
    fn from(value: PathBuf) -> Self {
        ParamValue::from(value.as_path())
    }
}

impl From<&PathBuf> for ParamValue {
    fn from(value: &PathBuf) -> Self {
        ParamValue::from(value.as_path())
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(ParamValue::None, Into::into)
    }
}

impl<T: Into<ParamValue>> From<Vec<T>> for ParamValue {
    fn from(value: Vec<T>) -> Self {
        ParamValue::List(value.into_iter().map(Into::into).collect())
    }
}

impl From<ParameterSet> for ParamValue {
    fn from(value: ParameterSet) -> Self {
        ParamValue::Dict(value.0)
    }
}

/// Connectomist's boolean convention for check boxes: 2 is checked, 0 is not.
pub fn connectomist_flag(value: bool) -> i64 {
    if value { 2 } else { 0 }
}

/// The `parameterValues` dict of one tab.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct ParameterSet(BTreeMap<String, ParamValue>);

impl ParameterSet {
    /// Creates an empty parameter set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets a parameter, replacing any previous value.
    pub fn insert<K, V>(&mut self, key: K, value: V) -> &mut Self
    where
        K: Into<String>,
        V: Into<ParamValue>,
    {
        self.0.insert(key.into(), value.into());
        self
    }

    /// Builder-style variant of [`insert`](Self::insert).
    pub fn with<K, V>(mut self, key: K, value: V) -> Self
    where
        K: Into<String>,
        V: Into<ParamValue>,
    {
        self.insert(key, value);
        self
    }

    /// Copies every entry of `other` over this set.
    pub fn extend(&mut self, other: ParameterSet) -> &mut Self {
        self.0.extend(other.0);
        self
    }

    /// Looks up a parameter.
    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    /// Returns `true` if the parameter is set.
    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if no parameter is set.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates over parameters in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    /// Renders the content of a Connectomist parameter file.
    pub fn render(&self, algorithm: &str) -> String {
        let pretty = ParamValue::Dict(self.0.clone()).pformat();
        // pprint output without its opening brace, which goes on its own line
        let body = pretty.strip_prefix('{').unwrap_or(&pretty);
        format!(
            "algorithmName = {}\nparameterValues = {{\n {body}\n",
            str_repr(algorithm)
        )
    }
}

/// Builds a [`ParameterSet`] from `"key" => value` pairs.
///
/// ```
/// use connectomist_core::params;
///
/// let set = params! {
///     "outlierFactor" => 3.0,
///     "_subjectName" => "jp110183",
/// };
/// assert_eq!(set.len(), 2);
/// ```
#[macro_export]
macro_rules! params {
    ($($key:expr => $value:expr),* $(,)?) => {{
        let mut set = $crate::params::ParameterSet::new();
        $( set.insert($key, $value); )*
        set
    }};
}

/// Writes `<outdir>/<algorithm>.py`, creating `outdir` if needed.
///
/// Returns the path of the written parameter file.
pub fn create_parameter_file(
    algorithm: &str,
    parameters: &ParameterSet,
    outdir: &Path,
) -> Result<PathBuf> {
    if !outdir.is_dir() {
        std::fs::create_dir_all(outdir).map_err(|e| Error::io_with_path(e, outdir))?;
    }
    let path = outdir.join(format!("{algorithm}.py"));
    std::fs::write(&path, parameters.render(algorithm))
        .map_err(|e| Error::io_with_path(e, &path))?;
    tracing::debug!(algorithm, path = %path.display(), "Wrote parameter file");
    Ok(path)
}
