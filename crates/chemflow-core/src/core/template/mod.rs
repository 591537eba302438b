//! Placeholder substitution for calculation input scripts.
//!
//! Templates use `%name` or `%{name}` placeholders (the delimiter is
//! configurable) where names match `[a-z][_a-z0-9]*` case-insensitively, and
//! `%%` for a literal delimiter. Rendered scripts are usually Python source,
//! which is why [`Template::render_and_write`] quotes text values.

pub mod library;

use regex::Regex;
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

pub const DEFAULT_DELIMITER: char = '%';
const ID_PATTERN: &str = "[a-z][_a-z0-9]*";

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Missing values for template keys: {}", .0.join(", "))]
    MissingKeys(Vec<String>),
    #[error("Invalid placeholder in line {line}, col {column}")]
    InvalidPlaceholder { line: usize, column: usize },
    #[error("Unknown template '{name}', available templates: {}", .available.join(", "))]
    UnknownTemplate { name: String, available: Vec<String> },
    #[error("Failed to write rendered template to '{path}': {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// A value substituted into a template.
#[derive(Debug, Clone, PartialEq)]
pub enum TemplateValue {
    Text(String),
    Int(i64),
    Float(f64),
    Bool(bool),
    None,
    /// Text inserted verbatim, never quoted (lists, dicts, expressions).
    Raw(String),
}

impl TemplateValue {
    /// Interprets a command-line literal.
    ///
    /// Booleans (`true`/`True`), `None`, integers and finite floats map to
    /// their typed variants; `nan` and `inf` stay text. Values opening with `[`, `(` or `{` are kept as raw
    /// expressions; values wrapped in matching quotes become text without
    /// the quotes; anything else is text.
    pub fn parse_literal(value: &str) -> Self {
        let trimmed = value.trim();
        match trimmed {
            "true" | "True" => return Self::Bool(true),
            "false" | "False" => return Self::Bool(false),
            "None" | "none" | "null" => return Self::None,
            _ => {}
        }
        if let Ok(i) = trimmed.parse::<i64>() {
            return Self::Int(i);
        }
        if let Some(f) = trimmed.parse::<f64>().ok().filter(|f| f.is_finite()) {
            return Self::Float(f);
        }
        if trimmed.starts_with(['[', '(', '{']) {
            return Self::Raw(trimmed.to_string());
        }
        for quote in ['\'', '"'] {
            if trimmed.len() >= 2 && trimmed.starts_with(quote) && trimmed.ends_with(quote) {
                return Self::Text(trimmed[1..trimmed.len() - 1].to_string());
            }
        }
        Self::Text(value.to_string())
    }

    fn quoted(&self) -> Self {
        match self {
            Self::Text(s) => Self::Raw(format!("'{s}'")),
            other => other.clone(),
        }
    }
}

impl fmt::Display for TemplateValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) | Self::Raw(s) => f.write_str(s),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(x) if x.is_nan() => f.write_str("float('nan')"),
            Self::Float(x) if x.is_infinite() => {
                f.write_str(if *x > 0.0 { "float('inf')" } else { "float('-inf')" })
            }
            Self::Float(x) => write!(f, "{x:?}"),
            Self::Bool(true) => f.write_str("True"),
            Self::Bool(false) => f.write_str("False"),
            Self::None => f.write_str("None"),
        }
    }
}

impl From<&str> for TemplateValue {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for TemplateValue {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

impl From<i64> for TemplateValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for TemplateValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for TemplateValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Values keyed by placeholder name.
pub type Substitutions = BTreeMap<String, TemplateValue>;

/// Placeholders found in a template, grouped by kind.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TemplateKeys {
    /// `%name` placeholders, in order of appearance, repeats included.
    pub named: Vec<String>,
    /// `%{name}` placeholders, in order of appearance, repeats included.
    pub braced: Vec<String>,
    /// Number of `%%` escapes.
    pub escaped: usize,
    /// Positions (line, column; both 1-based) of delimiters not followed by a
    /// valid placeholder.
    pub invalid: Vec<(usize, usize)>,
}

/// A parameterized input script.
#[derive(Debug, Clone)]
pub struct Template {
    text: String,
    delimiter: char,
    pattern: Regex,
}

enum Piece<'a> {
    Escaped,
    Key(&'a str),
    Invalid(usize),
}

impl Template {
    /// Creates a template using the default `%` delimiter.
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_delimiter(text, DEFAULT_DELIMITER)
    }

    /// Creates a template with a custom single-character delimiter (e.g. `$`).
    pub fn with_delimiter(text: impl Into<String>, delimiter: char) -> Self {
        let d = regex::escape(&delimiter.to_string());
        let pattern = format!(
            r"{d}(?:(?P<escaped>{d})|(?P<named>(?i:{ID_PATTERN}))|\{{(?P<braced>(?i:{ID_PATTERN}))\}}|(?P<invalid>))"
        );
        Self {
            text: text.into(),
            delimiter,
            pattern: Regex::new(&pattern).expect("placeholder pattern is valid for any escaped delimiter"),
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    fn line_and_column(&self, offset: usize) -> (usize, usize) {
        let before = &self.text[..offset];
        let line = before.matches('\n').count() + 1;
        let column = before.rfind('\n').map_or(offset, |nl| offset - nl - 1) + 1;
        (line, column)
    }

    fn pieces(&self) -> impl Iterator<Item = (regex::Match<'_>, Piece<'_>)> + '_ {
        self.pattern.captures_iter(&self.text).filter_map(|caps| {
            let whole = caps.get(0)?;
            let piece = if caps.name("escaped").is_some() {
                Piece::Escaped
            } else if let Some(m) = caps.name("named").or_else(|| caps.name("braced")) {
                Piece::Key(m.as_str())
            } else {
                Piece::Invalid(whole.start())
            };
            Some((whole, piece))
        })
    }

    /// Lists every placeholder of the template grouped by kind.
    pub fn keys(&self) -> TemplateKeys {
        let mut keys = TemplateKeys::default();
        for caps in self.pattern.captures_iter(&self.text) {
            if caps.name("escaped").is_some() {
                keys.escaped += 1;
            } else if let Some(m) = caps.name("named") {
                keys.named.push(m.as_str().to_string());
            } else if let Some(m) = caps.name("braced") {
                keys.braced.push(m.as_str().to_string());
            } else if let Some(m) = caps.get(0) {
                keys.invalid.push(self.line_and_column(m.start()));
            }
        }
        keys
    }

    /// Unique placeholder names (plain and braced) in order of first appearance.
    pub fn named_keys(&self) -> Vec<String> {
        let mut seen = BTreeSet::new();
        self.pieces()
            .filter_map(|(_, piece)| match piece {
                Piece::Key(name) => Some(name),
                _ => None,
            })
            .filter(|name| seen.insert(*name))
            .map(str::to_string)
            .collect()
    }

    /// Placeholder names without a value in `values`, in order of first appearance.
    pub fn missing_keys(&self, values: &Substitutions) -> Vec<String> {
        self.named_keys()
            .into_iter()
            .filter(|k| !values.contains_key(k))
            .collect()
    }

    /// Replaces every placeholder, failing if any value is missing.
    ///
    /// # Errors
    ///
    /// Returns [`TemplateError::MissingKeys`] listing every placeholder without
    /// a value, or [`TemplateError::InvalidPlaceholder`] for a delimiter that
    /// does not start a valid placeholder.
    pub fn substitute(&self, values: &Substitutions) -> Result<String, TemplateError> {
        let missing = self.missing_keys(values);
        if !missing.is_empty() {
            return Err(TemplateError::MissingKeys(missing));
        }
        self.render(values, true)
    }

    /// Replaces the placeholders that have values and leaves the rest untouched.
    pub fn safe_substitute(&self, values: &Substitutions) -> String {
        self.render(values, false).unwrap_or_else(|_| self.text.clone())
    }

    fn render(&self, values: &Substitutions, strict: bool) -> Result<String, TemplateError> {
        let mut out = String::with_capacity(self.text.len());
        let mut last = 0;
        for (whole, piece) in self.pieces() {
            out.push_str(&self.text[last..whole.start()]);
            match piece {
                Piece::Escaped => out.push(self.delimiter),
                Piece::Key(name) => match values.get(name) {
                    Some(value) => out.push_str(&value.to_string()),
                    None => out.push_str(whole.as_str()),
                },
                Piece::Invalid(offset) => {
                    if strict {
                        let (line, column) = self.line_and_column(offset);
                        return Err(TemplateError::InvalidPlaceholder { line, column });
                    }
                    out.push_str(whole.as_str());
                }
            }
            last = whole.end();
        }
        out.push_str(&self.text[last..]);
        Ok(out)
    }

    /// Strict substitution for Python input scripts: text values are wrapped
    /// in single quotes first.
    pub fn render_script(&self, values: &Substitutions) -> Result<String, TemplateError> {
        let quoted: Substitutions = values.iter().map(|(k, v)| (k.clone(), v.quoted())).collect();
        self.substitute(&quoted)
    }

    /// Renders the template with [`render_script`](Self::render_script) and
    /// writes it to `path`.
    pub fn render_and_write(&self, values: &Substitutions, path: &Path) -> Result<(), TemplateError> {
        let rendered = self.render_script(values)?;
        fs::write(path, rendered).map_err(|source| TemplateError::Write {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Wrote rendered template");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subs(pairs: &[(&str, TemplateValue)]) -> Substitutions {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn keys_are_grouped_by_kind() {
        let template = Template::new("a=%a b=%{b_2} c=%a 100%% bad=%1\nx=%Xc");
        let keys = template.keys();
        assert_eq!(keys.named, vec!["a", "a", "Xc"]);
        assert_eq!(keys.braced, vec!["b_2"]);
        assert_eq!(keys.escaped, 1);
        assert_eq!(keys.invalid, vec![(1, 30)]);
        assert_eq!(template.named_keys(), vec!["a", "b_2", "Xc"]);
    }

    #[test]
    fn substitute_with_complete_keys_replaces_everything() {
        let template = Template::new("kpts=%kpts, xc=%{xc}, ecut=%ecut, spin=%spin, u=%u, %%done");
        let rendered = template
            .substitute(&subs(&[
                ("kpts", TemplateValue::Raw("(4, 4, 1)".into())),
                ("xc", "PBE".into()),
                ("ecut", 500.0.into()),
                ("spin", true.into()),
                ("u", TemplateValue::None),
            ]))
            .unwrap();
        assert_eq!(rendered, "kpts=(4, 4, 1), xc=PBE, ecut=500.0, spin=True, u=None, %done");
    }

    #[test]
    fn substitute_lists_all_missing_keys() {
        let template = Template::new("%a %b %c %a");
        match template.substitute(&subs(&[("b", 1.into())])) {
            Err(TemplateError::MissingKeys(missing)) => assert_eq!(missing, vec!["a", "c"]),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn substitute_rejects_invalid_placeholders() {
        let template = Template::new("line one\nvalue = %5");
        match template.substitute(&Substitutions::new()) {
            Err(TemplateError::InvalidPlaceholder { line, column }) => {
                assert_eq!((line, column), (2, 9));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn safe_substitute_leaves_unknown_placeholders() {
        let template = Template::new("%a %{b} %5 %%");
        assert_eq!(template.safe_substitute(&subs(&[("a", 1.into())])), "1 %{b} %5 %");
    }

    #[test]
    fn custom_delimiter() {
        let template = Template::with_delimiter("xc='$xc' cost=$$5", '$');
        assert_eq!(template.named_keys(), vec!["xc"]);
        assert_eq!(
            template.substitute(&subs(&[("xc", "BEEF-vdW".into())])).unwrap(),
            "xc='BEEF-vdW' cost=$5"
        );
    }

    #[test]
    fn render_and_write_quotes_text_values() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("relax.py");
        let template = Template::new("atoms = read(%atoms)\nfmax = %fmax\n");
        template
            .render_and_write(&subs(&[("atoms", "POSCAR".into()), ("fmax", 0.05.into())]), &path)
            .unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "atoms = read('POSCAR')\nfmax = 0.05\n");
    }

    #[test]
    fn literals_are_typed() {
        assert_eq!(TemplateValue::parse_literal("42"), TemplateValue::Int(42));
        assert_eq!(TemplateValue::parse_literal("1e-3"), TemplateValue::Float(0.001));
        assert_eq!(TemplateValue::parse_literal("True"), TemplateValue::Bool(true));
        assert_eq!(TemplateValue::parse_literal("None"), TemplateValue::None);
        assert_eq!(
            TemplateValue::parse_literal("[('Ni', 1.0)]"),
            TemplateValue::Raw("[('Ni', 1.0)]".into())
        );
        assert_eq!(TemplateValue::parse_literal("'PBE'"), TemplateValue::Text("PBE".into()));
        assert_eq!(TemplateValue::parse_literal("PBE"), TemplateValue::Text("PBE".into()));
    }

    #[test]
    fn non_finite_literals_stay_text() {
        for literal in ["nan", "NaN", "inf", "-infinity"] {
            assert_eq!(TemplateValue::parse_literal(literal), TemplateValue::Text(literal.into()));
        }
    }

    #[test]
    fn non_finite_floats_render_as_python() {
        assert_eq!(TemplateValue::Float(f64::NAN).to_string(), "float('nan')");
        assert_eq!(TemplateValue::Float(f64::INFINITY).to_string(), "float('inf')");
        assert_eq!(TemplateValue::Float(f64::NEG_INFINITY).to_string(), "float('-inf')");
        assert_eq!(TemplateValue::Float(0.5).to_string(), "0.5");
    }
}
