use chemflow::core::template::{Substitutions, TemplateValue};
use chemflow::db::models::{PropertyValue, RecordId};
use std::collections::BTreeMap;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("Invalid setting '{0}'. Expected KEY=VALUE.")]
    InvalidKeyValue(String),

    #[error("Key cannot be empty in '{0}'.")]
    EmptyKey(String),

    #[error("Invalid system id '{0}'.")]
    InvalidId(String),

    #[error("Invalid id range '{0}'. Expected FIRST-LAST with FIRST <= LAST.")]
    InvalidRange(String),

    #[error("Id range '{0}' spans more than {max} ids.", max = MAX_SELECTION)]
    RangeTooWide(String),

    #[error("More than {max} system ids selected.", max = MAX_SELECTION)]
    SelectionTooLarge,

    #[error("No system ids given.")]
    EmptySelection,
}

/// Largest number of system ids one selection may expand to.
pub const MAX_SELECTION: usize = 100_000;

/// Splits `key=value` at the first `=`; the key is trimmed.
pub fn parse_key_value(pair: &str) -> Result<(String, String), ParseError> {
    let (key, value) = pair
        .split_once('=')
        .ok_or_else(|| ParseError::InvalidKeyValue(pair.to_string()))?;
    let key = key.trim();
    if key.is_empty() {
        return Err(ParseError::EmptyKey(pair.to_string()));
    }
    Ok((key.to_string(), value.to_string()))
}

pub fn parse_substitutions(pairs: &[String]) -> Result<Substitutions, ParseError> {
    pairs
        .iter()
        .map(|pair| {
            let (key, value) = parse_key_value(pair)?;
            Ok((key, TemplateValue::parse_literal(&value)))
        })
        .collect()
}

pub fn parse_properties(pairs: &[String]) -> Result<BTreeMap<String, PropertyValue>, ParseError> {
    pairs
        .iter()
        .map(|pair| {
            let (key, value) = parse_key_value(pair)?;
            Ok((key, PropertyValue::parse_literal(&value)))
        })
        .collect()
}

fn parse_id(token: &str) -> Result<RecordId, ParseError> {
    token
        .trim()
        .parse()
        .map_err(|_| ParseError::InvalidId(token.trim().to_string()))
}

/// Parses a comma separated list of ids and inclusive ranges such as
/// `1,4,7-9`. Duplicates are dropped, first occurrence wins.
pub fn parse_id_list(spec: &str) -> Result<Vec<RecordId>, ParseError> {
    let mut ids = Vec::new();
    for token in spec.split(',').map(str::trim).filter(|t| !t.is_empty()) {
        match token.split_once('-') {
            Some((first, last)) => {
                let (first, last) = (parse_id(first)?, parse_id(last)?);
                if first > last {
                    return Err(ParseError::InvalidRange(token.to_string()));
                }
                if last.abs_diff(first) >= MAX_SELECTION as u64 {
                    return Err(ParseError::RangeTooWide(token.to_string()));
                }
                ids.extend(first..=last);
            }
            None => ids.push(parse_id(token)?),
        }
        if ids.len() > MAX_SELECTION {
            return Err(ParseError::SelectionTooLarge);
        }
    }
    let mut seen = std::collections::HashSet::new();
    ids.retain(|id| seen.insert(*id));
    if ids.is_empty() {
        return Err(ParseError::EmptySelection);
    }
    Ok(ids)
}
