//! RDS (Radio Data System) metadata.
//!
//! The decode chain ends in three stages:
//!
//! - [`decoder::RdsDecoder`]: block synchronisation and error correction over
//!   the differentially decoded bit stream, producing 4-block groups
//! - [`parser::RdsParser`]: group interpretation, producing [`RdsFragment`]s
//! - [`adapter::RdsAdapter`]: the cache of the latest value of every
//!   [`RdsField`], with change notifications
//!
//! # Example
//!
//! ```
//! use tuner::rds::{RdsData, RdsField, RdsFragment};
//!
//! let mut data = RdsData::default();
//! let changed = data.apply(&RdsFragment::new(1, "KROQ")).unwrap();
//! assert_eq!(changed, Some(RdsField::StationName));
//! assert_eq!(data.station_name(), Some("KROQ"));
//! ```

pub mod adapter;
pub mod decoder;
pub mod parser;

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::Serialize;

use crate::{Error, Result};

pub use adapter::{RdsAdapter, RdsEventSink};
pub use decoder::{RdsDecoder, RdsGroup};
pub use parser::RdsParser;

/// Separator between alternative frequencies in a fragment payload
pub const AF_SEPARATOR: &str = ", ";

/**
 * Metadata field carried by an RDS fragment
 *
 * The discriminant is the fragment's type code.
 */
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RdsField {
    ProgramInformation = 0,
    StationName = 1,
    ProgramType = 2,
    Flags = 3,
    #[serde(rename = "radiotext")]
    RadioText = 4,
    ClockTime = 5,
    AlternativeFrequencies = 6,
}

impl RdsField {
    pub const ALL: [RdsField; 7] = [
        RdsField::ProgramInformation,
        RdsField::StationName,
        RdsField::ProgramType,
        RdsField::Flags,
        RdsField::RadioText,
        RdsField::ClockTime,
        RdsField::AlternativeFrequencies,
    ];

    pub fn code(self) -> u8 {
        self as u8
    }

    pub fn name(self) -> &'static str {
        match self {
            RdsField::ProgramInformation => "program_information",
            RdsField::StationName => "station_name",
            RdsField::ProgramType => "program_type",
            RdsField::Flags => "flags",
            RdsField::RadioText => "radiotext",
            RdsField::ClockTime => "clock_time",
            RdsField::AlternativeFrequencies => "alternative_frequencies",
        }
    }
}

impl TryFrom<u8> for RdsField {
    type Error = Error;

    fn try_from(code: u8) -> Result<Self> {
        RdsField::ALL
            .get(code as usize)
            .copied()
            .ok_or(Error::UnknownMessageType(code))
    }
}

impl fmt::Display for RdsField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Cached value of a field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RdsValue {
    Text(String),
    /// Alternative frequencies in MHz, formatted with one decimal
    Frequencies(BTreeSet<String>),
}

impl RdsValue {
    pub fn as_text(&self) -> Option<&str> {
        match self {
            RdsValue::Text(text) => Some(text),
            RdsValue::Frequencies(_) => None,
        }
    }

    pub fn as_frequencies(&self) -> Option<&BTreeSet<String>> {
        match self {
            RdsValue::Frequencies(set) => Some(set),
            RdsValue::Text(_) => None,
        }
    }
}

impl fmt::Display for RdsValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RdsValue::Text(text) => f.write_str(text),
            RdsValue::Frequencies(set) => {
                let list: Vec<&str> = set.iter().map(String::as_str).collect();
                f.write_str(&list.join(AF_SEPARATOR))
            }
        }
    }
}

/// One decoded message: a type code and its text payload
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RdsFragment {
    pub code: u8,
    pub payload: String,
}

impl RdsFragment {
    pub fn new(code: u8, payload: impl Into<String>) -> Self {
        Self {
            code,
            payload: payload.into(),
        }
    }

    pub fn from_field(field: RdsField, payload: impl Into<String>) -> Self {
        Self::new(field.code(), payload)
    }

    pub fn field(&self) -> Result<RdsField> {
        RdsField::try_from(self.code)
    }
}

/// Latest value of every field received since the last clear.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RdsData {
    fields: BTreeMap<RdsField, RdsValue>,
}

impl RdsData {
    /// Fold one fragment into the cache.
    ///
    /// Returns the field when its value changed, `None` for a repeat. An
    /// unknown type code leaves the cache untouched.
    pub fn apply(&mut self, fragment: &RdsFragment) -> Result<Option<RdsField>> {
        let field = fragment.field()?;

        let changed = if field == RdsField::AlternativeFrequencies {
            let tokens = fragment
                .payload
                .split(AF_SEPARATOR)
                .map(str::trim)
                .filter(|t| !t.is_empty())
                .map(str::to_string);
            match self.fields.get_mut(&field) {
                Some(RdsValue::Frequencies(set)) => {
                    let before = set.len();
                    set.extend(tokens);
                    set.len() > before
                }
                _ => {
                    self.fields
                        .insert(field, RdsValue::Frequencies(tokens.collect()));
                    true
                }
            }
        } else {
            match self.fields.get(&field) {
                Some(RdsValue::Text(current)) if *current == fragment.payload => false,
                _ => {
                    self.fields
                        .insert(field, RdsValue::Text(fragment.payload.clone()));
                    true
                }
            }
        };

        Ok(changed.then_some(field))
    }

    pub fn clear(&mut self) {
        self.fields.clear();
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn get(&self, field: RdsField) -> Option<&RdsValue> {
        self.fields.get(&field)
    }

    pub fn iter(&self) -> impl Iterator<Item = (RdsField, &RdsValue)> {
        self.fields.iter().map(|(&field, value)| (field, value))
    }

    fn text(&self, field: RdsField) -> Option<&str> {
        self.get(field).and_then(RdsValue::as_text)
    }

    /// PI code, four hexadecimal digits
    pub fn program_information(&self) -> Option<&str> {
        self.text(RdsField::ProgramInformation)
    }

    pub fn station_name(&self) -> Option<&str> {
        self.text(RdsField::StationName)
    }

    pub fn program_type(&self) -> Option<&str> {
        self.text(RdsField::ProgramType)
    }

    pub fn flags(&self) -> Option<&str> {
        self.text(RdsField::Flags)
    }

    pub fn radio_text(&self) -> Option<&str> {
        self.text(RdsField::RadioText)
    }

    pub fn clock_time(&self) -> Option<&str> {
        self.text(RdsField::ClockTime)
    }

    pub fn alternative_frequencies(&self) -> Option<&BTreeSet<String>> {
        self.get(RdsField::AlternativeFrequencies)
            .and_then(RdsValue::as_frequencies)
    }
}
