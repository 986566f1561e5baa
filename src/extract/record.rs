//! Candidate record type produced by extraction

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// The five standard record attributes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Name,
    Phone,
    Address,
    Institution,
    Organization,
}

impl Field {
    /// Returns all standard fields
    pub fn all() -> [Self; 5] {
        [
            Self::Name,
            Self::Phone,
            Self::Address,
            Self::Institution,
            Self::Organization,
        ]
    }

    /// Column / attribute name of the field
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Phone => "phone",
            Self::Address => "address",
            Self::Institution => "institution",
            Self::Organization => "organization",
        }
    }

    /// Parses an exact attribute name
    pub fn from_name(s: &str) -> Option<Self> {
        Self::all().into_iter().find(|field| field.as_str() == s)
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A person or organization record scraped from a page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub name: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub institution: Option<String>,
    pub organization: Option<String>,

    /// Page the record was found on
    pub source_url: String,

    /// When the record was extracted
    pub scraped_at: DateTime<Utc>,

    /// Fields that did not map to a standard attribute
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
}

impl Record {
    /// Creates an empty record for `source_url`
    pub fn new(source_url: &str) -> Self {
        Self {
            name: None,
            phone: None,
            address: None,
            institution: None,
            organization: None,
            source_url: source_url.to_string(),
            scraped_at: Utc::now(),
            metadata: BTreeMap::new(),
        }
    }

    /// Returns the value of a standard field
    pub fn get(&self, field: Field) -> Option<&str> {
        let value = match field {
            Field::Name => &self.name,
            Field::Phone => &self.phone,
            Field::Address => &self.address,
            Field::Institution => &self.institution,
            Field::Organization => &self.organization,
        };
        value.as_deref().filter(|v| !v.is_empty())
    }

    /// Sets a standard field; blank values clear it
    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        let value = value.into();
        let value = value.trim();
        let value = (!value.is_empty()).then(|| value.to_string());
        match field {
            Field::Name => self.name = value,
            Field::Phone => self.phone = value,
            Field::Address => self.address = value,
            Field::Institution => self.institution = value,
            Field::Organization => self.organization = value,
        }
    }

    /// Builder-style variant of [`Record::set`]
    pub fn with(mut self, field: Field, value: impl Into<String>) -> Self {
        self.set(field, value);
        self
    }

    /// True when at least one standard field is non-empty
    pub fn has_standard_field(&self) -> bool {
        Field::all().into_iter().any(|field| self.get(field).is_some())
    }
}
