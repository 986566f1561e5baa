//! Mapping raw extracted values onto standard record fields

use crate::extract::patterns::{
    find_address, find_institution, find_name, find_phone, normalize_phone, PhoneStyle,
};
use crate::extract::{Field, Record};

/// Known spellings of each standard field, in lookup order
const SYNONYMS: [(Field, &[&str]); 5] = [
    (
        Field::Name,
        &["name", "student_name", "person", "student", "candidate"],
    ),
    (
        Field::Phone,
        &[
            "phone",
            "telephone",
            "contact",
            "phone_number",
            "mobile",
            "contact_number",
            "phone_no",
            "tel",
            "telephone_number",
            "cell",
            "cellphone",
            "number",
        ],
    ),
    (Field::Address, &["address", "location", "area", "city"]),
    (
        Field::Institution,
        &["institution", "school", "college", "university", "education"],
    ),
    (
        Field::Organization,
        &["organization", "company", "business", "org"],
    ),
];

/// Returns the standard field a raw key maps to, if any
pub fn canonical_field(key: &str) -> Option<Field> {
    let key = key.to_lowercase();
    SYNONYMS
        .iter()
        .find(|(_, names)| names.contains(&key.as_str()))
        .map(|(field, _)| *field)
}

/// Builds a record from key/value pairs such as a table row
///
/// Keys are matched case-insensitively against the synonym table. For each
/// field the first synonym with a non-blank value wins. Keys that map to no
/// field are kept in the record's metadata.
///
/// # Returns
///
/// * `Some(Record)` - At least one standard field was filled
/// * `None` - Nothing usable in `raw`
pub fn normalize_fields(raw: &[(String, String)], source_url: &str) -> Option<Record> {
    let mut record = Record::new(source_url);

    for (field, names) in SYNONYMS.iter() {
        let value = names.iter().find_map(|name| {
            raw.iter()
                .rev()
                .find(|(key, _)| key.to_lowercase() == *name)
                .map(|(_, value)| value.trim())
                .filter(|value| !value.is_empty())
        });
        let Some(value) = value else {
            continue;
        };

        if *field == Field::Phone {
            let phone = find_phone(value, PhoneStyle::Structured)
                .unwrap_or_else(|| fallback_phone(value));
            record.set(Field::Phone, phone);
        } else {
            record.set(*field, value);
        }
    }

    if record.phone.is_none() {
        if let Some(phone) = raw
            .iter()
            .find_map(|(_, value)| find_phone(value, PhoneStyle::Structured))
        {
            record.set(Field::Phone, phone);
        }
    }

    for (key, value) in raw {
        if canonical_field(key).is_none() {
            record.metadata.insert(key.clone(), value.clone());
        }
    }

    record.has_standard_field().then_some(record)
}

/// Builds a record from unlabelled text
///
/// The first phone (Pakistani formats only), name, institution and address
/// found in the text fill their fields.
pub fn record_from_text(text: &str, source_url: &str) -> Option<Record> {
    let mut record = Record::new(source_url);

    if let Some(phone) = find_phone(text, PhoneStyle::FreeText) {
        record.set(Field::Phone, phone);
    }
    if let Some(name) = find_name(text) {
        record.set(Field::Name, name);
    }
    if let Some(institution) = find_institution(text) {
        record.set(Field::Institution, institution);
    }
    if let Some(address) = find_address(text) {
        record.set(Field::Address, address);
    }

    record.has_standard_field().then_some(record)
}

/// Phone cell that the pattern did not recognize: separators are stripped
/// only when the value is purely numeric
fn fallback_phone(value: &str) -> String {
    let numeric = value
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')' | '.'));
    if numeric {
        normalize_phone(value)
    } else {
        value.to_string()
    }
}
