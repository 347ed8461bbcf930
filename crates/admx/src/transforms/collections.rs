//! 🪆 Embedded collections: JSON arrays hiding inside string columns.
//!
//! The lake stores `phones`, `emails`, `addresses`, education history and
//! affiliations as JSON text inside a single cell. This module unfolds that
//! paper airplane into typed sub-records and lets the transformer pick one
//! entry out, either by its type tag or by its position.
//!
//! 🧠 Parsing never fails a row. Bad JSON, a non-array, an entry with the
//! wrong shape: all of them quietly become "nothing here". The only witness
//! is a `trace!` line.

use std::marker::PhantomData;

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::trace;

/// 🏷️ A sub-record that carries a type tag (`phoneType`, `emailType`, ...).
pub trait Discriminated {
    fn discriminator(&self) -> Option<&str>;
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Phone {
    pub phone_type: Option<String>,
    pub phone_number: Option<Value>,
}

impl Discriminated for Phone {
    fn discriminator(&self) -> Option<&str> {
        self.phone_type.as_deref()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Email {
    pub email_type: Option<String>,
    pub email_address: Option<Value>,
}

impl Discriminated for Email {
    fn discriminator(&self) -> Option<&str> {
        self.email_type.as_deref()
    }
}

/// 🏠 One postal address. Scalars stay as JSON values because zip codes
/// have been known to arrive as numbers, and we don't judge.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Address {
    pub address_type: Option<String>,
    pub line1: Option<Value>,
    pub line2: Option<Value>,
    pub city: Option<Value>,
    pub state_code: Option<Value>,
    pub zip_code: Option<Value>,
    pub country: Option<Value>,
    pub address_effective_date: Option<Value>,
    pub address_expiration_date: Option<Value>,
}

impl Discriminated for Address {
    fn discriminator(&self) -> Option<&str> {
        self.address_type.as_deref()
    }
}

/// 🎓 One school the applicant attended. Position matters here, not type.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EducationHistory {
    pub school_code: Option<Value>,
    pub education_institution_name: Option<Value>,
    pub hed_start_date: Option<Value>,
    pub hed_end_date: Option<Value>,
    pub degree_earned_before_enrolling: Option<Value>,
    pub degree_earned: Option<Value>,
    pub major: Option<Value>,
}

/// 📦 The decoded array, still raw. Entries are converted into `T` on the way
/// out, so one misshapen entry doesn't take its siblings down with it.
#[derive(Debug, Clone)]
pub struct EmbeddedCollection<T> {
    entries: Vec<Value>,
    _entry: PhantomData<T>,
}

impl<T> Default for EmbeddedCollection<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
            _entry: PhantomData,
        }
    }
}

impl<T: DeserializeOwned> EmbeddedCollection<T> {
    /// 🔍 Decodes a cell. Accepts a JSON-encoded string or an already decoded
    /// array. Null, empty, malformed or non-array input is an empty collection.
    pub fn parse(cell: Option<&Value>) -> Self {
        let entries = match cell {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(entries)) => entries.clone(),
            Some(Value::String(text)) if text.trim().is_empty() => Vec::new(),
            Some(Value::String(text)) => match serde_json::from_str::<Value>(text) {
                Ok(Value::Array(entries)) => entries,
                Ok(_) => {
                    trace!("🪆 embedded column decoded to something that is not an array, treating as empty");
                    Vec::new()
                }
                Err(e) => {
                    trace!("🪆 embedded column is not valid JSON ({e}), treating as empty");
                    Vec::new()
                }
            },
            Some(_) => {
                trace!("🪆 embedded column holds a scalar, treating as empty");
                Vec::new()
            }
        };
        Self {
            entries,
            _entry: PhantomData,
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// 🎯 The entry at a zero-based position, or `None` when out of range or
    /// when that entry doesn't fit the shape of `T`.
    pub fn at(&self, index: usize) -> Option<T> {
        self.entries.get(index).and_then(convert_entry)
    }

    /// 🔁 Every entry that converts cleanly, in order.
    pub fn iter(&self) -> impl Iterator<Item = T> + '_ {
        self.entries.iter().filter_map(convert_entry)
    }
}

impl<T: DeserializeOwned + Discriminated> EmbeddedCollection<T> {
    /// 🏷️ The first entry whose type tag equals `target` exactly.
    pub fn first_of_type(&self, target: &str) -> Option<T> {
        self.iter().find(|entry| entry.discriminator() == Some(target))
    }
}

fn convert_entry<T: DeserializeOwned>(entry: &Value) -> Option<T> {
    match serde_json::from_value(entry.clone()) {
        Ok(converted) => Some(converted),
        Err(e) => {
            trace!("🪆 skipping an embedded entry with the wrong shape: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn the_one_where_the_mobile_phone_wins_over_home() {
        let cell = json!(
            r#"[{"phoneType":"HOME","phoneNumber":"111"},{"phoneType":"MOBILE","phoneNumber":"5551234567"}]"#
        );
        let phones = EmbeddedCollection::<Phone>::parse(Some(&cell));
        assert_eq!(phones.len(), 2);
        let mobile = phones.first_of_type("MOBILE");
        assert_eq!(
            mobile.and_then(|p| p.phone_number),
            Some(json!("5551234567"))
        );
        assert!(phones.first_of_type("FAX").is_none());
    }

    #[test]
    fn the_one_where_first_match_means_first() {
        let cell = json!([
            {"emailType": "HOME", "emailAddress": "first@example.edu"},
            {"emailType": "HOME", "emailAddress": "second@example.edu"}
        ]);
        let emails = EmbeddedCollection::<Email>::parse(Some(&cell));
        assert_eq!(
            emails.first_of_type("HOME").and_then(|e| e.email_address),
            Some(json!("first@example.edu"))
        );
    }

    #[test]
    fn the_one_where_garbage_json_is_just_an_empty_drawer() {
        for cell in [
            json!("[{not json"),
            json!("{\"addressType\":\"HOME\"}"),
            json!(""),
            json!("   "),
            json!(17),
            Value::Null,
        ] {
            let addresses = EmbeddedCollection::<Address>::parse(Some(&cell));
            assert!(addresses.is_empty(), "cell {cell} should parse to nothing");
            assert!(addresses.first_of_type("HOME").is_none());
        }
        assert!(EmbeddedCollection::<Address>::parse(None).is_empty());
    }

    #[test]
    fn the_one_where_position_lookup_runs_off_the_end() {
        let cell = json!(
            r#"[{"schoolCode":"CEEB1234","major":"Biology"},"not an object",{"major":"Art"}]"#
        );
        let history = EmbeddedCollection::<EducationHistory>::parse(Some(&cell));
        assert_eq!(history.len(), 3);
        assert_eq!(
            history.at(0).and_then(|h| h.major),
            Some(json!("Biology"))
        );
        // -- the string entry sits at index 1 and has the wrong shape
        assert!(history.at(1).is_none());
        assert_eq!(history.at(2).and_then(|h| h.major), Some(json!("Art")));
        assert!(history.at(3).is_none());
    }

    #[test]
    fn the_one_where_a_wrongly_typed_tag_does_not_spoil_the_batch() {
        let cell = json!([
            {"phoneType": 7, "phoneNumber": "000"},
            {"phoneType": "MOBILE", "phoneNumber": "5551234567"}
        ]);
        let phones = EmbeddedCollection::<Phone>::parse(Some(&cell));
        assert!(phones.first_of_type("MOBILE").is_some());
    }

    #[test]
    fn the_one_where_affiliations_are_plain_strings() {
        let cell = json!(r#"["Honor Society","Phi Theta Kappa"]"#);
        let affiliations = EmbeddedCollection::<String>::parse(Some(&cell));
        assert!(affiliations.iter().any(|a| a == "Phi Theta Kappa"));
    }
}
