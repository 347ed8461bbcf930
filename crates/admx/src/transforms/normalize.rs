//! 🧽 Field normalizers: small pure functions that scrub one value at a time.
//!
//! Nothing in here touches I/O, nothing in here fails. Garbage in, `None` out.
//! Every function is the kind of thing you'd write on a whiteboard during an
//! interview and then get asked about edge cases for forty minutes. 🦆

use serde_json::Value;

/// 📞 Formats a North American number as `(AAA) BBB-CCCC`.
///
/// Non-digits are stripped first. An 11 digit number with a leading country
/// code `1` loses the `1`. Anything that still isn't 10 digits comes back as
/// the raw input, untouched, so the partner can at least squint at it.
/// Empty input is `None`.
pub fn format_phone_number(raw: &str) -> Option<String> {
    if raw.is_empty() {
        return None;
    }

    let digits: String = raw.chars().filter(char::is_ascii_digit).collect();
    let digits = match digits.strip_prefix('1') {
        Some(rest) if digits.len() == 11 => rest.to_string(),
        _ => digits,
    };

    if digits.len() == 10 {
        Some(format!(
            "({}) {}-{}",
            &digits[0..3],
            &digits[3..6],
            &digits[6..10]
        ))
    } else {
        // -- ⚠️ "123" stays "123". We are formatters, not fortune tellers.
        Some(raw.to_string())
    }
}

/// ✅ Maps boolean-ish cells to the partner's `Yes` / `No`.
///
/// JSON booleans and any casing of the strings `"true"` / `"false"` are
/// rewritten. Everything else is left exactly as it was.
pub fn canonicalize_boolean(value: &mut Value) {
    let replacement = match value {
        Value::Bool(true) => "Yes",
        Value::Bool(false) => "No",
        Value::String(s) if s.eq_ignore_ascii_case("true") => "Yes",
        Value::String(s) if s.eq_ignore_ascii_case("false") => "No",
        _ => return,
    };
    *value = Value::String(replacement.to_string());
}

/// 🏠 Glues two address lines together with a single space.
///
/// Missing or null lines count as empty strings, so `("12 Elm St", None)`
/// becomes `"12 Elm St "`. The trailing space stays. The partner's importer
/// has seen worse.
pub fn join_address_lines(line1: Option<&Value>, line2: Option<&Value>) -> String {
    let render = |v: Option<&Value>| v.and_then(text_of).unwrap_or_default();
    format!("{} {}", render(line1), render(line2))
}

/// 📅 Which slice of a `YYYY-MM-DD` string you're after.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatePart {
    Year,
    Month,
}

/// 📅 Splits a date string on `-` and hands back one component.
///
/// Year is component 0, month is component 1. Null, empty, or non-string
/// dates give `None`, and so does a date that simply has no month.
pub fn date_component(date: Option<&Value>, part: DatePart) -> Option<String> {
    let date = date?.as_str()?;
    if date.is_empty() {
        return None;
    }
    let mut pieces = date.split('-');
    let piece = match part {
        DatePart::Year => pieces.next(),
        DatePart::Month => pieces.nth(1),
    };
    piece.map(str::to_string)
}

/// 🏫 The last four characters of a school code.
///
/// Numeric codes are rendered in decimal first. Codes shorter than four
/// characters come back whole.
pub fn school_code_suffix(code: Option<&Value>) -> Option<String> {
    let code = text_of(code?)?;
    let char_count = code.chars().count();
    Some(code.chars().skip(char_count.saturating_sub(4)).collect())
}

/// 🔤 Scalar → text. Strings are themselves, numbers and booleans use their
/// JSON spelling, and null or containers have no text at all.
pub fn text_of(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn the_one_where_the_country_code_gets_shown_the_door() {
        assert_eq!(
            format_phone_number("1-555-123-4567").as_deref(),
            Some("(555) 123-4567")
        );
        assert_eq!(
            format_phone_number("5551234567").as_deref(),
            Some("(555) 123-4567")
        );
        assert_eq!(
            format_phone_number("+1 (555) 123.4567").as_deref(),
            Some("(555) 123-4567")
        );
    }

    #[test]
    fn the_one_where_short_numbers_are_left_alone() {
        assert_eq!(format_phone_number("123").as_deref(), Some("123"));
        assert_eq!(format_phone_number("ext. 9").as_deref(), Some("ext. 9"));
        // -- 11 digits, but no leading 1. not ours to fix.
        assert_eq!(
            format_phone_number("25551234567").as_deref(),
            Some("25551234567")
        );
        assert_eq!(format_phone_number(""), None);
    }

    #[test]
    fn the_one_where_truthiness_learns_to_say_yes() {
        for (input, expected) in [
            (json!(true), json!("Yes")),
            (json!("true"), json!("Yes")),
            (json!("TRUE"), json!("Yes")),
            (json!("True"), json!("Yes")),
            (json!(false), json!("No")),
            (json!("false"), json!("No")),
            (json!("FALSE"), json!("No")),
            (json!("yes"), json!("yes")),
            (json!(1), json!(1)),
            (Value::Null, Value::Null),
        ] {
            let mut cell = input.clone();
            canonicalize_boolean(&mut cell);
            assert_eq!(cell, expected, "input was {input}");
        }
    }

    #[test]
    fn the_one_where_address_lines_keep_their_awkward_space() {
        assert_eq!(
            join_address_lines(Some(&json!("12 Elm St")), Some(&json!("Apt 4"))),
            "12 Elm St Apt 4"
        );
        assert_eq!(
            join_address_lines(Some(&json!("12 Elm St")), None),
            "12 Elm St "
        );
        assert_eq!(
            join_address_lines(Some(&Value::Null), Some(&json!("Apt 4"))),
            " Apt 4"
        );
    }

    #[test]
    fn the_one_where_dates_get_cut_into_pieces() {
        let date = json!("2019-08-15");
        assert_eq!(
            date_component(Some(&date), DatePart::Year).as_deref(),
            Some("2019")
        );
        assert_eq!(
            date_component(Some(&date), DatePart::Month).as_deref(),
            Some("08")
        );

        let year_only = json!("2019");
        assert_eq!(
            date_component(Some(&year_only), DatePart::Year).as_deref(),
            Some("2019")
        );
        assert_eq!(date_component(Some(&year_only), DatePart::Month), None);

        assert_eq!(date_component(Some(&json!("")), DatePart::Year), None);
        assert_eq!(date_component(Some(&json!(2019)), DatePart::Year), None);
        assert_eq!(date_component(None, DatePart::Month), None);
    }

    #[test]
    fn the_one_where_school_codes_lose_their_prefix() {
        assert_eq!(
            school_code_suffix(Some(&json!("CEEB001234"))).as_deref(),
            Some("1234")
        );
        assert_eq!(
            school_code_suffix(Some(&json!(9876543))).as_deref(),
            Some("6543")
        );
        assert_eq!(school_code_suffix(Some(&json!("42"))).as_deref(), Some("42"));
        assert_eq!(school_code_suffix(Some(&Value::Null)), None);
        assert_eq!(school_code_suffix(None), None);
    }
}
