use std::collections::BTreeMap;
use url::form_urlencoded;

/// Flat view of a submitted form: one value per field name.
pub type FormFields = BTreeMap<String, String>;

/// Decodes a form-urlencoded body, keeping only the first value of each key.
///
/// Pairs may be separated by `&` or `;`. Pairs with a blank value are treated as not
/// submitted at all and are dropped, as are fragments without a `=`.
pub fn parse_form_single_value(raw: &str) -> FormFields {
    let mut fields = FormFields::new();
    for fragment in raw.split(['&', ';']) {
        if !fragment.contains('=') {
            continue;
        }
        for (key, value) in form_urlencoded::parse(fragment.as_bytes()) {
            if value.is_empty() {
                continue;
            }
            fields
                .entry(key.into_owned())
                .or_insert_with(|| value.into_owned());
        }
    }
    fields
}
