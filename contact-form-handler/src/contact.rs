use crate::form::FormFields;
use email_address::{EmailAddress, Options};
use serde::Serialize;
use std::collections::BTreeMap;

pub const REQUIRED_MESSAGE: &str = "Missing data for required field.";
pub const INVALID_EMAIL_MESSAGE: &str = "Not a valid email address.";
pub const UNKNOWN_FIELD_MESSAGE: &str = "Unknown field.";

/// A validated contact form submission.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Contact {
    email: String,
    name: String,
    subject: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    phone: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    company_name: Option<String>,
}

/// Validation failures, keyed by field name.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, Vec<String>>);

impl FieldErrors {
    pub fn add(&mut self, field: impl Into<String>, message: impl Into<String>) {
        self.0.entry(field.into()).or_default().push(message.into());
    }

    pub fn get(&self, field: &str) -> Option<&[String]> {
        self.0.get(field).map(Vec::as_slice)
    }

    pub fn fields(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl std::fmt::Display for FieldErrors {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut first = true;
        for (field, messages) in &self.0 {
            for message in messages {
                if !first {
                    write!(f, "; ")?;
                }
                write!(f, "{field}: {message}")?;
                first = false;
            }
        }
        Ok(())
    }
}

struct FieldRule {
    name: &'static str,
    required: bool,
    check: Option<Check>,
}

struct Check {
    is_valid: fn(&str) -> bool,
    message: &'static str,
}

const CONTACT_SCHEMA: [FieldRule; 6] = [
    FieldRule {
        name: "email",
        required: true,
        check: Some(Check {
            is_valid: is_email,
            message: INVALID_EMAIL_MESSAGE,
        }),
    },
    FieldRule {
        name: "name",
        required: true,
        check: None,
    },
    FieldRule {
        name: "subject",
        required: true,
        check: None,
    },
    FieldRule {
        name: "content",
        required: true,
        check: None,
    },
    FieldRule {
        name: "phone",
        required: false,
        check: None,
    },
    FieldRule {
        name: "company_name",
        required: false,
        check: None,
    },
];

/// A bare `local@domain` address with a dotted domain. Display names and domain literals
/// are refused.
fn is_email(value: &str) -> bool {
    let options = Options::default()
        .without_display_text()
        .without_domain_literal();
    EmailAddress::parse_with_options(value, options)
        .map(|address| address.email() == value && address.domain().contains('.'))
        .unwrap_or(false)
}

impl Contact {
    /// Builds a contact from individual values, applying the same rules as [`Contact::validate`].
    pub fn new(
        email: impl Into<String>,
        name: impl Into<String>,
        subject: impl Into<String>,
        content: impl Into<String>,
        phone: Option<String>,
        company_name: Option<String>,
    ) -> Result<Self, FieldErrors> {
        let mut fields = FormFields::from([
            ("email".to_string(), email.into()),
            ("name".to_string(), name.into()),
            ("subject".to_string(), subject.into()),
            ("content".to_string(), content.into()),
        ]);
        if let Some(phone) = phone {
            fields.insert("phone".into(), phone);
        }
        if let Some(company_name) = company_name {
            fields.insert("company_name".into(), company_name);
        }
        Self::validate(&fields)
    }

    /// Checks every schema rule against `fields` and reports all violations together.
    pub fn validate(fields: &FormFields) -> Result<Self, FieldErrors> {
        let mut errors = FieldErrors::default();

        for rule in &CONTACT_SCHEMA {
            match fields.get(rule.name).filter(|value| !value.is_empty()) {
                None if rule.required => errors.add(rule.name, REQUIRED_MESSAGE),
                None => {}
                Some(value) => {
                    if let Some(check) = &rule.check {
                        if !(check.is_valid)(value) {
                            errors.add(rule.name, check.message);
                        }
                    }
                }
            }
        }
        for key in fields.keys() {
            if !CONTACT_SCHEMA.iter().any(|rule| rule.name == key) {
                errors.add(key.as_str(), UNKNOWN_FIELD_MESSAGE);
            }
        }

        if !errors.is_empty() {
            return Err(errors);
        }

        let value = |name: &str| fields.get(name).cloned().unwrap_or_default();
        let optional = |name: &str| fields.get(name).filter(|v| !v.is_empty()).cloned();
        Ok(Self {
            email: value("email"),
            name: value("name"),
            subject: value("subject"),
            content: value("content"),
            phone: optional("phone"),
            company_name: optional("company_name"),
        })
    }

    pub fn to_fields(&self) -> FormFields {
        let mut fields = FormFields::from([
            ("email".to_string(), self.email.clone()),
            ("name".to_string(), self.name.clone()),
            ("subject".to_string(), self.subject.clone()),
            ("content".to_string(), self.content.clone()),
        ]);
        if let Some(phone) = &self.phone {
            fields.insert("phone".into(), phone.clone());
        }
        if let Some(company_name) = &self.company_name {
            fields.insert("company_name".into(), company_name.clone());
        }
        fields
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn subject(&self) -> &str {
        &self.subject
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn phone(&self) -> Option<&str> {
        self.phone.as_deref()
    }

    pub fn company_name(&self) -> Option<&str> {
        self.company_name.as_deref()
    }
}
