use serde_json::Value;

use super::rules::{self, ExtractionRule};
use super::{BusinessSummary, NormalizedUser};

/// Map a raw backend user payload (plus, optionally, the auth envelope it
/// arrived in) onto a [`NormalizedUser`].
///
/// `raw` is probed before `envelope`. Pure and deterministic; feeding the
/// serialized output back in yields the same user.
///
/// # Examples
/// ```
/// use serde_json::json;
/// let user = session::user::normalize(&json!({"full_name": "Jane Q Public"}), None);
/// assert_eq!(user.first_name.as_deref(), Some("Jane"));
/// assert_eq!(user.middle_name.as_deref(), Some("Q"));
/// assert_eq!(user.last_name.as_deref(), Some("Public"));
/// ```
pub fn normalize(raw: &Value, envelope: Option<&Value>) -> NormalizedUser {
    let mut sources = vec![raw];
    sources.extend(envelope);

    let get = |rule: &ExtractionRule| rules::first_string(&sources, rule);
    let names = Names {
        full: get(&rules::FULL_NAME),
        first: get(&rules::FIRST_NAME),
        middle: get(&rules::MIDDLE_NAME),
        last: get(&rules::LAST_NAME),
    }
    .reconcile();

    NormalizedUser {
        id: get(&rules::USER_ID),
        email: get(&rules::EMAIL),
        first_name: names.first,
        middle_name: names.middle,
        last_name: names.last,
        full_name: names.full,
        phone: get(&rules::PHONE),
        picture_url: get(&rules::PICTURE_URL),
        businesses: rules::first_value(&sources, &rules::BUSINESSES)
            .map(normalize_businesses)
            .unwrap_or_default(),
    }
}

struct Names {
    full: Option<String>,
    first: Option<String>,
    middle: Option<String>,
    last: Option<String>,
}

impl Names {
    fn reconcile(self) -> Self {
        let has_parts = self.first.is_some() || self.middle.is_some() || self.last.is_some();
        if !has_parts {
            let split = self.full.as_deref().map(split_full_name);
            return split.unwrap_or(self);
        }
        if self.full.is_some() {
            return self;
        }
        let joined = [&self.first, &self.middle, &self.last]
            .into_iter()
            .flatten()
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        Self {
            full: Some(joined),
            ..self
        }
    }
}

fn split_full_name(full: &str) -> Names {
    let tokens: Vec<&str> = full.split_whitespace().collect();
    let first = tokens.first().map(|t| t.to_string());
    let (middle, last) = match tokens.len() {
        0 | 1 => (None, None),
        n => {
            let middle = tokens[1..n - 1].join(" ");
            ((!middle.is_empty()).then_some(middle), Some(tokens[n - 1].to_string()))
        }
    };
    Names {
        full: Some(tokens.join(" ")),
        first,
        middle,
        last,
    }
}

fn normalize_businesses(value: &Value) -> Vec<BusinessSummary> {
    match value {
        Value::Array(items) => items.iter().filter_map(normalize_business).collect(),
        other => normalize_business(other).into_iter().collect(),
    }
}

fn normalize_business(value: &Value) -> Option<BusinessSummary> {
    let summary = match value {
        Value::Object(_) => {
            let sources = [value];
            BusinessSummary {
                id: rules::first_string(&sources, &rules::BUSINESS_ID),
                name: rules::first_string(&sources, &rules::BUSINESS_NAME),
                gstin: rules::first_string(&sources, &rules::BUSINESS_GSTIN),
            }
        }
        Value::String(id) if !id.trim().is_empty() => BusinessSummary {
            id: Some(id.trim().to_string()),
            ..Default::default()
        },
        Value::Number(id) => BusinessSummary {
            id: Some(id.to_string()),
            ..Default::default()
        },
        _ => return None,
    };
    (summary != BusinessSummary::default()).then_some(summary)
}
