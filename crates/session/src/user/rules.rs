//! Declarative extraction rules over loosely shaped JSON payloads.
//!
//! Backend user payloads come in several spellings (`firstName`,
//! `first_name`, `profile.firstName`, ...). Each canonical field is described
//! by an [`ExtractionRule`]: an ordered list of dotted paths. Sources are
//! probed in order and, within a source, paths in order; the first present
//! value wins. The canonical camelCase key is always the first path so that
//! already-normalized output maps back onto itself.

use serde_json::Value;

#[derive(Debug, Clone, Copy)]
pub struct ExtractionRule {
    pub field: &'static str,
    pub paths: &'static [&'static str],
}

pub const USER_ID: ExtractionRule = ExtractionRule {
    field: "id",
    paths: &["id", "_id", "userId", "user_id", "uid", "profile.id", "sub"],
};

pub const EMAIL: ExtractionRule = ExtractionRule {
    field: "email",
    paths: &["email", "emailAddress", "email_address", "userEmail", "mail", "profile.email"],
};

pub const FULL_NAME: ExtractionRule = ExtractionRule {
    field: "fullName",
    paths: &[
        "fullName",
        "full_name",
        "fullname",
        "name",
        "displayName",
        "display_name",
        "profile.fullName",
        "profile.name",
    ],
};

pub const FIRST_NAME: ExtractionRule = ExtractionRule {
    field: "firstName",
    paths: &[
        "firstName",
        "first_name",
        "firstname",
        "givenName",
        "given_name",
        "name.first",
        "profile.firstName",
        "profile.first_name",
    ],
};

pub const MIDDLE_NAME: ExtractionRule = ExtractionRule {
    field: "middleName",
    paths: &[
        "middleName",
        "middle_name",
        "middlename",
        "name.middle",
        "profile.middleName",
        "profile.middle_name",
    ],
};

pub const LAST_NAME: ExtractionRule = ExtractionRule {
    field: "lastName",
    paths: &[
        "lastName",
        "last_name",
        "lastname",
        "familyName",
        "family_name",
        "surname",
        "name.last",
        "profile.lastName",
        "profile.last_name",
    ],
};

pub const PHONE: ExtractionRule = ExtractionRule {
    field: "phone",
    paths: &[
        "phone",
        "phoneNumber",
        "phone_number",
        "mobile",
        "mobileNumber",
        "mobile_number",
        "contact.phone",
        "profile.phone",
    ],
};

pub const PICTURE_URL: ExtractionRule = ExtractionRule {
    field: "pictureUrl",
    paths: &[
        "pictureUrl",
        "picture_url",
        "picture",
        "profilePicture",
        "profile_picture",
        "avatarUrl",
        "avatar_url",
        "avatar",
        "photoURL",
        "profile.picture",
    ],
};

pub const BUSINESSES: ExtractionRule = ExtractionRule {
    field: "businesses",
    paths: &[
        "businesses",
        "businessList",
        "business_list",
        "business",
        "companies",
        "profile.businesses",
    ],
};

pub const BUSINESS_ID: ExtractionRule = ExtractionRule {
    field: "id",
    paths: &["id", "_id", "businessId", "business_id"],
};

pub const BUSINESS_NAME: ExtractionRule = ExtractionRule {
    field: "name",
    paths: &["name", "businessName", "business_name", "companyName", "company_name", "legalName"],
};

pub const BUSINESS_GSTIN: ExtractionRule = ExtractionRule {
    field: "gstin",
    paths: &["gstin", "GSTIN", "gstNumber", "gst_number", "gstNo", "taxId"],
};

/// Resolve a dotted path; numeric segments index into arrays.
pub fn lookup<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(value, |current, segment| match current {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    })
}

fn is_present(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::String(s) => !s.trim().is_empty(),
        _ => true,
    }
}

/// First present value for `rule` across `sources`.
pub fn first_value<'a>(sources: &[&'a Value], rule: &ExtractionRule) -> Option<&'a Value> {
    sources.iter().find_map(|source| {
        rule.paths
            .iter()
            .filter_map(|path| lookup(source, path))
            .find(|v| is_present(v))
    })
}

/// First present scalar for `rule`, rendered as a trimmed string.
/// Objects, arrays and booleans do not match and probing continues.
pub fn first_string(sources: &[&Value], rule: &ExtractionRule) -> Option<String> {
    sources.iter().find_map(|source| {
        rule.paths
            .iter()
            .filter_map(|path| lookup(source, path))
            .find_map(scalar_string)
    })
}

fn scalar_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
