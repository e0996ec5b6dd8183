//! Client-side reading of access-token claims.
//!
//! The signature is not verified here; the backend is the authority and a
//! forged token simply earns a 401. Only the expiry and identity claims are
//! read.

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde_json::Value;

/// Decode the claim set of a JWT without verifying its signature.
pub fn decode_claims(token: &str) -> Option<Value> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<Value>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .ok()
        .filter(Value::is_object)
}

/// The `exp` claim in unix seconds, if the token carries one.
pub fn expires_at(token: &str) -> Option<i64> {
    decode_claims(token).as_ref().and_then(exp_claim)
}

fn exp_claim(claims: &Value) -> Option<i64> {
    let exp = claims.get("exp")?;
    exp.as_i64().or_else(|| exp.as_f64().map(|f| f as i64))
}

/// Whether `token` must be refreshed before use at `now` (unix seconds).
///
/// A token without an `exp` claim never expires client-side. A token that
/// cannot be decoded at all counts as expired.
pub fn is_expired(token: &str, now: i64, leeway_secs: i64) -> bool {
    match decode_claims(token) {
        None => true,
        Some(claims) => match claims.get("exp") {
            None | Some(Value::Null) => false,
            Some(_) => exp_claim(&claims).map_or(true, |exp| exp <= now + leeway_secs),
        },
    }
}

/// [`is_expired`] against the current wall clock.
pub fn is_expired_now(token: &str, leeway_secs: i64) -> bool {
    is_expired(token, chrono::Utc::now().timestamp(), leeway_secs)
}

#[cfg(test)]
pub(crate) mod test_tokens {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::{json, Value};

    /// Sign `claims` with a throwaway secret.
    pub fn token_with(claims: Value) -> String {
        encode(&Header::default(), &claims, &EncodingKey::from_secret(b"backend-secret")).unwrap()
    }

    /// Token for `sub` expiring `offset_secs` from now (negative = already expired).
    pub fn token_expiring_in(sub: &str, offset_secs: i64) -> String {
        let exp = chrono::Utc::now().timestamp() + offset_secs;
        token_with(json!({"sub": sub, "exp": exp}))
    }
}

#[cfg(test)]
mod tests {
    use super::test_tokens::*;
    use super::*;
    use serde_json::json;

    #[test]
    fn reads_exp_without_knowing_the_secret() {
        let token = token_with(json!({"sub": "u1", "exp": 1_900_000_000}));
        assert_eq!(expires_at(&token), Some(1_900_000_000));
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims["sub"], "u1");
    }

    #[test]
    fn past_exp_is_expired() {
        let token = token_expiring_in("u1", -60);
        assert!(is_expired_now(&token, 0));
    }

    #[test]
    fn future_exp_is_valid_unless_within_leeway() {
        let token = token_with(json!({"exp": 1_000}));
        assert!(!is_expired(&token, 900, 0));
        assert!(is_expired(&token, 900, 100));
        assert!(is_expired(&token, 1_000, 0));
    }

    #[test]
    fn missing_exp_never_expires() {
        let token = token_with(json!({"sub": "u1"}));
        assert_eq!(expires_at(&token), None);
        assert!(!is_expired(&token, i64::MAX / 2, 0));
    }

    #[test]
    fn garbage_counts_as_expired() {
        assert!(is_expired("not-a-jwt", 0, 0));
        assert!(is_expired("", 0, 0));
        assert_eq!(decode_claims("a.b.c"), None);
    }
}
