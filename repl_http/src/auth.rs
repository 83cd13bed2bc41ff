use subtle::ConstantTimeEq;

use crate::error::HttpError;

/// A route's declared auth requirement. `Required` accepts the normal key
/// or the admin key (admin is a superset); `Admin` accepts only the admin
/// key; `None` performs no check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthTier {
    Required,
    Admin,
    None,
}

/// The two keys routes are checked against. Comparison is constant-time so
/// a route's auth tier never leaks timing information about how much of a
/// submitted key matched.
#[derive(Debug, Clone)]
pub struct AuthKeys {
    key: String,
    admin_key: String,
}

impl AuthKeys {
    pub fn new(key: impl Into<String>, admin_key: impl Into<String>) -> Self {
        Self { key: key.into(), admin_key: admin_key.into() }
    }

    pub fn check(&self, tier: AuthTier, presented: Option<&str>) -> Result<(), HttpError> {
        match tier {
            AuthTier::None => Ok(()),
            AuthTier::Admin => {
                if presented.is_some_and(|k| constant_time_eq(k, &self.admin_key)) {
                    Ok(())
                } else {
                    Err(HttpError::Unauthorized)
                }
            }
            AuthTier::Required => {
                let matches = presented
                    .is_some_and(|k| constant_time_eq(k, &self.key) || constant_time_eq(k, &self.admin_key));
                if matches {
                    Ok(())
                } else {
                    Err(HttpError::Unauthorized)
                }
            }
        }
    }
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    a.len() == b.len() && a.as_bytes().ct_eq(b.as_bytes()).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys() -> AuthKeys {
        AuthKeys::new("regular-key", "admin-key")
    }

    #[test]
    fn none_tier_accepts_anything() {
        assert!(keys().check(AuthTier::None, None).is_ok());
    }

    #[test]
    fn required_tier_accepts_either_key() {
        let k = keys();
        assert!(k.check(AuthTier::Required, Some("regular-key")).is_ok());
        assert!(k.check(AuthTier::Required, Some("admin-key")).is_ok());
        assert!(k.check(AuthTier::Required, Some("wrong")).is_err());
        assert!(k.check(AuthTier::Required, None).is_err());
    }

    #[test]
    fn admin_tier_rejects_the_regular_key() {
        let k = keys();
        assert!(k.check(AuthTier::Admin, Some("admin-key")).is_ok());
        assert!(k.check(AuthTier::Admin, Some("regular-key")).is_err());
    }
}
