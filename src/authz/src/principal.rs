//! Authenticated caller of a command

use serde_json::{Map, Value};

/// Who issued a command, as seen by the authorization engine
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Principal {
    /// Authenticated username
    pub username: Option<String>,

    /// Authenticated client id (machine-to-machine)
    pub client_id: Option<String>,

    /// The gateway claimed anonymous access
    pub anonymous: bool,

    /// The command was issued by the engine itself
    pub internal: bool,

    /// Raw token claims used to match mapping rules
    pub claims: Map<String, Value>,

    /// Group memberships asserted by the identity provider
    pub group_claims: Option<Vec<String>>,
}

impl Principal {
    pub fn user(username: impl Into<String>) -> Self {
        Self {
            username: Some(username.into()),
            ..Self::default()
        }
    }

    pub fn client(client_id: impl Into<String>) -> Self {
        Self {
            client_id: Some(client_id.into()),
            ..Self::default()
        }
    }

    pub fn anonymous() -> Self {
        Self {
            anonymous: true,
            ..Self::default()
        }
    }

    /// Engine-issued commands, which bypass authorization
    pub fn internal() -> Self {
        Self {
            internal: true,
            ..Self::default()
        }
    }

    /// Principal known only through its token claims
    pub fn with_claims(claims: Map<String, Value>) -> Self {
        Self {
            claims,
            ..Self::default()
        }
    }

    pub fn with_claim(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.claims.insert(name.into(), value.into());
        self
    }

    pub fn with_group_claims(mut self, groups: Vec<String>) -> Self {
        self.group_claims = Some(groups);
        self
    }

    /// Anonymous access applies only when no identity claim contradicts it
    pub fn is_anonymous(&self) -> bool {
        self.anonymous && self.username.is_none() && self.client_id.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_anonymous_is_overridden_by_identity() {
        assert!(Principal::anonymous().is_anonymous());

        let mut principal = Principal::anonymous();
        principal.username = Some("foo".into());
        assert!(!principal.is_anonymous());
    }

    #[test]
    fn test_claim_builder() {
        let principal = Principal::user("foo").with_claim("department", "sales");
        assert_eq!(principal.claims.get("department"), Some(&Value::from("sales")));
    }
}
