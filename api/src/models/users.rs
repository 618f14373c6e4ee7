//! The structures for authenticated users and their tokens

use utoipa::ToSchema;

/// Every scope a freshly minted token carries
pub const ALL_SCOPES: &[&str] = &[
    "deployers:read",
    "deployers:write",
    "deployments:read",
    "deployments:write",
    "dynamic_policies:read",
    "dynamic_policies:write",
    "networks:read",
    "networks:write",
    "policies:read",
    "policies:write",
    "revisions:read",
    "revisions:write",
    "services:read",
    "services:write",
    "targets:read",
    "targets:write",
    "tests:read",
    "tests:write",
];

/// An authenticated user extracted from a bearer token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct User {
    /// The username this user logged in with
    pub username: String,
    /// The display name from ldap if one was set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    /// The email address from ldap if one was set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// The scopes this users token carries
    #[serde(default)]
    pub scopes: Vec<String>,
}

/// The claim set carried inside minted bearer tokens
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TokenClaims {
    /// The subject of this token
    pub sub: String,
    /// The username this token was minted for
    pub username: String,
    /// The display name from ldap if one was set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    /// The email address from ldap if one was set
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// The scopes this token carries
    #[serde(default)]
    pub scopes: Vec<String>,
    /// When this token expires as a unix timestamp
    pub exp: i64,
}

/// The form posted to the token route
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct TokenForm {
    /// The username to bind as
    pub username: String,
    /// The password to bind with
    pub password: String,
}

/// A freshly minted bearer token
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, ToSchema)]
pub struct AccessToken {
    /// The signed bearer token
    pub access_token: String,
    /// The token type (always "bearer")
    pub token_type: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn claims_round_trip() {
        let claims = TokenClaims {
            sub: "operator".to_owned(),
            username: "operator".to_owned(),
            full_name: Some("Op Erator".to_owned()),
            email: None,
            scopes: ALL_SCOPES.iter().map(|scope| (*scope).to_owned()).collect(),
            exp: 1_900_000_000,
        };
        let raw = serde_json::to_string(&claims).unwrap();
        let parsed: TokenClaims = serde_json::from_str(&raw).unwrap();
        assert_eq!(parsed, claims);
        assert!(parsed.scopes.iter().any(|scope| scope == "policies:write"));
    }
}
