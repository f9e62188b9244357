//! Organization-id recovery from access-token claims.
//!
//! The token is *decoded*, never verified — there is no signature check and
//! no issuer validation. That is acceptable only because the id is used to
//! key this demo's in-memory session map; anything beyond a demo must verify
//! signatures against the platform's JWKS instead.
//!
//! The claims contract is unspecified, so this is a best-effort search over
//! the shapes the platform has been observed to emit.

use base64::Engine as _;
use serde_json::Value;

/// Extract an organization id from a JWT access token, or `None` if the
/// token is not a three-segment JWT or carries no recognizable claim.
///
/// Priority order: `org_id`, `organization_id`, `legion:org_id`,
/// `orgs[0].organization_id`, `organizations[0].id`, then the prefix of the
/// first `scope` token shaped like `{org_id}:::{scope_name}`.
pub fn decode_organization_id(access_token: &str) -> Option<String> {
    let parts: Vec<&str> = access_token.split('.').collect();
    if parts.len() != 3 {
        return None;
    }

    let payload_bytes = base64::engine::general_purpose::URL_SAFE_NO_PAD
        .decode(parts[1])
        .ok()?;
    let claims: Value = serde_json::from_slice(&payload_bytes).ok()?;

    direct_claim(&claims, "org_id")
        .or_else(|| direct_claim(&claims, "organization_id"))
        .or_else(|| direct_claim(&claims, "legion:org_id"))
        .or_else(|| nested_claim(&claims, "orgs", "organization_id"))
        .or_else(|| nested_claim(&claims, "organizations", "id"))
        .or_else(|| scope_prefix(&claims))
}

fn direct_claim(claims: &Value, key: &str) -> Option<String> {
    claims
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// First element of an array claim, by inner key.
fn nested_claim(claims: &Value, array_key: &str, inner_key: &str) -> Option<String> {
    claims
        .get(array_key)?
        .as_array()?
        .first()?
        .get(inner_key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Scopes of the form `{org_id}:::{scope_name}`, space-delimited; the first
/// matching token's prefix wins.
fn scope_prefix(claims: &Value) -> Option<String> {
    let scope = claims.get("scope")?.as_str()?;
    scope
        .split_whitespace()
        .find_map(|token| token.split_once(":::"))
        .map(|(org_id, _)| org_id.to_string())
        .filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Build an unsigned JWT with the given payload claims.
    fn token_with(claims: Value) -> String {
        let encode = |v: &Value| {
            base64::engine::general_purpose::URL_SAFE_NO_PAD.encode(v.to_string())
        };
        let header = json!({"alg": "RS256", "typ": "JWT"});
        format!("{}.{}.sig", encode(&header), encode(&claims))
    }

    #[test]
    fn test_org_id_claim_wins() {
        let token = token_with(json!({
            "org_id": "org-direct",
            "organization_id": "org-alt",
            "legion:org_id": "org-namespaced",
        }));
        assert_eq!(decode_organization_id(&token).as_deref(), Some("org-direct"));
    }

    #[test]
    fn test_fallback_order() {
        let token = token_with(json!({"organization_id": "org-alt"}));
        assert_eq!(decode_organization_id(&token).as_deref(), Some("org-alt"));

        let token = token_with(json!({"legion:org_id": "org-namespaced"}));
        assert_eq!(
            decode_organization_id(&token).as_deref(),
            Some("org-namespaced")
        );
    }

    #[test]
    fn test_array_claims() {
        let token = token_with(json!({
            "orgs": [{"organization_id": "org-from-orgs"}, {"organization_id": "org-second"}],
        }));
        assert_eq!(
            decode_organization_id(&token).as_deref(),
            Some("org-from-orgs")
        );

        let token = token_with(json!({
            "organizations": [{"id": "org-from-organizations"}],
        }));
        assert_eq!(
            decode_organization_id(&token).as_deref(),
            Some("org-from-organizations")
        );
    }

    #[test]
    fn test_scope_prefix_extraction() {
        let token = token_with(json!({
            "sub": "user-1",
            "scope": "openid org-42:::entities.read org-42:::feeds.write",
        }));
        assert_eq!(decode_organization_id(&token).as_deref(), Some("org-42"));
    }

    #[test]
    fn test_no_recognizable_claim() {
        let token = token_with(json!({"sub": "user-1", "scope": "openid profile"}));
        assert_eq!(decode_organization_id(&token), None);
    }

    #[test]
    fn test_rejects_non_jwt_shapes() {
        assert_eq!(decode_organization_id("opaque-token"), None);
        assert_eq!(decode_organization_id("a.b"), None);
        assert_eq!(decode_organization_id("not.base64!.payload"), None);
    }
}
