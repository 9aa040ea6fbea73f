use std::collections::HashMap;

/// Pull a bearer token out of an `Authorization` header, tolerating
/// case-variance in both the header name and the `Bearer` scheme.
pub fn extract_bearer_token(headers: &HashMap<String, String>) -> Option<String> {
    let value = headers
        .get("authorization")
        .or_else(|| headers.get("Authorization"))?
        .trim();
    if value.is_empty() {
        return None;
    }
    let (scheme, token) = value.split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn extracts_token_case_insensitively() {
        assert_eq!(
            extract_bearer_token(&headers(&[("authorization", "bearer abc123")])),
            Some("abc123".to_string())
        );
        assert_eq!(
            extract_bearer_token(&headers(&[("Authorization", "Bearer abc123")])),
            Some("abc123".to_string())
        );
    }

    #[test]
    fn rejects_non_bearer_scheme() {
        assert_eq!(extract_bearer_token(&headers(&[("authorization", "Basic abc123")])), None);
    }

    #[test]
    fn rejects_missing_header() {
        assert_eq!(extract_bearer_token(&headers(&[])), None);
    }

    #[test]
    fn rejects_empty_token() {
        assert_eq!(extract_bearer_token(&headers(&[("authorization", "Bearer   ")])), None);
    }
}
