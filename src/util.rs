use crate::error::{Error, Result};
use reqwest::Url;

/// Pull the authorization code out of what the user pasted: either the bare
/// code or the full redirect URL (`http://localhost/?state=..&code=..`).
pub fn extract_code(input: &str, expected_state: &str) -> Result<String> {
    let input = input.trim();
    if input.is_empty() {
        return Err(Error::AuthorizationCode("empty input".into()));
    }

    let url = Url::parse(input).ok().or_else(|| {
        // A pasted query string without scheme and host
        input
            .contains("code=")
            .then(|| Url::parse(&format!("http://localhost/?{}", input.trim_start_matches('?'))).ok())
            .flatten()
    });

    let Some(url) = url else {
        return Ok(input.to_string());
    };

    let mut code = None;
    let mut state = None;
    for (key, value) in url.query_pairs() {
        match key.as_ref() {
            "code" => code = Some(value.into_owned()),
            "state" => state = Some(value.into_owned()),
            "error" => {
                return Err(Error::AuthorizationCode(format!(
                    "authorization denied: {value}"
                )));
            }
            _ => {}
        }
    }

    if let Some(state) = state
        && state != expected_state
    {
        return Err(Error::AuthorizationCode(format!(
            "state mismatch: expected {expected_state}, got {state}"
        )));
    }

    code.filter(|c| !c.is_empty())
        .ok_or_else(|| Error::AuthorizationCode(format!("no code found in {url}")))
}

/// Mask a secret for log output: first 4 chars, then `***`.
pub fn mask_token(token: &str) -> String {
    match token.char_indices().nth(4) {
        Some((idx, _)) => format!("{}***", &token[..idx]),
        None => "***".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_bare_code() {
        let code = extract_code("  4/0AbCdEf-123\n", "state-token").unwrap();
        assert_eq!(code, "4/0AbCdEf-123");
    }

    #[test]
    fn test_extract_from_redirect_url() {
        let code = extract_code(
            "http://localhost/?state=state-token&code=4/0AbC&scope=https://mail.google.com/",
            "state-token",
        )
        .unwrap();
        assert_eq!(code, "4/0AbC");
    }

    #[test]
    fn test_extract_percent_encoded_code() {
        let code = extract_code("http://localhost/?code=4%2F0AbC", "state-token").unwrap();
        assert_eq!(code, "4/0AbC");
    }

    #[test]
    fn test_extract_from_query_string() {
        let code = extract_code("?code=abc&state=state-token", "state-token").unwrap();
        assert_eq!(code, "abc");
    }

    #[test]
    fn test_extract_state_mismatch() {
        let err = extract_code("http://localhost/?code=abc&state=forged", "state-token");
        assert!(err.is_err());
    }

    #[test]
    fn test_extract_access_denied() {
        let err = extract_code("http://localhost/?error=access_denied", "state-token").unwrap_err();
        assert!(err.to_string().contains("access_denied"));
    }

    #[test]
    fn test_extract_url_without_code() {
        assert!(extract_code("http://localhost/", "state-token").is_err());
    }

    #[test]
    fn test_extract_empty() {
        assert!(extract_code("   \n", "state-token").is_err());
    }

    #[test]
    fn test_mask_token() {
        assert_eq!(mask_token("ya29.a0AfH6"), "ya29***");
        assert_eq!(mask_token("abcd"), "***");
        assert_eq!(mask_token(""), "***");
    }
}
