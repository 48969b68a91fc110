use url::Url;

/// Join `path` onto `base` and append `params` as query pairs.
///
/// `base` may or may not end with a slash; `path` is treated as relative to it.
pub fn build(base: &str, path: &str, params: &[(&str, &str)]) -> Result<Url, url::ParseError> {
    let mut base = Url::parse(base)?;
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }

    let mut url = base.join(path.trim_start_matches('/'))?;
    if !params.is_empty() {
        let mut pairs = url.query_pairs_mut();
        for (key, value) in params {
            pairs.append_pair(key, value);
        }
    }
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_build_keeps_base_path() {
        let url = build(
            "https://funds.example.com/v1",
            "/funds/rank",
            &[("category", "msci_world"), ("key", "a b")],
        )
        .unwrap();
        assert_eq!(
            url.as_str(),
            "https://funds.example.com/v1/funds/rank?category=msci_world&key=a+b"
        );
    }

    #[test]
    fn test_build_without_params() {
        let url = build("http://localhost:8000/", "api/funds", &[]).unwrap();
        assert_eq!(url.as_str(), "http://localhost:8000/api/funds");
    }

    #[test]
    fn test_invalid_base() {
        assert!(build("not a url", "x", &[]).is_err());
    }
}
