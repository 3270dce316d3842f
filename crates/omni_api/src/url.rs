use url::Url;

use crate::error::OmniApiError;

/// Default base URL of a locally running backend.
pub const DEFAULT_API_BASE_URL: &str = "http://127.0.0.1:8000";

/// Parses a base URL, falling back to [`DEFAULT_API_BASE_URL`] when blank.
///
/// Only `http` and `https` are accepted. A trailing slash is added so that
/// endpoint paths join under any path prefix.
pub fn normalize_base_url(input: &str) -> Result<Url, OmniApiError> {
    let base = if input.trim().is_empty() {
        DEFAULT_API_BASE_URL
    } else {
        input.trim()
    };

    let mut url = Url::parse(base).map_err(|error| OmniApiError::InvalidBaseUrl(format!("{base}: {error}")))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(OmniApiError::InvalidBaseUrl(format!(
            "{base}: scheme must be http or https"
        )));
    }
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url.set_query(None);
    url.set_fragment(None);
    Ok(url)
}

/// Joins an endpoint path such as `brains` or `/execute` onto `base`.
pub fn endpoint_url(base: &Url, path: &str) -> Result<Url, OmniApiError> {
    base.join(path.trim_start_matches('/'))
        .map_err(|error| OmniApiError::InvalidBaseUrl(format!("{base}{path}: {error}")))
}
