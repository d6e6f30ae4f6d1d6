use crate::{UrlError, UrlResult};
use url::Url;

const FILE_AUTHORITY_PREFIX: &str = "file://";
const FILE_EMPTY_AUTHORITY_PREFIX: &str = "file:///";

/// Normalizes a fetch target before it is handed to the browser
///
/// # Normalization Steps
///
/// 1. Rewrite `file://host/...` to `file:///host/...` so the browser sees an
///    empty authority and an absolute path
/// 2. Parse the URL; reject if malformed
///
/// Every other scheme passes through exactly as parsed.
///
/// # Examples
///
/// ```
/// use sumi_render::url::normalize_target_url;
///
/// let url = normalize_target_url("file://tmp/x.html").unwrap();
/// assert_eq!(url.as_str(), "file:///tmp/x.html");
/// ```
pub fn normalize_target_url(url_str: &str) -> UrlResult<Url> {
    let trimmed = url_str.trim();
    let fixed = fix_file_authority(trimmed);

    let url = Url::parse(&fixed).map_err(|e| UrlError::Parse(format!("{}: {}", trimmed, e)))?;

    if url.cannot_be_a_base() && url.scheme() != "data" && url.scheme() != "about" {
        return Err(UrlError::Malformed(format!(
            "'{}' is not an absolute locator",
            trimmed
        )));
    }

    Ok(url)
}

/// Returns true when the URL uses the `file` scheme
pub fn is_file_url(url: &Url) -> bool {
    url.scheme() == "file"
}

fn fix_file_authority(url_str: &str) -> String {
    let lower = url_str.to_ascii_lowercase();
    if lower.starts_with(FILE_AUTHORITY_PREFIX) && !lower.starts_with(FILE_EMPTY_AUTHORITY_PREFIX)
    {
        format!(
            "{}{}",
            FILE_EMPTY_AUTHORITY_PREFIX,
            &url_str[FILE_AUTHORITY_PREFIX.len()..]
        )
    } else {
        url_str.to_string()
    }
}
