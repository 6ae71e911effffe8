//! URL policy
//!
//! Accepts http(s) URLs with a host. YouTube playlist pages are refused since
//! yt-dlp would enqueue every entry; a watch URL that also carries a playlist
//! is reduced to its `v=` (and `t=`) parameters.

use ::url::Url;

use crate::error::ValidationError;

/// Query parameters that survive playlist stripping.
const KEPT_PARAMS: &[&str] = &["v", "t"];

/// Validate and canonicalize a submitted URL.
///
/// # Errors
///
/// - [`ValidationError::MissingUrl`] for an empty or blank string
/// - [`ValidationError::InvalidUrl`] for unparsable, non-http(s) or host-less URLs
/// - [`ValidationError::PlaylistNotAllowed`] for playlist-shaped YouTube URLs
pub fn normalize_url(raw: &str) -> Result<String, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::MissingUrl);
    }

    let mut url = Url::parse(raw).map_err(|_| ValidationError::InvalidUrl)?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ValidationError::InvalidUrl);
    }
    if url.host_str().map(str::is_empty).unwrap_or(true) {
        return Err(ValidationError::InvalidUrl);
    }

    if is_playlist(&url) {
        return Err(ValidationError::PlaylistNotAllowed);
    }

    if is_youtube(&url) && has_param(&url, "list") {
        let kept: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| KEPT_PARAMS.contains(&k.as_ref()))
            .map(|(k, v)| (k.into_owned(), v.into_owned()))
            .collect();
        if kept.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(kept);
        }
    }

    Ok(url.to_string())
}

fn is_youtube_host(host: &str) -> bool {
    let h = host.trim_end_matches('.').to_ascii_lowercase();
    h == "youtube.com"
        || h.ends_with(".youtube.com")
        || h == "youtu.be"
        || h == "youtube-nocookie.com"
        || h.ends_with(".youtube-nocookie.com")
}

/// The shape the browser popup auto-fills from the active tab:
/// `https://(www.)youtube.com/watch?v=...`.
pub fn is_youtube_watch_url(raw: &str) -> bool {
    let Ok(u) = Url::parse(raw.trim()) else {
        return false;
    };
    let host_ok = matches!(u.host_str(), Some("www.youtube.com") | Some("youtube.com"));
    host_ok && u.path() == "/watch" && has_param(&u, "v")
}

fn is_youtube(url: &Url) -> bool {
    url.host_str().map(is_youtube_host).unwrap_or(false)
}

fn is_playlist(url: &Url) -> bool {
    if !is_youtube(url) {
        return false;
    }
    if url.path().contains("/playlist") {
        return true;
    }
    has_param(url, "list") && !has_param(url, "v") && !is_short_link(url)
}

/// `youtu.be/<id>` carries the video id in the path.
fn is_short_link(url: &Url) -> bool {
    url.host_str()
        .map(|h| h.eq_ignore_ascii_case("youtu.be"))
        .unwrap_or(false)
        && !url.path().trim_matches('/').is_empty()
}

fn has_param(url: &Url, key: &str) -> bool {
    url.query_pairs().any(|(k, _)| k == key)
}
