//! Turning request image fields into encoded image bytes.

use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use tracing::{debug, info};

use crate::{
    config::FetchConfig,
    error::{CompositorError, DecodeError, Result},
    video::decode_base64,
};

/// Where one input image comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageInput<'a> {
    /// Base64 text, optionally a `data:` URL
    Inline(&'a str),
    /// An `http(s)://` address to download
    Remote(&'a str),
}

impl<'a> ImageInput<'a> {
    /// Choose between the inline field and its `_url` companion
    ///
    /// The inline field wins when both are set. An inline value that is an
    /// `http(s)://` address is downloaded, and a `data:` URL in the `_url`
    /// field is decoded in place. Blank values count as absent.
    pub fn select(inline: Option<&'a str>, url: Option<&'a str>) -> Option<Self> {
        let value = non_blank(inline).or_else(|| non_blank(url))?;
        if is_http_url(value) {
            Some(Self::Remote(value))
        } else {
            Some(Self::Inline(value))
        }
    }

    /// Encoded image bytes for `field`
    pub fn load(&self, field: &str, fetch: &FetchConfig) -> Result<Vec<u8>> {
        match *self {
            Self::Inline(text) => decode_base64(field, text),
            Self::Remote(url) => fetch_image(field, url, fetch),
        }
    }
}

fn non_blank(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

fn is_http_url(value: &str) -> bool {
    let lower = value.get(..8).unwrap_or(value).to_ascii_lowercase();
    lower.starts_with("http://") || lower.starts_with("https://")
}

/// Download an image over HTTP(S)
///
/// Anything but a 2xx `image/*` response no larger than `max_bytes` is a
/// [`DecodeError::FetchFailed`].
pub fn fetch_image(field: &str, url: &str, config: &FetchConfig) -> Result<Vec<u8>> {
    let failed = |reason: String| -> CompositorError {
        DecodeError::FetchFailed {
            field: field.to_string(),
            url: url.to_string(),
            reason,
        }
        .into()
    };

    if !is_http_url(url) {
        return Err(failed("only http and https URLs are supported".to_string()));
    }

    info!("Fetching {} from {}", field, url);

    let client = Client::builder()
        .timeout(Duration::from_secs(config.timeout_secs))
        .user_agent(config.user_agent.clone())
        .build()
        .map_err(|e| failed(format!("HTTP client setup failed: {e}")))?;

    let response = client
        .get(url)
        .header(ACCEPT, "image/*")
        .send()
        .map_err(|e| failed(e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        return Err(failed(format!("server answered {status}")));
    }

    let content_type = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_ascii_lowercase();
    if !content_type.starts_with("image/") {
        return Err(failed(format!("unexpected content type '{content_type}'")));
    }

    if let Some(length) = response.content_length() {
        if length > config.max_bytes {
            return Err(failed(format!(
                "image is {length} bytes, limit is {}",
                config.max_bytes
            )));
        }
    }

    let mut bytes = Vec::new();
    response
        .take(config.max_bytes + 1)
        .read_to_end(&mut bytes)
        .map_err(|e| failed(format!("reading body failed: {e}")))?;
    if bytes.len() as u64 > config.max_bytes {
        return Err(failed(format!(
            "image exceeds the {} byte limit",
            config.max_bytes
        )));
    }

    debug!("Fetched {} bytes for {}", bytes.len(), field);
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::net::TcpListener;
    use std::thread;

    /// Answer a single HTTP request on a loopback port with `response`
    fn serve_once(response: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let addr = listener.local_addr().unwrap();
        thread::spawn(move || {
            if let Ok((mut stream, _)) = listener.accept() {
                let mut request = [0u8; 4096];
                let _ = stream.read(&mut request);
                let _ = stream.write_all(&response);
            }
        });
        format!("http://{}/face.png", addr)
    }

    fn http_response(status: &str, content_type: &str, body: &[u8]) -> Vec<u8> {
        let mut response = format!(
            "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
            body.len()
        )
        .into_bytes();
        response.extend_from_slice(body);
        response
    }

    fn fetch_reason(err: CompositorError) -> String {
        match err {
            CompositorError::Decode(DecodeError::FetchFailed { reason, .. }) => reason,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_select_prefers_inline_and_skips_blank() {
        assert_eq!(ImageInput::select(None, None), None);
        assert_eq!(ImageInput::select(Some("  "), Some("")), None);
        assert_eq!(
            ImageInput::select(Some("aGVsbG8="), Some("https://a/b.png")),
            Some(ImageInput::Inline("aGVsbG8="))
        );
        assert_eq!(
            ImageInput::select(Some(""), Some("https://a/b.png")),
            Some(ImageInput::Remote("https://a/b.png"))
        );
        assert_eq!(
            ImageInput::select(Some("HTTP://a/b.png"), None),
            Some(ImageInput::Remote("HTTP://a/b.png"))
        );
        assert_eq!(
            ImageInput::select(None, Some("data:image/png;base64,aGVsbG8=")),
            Some(ImageInput::Inline("data:image/png;base64,aGVsbG8="))
        );
    }

    #[test]
    fn test_fetch_image() {
        let url = serve_once(http_response("200 OK", "image/png", b"pngbytes"));
        let bytes = ImageInput::Remote(&url)
            .load("source_image", &FetchConfig::default())
            .unwrap();
        assert_eq!(bytes, b"pngbytes");
    }

    #[test]
    fn test_http_error_is_decode_error() {
        let url = serve_once(http_response("404 Not Found", "text/plain", b"missing"));
        let reason = fetch_reason(fetch_image("target_image", &url, &FetchConfig::default()).unwrap_err());
        assert!(reason.contains("404"), "{reason}");
    }

    #[test]
    fn test_non_image_content_is_rejected() {
        let url = serve_once(http_response("200 OK", "text/html", b"<html></html>"));
        let reason = fetch_reason(fetch_image("source_image", &url, &FetchConfig::default()).unwrap_err());
        assert!(reason.contains("text/html"), "{reason}");
    }

    #[test]
    fn test_oversized_image_is_rejected() {
        let url = serve_once(http_response("200 OK", "image/jpeg", &[0u8; 64]));
        let config = FetchConfig {
            max_bytes: 16,
            ..FetchConfig::default()
        };
        let reason = fetch_reason(fetch_image("source_image", &url, &config).unwrap_err());
        assert!(reason.contains("16"), "{reason}");
    }

    #[test]
    fn test_unreachable_host_is_decode_error() {
        let addr = TcpListener::bind("127.0.0.1:0")
            .unwrap()
            .local_addr()
            .unwrap();
        let url = format!("http://{}/gone.png", addr);

        let err = fetch_image("source_image", &url, &FetchConfig::default()).unwrap_err();
        assert_eq!(err.kind(), "decode_error");
    }

    #[test]
    fn test_other_schemes_are_rejected() {
        let err = fetch_image("source_image", "ftp://host/a.png", &FetchConfig::default()).unwrap_err();
        assert!(fetch_reason(err).contains("http"));
    }
}
