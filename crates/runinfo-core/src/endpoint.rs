//! Endpoints relative to a run page.
//!
//! The socket lives one level above the page (`<page>/../ws`) and downloads
//! are siblings of the page (`./download/<token>`). Everything is derived
//! from the page URL so the client works behind any path prefix.

use url::{Position, Url};

use crate::error::EndpointError;

pub fn parse_page_url(raw: &str) -> Result<Url, EndpointError> {
    Url::parse(raw.trim()).map_err(|err| EndpointError::InvalidUrl {
        url: raw.to_string(),
        message: err.to_string(),
    })
}

/// `ws://` for plain pages, `wss://` for TLS pages.
fn socket_scheme(page: &Url) -> Result<&'static str, EndpointError> {
    match page.scheme() {
        "https" | "wss" => Ok("wss"),
        "http" | "ws" => Ok("ws"),
        other => Err(EndpointError::UnsupportedScheme(other.to_string())),
    }
}

/// WebSocket endpoint for `page`: `<scheme>//<host><path>/../ws`.
pub fn websocket_url(page: &Url) -> Result<Url, EndpointError> {
    let scheme = socket_scheme(page)?;
    if page.host_str().is_none() {
        return Err(EndpointError::MissingHost);
    }
    let authority = &page[Position::BeforeHost..Position::AfterPort];
    let raw = format!("{scheme}://{authority}{}/../ws", page.path());
    Url::parse(&raw).map_err(|err| EndpointError::InvalidUrl {
        url: raw,
        message: err.to_string(),
    })
}

/// Direct download link for a token: `./download/<token>`.
pub fn download_url(page: &Url, token: &str) -> Result<Url, EndpointError> {
    if token.is_empty() || token.contains(['/', '?', '#', '\\']) {
        return Err(EndpointError::InvalidToken(token.to_string()));
    }
    if page.cannot_be_a_base() {
        return Err(EndpointError::CannotBeBase);
    }
    let relative = format!("./download/{token}");
    page.join(&relative)
        .map_err(|err| EndpointError::InvalidUrl {
            url: relative,
            message: err.to_string(),
        })
}

/// Page for another run (or any search term): `./<input>`, percent-encoded.
///
/// An empty input does not navigate.
pub fn search_url(page: &Url, input: &str) -> Result<Option<Url>, EndpointError> {
    if input.is_empty() {
        return Ok(None);
    }
    let mut url = page.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.path_segments_mut()
        .map_err(|()| EndpointError::CannotBeBase)?
        .pop()
        .push(input);
    Ok(Some(url))
}

/// Page of `run` under the data handler's base URL. The base is treated as
/// a directory whether or not it ends in `/`.
pub fn run_page_url(base: &Url, run: u32) -> Result<Url, EndpointError> {
    let mut url = base.clone();
    url.set_query(None);
    url.set_fragment(None);
    url.path_segments_mut()
        .map_err(|()| EndpointError::CannotBeBase)?
        .pop_if_empty()
        .push(&run.to_string());
    Ok(url)
}
