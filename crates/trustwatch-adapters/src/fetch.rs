// crates/trustwatch-adapters/src/fetch.rs
// ============================================================================
// Module: Fetch Adapter
// Description: Demo and real implementations of FetchAdapter (§4.3).
// Purpose: Retrieve a canonicalised, plain-text representation of a target
//          URL for claim-text diffing, without exposing the crawler to
//          server-side request forgery against internal network addresses.
// Dependencies: reqwest, scraper, trustwatch-core
// ============================================================================

//! ## Overview
//! [`HttpFetchAdapter`] issues a single pinned-DNS GET request per call and
//! strips the response down to visible text with [`scraper`]. It refuses
//! redirects, rejects private/link-local/loopback targets, and caps response
//! size, mirroring the SSRF posture of a provider that must treat the open
//! web as untrusted input. [`DemoFetchAdapter`] serves a fixed, in-process
//! table of canned pages so the crawl pipeline can be exercised without
//! network access.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::io::Read;
use std::net::IpAddr;
use std::net::SocketAddr;
use std::net::ToSocketAddrs;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Url;
use reqwest::blocking::Client;
use reqwest::redirect::Policy;
use scraper::Html;
use scraper::Selector;
use trustwatch_core::interfaces::FetchAdapter;
use trustwatch_core::interfaces::FetchError;
use trustwatch_core::interfaces::FetchMetadata;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Configuration for [`HttpFetchAdapter`].
///
/// # Invariants
/// - `allow_http = false` blocks cleartext `http://` URLs.
/// - `max_response_bytes` is a hard upper bound on response bodies.
/// - `allow_private_networks = false` blocks private/link-local/loopback
///   targets, closing the SSRF window a naive fetcher would leave open.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchClientConfig {
    /// Allow cleartext HTTP (disabled by default).
    pub allow_http: bool,
    /// Request timeout in milliseconds.
    pub timeout_ms: u64,
    /// Maximum response size allowed, in bytes.
    pub max_response_bytes: usize,
    /// Allow requests to private/link-local/loopback addresses.
    pub allow_private_networks: bool,
    /// User agent string for outbound requests.
    pub user_agent: String,
}

impl Default for FetchClientConfig {
    fn default() -> Self {
        Self {
            allow_http: false,
            timeout_ms: 20_000,
            max_response_bytes: 4 * 1024 * 1024,
            allow_private_networks: false,
            user_agent: "trustwatch-crawler/0.1".to_string(),
        }
    }
}

// ============================================================================
// SECTION: Real Adapter
// ============================================================================

/// Fetches pages over HTTPS with DNS-pinned, SSRF-safe requests.
///
/// # Invariants
/// - Redirects are never followed; a redirect response is treated as a
///   transport failure so the caller sees the URL it asked for, not wherever
///   the server wanted to send it.
/// - Every candidate IP for a resolved hostname is policy-checked before use.
pub struct HttpFetchAdapter {
    /// Adapter configuration, including limits and policy.
    config: FetchClientConfig,
    /// HTTP client used for outbound requests that need no DNS pinning.
    client: Client,
}

impl HttpFetchAdapter {
    /// Creates a new fetch adapter with the given configuration.
    ///
    /// # Errors
    /// Returns [`FetchError`] when the HTTP client cannot be constructed.
    pub fn new(config: FetchClientConfig) -> Result<Self, FetchError> {
        let client = build_http_client(&config, None, "<init>")?;
        Ok(Self { config, client })
    }

    fn send_pinned_request(&self, url: &Url, resolved: &ResolvedHost) -> Result<reqwest::blocking::Response, FetchError> {
        let mut last_error: Option<FetchError> = None;
        for ip in &resolved.ips {
            let client = match self.client_for_ip(resolved, *ip, url.as_str()) {
                Ok(client) => client,
                Err(err) => {
                    last_error = Some(err);
                    continue;
                }
            };
            let Ok(response) = client.get(url.as_str()).send() else {
                last_error = Some(FetchError::Transport {
                    url: url.to_string(),
                    message: "request failed".to_string(),
                });
                continue;
            };
            if response.url() != url {
                return Err(FetchError::Transport {
                    url: url.to_string(),
                    message: "redirect not allowed".to_string(),
                });
            }
            enforce_ip_policy(*ip, self.config.allow_private_networks, url.as_str())?;
            return Ok(response);
        }
        Err(last_error.unwrap_or_else(|| FetchError::Transport {
            url: url.to_string(),
            message: "no reachable address".to_string(),
        }))
    }

    fn client_for_ip(&self, resolved: &ResolvedHost, ip: IpAddr, url: &str) -> Result<Client, FetchError> {
        if !resolved.is_domain {
            return Ok(self.client.clone());
        }
        let socket_addr = SocketAddr::new(ip, resolved.port);
        build_http_client(&self.config, Some((&resolved.host, socket_addr)), url)
    }

    /// Issues a pinned, policy-checked GET and returns the raw response body.
    ///
    /// Shared by the text-fetch path and [`crate::pdf::HttpPdfParseAdapter`],
    /// which needs the same SSRF-safe plumbing but raw bytes rather than
    /// extracted text.
    ///
    /// # Errors
    /// Returns [`FetchError`] on an invalid URL, policy rejection, transport
    /// failure, or non-success HTTP status.
    pub fn fetch_bytes(&self, url: &str) -> Result<(Vec<u8>, FetchMetadata), FetchError> {
        let parsed = Url::parse(url).map_err(|_| FetchError::Transport {
            url: url.to_string(),
            message: "invalid url".to_string(),
        })?;
        validate_url(&parsed, self.config.allow_http, url)?;
        let resolved = resolve_request_host(&parsed, self.config.allow_private_networks, url)?;
        let response = self.send_pinned_request(&parsed, &resolved)?;
        let status = response.status();
        let content_type =
            response.headers().get(reqwest::header::CONTENT_TYPE).and_then(|value| value.to_str().ok()).map(str::to_string);
        if !status.is_success() {
            return Err(FetchError::HttpStatus { url: url.to_string(), status: status.as_u16() });
        }
        let mut response = response;
        let body = read_response_limited(&mut response, self.config.max_response_bytes, url)?;
        Ok((body, FetchMetadata { status_code: Some(status.as_u16()), content_type }))
    }
}

#[async_trait]
impl FetchAdapter for HttpFetchAdapter {
    async fn fetch(&self, url: &str) -> Result<(String, FetchMetadata), FetchError> {
        let (body, metadata) = self.fetch_bytes(url)?;
        let body_text = String::from_utf8_lossy(&body).into_owned();
        let text = extract_visible_text(&body_text);
        Ok((text, metadata))
    }
}

/// Strips markup down to visible text, dropping script and style content.
fn extract_visible_text(html: &str) -> String {
    let document = Html::parse_document(html);
    let Ok(skip_selector) = Selector::parse("script, style, noscript") else {
        return html.to_string();
    };
    let skipped: std::collections::HashSet<_> =
        document.select(&skip_selector).flat_map(|el| el.descendants().map(|node| node.id())).collect();
    let mut text = String::new();
    for node in document.root_element().descendants() {
        if skipped.contains(&node.id()) {
            continue;
        }
        if let Some(fragment) = node.value().as_text() {
            let trimmed = fragment.trim();
            if !trimmed.is_empty() {
                if !text.is_empty() {
                    text.push(' ');
                }
                text.push_str(trimmed);
            }
        }
    }
    text
}

// ============================================================================
// SECTION: Demo Adapter
// ============================================================================

/// Serves canned page text keyed by URL, for `demo_mode = true` runs.
///
/// # Invariants
/// - Unseeded URLs yield deterministic placeholder text rather than an
///   error, so a demo crawl run always completes.
#[derive(Debug, Clone, Default)]
pub struct DemoFetchAdapter {
    /// Canned URL to page-text table.
    pages: BTreeMap<String, String>,
}

impl DemoFetchAdapter {
    /// Creates an empty demo adapter; every URL yields placeholder text.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers canned text for a URL.
    #[must_use]
    pub fn with_page(mut self, url: impl Into<String>, text: impl Into<String>) -> Self {
        self.pages.insert(url.into(), text.into());
        self
    }
}

#[async_trait]
impl FetchAdapter for DemoFetchAdapter {
    async fn fetch(&self, url: &str) -> Result<(String, FetchMetadata), FetchError> {
        let text = self.pages.get(url).cloned().unwrap_or_else(|| format!("demo placeholder content for {url}"));
        Ok((text, FetchMetadata { status_code: Some(200), content_type: Some("text/html".to_string()) }))
    }
}

// ============================================================================
// SECTION: SSRF-safe request plumbing
// ============================================================================

/// Resolved host metadata for pinned outbound requests.
struct ResolvedHost {
    /// Host string as it appears in the URL, bracket-stripped for IPv6.
    host: String,
    /// Effective request port.
    port: u16,
    /// Resolved candidate peer IPs, deduplicated.
    ips: Vec<IpAddr>,
    /// True when host represents a DNS domain name rather than a literal IP.
    is_domain: bool,
}

fn validate_url(url: &Url, allow_http: bool, original: &str) -> Result<(), FetchError> {
    match url.scheme() {
        "https" => {}
        "http" if allow_http => {}
        _ => {
            return Err(FetchError::Transport { url: original.to_string(), message: "unsupported url scheme".to_string() });
        }
    }
    if !url.username().is_empty() || url.password().is_some() {
        return Err(FetchError::Transport { url: original.to_string(), message: "url credentials are not allowed".to_string() });
    }
    Ok(())
}

fn resolve_request_host(url: &Url, allow_private_networks: bool, original: &str) -> Result<ResolvedHost, FetchError> {
    let host = url.host_str().ok_or_else(|| FetchError::Transport { url: original.to_string(), message: "url host required".to_string() })?;
    let host_for_resolution = host.strip_prefix('[').and_then(|inner| inner.strip_suffix(']')).unwrap_or(host);
    let port = url
        .port_or_known_default()
        .ok_or_else(|| FetchError::Transport { url: original.to_string(), message: "url port required".to_string() })?;
    let mut ips = resolve_host_ips(host_for_resolution, port, original)?;
    if ips.is_empty() {
        return Err(FetchError::Transport { url: original.to_string(), message: "url host has no resolved addresses".to_string() });
    }
    for ip in &ips {
        enforce_ip_policy(*ip, allow_private_networks, original)?;
    }
    dedupe_ips(&mut ips);
    Ok(ResolvedHost {
        host: host_for_resolution.to_string(),
        port,
        ips,
        is_domain: host_for_resolution.parse::<IpAddr>().is_err(),
    })
}

fn build_http_client(config: &FetchClientConfig, resolve: Option<(&str, SocketAddr)>, url: &str) -> Result<Client, FetchError> {
    let mut builder =
        Client::builder().timeout(Duration::from_millis(config.timeout_ms)).user_agent(config.user_agent.clone()).redirect(Policy::none());
    if let Some((host, socket_addr)) = resolve {
        builder = builder.resolve(host, socket_addr);
    }
    builder.build().map_err(|_| FetchError::Transport { url: url.to_string(), message: "http client build failed".to_string() })
}

fn resolve_host_ips(host: &str, port: u16, url: &str) -> Result<Vec<IpAddr>, FetchError> {
    if let Ok(ip) = host.parse::<IpAddr>() {
        return Ok(vec![ip]);
    }
    (host, port)
        .to_socket_addrs()
        .map(|iter| iter.map(|addr| addr.ip()).collect::<Vec<IpAddr>>())
        .map_err(|_| FetchError::Transport { url: url.to_string(), message: "url host resolution failed".to_string() })
}

fn enforce_ip_policy(ip: IpAddr, allow_private_networks: bool, url: &str) -> Result<(), FetchError> {
    if allow_private_networks {
        return Ok(());
    }
    if is_private_or_link_local(&ip) {
        return Err(FetchError::Transport { url: url.to_string(), message: "url resolves to a private or link-local address".to_string() });
    }
    Ok(())
}

#[allow(clippy::option_if_let_else, reason = "Option::map_or is not const-callable on current toolchain.")]
const fn is_private_or_link_local(ip: &IpAddr) -> bool {
    match ip {
        IpAddr::V4(addr) => {
            addr.is_private() || addr.is_loopback() || addr.is_link_local() || addr.is_unspecified() || addr.is_multicast() || addr.is_broadcast()
        }
        IpAddr::V6(addr) => {
            let mapped_private = if let Some(mapped) = addr.to_ipv4_mapped() {
                mapped.is_private() || mapped.is_loopback() || mapped.is_link_local() || mapped.is_unspecified() || mapped.is_multicast() || mapped.is_broadcast()
            } else {
                false
            };
            mapped_private || addr.is_loopback() || addr.is_unique_local() || addr.is_unicast_link_local() || addr.is_unspecified() || addr.is_multicast()
        }
    }
}

fn dedupe_ips(ips: &mut Vec<IpAddr>) {
    let mut unique = Vec::with_capacity(ips.len());
    for ip in ips.drain(..) {
        if !unique.contains(&ip) {
            unique.push(ip);
        }
    }
    *ips = unique;
}

fn read_response_limited(response: &mut reqwest::blocking::Response, max_bytes: usize, url: &str) -> Result<Vec<u8>, FetchError> {
    let expected_len = response.content_length();
    let max_bytes_u64 = u64::try_from(max_bytes).unwrap_or(u64::MAX);
    if let Some(expected) = expected_len
        && expected > max_bytes_u64
    {
        return Err(FetchError::Transport { url: url.to_string(), message: "response exceeds size limit".to_string() });
    }
    let mut buf = Vec::new();
    let limit = max_bytes_u64.saturating_add(1);
    let mut handle = response.take(limit);
    handle.read_to_end(&mut buf).map_err(|_| FetchError::Transport { url: url.to_string(), message: "failed to read response".to_string() })?;
    if buf.len() > max_bytes {
        return Err(FetchError::Transport { url: url.to_string(), message: "response exceeds size limit".to_string() });
    }
    Ok(buf)
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "Test-only assertions are permitted.")]
mod tests {
    use std::net::Ipv4Addr;
    use std::net::Ipv6Addr;

    use super::*;

    #[test]
    fn private_and_loopback_v4_addresses_are_blocked() {
        assert!(is_private_or_link_local(&IpAddr::V4(Ipv4Addr::new(10, 0, 0, 1))));
        assert!(is_private_or_link_local(&IpAddr::V4(Ipv4Addr::LOCALHOST)));
        assert!(is_private_or_link_local(&IpAddr::V4(Ipv4Addr::new(169, 254, 1, 1))));
    }

    #[test]
    fn public_v4_address_is_allowed() {
        assert!(!is_private_or_link_local(&IpAddr::V4(Ipv4Addr::new(93, 184, 216, 34))));
    }

    #[test]
    fn ipv4_mapped_private_v6_address_is_blocked() {
        let mapped = Ipv6Addr::new(0, 0, 0, 0, 0, 0xffff, 0x0a00, 0x0001);
        assert!(is_private_or_link_local(&IpAddr::V6(mapped)));
    }

    #[test]
    fn extract_visible_text_drops_script_and_style() {
        let html = "<html><head><style>.a{}</style></head><body><script>evil()</script><p>Hello world</p></body></html>";
        let text = extract_visible_text(html);
        assert_eq!(text, "Hello world");
    }

    #[tokio::test]
    async fn demo_adapter_returns_seeded_page() {
        let adapter = DemoFetchAdapter::new().with_page("https://acme.example/trust", "We are SOC 2 certified.");
        let (text, meta) = adapter.fetch("https://acme.example/trust").await.unwrap();
        assert_eq!(text, "We are SOC 2 certified.");
        assert_eq!(meta.status_code, Some(200));
    }

    #[tokio::test]
    async fn demo_adapter_falls_back_to_placeholder_for_unseeded_url() {
        let adapter = DemoFetchAdapter::new();
        let (text, _meta) = adapter.fetch("https://acme.example/unknown").await.unwrap();
        assert!(text.contains("https://acme.example/unknown"));
    }
}
