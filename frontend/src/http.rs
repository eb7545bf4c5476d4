// frontend/src/http.rs
//
// JSON over HTTP, one implementation per platform:
// - wasm32: gloo-net (fetch)
// - native: a single reused reqwest Client
//
// Bodies are decoded regardless of status: the SafeIndy backend answers
// failures with a JSON body (`{"success": false, "error": ...}` on 500), and
// those carry the reason we want to surface.

use crate::error::ApiError;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;

const MAX_ERROR_BODY: usize = 300;

#[derive(Debug, Clone)]
pub struct HttpClient {
    #[cfg(not(target_arch = "wasm32"))]
    client: reqwest::Client,
}

pub fn join_url(base: &str, path: &str) -> String {
    let base = base.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}

fn snip(mut s: String, max: usize) -> String {
    s = s.replace('\r', "");
    if s.len() > max {
        let mut cut = max;
        while !s.is_char_boundary(cut) {
            cut -= 1;
        }
        s.truncate(cut);
        s.push('…');
    }
    s
}

fn decode<T: DeserializeOwned>(url: &str, status: u16, bytes: &[u8]) -> Result<T, ApiError> {
    match serde_json::from_slice::<T>(bytes) {
        Ok(v) => Ok(v),
        Err(_) if !(200..300).contains(&status) => Err(ApiError::Status {
            url: url.to_string(),
            status,
            body: snip(String::from_utf8_lossy(bytes).to_string(), MAX_ERROR_BODY),
        }),
        Err(e) => Err(ApiError::Decode {
            url: url.to_string(),
            reason: e.to_string(),
        }),
    }
}

#[cfg(not(target_arch = "wasm32"))]
fn classify_reqwest_error(e: &reqwest::Error) -> String {
    if e.is_timeout() {
        return "timeout".into();
    }
    if e.is_connect() {
        return "connect failed (refused/unreachable/DNS/TLS)".into();
    }
    if e.is_request() {
        return "request build/dispatch error".into();
    }
    if e.is_body() {
        return "body read error".into();
    }
    if e.is_decode() {
        return "decode error".into();
    }

    let mut chain = String::new();
    let mut cur: Option<&(dyn std::error::Error + 'static)> = Some(e);
    while let Some(err) = cur {
        chain.push_str(&format!(" -> {err}"));
        cur = err.source();
    }
    format!("unknown ({chain})")
}

#[cfg(not(target_arch = "wasm32"))]
fn transport(url: &str, e: reqwest::Error) -> ApiError {
    ApiError::Transport {
        url: url.to_string(),
        reason: format!("{e} | kind={}", classify_reqwest_error(&e)),
    }
}

#[cfg(not(target_arch = "wasm32"))]
impl HttpClient {
    pub fn new(timeout: Duration) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::Client(e.to_string()))?;
        Ok(Self { client })
    }

    async fn finish<T: DeserializeOwned>(url: &str, resp: reqwest::Response) -> Result<T, ApiError> {
        let status = resp.status().as_u16();
        let bytes = resp.bytes().await.map_err(|e| transport(url, e))?;
        decode(url, status, &bytes)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let resp = self.client.get(url).send().await.map_err(|e| transport(url, e))?;
        Self::finish(url, resp).await
    }

    pub async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let resp = self
            .client
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| transport(url, e))?;
        Self::finish(url, resp).await
    }

    pub async fn post_empty<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let resp = self.client.post(url).send().await.map_err(|e| transport(url, e))?;
        Self::finish(url, resp).await
    }
}

#[cfg(target_arch = "wasm32")]
fn transport(url: &str, e: gloo_net::Error) -> ApiError {
    ApiError::Transport {
        url: url.to_string(),
        reason: e.to_string(),
    }
}

#[cfg(target_arch = "wasm32")]
impl HttpClient {
    // fetch has no per-request timeout knob; the browser applies its own
    pub fn new(_timeout: Duration) -> Result<Self, ApiError> {
        Ok(Self {})
    }

    async fn finish<T: DeserializeOwned>(url: &str, resp: gloo_net::http::Response) -> Result<T, ApiError> {
        let status = resp.status();
        let bytes = resp.binary().await.map_err(|e| transport(url, e))?;
        decode(url, status, &bytes)
    }

    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        use gloo_net::http::Request;

        let resp = Request::get(url).send().await.map_err(|e| transport(url, e))?;
        Self::finish(url, resp).await
    }

    pub async fn post_json<B, T>(&self, url: &str, body: &B) -> Result<T, ApiError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        use gloo_net::http::Request;

        let resp = Request::post(url)
            .json(body)
            .map_err(|e| transport(url, e))?
            .send()
            .await
            .map_err(|e| transport(url, e))?;
        Self::finish(url, resp).await
    }

    pub async fn post_empty<T: DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        use gloo_net::http::Request;

        let resp = Request::post(url).send().await.map_err(|e| transport(url, e))?;
        Self::finish(url, resp).await
    }
}
