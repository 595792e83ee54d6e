// src/services/fetcher.rs

//! Raw upstream fetcher.
//!
//! Issues the two kinds of upstream requests and hands back the body text.
//! No parsing happens here.

use async_trait::async_trait;
use reqwest::Client;

use crate::error::Result;
use crate::models::UpstreamConfig;
use crate::utils::http;

/// Query or form parameters, in send order.
pub type Params = Vec<(&'static str, String)>;

/// Source of raw upstream payloads.
#[async_trait]
pub trait Upstream: Send + Sync {
    /// POST a list request: `{who, what: "1", request, ...extra}`.
    async fn fetch_list(&self, request: &str, who: u32, extra: &Params) -> Result<String>;

    /// GET a schedule page with the given query parameters.
    async fn fetch_schedule(&self, params: &Params) -> Result<String>;
}

/// Upstream reached over HTTP.
pub struct HttpUpstream {
    config: UpstreamConfig,
    list_client: Client,
    schedule_client: Client,
}

impl HttpUpstream {
    pub fn new(config: UpstreamConfig) -> Result<Self> {
        let list_client = http::create_list_client(&config)?;
        let schedule_client = http::create_schedule_client(&config)?;
        Ok(Self {
            config,
            list_client,
            schedule_client,
        })
    }
}

/// Form fields for a list request.
pub fn list_form(request: &str, who: u32, extra: &Params) -> Vec<(String, String)> {
    let mut form = vec![
        ("who".to_string(), who.to_string()),
        ("what".to_string(), "1".to_string()),
        ("request".to_string(), request.to_string()),
    ];
    form.extend(extra.iter().map(|(k, v)| (k.to_string(), v.clone())));
    form
}

#[async_trait]
impl Upstream for HttpUpstream {
    async fn fetch_list(&self, request: &str, who: u32, extra: &Params) -> Result<String> {
        log::debug!("POST {} request={} who={}", self.config.list_url, request, who);
        let response = self
            .list_client
            .post(&self.config.list_url)
            .form(&list_form(request, who, extra))
            .send()
            .await?;
        http::read_text_as(response, &self.config.charset).await
    }

    async fn fetch_schedule(&self, params: &Params) -> Result<String> {
        log::debug!("GET {} {:?}", self.config.schedule_url, params);
        let response = self
            .schedule_client
            .get(&self.config.schedule_url)
            .query(params)
            .send()
            .await?;
        http::read_text(response, &self.config.charset).await
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    use super::*;

    /// Serve one HTTP response on a local port and return its URL.
    async fn serve_once(content_type: &'static str, body: Vec<u8>) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            let head = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                content_type,
                body.len()
            );
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(&body).await.unwrap();
            socket.shutdown().await.unwrap();
        });
        format!("http://{addr}/")
    }

    /// Consume the request head and its `Content-Length` body.
    async fn read_request(socket: &mut tokio::net::TcpStream) {
        let mut data = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                return;
            }
            data.extend_from_slice(&buf[..n]);
            let Some(end) = data.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&data[..end]).to_ascii_lowercase();
            let length = head
                .lines()
                .find_map(|line| line.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if data.len() >= end + 4 + length {
                return;
            }
        }
    }

    #[tokio::test]
    async fn test_list_body_uses_configured_charset() {
        let payload = "{'list': [{'id': 1, 'name': 'Курс'}]}";
        let (body, _, _) = encoding_rs::WINDOWS_1251.encode(payload);
        let url = serve_once("text/html; charset=utf-8", body.into_owned()).await;

        let client = Client::builder().no_proxy().build().unwrap();
        let upstream = HttpUpstream {
            config: UpstreamConfig {
                list_url: url,
                charset: "windows-1251".to_string(),
                ..UpstreamConfig::default()
            },
            list_client: client.clone(),
            schedule_client: client,
        };

        let text = upstream.fetch_list("potok", 1, &Vec::new()).await.unwrap();
        assert_eq!(text, payload);
    }

    #[test]
    fn test_list_form_fields() {
        let extra: Params = vec![("facult", "3".to_string()), ("potok", "1".to_string())];
        let form = list_form("group", 1, &extra);
        let keys: Vec<_> = form.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, ["who", "what", "request", "facult", "potok"]);
        assert_eq!(form[1].1, "1");
        assert_eq!(form[2].1, "group");
    }

    #[test]
    fn test_http_upstream_builds_from_defaults() {
        assert!(HttpUpstream::new(UpstreamConfig::default()).is_ok());
    }
}
