use crate::executor::{BonjourPayload, BonjourUpdater};
use crate::inventory::{InventorySource, NetworkRecord, Organization, SsidRecord};
use anyhow::{Context, Result};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderValue, LINK, USER_AGENT};
use reqwest::{Method, Url};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;

const UA: &str = concat!("bonjourctl/", env!("CARGO_PKG_VERSION"));
const PAGE_SIZE: &str = "1000";

#[derive(Debug, Error)]
pub enum ApiError {
    /// Non-2xx answer from the Dashboard; `message` is the first reported error.
    #[error("{message}")]
    Status { status: u16, message: String },
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("decoding response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("cannot build request URL for `{0}`")]
    InvalidUrl(String),
}

#[derive(Debug, Clone)]
pub struct ResponseData {
    pub status: u16,
    pub body: String,
    pub json: Option<Value>,
    /// Target of the `rel=next` entry of the `Link` header, if any.
    pub next: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: Url,
    http: Client,
    api_key: String,
}

impl ApiClient {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self> {
        // Url::join drops the last segment unless the base ends with a slash.
        let mut normalized = base_url.trim_end_matches('/').to_string();
        normalized.push('/');
        let parsed = Url::parse(&normalized).context("parsing base URL")?;
        let http = Client::builder()
            .user_agent(HeaderValue::from_static(UA))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()
            .context("building HTTP client")?;

        Ok(Self {
            base_url: parsed,
            http,
            api_key: api_key.to_string(),
        })
    }

    pub fn get(&self, path: &str, query: &[(&str, String)]) -> Result<ResponseData, ApiError> {
        let url = self.url_for(path)?;
        self.request(Method::GET, url, query, Option::<&Value>::None)
    }

    /// GET every page of a list endpoint, following `Link: <...>; rel=next`.
    pub fn get_all(&self, path: &str, query: &[(&str, String)]) -> Result<Vec<Value>, ApiError> {
        let mut items = Vec::new();
        let mut page = self.get(path, query)?;
        loop {
            debug!(status = page.status, bytes = page.body.len(), "received page");
            match page.json {
                Some(Value::Array(values)) => items.extend(values),
                Some(other) => items.push(other),
                None => {}
            }
            let Some(next) = page.next else {
                break;
            };
            debug!(%next, "following pagination link");
            let url = Url::parse(&next).map_err(|_| ApiError::InvalidUrl(next.clone()))?;
            page = self.request(Method::GET, url, &[], Option::<&Value>::None)?;
        }
        Ok(items)
    }

    pub fn put_json<T: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &T,
    ) -> Result<ResponseData, ApiError> {
        let url = self.url_for(path)?;
        self.request(Method::PUT, url, &[], Some(body))
    }

    pub fn organizations(&self) -> Result<Vec<Organization>, ApiError> {
        self.list("/organizations", &[])
    }

    fn list<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<Vec<T>, ApiError> {
        self.get_all(path, query)?
            .into_iter()
            .map(|value| {
                serde_json::from_value(value).map_err(|source| ApiError::Decode {
                    url: path.to_string(),
                    source,
                })
            })
            .collect()
    }

    fn url_for(&self, path: &str) -> Result<Url, ApiError> {
        let normalized = path.trim_start_matches('/');
        self.base_url
            .join(normalized)
            .map_err(|_| ApiError::InvalidUrl(path.to_string()))
    }

    fn request<T: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        query: &[(&str, String)],
        body: Option<&T>,
    ) -> Result<ResponseData, ApiError> {
        let target = url.to_string();
        debug!(%method, url = %target, "dashboard request");

        let mut request = self
            .http
            .request(method, url)
            .bearer_auth(&self.api_key)
            .header(ACCEPT, HeaderValue::from_static("application/json"))
            .header(USER_AGENT, HeaderValue::from_static(UA));

        if !query.is_empty() {
            request = request.query(query);
        }

        if let Some(body) = body {
            request = request.json(body);
        }

        let transport = |source| ApiError::Transport {
            url: target.clone(),
            source,
        };
        let response = request.send().map_err(transport)?;

        let status = response.status();
        let next = response
            .headers()
            .get(LINK)
            .and_then(|v| v.to_str().ok())
            .and_then(next_link);
        let text = response.text().map_err(transport)?;

        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: dashboard_error_message(&text, status.as_u16()),
            });
        }

        let json = serde_json::from_str(&text).ok();

        Ok(ResponseData {
            status: status.as_u16(),
            body: text,
            json,
            next,
        })
    }
}

impl InventorySource for ApiClient {
    fn list_networks(&self, org_id: &str) -> Result<Vec<NetworkRecord>, ApiError> {
        self.list(
            &format!("/organizations/{org_id}/networks"),
            &[("perPage", PAGE_SIZE.to_string())],
        )
    }

    fn list_ssids(&self, network_id: &str) -> Result<Vec<SsidRecord>, ApiError> {
        self.list(&format!("/networks/{network_id}/wireless/ssids"), &[])
    }
}

impl BonjourUpdater for ApiClient {
    fn update_bonjour_forwarding(
        &self,
        network_id: &str,
        ssid_slot: u32,
        payload: &BonjourPayload,
    ) -> Result<(), ApiError> {
        self.put_json(
            &format!("/networks/{network_id}/wireless/ssids/{ssid_slot}/bonjourForwarding"),
            payload,
        )
        .map(|_| ())
    }
}

/// The Dashboard reports failures as `{"errors": ["..."]}`.
fn dashboard_error_message(body: &str, status: u16) -> String {
    if let Ok(json) = serde_json::from_str::<Value>(body)
        && let Some(first) = json
            .get("errors")
            .and_then(|e| e.as_array())
            .and_then(|errors| errors.first())
    {
        return match first.as_str() {
            Some(text) => text.to_string(),
            None => first.to_string(),
        };
    }

    let trimmed = body.trim();
    if trimmed.is_empty() {
        return format!("HTTP {status}");
    }
    if trimmed.chars().count() > 200 {
        let head: String = trimmed.chars().take(200).collect();
        format!("HTTP {status}: {head}...")
    } else {
        format!("HTTP {status}: {trimmed}")
    }
}

fn next_link(header: &str) -> Option<String> {
    header.split(',').find_map(|entry| {
        let mut parts = entry.split(';');
        let target = parts.next()?.trim();
        let is_next = parts.any(|param| {
            let param = param.trim().replace(' ', "");
            param == "rel=next" || param == "rel=\"next\""
        });
        if !is_next {
            return None;
        }
        target
            .strip_prefix('<')
            .and_then(|t| t.strip_suffix('>'))
            .map(str::to_string)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::validate::BonjourRule;
    use httpmock::prelude::*;
    use serde_json::json;

    #[test]
    fn sends_bearer_key_and_parses_organizations() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(GET)
                .path("/api/v1/organizations")
                .header("Authorization", "Bearer test-key");
            then.status(200)
                .json_body(json!([{"id": "100", "name": "Acme", "url": "https://x"}]));
        });

        let client = ApiClient::new(&server.url("/api/v1"), "test-key").unwrap();
        let orgs = client.organizations().unwrap();

        mock.assert();
        assert_eq!(orgs.len(), 1);
        assert_eq!(orgs[0].id, "100");
        assert_eq!(orgs[0].name, "Acme");
    }

    #[test]
    fn follows_link_header_across_pages() {
        let server = MockServer::start();
        let next = server.url("/organizations/1/networks?startingAfter=N_2");
        let first = server.mock(|when, then| {
            when.method(GET)
                .path("/organizations/1/networks")
                .query_param("perPage", "1000");
            then.status(200)
                .header("Link", format!("<{next}>; rel=next"))
                .json_body(json!([
                    {"id": "N_1", "name": "HQ", "productTypes": ["wireless"]},
                    {"id": "N_2", "name": "Lab", "productTypes": ["switch"]}
                ]));
        });
        let second = server.mock(|when, then| {
            when.method(GET)
                .path("/organizations/1/networks")
                .query_param("startingAfter", "N_2");
            then.status(200).json_body(json!([
                {"id": "N_3", "name": "Branch", "productTypes": ["appliance", "wireless"]}
            ]));
        });

        let client = ApiClient::new(&server.base_url(), "k").unwrap();
        let networks = client.list_networks("1").unwrap();

        first.assert();
        second.assert();
        let ids: Vec<_> = networks.iter().map(|n| n.id.as_str()).collect();
        assert_eq!(ids, ["N_1", "N_2", "N_3"]);
        assert_eq!(networks[2].product_types, ["appliance", "wireless"]);
    }

    #[test]
    fn puts_bonjour_payload() {
        let server = MockServer::start();
        let mock = server.mock(|when, then| {
            when.method(PUT)
                .path("/networks/N_1/wireless/ssids/3/bonjourForwarding")
                .json_body(json!({
                    "enabled": true,
                    "rules": [{"description": "Lobby", "vlanId": "50", "services": ["AirPlay"]}]
                }));
            then.status(200).json_body(json!({"enabled": true}));
        });

        let client = ApiClient::new(&server.base_url(), "k").unwrap();
        let payload = BonjourPayload::new(vec![BonjourRule {
            description: "Lobby".into(),
            vlan_id: "50".into(),
            services: vec!["AirPlay".into()],
        }]);
        client
            .update_bonjour_forwarding("N_1", 3, &payload)
            .unwrap();

        mock.assert();
    }

    #[test]
    fn surfaces_first_dashboard_error() {
        let server = MockServer::start();
        server.mock(|when, then| {
            when.method(PUT)
                .path("/networks/N_9/wireless/ssids/0/bonjourForwarding");
            then.status(400)
                .json_body(json!({"errors": ["VLAN 50 is reserved", "second"]}));
        });

        let client = ApiClient::new(&server.base_url(), "k").unwrap();
        let err = client
            .update_bonjour_forwarding("N_9", 0, &BonjourPayload::new(vec![]))
            .unwrap_err();

        match &err {
            ApiError::Status { status, message } => {
                assert_eq!(*status, 400);
                assert_eq!(message, "VLAN 50 is reserved");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(err.to_string(), "VLAN 50 is reserved");
    }

    #[test]
    fn falls_back_to_raw_body_for_unknown_errors() {
        assert_eq!(dashboard_error_message("", 502), "HTTP 502");
        assert_eq!(
            dashboard_error_message("Bad Gateway", 502),
            "HTTP 502: Bad Gateway"
        );
        let long = "x".repeat(300);
        let msg = dashboard_error_message(&long, 500);
        assert!(msg.ends_with("..."));
        assert_eq!(msg.len(), "HTTP 500: ".len() + 200 + 3);
    }

    #[test]
    fn parses_next_link_variants() {
        let header = r#"<https://a/p?x=1>; rel=first, <https://a/p?x=2>; rel="next""#;
        assert_eq!(next_link(header).as_deref(), Some("https://a/p?x=2"));
        assert_eq!(next_link("<https://a/p>; rel=prev"), None);
    }
}
