// PoolSync device HTTP client
//
// Wraps `reqwest::Client` with the device's URL layout, the fixed `user`
// header, status-code classification, and permissive JSON decoding. No
// retries happen here: every failure is returned to the caller, which owns
// the retry policy.

use std::time::Duration;

use reqwest::{Method, StatusCode};
use secrecy::ExposeSecret;
use serde_json::{Value, json};
use tracing::{debug, error, info, trace, warn};
use url::Url;

use crate::error::{Error, preview};
use crate::transport::{TransportConfig, USER_HEADER, USER_HEADER_VALUE};
use crate::types::{Credential, PairingStatus};

/// Path segment under `/api/` that addresses the controller.
pub const API_DEVICE: &str = "poolsync";
/// `cmd` value that returns the full snapshot.
pub const API_PRODUCT: &str = "poolSync";
/// Mandatory top-level section describing the hub itself.
pub const REGISTRY_SECTION: &str = "poolSync";
/// Mandatory top-level section holding per-device state keyed by id.
pub const DEVICES_SECTION: &str = "devices";

const AUTHORIZATION_HEADER: &str = "authorization";

/// Async client for one PoolSync controller on the local network.
///
/// Cheap to clone: the underlying `reqwest::Client` shares its pool.
#[derive(Debug, Clone)]
pub struct DeviceClient {
    http: reqwest::Client,
    base_url: Url,
    address: String,
    timeout: Duration,
    user_header: Option<String>,
}

impl DeviceClient {
    /// Create a client for the device at `address` (IP or host name,
    /// optionally with a port).
    pub fn new(address: &str, transport: &TransportConfig) -> Result<Self, Error> {
        let address = address.trim().to_owned();
        let base_url = Url::parse(&format!("http://{address}"))?;
        let http = transport.build_client()?;
        debug!(%address, "device client initialized");
        Ok(Self {
            http,
            base_url,
            address,
            timeout: transport.timeout,
            // Already injected as a default header by the transport.
            user_header: None,
        })
    }

    /// Create a client around a pre-built `reqwest::Client`.
    ///
    /// The `user` header is added per request because the supplied client
    /// may not carry it as a default header. `timeout` should match the one
    /// `http` was built with; it only feeds error reporting.
    pub fn with_client(http: reqwest::Client, base_url: Url, timeout: Duration) -> Self {
        let address = match (base_url.host_str(), base_url.port()) {
            (Some(host), Some(port)) => format!("{host}:{port}"),
            (Some(host), None) => host.to_owned(),
            _ => base_url.as_str().to_owned(),
        };
        Self {
            http,
            base_url,
            address,
            timeout,
            user_header: Some(USER_HEADER_VALUE.to_owned()),
        }
    }

    /// The network address this client talks to.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// The device base URL.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// Open the push-link window on the device.
    ///
    /// `PUT /api/poolsync?cmd=pushLink&start`
    pub async fn start_pairing(&self) -> Result<Value, Error> {
        info!(address = %self.address, "starting push-link");
        let url = self.command_url("pushLink&start")?;
        let resp = self.send(Method::PUT, url, None, None).await?;
        let ack = self.parse_json(resp).await?;
        debug!(address = %self.address, response = %ack, "push-link started");
        Ok(ack)
    }

    /// Ask whether the button has been pressed yet.
    ///
    /// `GET /api/poolsync?cmd=pushLink&status`
    pub async fn poll_pairing_status(&self) -> Result<PairingStatus, Error> {
        trace!(address = %self.address, "polling push-link status");
        let url = self.command_url("pushLink&status")?;
        let resp = self.send(Method::GET, url, None, None).await?;
        let body = self.parse_json(resp).await?;
        PairingStatus::from_json(&body)
    }

    /// Fetch the full device state.
    ///
    /// `GET /api/poolsync?cmd=poolSync&all` with the `authorization` header.
    /// The response must be a JSON object carrying both the hub section and
    /// the device list; anything else is a protocol error.
    pub async fn fetch_snapshot(&self, credential: &Credential) -> Result<Value, Error> {
        if credential.is_empty() {
            error!(address = %self.address, "snapshot requested without a secret");
            return Err(Error::Authentication {
                status: None,
                message: "a secret is required to fetch device data".into(),
            });
        }

        let url = self.command_url(&format!("{API_PRODUCT}&all"))?;
        let resp = self
            .send(Method::GET, url, Some(credential), None)
            .await?;
        let body = self.parse_json(resp).await?;
        validate_snapshot(&body)?;

        if let Some(sections) = body.as_object() {
            debug!(
                address = %self.address,
                sections = ?sections.keys().collect::<Vec<_>>(),
                "snapshot fetched"
            );
        }
        Ok(body)
    }

    /// Write one configuration field of one sub-device.
    ///
    /// `PATCH /api/poolsync?cmd=devices&device={id}` with body
    /// `{"config": {field_key: value}}`. A 2xx answer is an acknowledgement;
    /// its body is returned when it decodes as JSON and `Null` otherwise.
    pub async fn patch_field(
        &self,
        device_id: &str,
        field_key: &str,
        value: i64,
        credential: &Credential,
    ) -> Result<Value, Error> {
        let mut url = self.api_url()?;
        url.query_pairs_mut()
            .append_pair("cmd", "devices")
            .append_pair("device", device_id);

        let body = json!({ "config": { field_key: value } });
        info!(address = %self.address, device_id, field_key, value, "patching device field");

        let resp = self
            .send(Method::PATCH, url, Some(credential), Some(&body))
            .await?;
        let status = resp.status();
        let text = self.read_checked(resp).await?;

        let ack = if text.trim().is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap_or_else(|e| {
                debug!(%status, error = %e, body = preview(&text), "non-JSON patch acknowledgement");
                Value::Null
            })
        };
        Ok(ack)
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// `{base}/api/poolsync`
    fn api_url(&self) -> Result<Url, Error> {
        let base = self.base_url.as_str().trim_end_matches('/');
        Ok(Url::parse(&format!("{base}/api/{API_DEVICE}"))?)
    }

    /// `{base}/api/poolsync?cmd={query}`. The query is set verbatim so
    /// bare flags like `&start` keep their exact wire form.
    fn command_url(&self, query: &str) -> Result<Url, Error> {
        let mut url = self.api_url()?;
        url.set_query(Some(&format!("cmd={query}")));
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn send(
        &self,
        method: Method,
        url: Url,
        credential: Option<&Credential>,
        body: Option<&Value>,
    ) -> Result<reqwest::Response, Error> {
        debug!(
            %method,
            %url,
            authorization = credential.map(|c| redact(c.secret().expose_secret())),
            "sending request"
        );

        let mut builder = self.http.request(method, url.clone());
        if let Some(ref user) = self.user_header {
            builder = builder.header(USER_HEADER, user);
        }
        if let Some(credential) = credential {
            builder = builder.header(AUTHORIZATION_HEADER, credential.secret().expose_secret());
        }
        if let Some(body) = body {
            builder = builder.json(body);
        }

        builder.send().await.map_err(|e| {
            let err = Error::from_reqwest(&e, self.timeout.as_secs());
            match err {
                Error::Timeout { timeout_secs } => {
                    warn!(address = %self.address, %url, timeout_secs, "request timed out");
                }
                _ => warn!(address = %self.address, %url, error = %e, "request failed"),
            }
            err
        })
    }

    /// Read the body and classify the status code.
    async fn read_checked(&self, resp: reqwest::Response) -> Result<String, Error> {
        let status = resp.status();
        let url = resp.url().clone();
        let content_type = resp
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(String::from);

        let text = resp
            .text()
            .await
            .map_err(|e| Error::from_reqwest(&e, self.timeout.as_secs()))?;
        debug!(
            %url,
            %status,
            content_type = content_type.as_deref().unwrap_or("-"),
            body = preview(&text),
            "response received"
        );

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            error!(address = %self.address, %status, "device rejected credential");
            return Err(Error::Authentication {
                status: Some(status.as_u16()),
                message: format!("device answered HTTP {status}"),
            });
        }

        if !status.is_success() {
            error!(address = %self.address, %status, body = preview(&text), "unexpected HTTP status");
            return Err(Error::protocol(
                format!("HTTP {status}"),
                Some(status.as_u16()),
                Some(&text),
            ));
        }

        Ok(text)
    }

    /// Decode a 2xx body as JSON regardless of the advertised content type;
    /// some firmware labels JSON as `text/plain`.
    async fn parse_json(&self, resp: reqwest::Response) -> Result<Value, Error> {
        let status = resp.status().as_u16();
        let text = self.read_checked(resp).await?;
        serde_json::from_str(&text).map_err(|e| {
            error!(address = %self.address, error = %e, body = preview(&text), "invalid JSON from device");
            Error::protocol(format!("invalid JSON response: {e}"), Some(status), Some(&text))
        })
    }
}

/// Check the two mandatory top-level sections of a snapshot.
pub fn validate_snapshot(body: &Value) -> Result<(), Error> {
    let Some(obj) = body.as_object() else {
        return Err(Error::protocol(
            "snapshot is not a JSON object",
            None,
            Some(&body.to_string()),
        ));
    };
    for section in [REGISTRY_SECTION, DEVICES_SECTION] {
        if !obj.get(section).is_some_and(Value::is_object) {
            return Err(Error::protocol(
                format!("snapshot is missing the '{section}' section"),
                None,
                None,
            ));
        }
    }
    Ok(())
}

fn redact(secret: &str) -> String {
    let head: String = secret.chars().take(4).collect();
    format!("{head}...")
}
