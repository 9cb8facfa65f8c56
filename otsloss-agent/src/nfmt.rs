//! NFM-T REST client
//!
//! Single-step token authentication against the REST gateway, then:
//! - reads under `https://{host}:{api_port}/oms1350`
//! - PM queries posted to `https://{host}:{api_port}`
//!
//! The token is revoked explicitly at the end of a run.

use crate::config::NfmtConfig;
use otsloss_core::telemetry::{PmWindow, TelemetryClient};
use otsloss_core::{Connection, FiberCore, LossError, ManagedConnection, PmQueryResponse, Result};
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::time::Duration;
use tracing::{debug, info, warn};

const INVENTORY_PATH: &str = "/data/npr/physicalConns";
const MANAGED_CONNECTIONS_PATH: &str = "/mncpm/mdcxnlist/";
const PM_QUERY_PATH: &str = "/mncpm/connection/query";
const MANAGED_PAGE_SIZE: u32 = 10_000;

/// Token returned by the REST gateway
#[derive(Debug, Clone, Deserialize)]
pub struct AccessToken {
    pub access_token: String,
    #[serde(default)]
    pub expires_in: f64,
    pub token_type: String,
}

impl AccessToken {
    pub fn authorization(&self) -> String {
        format!("{} {}", self.token_type, self.access_token)
    }
}

/// Body of a Next-Gen PM connection query
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PmQuery<'a> {
    pub obj_ids: Vec<&'a str>,
    pub start_time: i64,
    pub end_time: i64,
    pub granularity: &'a str,
    pub file_type: &'static str,
    pub sftp: &'static str,
    pub username: &'static str,
    pub passwd: &'static str,
    pub file_location: &'static str,
}

impl<'a> PmQuery<'a> {
    pub fn new(object_id: &'a str, window: PmWindow, granularity: &'a str) -> Self {
        Self {
            obj_ids: vec![object_id],
            start_time: window.start.timestamp(),
            end_time: window.end.timestamp(),
            granularity,
            file_type: "CSV",
            sftp: "inactive",
            username: "",
            passwd: "",
            file_location: "",
        }
    }
}

pub fn auth_url(host: &str, endpoint: &str) -> String {
    format!("https://{}/rest-gateway/rest/api/v1/auth/{}", host, endpoint)
}

pub fn read_url(host: &str, port: u16, path: &str) -> String {
    format!("https://{}:{}/oms1350{}", host, port, path)
}

pub fn query_url(host: &str, port: u16, path: &str) -> String {
    format!("https://{}:{}{}", host, port, path)
}

pub fn characteristics_path(connection_id: i64) -> String {
    format!("{}/{}/fiberCharacteristic", INVENTORY_PATH, connection_id)
}

/// Authenticated session with one NFM-T instance
pub struct NfmtClient {
    http: Client,
    host: String,
    api_port: u16,
    username: String,
    password: String,
    granularity: String,
    token: AccessToken,
}

impl NfmtClient {
    /// Builds the HTTP client and authenticates
    pub async fn connect(config: &NfmtConfig, password: &str, granularity: &str) -> Result<Self> {
        if config.accept_invalid_certs {
            warn!("TLS certificate verification disabled for {}", config.host);
        }
        let http = Client::builder()
            .danger_accept_invalid_certs(config.accept_invalid_certs)
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| transport("build HTTP client", e))?;

        let token = authenticate(&http, &config.host, &config.username, password).await?;
        info!("REST API Authentication: SUCCESS! ({})", config.host);
        debug!("Token valid for {}s", token.expires_in);

        Ok(Self {
            http,
            host: config.host.clone(),
            api_port: config.api_port,
            username: config.username.clone(),
            password: password.to_string(),
            granularity: granularity.to_string(),
            token,
        })
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Revokes the session token
    pub async fn revoke(&self) -> Result<()> {
        let call = "POST auth/revocation".to_string();
        let response = self
            .http
            .post(auth_url(&self.host, "revocation"))
            .basic_auth(&self.username, Some(&self.password))
            .form(&[
                ("token", self.token.access_token.as_str()),
                ("token_type_hint", "token"),
            ])
            .send()
            .await
            .map_err(|e| transport(&call, e))?;

        if !response.status().is_success() {
            return Err(LossError::Status {
                call,
                status: response.status().as_u16(),
            });
        }
        info!("REST API DeAuthentication: SUCCESS!");
        Ok(())
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let call = format!("GET {}", path);
        let request = self.http.get(read_url(&self.host, self.api_port, path));
        self.send(call, request).await
    }

    async fn post_json<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let call = format!("POST {}", path);
        let request = self
            .http
            .post(query_url(&self.host, self.api_port, path))
            .json(body);
        self.send(call, request).await
    }

    async fn send<T: DeserializeOwned>(&self, call: String, request: RequestBuilder) -> Result<T> {
        debug!("{}", call);
        let response = request
            .header(reqwest::header::AUTHORIZATION, self.token.authorization())
            .send()
            .await
            .map_err(|e| transport(&call, e))?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(LossError::Status {
                call,
                status: status.as_u16(),
            });
        }

        let body = response.text().await.map_err(|e| transport(&call, e))?;
        serde_json::from_str(&body).map_err(|source| LossError::Decode { call, source })
    }
}

async fn authenticate(
    http: &Client,
    host: &str,
    username: &str,
    password: &str,
) -> Result<AccessToken> {
    let call = "POST auth/token";
    let response = http
        .post(auth_url(host, "token"))
        .basic_auth(username, Some(password))
        .form(&[("grant_type", "client_credentials")])
        .send()
        .await
        .map_err(|e| transport(call, e))?;

    if response.status() != StatusCode::OK {
        return Err(LossError::Auth {
            host: host.to_string(),
            status: response.status().as_u16(),
        });
    }

    let body = response.text().await.map_err(|e| transport(call, e))?;
    serde_json::from_str(&body).map_err(|source| LossError::Decode {
        call: call.to_string(),
        source,
    })
}

fn transport(call: &str, err: reqwest::Error) -> LossError {
    LossError::Transport {
        call: call.to_string(),
        message: err.to_string(),
    }
}

impl TelemetryClient for NfmtClient {
    async fn fetch_inventory(&self) -> Result<Vec<Connection>> {
        self.get_json(INVENTORY_PATH).await
    }

    async fn fetch_characteristics(&self, connection_id: i64) -> Result<Vec<FiberCore>> {
        self.get_json(&characteristics_path(connection_id)).await
    }

    async fn fetch_managed_connections(&self) -> Result<Vec<ManagedConnection>> {
        let page: Value = json!({
            "noOfEntries": MANAGED_PAGE_SIZE,
            "startIndex": 0
        });
        self.post_json(MANAGED_CONNECTIONS_PATH, &page).await
    }

    async fn fetch_pm_series(&self, object_id: &str, window: PmWindow) -> Result<PmQueryResponse> {
        let query = PmQuery::new(object_id, window, &self.granularity);
        self.post_json(PM_QUERY_PATH, &query).await
    }
}
