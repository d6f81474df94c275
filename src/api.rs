// API client module: a small blocking HTTP client for the noIPFraud
// admin API. Every campaign call goes through `ensure_authenticated`,
// which logs in lazily when the bearer token is missing or expired.

use crate::campaign::{update_payload, Campaign, CampaignStatus, CampaignUpdate, NewCampaign};
use crate::config::ApiConfig;
use crate::error::ApiError;
use crate::session::{Session, SessionStore};
use chrono::{Local, NaiveDate, Utc};
use reqwest::blocking::{Client, RequestBuilder, Response};
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, AUTHORIZATION};
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tracing::{debug, info, warn};

/// Date format used by every date query parameter.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Login request payload.
#[derive(Serialize, Debug)]
struct AuthRequest<'a> {
    username: &'a str,
    password: &'a str,
}

/// Login response. Only the token matters; the rest varies by version.
#[derive(Deserialize, Debug)]
struct AuthResponse {
    token: Option<String>,
}

/// Blocking client holding the connection settings and the current
/// session, if any.
pub struct NoIPFraudClient {
    client: Client,
    config: ApiConfig,
    session: Option<Session>,
    store: Option<SessionStore>,
    /// The current token came from the cache, not from a login in this
    /// process. The server may have revoked it before our TTL ran out.
    from_cache: bool,
}

impl NoIPFraudClient {
    pub fn new(config: ApiConfig) -> Result<Self, ApiError> {
        let client = Client::builder().timeout(config.timeout).build()?;
        Ok(NoIPFraudClient {
            client,
            config,
            session: None,
            store: None,
            from_cache: false,
        })
    }

    /// Reuse and persist sessions through `store`. A cached session for
    /// the same account is picked up immediately.
    pub fn with_store(mut self, store: SessionStore) -> Self {
        match store.load(&self.config.base_url, &self.config.username, Utc::now()) {
            Ok(Some(session)) => {
                debug!(path = %store.path().display(), "Reusing cached session");
                self.session = Some(session);
                self.from_cache = true;
            }
            Ok(None) => {}
            Err(e) => warn!(path = %store.path().display(), "Ignoring session cache: {}", e),
        }
        self.store = Some(store);
        self
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    fn endpoint(&self, script: &str) -> String {
        format!("{}/{}", self.config.base_url, script)
    }

    /// Authenticate and store a fresh session.
    pub fn login(&mut self) -> Result<&Session, ApiError> {
        let url = self.endpoint("login.php");
        info!(user = %self.config.username, "Logging in");
        let res = self
            .client
            .post(&url)
            .query(&[("a", "auth")])
            .header(ACCEPT, "application/json")
            .json(&AuthRequest {
                username: &self.config.username,
                password: &self.config.password,
            })
            .send()?;
        let auth: AuthResponse = decode(res, "Login")?;
        let token = auth.token.filter(|t| !t.is_empty()).ok_or(ApiError::MissingToken)?;
        let session = Session::issued_at(token, Utc::now(), self.config.token_ttl);

        if let Some(store) = &self.store {
            if let Err(e) = store.save(&self.config.base_url, &self.config.username, &session) {
                warn!(path = %store.path().display(), "Could not cache session: {}", e);
            }
        }
        self.from_cache = false;
        Ok(self.session.insert(session))
    }

    /// Log in unless the current token is still valid.
    pub fn ensure_authenticated(&mut self) -> Result<(), ApiError> {
        let valid = self
            .session
            .as_ref()
            .is_some_and(|s| s.is_valid_at(Utc::now()));
        if !valid {
            if self.session.is_some() {
                info!("Token expired, re-authenticating");
            }
            self.login()?;
        }
        Ok(())
    }

    /// Drop the in-memory session and its cache file.
    fn forget_session(&mut self) {
        self.session = None;
        self.from_cache = false;
        if let Some(store) = &self.store {
            if let Err(e) = store.clear() {
                warn!(path = %store.path().display(), "Could not remove cached session: {}", e);
            }
        }
    }

    fn auth_headers(&self) -> Result<HeaderMap, ApiError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));
        if let Some(session) = &self.session {
            let val = format!("Bearer {}", session.token);
            headers.insert(AUTHORIZATION, HeaderValue::from_str(&val)?);
        }
        Ok(headers)
    }

    /// Authenticated request against `script` with `?a=<action>`.
    fn request(&mut self, method: Method, script: &str, action: &str) -> Result<RequestBuilder, ApiError> {
        self.ensure_authenticated()?;
        let url = self.endpoint(script);
        debug!(method = method.as_str(), %url, action, "Sending request");
        Ok(self
            .client
            .request(method, &url)
            .query(&[("a", action)])
            .headers(self.auth_headers()?))
    }

    /// Build with `build` and send. A 401 on a cached token clears the
    /// cache and the request is sent once more after a fresh login.
    fn send(
        &mut self,
        method: Method,
        script: &str,
        action: &str,
        build: impl Fn(RequestBuilder) -> RequestBuilder,
    ) -> Result<Response, ApiError> {
        let res = build(self.request(method.clone(), script, action)?).send()?;
        if res.status() != StatusCode::UNAUTHORIZED || !self.from_cache {
            return Ok(res);
        }
        warn!(action, "Cached session rejected by the server, logging in again");
        self.forget_session();
        Ok(build(self.request(method, script, action)?).send()?)
    }

    /// List campaigns with counters for `[from, to]`. `from` defaults to
    /// today and `to` to `from`.
    pub fn list_campaigns(
        &mut self,
        from: Option<NaiveDate>,
        to: Option<NaiveDate>,
    ) -> Result<Vec<Campaign>, ApiError> {
        let from = from.unwrap_or_else(|| Local::now().date_naive());
        let to = to.unwrap_or(from);
        let range = [
            ("from", from.format(DATE_FORMAT).to_string()),
            ("to", to.format(DATE_FORMAT).to_string()),
        ];
        let res = self.send(Method::GET, "campaigns.php", "list", |r| r.query(&range))?;
        decode(res, "List campaigns")
    }

    /// Create a campaign. The returned document normally carries the new
    /// campaign id under `name`.
    pub fn create_campaign(&mut self, campaign: &NewCampaign) -> Result<serde_json::Value, ApiError> {
        let body = campaign.request();
        let res = self.send(Method::POST, "campaigns.php", "create", |r| r.json(&body))?;
        let created: serde_json::Value = decode(res, "Create campaign")?;
        info!(
            name = %campaign.name,
            id = created.get("name").and_then(|v| v.as_str()).unwrap_or("?"),
            "Campaign created"
        );
        Ok(created)
    }

    /// Update a campaign listed today. The service replaces the whole
    /// record, so the current one is fetched and merged first.
    pub fn update_campaign(&mut self, campaign_id: &str, update: &CampaignUpdate) -> Result<(), ApiError> {
        let campaigns = self.list_campaigns(None, None)?;
        let current = campaigns
            .iter()
            .find(|c| c.name == campaign_id)
            .ok_or_else(|| ApiError::CampaignNotFound(campaign_id.to_string()))?;
        let payload = update_payload(current, update);
        let res = self.send(Method::POST, "campaigns.php", "update", |r| r.json(&payload))?;
        check(res, "Update campaign")?;
        info!(campaign = campaign_id, "Campaign updated");
        Ok(())
    }

    pub fn change_status(&mut self, campaign_id: &str, status: CampaignStatus) -> Result<(), ApiError> {
        let params = [("clid", campaign_id.to_string()), ("status", status.code().to_string())];
        let res = self.send(Method::GET, "campaigns.php", "changeStatus", |r| r.query(&params))?;
        check(res, "Change status")?;
        info!(campaign = campaign_id, %status, "Status changed");
        Ok(())
    }

    /// PHP snippet that deploys the campaign on a landing server.
    pub fn embed_code(&mut self, campaign_id: &str) -> Result<String, ApiError> {
        let res = self.send(Method::GET, "campaigns.php", "getPhpEmbed", |r| {
            r.query(&[("clid", campaign_id)])
        })?;
        check(res, "Get embed code")
    }

    /// Daily statistics for one campaign, returned as the raw document.
    pub fn campaign_stats(
        &mut self,
        campaign_id: &str,
        from: NaiveDate,
        to: NaiveDate,
    ) -> Result<serde_json::Value, ApiError> {
        let params = [
            ("clid", campaign_id.to_string()),
            ("from", from.format(DATE_FORMAT).to_string()),
            ("to", to.format(DATE_FORMAT).to_string()),
        ];
        let res = self.send(Method::GET, "stats.php", "daily", |r| r.query(&params))?;
        decode(res, "Get stats")
    }

    /// Change the status of each campaign in turn. A failure is logged and
    /// recorded as `false`; it doesn't stop the rest.
    pub fn bulk_change_status(&mut self, campaign_ids: &[String], status: CampaignStatus) -> BTreeMap<String, bool> {
        let mut results = BTreeMap::new();
        for id in campaign_ids {
            let ok = match self.change_status(id, status) {
                Ok(()) => true,
                Err(e) => {
                    warn!(campaign = %id, "Change status failed: {}", e);
                    false
                }
            };
            results.insert(id.clone(), ok);
        }
        results
    }

    pub fn bulk_update(&mut self, updates: &[(String, CampaignUpdate)]) -> BTreeMap<String, bool> {
        let mut results = BTreeMap::new();
        for (id, update) in updates {
            let ok = match self.update_campaign(id, update) {
                Ok(()) => true,
                Err(e) => {
                    warn!(campaign = %id, "Update failed: {}", e);
                    false
                }
            };
            results.insert(id.clone(), ok);
        }
        results
    }

    /// Embed codes for `campaign_ids`, or for every campaign listed today
    /// when the slice is empty. Failed lookups map to `None`.
    pub fn all_embed_codes(&mut self, campaign_ids: &[String]) -> Result<BTreeMap<String, Option<String>>, ApiError> {
        let ids: Vec<String> = if campaign_ids.is_empty() {
            self.list_campaigns(None, None)?.into_iter().map(|c| c.name).collect()
        } else {
            campaign_ids.to_vec()
        };
        let mut codes = BTreeMap::new();
        for id in ids {
            let code = match self.embed_code(&id) {
                Ok(code) => Some(code),
                Err(e) => {
                    warn!(campaign = %id, "Get embed code failed: {}", e);
                    None
                }
            };
            codes.insert(id, code);
        }
        Ok(codes)
    }
}

/// Turn a non-success status into `ApiError::Status`, otherwise return
/// the body text.
fn check(res: Response, action: &'static str) -> Result<String, ApiError> {
    let status = res.status();
    let body = res.text()?;
    if !status.is_success() {
        return Err(ApiError::Status {
            action,
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

fn decode<T: DeserializeOwned>(res: Response, action: &'static str) -> Result<T, ApiError> {
    let body = check(res, action)?;
    serde_json::from_str(&body).map_err(|source| ApiError::Decode { action, source })
}
