// SPDX-License-Identifier: MPL-2.0
// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

//! Access token exchange.
//!
//! The backend hands out bearer tokens in exchange for HTTP Basic
//! credentials (URL-encoded username, SHA-512 hex of the password) and a
//! form describing the client device. The response body is a `&`-joined
//! list of `key=value` pairs, not JSON.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, TimeDelta, Utc};
use reqwest::Client;
use sha2::{Digest, Sha512};
use tokio::sync::Mutex;

use crate::config::SessionConfig;
use crate::error::{Error, ProtocolError, Result};

/// Seconds before the advertised expiry at which a token is refreshed.
pub const EXPIRY_MARGIN_SECS: i64 = 100;

/// Name under which the client registers itself, pre-encoded the way the
/// web app sends it.
const DEVICE_NAME: &str = "Web%20App%20%7C%20Safari";
const DEVICE_TYPE: &str = "4";
const DEVICE_OS: &str = "6";
const DEVICE_APP: &str = "4";
const WEB_ORIGIN: &str = "http://mycoviva.net";

/// Fallback seed when no hardware address can be read.
const FALLBACK_SEED: &str = "00:00:00:00:00:00";

// ============================================================================
// Credential
// ============================================================================

/// Account credential. Immutable after construction.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    username: String,
    password: String,
    coviva_id: String,
}

impl Credential {
    /// Creates a credential; the account identifier is upper-cased.
    #[must_use]
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
        coviva_id: impl AsRef<str>,
    ) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
            coviva_id: coviva_id.as_ref().trim().to_uppercase(),
        }
    }

    /// Returns the username.
    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    /// Returns the upper-cased account identifier.
    #[must_use]
    pub fn coviva_id(&self) -> &str {
        &self.coviva_id
    }

    /// Returns the Basic-auth user part: the URL-encoded username.
    #[must_use]
    pub fn basic_user(&self) -> String {
        urlencoding::encode(&self.username).into_owned()
    }

    /// Returns the Basic-auth password part: SHA-512 hex of the password.
    #[must_use]
    pub fn password_hash(&self) -> String {
        sha512_hex(&self.password)
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .field("coviva_id", &self.coviva_id)
            .finish()
    }
}

// ============================================================================
// Token
// ============================================================================

/// A bearer token with its validity window.
#[derive(Clone, PartialEq, Eq)]
pub struct Token {
    access_token: String,
    issued_at: DateTime<Utc>,
    expires_in: TimeDelta,
    user_id: String,
    device_id: String,
    myhagerid: String,
}

impl Token {
    /// Creates a token issued at `issued_at` and valid for `expires_in`.
    #[must_use]
    pub fn new(
        access_token: impl Into<String>,
        issued_at: DateTime<Utc>,
        expires_in: TimeDelta,
    ) -> Self {
        Self {
            access_token: access_token.into(),
            issued_at,
            expires_in,
            user_id: String::new(),
            device_id: String::new(),
            myhagerid: String::new(),
        }
    }

    fn from_response(response: TokenResponse, issued_at: DateTime<Utc>) -> Self {
        let expires_in = TimeDelta::try_seconds(response.expires.max(0)).unwrap_or(TimeDelta::MAX);
        Self {
            access_token: response.access_token,
            issued_at,
            expires_in,
            user_id: response.user_id,
            device_id: response.device_id,
            myhagerid: response.myhagerid,
        }
    }

    /// Returns the opaque token string.
    #[must_use]
    pub fn access_token(&self) -> &str {
        &self.access_token
    }

    /// Returns the backend user identifier, empty if not reported.
    #[must_use]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Returns the identifier the backend assigned to this client device.
    #[must_use]
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Returns the account's Hager identifier, empty if not reported.
    #[must_use]
    pub fn myhagerid(&self) -> &str {
        &self.myhagerid
    }

    /// Instant from which the token is treated as expired.
    #[must_use]
    pub fn refresh_at(&self) -> DateTime<Utc> {
        self.issued_at
            .checked_add_signed(self.expires_in - TimeDelta::seconds(EXPIRY_MARGIN_SECS))
            .unwrap_or(DateTime::<Utc>::MAX_UTC)
    }

    /// Returns `true` if the token must be refreshed at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.access_token.is_empty() || now >= self.refresh_at()
    }

    /// Returns `true` if the token must be refreshed now.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Token")
            .field("access_token", &"<redacted>")
            .field("issued_at", &self.issued_at)
            .field("expires_in", &self.expires_in)
            .field("device_id", &self.device_id)
            .finish_non_exhaustive()
    }
}

/// Fields of a token endpoint response. Absent keys stay empty/zero.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenResponse {
    /// Bearer token.
    pub access_token: String,
    /// Validity in seconds.
    pub expires: i64,
    /// Backend user identifier.
    pub user_id: String,
    /// Identifier assigned to this client device.
    pub device_id: String,
    /// Hager account identifier.
    pub myhagerid: String,
}

/// Parses an `&`-joined `key=value` token response.
///
/// Never fails: unknown keys are ignored, missing keys default, and an
/// unparsable `expires` becomes zero.
#[must_use]
pub fn parse_token_response(body: &str) -> TokenResponse {
    let mut response = TokenResponse::default();

    for pair in body.trim().split('&') {
        let (key, value) = pair.split_once('=').unwrap_or((pair, ""));
        let value = urlencoding::decode(value)
            .map_or_else(|_| value.to_string(), std::borrow::Cow::into_owned);
        match key {
            "access_token" => response.access_token = value,
            "expires" => response.expires = value.trim().parse().unwrap_or(0),
            "user_id" => response.user_id = value,
            "device_id" => response.device_id = value,
            "myhagerid" => response.myhagerid = value,
            _ => {}
        }
    }

    response
}

// ============================================================================
// Hardware identifier
// ============================================================================

/// SHA-512 of `input`, lowercase hex.
#[must_use]
pub fn sha512_hex(input: &str) -> String {
    hex::encode(Sha512::digest(input.as_bytes()))
}

/// Derives the per-install device identifier from a hardware seed.
///
/// The identifier is hex digits 1 to 33 of the seed's SHA-512, so the same
/// machine always registers as the same client device.
#[must_use]
pub fn hardware_id(seed: &str) -> String {
    sha512_hex(seed)[1..34].to_string()
}

/// Finds a stable local hardware address to seed [`hardware_id`].
///
/// Tries the first non-loopback MAC address under `/sys/class/net` (sorted by
/// interface name), then `/etc/machine-id`.
#[must_use]
pub fn local_hardware_seed() -> String {
    mac_address(Path::new("/sys/class/net"))
        .or_else(|| {
            std::fs::read_to_string("/etc/machine-id")
                .ok()
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
        })
        .unwrap_or_else(|| FALLBACK_SEED.to_string())
}

fn mac_address(net_dir: &Path) -> Option<String> {
    let mut interfaces: Vec<_> = std::fs::read_dir(net_dir)
        .ok()?
        .filter_map(std::result::Result::ok)
        .map(|entry| entry.path())
        .collect();
    interfaces.sort();

    interfaces.into_iter().find_map(|path| {
        if path.file_name().is_some_and(|name| name == "lo") {
            return None;
        }
        let address = std::fs::read_to_string(path.join("address")).ok()?;
        let address = address.trim();
        (!address.is_empty() && address != FALLBACK_SEED).then(|| address.to_string())
    })
}

// ============================================================================
// TokenManager
// ============================================================================

/// Obtains and caches the bearer token of one account.
///
/// Concurrent callers of [`TokenManager::ensure_token`] share one refresh:
/// the slot lock is held across the HTTP exchange.
#[derive(Debug)]
pub struct TokenManager {
    client: Client,
    credential: Credential,
    token_url: String,
    user_agent: String,
    hardware_id: String,
    current: Mutex<Option<Token>>,
}

impl TokenManager {
    /// Creates a token manager from the session configuration.
    ///
    /// # Errors
    ///
    /// Returns error if the HTTP client cannot be created.
    pub fn new(config: &SessionConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.request_timeout())
            .build()
            .map_err(ProtocolError::Http)?;

        let seed = config
            .hardware_seed()
            .map_or_else(local_hardware_seed, str::to_string);

        Ok(Self {
            client,
            credential: config.credential().clone(),
            token_url: config.token_url(),
            user_agent: config.user_agent().to_string(),
            hardware_id: hardware_id(&seed),
            current: Mutex::new(None),
        })
    }

    /// Returns the per-install device identifier sent to the backend.
    #[must_use]
    pub fn hardware_id(&self) -> &str {
        &self.hardware_id
    }

    /// Returns a valid token, exchanging credentials if needed.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Authentication`] on a non-200 response and
    /// [`ProtocolError::Http`] if the request itself fails.
    pub async fn ensure_token(&self) -> Result<Token> {
        let mut slot = self.current.lock().await;

        if let Some(token) = slot.as_ref()
            && !token.is_expired()
        {
            return Ok(token.clone());
        }

        let token = self.request_token().await?;
        *slot = Some(token.clone());
        Ok(token)
    }

    /// Returns the held token if it is still valid, without refreshing.
    pub async fn valid_token(&self) -> Option<Token> {
        self.current
            .lock()
            .await
            .as_ref()
            .filter(|t| !t.is_expired())
            .cloned()
    }

    /// Returns `true` once a token has been obtained, expired or not.
    pub async fn has_token(&self) -> bool {
        self.current.lock().await.is_some()
    }

    /// Drops the held token so the next call exchanges credentials again.
    pub async fn invalidate(&self) {
        *self.current.lock().await = None;
    }

    async fn request_token(&self) -> Result<Token> {
        tracing::debug!(url = %self.token_url, "Requesting access token");

        let issued_at = Utc::now();
        let response = self
            .client
            .post(&self.token_url)
            .basic_auth(
                self.credential.basic_user(),
                Some(self.credential.password_hash()),
            )
            .header(reqwest::header::ORIGIN, WEB_ORIGIN)
            .header(reqwest::header::REFERER, WEB_ORIGIN)
            .header(reqwest::header::ACCEPT_LANGUAGE, "en-au")
            .header(reqwest::header::ACCEPT, "application/json, text/plain, */*")
            .header(reqwest::header::USER_AGENT, &self.user_agent)
            .form(&[
                ("device_hardware_id", self.hardware_id.as_str()),
                ("device_name", DEVICE_NAME),
                ("device_type", DEVICE_TYPE),
                ("device_os", DEVICE_OS),
                ("device_app", DEVICE_APP),
            ])
            .send()
            .await
            .map_err(ProtocolError::Http)?;

        let status = response.status();
        if status != reqwest::StatusCode::OK {
            let reason = status.canonical_reason().unwrap_or("Unknown").to_string();
            tracing::error!(status = status.as_u16(), reason = %reason, "Unable to authenticate");
            return Err(Error::Authentication {
                status: status.as_u16(),
                reason,
            });
        }

        let body = response.text().await.map_err(ProtocolError::Http)?;
        let parsed = parse_token_response(&body);
        if parsed.access_token.is_empty() {
            tracing::warn!("Token response carried no access_token");
        }

        let token = Token::from_response(parsed, issued_at);
        tracing::info!(
            device_id = %token.device_id(),
            refresh_at = %token.refresh_at(),
            "Obtained access token"
        );
        Ok(token)
    }
}
