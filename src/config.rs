//! Provider client and session configuration with validation.

// std
use std::fmt::{Debug, Formatter, Result as FmtResult};
// crates.io
use serde::{Deserialize, Serialize};
use url::Url;
// self
use crate::{_prelude::*, security};

/// Discovery document for Google accounts.
pub const GOOGLE_DISCOVERY_URL: &str = "https://accounts.google.com/.well-known/openid-configuration";
/// Provider id used by [`ClientConfig::google`].
pub const GOOGLE_PROVIDER_ID: &str = "google";
/// Default size guard (1 MiB) for provider responses.
pub const DEFAULT_MAX_RESPONSE_BYTES: u64 = 1_048_576;
/// Default session cookie name.
pub const DEFAULT_SESSION_COOKIE: &str = "session_id";
/// Default session lifetime.
pub const DEFAULT_SESSION_LIFETIME: Duration = Duration::from_secs(60 * 60 * 24);

/// How the nonce sent to the provider relates to the state token.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NonceMode {
	/// The state token doubles as the nonce; the returned nonce must equal the callback state.
	#[default]
	ReuseState,
	/// A second one-time token is issued as the nonce.
	Independent,
}

/// Relying-party registration with a single OpenID provider.
#[derive(Clone, Serialize, Deserialize)]
pub struct ClientConfig {
	/// Stable identifier of the provider, recorded on linked identities.
	pub provider_id: String,
	/// OAuth client id issued by the provider.
	pub client_id: String,
	/// OAuth client secret issued by the provider.
	pub client_secret: String,
	/// Callback URL registered with the provider.
	pub redirect_url: Url,
	/// Provider discovery document URL.
	pub discovery_url: Url,
	/// Scopes requested in the authorization redirect.
	#[serde(default = "default_scopes")]
	pub scopes: Vec<String>,
	/// Whether provider endpoints must use HTTPS.
	#[serde(default = "default_true")]
	pub require_https: bool,
	/// Nonce issuance strategy.
	#[serde(default)]
	pub nonce_mode: NonceMode,
	/// Maximum size allowed for discovery payloads in bytes.
	#[serde(default = "default_max_response_bytes")]
	pub max_response_bytes: u64,
}
impl ClientConfig {
	/// Construct a configuration with default scopes and transport settings.
	pub fn new(
		provider_id: impl Into<String>,
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		redirect_url: impl AsRef<str>,
		discovery_url: impl AsRef<str>,
	) -> Result<Self> {
		let redirect_url = Url::parse(redirect_url.as_ref())?;
		let discovery_url = Url::parse(discovery_url.as_ref())?;

		Ok(Self {
			provider_id: provider_id.into(),
			client_id: client_id.into(),
			client_secret: client_secret.into(),
			redirect_url,
			discovery_url,
			scopes: default_scopes(),
			require_https: true,
			nonce_mode: NonceMode::default(),
			max_response_bytes: DEFAULT_MAX_RESPONSE_BYTES,
		})
	}

	/// Google preset: callback at `{base_url}/callbacks/google` and Google's discovery document.
	pub fn google(
		client_id: impl Into<String>,
		client_secret: impl Into<String>,
		base_url: &Url,
	) -> Result<Self> {
		let redirect_url = format!("{}/callbacks/google", base_url.as_str().trim_end_matches('/'));

		Self::new(GOOGLE_PROVIDER_ID, client_id, client_secret, redirect_url, GOOGLE_DISCOVERY_URL)
	}

	/// Set HTTPS requirement to the desired value.
	pub fn with_require_https(mut self, require_https: bool) -> Self {
		self.require_https = require_https;

		self
	}

	/// Replace the requested scopes.
	pub fn with_scopes<I, S>(mut self, scopes: I) -> Self
	where
		I: IntoIterator<Item = S>,
		S: Into<String>,
	{
		self.scopes = scopes.into_iter().map(Into::into).collect();

		self
	}

	/// Select the nonce issuance strategy.
	pub fn with_nonce_mode(mut self, nonce_mode: NonceMode) -> Self {
		self.nonce_mode = nonce_mode;

		self
	}

	/// Validate the configuration against the documented constraints.
	pub fn validate(&self) -> Result<()> {
		validate_provider_id(&self.provider_id)?;

		if self.client_id.trim().is_empty() {
			return Err(Error::Validation { field: "client_id", reason: "Must not be empty.".into() });
		}
		if self.client_secret.is_empty() {
			return Err(Error::Validation {
				field: "client_secret",
				reason: "Must not be empty.".into(),
			});
		}
		if !self.scopes.iter().any(|scope| scope == "openid") {
			return Err(Error::Validation {
				field: "scopes",
				reason: "Must include the 'openid' scope.".into(),
			});
		}
		if self.scopes.iter().any(|scope| scope.is_empty() || scope.contains(' ')) {
			return Err(Error::Validation {
				field: "scopes",
				reason: "Entries must be non-empty and contain no spaces.".into(),
			});
		}
		if self.redirect_url.host_str().is_none() {
			return Err(Error::Validation {
				field: "redirect_url",
				reason: "Must include a host component.".into(),
			});
		}
		if self.discovery_url.host_str().is_none() {
			return Err(Error::Validation {
				field: "discovery_url",
				reason: "Must include a host component.".into(),
			});
		}
		if self.require_https {
			security::enforce_https(&self.discovery_url)?;
		}
		if self.max_response_bytes == 0 {
			return Err(Error::Validation {
				field: "max_response_bytes",
				reason: "Must be greater than zero.".into(),
			});
		}

		Ok(())
	}
}
impl Debug for ClientConfig {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("ClientConfig")
			.field("provider_id", &self.provider_id)
			.field("client_id", &self.client_id)
			.field("client_secret", &"<redacted>")
			.field("redirect_url", &self.redirect_url.as_str())
			.field("discovery_url", &self.discovery_url.as_str())
			.field("scopes", &self.scopes)
			.field("require_https", &self.require_https)
			.field("nonce_mode", &self.nonce_mode)
			.field("max_response_bytes", &self.max_response_bytes)
			.finish()
	}
}

/// Local session settings.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SessionConfig {
	/// Public base URL of the application; an `https` scheme marks cookies `Secure`.
	pub base_url: Url,
	/// Name of the session cookie.
	#[serde(default = "default_cookie_name")]
	pub cookie_name: String,
	/// Maximum session age.
	#[serde(default = "default_session_lifetime")]
	pub lifetime: Duration,
	/// Path attribute of the session cookie.
	#[serde(default = "default_cookie_path")]
	pub cookie_path: String,
}
impl SessionConfig {
	/// Construct settings with the default cookie name, path, and one-day lifetime.
	pub fn new(base_url: impl AsRef<str>) -> Result<Self> {
		let base_url = Url::parse(base_url.as_ref())?;

		Ok(Self {
			base_url,
			cookie_name: default_cookie_name(),
			lifetime: DEFAULT_SESSION_LIFETIME,
			cookie_path: default_cookie_path(),
		})
	}

	/// Override the session lifetime.
	pub fn with_lifetime(mut self, lifetime: Duration) -> Self {
		self.lifetime = lifetime;

		self
	}

	/// Override the cookie name.
	pub fn with_cookie_name(mut self, cookie_name: impl Into<String>) -> Self {
		self.cookie_name = cookie_name.into();

		self
	}

	/// Whether cookies must carry the `Secure` attribute.
	pub fn is_secure(&self) -> bool {
		self.base_url.scheme() == "https"
	}

	/// Application root that a finished login redirects to.
	pub fn home_url(&self) -> Result<Url> {
		Ok(Url::parse(&format!("{}/", self.base_url.as_str().trim_end_matches('/')))?)
	}

	/// Validate the settings against the documented constraints.
	pub fn validate(&self) -> Result<()> {
		if self.base_url.host_str().is_none() {
			return Err(Error::Validation {
				field: "base_url",
				reason: "Must include a host component.".into(),
			});
		}
		if self.cookie_name.is_empty()
			|| !self.cookie_name.bytes().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_'))
		{
			return Err(Error::Validation {
				field: "cookie_name",
				reason: "Must be non-empty ASCII letters, numbers, '-', or '_'.".into(),
			});
		}
		if self.lifetime < Duration::from_secs(1) {
			return Err(Error::Validation {
				field: "lifetime",
				reason: "Must be at least 1 second.".into(),
			});
		}
		if !self.cookie_path.starts_with('/') || self.cookie_path.contains(';') {
			return Err(Error::Validation {
				field: "cookie_path",
				reason: "Must start with '/' and contain no ';'.".into(),
			});
		}

		Ok(())
	}
}

fn default_true() -> bool {
	true
}

fn default_scopes() -> Vec<String> {
	vec!["openid".into(), "email".into()]
}

fn default_max_response_bytes() -> u64 {
	DEFAULT_MAX_RESPONSE_BYTES
}

fn default_cookie_name() -> String {
	DEFAULT_SESSION_COOKIE.into()
}

fn default_cookie_path() -> String {
	"/".into()
}

fn default_session_lifetime() -> Duration {
	DEFAULT_SESSION_LIFETIME
}

fn validate_provider_id(value: &str) -> Result<()> {
	if value.is_empty() {
		return Err(Error::Validation { field: "provider_id", reason: "Must not be empty.".into() });
	}
	if value.len() > 64 {
		return Err(Error::Validation {
			field: "provider_id",
			reason: "Must be 64 characters or fewer.".into(),
		});
	}
	if !value.as_bytes().iter().all(|b| b.is_ascii_alphanumeric() || matches!(b, b'-' | b'_')) {
		return Err(Error::Validation {
			field: "provider_id",
			reason: "May only contain ASCII letters, numbers, '-', or '_'.".into(),
		});
	}

	Ok(())
}
