//! Session cookie rendering and request cookie parsing.

// std
use std::fmt::{Display, Formatter, Result as FmtResult};
// crates.io
use http::{HeaderMap, HeaderValue, header::COOKIE};
use serde::{Deserialize, Serialize};
// self
use crate::_prelude::*;

/// `SameSite` cookie attribute.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SameSite {
	/// Never sent on cross-site requests.
	#[default]
	Strict,
	/// Sent on top-level cross-site navigations.
	Lax,
	/// Always sent; requires `Secure` in modern browsers.
	None,
}
impl SameSite {
	fn as_str(self) -> &'static str {
		match self {
			Self::Strict => "Strict",
			Self::Lax => "Lax",
			Self::None => "None",
		}
	}
}

/// A `Set-Cookie` instruction for the session cookie.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCookie {
	/// Cookie name.
	pub name: String,
	/// Session id, or empty when clearing.
	pub value: String,
	/// `Path` attribute.
	pub path: String,
	/// `Expires` attribute.
	pub expires: Option<DateTime<Utc>>,
	/// `Max-Age` attribute in seconds.
	pub max_age: Option<i64>,
	/// `HttpOnly` attribute.
	pub http_only: bool,
	/// `Secure` attribute.
	pub secure: bool,
	/// `SameSite` attribute.
	pub same_site: SameSite,
}
impl SessionCookie {
	/// Cookie instructing the browser to forget the session.
	pub fn clearing(name: impl Into<String>, path: impl Into<String>, secure: bool) -> Self {
		Self {
			name: name.into(),
			value: String::new(),
			path: path.into(),
			expires: Some(DateTime::<Utc>::UNIX_EPOCH),
			max_age: Some(0),
			http_only: true,
			secure,
			same_site: SameSite::Strict,
		}
	}

	/// Whether this cookie removes the session from the browser.
	pub fn is_clearing(&self) -> bool {
		self.max_age.is_some_and(|max_age| max_age <= 0)
	}

	/// Render as a `Set-Cookie` header value.
	pub fn to_header_value(&self) -> Result<HeaderValue> {
		Ok(HeaderValue::from_str(&self.to_string()).map_err(http::Error::from)?)
	}
}
impl Display for SessionCookie {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		write!(f, "{}={}; Path={}", self.name, self.value, self.path)?;

		if let Some(expires) = self.expires {
			write!(f, "; Expires={}", httpdate::fmt_http_date(expires.into()))?;
		}
		if let Some(max_age) = self.max_age {
			write!(f, "; Max-Age={}", max_age.max(0))?;
		}
		if self.http_only {
			f.write_str("; HttpOnly")?;
		}
		if self.secure {
			f.write_str("; Secure")?;
		}

		write!(f, "; SameSite={}", self.same_site.as_str())
	}
}
impl std::fmt::Debug for SessionCookie {
	fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
		f.debug_struct("SessionCookie")
			.field("name", &self.name)
			.field("value", &crate::security::fingerprint(&self.value))
			.field("path", &self.path)
			.field("expires", &self.expires)
			.field("max_age", &self.max_age)
			.field("http_only", &self.http_only)
			.field("secure", &self.secure)
			.field("same_site", &self.same_site)
			.finish()
	}
}

/// Extract the first non-empty value of cookie `name` from request `Cookie` headers.
pub fn session_id_from_headers(headers: &HeaderMap, name: &str) -> Option<String> {
	headers
		.get_all(COOKIE)
		.iter()
		.filter_map(|value| value.to_str().ok())
		.flat_map(|value| value.split(';'))
		.filter_map(|pair| pair.trim().split_once('='))
		.find(|(key, value)| *key == name && !value.is_empty())
		.map(|(_, value)| value.trim_matches('"').to_owned())
}
