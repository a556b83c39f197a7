use std::fmt;

#[derive(Clone)]
pub struct Credentials {
	cookie_header: String,
	csrf_token: Option<String>,
	session_id: Option<String>,
}
impl Credentials {
	pub fn new(
		cookie_header: &str,
		csrf_token: Option<String>,
		session_id: Option<String>,
	) -> Self {
		Self { cookie_header: normalize_cookie_header(cookie_header), csrf_token, session_id }
	}

	pub fn from_config(auth: &nlm_config::Auth) -> Self {
		Self::new(&auth.cookie_header, auth.csrf_token.clone(), auth.session_id.clone())
	}

	pub fn cookie_header(&self) -> &str {
		&self.cookie_header
	}

	pub fn csrf_token(&self) -> Option<&str> {
		self.csrf_token.as_deref()
	}

	pub fn session_id(&self) -> Option<&str> {
		self.session_id.as_deref()
	}

	pub fn cookie_names(&self) -> Vec<&str> {
		self.cookie_header
			.split("; ")
			.filter_map(|pair| pair.split_once('=').map(|(name, _)| name))
			.collect()
	}
}
impl fmt::Debug for Credentials {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("Credentials")
			.field("cookies", &self.cookie_names())
			.field("csrf_token", &self.csrf_token.as_ref().map(|_| "<redacted>"))
			.field("session_id", &self.session_id)
			.finish()
	}
}

fn normalize_cookie_header(raw: &str) -> String {
	raw.split(';')
		.map(str::trim)
		.filter(|pair| pair.split_once('=').is_some_and(|(name, _)| !name.trim().is_empty()))
		.collect::<Vec<_>>()
		.join("; ")
}

#[cfg(test)]
mod tests {
	use super::Credentials;

	#[test]
	fn normalizes_copied_cookie_header() {
		let creds = Credentials::new(" SID=a;HSID=b ;; junk ; SSID=c=d ", None, None);

		assert_eq!(creds.cookie_header(), "SID=a; HSID=b; SSID=c=d");
		assert_eq!(creds.cookie_names(), vec!["SID", "HSID", "SSID"]);
	}

	#[test]
	fn debug_output_redacts_secrets() {
		let creds = Credentials::new("SID=secret-value", Some("csrf-secret".to_string()), None);
		let rendered = format!("{creds:?}");

		assert!(!rendered.contains("secret-value"), "cookie value leaked: {rendered}");
		assert!(!rendered.contains("csrf-secret"), "csrf token leaked: {rendered}");
	}
}
