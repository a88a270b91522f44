use std::time::Duration;

use url::Url;

use crate::error::ClientError;

pub const DEFAULT_PAGE_URL: &str = "http://127.0.0.1:8080/";
pub const DEFAULT_API_PREFIX: &str = "api";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Location of the page the client runs in; API paths resolve against it.
    pub page_url: Url,
    pub api_prefix: String,
    pub timeout: Duration,
    /// Sent as `Accept-Language` when set.
    pub locale: Option<String>,
}

impl ClientConfig {
    pub fn new(page_url: Url) -> Self {
        Self {
            page_url,
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            timeout: DEFAULT_TIMEOUT,
            locale: None,
        }
    }

    pub fn with_api_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.api_prefix = prefix.into();
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_locale(mut self, locale: impl Into<String>) -> Self {
        self.locale = Some(locale.into());
        self
    }

    /// Reads `JAVE_PAGE_URL`, `JAVE_API_PREFIX`, `JAVE_TIMEOUT_MS` and
    /// `JAVE_LOCALE`, falling back to the defaults for unset variables.
    pub fn from_env() -> Result<Self, ClientError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub(crate) fn from_lookup(
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ClientError> {
        let page = lookup("JAVE_PAGE_URL").unwrap_or_else(|| DEFAULT_PAGE_URL.to_string());
        let mut config = Self::new(Url::parse(&page)?);
        if let Some(prefix) = lookup("JAVE_API_PREFIX") {
            config.api_prefix = prefix;
        }
        if let Some(ms) = lookup("JAVE_TIMEOUT_MS") {
            let ms: u64 = ms
                .parse()
                .map_err(|_| {
                    ClientError::Config(format!("JAVE_TIMEOUT_MS is not a number: {ms}"))
                })?;
            config.timeout = Duration::from_millis(ms);
        }
        config.locale = lookup("JAVE_LOCALE").filter(|l| !l.is_empty());
        Ok(config)
    }

    /// The API root: the page location without fragment, query and last
    /// path segment, followed by the API prefix. Always ends in `/`.
    pub fn base_url(&self) -> Result<Url, ClientError> {
        let mut page = self.page_url.clone();
        page.set_fragment(None);
        page.set_query(None);
        let prefix = self.api_prefix.trim_matches('/');
        let relative = if prefix.is_empty() {
            "./".to_string()
        } else {
            format!("{prefix}/")
        };
        Ok(page.join(&relative)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn base(page: &str) -> String {
        ClientConfig::new(Url::parse(page).unwrap())
            .base_url()
            .unwrap()
            .to_string()
    }

    #[test]
    fn base_url_strips_fragment_and_last_segment() {
        assert_eq!(base("http://host/"), "http://host/api/");
        assert_eq!(base("http://host/index.html"), "http://host/api/");
        assert_eq!(base("http://host/app/index.html#project/1"), "http://host/app/api/");
        assert_eq!(base("http://host/a/b/c/?lang=de#x"), "http://host/a/b/c/api/");
    }

    #[test]
    fn prefix_slashes_are_ignored() {
        let config = ClientConfig::new(Url::parse("http://host/app/").unwrap())
            .with_api_prefix("/v2/api/");
        assert_eq!(config.base_url().unwrap().as_str(), "http://host/app/v2/api/");
        let config = config.with_api_prefix("");
        assert_eq!(config.base_url().unwrap().as_str(), "http://host/app/");
    }

    #[test]
    fn reads_environment() -> Result<(), ClientError> {
        let vars: HashMap<&str, &str> = HashMap::from([
            ("JAVE_PAGE_URL", "https://jave.example/ui/"),
            ("JAVE_TIMEOUT_MS", "250"),
            ("JAVE_LOCALE", "nb-no"),
        ]);
        let config = ClientConfig::from_lookup(|k| vars.get(k).map(|v| v.to_string()))?;
        assert_eq!(config.base_url()?.as_str(), "https://jave.example/ui/api/");
        assert_eq!(config.timeout, Duration::from_millis(250));
        assert_eq!(config.locale.as_deref(), Some("nb-no"));
        Ok(())
    }

    #[test]
    fn rejects_bad_timeout() {
        let result = ClientConfig::from_lookup(|k| {
            (k == "JAVE_TIMEOUT_MS").then(|| "soon".to_string())
        });
        assert!(matches!(result, Err(ClientError::Config(_))));
    }
}
