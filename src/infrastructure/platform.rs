//! Platform adapters.
//!
//! [`ServerPlatform`] describes the host process; [`ClientPlatform`] describes
//! a user agent loading a page. Either is composed into the notifier and
//! stamps its details into every notice's context.

use crate::application::ports::PlatformAdapter;
use crate::domain::value::{Map, Value};
use std::env;

/// Host process details.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServerPlatform {
    os: String,
    architecture: String,
    hostname: Option<String>,
    root_directory: Option<String>,
}

impl ServerPlatform {
    /// Detect the current host.
    ///
    /// The hostname is read from `HOSTNAME` or `COMPUTERNAME`; the root
    /// directory is the working directory.
    pub fn detect() -> Self {
        let hostname = ["HOSTNAME", "COMPUTERNAME"]
            .iter()
            .find_map(|key| env::var(key).ok().filter(|v| !v.is_empty()));
        let root_directory = env::current_dir()
            .ok()
            .map(|dir| dir.display().to_string());

        Self {
            os: env::consts::OS.to_string(),
            architecture: env::consts::ARCH.to_string(),
            hostname,
            root_directory,
        }
    }

    /// Override the hostname.
    pub fn with_hostname(mut self, hostname: impl Into<String>) -> Self {
        self.hostname = Some(hostname.into());
        self
    }

    /// Override the root directory.
    pub fn with_root_directory(mut self, root_directory: impl Into<String>) -> Self {
        self.root_directory = Some(root_directory.into());
        self
    }
}

impl PlatformAdapter for ServerPlatform {
    fn report_platform_context(&self, context: &mut Map) {
        context.insert("os".to_string(), Value::from(self.os.as_str()));
        context.insert(
            "architecture".to_string(),
            Value::from(self.architecture.as_str()),
        );
        if let Some(hostname) = &self.hostname {
            context.insert("hostname".to_string(), Value::from(hostname.as_str()));
        }
        if let Some(root) = &self.root_directory {
            context.insert("rootDirectory".to_string(), Value::from(root.as_str()));
        }
    }
}

/// User agent and page details.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClientPlatform {
    user_agent: Option<String>,
    url: Option<String>,
}

impl ClientPlatform {
    /// A client with no known details.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the user agent string.
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Set the page URL.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    /// Scheme and host of the page URL, e.g. `https://example.com`.
    pub fn root_directory(&self) -> Option<&str> {
        let url = self.url.as_deref()?;
        let (scheme, rest) = url.split_once("://")?;
        let host_len = rest.find(['/', '?', '#']).unwrap_or(rest.len());
        Some(&url[..scheme.len() + 3 + host_len])
    }
}

impl PlatformAdapter for ClientPlatform {
    fn report_platform_context(&self, context: &mut Map) {
        if let Some(user_agent) = &self.user_agent {
            context.insert("userAgent".to_string(), Value::from(user_agent.as_str()));
        }
        if let Some(url) = &self.url {
            context.insert("url".to_string(), Value::from(url.as_str()));
        }
        if let Some(root) = self.root_directory() {
            context.insert("rootDirectory".to_string(), Value::from(root));
        }
    }
}
