//! Remote repository URL validation
//!
//! Only scp-style ssh remotes are accepted: `identity@host:path/to/repo.git`.

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

static SSH_REMOTE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[A-Za-z0-9._-]+@[A-Za-z0-9.-]+:[A-Za-z0-9._~/-]+\.git$")
        .expect("static regex is valid")
});

/// A validated ssh remote URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct RemoteUrl(String);

impl RemoteUrl {
    pub fn parse(url: &str) -> Result<Self> {
        if SSH_REMOTE.is_match(url) {
            Ok(Self(url.to_string()))
        } else {
            Err(Error::InvalidRemote {
                url: url.to_string(),
            })
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// `host:path` part without the identity, used in event metadata.
    pub fn repo_display(&self) -> &str {
        self.0.split_once('@').map(|(_, rest)| rest).unwrap_or(&self.0)
    }
}

impl TryFrom<String> for RemoteUrl {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(&value)
    }
}

impl From<RemoteUrl> for String {
    fn from(url: RemoteUrl) -> Self {
        url.0
    }
}

impl fmt::Display for RemoteUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn repo_display_drops_identity() {
        let url = RemoteUrl::parse("git@github.com:ops/configs.git").unwrap();
        assert_eq!(url.repo_display(), "github.com:ops/configs.git");
    }
}
