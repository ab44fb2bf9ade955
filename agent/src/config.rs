// Copyright 2019-2021 Parity Technologies (UK) Ltd.
//
// Permission is hereby granted, free of charge, to any
// person obtaining a copy of this software and associated
// documentation files (the "Software"), to deal in the
// Software without restriction, including without
// limitation the rights to use, copy, modify, merge,
// publish, distribute, sublicense, and/or sell copies of
// the Software, and to permit persons to whom the Software
// is furnished to do so, subject to the following
// conditions:
//
// The above copyright notice and this permission notice
// shall be included in all copies or substantial portions
// of the Software.
//
// THE SOFTWARE IS PROVIDED "AS IS", WITHOUT WARRANTY OF
// ANY KIND, EXPRESS OR IMPLIED, INCLUDING BUT NOT LIMITED
// TO THE WARRANTIES OF MERCHANTABILITY, FITNESS FOR A
// PARTICULAR PURPOSE AND NONINFRINGEMENT. IN NO EVENT
// SHALL THE AUTHORS OR COPYRIGHT HOLDERS BE LIABLE FOR ANY
// CLAIM, DAMAGES OR OTHER LIABILITY, WHETHER IN AN ACTION
// OF CONTRACT, TORT OR OTHERWISE, ARISING FROM, OUT OF OR
// IN CONNECTION WITH THE SOFTWARE OR THE USE OR OTHER
// DEALINGS IN THE SOFTWARE.

use vrpc_broker::Credentials;

use crate::error::ConfigError;

const RESERVED_CHARS: &[char] = &['+', '/', '#', '*'];

/// The agent's configuration surface. Every field besides `domain`
/// and `agent` has a default matching the spec.
#[derive(Debug, Clone)]
pub struct AgentConfig {
    pub domain: String,
    pub agent: String,
    pub credentials: Option<Credentials>,
    pub broker: String,
    pub best_effort: bool,
    pub version: String,
}

impl AgentConfig {
    pub fn new(domain: impl Into<String>, agent: impl Into<String>) -> Self {
        AgentConfig {
            domain: domain.into(),
            agent: agent.into(),
            credentials: None,
            broker: "mqtts://vrpc.io:8883".to_string(),
            best_effort: false,
            version: String::new(),
        }
    }

    pub fn with_credentials(mut self, credentials: Credentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn with_broker(mut self, broker: impl Into<String>) -> Self {
        self.broker = broker.into();
        self
    }

    pub fn with_best_effort(mut self, best_effort: bool) -> Self {
        self.best_effort = best_effort;
        self
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.domain.is_empty() {
            return Err(ConfigError::EmptyDomain);
        }
        if self.agent.is_empty() {
            return Err(ConfigError::EmptyAgent);
        }
        if self.domain.contains(RESERVED_CHARS) {
            return Err(ConfigError::InvalidDomain(self.domain.clone()));
        }
        if self.agent.contains(RESERVED_CHARS) {
            return Err(ConfigError::InvalidAgent(self.agent.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_wildcard_characters() {
        assert_eq!(AgentConfig::new("dom+ain", "agent").validate(), Err(ConfigError::InvalidDomain("dom+ain".into())));
        assert_eq!(AgentConfig::new("domain", "a/gent").validate(), Err(ConfigError::InvalidAgent("a/gent".into())));
    }

    #[test]
    fn defaults_match_spec() {
        let cfg = AgentConfig::new("d", "a");
        assert_eq!(cfg.broker, "mqtts://vrpc.io:8883");
        assert!(!cfg.best_effort);
        assert_eq!(cfg.version, "");
    }
}
