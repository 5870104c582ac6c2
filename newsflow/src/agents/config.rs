//! Per-agent configuration and caller overrides.

use crate::errors::Result;
use crate::pipeline::RetryPolicy;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;

/// Effective configuration of one agent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Timeout for each external call, in seconds.
    pub timeout_secs: u64,
    /// Attempts per external call (including the first).
    pub max_attempts: usize,
    /// Base delay between attempts, in milliseconds.
    pub retry_base_delay_ms: u64,
    /// Chat model; `None` uses the client's default.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Sampling temperature.
    pub temperature: f32,
    /// Completion token limit.
    pub max_tokens: u32,
    /// Agent-specific settings.
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            max_attempts: 3,
            retry_base_delay_ms: 1000,
            model: None,
            temperature: 0.3,
            max_tokens: 1500,
            extra: Map::new(),
        }
    }
}

/// Caller-supplied values merged over an agent's defaults.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AgentConfigOverrides {
    /// Timeout override.
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    /// Attempt limit override.
    #[serde(default)]
    pub max_attempts: Option<usize>,
    /// Retry delay override.
    #[serde(default)]
    pub retry_base_delay_ms: Option<u64>,
    /// Model override.
    #[serde(default)]
    pub model: Option<String>,
    /// Temperature override.
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Token limit override.
    #[serde(default)]
    pub max_tokens: Option<u32>,
    /// Agent-specific overrides; keys replace the defaults one by one.
    #[serde(default)]
    pub extra: Map<String, Value>,
}

impl AgentConfigOverrides {
    /// Sets the attempt limit.
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    /// Sets the retry delay.
    #[must_use]
    pub fn with_retry_base_delay_ms(mut self, delay: u64) -> Self {
        self.retry_base_delay_ms = Some(delay);
        self
    }

    /// Sets an agent-specific value.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }
}

impl AgentConfig {
    /// Applies caller overrides; caller values win.
    #[must_use]
    pub fn merged(mut self, overrides: Option<&AgentConfigOverrides>) -> Self {
        let Some(o) = overrides else {
            return self;
        };
        if let Some(v) = o.timeout_secs {
            self.timeout_secs = v;
        }
        if let Some(v) = o.max_attempts {
            self.max_attempts = v;
        }
        if let Some(v) = o.retry_base_delay_ms {
            self.retry_base_delay_ms = v;
        }
        if let Some(ref v) = o.model {
            self.model = Some(v.clone());
        }
        if let Some(v) = o.temperature {
            self.temperature = v;
        }
        if let Some(v) = o.max_tokens {
            self.max_tokens = v;
        }
        for (key, value) in &o.extra {
            self.extra.insert(key.clone(), value.clone());
        }
        self
    }

    /// Sets an agent-specific value.
    #[must_use]
    pub fn with_extra(mut self, key: impl Into<String>, value: Value) -> Self {
        self.extra.insert(key.into(), value);
        self
    }

    /// Timeout for each external call.
    #[must_use]
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Builds the retry policy for this agent's external calls.
    pub fn retry_policy(&self) -> Result<RetryPolicy> {
        Ok(RetryPolicy::new(self.max_attempts)?
            .with_base_delay(Duration::from_millis(self.retry_base_delay_ms))
            .with_attempt_timeout(self.timeout()))
    }

    /// Reads a string setting.
    #[must_use]
    pub fn extra_str(&self, key: &str) -> Option<&str> {
        self.extra.get(key).and_then(Value::as_str)
    }

    /// Reads a boolean setting.
    #[must_use]
    pub fn extra_bool(&self, key: &str, default: bool) -> bool {
        self.extra.get(key).and_then(Value::as_bool).unwrap_or(default)
    }

    /// Reads a numeric setting.
    #[must_use]
    pub fn extra_f64(&self, key: &str, default: f64) -> f64 {
        self.extra.get(key).and_then(Value::as_f64).unwrap_or(default)
    }

    /// Reads an unsigned integer setting.
    #[must_use]
    pub fn extra_usize(&self, key: &str, default: usize) -> usize {
        self.extra
            .get(key)
            .and_then(Value::as_u64)
            .and_then(|v| usize::try_from(v).ok())
            .unwrap_or(default)
    }

    /// Reads a list of strings; non-string entries are skipped.
    #[must_use]
    pub fn extra_str_list(&self, key: &str) -> Vec<String> {
        self.extra
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Flattens the configuration into a JSON map for introspection.
    #[must_use]
    pub fn to_map(&self) -> Map<String, Value> {
        match serde_json::to_value(self) {
            Ok(Value::Object(map)) => map,
            _ => Map::new(),
        }
    }
}
