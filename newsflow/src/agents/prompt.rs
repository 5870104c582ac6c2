//! Prompt templates loaded once per agent.

use crate::errors::Result;
use std::io::ErrorKind;
use std::path::Path;
use tracing::debug;

/// A system prompt plus a user prompt with `{{name}}` placeholders.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromptTemplate {
    system: String,
    user: String,
}

impl PromptTemplate {
    /// Creates a template.
    #[must_use]
    pub fn new(system: impl Into<String>, user: impl Into<String>) -> Self {
        Self {
            system: system.into(),
            user: user.into(),
        }
    }

    /// Loads `<dir>/<agent>.system.md` and `<dir>/<agent>.user.md`, falling
    /// back to `default` for whichever file is absent.
    pub async fn load(dir: Option<&Path>, agent: &str, default: Self) -> Result<Self> {
        let Some(dir) = dir else {
            return Ok(default);
        };

        let system = read_optional(&dir.join(format!("{agent}.system.md"))).await?;
        let user = read_optional(&dir.join(format!("{agent}.user.md"))).await?;
        if system.is_some() || user.is_some() {
            debug!(agent, dir = %dir.display(), "Loaded prompt overrides");
        }

        Ok(Self {
            system: system.unwrap_or(default.system),
            user: user.unwrap_or(default.user),
        })
    }

    /// The system prompt.
    #[must_use]
    pub fn system(&self) -> &str {
        &self.system
    }

    /// Renders the user prompt, substituting each `{{key}}`.
    #[must_use]
    pub fn render_user(&self, vars: &[(&str, &str)]) -> String {
        let mut rendered = self.user.clone();
        for (key, value) in vars {
            rendered = rendered.replace(&format!("{{{{{key}}}}}"), value);
        }
        rendered
    }
}

async fn read_optional(path: &Path) -> Result<Option<String>> {
    match tokio::fs::read_to_string(path).await {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}
