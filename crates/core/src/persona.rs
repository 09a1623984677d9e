//! Persona — the person the assistant speaks as, and the system prompt
//! rendered from their background documents.
//!
//! Two documents are read once at startup:
//!
//! 1. **Summary** — a short free-text description written by the person
//! 2. **Profile** — the already-extracted text of their professional profile
//!
//! Unlike optional context files, both are required: a missing or empty
//! document aborts startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;
use crate::error::Error;

/// Where the persona's documents live.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonaPaths {
    pub summary: PathBuf,
    pub profile: PathBuf,
}

/// The identity and background content the assistant impersonates.
///
/// Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    name: String,
    summary: String,
    profile: String,
}

impl Persona {
    pub fn new(
        name: impl Into<String>,
        summary: impl Into<String>,
        profile: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            summary: summary.into(),
            profile: profile.into(),
        }
    }

    /// Load the persona documents from disk.
    pub fn load(name: impl Into<String>, paths: &PersonaPaths) -> Result<Self, Error> {
        let name = name.into();
        if name.trim().is_empty() {
            return Err(Error::Persona("persona name is empty".into()));
        }

        let summary = Self::read_document(&paths.summary, "summary")?;
        let profile = Self::read_document(&paths.profile, "profile")?;

        debug!(
            persona = %name,
            summary_len = summary.len(),
            profile_len = profile.len(),
            "Persona documents loaded"
        );

        Ok(Self { name, summary, profile })
    }

    fn read_document(path: &Path, kind: &str) -> Result<String, Error> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Persona(format!("cannot read {kind} at {}: {e}", path.display())))?;
        if content.trim().is_empty() {
            return Err(Error::Persona(format!("{kind} at {} is empty", path.display())));
        }
        Ok(content)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn summary(&self) -> &str {
        &self.summary
    }

    pub fn profile(&self) -> &str {
        &self.profile
    }

    /// Render the system prompt that puts the model in character.
    pub fn system_prompt(&self) -> String {
        let name = &self.name;
        let mut prompt = String::with_capacity(1024 + self.summary.len() + self.profile.len());

        prompt.push_str(&format!(
            "You are acting as {name}. You are answering questions on {name}'s website, \
particularly questions related to {name}'s career, background, skills and experience. \
Your responsibility is to represent {name} for interactions on the website as faithfully as possible. \
You are given a summary of {name}'s background and LinkedIn profile which you can use to answer questions. \
Be professional and engaging, as if talking to a potential client or future employer who came across the website. \
If you don't know the answer to any question, use your record_unknown_question tool to record the question that you couldn't answer, even if it's about something trivial or unrelated to career. \
If the user is engaging in discussion, try to steer them towards getting in touch via email; ask for their email and record it using your record_user_details tool. "
        ));

        prompt.push_str(&format!(
            "\n\n## Summary:\n{}\n\n## LinkedIn Profile:\n{}\n\n",
            self.summary, self.profile
        ));
        prompt.push_str(&format!(
            "With this context, please chat with the user, always staying in character as {name}."
        ));
        prompt
    }

    /// Estimate the token count of the rendered prompt (rough: 4 chars ≈ 1 token).
    pub fn estimated_tokens(&self) -> usize {
        self.system_prompt().len() / 4
    }

    /// Get a diagnostic summary of the loaded persona.
    pub fn diagnostic_summary(&self) -> String {
        let mut summary = String::new();
        summary.push_str(&format!("Persona: {}\n", self.name));
        summary.push_str(&format!("Summary: {} chars\n", self.summary.len()));
        summary.push_str(&format!("Profile: {} chars\n", self.profile.len()));
        summary.push_str(&format!(
            "System Prompt: ~{} tokens\n",
            self.estimated_tokens()
        ));
        summary
    }
}
