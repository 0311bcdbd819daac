use std::collections::HashMap;

use minijinja::Environment;
use serde::Serialize;
use tracing::debug;

use crate::error::PromptError;
use crate::template::{BUILTIN_TEMPLATES, Prompt, PromptKind, PromptTemplate};

/// Manages prompt templates and renders them into [`Prompt`]s.
///
/// Every prompt is stored as two Jinja2 templates, `<name>/title` and
/// `<name>/message`, sharing one render context.
#[derive(Debug)]
pub struct PromptManager {
    env: Environment<'static>,
    kinds: HashMap<String, PromptKind>,
}

impl PromptManager {
    /// Create a manager preloaded with the built-in prompts.
    ///
    /// # Errors
    ///
    /// Returns `PromptError::InvalidTemplate` if a built-in template fails to parse.
    pub fn new() -> Result<Self, PromptError> {
        let mut manager = Self {
            env: Environment::new(),
            kinds: HashMap::new(),
        };

        for (name, kind, title, message) in BUILTIN_TEMPLATES {
            manager.add_template(PromptTemplate {
                name: (*name).to_owned(),
                kind: *kind,
                title: (*title).to_owned(),
                message: (*message).to_owned(),
            })?;
        }

        Ok(manager)
    }

    /// Register a prompt template, replacing any existing one with the same name.
    ///
    /// # Errors
    ///
    /// Returns `PromptError::InvalidTemplate` if either source fails to parse.
    pub fn add_template(&mut self, template: PromptTemplate) -> Result<(), PromptError> {
        let PromptTemplate {
            name,
            kind,
            title,
            message,
        } = template;

        self.env
            .add_template_owned(format!("{name}/title"), title)
            .map_err(|e| PromptError::InvalidTemplate(format!("{name}/title: {e}")))?;
        self.env
            .add_template_owned(format!("{name}/message"), message)
            .map_err(|e| PromptError::InvalidTemplate(format!("{name}/message: {e}")))?;

        debug!(name = %name, ?kind, "registered prompt template");
        self.kinds.insert(name, kind);
        Ok(())
    }

    /// Returns whether a template with the given name is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.kinds.contains_key(name)
    }

    /// Render a prompt by name with the given context.
    ///
    /// # Errors
    ///
    /// Returns `PromptError::TemplateNotFound` for an unknown name and
    /// `PromptError::RenderError` if rendering fails.
    pub fn render<S: Serialize>(&self, name: &str, ctx: S) -> Result<Prompt, PromptError> {
        let kind = *self
            .kinds
            .get(name)
            .ok_or_else(|| PromptError::TemplateNotFound(name.to_owned()))?;

        let title = self.render_part(name, "title", &ctx)?;
        let message = self.render_part(name, "message", &ctx)?;

        Ok(Prompt {
            kind,
            title,
            message,
        })
    }

    fn render_part<S: Serialize>(&self, name: &str, part: &str, ctx: &S) -> Result<String, PromptError> {
        let key = format!("{name}/{part}");
        self.env
            .get_template(&key)
            .map_err(|_| PromptError::TemplateNotFound(key.clone()))?
            .render(ctx)
            .map_err(|e| PromptError::RenderError(format!("{key}: {e}")))
    }
}
