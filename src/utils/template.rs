use handlebars::{Handlebars, no_escape};
use serde_json::{self};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum TEngineError {
    #[error("Template error")]
    TemplateError(#[from] handlebars::TemplateError),
    #[error("Render error")]
    RenderError(#[from] handlebars::RenderError),
}

/// A thin wrapper around handlebars used to render the extraction prompt.
///
/// Escaping is disabled: document text goes into the prompt verbatim, not
/// HTML-escaped.
pub struct TEngine {
    handlebars: Handlebars<'static>,
}

impl Default for TEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TEngine {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();
        handlebars.register_escape_fn(no_escape);
        TEngine { handlebars }
    }

    pub fn register_template_string(
        &mut self,
        name: &str,
        template: &str,
    ) -> Result<(), TEngineError> {
        self.handlebars.register_template_string(name, template)?;
        Ok(())
    }

    /// Renders a previously registered template.
    pub fn render(&self, name: &str, data: &serde_json::Value) -> Result<String, TEngineError> {
        let result = self.handlebars.render(name, data)?;
        Ok(result)
    }
}
