use super::{DisplaySurface, SourceSurface};

/// Holds the colorized markup of the latest source render.
#[derive(Debug, Clone)]
pub struct SourcePane {
    id: String,
    markup: String,
    generation: Option<u64>,
    visible: bool,
}

impl SourcePane {
    pub fn new() -> Self {
        Self {
            id: "source-pane".to_string(),
            markup: String::new(),
            generation: None,
            visible: false,
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }

    /// Generation of the markup on display.
    pub const fn generation(&self) -> Option<u64> {
        self.generation
    }
}

impl Default for SourcePane {
    fn default() -> Self {
        Self::new()
    }
}

impl DisplaySurface for SourcePane {
    fn id(&self) -> &str {
        &self.id
    }

    fn set_visible(&mut self, visible: bool) {
        self.visible = visible;
    }

    fn is_visible(&self) -> bool {
        self.visible
    }
}

impl SourceSurface for SourcePane {
    fn show(&mut self, generation: u64, markup: String) -> bool {
        if self.generation.is_some_and(|shown| shown > generation) {
            tracing::debug!(generation, shown = ?self.generation, "dropping stale source markup");
            return false;
        }
        self.generation = Some(generation);
        self.markup = markup;
        true
    }

    fn markup(&self) -> &str {
        &self.markup
    }
}
