/// What happens when a shortcut is registered twice within the same scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DuplicateShortcutPolicy {
    /// The second registration fails with [`GuiError::DuplicateShortcut`](crate::GuiError::DuplicateShortcut).
    #[default]
    Reject,
    /// The last registration takes the binding over.
    Replace,
}

/// Configuration for creating a [`Gui`](crate::Gui).
#[derive(Debug, Clone)]
pub struct GuiAttributes {
    /// Conflict handling for shortcut bindings.
    pub duplicate_shortcuts: DuplicateShortcutPolicy,
    /// Whether native menu rows display their shortcut next to the label.
    pub shortcut_hints: bool,
    /// Whether the color picker lets the user edit alpha, where the platform supports it.
    pub color_picker_alpha: bool,
}

impl Default for GuiAttributes {
    fn default() -> Self {
        Self {
            duplicate_shortcuts: DuplicateShortcutPolicy::Reject,
            shortcut_hints: true,
            color_picker_alpha: true,
        }
    }
}

impl GuiAttributes {
    /// Set how duplicate shortcut registrations are handled.
    pub fn with_duplicate_shortcuts(mut self, policy: DuplicateShortcutPolicy) -> Self {
        self.duplicate_shortcuts = policy;
        self
    }

    /// Set whether native menu rows display shortcut hints.
    pub fn with_shortcut_hints(mut self, shortcut_hints: bool) -> Self {
        self.shortcut_hints = shortcut_hints;
        self
    }

    /// Set whether the color picker exposes an alpha control.
    ///
    /// Ignored on platforms whose dialog has no alpha channel; the initial alpha is kept there.
    pub fn with_color_picker_alpha(mut self, alpha: bool) -> Self {
        self.color_picker_alpha = alpha;
        self
    }
}
