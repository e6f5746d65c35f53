use thiserror::Error;

use crate::menu::{MenuId, MenuItemId};
use crate::shortcut::Shortcut;

/// Errors returned by [`Gui`](crate::Gui) operations.
///
/// Shortcut dispatch never produces an error; an unmatched shortcut is a no-op.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum GuiError {
    /// The menu handle is stale or was never issued by this context.
    #[error("menu {0:?} does not exist")]
    InvalidMenu(MenuId),

    /// The menu item handle is stale or was never issued by this context.
    #[error("menu item {0:?} does not exist")]
    InvalidItem(MenuItemId),

    /// The binding is already taken within the same shortcut scope.
    #[error("shortcut {shortcut} is already bound to menu item {existing:?}")]
    DuplicateShortcut {
        shortcut: Shortcut,
        existing: MenuItemId,
    },

    /// The platform refused to create or update a native menu or dialog.
    #[error("native resource error: {0}")]
    NativeResource(#[from] anyhow::Error),

    /// A color picker is already open for this window.
    #[error("a color picker dialog is already open for this window")]
    DialogAlreadyOpen,

    /// The window did not hand out a raw window handle.
    #[error("window handle unavailable: {0}")]
    WindowHandle(#[from] rwh_06::HandleError),
}

pub type Result<T> = std::result::Result<T, GuiError>;
