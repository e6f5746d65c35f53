//! Platform-independent half of `winit_gui`: the menu tree, shortcut matching and
//! the [`Gui`] runtime, driving a platform's [`NativeBridge`].

pub mod attributes;
pub mod color;
pub mod error;
pub mod headless;
pub mod menu;
pub mod native;
pub mod runtime;
pub mod shortcut;

pub use attributes::{DuplicateShortcutPolicy, GuiAttributes};
pub use color::Rgba;
pub use error::{GuiError, Result};
pub use headless::{HeadlessBridge, NativeCall};
pub use menu::{Materialization, MenuCallback, MenuChild, MenuId, MenuItemId, MenuRole};
pub use native::{
    ColorDialogId, ColorPickerResponse, NativeBridge, NativeEvent, NativeEventProxy, NativeItem,
    NativeMenuHandle, NativeMenuKind, PopupPosition, event_channel,
};
pub use runtime::{ColorCallback, Gui};
pub use shortcut::{Modifiers, Shortcut, ShortcutIndex};
