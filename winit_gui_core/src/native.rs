//! Contract between the dispatch runtime and a platform's native menus and dialogs.
//!
//! A [`NativeBridge`] only knows how to build native menus row by row, show them, and
//! open dialogs. Walking the abstract tree, caching native handles, and invoking user
//! callbacks is done by [`Gui`](crate::Gui), so activation behaves the same on every
//! platform.

use std::fmt;
use std::sync::{Arc, mpsc};

use rwh_06::RawWindowHandle;
use winit::dpi::PhysicalPosition;

use crate::color::Rgba;
use crate::menu::MenuItemId;
use crate::shortcut::Shortcut;

/// Opaque token for a native menu. Only the bridge that issued it knows what it refers to.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct NativeMenuHandle(usize);

impl NativeMenuHandle {
    /// Convert the `NativeMenuHandle` into the underlying integer.
    pub const fn into_raw(self) -> usize {
        self.0
    }

    /// Construct a `NativeMenuHandle` from the underlying integer.
    ///
    /// Bridges use this to mint handles for the native menus they create.
    pub const fn from_raw(id: usize) -> Self {
        Self(id)
    }
}

impl fmt::Debug for NativeMenuHandle {
    fn fmt(&self, fmtr: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(fmtr)
    }
}

/// Identifier of one color picker request, used to route its result back.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ColorDialogId(usize);

impl ColorDialogId {
    pub const fn into_raw(self) -> usize {
        self.0
    }

    pub const fn from_raw(id: usize) -> Self {
        Self(id)
    }
}

impl fmt::Debug for ColorDialogId {
    fn fmt(&self, fmtr: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(fmtr)
    }
}

/// What a native menu is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NativeMenuKind {
    /// Horizontal menu bar of a window or application.
    Bar,
    /// Drop-down or context popup menu.
    Popup,
}

/// A row to append to a native menu.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NativeItem<'a> {
    /// Reported back when the row is chosen.
    pub id: MenuItemId,
    pub label: &'a str,
    /// Shortcut hint to display next to the label, if any.
    pub shortcut: Option<Shortcut>,
}

/// Where a popup menu appears.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum PopupPosition {
    /// At the current pointer position.
    #[default]
    Pointer,
    /// At a position in physical pixels relative to the window's content area.
    Window(PhysicalPosition<i32>),
}

/// Immediate outcome of opening a color picker.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ColorPickerResponse {
    /// The dialog was modal and the user confirmed a color.
    Confirmed(Rgba),
    /// The dialog was modal and the user dismissed it.
    Cancelled,
    /// The dialog is still open; the result arrives as [`NativeEvent::ColorPicked`].
    Pending,
}

/// Events reported by a bridge outside of a blocking call.
#[non_exhaustive]
#[derive(Debug, Clone, PartialEq)]
pub enum NativeEvent {
    /// A row of a persistent native menu (e.g. the menu bar) was chosen.
    MenuItemActivated { id: MenuItemId },
    /// A pending color picker closed. `None` means it was cancelled.
    ColorPicked {
        dialog: ColorDialogId,
        color: Option<Rgba>,
    },
}

/// Proxy function type used by bridges to report [`NativeEvent`]s.
pub type NativeEventProxy = Arc<dyn Fn(NativeEvent) + Send + Sync>;

/// Create the channel native events travel through.
///
/// `wake` is called after each send so the host event loop gets a chance to drain
/// the receiver, typically `EventLoopProxy::wake_up`.
pub fn event_channel<W>(wake: W) -> (NativeEventProxy, mpsc::Receiver<NativeEvent>)
where
    W: Fn() + Send + Sync + 'static,
{
    let (sender, receiver) = mpsc::channel();
    let proxy: NativeEventProxy = Arc::new(move |event| {
        if let Err(e) = sender.send(event) {
            tracing::error!("Failed to send native event: {e}");
        }
        wake();
    });
    (proxy, receiver)
}

/// Platform adapter for native menus and dialogs.
///
/// All methods are called from the event-loop thread. Handles passed in were
/// returned by the same bridge's [`create_menu`](NativeBridge::create_menu) and
/// have not been released.
pub trait NativeBridge: fmt::Debug {
    /// Create an empty native menu.
    fn create_menu(&mut self, kind: NativeMenuKind, title: &str) -> anyhow::Result<NativeMenuHandle>;

    /// Append a clickable row.
    fn append_item(&mut self, menu: NativeMenuHandle, item: NativeItem<'_>) -> anyhow::Result<()>;

    /// Append a separator line.
    fn append_separator(&mut self, menu: NativeMenuHandle) -> anyhow::Result<()>;

    /// Append an expandable row opening `submenu`.
    fn append_submenu(
        &mut self,
        menu: NativeMenuHandle,
        title: &str,
        submenu: NativeMenuHandle,
    ) -> anyhow::Result<()>;

    /// Remove the row opening `submenu` from `menu` without releasing `submenu`.
    fn remove_submenu(&mut self, menu: NativeMenuHandle, submenu: NativeMenuHandle) -> anyhow::Result<()>;

    /// Show `menu` as a context menu and block until it closes.
    ///
    /// Returns the chosen row, or `None` if the menu was dismissed.
    fn popup(
        &mut self,
        window: RawWindowHandle,
        menu: NativeMenuHandle,
        position: PopupPosition,
    ) -> anyhow::Result<Option<MenuItemId>>;

    /// Install `menu` as the persistent menu bar of `window`.
    ///
    /// A [`NativeMenuKind::Popup`] menu is shown as a single top-level entry titled
    /// with the menu's title. Rows chosen from the bar are reported as
    /// [`NativeEvent::MenuItemActivated`].
    fn attach_to_bar(&mut self, window: RawWindowHandle, menu: NativeMenuHandle) -> anyhow::Result<()>;

    /// Remove whatever menu bar is installed on `window`.
    fn detach_from_bar(&mut self, window: RawWindowHandle);

    /// Release `menu` and every native menu nested in it.
    fn release(&mut self, menu: NativeMenuHandle);

    /// Open a color selection dialog pre-seeded with `initial`.
    fn show_color_picker(
        &mut self,
        window: RawWindowHandle,
        dialog: ColorDialogId,
        initial: Rgba,
        show_alpha: bool,
    ) -> anyhow::Result<ColorPickerResponse>;
}
