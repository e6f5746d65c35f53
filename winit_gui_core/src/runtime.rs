//! Dispatch runtime: the context object an application drives from its event loop.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::sync::mpsc;

use rwh_06::{HasWindowHandle, RawWindowHandle};
use tracing::{debug, trace, warn};

use crate::attributes::{DuplicateShortcutPolicy, GuiAttributes};
use crate::color::Rgba;
use crate::error::{GuiError, Result};
use crate::headless::HeadlessBridge;
use crate::menu::{Materialization, MenuChild, MenuId, MenuItemId, MenuRole, MenuStore};
use crate::native::{
    ColorDialogId, ColorPickerResponse, NativeBridge, NativeEvent, NativeItem, NativeMenuHandle,
    NativeMenuKind, PopupPosition, event_channel,
};
use crate::shortcut::{Modifiers, Shortcut, ShortcutIndex};

/// Callback receiving the color confirmed in a color picker.
pub type ColorCallback = Box<dyn FnOnce(Rgba)>;

struct PendingColorPicker {
    window: RawWindowHandle,
    callback: ColorCallback,
}

/// Menus, shortcuts and dialogs of one application.
///
/// `Gui` owns the menu tree, the shortcut index and the platform bridge. It must
/// stay on the thread running the event loop: nothing in it is synchronized, and
/// callbacks run synchronously on the thread calling into it.
///
/// `T` is the user data stored with every menu item and handed to its callback.
pub struct Gui<T = ()> {
    attributes: GuiAttributes,
    store: MenuStore<T>,
    index: ShortcutIndex,
    // roots whose items take part in shortcut matching, in the order they joined
    scope: Vec<MenuId>,
    application_menus: HashMap<RawWindowHandle, MenuId>,
    bars: HashMap<RawWindowHandle, MenuId>,
    color_pickers: HashMap<ColorDialogId, PendingColorPicker>,
    next_dialog: usize,
    bridge: Box<dyn NativeBridge>,
    events: mpsc::Receiver<NativeEvent>,
}

impl<T> fmt::Debug for Gui<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Gui")
            .field("attributes", &self.attributes)
            .field("store", &self.store)
            .field("index", &self.index)
            .field("scope", &self.scope)
            .field("bridge", &self.bridge)
            .field("events", &"<...>")
            .finish_non_exhaustive()
    }
}

impl<T> Gui<T> {
    /// Create a context driving `bridge`. `events` is the receiving end of the
    /// channel the bridge reports native events to, see [`event_channel`].
    pub fn new(
        bridge: Box<dyn NativeBridge>,
        events: mpsc::Receiver<NativeEvent>,
        attributes: GuiAttributes,
    ) -> Self {
        debug!(?attributes, ?bridge, "creating gui context");
        Self {
            attributes,
            store: MenuStore::new(),
            index: ShortcutIndex::new(),
            scope: Vec::new(),
            application_menus: HashMap::new(),
            bars: HashMap::new(),
            color_pickers: HashMap::new(),
            next_dialog: 1,
            bridge,
            events,
        }
    }

    /// Create a context without native UI, returning the bridge to script it.
    pub fn headless(attributes: GuiAttributes) -> (Self, HeadlessBridge) {
        let (proxy, events) = event_channel(|| {});
        let bridge = HeadlessBridge::new(proxy);
        (Self::new(Box::new(bridge.clone()), events, attributes), bridge)
    }

    pub fn attributes(&self) -> &GuiAttributes {
        &self.attributes
    }

    /// Create a free-standing menu, e.g. for context popups.
    ///
    /// Nothing native is created until the menu is first shown or attached.
    pub fn new_menu(&mut self, name: &str) -> MenuId {
        let id = self.store.create_menu(name, MenuRole::FreeStanding);
        debug!(menu = ?id, name, "created menu");
        id
    }

    /// Return the menu-bar menu of `window`, creating and attaching it on first use.
    ///
    /// If the platform refuses to attach it, the menu is still returned and attaching
    /// is retried on the next call.
    #[cfg(feature = "menu_bar")]
    pub fn application_menu(&mut self, window: &(impl HasWindowHandle + ?Sized)) -> Result<MenuId> {
        let window = window.window_handle()?.as_raw();
        let menu = match self.application_menus.get(&window) {
            Some(menu) => *menu,
            None => {
                let menu = self.store.create_menu("", MenuRole::Application);
                self.application_menus.insert(window, menu);
                debug!(menu = ?menu, "created application menu");
                menu
            }
        };

        if let Err(err) = self.attach(window, menu) {
            warn!(menu = ?menu, "application menu not attached, retrying on next request: {err}");
        }
        Ok(menu)
    }

    /// Append an item to the end of `menu`.
    ///
    /// `callback` runs whenever the item is chosen in a native menu or its shortcut is
    /// pressed. `data` is owned by the item and passed to every invocation.
    pub fn append_item<F>(
        &mut self,
        menu: MenuId,
        name: &str,
        shortcut: Option<Shortcut>,
        data: T,
        callback: F,
    ) -> Result<MenuItemId>
    where
        F: Fn(MenuItemId, &T) + 'static,
    {
        let root = self.store.root_of(menu)?;
        let in_scope = self.scope.contains(&root);

        if let Some(shortcut) = shortcut {
            let existing = if in_scope {
                self.index.resolve(shortcut)
            } else {
                self.store.find_binding(root, shortcut)?
            };
            if let Some(existing) = existing {
                match self.attributes.duplicate_shortcuts {
                    DuplicateShortcutPolicy::Reject => {
                        return Err(GuiError::DuplicateShortcut { shortcut, existing });
                    }
                    DuplicateShortcutPolicy::Replace => {
                        warn!(%shortcut, shadowed = ?existing, "shortcut taken over by new item");
                    }
                }
            }
        }

        let id = self.store.add_item(menu, name, shortcut, data, Box::new(callback))?;
        debug!(menu = ?menu, item = ?id, name, ?shortcut, "appended menu item");

        if let (true, Some(shortcut)) = (in_scope, shortcut) {
            if let Some(previous) = self.index.replace(shortcut, id) {
                self.refresh_hint(previous)?;
            }
        }

        if let Materialization::Materialized(handle) = self.store.menu(menu)?.state {
            let item = native_item(&self.store, &self.index, &self.attributes, id)?;
            if let Err(err) = self.bridge.append_item(handle, item) {
                warn!(menu = ?menu, item = ?id, "failed to append native row: {err:#}");
                self.mark_stale(menu)?;
            }
        }

        Ok(id)
    }

    /// Append a new sub-menu to the end of `menu` and return it for populating.
    pub fn append_submenu(&mut self, menu: MenuId, name: &str) -> Result<MenuId> {
        let id = self.store.add_submenu(menu, name)?;
        debug!(parent = ?menu, menu = ?id, name, "appended sub-menu");
        self.append_native(menu, MenuChild::Menu(id))?;
        Ok(id)
    }

    /// Append a separator line to the end of `menu`.
    pub fn append_separator(&mut self, menu: MenuId) -> Result<()> {
        self.store.add_separator(menu)?;
        trace!(menu = ?menu, "appended separator");
        self.append_native(menu, MenuChild::Separator)
    }

    /// Show `menu` as a context menu at the pointer and block until it closes.
    ///
    /// The chosen item's callback runs before this returns. Returns the chosen item,
    /// or `None` if the menu was dismissed.
    #[cfg(feature = "context_menu")]
    pub fn popup_menu(
        &mut self,
        window: &(impl HasWindowHandle + ?Sized),
        menu: MenuId,
    ) -> Result<Option<MenuItemId>> {
        self.popup_menu_at(window, menu, PopupPosition::Pointer)
    }

    /// Like [`popup_menu`](Self::popup_menu), at an explicit position.
    #[cfg(feature = "context_menu")]
    pub fn popup_menu_at(
        &mut self,
        window: &(impl HasWindowHandle + ?Sized),
        menu: MenuId,
        position: PopupPosition,
    ) -> Result<Option<MenuItemId>> {
        let window = window.window_handle()?.as_raw();
        self.enter_scope(menu)?;
        let handle = self.materialize(menu)?;

        debug!(menu = ?menu, ?position, "showing popup menu");
        let selected = self.bridge.popup(window, handle, position)?;
        match selected {
            Some(item) => {
                self.activate(item);
            }
            None => debug!(menu = ?menu, "popup menu dismissed"),
        }
        Ok(selected)
    }

    /// Install `menu` as the menu bar of `window`, replacing what was there.
    #[cfg(feature = "menu_bar")]
    pub fn attach_to_bar(&mut self, window: &(impl HasWindowHandle + ?Sized), menu: MenuId) -> Result<()> {
        let window = window.window_handle()?.as_raw();
        self.attach(window, menu)
    }

    /// Invoke the item bound to exactly `modifiers` + `key`, if any.
    ///
    /// Meant to be called for every key press. Returns whether a callback ran.
    pub fn process_key_shortcut(&self, modifiers: Modifiers, key: char) -> bool {
        let shortcut = Shortcut::new(modifiers, key);
        match self.index.resolve(shortcut) {
            Some(item) => {
                trace!(%shortcut, item = ?item, "shortcut matched");
                self.activate(item)
            }
            None => {
                trace!(%shortcut, "no menu item bound to shortcut");
                false
            }
        }
    }

    /// Dispatch events reported by the native layer since the last call.
    ///
    /// Call this when the event loop is woken up by the bridge. Returns the number of
    /// events handled.
    pub fn process_native_events(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(event) = self.events.try_recv() {
            handled += 1;
            match event {
                NativeEvent::MenuItemActivated { id } => {
                    self.activate(id);
                }
                NativeEvent::ColorPicked { dialog, color } => match self.color_pickers.remove(&dialog) {
                    Some(pending) => match color {
                        Some(color) => {
                            debug!(?dialog, ?color, "color picker confirmed");
                            (pending.callback)(color);
                        }
                        None => debug!(?dialog, "color picker cancelled"),
                    },
                    None => warn!(?dialog, "result for unknown color picker ignored"),
                },
            }
        }
        handled
    }

    /// Open the native color dialog of `window`, seeded with `initial`.
    ///
    /// `callback` runs once with the confirmed color and never if the dialog is
    /// cancelled. Modal dialogs run it before this returns; others run it from
    /// [`process_native_events`](Self::process_native_events).
    #[cfg(feature = "color_picker")]
    pub fn show_color_picker<F>(
        &mut self,
        window: &(impl HasWindowHandle + ?Sized),
        initial: Rgba,
        callback: F,
    ) -> Result<()>
    where
        F: FnOnce(Rgba) + 'static,
    {
        let window = window.window_handle()?.as_raw();
        if self.color_pickers.values().any(|pending| pending.window == window) {
            return Err(GuiError::DialogAlreadyOpen);
        }

        let dialog = ColorDialogId::from_raw(self.next_dialog);
        self.next_dialog += 1;

        debug!(?dialog, ?initial, "opening color picker");
        let response =
            self.bridge
                .show_color_picker(window, dialog, initial, self.attributes.color_picker_alpha)?;
        match response {
            ColorPickerResponse::Confirmed(color) => {
                debug!(?dialog, ?color, "color picker confirmed");
                callback(color);
            }
            ColorPickerResponse::Cancelled => debug!(?dialog, "color picker cancelled"),
            ColorPickerResponse::Pending => {
                self.color_pickers.insert(
                    dialog,
                    PendingColorPicker {
                        window,
                        callback: Box::new(callback),
                    },
                );
            }
        }
        Ok(())
    }

    /// Destroy `menu` with everything below it.
    ///
    /// Shortcuts of the removed items stop matching, the row opening it disappears
    /// from its parent, and a menu bar showing it is removed.
    pub fn destroy_menu(&mut self, menu: MenuId) -> Result<()> {
        let (parent, state) = {
            let node = self.store.menu(menu)?;
            (node.parent, node.state)
        };

        if let (Some(parent), Some(handle)) = (parent, state.handle()) {
            if let Some(parent_handle) = self.store.menu(parent)?.state.handle() {
                if let Err(err) = self.bridge.remove_submenu(parent_handle, handle) {
                    warn!(menu = ?menu, parent = ?parent, "failed to remove native row: {err:#}");
                    self.mark_stale(parent)?;
                }
            }
        }

        let menus: HashSet<MenuId> = self.store.menus_in_subtree(menu)?.into_iter().collect();
        let windows: Vec<RawWindowHandle> = self
            .bars
            .iter()
            .filter(|(_, attached)| menus.contains(attached))
            .map(|(window, _)| *window)
            .collect();
        for window in windows {
            self.bridge.detach_from_bar(window);
            self.bars.remove(&window);
        }
        self.application_menus.retain(|_, app| !menus.contains(app));

        for handle in self.native_roots(menu)? {
            self.bridge.release(handle);
        }

        let items: HashSet<MenuItemId> = self.store.items_in_subtree(menu)?.into_iter().collect();
        self.index.purge(&items);
        self.scope.retain(|root| !menus.contains(root));

        let removed = self.store.remove_subtree(menu)?;
        debug!(
            menu = ?menu,
            menus = removed.menus.len(),
            items = removed.items.len(),
            "destroyed menu"
        );

        // an item shadowed by one of the removed bindings may be reachable again
        self.rebuild_index()
    }

    pub fn contains_menu(&self, menu: MenuId) -> bool {
        self.store.contains_menu(menu)
    }

    pub fn menu_name(&self, menu: MenuId) -> Result<&str> {
        Ok(&self.store.menu(menu)?.name)
    }

    pub fn menu_parent(&self, menu: MenuId) -> Result<Option<MenuId>> {
        Ok(self.store.menu(menu)?.parent)
    }

    pub fn menu_role(&self, menu: MenuId) -> Result<MenuRole> {
        Ok(self.store.menu(menu)?.role)
    }

    pub fn menu_children(&self, menu: MenuId) -> Result<&[MenuChild]> {
        Ok(&self.store.menu(menu)?.children)
    }

    pub fn materialization(&self, menu: MenuId) -> Result<Materialization> {
        Ok(self.store.menu(menu)?.state)
    }

    pub fn is_materialized(&self, menu: MenuId) -> Result<bool> {
        Ok(matches!(self.materialization(menu)?, Materialization::Materialized(_)))
    }

    /// Everything below `menu` in pre-order, children in insertion order.
    pub fn walk(&self, menu: MenuId) -> Result<Vec<MenuChild>> {
        self.store.walk(menu)
    }

    pub fn item_name(&self, item: MenuItemId) -> Result<&str> {
        Ok(&self.store.item(item)?.name)
    }

    pub fn item_shortcut(&self, item: MenuItemId) -> Result<Option<Shortcut>> {
        Ok(self.store.item(item)?.shortcut)
    }

    pub fn item_menu(&self, item: MenuItemId) -> Result<MenuId> {
        Ok(self.store.item(item)?.menu)
    }

    pub fn item_data(&self, item: MenuItemId) -> Result<&T> {
        Ok(&self.store.item(item)?.data)
    }

    /// Item currently bound to `shortcut` in the shortcut scope.
    pub fn shortcut_item(&self, shortcut: Shortcut) -> Option<MenuItemId> {
        self.index.resolve(shortcut)
    }

    fn activate(&self, id: MenuItemId) -> bool {
        match self.store.item(id) {
            Ok(item) => {
                debug!(item = ?id, name = %item.name, "menu item activated");
                (item.callback)(id, &item.data);
                true
            }
            Err(_) => {
                warn!(item = ?id, "activation of unknown menu item ignored");
                false
            }
        }
    }

    fn attach(&mut self, window: RawWindowHandle, menu: MenuId) -> Result<()> {
        self.enter_scope(menu)?;
        if self.bars.get(&window) == Some(&menu)
            && matches!(self.store.menu(menu)?.state, Materialization::Materialized(_))
        {
            return Ok(());
        }

        let handle = self.materialize(menu)?;
        // rebuilding a stale bar menu already put it back
        if self.bars.get(&window) == Some(&menu) {
            return Ok(());
        }
        self.bridge.attach_to_bar(window, handle)?;
        self.bars.insert(window, menu);
        debug!(menu = ?menu, "attached menu to menu bar");
        Ok(())
    }

    /// Add the root of `menu` to the shortcut scope.
    fn enter_scope(&mut self, menu: MenuId) -> Result<()> {
        let root = self.store.root_of(menu)?;
        if !self.scope.contains(&root) {
            self.scope.push(root);
            debug!(menu = ?root, "menu joined shortcut scope");
            self.rebuild_index()?;
        }
        Ok(())
    }

    /// Walk application menus, then other scope roots, each in pre-order.
    fn rebuild_index(&mut self) -> Result<()> {
        let previous: Vec<(Shortcut, MenuItemId)> = self.index.iter().collect();
        self.index.clear();

        let (applications, others): (Vec<MenuId>, Vec<MenuId>) =
            self.scope.iter().copied().partition(|root| {
                matches!(
                    self.store.menu(*root).map(|node| node.role),
                    Ok(MenuRole::Application)
                )
            });

        for root in applications.into_iter().chain(others) {
            for id in self.store.items_in_subtree(root)? {
                let Some(shortcut) = self.store.item(id)?.shortcut else {
                    continue;
                };
                match self.attributes.duplicate_shortcuts {
                    DuplicateShortcutPolicy::Reject => {
                        if let Err(existing) = self.index.insert(shortcut, id) {
                            warn!(%shortcut, item = ?id, ?existing, "shortcut already bound, ignoring");
                        }
                    }
                    DuplicateShortcutPolicy::Replace => {
                        // item ids grow with every append, so the newest registration wins
                        match self.index.resolve(shortcut) {
                            Some(current) if current > id => {
                                trace!(%shortcut, item = ?id, winner = ?current, "shortcut held by newer item");
                            }
                            _ => {
                                if let Some(previous) = self.index.replace(shortcut, id) {
                                    trace!(%shortcut, item = ?id, shadowed = ?previous, "shortcut taken over");
                                }
                            }
                        }
                    }
                }
            }
        }

        // rows whose hint appears or disappears
        let mut changed: Vec<MenuItemId> = previous
            .iter()
            .filter(|(shortcut, item)| self.index.resolve(*shortcut) != Some(*item))
            .map(|(_, item)| *item)
            .collect();
        changed.extend(
            self.index
                .iter()
                .filter(|binding| !previous.contains(binding))
                .map(|(_, item)| item),
        );
        for item in changed {
            self.refresh_hint(item)?;
        }

        trace!(entries = self.index.len(), "rebuilt shortcut index");
        Ok(())
    }

    /// Rebuild the native row of an item whose binding changed hands.
    fn refresh_hint(&mut self, item: MenuItemId) -> Result<()> {
        let Ok(node) = self.store.item(item) else {
            return Ok(());
        };
        let menu = node.menu;
        if self.attributes.shortcut_hints && self.store.menu(menu)?.state.handle().is_some() {
            debug!(item = ?item, "shortcut binding changed, native row rebuilt on next use");
            self.mark_stale(menu)?;
        }
        Ok(())
    }

    /// Mirror a freshly appended child in the native menu, if there is one.
    fn append_native(&mut self, menu: MenuId, child: MenuChild) -> Result<()> {
        if let Materialization::Materialized(handle) = self.store.menu(menu)?.state {
            if let Err(err) = self.materialize_into(handle, child) {
                warn!(menu = ?menu, "failed to append native row: {err}");
                self.mark_stale(menu)?;
            }
        }
        Ok(())
    }

    /// Native menu of `menu`, creating it and everything below it when needed.
    fn materialize(&mut self, menu: MenuId) -> Result<NativeMenuHandle> {
        let (role, state) = {
            let node = self.store.menu(menu)?;
            (node.role, node.state)
        };

        let mut reattach = Vec::new();
        match state {
            Materialization::Materialized(handle) => return Ok(handle),
            Materialization::Stale(handle) => {
                debug!(menu = ?menu, "rebuilding stale native menu");
                reattach = self
                    .bars
                    .iter()
                    .filter(|(_, attached)| **attached == menu)
                    .map(|(window, _)| *window)
                    .collect();
                for window in &reattach {
                    self.bridge.detach_from_bar(*window);
                }
                self.bridge.release(handle);
                self.reset_subtree(menu)?;
            }
            Materialization::Created => {}
        }

        let kind = match role {
            MenuRole::Application => NativeMenuKind::Bar,
            MenuRole::FreeStanding | MenuRole::Attached => NativeMenuKind::Popup,
        };
        let handle = self.bridge.create_menu(kind, &self.store.menu(menu)?.name)?;

        let children = self.store.menu(menu)?.children.clone();
        for child in children {
            if let Err(err) = self.materialize_into(handle, child) {
                self.bridge.release(handle);
                self.reset_subtree(menu)?;
                for window in reattach {
                    self.bars.remove(&window);
                }
                return Err(err);
            }
        }

        self.store.menu_mut(menu)?.state = Materialization::Materialized(handle);
        debug!(menu = ?menu, ?handle, ?kind, "materialized menu");

        for window in reattach {
            if let Err(err) = self.bridge.attach_to_bar(window, handle) {
                self.bars.remove(&window);
                return Err(err.into());
            }
        }
        Ok(handle)
    }

    fn materialize_into(&mut self, parent: NativeMenuHandle, child: MenuChild) -> Result<()> {
        match child {
            MenuChild::Item(id) => {
                let item = native_item(&self.store, &self.index, &self.attributes, id)?;
                self.bridge.append_item(parent, item)?;
            }
            MenuChild::Separator => self.bridge.append_separator(parent)?,
            MenuChild::Menu(menu) => {
                let handle = self.materialize(menu)?;
                self.bridge
                    .append_submenu(parent, &self.store.menu(menu)?.name, handle)?;
            }
        }
        Ok(())
    }

    fn reset_subtree(&mut self, menu: MenuId) -> Result<()> {
        for id in self.store.menus_in_subtree(menu)? {
            self.store.menu_mut(id)?.state = Materialization::Created;
        }
        Ok(())
    }

    /// Mark the outermost materialized menu containing `menu` for a rebuild.
    fn mark_stale(&mut self, menu: MenuId) -> Result<()> {
        let outermost = self
            .store
            .ancestry(menu)?
            .into_iter()
            .rev()
            .find(|id| {
                matches!(
                    self.store.menu(*id).map(|node| node.state),
                    Ok(Materialization::Materialized(_))
                )
            });

        if let Some(id) = outermost {
            let node = self.store.menu_mut(id)?;
            if let Materialization::Materialized(handle) = node.state {
                node.state = Materialization::Stale(handle);
                warn!(menu = ?id, "native menu out of sync, rebuilding on next use");
            }
        }
        Ok(())
    }

    /// Native menus below `menu` (inclusive) that are not nested in another native menu.
    fn native_roots(&self, menu: MenuId) -> Result<Vec<NativeMenuHandle>> {
        let mut roots = Vec::new();
        for id in self.store.menus_in_subtree(menu)? {
            let node = self.store.menu(id)?;
            let Some(handle) = node.state.handle() else {
                continue;
            };
            let nested = id != menu
                && node
                    .parent
                    .and_then(|parent| self.store.menu(parent).ok())
                    .and_then(|parent| parent.state.handle())
                    .is_some();
            if !nested {
                roots.push(handle);
            }
        }
        Ok(roots)
    }
}

impl<T> Drop for Gui<T> {
    fn drop(&mut self) {
        for window in self.bars.keys() {
            self.bridge.detach_from_bar(*window);
        }

        let handles: Vec<NativeMenuHandle> = self
            .store
            .roots()
            .into_iter()
            .filter_map(|root| self.native_roots(root).ok())
            .flatten()
            .collect();
        for handle in handles {
            self.bridge.release(handle);
        }
        debug!("gui context torn down");
    }
}

/// Native row of `id`. The shortcut hint is shown only while the item holds its binding.
fn native_item<'a, T>(
    store: &'a MenuStore<T>,
    index: &ShortcutIndex,
    attributes: &GuiAttributes,
    id: MenuItemId,
) -> Result<NativeItem<'a>> {
    let item = store.item(id)?;
    Ok(NativeItem {
        id,
        label: &item.name,
        shortcut: item
            .shortcut
            .filter(|shortcut| attributes.shortcut_hints && index.resolve(*shortcut) == Some(id)),
    })
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use rwh_06::{WebWindowHandle, WindowHandle};

    use super::*;
    use crate::headless::NativeCall;

    fn window(id: u32) -> WindowHandle<'static> {
        // SAFETY: the headless bridge never dereferences window handles.
        unsafe { WindowHandle::borrow_raw(RawWindowHandle::Web(WebWindowHandle::new(id))) }
    }

    fn gui() -> (Gui<&'static str>, HeadlessBridge) {
        Gui::headless(GuiAttributes::default())
    }

    fn log() -> (Rc<RefCell<Vec<&'static str>>>, impl Fn(MenuItemId, &&'static str) + Clone) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let sink = log.clone();
        (log, move |_, data: &&'static str| sink.borrow_mut().push(*data))
    }

    fn creates(calls: &[NativeCall]) -> usize {
        calls
            .iter()
            .filter(|call| matches!(call, NativeCall::CreateMenu { .. }))
            .count()
    }

    #[test]
    fn menus_materialize_lazily() {
        let (mut gui, bridge) = gui();
        let (_, cb) = log();
        let menu = gui.new_menu("colors");
        gui.append_item(menu, "red", None, "red", cb).unwrap();

        assert_eq!(gui.materialization(menu).unwrap(), Materialization::Created);
        assert!(bridge.calls().is_empty());

        gui.popup_menu(&window(1), menu).unwrap();
        assert!(gui.is_materialized(menu).unwrap());
        assert_eq!(creates(&bridge.calls()), 1);

        // second popup reuses the cached native menu
        gui.popup_menu(&window(1), menu).unwrap();
        assert_eq!(creates(&bridge.calls()), 1);
    }

    #[test]
    fn appends_to_materialized_menu_are_incremental() {
        let (mut gui, bridge) = gui();
        let (_, cb) = log();
        let menu = gui.new_menu("colors");
        gui.append_item(menu, "red", None, "red", cb.clone()).unwrap();
        gui.popup_menu(&window(1), menu).unwrap();
        let handle = gui.materialization(menu).unwrap().handle().unwrap();
        bridge.clear_calls();

        let green = gui.append_item(menu, "green", None, "green", cb.clone()).unwrap();
        let sub = gui.append_submenu(menu, "more").unwrap();
        gui.append_separator(menu).unwrap();

        let sub_handle = gui.materialization(sub).unwrap().handle().unwrap();
        assert_eq!(
            bridge.calls(),
            vec![
                NativeCall::AppendItem {
                    menu: handle,
                    id: green,
                    label: "green".to_owned(),
                    shortcut: None,
                },
                NativeCall::CreateMenu {
                    handle: sub_handle,
                    kind: NativeMenuKind::Popup,
                    title: "more".to_owned(),
                },
                NativeCall::AppendSubmenu {
                    menu: handle,
                    title: "more".to_owned(),
                    submenu: sub_handle,
                },
                NativeCall::AppendSeparator { menu: handle },
            ]
        );
    }

    #[test]
    fn failed_incremental_append_marks_menu_stale() {
        let (mut gui, bridge) = gui();
        let (log, cb) = log();
        let menu = gui.new_menu("colors");
        gui.append_item(menu, "red", None, "red", cb.clone()).unwrap();
        gui.popup_menu(&window(1), menu).unwrap();
        let old = gui.materialization(menu).unwrap().handle().unwrap();

        bridge.fail_next(1);
        let green = gui.append_item(menu, "green", None, "green", cb).unwrap();
        assert_eq!(gui.materialization(menu).unwrap(), Materialization::Stale(old));

        // next popup rebuilds the whole native menu and the new row is selectable
        bridge.select_next_popup(green);
        assert_eq!(gui.popup_menu(&window(1), menu).unwrap(), Some(green));
        assert!(bridge.calls().contains(&NativeCall::Release { menu: old }));
        assert!(gui.is_materialized(menu).unwrap());
        assert_ne!(gui.materialization(menu).unwrap().handle(), Some(old));
        assert_eq!(*log.borrow(), vec!["green"]);
    }

    #[test]
    fn native_failure_on_popup_is_reported_and_retried() {
        let (mut gui, bridge) = gui();
        let menu = gui.new_menu("colors");

        bridge.fail_next(1);
        assert!(matches!(
            gui.popup_menu(&window(1), menu),
            Err(GuiError::NativeResource(_))
        ));
        assert_eq!(gui.materialization(menu).unwrap(), Materialization::Created);

        assert_eq!(gui.popup_menu(&window(1), menu).unwrap(), None);
        assert!(gui.is_materialized(menu).unwrap());
    }

    #[test]
    fn shortcuts_of_unshown_menus_are_inactive() {
        let (mut gui, _bridge) = gui();
        let (log, cb) = log();
        let menu = gui.new_menu("colors");
        gui.append_item(menu, "red", Some(Shortcut::new(Modifiers::CONTROL, 'r')), "red", cb)
            .unwrap();

        assert!(!gui.process_key_shortcut(Modifiers::CONTROL, 'r'));
        gui.popup_menu(&window(1), menu).unwrap();
        assert!(gui.process_key_shortcut(Modifiers::CONTROL, 'r'));
        assert_eq!(*log.borrow(), vec!["red"]);
    }

    #[test]
    fn duplicate_check_applies_before_scope_entry() {
        let (mut gui, _bridge) = gui();
        let (_, cb) = log();
        let menu = gui.new_menu("colors");
        let sub = gui.append_submenu(menu, "more").unwrap();
        let shortcut = Shortcut::new(Modifiers::ALT, 'x');
        let first = gui.append_item(menu, "a", Some(shortcut), "a", cb.clone()).unwrap();

        assert!(matches!(
            gui.append_item(sub, "b", Some(shortcut), "b", cb.clone()),
            Err(GuiError::DuplicateShortcut { existing, .. }) if existing == first
        ));
        // a different free-standing menu is a different tree
        let other = gui.new_menu("other");
        assert!(gui.append_item(other, "c", Some(shortcut), "c", cb).is_ok());
    }

    #[test]
    fn conflicting_menu_entering_scope_loses() {
        let (mut gui, _bridge) = gui();
        let (log, cb) = log();
        let shortcut = Shortcut::new(Modifiers::ALT, 'x');

        let first = gui.new_menu("first");
        gui.append_item(first, "a", Some(shortcut), "a", cb.clone()).unwrap();
        let second = gui.new_menu("second");
        gui.append_item(second, "b", Some(shortcut), "b", cb).unwrap();

        gui.popup_menu(&window(1), first).unwrap();
        gui.popup_menu(&window(1), second).unwrap();
        gui.process_key_shortcut(Modifiers::ALT, 'x');
        assert_eq!(*log.borrow(), vec!["a"]);
    }

    #[test]
    fn replace_policy_lets_last_registration_win() {
        let (mut gui, _bridge) = Gui::headless(
            GuiAttributes::default().with_duplicate_shortcuts(DuplicateShortcutPolicy::Replace),
        );
        let (log, cb) = log();
        let shortcut = Shortcut::new(Modifiers::SHIFT, 'q');
        let menu = gui.new_menu("menu");
        gui.popup_menu(&window(1), menu).unwrap();

        gui.append_item(menu, "old", Some(shortcut), "old", cb.clone()).unwrap();
        let new = gui.append_item(menu, "new", Some(shortcut), "new", cb).unwrap();

        assert_eq!(gui.shortcut_item(shortcut), Some(new));
        gui.process_key_shortcut(Modifiers::SHIFT, 'q');
        assert_eq!(*log.borrow(), vec!["new"]);
    }

    #[test]
    fn replace_policy_survives_index_rebuild() {
        let (mut gui, _bridge) = Gui::headless(
            GuiAttributes::default().with_duplicate_shortcuts(DuplicateShortcutPolicy::Replace),
        );
        let (log, cb) = log();
        let shortcut = Shortcut::new(Modifiers::CONTROL, 'k');
        let menu = gui.new_menu("menu");
        let sub = gui.append_submenu(menu, "sub").unwrap();
        gui.append_item(menu, "old", Some(shortcut), "old", cb.clone()).unwrap();
        gui.popup_menu(&window(1), menu).unwrap();

        // walk order puts the sub-menu first, registration order puts "new" last
        let new = gui.append_item(sub, "new", Some(shortcut), "new", cb).unwrap();
        assert_eq!(gui.shortcut_item(shortcut), Some(new));

        let unrelated = gui.new_menu("unrelated");
        gui.popup_menu(&window(1), unrelated).unwrap();
        assert_eq!(gui.shortcut_item(shortcut), Some(new));
        gui.process_key_shortcut(Modifiers::CONTROL, 'k');
        assert_eq!(*log.borrow(), vec!["new"]);
    }

    #[test]
    fn losing_menu_rows_show_no_hint() {
        let (mut gui, bridge) = gui();
        let (_, cb) = log();
        let shortcut = Shortcut::new(Modifiers::ALT, 'x');
        let first = gui.new_menu("first");
        let a = gui.append_item(first, "a", Some(shortcut), "a", cb.clone()).unwrap();
        let second = gui.new_menu("second");
        let b = gui.append_item(second, "b", Some(shortcut), "b", cb).unwrap();

        gui.popup_menu(&window(1), first).unwrap();
        gui.popup_menu(&window(1), second).unwrap();

        let hint = |id| {
            bridge.calls().iter().find_map(|call| match call {
                NativeCall::AppendItem { id: row, shortcut, .. } if *row == id => Some(*shortcut),
                _ => None,
            })
        };
        assert_eq!(hint(a), Some(Some(shortcut)));
        assert_eq!(hint(b), Some(None));
    }

    #[test]
    fn shadowed_row_is_rebuilt_without_hint() {
        let (mut gui, bridge) = Gui::headless(
            GuiAttributes::default().with_duplicate_shortcuts(DuplicateShortcutPolicy::Replace),
        );
        let (_, cb) = log();
        let shortcut = Shortcut::new(Modifiers::ALT, 'x');
        let first = gui.new_menu("first");
        let a = gui.append_item(first, "a", Some(shortcut), "a", cb.clone()).unwrap();
        gui.popup_menu(&window(1), first).unwrap();
        let second = gui.new_menu("second");
        gui.popup_menu(&window(1), second).unwrap();

        // the newer item takes the binding over, the row of "a" goes out of date
        gui.append_item(second, "b", Some(shortcut), "b", cb).unwrap();
        assert!(matches!(gui.materialization(first).unwrap(), Materialization::Stale(_)));

        bridge.clear_calls();
        gui.popup_menu(&window(1), first).unwrap();
        assert!(bridge.calls().contains(&NativeCall::AppendItem {
            menu: gui.materialization(first).unwrap().handle().unwrap(),
            id: a,
            label: "a".to_owned(),
            shortcut: None,
        }));
    }

    #[test]
    fn shortcut_hints_can_be_disabled() {
        let (mut gui, bridge) =
            Gui::<()>::headless(GuiAttributes::default().with_shortcut_hints(false));
        let menu = gui.new_menu("menu");
        gui.append_item(menu, "a", Some(Shortcut::new(Modifiers::ALT, 'a')), (), |_, _| {})
            .unwrap();
        gui.popup_menu(&window(1), menu).unwrap();

        assert!(bridge.calls().iter().any(|call| matches!(
            call,
            NativeCall::AppendItem { shortcut: None, .. }
        )));
    }

    #[test]
    fn application_menu_is_created_once_per_window() {
        let (mut gui, bridge) = gui();
        let a = gui.application_menu(&window(1)).unwrap();
        let again = gui.application_menu(&window(1)).unwrap();
        let b = gui.application_menu(&window(2)).unwrap();

        assert_eq!(a, again);
        assert_ne!(a, b);
        assert_eq!(gui.menu_role(a).unwrap(), MenuRole::Application);

        let attaches = bridge
            .calls()
            .iter()
            .filter(|call| matches!(call, NativeCall::AttachToBar { .. }))
            .count();
        assert_eq!(attaches, 2);
        assert!(bridge.calls().iter().any(|call| matches!(
            call,
            NativeCall::CreateMenu { kind: NativeMenuKind::Bar, .. }
        )));
    }

    #[test]
    fn application_menu_attach_is_retried() {
        let (mut gui, bridge) = gui();
        bridge.fail_next(1);
        let menu = gui.application_menu(&window(1)).unwrap();
        assert!(!gui.is_materialized(menu).unwrap());

        assert_eq!(gui.application_menu(&window(1)).unwrap(), menu);
        assert!(gui.is_materialized(menu).unwrap());
    }

    #[test]
    fn stale_bar_menu_is_reattached_after_rebuild() {
        let (mut gui, bridge) = gui();
        let (_, cb) = log();
        let app = gui.application_menu(&window(1)).unwrap();
        let colors = gui.append_submenu(app, "colors").unwrap();

        bridge.fail_next(1);
        gui.append_item(colors, "red", None, "red", cb).unwrap();
        assert!(matches!(gui.materialization(app).unwrap(), Materialization::Stale(_)));

        bridge.clear_calls();
        gui.application_menu(&window(1)).unwrap();
        let calls = bridge.calls();
        assert_eq!(calls.first(), Some(&NativeCall::DetachFromBar));
        assert!(matches!(calls.last(), Some(NativeCall::AttachToBar { .. })));
        assert!(gui.is_materialized(app).unwrap());
    }

    #[test]
    fn bar_clicks_go_through_native_events() {
        let (mut gui, bridge) = gui();
        let (log, cb) = log();
        let app = gui.application_menu(&window(1)).unwrap();
        let colors = gui.append_submenu(app, "colors").unwrap();
        let cyan = gui.append_item(colors, "cyan", None, "cyan", cb).unwrap();

        let bar = gui.materialization(app).unwrap().handle().unwrap();
        assert_eq!(bridge.find_row(bar, "cyan"), Some(cyan));

        bridge.click(cyan);
        assert!(log.borrow().is_empty());
        assert_eq!(gui.process_native_events(), 1);
        assert_eq!(*log.borrow(), vec!["cyan"]);
    }

    #[test]
    fn destroy_releases_native_menu_and_detaches_row() {
        let (mut gui, bridge) = gui();
        let menu = gui.new_menu("root");
        let sub = gui.append_submenu(menu, "sub").unwrap();
        gui.append_submenu(sub, "nested").unwrap();
        gui.popup_menu(&window(1), menu).unwrap();
        let root_handle = gui.materialization(menu).unwrap().handle().unwrap();
        let sub_handle = gui.materialization(sub).unwrap().handle().unwrap();
        bridge.clear_calls();

        gui.destroy_menu(sub).unwrap();
        assert_eq!(
            bridge.calls(),
            vec![
                NativeCall::RemoveSubmenu {
                    menu: root_handle,
                    submenu: sub_handle,
                },
                NativeCall::Release { menu: sub_handle },
            ]
        );
        assert!(gui.walk(menu).unwrap().is_empty());
        assert!(!gui.contains_menu(sub));
        assert_eq!(bridge.live_menus(), 1);
    }

    #[test]
    fn destroying_application_menu_detaches_bar() {
        let (mut gui, bridge) = gui();
        let app = gui.application_menu(&window(1)).unwrap();
        gui.destroy_menu(app).unwrap();

        assert!(bridge.calls().contains(&NativeCall::DetachFromBar));
        let fresh = gui.application_menu(&window(1)).unwrap();
        assert_ne!(fresh, app);
    }

    #[test]
    fn drop_releases_everything() {
        let (mut gui, bridge) = gui();
        let menu = gui.new_menu("menu");
        gui.append_submenu(menu, "sub").unwrap();
        gui.popup_menu(&window(1), menu).unwrap();
        gui.application_menu(&window(1)).unwrap();
        assert_eq!(bridge.live_menus(), 3);

        drop(gui);
        assert_eq!(bridge.live_menus(), 0);
    }

    #[test]
    fn popup_at_position_is_forwarded() {
        let (mut gui, bridge) = gui();
        let menu = gui.new_menu("menu");
        let position = PopupPosition::Window(winit::dpi::PhysicalPosition::new(10, 20));
        gui.popup_menu_at(&window(1), menu, position).unwrap();

        assert!(bridge.calls().iter().any(|call| matches!(
            call,
            NativeCall::Popup { position: p, .. } if *p == position
        )));
    }
}
