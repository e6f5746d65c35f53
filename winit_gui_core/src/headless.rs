//! In-memory bridge without any native UI.
//!
//! Used on platforms without a native backend and to drive the runtime in tests:
//! it records every call, answers popups and color pickers from scripted
//! responses, and can be told to fail upcoming native calls.

use std::cell::RefCell;
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;

use anyhow::anyhow;
use rwh_06::RawWindowHandle;

use crate::color::Rgba;
use crate::menu::MenuItemId;
use crate::native::{
    ColorDialogId, ColorPickerResponse, NativeBridge, NativeEvent, NativeEventProxy, NativeItem,
    NativeMenuHandle, NativeMenuKind, PopupPosition,
};
use crate::shortcut::Shortcut;

/// A native call observed by [`HeadlessBridge`].
#[derive(Debug, Clone, PartialEq)]
pub enum NativeCall {
    CreateMenu {
        handle: NativeMenuHandle,
        kind: NativeMenuKind,
        title: String,
    },
    AppendItem {
        menu: NativeMenuHandle,
        id: MenuItemId,
        label: String,
        shortcut: Option<Shortcut>,
    },
    AppendSeparator {
        menu: NativeMenuHandle,
    },
    AppendSubmenu {
        menu: NativeMenuHandle,
        title: String,
        submenu: NativeMenuHandle,
    },
    RemoveSubmenu {
        menu: NativeMenuHandle,
        submenu: NativeMenuHandle,
    },
    Popup {
        menu: NativeMenuHandle,
        position: PopupPosition,
    },
    AttachToBar {
        menu: NativeMenuHandle,
    },
    DetachFromBar,
    Release {
        menu: NativeMenuHandle,
    },
    ShowColorPicker {
        dialog: ColorDialogId,
        initial: Rgba,
        show_alpha: bool,
    },
}

#[derive(Debug, Default)]
struct HeadlessState {
    next_handle: usize,
    calls: Vec<NativeCall>,
    // rows of each live native menu, used to answer popups by label
    rows: HashMap<NativeMenuHandle, Vec<(String, Option<MenuItemId>, Option<NativeMenuHandle>)>>,
    popup_responses: VecDeque<Option<MenuItemId>>,
    color_responses: VecDeque<ColorPickerResponse>,
    failures: usize,
}

/// Scripted [`NativeBridge`]. Clones share the same state.
#[derive(Clone)]
pub struct HeadlessBridge {
    proxy: Option<NativeEventProxy>,
    state: Rc<RefCell<HeadlessState>>,
}

impl std::fmt::Debug for HeadlessBridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeadlessBridge")
            .field("proxy", &"<...>")
            .field("state", &self.state)
            .finish()
    }
}

impl Default for HeadlessBridge {
    fn default() -> Self {
        Self {
            proxy: None,
            state: Rc::new(RefCell::new(HeadlessState {
                next_handle: 1,
                ..HeadlessState::default()
            })),
        }
    }
}

impl HeadlessBridge {
    /// Bridge that reports simulated native events through `proxy`.
    pub fn new(proxy: NativeEventProxy) -> Self {
        Self {
            proxy: Some(proxy),
            ..Self::default()
        }
    }

    /// Answer the next popup by choosing `item`.
    pub fn select_next_popup(&self, item: MenuItemId) {
        self.state.borrow_mut().popup_responses.push_back(Some(item));
    }

    /// Answer the next popup by dismissing it. Unscripted popups are dismissed as well.
    pub fn dismiss_next_popup(&self) {
        self.state.borrow_mut().popup_responses.push_back(None);
    }

    /// Answer the next color picker with `response`. Unscripted pickers are cancelled.
    pub fn respond_to_next_color_picker(&self, response: ColorPickerResponse) {
        self.state.borrow_mut().color_responses.push_back(response);
    }

    /// Make the next `count` fallible native calls fail.
    pub fn fail_next(&self, count: usize) {
        self.state.borrow_mut().failures = count;
    }

    /// Simulate the user choosing a row of a persistent native menu.
    pub fn click(&self, item: MenuItemId) {
        self.send(NativeEvent::MenuItemActivated { id: item });
    }

    /// Simulate a pending color picker closing.
    pub fn finish_color_picker(&self, dialog: ColorDialogId, color: Option<Rgba>) {
        self.send(NativeEvent::ColorPicked { dialog, color });
    }

    /// Item id of the row labelled `label` in native menu `menu`, searching nested menus.
    pub fn find_row(&self, menu: NativeMenuHandle, label: &str) -> Option<MenuItemId> {
        let state = self.state.borrow();
        find_row(&state.rows, menu, label)
    }

    /// Every call observed so far.
    pub fn calls(&self) -> Vec<NativeCall> {
        self.state.borrow().calls.clone()
    }

    /// Forget the recorded calls.
    pub fn clear_calls(&self) {
        self.state.borrow_mut().calls.clear();
    }

    /// Native menus created and not yet released.
    pub fn live_menus(&self) -> usize {
        self.state.borrow().rows.len()
    }

    fn send(&self, event: NativeEvent) {
        match &self.proxy {
            Some(proxy) => proxy(event),
            None => tracing::warn!(?event, "headless bridge has no event proxy"),
        }
    }

    fn record(&self, call: NativeCall) {
        self.state.borrow_mut().calls.push(call);
    }

    fn check(&self) -> anyhow::Result<()> {
        let mut state = self.state.borrow_mut();
        if state.failures > 0 {
            state.failures -= 1;
            return Err(anyhow!("simulated native failure"));
        }
        Ok(())
    }

    fn check_live(&self, menu: NativeMenuHandle) -> anyhow::Result<()> {
        if self.state.borrow().rows.contains_key(&menu) {
            Ok(())
        } else {
            Err(anyhow!("native menu {menu:?} is not live"))
        }
    }

    fn push_row(
        &self,
        menu: NativeMenuHandle,
        label: &str,
        item: Option<MenuItemId>,
        submenu: Option<NativeMenuHandle>,
    ) {
        if let Some(rows) = self.state.borrow_mut().rows.get_mut(&menu) {
            rows.push((label.to_owned(), item, submenu));
        }
    }
}

fn find_row(
    rows: &HashMap<NativeMenuHandle, Vec<(String, Option<MenuItemId>, Option<NativeMenuHandle>)>>,
    menu: NativeMenuHandle,
    label: &str,
) -> Option<MenuItemId> {
    for (row_label, item, submenu) in rows.get(&menu)? {
        if row_label == label && item.is_some() {
            return *item;
        }
        if let Some(found) = submenu.and_then(|submenu| find_row(rows, submenu, label)) {
            return Some(found);
        }
    }
    None
}

impl NativeBridge for HeadlessBridge {
    fn create_menu(&mut self, kind: NativeMenuKind, title: &str) -> anyhow::Result<NativeMenuHandle> {
        self.check()?;
        let handle = {
            let mut state = self.state.borrow_mut();
            let handle = NativeMenuHandle::from_raw(state.next_handle);
            state.next_handle += 1;
            state.rows.insert(handle, Vec::new());
            handle
        };
        self.record(NativeCall::CreateMenu {
            handle,
            kind,
            title: title.to_owned(),
        });
        Ok(handle)
    }

    fn append_item(&mut self, menu: NativeMenuHandle, item: NativeItem<'_>) -> anyhow::Result<()> {
        self.check()?;
        self.check_live(menu)?;
        self.push_row(menu, item.label, Some(item.id), None);
        self.record(NativeCall::AppendItem {
            menu,
            id: item.id,
            label: item.label.to_owned(),
            shortcut: item.shortcut,
        });
        Ok(())
    }

    fn append_separator(&mut self, menu: NativeMenuHandle) -> anyhow::Result<()> {
        self.check()?;
        self.check_live(menu)?;
        self.push_row(menu, "", None, None);
        self.record(NativeCall::AppendSeparator { menu });
        Ok(())
    }

    fn append_submenu(
        &mut self,
        menu: NativeMenuHandle,
        title: &str,
        submenu: NativeMenuHandle,
    ) -> anyhow::Result<()> {
        self.check()?;
        self.check_live(menu)?;
        self.check_live(submenu)?;
        self.push_row(menu, title, None, Some(submenu));
        self.record(NativeCall::AppendSubmenu {
            menu,
            title: title.to_owned(),
            submenu,
        });
        Ok(())
    }

    fn remove_submenu(&mut self, menu: NativeMenuHandle, submenu: NativeMenuHandle) -> anyhow::Result<()> {
        self.check()?;
        self.check_live(menu)?;
        if let Some(rows) = self.state.borrow_mut().rows.get_mut(&menu) {
            rows.retain(|(_, _, nested)| *nested != Some(submenu));
        }
        self.record(NativeCall::RemoveSubmenu { menu, submenu });
        Ok(())
    }

    fn popup(
        &mut self,
        _window: RawWindowHandle,
        menu: NativeMenuHandle,
        position: PopupPosition,
    ) -> anyhow::Result<Option<MenuItemId>> {
        self.check()?;
        self.check_live(menu)?;
        self.record(NativeCall::Popup { menu, position });
        Ok(self.state.borrow_mut().popup_responses.pop_front().flatten())
    }

    fn attach_to_bar(&mut self, _window: RawWindowHandle, menu: NativeMenuHandle) -> anyhow::Result<()> {
        self.check()?;
        self.check_live(menu)?;
        self.record(NativeCall::AttachToBar { menu });
        Ok(())
    }

    fn detach_from_bar(&mut self, _window: RawWindowHandle) {
        self.record(NativeCall::DetachFromBar);
    }

    fn release(&mut self, menu: NativeMenuHandle) {
        {
            let mut state = self.state.borrow_mut();
            let mut pending = vec![menu];
            while let Some(handle) = pending.pop() {
                if let Some(rows) = state.rows.remove(&handle) {
                    pending.extend(rows.into_iter().filter_map(|(_, _, submenu)| submenu));
                }
            }
        }
        self.record(NativeCall::Release { menu });
    }

    fn show_color_picker(
        &mut self,
        _window: RawWindowHandle,
        dialog: ColorDialogId,
        initial: Rgba,
        show_alpha: bool,
    ) -> anyhow::Result<ColorPickerResponse> {
        self.check()?;
        self.record(NativeCall::ShowColorPicker {
            dialog,
            initial,
            show_alpha,
        });
        Ok(self
            .state
            .borrow_mut()
            .color_responses
            .pop_front()
            .unwrap_or(ColorPickerResponse::Cancelled))
    }
}
