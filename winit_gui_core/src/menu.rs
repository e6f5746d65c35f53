//! Menu tree store: menus, items, and the ownership structure between them.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};

use crate::error::{GuiError, Result};
use crate::native::NativeMenuHandle;
use crate::shortcut::Shortcut;

static COUNTER: AtomicUsize = AtomicUsize::new(1);

fn next_raw_id() -> usize {
    COUNTER.fetch_add(1, Ordering::Relaxed)
}

/// Identifier of a menu. Unique for the lifetime of the process.
///
/// Ids are never reused, so a handle to a destroyed menu is reported as
/// [`GuiError::InvalidMenu`] instead of silently addressing a newer menu.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MenuId(usize);

impl MenuId {
    /// Convert the `MenuId` into the underlying integer.
    ///
    /// This is useful if you need to pass the ID across an FFI boundary, or store it in an atomic.
    pub const fn into_raw(self) -> usize {
        self.0
    }

    /// Construct a `MenuId` from the underlying integer.
    ///
    /// This should only be called with integers returned from [`MenuId::into_raw`].
    pub const fn from_raw(id: usize) -> Self {
        Self(id)
    }
}

impl fmt::Debug for MenuId {
    fn fmt(&self, fmtr: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(fmtr)
    }
}

/// Identifier of a menu item. Unique for the lifetime of the process.
///
/// Item callbacks receive the `MenuItemId` of the item that was activated.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct MenuItemId(usize);

impl MenuItemId {
    /// Convert the `MenuItemId` into the underlying integer.
    ///
    /// This is useful if you need to pass the ID across an FFI boundary, or store it in an atomic.
    pub const fn into_raw(self) -> usize {
        self.0
    }

    /// Construct a `MenuItemId` from the underlying integer.
    ///
    /// This should only be called with integers returned from [`MenuItemId::into_raw`].
    pub const fn from_raw(id: usize) -> Self {
        Self(id)
    }
}

impl fmt::Debug for MenuItemId {
    fn fmt(&self, fmtr: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(fmtr)
    }
}

/// How a menu came into existence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuRole {
    /// Created on its own, typically for context popups.
    FreeStanding,
    /// Created as a sub-menu of another menu.
    Attached,
    /// Root of a window's menu bar.
    Application,
}

/// Native backing state of a menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Materialization {
    /// No native menu exists yet.
    Created,
    /// The native menu exists and mirrors the abstract tree.
    Materialized(NativeMenuHandle),
    /// The native menu exists but an incremental update failed; it is rebuilt on next use.
    Stale(NativeMenuHandle),
}

impl Materialization {
    pub fn handle(self) -> Option<NativeMenuHandle> {
        match self {
            Materialization::Created => None,
            Materialization::Materialized(handle) | Materialization::Stale(handle) => Some(handle),
        }
    }
}

/// A child of a menu, in insertion order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MenuChild {
    Item(MenuItemId),
    Menu(MenuId),
    Separator,
}

/// Callback bound to a menu item. Receives the item and the user data stored with it.
pub type MenuCallback<T> = Box<dyn Fn(MenuItemId, &T)>;

#[derive(Debug)]
pub(crate) struct MenuNode {
    pub(crate) name: String,
    pub(crate) role: MenuRole,
    pub(crate) parent: Option<MenuId>,
    pub(crate) children: Vec<MenuChild>,
    pub(crate) state: Materialization,
}

pub(crate) struct ItemNode<T> {
    pub(crate) name: String,
    pub(crate) menu: MenuId,
    pub(crate) shortcut: Option<Shortcut>,
    pub(crate) data: T,
    pub(crate) callback: MenuCallback<T>,
}

impl<T> fmt::Debug for ItemNode<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ItemNode")
            .field("name", &self.name)
            .field("menu", &self.menu)
            .field("shortcut", &self.shortcut)
            .field("callback", &"<...>")
            .finish_non_exhaustive()
    }
}

/// Everything taken out of the store by [`MenuStore::remove_subtree`].
#[derive(Debug, Default)]
pub(crate) struct RemovedSubtree {
    pub(crate) menus: Vec<MenuId>,
    pub(crate) items: Vec<MenuItemId>,
}

pub(crate) struct MenuStore<T> {
    menus: HashMap<MenuId, MenuNode>,
    items: HashMap<MenuItemId, ItemNode<T>>,
}

impl<T> fmt::Debug for MenuStore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MenuStore")
            .field("menus", &self.menus.len())
            .field("items", &self.items.len())
            .finish()
    }
}

impl<T> MenuStore<T> {
    pub(crate) fn new() -> Self {
        Self {
            menus: HashMap::new(),
            items: HashMap::new(),
        }
    }

    /// Create a menu without linking it into a parent's children.
    pub(crate) fn create_menu(&mut self, name: &str, role: MenuRole) -> MenuId {
        let id = MenuId(next_raw_id());
        self.menus.insert(
            id,
            MenuNode {
                name: name.to_owned(),
                role,
                parent: None,
                children: Vec::new(),
                state: Materialization::Created,
            },
        );
        id
    }

    pub(crate) fn add_submenu(&mut self, parent: MenuId, name: &str) -> Result<MenuId> {
        self.menu(parent)?;
        let id = self.create_menu(name, MenuRole::Attached);
        if let Some(node) = self.menus.get_mut(&id) {
            node.parent = Some(parent);
        }
        self.menu_mut(parent)?.children.push(MenuChild::Menu(id));
        Ok(id)
    }

    pub(crate) fn add_item(
        &mut self,
        menu: MenuId,
        name: &str,
        shortcut: Option<Shortcut>,
        data: T,
        callback: MenuCallback<T>,
    ) -> Result<MenuItemId> {
        let id = MenuItemId(next_raw_id());
        self.menu_mut(menu)?.children.push(MenuChild::Item(id));
        self.items.insert(
            id,
            ItemNode {
                name: name.to_owned(),
                menu,
                shortcut,
                data,
                callback,
            },
        );
        Ok(id)
    }

    pub(crate) fn add_separator(&mut self, menu: MenuId) -> Result<()> {
        self.menu_mut(menu)?.children.push(MenuChild::Separator);
        Ok(())
    }

    pub(crate) fn menu(&self, id: MenuId) -> Result<&MenuNode> {
        self.menus.get(&id).ok_or(GuiError::InvalidMenu(id))
    }

    pub(crate) fn menu_mut(&mut self, id: MenuId) -> Result<&mut MenuNode> {
        self.menus.get_mut(&id).ok_or(GuiError::InvalidMenu(id))
    }

    pub(crate) fn item(&self, id: MenuItemId) -> Result<&ItemNode<T>> {
        self.items.get(&id).ok_or(GuiError::InvalidItem(id))
    }

    pub(crate) fn contains_menu(&self, id: MenuId) -> bool {
        self.menus.contains_key(&id)
    }

    /// Topmost ancestor of `menu` (the menu itself if it has no parent).
    pub(crate) fn root_of(&self, menu: MenuId) -> Result<MenuId> {
        let mut current = menu;
        while let Some(parent) = self.menu(current)?.parent {
            current = parent;
        }
        Ok(current)
    }

    /// `menu` followed by its ancestors, nearest first.
    pub(crate) fn ancestry(&self, menu: MenuId) -> Result<Vec<MenuId>> {
        let mut chain = vec![menu];
        let mut current = menu;
        while let Some(parent) = self.menu(current)?.parent {
            chain.push(parent);
            current = parent;
        }
        Ok(chain)
    }

    /// Pre-order walk of everything below `menu`, children in insertion order.
    pub(crate) fn walk(&self, menu: MenuId) -> Result<Vec<MenuChild>> {
        let mut out = Vec::new();
        self.walk_into(menu, &mut out)?;
        Ok(out)
    }

    fn walk_into(&self, menu: MenuId, out: &mut Vec<MenuChild>) -> Result<()> {
        for child in &self.menu(menu)?.children {
            out.push(*child);
            if let MenuChild::Menu(sub) = child {
                self.walk_into(*sub, out)?;
            }
        }
        Ok(())
    }

    /// Items below `menu` in pre-order.
    pub(crate) fn items_in_subtree(&self, menu: MenuId) -> Result<Vec<MenuItemId>> {
        Ok(self
            .walk(menu)?
            .into_iter()
            .filter_map(|child| match child {
                MenuChild::Item(id) => Some(id),
                _ => None,
            })
            .collect())
    }

    /// `menu` and every menu below it in pre-order.
    pub(crate) fn menus_in_subtree(&self, menu: MenuId) -> Result<Vec<MenuId>> {
        let mut out = vec![menu];
        out.extend(self.walk(menu)?.into_iter().filter_map(|child| match child {
            MenuChild::Menu(id) => Some(id),
            _ => None,
        }));
        Ok(out)
    }

    /// First item below `root` bound to `shortcut`.
    pub(crate) fn find_binding(&self, root: MenuId, shortcut: Shortcut) -> Result<Option<MenuItemId>> {
        Ok(self
            .items_in_subtree(root)?
            .into_iter()
            .find(|id| self.items.get(id).and_then(|item| item.shortcut) == Some(shortcut)))
    }

    /// Unlink `menu` from its parent and free it together with everything below it.
    pub(crate) fn remove_subtree(&mut self, menu: MenuId) -> Result<RemovedSubtree> {
        let removed = RemovedSubtree {
            menus: self.menus_in_subtree(menu)?,
            items: self.items_in_subtree(menu)?,
        };

        if let Some(parent) = self.menu(menu)?.parent {
            if let Ok(node) = self.menu_mut(parent) {
                node.children.retain(|child| *child != MenuChild::Menu(menu));
            }
        }
        for id in &removed.items {
            self.items.remove(id);
        }
        for id in &removed.menus {
            self.menus.remove(id);
        }

        Ok(removed)
    }

    /// Every live menu without a parent.
    pub(crate) fn roots(&self) -> Vec<MenuId> {
        let mut roots: Vec<MenuId> = self
            .menus
            .iter()
            .filter(|(_, node)| node.parent.is_none())
            .map(|(id, _)| *id)
            .collect();
        roots.sort();
        roots
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::shortcut::Modifiers;

    fn noop() -> MenuCallback<()> {
        Box::new(|_, _| {})
    }

    #[test]
    fn children_keep_insertion_order() {
        let mut store = MenuStore::new();
        let root = store.create_menu("colors", MenuRole::FreeStanding);
        let red = store.add_item(root, "red", None, (), noop()).unwrap();
        let sub = store.add_submenu(root, "more").unwrap();
        store.add_separator(root).unwrap();
        let blue = store.add_item(sub, "blue", None, (), noop()).unwrap();
        let green = store.add_item(root, "green", None, (), noop()).unwrap();

        assert_eq!(
            store.walk(root).unwrap(),
            vec![
                MenuChild::Item(red),
                MenuChild::Menu(sub),
                MenuChild::Item(blue),
                MenuChild::Separator,
                MenuChild::Item(green),
            ]
        );
        assert_eq!(store.items_in_subtree(root).unwrap(), vec![red, blue, green]);
    }

    #[test]
    fn submenu_records_parent() {
        let mut store = MenuStore::<()>::new();
        let root = store.create_menu("root", MenuRole::FreeStanding);
        let a = store.add_submenu(root, "a").unwrap();
        let b = store.add_submenu(a, "b").unwrap();

        assert_eq!(store.menu(b).unwrap().parent, Some(a));
        assert_eq!(store.menu(b).unwrap().role, MenuRole::Attached);
        assert_eq!(store.root_of(b).unwrap(), root);
        assert_eq!(store.ancestry(b).unwrap(), vec![b, a, root]);
    }

    #[test]
    fn find_binding_searches_whole_subtree() {
        let mut store = MenuStore::new();
        let root = store.create_menu("root", MenuRole::FreeStanding);
        let sub = store.add_submenu(root, "sub").unwrap();
        let shortcut = Shortcut::new(Modifiers::CONTROL, 'b');
        let blue = store.add_item(sub, "blue", Some(shortcut), (), noop()).unwrap();

        assert_eq!(store.find_binding(root, shortcut).unwrap(), Some(blue));
        assert_eq!(
            store
                .find_binding(root, Shortcut::new(Modifiers::ALT, 'b'))
                .unwrap(),
            None
        );
    }

    #[test]
    fn remove_subtree_unlinks_and_frees() {
        let mut store = MenuStore::new();
        let root = store.create_menu("root", MenuRole::FreeStanding);
        let keep = store.add_item(root, "keep", None, (), noop()).unwrap();
        let sub = store.add_submenu(root, "sub").unwrap();
        let nested = store.add_submenu(sub, "nested").unwrap();
        let gone = store.add_item(nested, "gone", None, (), noop()).unwrap();

        let removed = store.remove_subtree(sub).unwrap();
        assert_eq!(removed.menus, vec![sub, nested]);
        assert_eq!(removed.items, vec![gone]);

        assert_eq!(store.walk(root).unwrap(), vec![MenuChild::Item(keep)]);
        assert!(matches!(store.menu(sub), Err(GuiError::InvalidMenu(id)) if id == sub));
        assert!(matches!(store.item(gone), Err(GuiError::InvalidItem(id)) if id == gone));
    }

    #[test]
    fn unknown_menu_is_rejected() {
        let mut store = MenuStore::new();
        let bogus = MenuId::from_raw(usize::MAX);
        assert!(matches!(
            store.add_item(bogus, "x", None, (), noop()),
            Err(GuiError::InvalidMenu(id)) if id == bogus
        ));
        assert!(matches!(store.add_submenu(bogus, "x"), Err(GuiError::InvalidMenu(_))));
        assert!(matches!(store.add_separator(bogus), Err(GuiError::InvalidMenu(_))));
    }
}
