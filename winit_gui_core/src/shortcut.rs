//! Keyboard shortcuts and the process-wide shortcut index.

use std::collections::{HashMap, HashSet};
use std::fmt;

use bitflags::bitflags;

use crate::menu::MenuItemId;

bitflags! {
    /// Set of modifier keys held together with a shortcut key.
    ///
    /// The bit layout is the one most C windowing libraries use for their modifier
    /// masks, so raw masks from those libraries can be passed through
    /// [`Modifiers::from_bits_truncate`], which drops lock bits.
    #[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
    pub struct Modifiers: u8 {
        const SHIFT = 0b0001;
        const CONTROL = 0b0010;
        const ALT = 0b0100;
        /// Windows key, Command key on macOS.
        const SUPER = 0b1000;
    }
}

impl Modifiers {
    pub const NONE: Self = Self::empty();
    pub const ALL: Self = Self::all();

    pub const fn shift(self) -> bool {
        self.contains(Self::SHIFT)
    }

    pub const fn control(self) -> bool {
        self.contains(Self::CONTROL)
    }

    pub const fn alt(self) -> bool {
        self.contains(Self::ALT)
    }

    pub const fn super_key(self) -> bool {
        self.contains(Self::SUPER)
    }

    fn label(flag: Self) -> &'static str {
        if flag == Self::SHIFT {
            "Shift"
        } else if flag == Self::CONTROL {
            "Ctrl"
        } else if flag == Self::ALT {
            "Alt"
        } else {
            "Super"
        }
    }
}

impl fmt::Display for Modifiers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, (_, flag)) in self.iter_names().enumerate() {
            if i > 0 {
                f.write_str("+")?;
            }
            f.write_str(Self::label(flag))?;
        }
        Ok(())
    }
}

/// A key together with the exact modifier set that must be held.
///
/// ASCII letters are stored lowercase: whether shift is held is part of the
/// modifier set, not of the key.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct Shortcut {
    modifiers: Modifiers,
    key: char,
}

impl Shortcut {
    pub fn new(modifiers: Modifiers, key: char) -> Self {
        Self {
            modifiers,
            key: key.to_ascii_lowercase(),
        }
    }

    pub fn modifiers(&self) -> Modifiers {
        self.modifiers
    }

    pub fn key(&self) -> char {
        self.key
    }
}

impl fmt::Display for Shortcut {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.modifiers.is_empty() {
            write!(f, "{}+", self.modifiers)?;
        }
        write!(f, "{}", self.key.to_ascii_uppercase())
    }
}

/// Lookup from shortcut to the menu item bound to it.
///
/// Entries refer to items by id only. Items must be purged before they are freed.
#[derive(Debug, Default)]
pub struct ShortcutIndex {
    entries: HashMap<Shortcut, MenuItemId>,
}

impl ShortcutIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Exact match on modifiers and key.
    pub fn resolve(&self, shortcut: Shortcut) -> Option<MenuItemId> {
        self.entries.get(&shortcut).copied()
    }

    /// Bind `shortcut` to `item` unless another item already holds it.
    ///
    /// On conflict the existing binding is kept and returned as the error.
    pub fn insert(&mut self, shortcut: Shortcut, item: MenuItemId) -> Result<(), MenuItemId> {
        match self.entries.get(&shortcut) {
            Some(existing) if *existing != item => Err(*existing),
            _ => {
                self.entries.insert(shortcut, item);
                Ok(())
            }
        }
    }

    /// Bind `shortcut` to `item`, returning the item it displaced.
    pub fn replace(&mut self, shortcut: Shortcut, item: MenuItemId) -> Option<MenuItemId> {
        self.entries.insert(shortcut, item).filter(|previous| *previous != item)
    }

    /// Drop every entry pointing at one of `items`.
    pub fn purge(&mut self, items: &HashSet<MenuItemId>) {
        self.entries.retain(|_, item| !items.contains(item));
    }

    /// Every binding, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (Shortcut, MenuItemId)> + '_ {
        self.entries.iter().map(|(shortcut, item)| (*shortcut, *item))
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn item(raw: usize) -> MenuItemId {
        MenuItemId::from_raw(raw)
    }

    #[test]
    fn letters_are_case_folded() {
        let upper = Shortcut::new(Modifiers::SHIFT, 'R');
        let lower = Shortcut::new(Modifiers::SHIFT, 'r');
        assert_eq!(upper, lower);
        assert_eq!(upper.key(), 'r');
    }

    #[test]
    fn from_bits_drops_lock_modifiers() {
        // 0x10 caps lock, 0x20 num lock
        let mods = Modifiers::from_bits_truncate(0x1 | 0x2 | 0x10 | 0x20);
        assert_eq!(mods, Modifiers::SHIFT | Modifiers::CONTROL);
    }

    #[test]
    fn display() {
        let shortcut = Shortcut::new(Modifiers::CONTROL | Modifiers::SHIFT, 'p');
        assert_eq!(shortcut.to_string(), "Shift+Ctrl+P");
        assert_eq!(Shortcut::new(Modifiers::NONE, 'x').to_string(), "X");
        assert_eq!(Modifiers::ALL.to_string(), "Shift+Ctrl+Alt+Super");
    }

    #[test]
    fn resolve_requires_exact_modifier_set() {
        let mut index = ShortcutIndex::new();
        let all = Shortcut::new(Modifiers::ALL, 'p');
        index.insert(all, item(1)).unwrap();

        assert_eq!(index.resolve(all), Some(item(1)));
        // subset of the bound modifiers
        assert_eq!(index.resolve(Shortcut::new(Modifiers::CONTROL, 'p')), None);
        // same modifiers, different key
        assert_eq!(index.resolve(Shortcut::new(Modifiers::ALL, 'q')), None);
    }

    #[test]
    fn first_binding_wins_on_insert() {
        let mut index = ShortcutIndex::new();
        let shortcut = Shortcut::new(Modifiers::ALT, 'g');
        assert_eq!(index.insert(shortcut, item(1)), Ok(()));
        assert_eq!(index.insert(shortcut, item(2)), Err(item(1)));
        assert_eq!(index.resolve(shortcut), Some(item(1)));
        // re-inserting the holder is not a conflict
        assert_eq!(index.insert(shortcut, item(1)), Ok(()));
    }

    #[test]
    fn replace_reports_displaced_item() {
        let mut index = ShortcutIndex::new();
        let shortcut = Shortcut::new(Modifiers::ALT, 'g');
        assert_eq!(index.replace(shortcut, item(1)), None);
        assert_eq!(index.replace(shortcut, item(2)), Some(item(1)));
        assert_eq!(index.resolve(shortcut), Some(item(2)));
    }

    #[test]
    fn purge_removes_entries() {
        let mut index = ShortcutIndex::new();
        index.insert(Shortcut::new(Modifiers::NONE, 'a'), item(1)).unwrap();
        index.insert(Shortcut::new(Modifiers::NONE, 'b'), item(2)).unwrap();
        index.purge(&HashSet::from([item(1)]));
        assert_eq!(index.len(), 1);
        assert_eq!(index.resolve(Shortcut::new(Modifiers::NONE, 'a')), None);
        assert_eq!(index.resolve(Shortcut::new(Modifiers::NONE, 'b')), Some(item(2)));
    }
}
