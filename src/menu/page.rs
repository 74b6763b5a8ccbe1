// Menu pages and items
// A page is a title plus an ordered list of items; an item may carry an action, a subpage or both

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Called when the user activates an item with an action. Runs on a task worker.
pub trait ItemAction: Send + Sync {
    fn item_action(&self, page: &Arc<MenuPage>, item: &PageItem) -> anyhow::Result<()>;
}

impl<F> ItemAction for F
where
    F: Fn(&Arc<MenuPage>, &PageItem) -> anyhow::Result<()> + Send + Sync,
{
    fn item_action(&self, page: &Arc<MenuPage>, item: &PageItem) -> anyhow::Result<()> {
        self(page, item)
    }
}

/// One choice on a page.
#[derive(Clone)]
pub struct PageItem {
    label: String,
    action: Option<Arc<dyn ItemAction>>,
    sub_page: Option<Arc<MenuPage>>,
    enabled: bool,
    id: Option<i32>,
    properties: HashMap<i32, String>,
}

impl PageItem {
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            action: None,
            sub_page: None,
            enabled: true,
            id: None,
            properties: HashMap::new(),
        }
    }

    pub fn with_action(mut self, action: impl ItemAction + 'static) -> Self {
        self.action = Some(Arc::new(action));
        self
    }

    /// Shares one action instance between items, or with other owners.
    pub fn with_shared_action(mut self, action: Arc<dyn ItemAction>) -> Self {
        self.action = Some(action);
        self
    }

    pub fn with_sub_page(mut self, page: Arc<MenuPage>) -> Self {
        self.sub_page = Some(page);
        self
    }

    pub fn with_id(mut self, id: i32) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    pub fn with_property(mut self, key: i32, value: impl Into<String>) -> Self {
        self.properties.insert(key, value.into());
        self
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn action(&self) -> Option<&Arc<dyn ItemAction>> {
        self.action.as_ref()
    }

    pub fn sub_page(&self) -> Option<&Arc<MenuPage>> {
        self.sub_page.as_ref()
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn id(&self) -> Option<i32> {
        self.id
    }

    pub fn property(&self, key: i32) -> Option<&str> {
        self.properties.get(&key).map(String::as_str)
    }
}

impl fmt::Debug for PageItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PageItem")
            .field("label", &self.label)
            .field("action", &self.action.is_some())
            .field("sub_page", &self.sub_page.as_ref().map(|p| p.title()))
            .field("enabled", &self.enabled)
            .field("id", &self.id)
            .finish()
    }
}

struct PageState {
    items: Vec<PageItem>,
    selected: i32,
}

impl PageState {
    fn item_at(&self, index: i32) -> Option<&PageItem> {
        usize::try_from(index).ok().and_then(|i| self.items.get(i))
    }

    /// Out of range indices wrap around; disabled items are skipped in the
    /// direction of travel. No items or no enabled items gives -1.
    fn select(&mut self, mut index: i32) {
        let size = self.items.len() as i32;
        if size == 0 || self.items.iter().all(|item| !item.enabled) {
            self.selected = -1;
            return;
        }
        let down = index > self.selected;
        loop {
            if index >= size {
                index = 0;
            } else if index < 0 {
                index = size - 1;
            }
            if self.items[index as usize].enabled {
                break;
            }
            index += if down { 1 } else { -1 };
        }
        self.selected = index;
    }
}

/// A page of the menu. Pages are shared by reference between items and the
/// menu history; a page never links to itself.
pub struct MenuPage {
    title: String,
    state: Mutex<PageState>,
}

impl MenuPage {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            state: Mutex::new(PageState {
                items: Vec::new(),
                selected: -1,
            }),
        }
    }

    pub fn with_items(title: impl Into<String>, items: Vec<PageItem>) -> Arc<Self> {
        let page = Self::new(title);
        page.set_items(items);
        Arc::new(page)
    }

    fn lock(&self) -> MutexGuard<'_, PageState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn add_item(&self, item: PageItem) {
        let mut state = self.lock();
        state.items.push(item);
        if state.selected == -1 {
            state.selected = 0;
        }
    }

    /// Replaces all items and selects the first enabled one.
    pub fn set_items(&self, items: Vec<PageItem>) {
        let mut state = self.lock();
        state.items = items;
        state.selected = -1;
        state.select(0);
    }

    pub fn len(&self) -> usize {
        self.lock().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn item_at(&self, index: i32) -> Option<PageItem> {
        self.lock().item_at(index).cloned()
    }

    pub fn items(&self) -> Vec<PageItem> {
        self.lock().items.clone()
    }

    /// Enables or disables every item with `id`.
    pub fn set_item_enabled(&self, id: i32, enabled: bool) {
        let mut state = self.lock();
        for item in state.items.iter_mut().filter(|i| i.id == Some(id)) {
            item.enabled = enabled;
        }
    }

    pub fn set_item_label(&self, id: i32, label: &str) {
        let mut state = self.lock();
        for item in state.items.iter_mut().filter(|i| i.id == Some(id)) {
            item.label = label.to_string();
        }
    }

    /// Current selection, or -1. A selection that was disabled since it was
    /// made moves on to the next enabled item.
    pub fn selected_index(&self) -> i32 {
        let mut state = self.lock();
        if state.item_at(state.selected).map_or(false, |i| !i.enabled) {
            let next = state.selected + 1;
            state.select(next);
        }
        state.selected
    }

    pub fn selected_item(&self) -> Option<PageItem> {
        let index = self.selected_index();
        self.item_at(index)
    }

    /// Selects `index`, wrapping and skipping disabled items. Returns the
    /// resulting index.
    pub fn set_selected_index(&self, index: i32) -> i32 {
        let mut state = self.lock();
        state.select(index);
        state.selected
    }
}

impl fmt::Debug for MenuPage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.lock();
        f.debug_struct("MenuPage")
            .field("title", &self.title)
            .field("items", &state.items)
            .field("selected", &state.selected)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(enabled: &[bool]) -> MenuPage {
        let page = MenuPage::new("test");
        for (i, &on) in enabled.iter().enumerate() {
            page.add_item(PageItem::new(format!("item {i}")).with_enabled(on));
        }
        page
    }

    #[test]
    fn test_empty_or_all_disabled_selects_nothing() {
        let empty = page(&[]);
        assert_eq!(empty.set_selected_index(0), -1);
        assert_eq!(empty.set_selected_index(3), -1);

        let disabled = page(&[false, false]);
        for index in [-5, -1, 0, 1, 2, 9] {
            assert_eq!(disabled.set_selected_index(index), -1);
        }
        assert!(disabled.selected_item().is_none());
    }

    #[test]
    fn test_selection_wraps_both_ways() {
        let p = page(&[true, true, true]);
        assert_eq!(p.set_selected_index(3), 0);
        assert_eq!(p.set_selected_index(-1), 2);
        assert_eq!(p.set_selected_index(1), 1);
    }

    #[test]
    fn test_disabled_items_are_skipped_in_direction() {
        let p = page(&[true, false, false, true]);
        p.set_selected_index(0);
        // Moving down from 0 lands on 3
        assert_eq!(p.set_selected_index(1), 3);
        // Moving up from 3 lands on 0
        assert_eq!(p.set_selected_index(2), 0);
        // Up from 0 wraps to the last enabled item
        assert_eq!(p.set_selected_index(-1), 3);
    }

    #[test]
    fn test_any_index_resolves_to_enabled_item() {
        let p = page(&[false, true, false, true, false]);
        for index in -7..12 {
            let selected = p.set_selected_index(index);
            assert!(p.item_at(selected).unwrap().is_enabled(), "index {index} -> {selected}");
        }
    }

    #[test]
    fn test_disabling_selected_item_moves_selection() {
        let p = MenuPage::new("ids");
        p.add_item(PageItem::new("a").with_id(1));
        p.add_item(PageItem::new("b").with_id(2));
        assert_eq!(p.selected_index(), 0);
        p.set_item_enabled(1, false);
        assert_eq!(p.selected_index(), 1);
        p.set_item_label(2, "renamed");
        assert_eq!(p.selected_item().unwrap().label(), "renamed");
    }

    #[test]
    fn test_item_properties_and_links() {
        let sub = MenuPage::with_items("sub", vec![PageItem::new("x")]);
        let item = PageItem::new("host")
            .with_property(1, "10.0.0.2:4020")
            .with_sub_page(sub.clone());
        assert_eq!(item.property(1), Some("10.0.0.2:4020"));
        assert_eq!(item.property(2), None);
        assert!(Arc::ptr_eq(item.sub_page().unwrap(), &sub));
    }
}
