//! 行選択状態の照合
//!
//! 選択は現在のページに限定される。ページまたはページサイズが変わると、
//! 変更後も見えているIDがあっても無条件にクリアする。

use std::collections::BTreeSet;

/// ページング操作の種類
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageChange {
    Page { from: u32, to: u32 },
    PageSize { from: u32, to: u32 },
}

/// 選択中の行IDの集合（含まれないIDは未選択）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection<Id: Ord + Clone> {
    selected: BTreeSet<Id>,
}

impl<Id: Ord + Clone> Default for Selection<Id> {
    fn default() -> Self {
        Self {
            selected: BTreeSet::new(),
        }
    }
}

impl<Id: Ord + Clone> Selection<Id> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn toggle(&mut self, id: Id) {
        if !self.selected.remove(&id) {
            self.selected.insert(id);
        }
    }

    pub fn is_selected(&self, id: &Id) -> bool {
        self.selected.contains(id)
    }

    /// 現在ページの行がすべて選択済みか（空ページはfalse）
    pub fn is_all_selected(&self, current_page_ids: &[Id]) -> bool {
        !current_page_ids.is_empty() && current_page_ids.iter().all(|id| self.selected.contains(id))
    }

    /// 全選択チェックボックス: 全選択済みなら全解除、そうでなければ現在ページを全選択
    pub fn toggle_all(&mut self, current_page_ids: &[Id]) {
        if self.is_all_selected(current_page_ids) {
            self.selected.clear();
        } else {
            self.selected.extend(current_page_ids.iter().cloned());
        }
    }

    pub fn clear(&mut self) {
        self.selected.clear();
    }

    /// ページング変更時の照合（常に空になる）
    pub fn reconcile(&mut self, _change: PageChange) {
        self.selected.clear();
    }

    /// 一括操作の実行時点での選択内容
    pub fn snapshot(&self) -> Vec<Id> {
        self.selected.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.selected.len()
    }

    pub fn is_empty(&self) -> bool {
        self.selected.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_toggle_flips_membership() {
        let mut selection = Selection::new();
        selection.toggle(5);
        assert!(selection.is_selected(&5));
        selection.toggle(5);
        assert!(!selection.is_selected(&5));
    }

    #[test]
    fn test_toggle_all_twice_restores_empty() {
        let mut selection = Selection::new();
        let ids = [1, 2, 3];
        selection.toggle_all(&ids);
        assert_eq!(selection.snapshot(), vec![1, 2, 3]);
        selection.toggle_all(&ids);
        assert!(selection.is_empty());
    }

    #[test]
    fn test_toggle_all_with_partial_selection_selects_all() {
        let mut selection = Selection::new();
        selection.toggle(2);
        selection.toggle_all(&[1, 2, 3]);
        assert_eq!(selection.len(), 3);
    }

    #[test]
    fn test_toggle_all_on_empty_page_is_noop() {
        let mut selection: Selection<i64> = Selection::new();
        selection.toggle_all(&[]);
        assert!(selection.is_empty());
        assert!(!selection.is_all_selected(&[]));
    }

    #[test]
    fn test_reconcile_clears_even_when_rows_still_visible() {
        let mut selection = Selection::new();
        selection.toggle(5);
        selection.toggle(9);
        selection.reconcile(PageChange::PageSize { from: 50, to: 20 });
        assert!(selection.is_empty());

        selection.toggle(1);
        selection.reconcile(PageChange::Page { from: 0, to: 0 });
        assert!(selection.is_empty());
    }
}
