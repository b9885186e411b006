use crate::domain::value_objects::{EntryId, ResourceClass};
use std::collections::HashSet;

/// 延滞警告を出したエントリの記録。
///
/// 延滞 1 回につき警告は 1 度だけ。マーカーは `clear` されるまで残る。
/// カートと許可証は別の名前空間で管理する。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OverdueRegistry {
    alerted_carts: HashSet<EntryId>,
    alerted_permits: HashSet<EntryId>,
}

impl OverdueRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_parts(
        alerted_carts: impl IntoIterator<Item = EntryId>,
        alerted_permits: impl IntoIterator<Item = EntryId>,
    ) -> Self {
        Self {
            alerted_carts: alerted_carts.into_iter().collect(),
            alerted_permits: alerted_permits.into_iter().collect(),
        }
    }

    /// 延滞中かつ未警告なら `true` を返し、同時に警告済みとして記録する。
    pub fn should_alert(&mut self, class: ResourceClass, id: &EntryId, is_overdue: bool) -> bool {
        if !is_overdue {
            return false;
        }
        self.set_mut(class).insert(id.clone())
    }

    pub fn clear(&mut self, class: ResourceClass, id: &EntryId) -> bool {
        self.set_mut(class).remove(id)
    }

    pub fn is_alerted(&self, class: ResourceClass, id: &EntryId) -> bool {
        self.set(class).contains(id)
    }

    /// 台帳に存在しない ID のマーカーを取り除く。
    pub fn retain_active<'a>(
        &mut self,
        class: ResourceClass,
        active: impl IntoIterator<Item = &'a EntryId>,
    ) -> usize {
        let active: HashSet<&EntryId> = active.into_iter().collect();
        let set = self.set_mut(class);
        let before = set.len();
        set.retain(|id| active.contains(id));
        before - set.len()
    }

    /// 保存用に ID 一覧を取り出す。順序は安定させる。
    pub fn alerted_ids(&self, class: ResourceClass) -> Vec<EntryId> {
        let mut ids: Vec<EntryId> = self.set(class).iter().cloned().collect();
        ids.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        ids
    }

    pub fn replace(&mut self, class: ResourceClass, ids: impl IntoIterator<Item = EntryId>) {
        *self.set_mut(class) = ids.into_iter().collect();
    }

    pub fn len(&self, class: ResourceClass) -> usize {
        self.set(class).len()
    }

    fn set(&self, class: ResourceClass) -> &HashSet<EntryId> {
        match class {
            ResourceClass::Cart => &self.alerted_carts,
            ResourceClass::Permit => &self.alerted_permits,
        }
    }

    fn set_mut(&mut self, class: ResourceClass) -> &mut HashSet<EntryId> {
        match class {
            ResourceClass::Cart => &mut self.alerted_carts,
            ResourceClass::Permit => &mut self.alerted_permits,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(value: &str) -> EntryId {
        EntryId::new(value.to_string()).unwrap()
    }

    #[test]
    fn should_alert_fires_once_per_episode() {
        let mut registry = OverdueRegistry::new();
        let cart = id("cart-1");

        assert!(!registry.should_alert(ResourceClass::Cart, &cart, false));
        assert!(registry.should_alert(ResourceClass::Cart, &cart, true));
        for _ in 0..5 {
            assert!(!registry.should_alert(ResourceClass::Cart, &cart, true));
        }
        assert!(registry.is_alerted(ResourceClass::Cart, &cart));
    }

    #[test]
    fn clear_rearms_alerts() {
        let mut registry = OverdueRegistry::new();
        let cart = id("cart-1");
        assert!(registry.should_alert(ResourceClass::Cart, &cart, true));

        assert!(registry.clear(ResourceClass::Cart, &cart));
        assert!(!registry.clear(ResourceClass::Cart, &cart));
        assert!(!registry.should_alert(ResourceClass::Cart, &cart, false));
        assert!(registry.should_alert(ResourceClass::Cart, &cart, true));
    }

    #[test]
    fn classes_are_independent_namespaces() {
        let mut registry = OverdueRegistry::new();
        let shared = id("1714550400000");

        assert!(registry.should_alert(ResourceClass::Cart, &shared, true));
        assert!(registry.should_alert(ResourceClass::Permit, &shared, true));

        registry.clear(ResourceClass::Cart, &shared);
        assert!(!registry.is_alerted(ResourceClass::Cart, &shared));
        assert!(registry.is_alerted(ResourceClass::Permit, &shared));
    }

    #[test]
    fn retain_active_drops_stale_markers() {
        let mut registry =
            OverdueRegistry::from_parts(vec![id("a"), id("b"), id("c")], vec![id("p")]);
        let active = [id("b")];

        let removed = registry.retain_active(ResourceClass::Cart, active.iter());
        assert_eq!(removed, 2);
        assert_eq!(registry.alerted_ids(ResourceClass::Cart), vec![id("b")]);
        assert_eq!(registry.len(ResourceClass::Permit), 1);
    }
}
