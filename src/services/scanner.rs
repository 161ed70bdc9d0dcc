use crate::host::{HOTBAR_SIZE, MAIN_STORAGE, SlotSpace};

/// Which part of the slot space a match came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotRegion {
    /// The selected hotbar slot.
    MainHand,
    /// Any other hotbar slot.
    Hotbar,
    MainStorage,
}

/// Result of an inventory scan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlotRef {
    /// Inventory index (`0..9` hotbar, `9..36` storage).
    pub index: usize,
    pub region: SlotRegion,
    pub count: u32,
}

/// Find the first slot holding at least `min_count` of `item_id`.
///
/// Search order: the selected hotbar slot, the remaining hotbar slots in
/// ascending order, then main storage in ascending order. Empty slots never
/// match.
pub fn find_target<S>(space: &S, item_id: &str, min_count: u32) -> Option<SlotRef>
where
    S: SlotSpace + ?Sized,
{
    let selected = space.selected_slot();

    let hotbar = std::iter::once(selected)
        .chain((0..HOTBAR_SIZE).filter(|&i| i != selected))
        .map(|index| {
            let region = if index == selected {
                SlotRegion::MainHand
            } else {
                SlotRegion::Hotbar
            };
            (index, region)
        });
    let storage = MAIN_STORAGE.map(|index| (index, SlotRegion::MainStorage));

    hotbar.chain(storage).find_map(|(index, region)| {
        let stack = space.stack(index);
        (stack.is(item_id) && stack.count >= min_count).then_some(SlotRef {
            index,
            region,
            count: stack.count,
        })
    })
}

/// First empty hotbar slot in ascending order.
pub fn find_free_hotbar_slot<S>(space: &S) -> Option<usize>
where
    S: SlotSpace + ?Sized,
{
    (0..HOTBAR_SIZE).find(|&i| space.stack(i).is_empty())
}

/// First empty main-storage slot, used as scratch space while splitting.
pub fn find_scratch_slot<S>(space: &S) -> Option<usize>
where
    S: SlotSpace + ?Sized,
{
    MAIN_STORAGE.into_iter().find(|&i| space.stack(i).is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::{INVENTORY_SIZE, ItemStack};
    use proptest::prelude::*;

    const TARGET: &str = "minecraft:diamond";

    struct Slots {
        selected: usize,
        stacks: Vec<ItemStack>,
    }

    impl Slots {
        fn empty(selected: usize) -> Self {
            Self {
                selected,
                stacks: vec![ItemStack::empty(); INVENTORY_SIZE],
            }
        }

        fn with(mut self, index: usize, item_id: &str, count: u32) -> Self {
            self.stacks[index] = ItemStack::new(item_id, count);
            self
        }
    }

    impl SlotSpace for Slots {
        fn selected_slot(&self) -> usize {
            self.selected
        }

        fn stack(&self, index: usize) -> ItemStack {
            self.stacks[index].clone()
        }
    }

    #[test]
    fn test_selected_slot_wins() {
        let slots = Slots::empty(4).with(0, TARGET, 10).with(4, TARGET, 10);

        let found = find_target(&slots, TARGET, 5).unwrap();
        assert_eq!(found.index, 4);
        assert_eq!(found.region, SlotRegion::MainHand);
    }

    #[test]
    fn test_hotbar_before_storage() {
        let slots = Slots::empty(0).with(9, TARGET, 64).with(7, TARGET, 5);

        let found = find_target(&slots, TARGET, 5).unwrap();
        assert_eq!(found.index, 7);
        assert_eq!(found.region, SlotRegion::Hotbar);
    }

    #[test]
    fn test_storage_ascending() {
        let slots = Slots::empty(0).with(30, TARGET, 5).with(12, TARGET, 5);

        let found = find_target(&slots, TARGET, 5).unwrap();
        assert_eq!(found.index, 12);
        assert_eq!(found.region, SlotRegion::MainStorage);
    }

    #[test]
    fn test_small_stacks_and_other_items_skipped() {
        let slots = Slots::empty(0)
            .with(0, TARGET, 4)
            .with(1, "minecraft:dirt", 64)
            .with(20, TARGET, 6);

        let found = find_target(&slots, TARGET, 5).unwrap();
        assert_eq!(found.index, 20);
        assert_eq!(found.count, 6);
    }

    #[test]
    fn test_no_match() {
        let slots = Slots::empty(0).with(3, "minecraft:dirt", 64);
        assert_eq!(find_target(&slots, TARGET, 1), None);
    }

    #[test]
    fn test_free_and_scratch_slots() {
        let mut slots = Slots::empty(0);
        for i in 0..5 {
            slots = slots.with(i, "minecraft:dirt", 1);
        }
        slots = slots.with(9, "minecraft:dirt", 1);

        assert_eq!(find_free_hotbar_slot(&slots), Some(5));
        assert_eq!(find_scratch_slot(&slots), Some(10));
    }

    #[test]
    fn test_full_hotbar_has_no_free_slot() {
        let mut slots = Slots::empty(0);
        for i in 0..HOTBAR_SIZE {
            slots = slots.with(i, "minecraft:dirt", 1);
        }
        assert_eq!(find_free_hotbar_slot(&slots), None);
        assert_eq!(find_scratch_slot(&slots), Some(9));
    }

    proptest! {
        #[test]
        fn prop_match_is_first_eligible_in_priority_order(
            counts in proptest::collection::vec(0u32..8, INVENTORY_SIZE),
            selected in 0usize..HOTBAR_SIZE,
            min_count in 1u32..6,
        ) {
            let mut slots = Slots::empty(selected);
            for (i, &count) in counts.iter().enumerate() {
                slots = slots.with(i, TARGET, count);
            }

            let mut order = vec![selected];
            order.extend((0..HOTBAR_SIZE).filter(|&i| i != selected));
            order.extend(MAIN_STORAGE);
            let expected = order.into_iter().find(|&i| counts[i] >= min_count);

            let found = find_target(&slots, TARGET, min_count);
            prop_assert_eq!(found.map(|s| s.index), expected);
            if let Some(slot) = found {
                prop_assert!(slot.count >= min_count);
            }
        }
    }
}
