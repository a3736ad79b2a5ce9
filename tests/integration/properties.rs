//! Randomized properties over the pure planning layers.

use canopy::keys::{key_between, keys_between, validate_key};
use canopy::sequence::{apply_move, plan_moves};
use canopy::tree::flatten::flatten_all;
use canopy::tree::{build_tree, TabRecord};
use canopy::types::TabId;
use proptest::prelude::*;
use std::collections::HashSet;

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    /// Any desired order that keeps non-movers stable is reached exactly
    /// by replaying the planned single-item moves.
    #[test]
    fn planned_moves_reach_desired_order(
        n in 3usize..10,
        mask in proptest::collection::vec(any::<bool>(), 10),
        slots in proptest::collection::vec(any::<u16>(), 10),
    ) {
        let current: Vec<TabId> = (0..n as TabId).collect();
        let movers: Vec<TabId> = current
            .iter()
            .copied()
            .filter(|id| mask[*id as usize])
            .collect();
        let mut desired: Vec<TabId> = current
            .iter()
            .copied()
            .filter(|id| !movers.contains(id))
            .collect();
        for (i, mover) in movers.iter().enumerate() {
            let at = (slots[i] as usize) % (desired.len() + 1);
            desired.insert(at, *mover);
        }

        let ops = plan_moves(&current, &desired, &movers).unwrap();
        prop_assert!(ops.len() <= movers.len());
        let mut work = current.clone();
        for op in ops {
            apply_move(&mut work, op);
        }
        prop_assert_eq!(work, desired);
    }

    /// Key chains stay strictly ascending and every bisection lands
    /// strictly between its bounds.
    #[test]
    fn key_allocation_is_strictly_ordered(
        count in 2usize..40,
        pick in any::<u16>(),
    ) {
        let chain = keys_between(None, None, count).unwrap();
        for pair in chain.windows(2) {
            prop_assert!(pair[0] < pair[1]);
        }

        let at = (pick as usize) % (count - 1);
        let mid = key_between(Some(&chain[at]), Some(&chain[at + 1])).unwrap();
        prop_assert!(validate_key(&mid).is_ok());
        prop_assert!(chain[at] < mid);
        prop_assert!(mid < chain[at + 1]);
    }

    /// Flattening a random forest visits every id exactly once, parents
    /// strictly before their descendants.
    #[test]
    fn flatten_is_a_preorder_permutation(
        n in 1usize..20,
        parents in proptest::collection::vec(any::<u16>(), 20),
    ) {
        let keys = keys_between(None, None, n).unwrap();
        let records: Vec<TabRecord> = (0..n)
            .map(|i| {
                let parent = if i == 0 {
                    None
                } else {
                    let p = (parents[i] as usize) % (i + 1);
                    if p == i { None } else { Some(p as TabId) }
                };
                TabRecord {
                    id: i as TabId,
                    parent_id: parent,
                    order_key: keys[i].clone(),
                    container_id: Some(1),
                    flat_index: i,
                    collapsed: false,
                    title: None,
                }
            })
            .collect();

        let rows = flatten_all(&build_tree(&records));
        prop_assert_eq!(rows.len(), n);
        let mut seen: HashSet<TabId> = HashSet::new();
        for row in &rows {
            for ancestor in &row.ancestors {
                prop_assert!(seen.contains(ancestor));
            }
            prop_assert!(seen.insert(row.id));
        }
    }
}
