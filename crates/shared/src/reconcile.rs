//! Pending-set reconciliation shared by the simulator server and the run controller.

use std::{collections::HashSet, hash::Hash};

/// Elements of `a` that are also present in `b`, in the order of `a`.
pub fn intersection<T: Eq + Hash + Clone>(a: &[T], b: &[T]) -> Vec<T> {
    let lookup: HashSet<&T> = b.iter().collect();
    a.iter().filter(|item| lookup.contains(item)).cloned().collect()
}

/// Elements of `a` that are absent from `b`, in the order of `a`.
pub fn difference<T: Eq + Hash + Clone>(a: &[T], b: &[T]) -> Vec<T> {
    let lookup: HashSet<&T> = b.iter().collect();
    a.iter().filter(|item| !lookup.contains(item)).cloned().collect()
}

/// Splits `pending` into `(delivered, still_pending)` against the wells read so far.
pub fn split_delivered<T: Eq + Hash + Clone>(pending: &[T], read: &[T]) -> (Vec<T>, Vec<T>) {
    (intersection(pending, read), difference(pending, read))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::WellId;

    fn wells(names: &[&str]) -> Vec<WellId> {
        names.iter().map(|name| name.parse().expect("well")).collect()
    }

    fn subset(universe: &[WellId], mask: u32) -> Vec<WellId> {
        universe
            .iter()
            .enumerate()
            .filter(|(index, _)| mask & (1 << index) != 0)
            .map(|(_, well)| *well)
            .collect()
    }

    #[test]
    fn intersection_keeps_order_of_left_side() {
        let a = wells(&["C3", "A1", "B2"]);
        let b = wells(&["B2", "C3"]);
        assert_eq!(intersection(&a, &b), wells(&["C3", "B2"]));
        assert_eq!(difference(&a, &b), wells(&["A1"]));
    }

    #[test]
    fn empty_inputs() {
        let a = wells(&["A1"]);
        assert!(intersection(&a, &[]).is_empty());
        assert_eq!(difference(&a, &[]), a);
        assert!(intersection::<WellId>(&[], &a).is_empty());
        assert!(difference::<WellId>(&[], &a).is_empty());
    }

    #[test]
    fn partition_law_holds_for_every_pair_of_subsets() {
        let universe = wells(&["A1", "A2", "B7", "D12", "H1", "H12"]);
        let combos = 1u32 << universe.len();
        for left in 0..combos {
            // Duplicates on the left side must be carried through as well.
            let mut a = subset(&universe, left);
            if let Some(first) = a.first().copied() {
                a.push(first);
            }
            for right in 0..combos {
                let b = subset(&universe, right);
                let (inside, outside) = split_delivered(&a, &b);

                assert!(inside.iter().all(|well| !outside.contains(well)));
                assert_eq!(inside.len() + outside.len(), a.len());

                let mut rebuilt = inside.clone();
                rebuilt.extend(outside.iter().copied());
                rebuilt.sort();
                let mut expected = a.clone();
                expected.sort();
                assert_eq!(rebuilt, expected);
            }
        }
    }
}
