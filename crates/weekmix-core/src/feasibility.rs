//! Satisfiability of the remaining pillar allocation.
//!
//! The outstanding work is a bipartite matching between slots (one per day a
//! unique theme still has to fill, one per independent theme) and pillar values
//! (each usable once across all themes). A complete matching exists exactly
//! when every remaining theme can still be served without reusing a value.

use std::collections::{HashMap, HashSet};

/// Outstanding need of one theme.
#[derive(Debug, Clone, Copy)]
pub struct Demand<'a> {
    pub candidates: &'a [String],
    pub slots: usize,
}

impl<'a> Demand<'a> {
    pub fn new(candidates: &'a [String], slots: usize) -> Self {
        Self { candidates, slots }
    }
}

/// True when every demand can be met from values outside `consumed`.
pub fn is_satisfiable(demands: &[Demand<'_>], consumed: &HashSet<String>) -> bool {
    complete_assignment(demands, consumed).is_some()
}

/// Deterministic complete assignment, one value list per demand.
///
/// Slots are matched in demand order, candidates in configured order, so the
/// same inputs always produce the same assignment.
pub fn complete_assignment(
    demands: &[Demand<'_>],
    consumed: &HashSet<String>,
) -> Option<Vec<Vec<String>>> {
    let mut value_ids: HashMap<&str, usize> = HashMap::new();
    let mut values: Vec<&str> = Vec::new();
    // Candidate value ids per slot, plus the demand each slot belongs to.
    let mut slots: Vec<(usize, Vec<usize>)> = Vec::new();

    for (owner, demand) in demands.iter().enumerate() {
        let mut candidates = Vec::new();
        for value in demand.candidates {
            if consumed.contains(value) {
                continue;
            }
            let id = *value_ids.entry(value.as_str()).or_insert_with(|| {
                values.push(value.as_str());
                values.len() - 1
            });
            if !candidates.contains(&id) {
                candidates.push(id);
            }
        }
        if candidates.len() < demand.slots {
            return None;
        }
        for _ in 0..demand.slots {
            slots.push((owner, candidates.clone()));
        }
    }

    if slots.len() > values.len() {
        return None;
    }

    let mut holder: Vec<Option<usize>> = vec![None; values.len()];
    for slot in 0..slots.len() {
        let mut visited = vec![false; values.len()];
        if !augment(slot, &slots, &mut holder, &mut visited) {
            return None;
        }
    }

    let mut matched: Vec<Option<usize>> = vec![None; slots.len()];
    for (value, slot) in holder.iter().enumerate() {
        if let Some(slot) = slot {
            matched[*slot] = Some(value);
        }
    }

    let mut assignment = vec![Vec::new(); demands.len()];
    for (slot, value) in matched.into_iter().enumerate() {
        let value = value?;
        assignment[slots[slot].0].push(values[value].to_string());
    }
    Some(assignment)
}

fn augment(
    slot: usize,
    slots: &[(usize, Vec<usize>)],
    holder: &mut [Option<usize>],
    visited: &mut [bool],
) -> bool {
    // Prefer an unclaimed value so earlier slots keep their configured order.
    for &value in &slots[slot].1 {
        if holder[value].is_none() {
            visited[value] = true;
            holder[value] = Some(slot);
            return true;
        }
    }
    for &value in &slots[slot].1 {
        if visited[value] {
            continue;
        }
        visited[value] = true;
        let free = match holder[value] {
            None => true,
            Some(other) => augment(other, slots, holder, visited),
        };
        if free {
            holder[value] = Some(slot);
            return true;
        }
    }
    false
}
