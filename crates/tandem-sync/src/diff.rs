//! Hunt–McIlroy diff over two strings.
//!
//! Produces a patch of retain/delete/insert ops transforming one string
//! into another. The algorithm finds the longest common slice (first-found
//! wins among equal lengths, so the result is deterministic), recurses on
//! the flanks, and joins the pieces with a retain. Patches are normalised:
//! adjacent ops of the same kind merge and trailing retains are dropped,
//! so diffing a string against itself yields the empty patch.

use std::collections::HashMap;

/// One step of a patch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PatchOp {
    /// Keep the next `n` characters.
    Retain(usize),
    /// Drop the next `n` characters.
    Delete(usize),
    /// Add the given text at the cursor.
    Insert(String),
}

/// An edit script transforming one string into another.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Patch {
    ops: Vec<PatchOp>,
}

impl Patch {
    /// The steps, in order.
    pub fn ops(&self) -> &[PatchOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Apply this patch to `s0`. Characters past the last op are kept.
    pub fn apply(&self, s0: &str) -> String {
        let mut rest = s0.chars();
        let mut out = String::new();
        for op in &self.ops {
            match op {
                PatchOp::Retain(n) => out.extend(rest.by_ref().take(*n)),
                PatchOp::Delete(n) => {
                    rest.by_ref().take(*n).for_each(drop);
                }
                PatchOp::Insert(text) => out.push_str(text),
            }
        }
        out.extend(rest);
        out
    }

    /// Append `op`, merging with the previous op when both are the same
    /// kind.
    fn push(&mut self, op: PatchOp) {
        match (self.ops.last_mut(), &op) {
            (Some(PatchOp::Retain(prev)), PatchOp::Retain(n)) => *prev += n,
            (Some(PatchOp::Delete(prev)), PatchOp::Delete(n)) => *prev += n,
            (Some(PatchOp::Insert(prev)), PatchOp::Insert(text)) => prev.push_str(text),
            _ => self.ops.push(op),
        }
    }
}

/// Diff `s0` against `s1`.
pub fn diff(s0: &str, s1: &str) -> Patch {
    let a: Vec<char> = s0.chars().collect();
    let b: Vec<char> = s1.chars().collect();
    let mut patch = Patch::default();
    diff_slices(&a, &b, &mut patch);
    if let Some(PatchOp::Retain(_)) = patch.ops.last() {
        patch.ops.pop();
    }
    patch
}

fn diff_slices(a: &[char], b: &[char], out: &mut Patch) {
    match common_slice(a, b) {
        Some((start_a, start_b, len)) => {
            diff_slices(&a[..start_a], &b[..start_b], out);
            out.push(PatchOp::Retain(len));
            diff_slices(&a[start_a + len..], &b[start_b + len..], out);
        }
        None => {
            if !a.is_empty() {
                out.push(PatchOp::Delete(a.len()));
            }
            if !b.is_empty() {
                out.push(PatchOp::Insert(b.iter().collect()));
            }
        }
    }
}

/// Longest common slice of `a` and `b` as `(start_a, start_b, len)`.
///
/// Scans `a` left to right keeping, per end-index in `b`, the length of the
/// common run ending there. Strictly-longer wins, so among equal lengths
/// the earliest match in `a` is kept.
fn common_slice(a: &[char], b: &[char]) -> Option<(usize, usize, usize)> {
    if a.is_empty() || b.is_empty() {
        return None;
    }

    let mut positions: HashMap<char, Vec<usize>> = HashMap::new();
    for (j, &ch) in b.iter().enumerate() {
        positions.entry(ch).or_default().push(j);
    }

    let mut best: Option<(usize, usize, usize)> = None;
    let mut runs: HashMap<usize, usize> = HashMap::new();
    for (i, ch) in a.iter().enumerate() {
        let mut next_runs = HashMap::new();
        if let Some(ends) = positions.get(ch) {
            for &j in ends {
                let len = if j == 0 {
                    1
                } else {
                    runs.get(&(j - 1)).copied().unwrap_or(0) + 1
                };
                next_runs.insert(j, len);
                if best.map_or(true, |(_, _, best_len)| len > best_len) {
                    best = Some((i + 1 - len, j + 1 - len, len));
                }
            }
        }
        runs = next_runs;
    }
    best
}
