use munkres::{solve_assignment, WeightMatrix};

use crate::error::{Error, Result};

/// Cost given to padding cells of the square matrix.
const PAD_COST: f32 = 100_000.0;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Matches {
    /// `(row, col)` pairs, both as indices of the full collections.
    pub matched: Vec<(usize, usize)>,
    pub unmatched_rows: Vec<usize>,
    pub unmatched_cols: Vec<usize>,
}

/// Minimum-cost matching between the `rows` subset and the `cols` subset.
///
/// `cost(row, col)` receives full-collection indices. Pairs whose cost exceeds
/// `max_cost` are rejected and both sides reported unmatched.
pub fn assign<F>(rows: &[usize], cols: &[usize], max_cost: f32, cost: F) -> Result<Matches>
where
    F: Fn(usize, usize) -> f32,
{
    if rows.is_empty() || cols.is_empty() {
        return Ok(Matches {
            matched: Vec::new(),
            unmatched_rows: rows.to_vec(),
            unmatched_cols: cols.to_vec(),
        });
    }

    let n = rows.len().max(cols.len());
    let costs: Vec<f32> = (0..n * n)
        .map(|i| {
            let (r, c) = (i / n, i % n);
            if r < rows.len() && c < cols.len() {
                let v = cost(rows[r], cols[c]);
                if v.is_finite() {
                    v.min(PAD_COST)
                } else {
                    PAD_COST
                }
            } else {
                PAD_COST
            }
        })
        .collect();

    let mut mat = WeightMatrix::from_row_vec(n, costs.clone());
    let solution = solve_assignment(&mut mat)
        .map_err(|err| Error::Tracker(format!("assignment could not be solved: {:?}", err)))?;

    let mut row_used = vec![false; rows.len()];
    let mut col_used = vec![false; cols.len()];
    let mut matched = Vec::new();

    for pos in solution {
        let (r, c) = (pos.row, pos.column);
        if r < rows.len() && c < cols.len() && costs[r * n + c] <= max_cost {
            row_used[r] = true;
            col_used[c] = true;
            matched.push((rows[r], cols[c]));
        }
    }

    matched.sort_unstable();

    Ok(Matches {
        matched,
        unmatched_rows: rows
            .iter()
            .zip(row_used)
            .filter_map(|(&r, used)| (!used).then_some(r))
            .collect(),
        unmatched_cols: cols
            .iter()
            .zip(col_used)
            .filter_map(|(&c, used)| (!used).then_some(c))
            .collect(),
    })
}

/// Fuses a cost with the detection confidence, so confident detections win ties.
#[inline]
pub fn fuse_score(iou_cost: f32, confidence: f32) -> f32 {
    1.0 - (1.0 - iou_cost) * confidence
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn picks_global_minimum() {
        let cost = [[0.1, 0.2], [0.15, 0.9]];
        let m = assign(&[0, 1], &[0, 1], 0.5, |r, c| cost[r][c]).unwrap();

        assert_eq!(m.matched, vec![(0, 1), (1, 0)]);
        assert!(m.unmatched_rows.is_empty());
        assert!(m.unmatched_cols.is_empty());
    }

    #[test]
    fn rejects_expensive_pairs_and_keeps_subset_indices() {
        let m = assign(&[3, 7], &[2, 5, 9], 0.5, |r, c| match (r, c) {
            (3, 5) => 0.1,
            (7, 9) => 0.8,
            _ => 1.0,
        })
        .unwrap();

        assert_eq!(m.matched, vec![(3, 5)]);
        assert_eq!(m.unmatched_rows, vec![7]);
        assert_eq!(m.unmatched_cols, vec![2, 9]);
    }

    #[test]
    fn empty_side() {
        let m = assign(&[], &[0, 1], 0.5, |_, _| 0.0).unwrap();
        assert!(m.matched.is_empty());
        assert_eq!(m.unmatched_cols, vec![0, 1]);
    }
}
