//! Lloyd's k-means over the rows of a table.
//!
//! Seeding is deterministic: the first row, then repeatedly the row farthest
//! from its nearest centroid. Identical input always yields identical labels.

use ndarray::prelude::*;

const MAX_ITER: usize = 300;
const TOLERANCE: f32 = 1e-4;

#[derive(Debug, Clone, PartialEq)]
pub struct KMeans {
    centroids: Array2<f32>,
    labels: Vec<usize>,
}

impl KMeans {
    /// Clusters `data` (one sample per row) into at most `k` groups.
    ///
    /// Returns `None` for an empty table or `k == 0`.
    pub fn fit(data: ArrayView2<'_, f32>, k: usize) -> Option<Self> {
        if data.nrows() == 0 || k == 0 {
            return None;
        }

        let mut centroids = seed(data, k);
        let mut labels = vec![0; data.nrows()];

        for _ in 0..MAX_ITER {
            for (label, row) in labels.iter_mut().zip(data.rows()) {
                *label = nearest(centroids.view(), row);
            }

            let mut sums = Array2::<f32>::zeros(centroids.raw_dim());
            let mut counts = vec![0usize; centroids.nrows()];
            for (&label, row) in labels.iter().zip(data.rows()) {
                let mut sum = sums.row_mut(label);
                sum += &row;
                counts[label] += 1;
            }

            let mut shift = 0.0f32;
            for (c, &count) in counts.iter().enumerate() {
                if count == 0 {
                    continue;
                }

                let mean = &sums.row(c) / count as f32;
                shift = shift.max(sq_dist(centroids.row(c), mean.view()));
                centroids.row_mut(c).assign(&mean);
            }

            if shift <= TOLERANCE {
                break;
            }
        }

        for (label, row) in labels.iter_mut().zip(data.rows()) {
            *label = nearest(centroids.view(), row);
        }

        Some(Self { centroids, labels })
    }

    #[inline]
    pub fn centroids(&self) -> ArrayView2<'_, f32> {
        self.centroids.view()
    }

    #[inline]
    pub fn centroid(&self, cluster: usize) -> ArrayView1<'_, f32> {
        self.centroids.row(cluster)
    }

    /// Cluster of each training row.
    #[inline]
    pub fn labels(&self) -> &[usize] {
        &self.labels
    }

    #[inline]
    pub fn predict(&self, sample: ArrayView1<'_, f32>) -> usize {
        nearest(self.centroids.view(), sample)
    }
}

fn seed(data: ArrayView2<'_, f32>, k: usize) -> Array2<f32> {
    let mut picked = vec![0usize];

    while picked.len() < k {
        let farthest = data
            .rows()
            .into_iter()
            .enumerate()
            .map(|(i, row)| {
                let d = picked
                    .iter()
                    .map(|&p| sq_dist(data.row(p), row))
                    .fold(f32::INFINITY, f32::min);
                (i, d)
            })
            .fold((0, 0.0f32), |best, cur| if cur.1 > best.1 { cur } else { best });

        // every remaining row coincides with a centroid
        if farthest.1 <= 0.0 {
            break;
        }
        picked.push(farthest.0);
    }

    data.select(Axis(0), &picked)
}

fn nearest(centroids: ArrayView2<'_, f32>, sample: ArrayView1<'_, f32>) -> usize {
    centroids
        .rows()
        .into_iter()
        .enumerate()
        .map(|(i, c)| (i, sq_dist(c, sample)))
        .fold((0, f32::INFINITY), |best, cur| if cur.1 < best.1 { cur } else { best })
        .0
}

#[inline]
fn sq_dist(a: ArrayView1<'_, f32>, b: ArrayView1<'_, f32>) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y) * (x - y)).sum()
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn two_blobs() {
        let data = array![
            [0.0, 0.0],
            [1.0, 0.0],
            [0.0, 1.0],
            [10.0, 10.0],
            [11.0, 10.0],
            [10.0, 11.0],
        ];

        let km = KMeans::fit(data.view(), 2).unwrap();
        assert_eq!(km.labels(), &[0, 0, 0, 1, 1, 1]);
        assert_eq!(km.predict(array![9.0, 9.0].view()), 1);

        let c = km.centroid(1);
        assert!((c[0] - 10.333).abs() < 1e-2 && (c[1] - 10.333).abs() < 1e-2);
    }

    #[test]
    fn degenerate_input() {
        let data = array![[5.0, 5.0], [5.0, 5.0]];
        let km = KMeans::fit(data.view(), 2).unwrap();

        assert_eq!(km.centroids().nrows(), 1);
        assert_eq!(km.labels(), &[0, 0]);
        assert!(KMeans::fit(Array2::<f32>::zeros((0, 3)).view(), 2).is_none());
    }
}
