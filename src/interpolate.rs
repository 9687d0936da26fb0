//! Anchor points and ball gap filling.

use ndarray::prelude::*;
use tracing::debug;

use crate::bbox::BBox;
use crate::track::{Category, FrameTracks, TrackInfo, Tracks, BALL_ID};

/// Sets `position` on every track: box centre for the ball, foot point for people.
pub fn add_position_to_tracks(mut tracks: Tracks) -> Tracks {
    for category in Category::ALL {
        for frame in tracks.category_mut(category).iter_mut() {
            for info in frame.values_mut() {
                info.position = Some(match category {
                    Category::Ball => info.bbox.center(),
                    Category::Players | Category::Referees => info.bbox.foot(),
                });
            }
        }
    }

    tracks
}

/// Fills frames without a ball box.
///
/// Gaps between two known boxes are filled linearly per coordinate, a
/// trailing gap repeats the last known box and a leading gap repeats the
/// first one. When no frame has a ball the sequence is returned as is.
pub fn interpolate_ball_positions(ball: &[FrameTracks]) -> Vec<FrameTracks> {
    let mut table = Array2::<f32>::from_elem((ball.len(), 4), f32::NAN);
    for (idx, frame) in ball.iter().enumerate() {
        if let Some(info) = frame.get(&BALL_ID) {
            table.row_mut(idx).assign(&ArrayView1::from(&info.bbox.as_slice()[..]));
        }
    }

    let known = table.column(0).iter().filter(|v| !v.is_nan()).count();
    if known == 0 {
        return ball.to_vec();
    }

    for column in table.columns_mut() {
        fill_column(column);
    }

    debug!(frames = ball.len(), filled = ball.len() - known, "interpolated ball");

    table
        .rows()
        .into_iter()
        .map(|row| {
            let bbox = BBox::ltrb(row[0], row[1], row[2], row[3]);
            FrameTracks::from([(BALL_ID, TrackInfo::new(bbox))])
        })
        .collect()
}

fn fill_column(mut col: ArrayViewMut1<'_, f32>) {
    let known: Vec<usize> = (0..col.len()).filter(|&i| !col[i].is_nan()).collect();
    let (Some(&first), Some(&last)) = (known.first(), known.last()) else {
        return;
    };

    for w in known.windows(2) {
        let (a, b) = (w[0], w[1]);
        let (va, vb) = (col[a], col[b]);
        for i in a + 1..b {
            let t = (i - a) as f32 / (b - a) as f32;
            col[i] = va + (vb - va) * t;
        }
    }

    let (head, tail) = (col[first], col[last]);
    col.slice_mut(s![..first]).fill(head);
    col.slice_mut(s![last + 1..]).fill(tail);
}
