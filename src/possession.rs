//! Ball possession per frame and the running team ball control.

use serde_derive::{Deserialize, Serialize};
use tracing::debug;

use crate::bbox::{BBox, Ltrb};
use crate::track::{FrameTracks, Team, TrackId, Tracks};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlayerBallAssigner {
    /// Farthest a foot may be from the ball centre for the player to hold it, in px.
    pub max_player_ball_distance: f32,
}

impl Default for PlayerBallAssigner {
    fn default() -> Self {
        Self {
            max_player_ball_distance: 70.0,
        }
    }
}

impl PlayerBallAssigner {
    pub fn new(max_player_ball_distance: f32) -> Self {
        Self {
            max_player_ball_distance,
        }
    }

    /// Player whose nearer foot corner is closest to the ball, if within range.
    pub fn assign_ball_to_player(&self, players: &FrameTracks, ball: &BBox<Ltrb>) -> Option<TrackId> {
        let (bx, by) = ball.center();

        players
            .iter()
            .map(|(&id, info)| {
                let b = &info.bbox;
                let left = (b.left() - bx).hypot(b.bottom() - by);
                let right = (b.right() - bx).hypot(b.bottom() - by);
                (id, left.min(right))
            })
            .filter(|&(_, d)| d < self.max_player_ball_distance)
            .fold(None, |best: Option<(TrackId, f32)>, cur| match best {
                Some(b) if b.1 <= cur.1 => Some(b),
                _ => Some(cur),
            })
            .map(|(id, _)| id)
    }

    /// Marks the ball holder of every frame and returns, per frame, the team
    /// in control. A frame where nobody holds the ball keeps the previous
    /// frame's team; frames before the first possession have `None`.
    pub fn assign_possession(&self, mut tracks: Tracks) -> (Tracks, Vec<Option<Team>>) {
        let mut control = Vec::with_capacity(tracks.len());
        let mut current = None;

        for idx in 0..tracks.len() {
            let Some(ball) = tracks.ball_bbox(idx) else {
                control.push(current);
                continue;
            };

            let players = &mut tracks.players[idx];
            if let Some(id) = self.assign_ball_to_player(players, &ball) {
                if let Some(info) = players.get_mut(&id) {
                    info.has_ball = true;
                    if info.team.is_some() {
                        current = info.team;
                    }
                }
            }

            control.push(current);
        }

        debug!(frames = control.len(), "ball possession assigned");
        (tracks, control)
    }
}

/// Share of frames `0..=upto` controlled by each team, as `(team 1, team 2)` fractions.
pub fn control_share(control: &[Option<Team>], upto: usize) -> (f32, f32) {
    let seen = &control[..control.len().min(upto + 1)];
    let one = seen.iter().filter(|t| **t == Some(Team::One)).count() as f32;
    let two = seen.iter().filter(|t| **t == Some(Team::Two)).count() as f32;

    if one + two == 0.0 {
        return (0.0, 0.0);
    }

    (one / (one + two), two / (one + two))
}
