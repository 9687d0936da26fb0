//! Two-team split by jersey colour.
//!
//! Team colours are fixed once from a reference frame. Every player id is then
//! placed in a team the first time it is seen and keeps that team for the rest
//! of the run, whatever later crops look like.

use std::collections::HashMap;

use ndarray::prelude::*;
use tracing::{debug, warn};

use crate::bbox::{BBox, Ltrb};
use crate::frame::Frame;
use crate::kmeans::KMeans;
use crate::track::{FrameTracks, Team, TrackId, Tracks};

pub type Rgb = [f32; 3];

#[derive(Debug, Clone, Default)]
pub struct TeamAssigner {
    team_colors: Option<[Rgb; 2]>,
    kmeans: Option<KMeans>,
    player_team: HashMap<TrackId, Team>,
}

impl TeamAssigner {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn is_fitted(&self) -> bool {
        self.kmeans.is_some()
    }

    /// Dominant jersey colour of the player in `bbox`.
    ///
    /// The upper half of the box is split into two colour clusters; the one
    /// holding most of the crop's corners is the background, the other one is
    /// the kit.
    pub fn player_color(&self, frame: &Frame, bbox: &BBox<Ltrb>) -> Option<Rgb> {
        let half = BBox::ltrb(bbox.left(), bbox.top(), bbox.right(), bbox.top() + bbox.height() / 2.0);
        let crop = frame.crop(&half)?;
        let (w, h) = crop.dimensions();

        let pixels = Array2::from_shape_vec(
            ((w * h) as usize, 3),
            crop.pixels().flat_map(|p| p.0.map(f32::from)).collect(),
        )
        .ok()?;

        let km = KMeans::fit(pixels.view(), 2)?;
        let labels = km.labels();

        let corners = [0, w - 1, (h - 1) * w, h * w - 1].map(|i| labels[i as usize]);
        let background_votes = corners.iter().filter(|&&l| l == 1).count();
        let background = if background_votes > 2 { 1 } else { 0 };

        let kit = if km.centroids().nrows() < 2 {
            0
        } else {
            1 - background
        };

        let c = km.centroid(kit);
        Some([c[0], c[1], c[2]])
    }

    /// Fixes the two team colours from the players visible in `frame`.
    ///
    /// Returns `false` and stays unfitted when no player colour can be read.
    pub fn assign_team_color(&mut self, frame: &Frame, players: &FrameTracks) -> bool {
        let colors: Vec<f32> = players
            .values()
            .filter_map(|info| self.player_color(frame, &info.bbox))
            .flatten()
            .collect();

        let n = colors.len() / 3;
        let Some(km) = Array2::from_shape_vec((n, 3), colors)
            .ok()
            .and_then(|table| KMeans::fit(table.view(), 2))
        else {
            return false;
        };

        let first = km.centroid(0);
        let second = km.centroid(km.centroids().nrows() - 1);
        let team_colors = [
            [first[0], first[1], first[2]],
            [second[0], second[1], second[2]],
        ];

        debug!(?team_colors, players = n, "team colours fixed");

        self.team_colors = Some(team_colors);
        self.kmeans = Some(km);
        true
    }

    /// Team of `player_id`, decided on first sight and never revised.
    ///
    /// `None` while unfitted, or when the first crop of a new player is empty;
    /// nothing is cached in that case.
    pub fn get_player_team(&mut self, frame: &Frame, bbox: &BBox<Ltrb>, player_id: TrackId) -> Option<Team> {
        if let Some(&team) = self.player_team.get(&player_id) {
            return Some(team);
        }

        let km = self.kmeans.as_ref()?;
        let color = self.player_color(frame, bbox)?;
        let team = Team::from_cluster(km.predict(ArrayView1::from(&color[..])));

        self.player_team.insert(player_id, team);
        Some(team)
    }

    #[inline]
    pub fn team_color(&self, team: Team) -> Option<Rgb> {
        self.team_colors.map(|colors| colors[team.cluster()])
    }
}

/// Sets `team` and `team_color` on every player.
///
/// The first frame with at least two players is the reference for the team
/// colours. Without one, players are left without a team.
pub fn assign_teams(mut tracks: Tracks, frames: &[Frame], assigner: &mut TeamAssigner) -> Tracks {
    if !assigner.is_fitted() {
        let reference = tracks
            .players
            .iter()
            .zip(frames)
            .find(|(players, _)| players.len() >= 2);

        match reference {
            Some((players, frame)) => {
                if !assigner.assign_team_color(frame, players) {
                    warn!(frame = frame.index, "could not read kit colours");
                }
            }
            None => warn!("no frame with two players, skipping team assignment"),
        }
    }

    for (players, frame) in tracks.players.iter_mut().zip(frames) {
        for (&id, info) in players.iter_mut() {
            if let Some(team) = assigner.get_player_team(frame, &info.bbox, id) {
                info.team = Some(team);
                info.team_color = assigner.team_color(team);
            }
        }
    }

    tracks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::TrackInfo;
    use crate::trackers::tests::{paint, pitch};

    const RED: [u8; 3] = [220, 30, 30];
    const BLUE: [u8; 3] = [30, 30, 220];

    fn player(x: f32) -> BBox<Ltrb> {
        BBox::ltrb(x, 100.0, x + 40.0, 180.0)
    }

    /// Paints a kit narrower than its box so the crop also shows grass.
    fn dress(frame: &mut Frame, b: &BBox<Ltrb>, kit: [u8; 3]) {
        let inner = BBox::ltrb(b.left() + 8.0, b.top() + 4.0, b.right() - 8.0, b.bottom());
        paint(frame, &inner, kit);
    }

    fn lineup(kits: &[(f32, [u8; 3])]) -> (Frame, FrameTracks) {
        let mut frame = pitch(640, 360);
        let mut players = FrameTracks::new();

        for (i, &(x, kit)) in kits.iter().enumerate() {
            let b = player(x);
            dress(&mut frame, &b, kit);
            players.insert(i as TrackId + 1, TrackInfo::new(b));
        }

        (frame, players)
    }

    #[test]
    fn kit_color_ignores_grass() {
        let (frame, players) = lineup(&[(100.0, RED)]);
        let assigner = TeamAssigner::new();

        let c = assigner.player_color(&frame, &players[&1].bbox).unwrap();
        assert!((c[0] - 220.0).abs() < 1.0 && (c[2] - 30.0).abs() < 1.0, "{:?}", c);
    }

    #[test]
    fn distinct_and_similar_kits() {
        let (frame, players) = lineup(&[(20.0, RED), (120.0, [215, 35, 28]), (220.0, BLUE), (320.0, BLUE)]);
        let mut assigner = TeamAssigner::new();
        assert!(assigner.assign_team_color(&frame, &players));

        let teams: Vec<Team> = players
            .iter()
            .map(|(&id, info)| assigner.get_player_team(&frame, &info.bbox, id).unwrap())
            .collect();

        assert_eq!(teams[0], teams[1]);
        assert_eq!(teams[2], teams[3]);
        assert_ne!(teams[0], teams[2]);

        let red_team = assigner.team_color(teams[0]).unwrap();
        assert!(red_team[0] > red_team[2]);
    }

    #[test]
    fn decision_is_cached_per_id() {
        let (frame, players) = lineup(&[(20.0, RED), (220.0, BLUE)]);
        let mut assigner = TeamAssigner::new();
        assigner.assign_team_color(&frame, &players);

        let first = assigner.get_player_team(&frame, &players[&1].bbox, 1).unwrap();

        // same id, now wearing the other kit
        let (later, _) = lineup(&[(20.0, BLUE)]);
        for _ in 0..3 {
            assert_eq!(assigner.get_player_team(&later, &player(20.0), 1), Some(first));
        }
    }

    #[test]
    fn unfitted_assigner_leaves_players_alone() {
        let (frame, players) = lineup(&[(20.0, RED)]);
        let mut tracks = Tracks::with_frames(1);
        tracks.players[0] = players;

        let mut assigner = TeamAssigner::new();
        let tracks = assign_teams(tracks, &[frame], &mut assigner);

        assert!(!assigner.is_fitted());
        assert_eq!(tracks.players[0][&1].team, None);
    }
}
