//! Frame annotation: ellipse markers with id labels, ball triangles and the
//! team ball control panel.

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_line_segment_mut, draw_polygon_mut, draw_text_mut};
use imageproc::point::Point;
use imageproc::rect::Rect;
use serde_derive::{Deserialize, Serialize};
use tracing::debug;

use crate::bbox::{BBox, Ltrb};
use crate::error::{Error, Result};
use crate::frame::Frame;
use crate::possession::control_share;
use crate::track::{Team, TrackId, Tracks};

const LABEL_WIDTH: i32 = 40;
const LABEL_HEIGHT: i32 = 20;
const LABEL_OFFSET: i32 = 15;
const LABEL_SCALE: f32 = 18.0;
const ARC_START: f32 = -45.0;
const ARC_END: f32 = 235.0;

/// Marker colours, RGB.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Palette {
    /// Players without a team.
    pub player: [u8; 3],
    pub referee: [u8; 3],
    pub ball: [u8; 3],
    /// Triangle over the player holding the ball.
    pub possession: [u8; 3],
    pub label_text: [u8; 3],
}

impl Default for Palette {
    fn default() -> Self {
        Self {
            player: [255, 0, 0],
            referee: [0, 255, 0],
            ball: [0, 0, 255],
            possession: [255, 0, 0],
            label_text: [0, 0, 0],
        }
    }
}

pub struct Annotator {
    palette: Palette,
    font: Option<FontVec>,
}

impl Annotator {
    /// Annotator without text; id labels are drawn as plain boxes.
    pub fn new(palette: Palette) -> Self {
        Self { palette, font: None }
    }

    pub fn with_font_file<P: AsRef<Path>>(mut self, path: P) -> Result<Self> {
        let bytes = std::fs::read(path.as_ref())?;
        let font = FontVec::try_from_vec(bytes)
            .map_err(|err| Error::Render(format!("{}: {}", path.as_ref().display(), err)))?;

        self.font = Some(font);
        Ok(self)
    }

    /// Half ellipse under the box foot, open at the back, with the id in a
    /// filled label below it.
    pub fn draw_ellipse(
        &self,
        img: &mut RgbImage,
        bbox: &BBox<Ltrb>,
        color: Rgb<u8>,
        track_id: Option<TrackId>,
    ) {
        let (cx, _) = bbox.center();
        let y2 = bbox.bottom().trunc();
        let cx = cx.trunc();
        let a = bbox.width().trunc();
        let b = (0.35 * bbox.width()).trunc();

        for r in 0..2 {
            let (ra, rb) = (a - r as f32, (b - r as f32).max(0.0));
            let mut prev = None;

            for deg in (ARC_START as i32)..=(ARC_END as i32) {
                let t = (deg as f32).to_radians();
                let p = (cx + ra * t.cos(), y2 + rb * t.sin());
                if let Some(q) = prev {
                    draw_line_segment_mut(img, q, p, color);
                }
                prev = Some(p);
            }
        }

        let Some(track_id) = track_id else {
            return;
        };

        let x1 = cx as i32 - LABEL_WIDTH / 2;
        let y1 = y2 as i32 - LABEL_HEIGHT / 2 + LABEL_OFFSET;
        draw_filled_rect_mut(img, Rect::at(x1, y1).of_size(LABEL_WIDTH as u32, LABEL_HEIGHT as u32), color);

        if let Some(font) = &self.font {
            let mut tx = x1 + 12;
            if track_id > 99 {
                tx -= 10;
            }

            draw_text_mut(
                img,
                Rgb(self.palette.label_text),
                tx,
                y1 + 1,
                PxScale::from(LABEL_SCALE),
                font,
                &track_id.to_string(),
            );
        }
    }

    /// Filled triangle pointing down at the top centre of `bbox`.
    pub fn draw_triangle(&self, img: &mut RgbImage, bbox: &BBox<Ltrb>, color: Rgb<u8>) {
        let (x, _) = bbox.center();
        let (x, y) = (x as i32, bbox.top() as i32);

        draw_polygon_mut(
            img,
            &[Point::new(x, y), Point::new(x - 10, y - 20), Point::new(x + 10, y - 20)],
            color,
        );
    }

    /// Bottom-right panel with each team's share of ball control so far.
    pub fn draw_team_ball_control(
        &self,
        img: &mut RgbImage,
        frame_idx: usize,
        control: &[Option<Team>],
        team_colors: [Rgb<u8>; 2],
    ) {
        let (w, h) = img.dimensions();
        let (pw, ph) = ((w / 3).max(2), (h / 8).max(2));
        let (px, py) = ((w - pw) as i32, (h - ph) as i32);

        let (one, two) = control_share(control, frame_idx);
        draw_filled_rect_mut(img, Rect::at(px, py).of_size(pw, ph), Rgb([255, 255, 255]));

        let bar_h = (ph / 4).max(1);
        let bar_y = py + (ph - bar_h) as i32 - 2;
        let one_w = (pw as f32 * one).round() as u32;
        let two_w = (pw as f32 * two).round().min((pw - one_w) as f32) as u32;
        if one_w > 0 {
            draw_filled_rect_mut(img, Rect::at(px, bar_y).of_size(one_w, bar_h), team_colors[0]);
        }
        if two_w > 0 {
            draw_filled_rect_mut(img, Rect::at(px + one_w as i32, bar_y).of_size(two_w, bar_h), team_colors[1]);
        }

        if let Some(font) = &self.font {
            let scale = PxScale::from((ph as f32 / 4.0).max(8.0));
            let black = Rgb([0, 0, 0]);
            let lines = [
                format!("Team 1 Ball Control: {:.2}%", one * 100.0),
                format!("Team 2 Ball Control: {:.2}%", two * 100.0),
            ];

            for (i, line) in lines.iter().enumerate() {
                draw_text_mut(img, black, px + 6, py + 4 + i as i32 * scale.y as i32, scale, font, line);
            }
        }
    }

    /// Copies `frames` and draws every track of the matching frame on the copy.
    ///
    /// When `control` is given the ball control panel is drawn as well.
    pub fn draw_annotations(
        &self,
        frames: &[Frame],
        tracks: &Tracks,
        control: Option<&[Option<Team>]>,
    ) -> Result<Vec<Frame>> {
        tracks.validate(frames.len())?;

        let team_colors = team_colors(tracks, &self.palette);
        let mut out = Vec::with_capacity(frames.len());

        for (idx, frame) in frames.iter().enumerate() {
            let mut img = frame.image.clone();

            for (&id, player) in &tracks.players[idx] {
                let color = player.team_color.map(to_rgb).unwrap_or(Rgb(self.palette.player));
                self.draw_ellipse(&mut img, &player.bbox, color, Some(id));

                if player.has_ball {
                    self.draw_triangle(&mut img, &player.bbox, Rgb(self.palette.possession));
                }
            }

            for (&id, referee) in &tracks.referees[idx] {
                self.draw_ellipse(&mut img, &referee.bbox, Rgb(self.palette.referee), Some(id));
            }

            for (&id, ball) in &tracks.ball[idx] {
                self.draw_ellipse(&mut img, &ball.bbox, Rgb(self.palette.ball), Some(id));
                self.draw_triangle(&mut img, &ball.bbox, Rgb(self.palette.ball));
            }

            if let Some(control) = control {
                self.draw_team_ball_control(&mut img, idx, control, team_colors);
            }

            out.push(Frame::new(frame.index, img));
        }

        debug!(frames = out.len(), "annotated");
        Ok(out)
    }
}

impl Default for Annotator {
    fn default() -> Self {
        Self::new(Palette::default())
    }
}

#[inline]
fn to_rgb(c: [f32; 3]) -> Rgb<u8> {
    Rgb(c.map(|v| v.round().clamp(0.0, 255.0) as u8))
}

/// First colour seen for each team, the palette's player colour otherwise.
fn team_colors(tracks: &Tracks, palette: &Palette) -> [Rgb<u8>; 2] {
    let mut colors = [Rgb(palette.player); 2];

    for team in [Team::One, Team::Two] {
        let found = tracks
            .players
            .iter()
            .flat_map(|f| f.values())
            .find(|p| p.team == Some(team))
            .and_then(|p| p.team_color);

        if let Some(c) = found {
            colors[team.cluster()] = to_rgb(c);
        }
    }

    colors
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::{TrackInfo, BALL_ID};

    fn blank() -> Frame {
        Frame::new(0, RgbImage::from_pixel(320, 240, Rgb([40, 120, 40])))
    }

    fn near(img: &RgbImage, x: u32, y: u32, radius: u32, color: Rgb<u8>) -> bool {
        (x - radius..=x + radius).any(|px| (y - radius..=y + radius).any(|py| *img.get_pixel(px, py) == color))
    }

    #[test]
    fn player_marker_under_the_feet() {
        let mut tracks = Tracks::with_frames(1);
        let mut info = TrackInfo::new(BBox::ltrb(100.0, 100.0, 140.0, 180.0));
        info.team_color = Some([0.0, 0.0, 255.0]);
        tracks.players[0].insert(7, info);

        let frames = vec![blank()];
        let out = Annotator::default().draw_annotations(&frames, &tracks, None).unwrap();
        let img = &out[0].image;
        let blue = Rgb([0, 0, 255]);

        // label box centred below the foot point (120, 180)
        assert_eq!(*img.get_pixel(120, 195), blue);
        assert_eq!(*img.get_pixel(101, 186), blue);
        // arc ends at the sides of the ellipse
        assert!(near(img, 160, 180, 2, blue));
        assert!(near(img, 80, 180, 2, blue));
        // back of the ellipse stays open
        assert!(!near(img, 120, 166, 1, blue));
        // source frame untouched
        assert_eq!(*frames[0].image.get_pixel(120, 195), Rgb([40, 120, 40]));
    }

    #[test]
    fn ball_gets_a_triangle() {
        let mut tracks = Tracks::with_frames(1);
        tracks.ball[0].insert(BALL_ID, TrackInfo::new(BBox::ltrb(200.0, 100.0, 210.0, 110.0)));

        let out = Annotator::default().draw_annotations(&[blank()], &tracks, None).unwrap();
        assert_eq!(*out[0].image.get_pixel(205, 90), Rgb([0, 0, 255]));
    }

    #[test]
    fn frame_count_must_match() {
        let tracks = Tracks::with_frames(2);
        assert!(matches!(
            Annotator::default().draw_annotations(&[blank()], &tracks, None),
            Err(Error::FrameCountMismatch { .. })
        ));
    }

    #[test]
    fn control_panel() {
        let control = vec![Some(Team::One), Some(Team::One), Some(Team::Two), Some(Team::Two)];
        let mut img = blank().image;
        let colors = [Rgb([255, 0, 0]), Rgb([0, 0, 255])];

        Annotator::default().draw_team_ball_control(&mut img, 3, &control, colors);

        let (w, h) = img.dimensions();
        let bar_y = h - 2 - (h / 8 / 4) / 2 - 1;
        assert_eq!(*img.get_pixel(w - w / 3 + 2, bar_y), colors[0]);
        assert_eq!(*img.get_pixel(w - 2, bar_y), colors[1]);
    }
}
