use std::collections::{BTreeMap, HashMap};

use image::{Rgb, RgbImage};

use pitchtrack::annotate::Annotator;
use pitchtrack::tracker::{Tracker, TrackerOptions};
use pitchtrack::{
    BBox, ClassNames, Detection, Frame, Ltrb, Pipeline, PipelineConfig, ReplayDetector, StubLookup, StubStore, Team,
    TrackId, TrackInfo, TrackerKind, Tracks, BALL_ID,
};

const BALL: i32 = 0;
const PLAYER: i32 = 2;
const REFEREE: i32 = 3;

const RED: [u8; 3] = [210, 25, 35];
const BLUE: [u8; 3] = [25, 40, 210];
const YELLOW: [u8; 3] = [235, 220, 30];
const GRASS: [u8; 3] = [40, 130, 50];

fn paint(img: &mut RgbImage, b: &BBox<Ltrb>, color: [u8; 3]) {
    for y in b.top() as u32..b.bottom() as u32 {
        for x in b.left() as u32..b.right() as u32 {
            img.put_pixel(x, y, Rgb(color));
        }
    }
}

/// Person box with the kit painted inside a margin of grass.
fn person(img: &mut RgbImage, b: &BBox<Ltrb>, kit: [u8; 3]) {
    paint(img, &BBox::ltrb(b.left() + 6.0, b.top() + 4.0, b.right() - 6.0, b.bottom()), kit);
}

fn ball_box(i: usize) -> BBox<Ltrb> {
    let x = 100.0 + 15.0 * i as f32;
    BBox::ltrb(x, 250.0, x + 8.0, 258.0)
}

/// Four players in two kits walking right, a static referee, and a ball that
/// is not detected in frames 3, 4 and 5.
fn match_clip(n: usize) -> (Vec<Frame>, ReplayDetector) {
    let names = ClassNames::new(["ball", "goalkeeper", "player", "referee"]);
    let kits = [(60.0, RED), (180.0, BLUE), (300.0, RED), (420.0, BLUE)];

    let mut frames = Vec::new();
    let mut dets = HashMap::new();

    for i in 0..n {
        let dx = 2.0 * i as f32;
        let mut img = RgbImage::from_pixel(640, 360, Rgb(GRASS));
        let mut list = Vec::new();

        for &(x, kit) in &kits {
            let b = BBox::ltrb(x + dx, 100.0, x + dx + 36.0, 180.0);
            person(&mut img, &b, kit);
            list.push(Detection::new(b, 0.9, PLAYER));
        }

        let referee = BBox::ltrb(540.0, 90.0, 576.0, 170.0);
        person(&mut img, &referee, YELLOW);
        list.push(Detection::new(referee, 0.88, REFEREE));

        if !(3..6).contains(&i) {
            let b = ball_box(i);
            paint(&mut img, &b, [250, 250, 250]);
            list.push(Detection::new(b, 0.7, BALL));
        }

        frames.push(Frame::new(i, img));
        dets.insert(i, list);
    }

    (frames, ReplayDetector::new(names, dets))
}

fn pipeline(kind: TrackerKind, detector: ReplayDetector) -> Pipeline<ReplayDetector> {
    let config = PipelineConfig {
        stub: None,
        ..Default::default()
    };
    Pipeline::from_config(detector, kind, &config).unwrap()
}

/// Kit colour of each player id, from the first frame it was seen.
fn kit_by_x(tracks: &Tracks) -> BTreeMap<TrackId, [u8; 3]> {
    let mut kits = BTreeMap::new();
    for frame in &tracks.players {
        for (&id, info) in frame {
            let x = info.bbox.left();
            let kit = if (x < 150.0) || (270.0..390.0).contains(&x) { RED } else { BLUE };
            kits.entry(id).or_insert(kit);
        }
    }
    kits
}

#[test]
fn every_category_spans_every_frame() {
    for kind in TrackerKind::ALL {
        let (frames, detector) = match_clip(10);
        let out = pipeline(kind, detector).run(&frames).unwrap();

        assert_eq!(out.tracks.players.len(), 10, "{}", kind);
        assert_eq!(out.tracks.referees.len(), 10, "{}", kind);
        assert_eq!(out.tracks.ball.len(), 10, "{}", kind);
        assert_eq!(out.team_ball_control.len(), 10);
        assert_eq!(out.frames.len(), 10);
        assert_eq!(out.tracks.players[9].len(), 4, "{}", kind);
        assert_eq!(out.tracks.referees[9].len(), 1, "{}", kind);
    }
}

#[test]
fn missing_ball_is_interpolated() {
    let (frames, detector) = match_clip(10);
    let out = pipeline(TrackerKind::ByteTrack, detector).run(&frames).unwrap();

    let xs: Vec<f32> = out
        .tracks
        .ball
        .iter()
        .map(|f| {
            let info = &f[&BALL_ID];
            assert!(info.bbox.is_finite());
            assert!(info.position.is_some());
            info.bbox.left()
        })
        .collect();

    assert!(xs.windows(2).all(|w| w[0] < w[1]), "{:?}", xs);
    for x in &xs[3..6] {
        assert!(*x > xs[2] && *x < xs[6]);
    }
    assert!((xs[4] - ball_box(4).left()).abs() < 1e-3);
}

#[test]
fn leading_ball_gap_takes_first_detection() {
    let (frames, _) = match_clip(8);
    let names = ClassNames::new(["ball", "goalkeeper", "player", "referee"]);
    let dets: HashMap<usize, Vec<Detection>> =
        (5..8).map(|i| (i, vec![Detection::new(ball_box(i), 0.8, BALL)])).collect();

    let out = pipeline(TrackerKind::ByteTrack, ReplayDetector::new(names, dets))
        .run(&frames)
        .unwrap();

    for i in 0..5 {
        assert_eq!(out.tracks.ball[i][&BALL_ID].bbox, ball_box(5));
    }
}

#[test]
fn stub_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let store = StubStore::new(dir.path().join("stubs").join("tracks.bin"));
    let (frames, detector) = match_clip(6);

    let backend = TrackerKind::DeepSort.build(&Default::default());
    let mut tracker = Tracker::new(detector, backend, TrackerOptions::default());
    let computed = tracker.object_tracks(&frames, Some(&store), false).unwrap();

    let loaded = match store.load().unwrap() {
        StubLookup::Hit(snapshot) => {
            assert!(snapshot.matches(frames.len()));
            snapshot.tracks
        }
        StubLookup::Miss => panic!("stub was not written"),
    };
    assert_eq!(loaded, computed);

    // a detector with nothing to say proves the cached tracks are served
    let empty = ReplayDetector::new(ClassNames::default(), HashMap::new());
    let backend = TrackerKind::DeepSort.build(&Default::default());
    let mut cached = Tracker::new(empty, backend, TrackerOptions::default());
    assert_eq!(cached.object_tracks(&frames, Some(&store), true).unwrap(), computed);
}

#[test]
fn teams_follow_kits_and_never_change() {
    for kind in TrackerKind::ALL {
        let (frames, detector) = match_clip(10);
        let out = pipeline(kind, detector).run(&frames).unwrap();
        let kits = kit_by_x(&out.tracks);

        let mut team_of: BTreeMap<TrackId, Team> = BTreeMap::new();
        for frame in &out.tracks.players {
            for (&id, info) in frame {
                let team = info.team.unwrap_or_else(|| panic!("{}: player {} has no team", kind, id));
                assert_eq!(*team_of.entry(id).or_insert(team), team, "{}: player {} switched", kind, id);
                assert!(info.team_color.is_some());
            }
        }

        let red: Vec<Team> = kits.iter().filter(|(_, k)| **k == RED).map(|(id, _)| team_of[id]).collect();
        let blue: Vec<Team> = kits.iter().filter(|(_, k)| **k == BLUE).map(|(id, _)| team_of[id]).collect();

        assert!(red.windows(2).all(|w| w[0] == w[1]), "{}", kind);
        assert!(blue.windows(2).all(|w| w[0] == w[1]), "{}", kind);
        assert_ne!(red[0], blue[0], "{}", kind);
    }
}

#[test]
fn player_marker_is_drawn_at_the_feet() {
    let frames = vec![Frame::new(0, RgbImage::from_pixel(320, 240, Rgb(GRASS)))];
    let mut tracks = Tracks::with_frames(1);
    let mut info = TrackInfo::new(BBox::ltrb(100.0, 100.0, 140.0, 180.0));
    info.team_color = Some([0.0, 0.0, 255.0]);
    tracks.players[0].insert(4, info);

    let out = Annotator::default().draw_annotations(&frames, &tracks, None).unwrap();
    let img = &out[0].image;
    let blue = Rgb([0u8, 0, 255]);

    let hits = (110..=130)
        .flat_map(|x| (178..=200).map(move |y| (x, y)))
        .filter(|&(x, y)| *img.get_pixel(x, y) == blue)
        .count();
    assert!(hits > 100, "only {} marker pixels near the feet", hits);
}
