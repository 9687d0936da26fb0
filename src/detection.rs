use serde_derive::{Deserialize, Serialize};

use crate::bbox::{BBox, Ltrb};

/// One observed object in one frame, corners in pixel coordinates.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct Detection {
    pub bbox: BBox<Ltrb>,
    #[serde(rename = "p")]
    pub confidence: f32,
    #[serde(rename = "c")]
    pub class: i32,
}

impl Detection {
    #[inline]
    pub fn new(bbox: BBox<Ltrb>, confidence: f32, class: i32) -> Self {
        Self {
            bbox,
            confidence,
            class,
        }
    }

    #[inline]
    pub fn iou(&self, other: &Detection) -> f32 {
        self.bbox.iou(&other.bbox)
    }
}

/// Semantic category of a detector class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ObjectKind {
    Player,
    Goalkeeper,
    Referee,
    Ball,
    #[default]
    Other,
}

impl ObjectKind {
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "player" => ObjectKind::Player,
            "goalkeeper" => ObjectKind::Goalkeeper,
            "referee" => ObjectKind::Referee,
            "ball" | "sports ball" => ObjectKind::Ball,
            _ => ObjectKind::Other,
        }
    }
}

/// Class id <-> name table reported by a detector.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq)]
pub struct ClassNames {
    names: Vec<String>,
}

impl ClassNames {
    pub fn new<S: Into<String>>(names: impl IntoIterator<Item = S>) -> Self {
        Self {
            names: names.into_iter().map(Into::into).collect(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn name(&self, class: i32) -> Option<&str> {
        usize::try_from(class)
            .ok()
            .and_then(|idx| self.names.get(idx))
            .map(String::as_str)
    }

    #[inline]
    pub fn kind(&self, class: i32) -> ObjectKind {
        self.name(class)
            .map(ObjectKind::from_name)
            .unwrap_or(ObjectKind::Other)
    }

    /// First class id that resolves to `kind`.
    pub fn find_kind(&self, kind: ObjectKind) -> Option<i32> {
        (0..self.names.len() as i32).find(|&class| self.kind(class) == kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kinds_by_name() {
        let names = ClassNames::new(["ball", "goalkeeper", "player", "referee"]);

        assert_eq!(names.kind(0), ObjectKind::Ball);
        assert_eq!(names.kind(1), ObjectKind::Goalkeeper);
        assert_eq!(names.kind(2), ObjectKind::Player);
        assert_eq!(names.kind(3), ObjectKind::Referee);
        assert_eq!(names.kind(9), ObjectKind::Other);
        assert_eq!(names.kind(-1), ObjectKind::Other);
        assert_eq!(ObjectKind::default(), ObjectKind::Other);
        assert_eq!(names.find_kind(ObjectKind::Player), Some(2));
        assert_eq!(names.find_kind(ObjectKind::Other), None);
    }

    #[test]
    fn detection_json_shape() {
        let det = Detection::new(BBox::ltrb(1.0, 2.0, 3.0, 4.0), 0.5, 2);
        let json = serde_json::to_string(&det).unwrap();

        assert_eq!(json, r#"{"bbox":[1.0,2.0,3.0,4.0],"p":0.5,"c":2}"#);
    }
}
