use crate::bbox::BBox;
use crate::detection::{ClassNames, Detection};
use crate::error::{Error, Result};
use crate::frame::Frame;

use image::imageops::{self, FilterType};
use ndarray::prelude::*;
use serde_derive::{Deserialize, Serialize};
use tracing::debug;

pub const DEFAULT_BATCH_SIZE: usize = 20;

/// Black-box object detector. One detection set per input frame, in order.
pub trait ObjectDetector {
    fn class_names(&self) -> &ClassNames;

    fn detect(&mut self, frames: &[Frame]) -> Result<Vec<Vec<Detection>>>;
}

impl<D: ObjectDetector + ?Sized> ObjectDetector for Box<D> {
    fn class_names(&self) -> &ClassNames {
        (**self).class_names()
    }

    fn detect(&mut self, frames: &[Frame]) -> Result<Vec<Vec<Detection>>> {
        (**self).detect(frames)
    }
}

/// Runs `detector` over `frames` in chunks of `batch_size`.
///
/// Chunking only bounds the work handed to the detector at once, the output is
/// the same as one call per frame. Any detector error aborts the whole run.
pub fn detect_frames<D: ObjectDetector + ?Sized>(
    detector: &mut D,
    frames: &[Frame],
    batch_size: usize,
) -> Result<Vec<Vec<Detection>>> {
    let batch_size = batch_size.max(1);
    let mut detections = Vec::with_capacity(frames.len());

    for batch in frames.chunks(batch_size) {
        let mut out = detector.detect(batch)?;

        if out.len() != batch.len() {
            return Err(Error::Detector(format!(
                "detector returned {} results for a batch of {} frames",
                out.len(),
                batch.len()
            )));
        }

        debug!(
            first = batch[0].index,
            frames = batch.len(),
            objects = out.iter().map(Vec::len).sum::<usize>(),
            "detected batch"
        );

        detections.append(&mut out);
    }

    Ok(detections)
}

/// Opaque inference backend, e.g. an exported YOLO graph.
///
/// Takes an `NCHW` tensor with values in `0..=1` and returns
/// `[batch, 4 + classes, anchors]` predictions, boxes as center-width-height
/// in input pixels.
pub trait InferenceModel {
    fn input_size(&self) -> (u32, u32);

    fn run(&mut self, input: ArrayView4<'_, f32>) -> Result<Array3<f32>>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct YoloDetectorConfig {
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
    pub classes: Option<Vec<i32>>,
}

impl YoloDetectorConfig {
    pub fn new(confidence_threshold: f32, iou_threshold: f32) -> Self {
        Self {
            confidence_threshold,
            iou_threshold,
            classes: None,
        }
    }
}

impl Default for YoloDetectorConfig {
    fn default() -> Self {
        Self::new(0.6, 0.45)
    }
}

pub struct YoloDetector<M> {
    model: M,
    names: ClassNames,
    config: YoloDetectorConfig,
}

impl<M: InferenceModel> YoloDetector<M> {
    pub fn new(model: M, names: ClassNames, config: YoloDetectorConfig) -> Self {
        Self {
            model,
            names,
            config,
        }
    }

    fn preprocess(&self, frames: &[Frame]) -> Array4<f32> {
        let (in_w, in_h) = self.model.input_size();
        let mut tensor = Array4::<f32>::zeros((frames.len(), 3, in_h as usize, in_w as usize));

        for (mut slot, frame) in tensor.outer_iter_mut().zip(frames) {
            let resized = imageops::resize(&frame.image, in_w, in_h, FilterType::Triangle);

            for (x, y, px) in resized.enumerate_pixels() {
                for c in 0..3 {
                    slot[[c, y as usize, x as usize]] = px.0[c] as f32 / 255.0;
                }
            }
        }

        tensor
    }

    fn postprocess(&self, view: ArrayView3<'_, f32>, frames: &[Frame]) -> Result<Vec<Vec<Detection>>> {
        let shape = view.shape();
        let (nbatches, pred_size, npreds) = (shape[0], shape[1], shape[2]);

        if nbatches != frames.len() || pred_size < 5 {
            return Err(Error::Detector(format!(
                "unexpected prediction shape {:?} for {} frames",
                shape,
                frames.len()
            )));
        }

        let (in_w, in_h) = self.model.input_size();
        let nclasses = pred_size - 4;
        let mut results = Vec::with_capacity(nbatches);

        for (preds, frame) in view.outer_iter().zip(frames) {
            let (fw, fh) = frame.dims();
            let sx = fw as f32 / in_w as f32;
            let sy = fh as f32 / in_h as f32;

            // The bounding boxes grouped by (maximum) class index.
            let mut bboxes: Vec<Vec<Detection>> = (0..nclasses).map(|_| vec![]).collect();

            for index in 0..npreds {
                let pred = preds.index_axis(Axis(1), index);

                let mut class_index = -1;
                let mut confidence = 0.0;

                for (idx, val) in pred.iter().skip(4).copied().enumerate() {
                    if val > confidence {
                        class_index = idx as i32;
                        confidence = val;
                    }
                }

                if class_index < 0 || confidence < self.config.confidence_threshold {
                    continue;
                }

                if let Some(classes) = &self.config.classes {
                    if !classes.contains(&class_index) {
                        continue;
                    }
                }

                let (cx, cy, w, h) = (pred[0] * sx, pred[1] * sy, pred[2] * sx, pred[3] * sy);
                let bbox = BBox::ltrb(cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0);

                bboxes[class_index as usize].push(Detection::new(
                    bbox.clip(fw, fh),
                    confidence,
                    class_index,
                ));
            }

            let mut dets = Vec::new();
            for class_dets in bboxes.into_iter().filter(|d| !d.is_empty()) {
                dets.extend(non_maximum_suppression(class_dets, self.config.iou_threshold));
            }

            results.push(dets);
        }

        Ok(results)
    }
}

impl<M: InferenceModel> ObjectDetector for YoloDetector<M> {
    fn class_names(&self) -> &ClassNames {
        &self.names
    }

    fn detect(&mut self, frames: &[Frame]) -> Result<Vec<Vec<Detection>>> {
        if frames.is_empty() {
            return Ok(Vec::new());
        }

        let input = self.preprocess(frames);
        let predictions = self.model.run(input.view())?;

        self.postprocess(predictions.view(), frames)
    }
}

/// Greedy suppression within one class, highest confidence first.
pub fn non_maximum_suppression(mut dets: Vec<Detection>, iou_threshold: f32) -> Vec<Detection> {
    dets.sort_unstable_by(|a, b| b.confidence.total_cmp(&a.confidence));

    let mut keep: Vec<Detection> = Vec::with_capacity(dets.len());
    for det in dets {
        if keep.iter().all(|k| k.iou(&det) <= iou_threshold) {
            keep.push(det);
        }
    }

    keep
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::RgbImage;

    struct CountingDetector {
        names: ClassNames,
        calls: Vec<usize>,
    }

    impl ObjectDetector for CountingDetector {
        fn class_names(&self) -> &ClassNames {
            &self.names
        }

        fn detect(&mut self, frames: &[Frame]) -> Result<Vec<Vec<Detection>>> {
            self.calls.push(frames.len());

            Ok(frames
                .iter()
                .map(|f| {
                    let x = f.index as f32;
                    vec![Detection::new(BBox::ltrb(x, 0.0, x + 1.0, 1.0), 0.9, 0)]
                })
                .collect())
        }
    }

    fn frames(n: usize) -> Vec<Frame> {
        (0..n).map(|i| Frame::new(i, RgbImage::new(4, 4))).collect()
    }

    #[test]
    fn batching_preserves_order() {
        let mut det = CountingDetector {
            names: ClassNames::new(["player"]),
            calls: vec![],
        };

        let out = detect_frames(&mut det, &frames(45), DEFAULT_BATCH_SIZE).unwrap();

        assert_eq!(det.calls, vec![20, 20, 5]);
        assert_eq!(out.len(), 45);
        for (i, dets) in out.iter().enumerate() {
            assert_eq!(dets[0].bbox.left(), i as f32);
        }
    }

    struct ShortDetector(ClassNames);

    impl ObjectDetector for ShortDetector {
        fn class_names(&self) -> &ClassNames {
            &self.0
        }

        fn detect(&mut self, _frames: &[Frame]) -> Result<Vec<Vec<Detection>>> {
            Ok(vec![])
        }
    }

    #[test]
    fn short_batch_is_an_error() {
        let mut det = ShortDetector(ClassNames::default());
        assert!(matches!(
            detect_frames(&mut det, &frames(3), 2),
            Err(Error::Detector(_))
        ));
    }

    struct FixedModel;

    impl InferenceModel for FixedModel {
        fn input_size(&self) -> (u32, u32) {
            (100, 100)
        }

        fn run(&mut self, input: ArrayView4<'_, f32>) -> Result<Array3<f32>> {
            let n = input.shape()[0];
            let mut out = Array3::<f32>::zeros((n, 6, 3));

            for b in 0..n {
                // two overlapping players and one ball
                for (a, vals) in [
                    [50.0, 50.0, 20.0, 40.0, 0.9, 0.0],
                    [51.0, 50.0, 20.0, 40.0, 0.8, 0.0],
                    [10.0, 10.0, 4.0, 4.0, 0.0, 0.7],
                ]
                .iter()
                .enumerate()
                {
                    for (k, v) in vals.iter().enumerate() {
                        out[[b, k, a]] = *v;
                    }
                }
            }

            Ok(out)
        }
    }

    #[test]
    fn yolo_postprocess_scales_and_suppresses() {
        let mut det = YoloDetector::new(
            FixedModel,
            ClassNames::new(["player", "ball"]),
            YoloDetectorConfig::default(),
        );

        let frames = vec![Frame::new(0, RgbImage::new(200, 100))];
        let out = det.detect(&frames).unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].len(), 2);

        let player = out[0].iter().find(|d| d.class == 0).unwrap();
        assert_eq!(player.confidence, 0.9);
        assert_eq!(player.bbox.as_slice(), &[80.0, 30.0, 120.0, 70.0]);

        let ball = out[0].iter().find(|d| d.class == 1).unwrap();
        assert_eq!(ball.bbox.center(), (20.0, 10.0));
    }
}
