//! Decodes `(1, 4 + classes, boxes)` detection output into detections.

use anyhow::{bail, Result};
use ndarray::s;
use rayon::prelude::*;
use crate::common::{GradeBox, GradeDetection};
use crate::detection_runners::image_ops::Letterbox;
use crate::detection_runners::input_wrapper::X;
use crate::detection_runners::nms::suppress_overlaps;

/// Maps model-space boxes back to original-image coordinates.
///
/// `scale`/`pad_*` undo the letterbox; `offset_*` is the origin of the analysed
/// crop inside the original image.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeGeometry {
    pub scale: f32,
    pub pad_x: f32,
    pub pad_y: f32,
    pub offset_x: f32,
    pub offset_y: f32,
}

impl Default for DecodeGeometry {
    fn default() -> Self {
        Self {
            scale: 1.,
            pad_x: 0.,
            pad_y: 0.,
            offset_x: 0.,
            offset_y: 0.,
        }
    }
}

impl DecodeGeometry {
    pub fn from_letterbox(letterbox: &Letterbox, offset: (u32, u32)) -> Self {
        Self {
            scale: letterbox.scale,
            pad_x: letterbox.pad_x as f32,
            pad_y: letterbox.pad_y as f32,
            offset_x: offset.0 as f32,
            offset_y: offset.1 as f32,
        }
    }

    pub fn to_original(&self, cx: f32, cy: f32, w: f32, h: f32) -> GradeBox {
        GradeBox::default().with_cxcy_wh(
            (cx - self.pad_x) / self.scale + self.offset_x,
            (cy - self.pad_y) / self.scale + self.offset_y,
            w / self.scale,
            h / self.scale,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DecodeParams {
    pub conf_threshold: f32,
    pub max_overlap: f32,
}

/// Decodes raw detector output.
///
/// Class scores must be probabilities; any score outside `[0, 1]`, NaN
/// included, fails the whole output. Each candidate takes its highest-scoring
/// class; candidates scoring strictly above `conf_threshold` are mapped through `geometry` and deduplicated with
/// [`suppress_overlaps`]. The result is ordered by descending confidence and may
/// be empty.
pub fn decode_detections<L>(
    output: &X,
    labels: &[L],
    params: &DecodeParams,
    geometry: &DecodeGeometry,
) -> Result<Vec<GradeDetection<L>>>
where
    L: Clone + Send + Sync,
{
    let (rows, num_boxes) = match output.unbatched_shape() {
        &[rows, num_boxes] => (rows, num_boxes),
        shape => bail!("expected detection output shaped (1, 4 + classes, boxes), got {:?}", shape),
    };
    if rows != 4 + labels.len() {
        bail!(
            "detection output has {} rows but {} labels are configured (expected {})",
            rows, labels.len(), 4 + labels.len()
        );
    }
    if !(geometry.scale > 0.) {
        bail!("letterbox scale must be positive, got {}", geometry.scale);
    }

    let preds = output.to_shape((rows, num_boxes))?;
    let num_classes = labels.len();
    if let Some(bad) = preds.slice(s![4.., ..]).iter().find(|v| !(0.0..=1.0).contains(*v)) {
        bail!("class score {bad} is outside [0, 1]");
    }

    let mut detections: Vec<GradeDetection<L>> = (0..num_boxes)
        .into_par_iter()
        .filter_map(|i| {
            let mut class_id = 0;
            let mut score = f32::NEG_INFINITY;
            for c in 0..num_classes {
                let s = preds[[4 + c, i]];
                if s > score {
                    class_id = c;
                    score = s;
                }
            }

            if !(score > params.conf_threshold) {
                return None;
            }

            let bbox = geometry.to_original(preds[[0, i]], preds[[1, i]], preds[[2, i]], preds[[3, i]]);
            Some(GradeDetection::new(class_id, labels[class_id].clone(), score, bbox))
        })
        .collect();

    suppress_overlaps(&mut detections, params.max_overlap);

    Ok(detections)
}
