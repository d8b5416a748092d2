use crate::common::GradeBox;

pub trait Nms {
    fn bbox(&self) -> &GradeBox;
    fn confidence(&self) -> f32;
}

/// Greedy containment suppression.
///
/// Sorts `boxes` by descending confidence, then walks them in order and keeps a
/// candidate only if no already-kept box covers more than `max_overlap` of the
/// candidate's own area. Equal confidences keep their input order.
pub fn suppress_overlaps<T: Nms>(boxes: &mut Vec<T>, max_overlap: f32) {
    boxes.sort_by(|b1, b2| {
        b2.confidence()
            .partial_cmp(&b1.confidence())
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    let mut current_index = 0;
    for index in 0..boxes.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            let overlap = boxes[index].bbox().intersect(boxes[prev_index].bbox());
            if overlap > max_overlap * boxes[index].bbox().area() {
                drop = true;
                break;
            }
        }
        if !drop {
            boxes.swap(current_index, index);
            current_index += 1;
        }
    }
    boxes.truncate(current_index);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::GradeDetection;

    fn det(score: f32, x: f32, y: f32, w: f32, h: f32) -> GradeDetection<&'static str> {
        GradeDetection::new(0, "spot", score, GradeBox::new(x, y, w, h))
    }

    #[test]
    fn identical_boxes_collapse_to_best() {
        let mut boxes = vec![det(0.8, 10., 10., 20., 20.), det(0.9, 10., 10., 20., 20.)];
        suppress_overlaps(&mut boxes, 0.45);
        assert_eq!(boxes.len(), 1);
        assert_eq!(boxes[0].confidence, 0.9);
    }

    #[test]
    fn disjoint_boxes_survive() {
        let mut boxes = vec![det(0.5, 0., 0., 10., 10.), det(0.7, 50., 50., 10., 10.)];
        suppress_overlaps(&mut boxes, 0.45);
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[0].confidence, 0.7);
    }

    #[test]
    fn containment_is_judged_against_the_candidate() {
        // The weaker box sits almost entirely inside the stronger one.
        let mut inner = vec![det(0.9, 0., 0., 100., 100.), det(0.6, 10., 10., 20., 20.)];
        suppress_overlaps(&mut inner, 0.45);
        assert_eq!(inner.len(), 1);

        // The weaker box is large and only grazes the stronger one.
        let mut outer = vec![det(0.9, 10., 10., 20., 20.), det(0.6, 0., 0., 100., 100.)];
        suppress_overlaps(&mut outer, 0.45);
        assert_eq!(outer.len(), 2);
    }

    #[test]
    fn partial_overlap_threshold() {
        // Candidate of area 100 shares 40 with the kept box.
        let mut below = vec![det(0.9, 0., 0., 10., 10.), det(0.8, 6., 0., 10., 10.)];
        suppress_overlaps(&mut below, 0.45);
        assert_eq!(below.len(), 2);

        // Candidate of area 100 shares 50 with the kept box.
        let mut above = vec![det(0.9, 0., 0., 10., 10.), det(0.8, 5., 0., 10., 10.)];
        suppress_overlaps(&mut above, 0.45);
        assert_eq!(above.len(), 1);
    }
}
