use anyhow::{bail, Result};
use crate::common::{ClassificationResult, ScoreKind};
use crate::detection_runners::input_wrapper::X;

/// Numerically stable softmax.
pub fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// Turns a `(1, classes)` output row into a ranked [`ClassificationResult`].
///
/// Ties keep label order.
pub fn rank_scores<L: Clone>(output: &X, labels: &[L], kind: ScoreKind) -> Result<ClassificationResult<L>> {
    let num_classes = match output.unbatched_shape() {
        &[n] => n,
        shape => bail!("expected classifier output shaped (1, classes), got {:?}", shape),
    };
    if num_classes == 0 || num_classes != labels.len() {
        bail!("classifier produced {} scores for {} labels", num_classes, labels.len());
    }

    let scores: Vec<f32> = output.iter().copied().collect();
    if scores.iter().any(|s| !s.is_finite()) {
        bail!("classifier output contains non-finite scores");
    }

    let probs = match kind {
        ScoreKind::Logits => softmax(&scores),
        ScoreKind::Probabilities => {
            let clipped: Vec<f32> = scores.iter().map(|s| s.max(0.)).collect();
            let sum: f32 = clipped.iter().sum();
            if !(sum > 0.) {
                bail!("classifier probabilities sum to zero");
            }
            clipped.into_iter().map(|p| p / sum).collect()
        }
    };

    let mut ranked: Vec<(L, f32)> = labels.iter().cloned().zip(probs).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1));

    Ok(ClassificationResult::from_ranked(ranked))
}
