//! Ranking metrics for the binary classifier.

use et_types::{ModelError, TuneResult};

fn metric_error(message: impl Into<String>) -> et_types::TuneError {
    ModelError::Metric {
        message: message.into(),
    }
    .into()
}

/// Weighted area under the ROC curve.
///
/// Events are swept in order of decreasing score; tied scores move the curve
/// diagonally, so ties contribute half credit. Labels >= 0.5 are positives.
pub fn roc_auc(scores: &[f32], labels: &[f32], weights: &[f32]) -> TuneResult<f64> {
    if scores.len() != labels.len() || scores.len() != weights.len() {
        return Err(metric_error(format!(
            "length mismatch: {} scores, {} labels, {} weights",
            scores.len(),
            labels.len(),
            weights.len()
        )));
    }
    if scores.is_empty() {
        return Err(metric_error("no events to score"));
    }
    if scores.iter().any(|s| !s.is_finite()) {
        return Err(metric_error("non-finite score"));
    }

    let mut order: Vec<usize> = (0..scores.len()).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let (mut tp, mut fp) = (0.0f64, 0.0f64);
    let mut area = 0.0f64;
    let mut i = 0;
    while i < order.len() {
        let threshold = scores[order[i]];
        let (prev_tp, prev_fp) = (tp, fp);
        while i < order.len() && scores[order[i]] == threshold {
            let idx = order[i];
            let w = weights[idx] as f64;
            if labels[idx] >= 0.5 {
                tp += w;
            } else {
                fp += w;
            }
            i += 1;
        }
        area += (fp - prev_fp) * (tp + prev_tp) / 2.0;
    }

    if tp <= 0.0 || fp <= 0.0 {
        return Err(metric_error(format!(
            "AUC needs positive weight in both classes (positives {}, negatives {})",
            tp, fp
        )));
    }

    Ok(area / (tp * fp))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perfect_ranking() {
        let auc = roc_auc(&[0.9, 0.8, 0.2, 0.1], &[1.0, 1.0, 0.0, 0.0], &[1.0; 4]).unwrap();
        assert!((auc - 1.0).abs() < 1e-12);
    }

    #[test]
    fn inverted_ranking() {
        let auc = roc_auc(&[0.1, 0.2, 0.8, 0.9], &[1.0, 1.0, 0.0, 0.0], &[1.0; 4]).unwrap();
        assert!(auc.abs() < 1e-12);
    }

    #[test]
    fn constant_scores_give_half() {
        let auc = roc_auc(&[0.5; 6], &[1.0, 0.0, 1.0, 0.0, 0.0, 1.0], &[1.0; 6]).unwrap();
        assert!((auc - 0.5).abs() < 1e-12);
    }

    #[test]
    fn matches_pairwise_definition() {
        // P(score_pos > score_neg) + 0.5 * P(tie)
        let scores = [0.1, 0.4, 0.35, 0.8, 0.4, 0.7];
        let labels = [0.0, 0.0, 1.0, 1.0, 1.0, 0.0];
        let auc = roc_auc(&scores, &labels, &[1.0; 6]).unwrap();

        let mut wins = 0.0;
        let mut pairs = 0.0;
        for (i, si) in scores.iter().enumerate() {
            for (j, sj) in scores.iter().enumerate() {
                if labels[i] == 1.0 && labels[j] == 0.0 {
                    pairs += 1.0;
                    if si > sj {
                        wins += 1.0;
                    } else if si == sj {
                        wins += 0.5;
                    }
                }
            }
        }
        assert!((auc - wins / pairs).abs() < 1e-12);
    }

    #[test]
    fn weights_act_like_duplication() {
        let weighted = roc_auc(&[0.9, 0.3, 0.6], &[1.0, 1.0, 0.0], &[1.0, 2.0, 1.0]).unwrap();
        let duplicated =
            roc_auc(&[0.9, 0.3, 0.3, 0.6], &[1.0, 1.0, 1.0, 0.0], &[1.0; 4]).unwrap();
        assert!((weighted - duplicated).abs() < 1e-12);
        assert!((weighted - 1.0 / 3.0).abs() < 1e-12);
    }

    #[test]
    fn single_class_is_error() {
        assert!(roc_auc(&[0.1, 0.9], &[1.0, 1.0], &[1.0, 1.0]).is_err());
    }

    #[test]
    fn mismatched_lengths_is_error() {
        assert!(roc_auc(&[0.1, 0.9], &[1.0], &[1.0, 1.0]).is_err());
        assert!(roc_auc(&[], &[], &[]).is_err());
    }
}
