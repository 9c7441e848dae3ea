use serde::Serialize;
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LabelMetrics {
    pub label: String,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AveragedMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
}

/// Per-label precision/recall/F1 over a held-out set.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub labels: Vec<LabelMetrics>,
    pub accuracy: f64,
    pub macro_avg: AveragedMetrics,
    pub weighted_avg: AveragedMetrics,
    pub total: usize,
}

impl ClassificationReport {
    /// Build a report from parallel slices of expected and predicted labels.
    /// Labels that never occur in `expected` get zero support. Ratios with a
    /// zero denominator are reported as 0.0.
    pub fn compute(expected: &[String], predicted: &[String]) -> Self {
        let all_labels: BTreeSet<&str> = expected
            .iter()
            .chain(predicted.iter())
            .map(String::as_str)
            .collect();

        let pairs: Vec<(&str, &str)> = expected
            .iter()
            .zip(predicted)
            .map(|(e, p)| (e.as_str(), p.as_str()))
            .collect();
        let total = pairs.len();

        let labels: Vec<LabelMetrics> = all_labels
            .into_iter()
            .map(|label| {
                let tp = pairs.iter().filter(|(e, p)| *e == label && *p == label).count();
                let predicted_as = pairs.iter().filter(|(_, p)| *p == label).count();
                let support = pairs.iter().filter(|(e, _)| *e == label).count();

                let precision = ratio(tp, predicted_as);
                let recall = ratio(tp, support);
                let f1 = if precision + recall > 0.0 {
                    2.0 * precision * recall / (precision + recall)
                } else {
                    0.0
                };

                LabelMetrics {
                    label: label.to_string(),
                    precision,
                    recall,
                    f1,
                    support,
                }
            })
            .collect();

        let correct = pairs.iter().filter(|(e, p)| e == p).count();
        let n_labels = labels.len().max(1) as f64;
        let macro_avg = AveragedMetrics {
            precision: labels.iter().map(|m| m.precision).sum::<f64>() / n_labels,
            recall: labels.iter().map(|m| m.recall).sum::<f64>() / n_labels,
            f1: labels.iter().map(|m| m.f1).sum::<f64>() / n_labels,
        };

        let weight = |f: fn(&LabelMetrics) -> f64| {
            if total == 0 {
                0.0
            } else {
                labels.iter().map(|m| f(m) * m.support as f64).sum::<f64>() / total as f64
            }
        };
        let weighted_avg = AveragedMetrics {
            precision: weight(|m| m.precision),
            recall: weight(|m| m.recall),
            f1: weight(|m| m.f1),
        };

        Self {
            accuracy: ratio(correct, total),
            labels,
            macro_avg,
            weighted_avg,
            total,
        }
    }

    pub fn label(&self, name: &str) -> Option<&LabelMetrics> {
        self.labels.iter().find(|m| m.label == name)
    }
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl fmt::Display for ClassificationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let width = self
            .labels
            .iter()
            .map(|m| m.label.len())
            .max()
            .unwrap_or(0)
            .max("weighted avg".len());

        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9} {:>9}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        writeln!(f)?;
        for m in &self.labels {
            writeln!(
                f,
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                m.label, m.precision, m.recall, m.f1, m.support
            )?;
        }
        writeln!(f)?;
        writeln!(
            f,
            "{:>width$} {:>9} {:>9} {:>9.2} {:>9}",
            "accuracy", "", "", self.accuracy, self.total
        )?;
        for (name, avg) in [("macro avg", self.macro_avg), ("weighted avg", self.weighted_avg)] {
            writeln!(
                f,
                "{:>width$} {:>9.2} {:>9.2} {:>9.2} {:>9}",
                name, avg.precision, avg.recall, avg.f1, self.total
            )?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|x| x.to_string()).collect()
    }

    #[test]
    fn test_metrics() {
        let expected = s(&["Error", "Error", "Security Alert", "Security Alert"]);
        let predicted = s(&["Error", "Security Alert", "Security Alert", "Security Alert"]);
        let report = ClassificationReport::compute(&expected, &predicted);

        assert_eq!(report.total, 4);
        assert!((report.accuracy - 0.75).abs() < 1e-9);

        let error = report.label("Error").unwrap();
        assert!((error.precision - 1.0).abs() < 1e-9);
        assert!((error.recall - 0.5).abs() < 1e-9);
        assert_eq!(error.support, 2);

        let alert = report.label("Security Alert").unwrap();
        assert!((alert.precision - 2.0 / 3.0).abs() < 1e-9);
        assert!((alert.recall - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_label_only_predicted_has_zero_support() {
        let report = ClassificationReport::compute(&s(&["A"]), &s(&["B"]));
        let b = report.label("B").unwrap();
        assert_eq!(b.support, 0);
        assert_eq!(b.recall, 0.0);
        assert_eq!(report.accuracy, 0.0);
    }

    #[test]
    fn test_display_lists_every_label() {
        let report = ClassificationReport::compute(&s(&["A", "B"]), &s(&["A", "B"]));
        let text = report.to_string();
        assert!(text.contains("precision"));
        assert!(text.contains("weighted avg"));
        assert!(text.lines().any(|l| l.trim_start().starts_with('A')));
    }

    #[test]
    fn test_empty() {
        let report = ClassificationReport::compute(&[], &[]);
        assert_eq!(report.total, 0);
        assert!(report.labels.is_empty());
        assert_eq!(report.accuracy, 0.0);
    }
}
