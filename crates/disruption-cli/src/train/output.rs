use std::io::Write;

use anyhow::Result;
use disruption_classifiers::report::RunReport;

/// Human-readable summary of a finished run.
pub fn write_summary<W: Write>(report: &RunReport, out: &mut W) -> Result<()> {
    let best = &report.best_setting;
    writeln!(
        out,
        "Best setting: learning_rate={} max_depth={} n_estimators={} subsample={} (mean {} {:.4})",
        best.learning_rate,
        best.max_depth,
        best.n_estimators,
        best.subsample,
        report.search.metric.name(),
        report.search.best_score
    )?;

    let eval = &report.evaluation;
    let cm = eval.confusion_matrix.as_matrix();
    writeln!(out, "Holdout confusion matrix [[TN, FP], [FN, TP]]: {:?}", cm)?;
    writeln!(
        out,
        "Holdout accuracy {:.4}  ROC-AUC {:.4}  average precision {:.4}",
        eval.accuracy, eval.roc_auc, eval.average_precision
    )?;
    writeln!(out, "{:>12} {:>10} {:>10} {:>10} {:>8}", "class", "precision", "recall", "f1", "support")?;
    for (name, m) in [("0", &eval.negative_class), ("1", &eval.positive_class)] {
        writeln!(
            out,
            "{:>12} {:>10.4} {:>10.4} {:>10.4} {:>8}",
            name, m.precision, m.recall, m.f1, m.support
        )?;
    }

    if let Some(attributions) = &report.attributions {
        writeln!(out, "Mean |attribution| per feature:")?;
        for (feature, value) in attributions.ranked_features() {
            writeln!(out, "  {:<26} {:.4}", feature, value)?;
        }
    }
    Ok(())
}
