use console::Style;
use flume::Receiver;
use indicatif::ProgressBar;
use indicatif::ProgressStyle;

use crate::asserter::CaseReport;

pub struct OutPutter;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Summary {
    pub passed: usize,
    pub failed: usize,
}

impl OutPutter {
    /// Prints one line per finished instance while the run is going, then the
    /// details of every failure.
    pub async fn start(rx: Receiver<CaseReport>, case_dir: &str, n_instances: usize) -> Summary {
        let style = Style::new().bold().cyan();
        let open_text = &format!(
            "Running cases in: {case_dir} Found {n_instances} case instances: Running..."
        );
        println!("{}", style.apply_to(open_text));

        let progress = ProgressBar::new(n_instances as u64);
        if let Ok(bar_style) = ProgressStyle::with_template("{bar:40.cyan/blue} {pos}/{len} {msg}")
        {
            progress.set_style(bar_style);
        }

        let mut i = 1;
        let mut summary = Summary::default();
        let mut failed: Vec<CaseReport> = vec![];
        while let Ok(report) = rx.recv_async().await {
            let line = if report.verdict.is_pass() {
                summary.passed += 1;
                format!(
                    "[{i}/{n_instances}] {}  {}: {} {}",
                    console::style("✔").green().bold(),
                    report.name,
                    report.description,
                    console::style("PASS!").green().bold(),
                )
            } else {
                summary.failed += 1;
                format!(
                    "[{i}/{n_instances}] {}  {}: {} {}",
                    console::style("╳").red().bold(),
                    report.name,
                    report.description,
                    console::style("FAILED!").red().bold(),
                )
            };

            // A hidden bar swallows `println`, suspending keeps piped output.
            progress.suspend(|| println!("{line}"));
            progress.inc(1);

            if !report.verdict.is_pass() {
                failed.push(report);
            }
            i += 1;
        }
        progress.finish_and_clear();

        println!();
        if failed.is_empty() {
            println!("{}", console::style("All cases passed! 🎉").bold().green());
        } else {
            println!(
                "{}",
                console::style("Summary of Failed Cases:").bold().red()
            );
            for (idx, report) in failed.iter().enumerate() {
                println!("\n{}. {}", idx + 1, report);
            }
            println!(
                "{}",
                console::style(format!(
                    "{} passed, {} failed",
                    summary.passed, summary.failed
                ))
                .bold()
            );
        }

        summary
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use crate::asserter::CaseReport;
    use crate::asserter::Verdict;
    use crate::error::CaseError;
    use crate::outputter::OutPutter;
    use crate::outputter::Summary;

    fn report(name: &str, verdict: Verdict) -> CaseReport {
        CaseReport {
            name: name.into(),
            description: "No description".into(),
            method: "GET".into(),
            url: "http://api.test/".into(),
            verdict,
        }
    }

    #[tokio::test]
    async fn counts_passes_and_failures() {
        let (tx, rx) = flume::unbounded::<CaseReport>();

        tx.send(report("a[1]", Verdict::Pass)).unwrap();
        tx.send(report(
            "a[2]",
            Verdict::Fail(CaseError::AssertionFailed {
                index: 1,
                message: "actual value 404 does not equal expected value 200".into(),
                actual: json!(404),
                expected: json!(200),
            }),
        ))
        .unwrap();
        tx.send(report("b[1]", Verdict::Pass)).unwrap();
        drop(tx);

        let summary = OutPutter::start(rx, "cases", 3).await;

        assert_eq!(
            summary,
            Summary {
                passed: 2,
                failed: 1
            }
        );
    }
}
