use console::Style;
use umbra_core::report::{GroupOutcome, RunSummary};

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    good: Style,
    bad: Style,
    dim: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            good: Style::new().green(),
            bad: Style::new().red(),
            dim: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }
}

pub fn print_run_summary(summary: &RunSummary) {
    let s = Styles::new();

    println!();
    println!("  {}", s.title.apply_to("Umbra Library Update"));
    println!("  {}", s.title.apply_to("\u{2550}".repeat(20)));
    println!();

    // Updated masters
    println!("  {}", s.header.apply_to("Updated masters"));
    let mut any = false;
    for group in summary.updated() {
        if let GroupOutcome::Built {
            master,
            n_used,
            reason,
            dry_run,
            ..
        } = &group.outcome
        {
            any = true;
            let note = if *dry_run { " (dry run)" } else { "" };
            println!(
                "    {} {}",
                s.good.apply_to(&group.key),
                s.dim.apply_to(format!("[{}]{}", reason, note))
            );
            println!(
                "      {:<10}{}",
                s.label.apply_to("master"),
                s.path.apply_to(master.display())
            );
            println!(
                "      {:<10}{}",
                s.label.apply_to("frames"),
                s.value.apply_to(format!("{} of {}", n_used, group.n_total))
            );
        }
    }
    if !any {
        println!("    {}", s.dim.apply_to("none"));
    }
    println!();

    // Failed groups
    let failed: Vec<_> = summary
        .groups
        .iter()
        .filter_map(|g| match &g.outcome {
            GroupOutcome::Failed(err) => Some((g, err)),
            _ => None,
        })
        .collect();
    if !failed.is_empty() {
        println!("  {}", s.header.apply_to("Failed groups"));
        for (group, err) in failed {
            println!(
                "    {} {}",
                s.bad.apply_to(&group.key),
                s.label.apply_to(err)
            );
        }
        println!();
    }

    // Rejected frames, grouped by key
    println!("  {}", s.header.apply_to("Rejected frames"));
    let mut any = false;
    for group in summary.with_rejections() {
        any = true;
        println!("    {}", s.value.apply_to(&group.key));
        for rejected in &group.rejected {
            println!(
                "      {} {}",
                s.bad.apply_to(&rejected.reason),
                s.path.apply_to(rejected.frame.path.display())
            );
            if let Some(stats) = &rejected.stats {
                println!(
                    "        {}",
                    s.label.apply_to(format!(
                        "median={:.1} mad={:.2} hot={:.4} p10={:.1} p90={:.1}",
                        stats.median, stats.mad, stats.hot_pixel_fraction, stats.p10, stats.p90
                    ))
                );
            }
        }
    }
    if !any {
        println!("    {}", s.dim.apply_to("none"));
    }
    println!();

    // Counters
    println!("  {}", s.header.apply_to("Totals"));
    let row = |label: &str, value: String| {
        println!("    {:<18}{}", s.label.apply_to(label), s.value.apply_to(value));
    };
    row("frames scanned", summary.frames_scanned.to_string());
    row("frames used", summary.frames_used.to_string());
    row("frames rejected", summary.frames_rejected.to_string());
    row("files skipped", summary.files_skipped.to_string());
    row("masters built", summary.masters_built.to_string());
    row("groups skipped", summary.groups_skipped.to_string());
    row("groups failed", summary.groups_failed.to_string());
    row(
        "success rate",
        format!("{:.0}%", summary.success_rate() * 100.0),
    );
    println!();
}
