use colored::*;
use comfy_table::presets::UTF8_FULL;
use comfy_table::{Attribute, Cell, CellAlignment, Color, ContentArrangement, Table};

use crate::config::PolicyConfig;
use crate::models::{LicensePolicy, UsagePolicy, UsageSummary};
use crate::policy::Resolution;

/// Render resolved declarations: a summary box, then one table per
/// disposition that needs attention. Allowed rows are listed only when
/// `verbose` is set; `quiet` prints the one-line summary alone.
pub fn render_resolutions(results: &[Resolution], verbose: bool, quiet: bool) {
    let summary: UsageSummary = results.iter().map(|r| r.usage_policy).collect();

    if quiet {
        println!(
            "Total: {}  Allow: {}  Deny: {}  Review: {}  Undefined: {}  Conflict: {}",
            summary.total(),
            summary.allow.to_string().green(),
            summary.deny.to_string().red(),
            summary.needs_review.to_string().yellow(),
            summary.undefined.to_string().dimmed(),
            summary.conflict.to_string().magenta(),
        );
        return;
    }

    println!(
        "\n {} v{}\n",
        "bom-license-policy".bold(),
        env!("CARGO_PKG_VERSION")
    );

    println!(" ┌────────────────────────────────────────────────────┐");
    println!(" │  {:<48} │", "SUMMARY".bold());
    println!(
        " │  {:<48} │",
        format!("Declarations    : {:>4}", summary.total())
    );
    for policy in UsagePolicy::ALL {
        let (mark, label) = marker(policy);
        println!(
            " │  {:<48} │",
            format!(
                "{}  {:<13}: {:>4}  {}",
                mark,
                label,
                summary.count(policy),
                top_values(results, policy)
            )
        );
    }
    println!(" └────────────────────────────────────────────────────┘\n");

    let sections = [
        (UsagePolicy::Deny, "[DENY]".red().bold(), "Declarations denied by policy:"),
        (
            UsagePolicy::Conflict,
            "[CONFLICT]".magenta().bold(),
            "Declarations matching contradictory policies:",
        ),
        (
            UsagePolicy::NeedsReview,
            "[REVIEW]".yellow().bold(),
            "Declarations needing review:",
        ),
        (
            UsagePolicy::Undefined,
            "[UNDEFINED]".dimmed().bold(),
            "Declarations without a matching policy:",
        ),
    ];
    for (policy, tag, heading) in sections {
        if summary.count(policy) > 0 {
            println!(" {} {}\n", tag, heading);
            render_resolution_table(results, policy);
            println!();
        }
    }

    if verbose && summary.allow > 0 {
        println!(" {} All allowed declarations:\n", "[ALLOW]".green().bold());
        render_resolution_table(results, UsagePolicy::Allow);
        println!();
    }
}

/// Render the indexed policy table.
pub fn render_policies(config: &PolicyConfig, policies: &[&LicensePolicy]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Family").add_attribute(Attribute::Bold),
            Cell::new("SPDX ID").add_attribute(Attribute::Bold),
            Cell::new("Name").add_attribute(Attribute::Bold),
            Cell::new("Usage Policy").add_attribute(Attribute::Bold),
            Cell::new("OSI").add_attribute(Attribute::Bold),
            Cell::new("FSF").add_attribute(Attribute::Bold),
            Cell::new("Deprecated").add_attribute(Attribute::Bold),
            Cell::new("Annotations").add_attribute(Attribute::Bold),
        ]);

    for policy in policies {
        let annotations: Vec<&str> = policy
            .annotation_refs
            .iter()
            .map(|r| config.annotation(r).unwrap_or(r))
            .collect();

        table.add_row(vec![
            Cell::new(&policy.family),
            Cell::new(policy.id.as_deref().unwrap_or("")),
            Cell::new(&policy.name),
            Cell::new(policy.usage_policy.to_string()).fg(policy_color(policy.usage_policy)),
            Cell::new(flag(policy.is_osi_approved)).set_alignment(CellAlignment::Center),
            Cell::new(flag(policy.is_fsf_libre)).set_alignment(CellAlignment::Center),
            Cell::new(flag(policy.is_deprecated)).set_alignment(CellAlignment::Center),
            Cell::new(annotations.join("\n")),
        ]);
    }

    println!("{}", table);
    println!(" {} policies", policies.len());
}

fn render_resolution_table(results: &[Resolution], filter: UsagePolicy) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec![
            Cell::new("Kind").add_attribute(Attribute::Bold),
            Cell::new("License").add_attribute(Attribute::Bold),
            Cell::new("Usage Policy").add_attribute(Attribute::Bold),
            Cell::new("Note").add_attribute(Attribute::Bold),
        ]);

    for result in results.iter().filter(|r| r.usage_policy == filter) {
        let (mark, _) = marker(result.usage_policy);
        table.add_row(vec![
            Cell::new(result.declaration.kind()),
            Cell::new(result.declaration.value()),
            Cell::new(format!("{} {}", mark, result.usage_policy))
                .fg(policy_color(result.usage_policy))
                .set_alignment(CellAlignment::Center),
            Cell::new(result.error.as_deref().unwrap_or("")),
        ]);
    }

    println!("{}", table);
}

fn marker(policy: UsagePolicy) -> (&'static str, &'static str) {
    match policy {
        UsagePolicy::Allow => ("✓", "Allow"),
        UsagePolicy::Deny => ("✗", "Deny"),
        UsagePolicy::NeedsReview => ("⚠", "Needs review"),
        UsagePolicy::Undefined => ("?", "Undefined"),
        UsagePolicy::Conflict => ("!", "Conflict"),
    }
}

fn policy_color(policy: UsagePolicy) -> Color {
    match policy {
        UsagePolicy::Allow => Color::Green,
        UsagePolicy::Deny => Color::Red,
        UsagePolicy::NeedsReview => Color::Yellow,
        UsagePolicy::Undefined => Color::DarkGrey,
        UsagePolicy::Conflict => Color::Magenta,
    }
}

fn flag(value: bool) -> &'static str {
    if value {
        "✓"
    } else {
        ""
    }
}

/// The three most frequent license values with the given policy.
fn top_values(results: &[Resolution], policy: UsagePolicy) -> String {
    let mut counts: std::collections::HashMap<&str, usize> = std::collections::HashMap::new();
    for result in results.iter().filter(|r| r.usage_policy == policy) {
        *counts.entry(result.declaration.value()).or_insert(0) += 1;
    }

    let mut pairs: Vec<(&str, usize)> = counts.into_iter().collect();
    pairs.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

    let summary: Vec<String> = pairs
        .iter()
        .take(3)
        .map(|(value, cnt)| format!("{} ({})", value, cnt))
        .collect();

    if summary.is_empty() {
        String::new()
    } else {
        format!("[{}]", summary.join(", "))
    }
}
