use crate::store::PlayCount;

pub fn help_text(prefix: &str) -> String {
    let rows = [
        ("commands", "Show this message"),
        ("sounds", "Show available sounds"),
        ("mostplayed", "Show most used sounds"),
        ("<sound>", "Play the specified sound"),
        ("random", "Play random sound"),
        ("stop", "Stop playing and clear queue"),
        ("remove <sound>", "Remove specified sound"),
        ("joinsound <sound>", "Play a sound when you return"),
        ("removejoinsound", "Remove your join sound"),
    ];

    let mut lines = vec!["```".to_string()];
    for (usage, description) in rows {
        lines.push(format!("{:<20}{}", format!("{}{}", prefix, usage), description));
    }
    lines.push("```".to_string());
    lines.join("\n")
}

/// `name: count` rows with names padded left and counts aligned right.
pub fn leaderboard(counts: &[PlayCount]) -> String {
    if counts.is_empty() {
        return "No sounds have been played yet!".to_string();
    }

    let name_width = counts.iter().map(|c| c.name.chars().count()).max().unwrap_or(0);
    let count_width = counts
        .iter()
        .map(|c| c.count.to_string().len())
        .max()
        .unwrap_or(0);

    let mut lines = vec!["```".to_string()];
    for entry in counts {
        let pad = " ".repeat(name_width - entry.name.chars().count() + 1);
        lines.push(format!(
            "{}:{}{:>width$}",
            entry.name,
            pad,
            entry.count,
            width = count_width
        ));
    }
    lines.push("```".to_string());
    lines.join("\n")
}
