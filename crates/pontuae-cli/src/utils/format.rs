use chrono::NaiveDate;

/// Width of the text progress bar, in cells
const PROGRESS_BAR_WIDTH: usize = 10;

/// Format a task or week score out of ten, e.g. `7.5/10`
pub fn format_score(score: f64) -> String {
    format!("{:.1}/10", score)
}

/// Render progress toward a goal as `[#####-----] 5/10`
pub fn progress_bar(progress: i32, goal: i32) -> String {
    let filled = if goal > 0 {
        let ratio = f64::from(progress.clamp(0, goal)) / f64::from(goal);
        (ratio * PROGRESS_BAR_WIDTH as f64).round() as usize
    } else {
        0
    };
    format!(
        "[{}{}] {}/{}",
        "#".repeat(filled),
        "-".repeat(PROGRESS_BAR_WIDTH - filled),
        progress,
        goal
    )
}

/// Truncate a string to a maximum length, adding ellipsis if needed
pub fn truncate_string(s: &str, max_len: usize) -> String {
    if s.chars().count() <= max_len {
        s.to_string()
    } else if max_len <= 3 {
        s.chars().take(max_len).collect()
    } else {
        let truncated: String = s.chars().take(max_len - 3).collect();
        format!("{}...", truncated)
    }
}

/// Format a date for display, or a placeholder when missing
pub fn format_date(date: Option<NaiveDate>) -> String {
    date.map(|d| d.format("%b %d, %Y").to_string())
        .unwrap_or_else(|| "not set".to_string())
}
