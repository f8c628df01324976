/// Format a wall-clock duration in seconds as `1d 02:03:04.005`.
pub fn format_duration(duration: &chrono::Duration) -> String {
    let milliseconds = format!("{:0>3}", duration.num_milliseconds() % 1000);
    let seconds = format!("{:0>2}", duration.num_seconds() % 60);
    let minutes = format!("{:0>2}", duration.num_minutes() % 60);
    let hours = format!("{:0>2}", duration.num_hours() % 24);
    let days = duration.num_days().to_string();

    format!("{days}d {hours}:{minutes}:{seconds}.{milliseconds}")
}

/// Split `total` across `parts` so the first `total % parts` shares get one
/// extra unit. Used for both the per-group and the per-worker request budget.
pub fn partition(total: u64, parts: usize) -> Vec<u64> {
    let parts_u64 = parts as u64;
    let base = total / parts_u64;
    let extra = (total % parts_u64) as usize;
    (0..parts)
        .map(|i| if i < extra { base + 1 } else { base })
        .collect()
}

/// Divide a QPS target across `parts` worker groups, keeping a floor of one
/// so small targets still make progress in every group.
pub fn partition_qps(total: u64, parts: usize) -> u64 {
    if total == 0 {
        return 0;
    }
    std::cmp::max(1, total / parts as u64)
}
