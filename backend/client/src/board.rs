use std::fmt::Write;

use shared::payloads::LeaderboardEntry;

pub const EMPTY_BOARD: &str = "No one has popped yet! Be the first!";

/// `#1 @handle 1,234 pops`, one line per entry.
pub fn render_leaderboard(entries: &[LeaderboardEntry]) -> String {
    if entries.is_empty() {
        return EMPTY_BOARD.to_string();
    }

    let width = entries.iter().map(|e| e.handle.len()).max().unwrap_or(0) + 1;
    let mut out = String::new();

    for (rank, entry) in entries.iter().enumerate() {
        let handle = format!("@{}", entry.handle);
        let _ = writeln!(
            out,
            "#{:<4} {handle:<width$} {} pops",
            rank + 1,
            group_thousands(entry.total)
        );
    }

    out
}

pub fn group_thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut grouped = String::with_capacity(digits.len() + digits.len() / 3);

    for (i, digit) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(digit);
    }

    grouped
}
