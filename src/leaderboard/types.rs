use std::{fmt, time::Duration};

pub const LEADERBOARD_HEADER: &str = "Leaderboard:";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeaderboardLine {
    /// 1-indexed
    pub rank: usize,
    pub user_id: i64,
    pub label: String,
    pub hit_count: u64,
}

impl fmt::Display for LeaderboardLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}. {} - {}", self.rank, self.label, self.hit_count)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Leaderboard {
    pub lines: Vec<LeaderboardLine>,
}

impl fmt::Display for Leaderboard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", LEADERBOARD_HEADER)?;
        for line in &self.lines {
            write!(f, "\n{}", line)?;
        }
        Ok(())
    }
}

impl Leaderboard {
    /// Splits the rendering on line boundaries into pieces of at most
    /// `max_chars` characters each. Only a single line longer than
    /// `max_chars` gets cut mid-line.
    pub fn to_messages(&self, max_chars: usize) -> Vec<String> {
        let max_chars = max_chars.max(1);
        let rendered = self.to_string();
        let mut messages = vec![];
        let mut current = String::new();
        let mut current_chars = 0;

        for line in rendered.lines() {
            let line_chars = line.chars().count();
            let needed = if current.is_empty() {
                line_chars
            } else {
                current_chars + 1 + line_chars
            };

            if needed <= max_chars {
                if !current.is_empty() {
                    current.push('\n');
                }
                current.push_str(line);
                current_chars = needed;
                continue;
            }

            if !current.is_empty() {
                messages.push(std::mem::take(&mut current));
            }
            let mut chars = line.chars().peekable();
            while chars.peek().is_some() {
                current = chars.by_ref().take(max_chars).collect();
                current_chars = current.chars().count();
                if chars.peek().is_some() {
                    messages.push(std::mem::take(&mut current));
                }
            }
        }

        if !current.is_empty() {
            messages.push(current);
        }
        messages
    }
}

/// Where leaderboard labels come from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LabelSource {
    /// The name stored with the user's last roll
    Stored,
    /// A live `getChat` per user, falling back to the stored name on failure
    Directory {
        timeout: Duration,
        concurrency: usize,
    },
}

#[cfg(test)]
mod tests {
    use super::{Leaderboard, LeaderboardLine, LEADERBOARD_HEADER};

    fn leaderboard(users: usize) -> Leaderboard {
        Leaderboard {
            lines: (0..users)
                .map(|i| LeaderboardLine {
                    rank: i + 1,
                    user_id: i as i64,
                    label: format!("some_username_{}", i),
                    hit_count: 0,
                })
                .collect(),
        }
    }

    #[test]
    fn test_short_leaderboard_is_one_message() {
        let board = leaderboard(3);
        assert_eq!(board.to_messages(4096), vec![board.to_string()]);
        assert_eq!(
            Leaderboard::default().to_messages(4096),
            vec![LEADERBOARD_HEADER.to_string()]
        );
    }

    #[test]
    fn test_long_leaderboard_splits_on_line_boundaries() {
        let board = leaderboard(300);
        let rendered = board.to_string();
        assert!(rendered.chars().count() > 4096);

        let messages = board.to_messages(4096);
        assert!(messages.len() >= 2);
        assert!(messages.iter().all(|m| m.chars().count() <= 4096));
        assert!(messages[0].starts_with(LEADERBOARD_HEADER));
        // pieces only break where the rendering had a newline
        assert_eq!(messages.join("\n"), rendered);
    }

    #[test]
    fn test_overlong_line_is_cut() {
        let board = Leaderboard {
            lines: vec![LeaderboardLine {
                rank: 1,
                user_id: 1,
                label: "x".repeat(30),
                hit_count: 2,
            }],
        };
        let messages = board.to_messages(16);

        assert!(messages.iter().all(|m| m.chars().count() <= 16));
        assert_eq!(messages[0], LEADERBOARD_HEADER);
        assert_eq!(messages[1..].concat(), format!("1. {} - 2", "x".repeat(30)));
    }
}
