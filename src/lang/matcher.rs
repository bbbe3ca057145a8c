// Match expressions: hierarchical step selection.
//
// `'2,4/*` reads "beats 2 and 4, every eighth note within them". Each `/`
// moves one subdivision finer; the finest level proposes hits and every
// coarser level can only remove them.

use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    /// `*`
    All,

    /// `1,3,4`
    List(Vec<i64>),

    /// `2:4`, inclusive; `-1` leaves a side open
    Range { start: i64, end: i64 },
}

impl Matcher {
    /// Does this matcher accept the 1-based note number `n`?
    pub fn matches(&self, n: i64) -> bool {
        match self {
            Matcher::All => true,
            Matcher::List(list) => list.contains(&n),
            Matcher::Range { start, end } => (*start == -1 || n >= *start) && (*end == -1 || n <= *end),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchItem {
    /// Subdivision depth; each level halves the note value
    pub level: u32,
    pub matcher: Matcher,
}

/// Matchers ordered coarsest first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchExpr {
    pub items: Vec<MatchItem>,
}

impl MatchExpr {
    /// Compile into a 0/1 step table of length `num_steps`.
    ///
    /// `step_size` is the number of steps per whole note and `denominator`
    /// the time signature's note value, so level 0 addresses one note per
    /// beat of the meter.
    ///
    /// Fails if a level addresses notes shorter than one step.
    pub fn eval(&self, denominator: usize, num_steps: usize, step_size: usize, triplets: bool) -> Result<Vec<u8>> {
        if denominator == 0 {
            return Err(Error::Pattern("time signature denominator is zero".to_string()));
        }
        let mut seq = vec![0u8; num_steps];

        for (i, item) in self.items.iter().enumerate().rev() {
            let finest = i == self.items.len() - 1;

            let level = 1usize
                .checked_shl(item.level)
                .and_then(|div| div.checked_mul(denominator))
                .filter(|level| *level <= step_size)
                .ok_or_else(|| Error::Pattern(too_fine(item.level, denominator, step_size)))?;

            let mut skip = step_size / level;
            let mut notes_per_beat = level / denominator;
            if triplets {
                if item.level > 0 {
                    notes_per_beat = level / denominator / 2 * 3;
                } else {
                    skip = step_size / level / 2 * 3;
                }
            }
            if skip == 0 {
                return Err(Error::Pattern(too_fine(item.level, denominator, step_size)));
            }

            for (count, pos) in (0..num_steps).step_by(skip).enumerate() {
                // Note number within the beat, or absolute at beat level.
                let note = if notes_per_beat == 1 {
                    count
                } else {
                    count % notes_per_beat
                };

                if item.matcher.matches(note as i64 + 1) {
                    if finest {
                        seq[pos] = 1;
                    }
                } else {
                    let end = (pos + skip).min(num_steps);
                    seq[pos..end].fill(0);
                }
            }
        }
        Ok(seq)
    }
}

fn too_fine(level: u32, denominator: usize, step_size: usize) -> String {
    let notes = denominator.saturating_mul(1usize.checked_shl(level).unwrap_or(usize::MAX));
    format!("can't match on {notes} notes with step size {step_size}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lang::{Arg, parse};

    fn expr(src: &str) -> MatchExpr {
        let cmd = parse(&format!("a '{src}")).unwrap();
        match cmd.args.into_iter().next() {
            Some(Arg::Match(expr)) => expr,
            other => panic!("not a match expression: {other:?}"),
        }
    }

    fn eval(src: &str, num: usize, denom: usize, step_size: usize) -> Vec<u8> {
        expr(src).eval(denom, (step_size / denom) * num, step_size, false).unwrap()
    }

    #[test]
    fn test_beats_and_offbeats() {
        assert_eq!(eval("2,4/*", 4, 4, 16), vec![0, 0, 0, 0, 1, 0, 1, 0, 0, 0, 0, 0, 1, 0, 1, 0]);
        assert_eq!(eval("*/2", 4, 4, 16), vec![0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0]);
    }

    #[test]
    fn test_range_at_beat_level() {
        assert_eq!(eval("1:4", 4, 4, 16), vec![1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0]);
    }

    #[test]
    fn test_skipped_levels() {
        assert_eq!(eval("1:2//1:4", 4, 4, 16), vec![1, 1, 1, 1, 1, 1, 1, 1, 0, 0, 0, 0, 0, 0, 0, 0]);
        assert_eq!(eval("*//3,4", 4, 4, 16), vec![0, 0, 1, 1, 0, 0, 1, 1, 0, 0, 1, 1, 0, 0, 1, 1]);
    }

    #[test]
    fn test_odd_meters() {
        let mut five = vec![0; 20];
        five[16] = 1;
        assert_eq!(eval("5", 5, 4, 16), five);

        assert_eq!(eval("*", 7, 8, 16), vec![1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0]);
        assert_eq!(eval("*/2", 7, 8, 16), vec![0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1, 0, 1]);
    }

    #[test]
    fn test_finer_step_size() {
        let mut expected = vec![0; 32];
        for pos in [0, 8, 16, 24] {
            expected[pos] = 1;
        }
        assert_eq!(eval("*", 4, 4, 32), expected);
    }

    #[test]
    fn test_open_ranges() {
        assert_eq!(eval("3:-1", 4, 4, 16), vec![0, 0, 0, 0, 0, 0, 0, 0, 1, 0, 0, 0, 1, 0, 0, 0]);
        assert_eq!(eval("-1:1", 4, 4, 16), vec![1, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_level_finer_than_grid_fails() {
        let err = expr("*/*/*").eval(4, 16, 8, false).unwrap_err();
        assert!(matches!(err, Error::Pattern(_)));
        assert!(err.to_string().contains("step size 8"));
    }

    #[test]
    fn test_triplet_eighths() {
        // Six triplet sixteenths per beat: two beats in twelve steps, the
        // middle triplet eighth of each beat.
        let seq = expr("*/2").eval(4, 12, 16, true).unwrap();
        assert_eq!(seq, vec![0, 0, 1, 0, 0, 0, 0, 0, 1, 0, 0, 0]);
    }
}
