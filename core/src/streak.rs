//! Ascension streak detection for one player's games.
//!
//! Games are walked in start-time order. A candidate streak is "eligible"
//! for a game when its last game ended strictly before that game started,
//! so overlapping games on different servers never extend or break each
//! other. A win extends the first eligible candidate; a loss kills every
//! eligible candidate.

use crate::{game::Game, types::GameId};

#[derive(Debug, Clone)]
pub struct Streak<'a> {
    pub games: Vec<&'a Game>,
    /// False once a loss has landed after the streak's last game.
    pub continuable: bool,
}

impl Streak<'_> {
    pub fn len(&self) -> usize {
        self.games.len()
    }

    pub fn is_empty(&self) -> bool {
        self.games.is_empty()
    }
}

pub struct StreakDetector;

impl StreakDetector {
    /// All streaks of two or more wins, in order of their first game.
    pub fn detect<'a, I>(games: I) -> Vec<Streak<'a>>
    where
        I: IntoIterator<Item = &'a Game>,
    {
        let mut ordered: Vec<&Game> = games.into_iter().collect();
        ordered.sort_by_key(|g| (g.starttime, g.endtime, g.id.unwrap_or(GameId::MAX)));

        let mut candidates: Vec<Streak<'a>> = Vec::new();
        for game in ordered {
            let mut extended = false;
            for candidate in candidates.iter_mut().filter(|c| c.continuable) {
                let Some(last) = candidate.games.last() else { continue };
                if last.endtime >= game.starttime {
                    continue;
                }
                if game.won {
                    candidate.games.push(game);
                    extended = true;
                    break;
                }
                candidate.continuable = false;
            }
            if game.won && !extended {
                candidates.push(Streak { games: vec![game], continuable: true });
            }
        }

        candidates.retain(|s| s.len() >= 2);
        candidates
    }

    pub fn longest<'a, I>(games: I) -> usize
    where
        I: IntoIterator<Item = &'a Game>,
    {
        Self::detect(games).iter().map(Streak::len).max().unwrap_or(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(1_600_000_000 + secs, 0).unwrap()
    }

    fn game(id: i64, start: i64, end: i64, won: bool) -> Game {
        Game {
            id: Some(id),
            player_name: "streaker".into(),
            starttime: at(start),
            endtime: at(end),
            won,
            ..Default::default()
        }
    }

    #[test]
    fn three_sequential_wins_form_one_streak() {
        let games = vec![game(1, 0, 10, true), game(2, 20, 30, true), game(3, 40, 50, true)];
        let streaks = StreakDetector::detect(&games);
        assert_eq!(streaks.len(), 1);
        assert_eq!(streaks[0].len(), 3);
        assert!(streaks[0].continuable);
    }

    #[test]
    fn input_order_does_not_matter() {
        let games = vec![game(3, 40, 50, true), game(1, 0, 10, true), game(2, 20, 30, true)];
        let streaks = StreakDetector::detect(&games);
        let ids: Vec<_> = streaks[0].games.iter().map(|g| g.id.unwrap()).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn loss_after_first_win_leaves_only_the_later_pair() {
        let games = vec![
            game(1, 0, 10, true),
            game(2, 12, 15, false),
            game(3, 20, 30, true),
            game(4, 40, 50, true),
        ];
        let streaks = StreakDetector::detect(&games);
        assert_eq!(streaks.len(), 1);
        let ids: Vec<_> = streaks[0].games.iter().map(|g| g.id.unwrap()).collect();
        assert_eq!(ids, vec![3, 4]);
    }

    #[test]
    fn alternating_wins_and_losses_have_no_streak() {
        let games = vec![
            game(1, 0, 10, true),
            game(2, 12, 15, false),
            game(3, 20, 30, true),
            game(4, 32, 35, false),
            game(5, 40, 50, true),
        ];
        assert!(StreakDetector::detect(&games).is_empty());
        assert_eq!(StreakDetector::longest(&games), 0);
    }

    #[test]
    fn overlapping_loss_does_not_break_a_streak() {
        // Game 2 started before game 1 ended (another server), so it is not
        // eligible to kill the streak that game 1 started.
        let games = vec![
            game(1, 0, 10, true),
            game(2, 5, 15, false),
            game(3, 20, 30, true),
        ];
        let streaks = StreakDetector::detect(&games);
        assert_eq!(streaks.len(), 1);
        assert_eq!(streaks[0].len(), 2);
    }

    #[test]
    fn trailing_loss_marks_streak_finished() {
        let games = vec![game(1, 0, 10, true), game(2, 20, 30, true), game(3, 40, 45, false)];
        let streaks = StreakDetector::detect(&games);
        assert_eq!(streaks.len(), 1);
        assert!(!streaks[0].continuable);
    }

    #[test]
    fn overlapping_wins_run_as_parallel_streaks() {
        let games = vec![
            game(1, 0, 10, true),
            game(2, 5, 15, true),
            game(3, 20, 30, true),
            game(4, 25, 35, true),
        ];
        let streaks = StreakDetector::detect(&games);
        let lens: Vec<_> = streaks.iter().map(Streak::len).collect();
        assert_eq!(lens, vec![2, 2]);
    }
}
