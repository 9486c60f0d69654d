use chrono::NaiveDateTime;
use diesel::prelude::*;
use diesel::sqlite::Sqlite;
use serde::{Deserialize, Serialize};

/// The games tracked on the leaderboard. Each variant owns one score column
/// and one per-game ID column on `players`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Game {
    Smash,
    Poker,
    Pudgy,
}

impl Game {
    pub fn as_str(&self) -> &'static str {
        match self {
            Game::Smash => "smash",
            Game::Poker => "poker",
            Game::Pudgy => "pudgy",
        }
    }

    /// Display name as shown on the leaderboard tabs.
    pub fn label(&self) -> &'static str {
        match self {
            Game::Smash => "Smash Karts",
            Game::Poker => "Poker",
            Game::Pudgy => "Pudgy Party",
        }
    }

    pub fn parse(s: &str) -> Option<Game> {
        match s.trim().to_lowercase().as_str() {
            "smash" => Some(Game::Smash),
            "poker" => Some(Game::Poker),
            "pudgy" => Some(Game::Pudgy),
            _ => None,
        }
    }
}

impl std::fmt::Display for Game {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = crate::schema::players)]
#[diesel(check_for_backend(Sqlite))]
pub struct Player {
    pub id: i32,
    pub username: String,
    pub twitter: String,
    pub poker_id: Option<String>,
    pub smash_id: Option<String>,
    pub pudgy_party_id: Option<String>,
    pub score_smash: i32,
    pub score_poker: i32,
    pub score_pudgy: i32,
    pub created_at: NaiveDateTime,
    pub updated_at: Option<NaiveDateTime>,
}

impl Player {
    pub fn score_for(&self, game: Game) -> i32 {
        match game {
            Game::Smash => self.score_smash,
            Game::Poker => self.score_poker,
            Game::Pudgy => self.score_pudgy,
        }
    }

    /// The player's ID for a game, treating empty strings as absent.
    pub fn game_id_for(&self, game: Game) -> Option<&str> {
        let id = match game {
            Game::Smash => self.smash_id.as_deref(),
            Game::Poker => self.poker_id.as_deref(),
            Game::Pudgy => self.pudgy_party_id.as_deref(),
        };
        id.filter(|v| !v.trim().is_empty())
    }
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::players)]
pub struct NewPlayer<'a> {
    pub username: &'a str,
    pub twitter: &'a str,
    pub poker_id: Option<&'a str>,
    pub smash_id: Option<&'a str>,
    pub pudgy_party_id: Option<&'a str>,
    // scores and created_at use defaults
}

#[derive(Debug, Clone, Serialize, Deserialize, Queryable, Selectable)]
#[diesel(table_name = crate::schema::score_adjustments)]
#[diesel(check_for_backend(Sqlite))]
pub struct ScoreAdjustment {
    pub id: i32,
    pub player_id: i32,
    pub game: String,
    pub delta: i32,
    pub applied_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::score_adjustments)]
pub struct NewScoreAdjustment<'a> {
    pub player_id: i32,
    pub game: &'a str,
    pub delta: i32,
    // applied_at uses default
}

/// One row of the admin audit view: an adjustment joined with the player's
/// username.
#[derive(Debug, Clone, Serialize, Deserialize, Queryable)]
pub struct AdjustmentLogEntry {
    pub id: i32,
    pub username: String,
    pub game: String,
    pub delta: i32,
    pub applied_at: NaiveDateTime,
}

#[derive(Insertable, Debug)]
#[diesel(table_name = crate::schema::admin_sessions)]
pub struct NewAdminSession {
    pub token: String,
    // created_at uses default
}
