pub mod api;
pub mod model;
pub mod schema;

use chrono::Utc;
use diesel::connection::SimpleConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::SqliteConnection;
use dotenvy::dotenv;
use std::env;
use uuid::Uuid;

use crate::model::{
    AdjustmentLogEntry, Game, NewAdminSession, NewPlayer, NewScoreAdjustment, Player,
    ScoreAdjustment,
};
use crate::schema::{admin_sessions, players, score_adjustments};

pub type DbPool = Pool<ConnectionManager<SqliteConnection>>;

/// Maximum number of rows a leaderboard query returns.
pub const LEADERBOARD_LIMIT: i64 = 1000;

/// Errors from the player store. Validation failures carry the message shown
/// to the operator; everything else wraps the underlying Diesel error.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("X handle is required")]
    EmptyHandle,
    #[error("twitter handle must start with @")]
    BadTwitter,
    #[error("at least one game ID is required")]
    MissingGameId,
    #[error("this {0} is already registered")]
    Duplicate(&'static str),
    #[error("no player matches that handle")]
    PlayerNotFound,
    #[error("delta must be non-zero")]
    ZeroDelta,
    #[error("database error: {0}")]
    Database(#[from] diesel::result::Error),
}

pub fn establish_connection() -> SqliteConnection {
    dotenv().ok();
    let database_url = env::var("DATABASE_URL").expect("DATABASE_URL must be set in .env");
    let mut conn = SqliteConnection::establish(&database_url)
        .unwrap_or_else(|e| panic!("Error connecting to {}: {}", database_url, e));

    // Enable WAL mode to allow concurrent reads during writes, and a timeout to retry locked
    // operations.
    conn.batch_execute(
        "PRAGMA foreign_keys = ON; \
        PRAGMA journal_mode = WAL; \
        PRAGMA synchronous = NORMAL; \
        PRAGMA busy_timeout = 10000;",
    )
    .expect("Failed to set SQLite PRAGMAs");

    conn
}

/// Applies the schema. Idempotent, so it runs at startup and from the
/// init_database binary. Uniqueness is enforced by the database: username and
/// twitter are NOCASE-unique columns, and each game ID has a partial unique
/// index that ignores NULL and empty values.
pub fn initialize_schema(conn: &mut SqliteConnection) -> QueryResult<()> {
    conn.batch_execute(
        "CREATE TABLE IF NOT EXISTS players (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            username TEXT NOT NULL COLLATE NOCASE UNIQUE,
            twitter TEXT NOT NULL COLLATE NOCASE UNIQUE,
            poker_id TEXT COLLATE NOCASE,
            smash_id TEXT COLLATE NOCASE,
            pudgy_party_id TEXT COLLATE NOCASE,
            score_smash INTEGER NOT NULL DEFAULT 0,
            score_poker INTEGER NOT NULL DEFAULT 0,
            score_pudgy INTEGER NOT NULL DEFAULT 0,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            updated_at TIMESTAMP
        );
        CREATE UNIQUE INDEX IF NOT EXISTS idx_players_poker_id
            ON players (poker_id) WHERE poker_id IS NOT NULL AND poker_id <> '';
        CREATE UNIQUE INDEX IF NOT EXISTS idx_players_smash_id
            ON players (smash_id) WHERE smash_id IS NOT NULL AND smash_id <> '';
        CREATE UNIQUE INDEX IF NOT EXISTS idx_players_pudgy_party_id
            ON players (pudgy_party_id) WHERE pudgy_party_id IS NOT NULL AND pudgy_party_id <> '';
        CREATE TABLE IF NOT EXISTS score_adjustments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            player_id INTEGER NOT NULL REFERENCES players (id),
            game TEXT NOT NULL,
            delta INTEGER NOT NULL,
            applied_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP
        );
        CREATE TABLE IF NOT EXISTS admin_sessions (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            token TEXT NOT NULL UNIQUE,
            created_at TIMESTAMP NOT NULL DEFAULT CURRENT_TIMESTAMP,
            expires_at TIMESTAMP
        );",
    )
}

/// Trims a handle and strips any leading '@'s. Registration and resolution
/// both key on this form.
pub fn normalize_handle(s: &str) -> String {
    s.trim().trim_start_matches('@').trim().to_string()
}

fn non_empty(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|v| !v.is_empty())
}

/// A registration request as submitted by a player.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Registration {
    pub username: String,
    pub twitter: Option<String>,
    pub poker_id: Option<String>,
    pub smash_id: Option<String>,
    pub pudgy_party_id: Option<String>,
}

/// Registers a new player. The X handle (without '@') becomes the unique
/// username; the twitter column keeps the display form with '@' and defaults
/// to '@<username>'. At least one game ID is required, and username, twitter,
/// and every provided game ID must be unique case-insensitively.
pub fn register_player(
    conn: &mut SqliteConnection,
    reg: &Registration,
) -> Result<Player, StoreError> {
    let username = normalize_handle(&reg.username);
    if username.is_empty() {
        return Err(StoreError::EmptyHandle);
    }

    let twitter = match non_empty(reg.twitter.as_deref()) {
        Some(t) => {
            if !t.starts_with('@') {
                return Err(StoreError::BadTwitter);
            }
            t.to_string()
        }
        None => format!("@{}", username),
    };

    let poker_id = non_empty(reg.poker_id.as_deref());
    let smash_id = non_empty(reg.smash_id.as_deref());
    let pudgy_party_id = non_empty(reg.pudgy_party_id.as_deref());
    if poker_id.is_none() && smash_id.is_none() && pudgy_party_id.is_none() {
        return Err(StoreError::MissingGameId);
    }

    conn.transaction(|conn| {
        // Application-level duplicate checks give named errors; the unique
        // indexes remain the backstop.
        let taken: i64 = players::table
            .filter(players::username.eq(&username))
            .count()
            .get_result(conn)?;
        if taken > 0 {
            return Err(StoreError::Duplicate("username"));
        }

        let taken: i64 = players::table
            .filter(players::twitter.eq(&twitter))
            .count()
            .get_result(conn)?;
        if taken > 0 {
            return Err(StoreError::Duplicate("twitter handle"));
        }

        if let Some(v) = poker_id {
            let taken: i64 = players::table
                .filter(players::poker_id.eq(v))
                .count()
                .get_result(conn)?;
            if taken > 0 {
                return Err(StoreError::Duplicate("Poker ID"));
            }
        }
        if let Some(v) = smash_id {
            let taken: i64 = players::table
                .filter(players::smash_id.eq(v))
                .count()
                .get_result(conn)?;
            if taken > 0 {
                return Err(StoreError::Duplicate("Smash Karts ID"));
            }
        }
        if let Some(v) = pudgy_party_id {
            let taken: i64 = players::table
                .filter(players::pudgy_party_id.eq(v))
                .count()
                .get_result(conn)?;
            if taken > 0 {
                return Err(StoreError::Duplicate("Pudgy Party ID"));
            }
        }

        let new_player = NewPlayer {
            username: &username,
            twitter: &twitter,
            poker_id,
            smash_id,
            pudgy_party_id,
        };
        let player = diesel::insert_into(players::table)
            .values(&new_player)
            .returning(Player::as_returning())
            .get_result(conn)?;

        Ok(player)
    })
}

/// Fetches the leaderboard for a game: players registered for it (non-empty
/// game ID), highest score first, earliest registration breaking ties.
pub fn fetch_leaderboard(
    conn: &mut SqliteConnection,
    game: Game,
) -> Result<Vec<Player>, StoreError> {
    let mut query = players::table.select(Player::as_select()).into_boxed();
    query = match game {
        Game::Smash => query
            .filter(players::smash_id.is_not_null())
            .filter(players::smash_id.ne(""))
            .order((players::score_smash.desc(), players::created_at.asc())),
        Game::Poker => query
            .filter(players::poker_id.is_not_null())
            .filter(players::poker_id.ne(""))
            .order((players::score_poker.desc(), players::created_at.asc())),
        Game::Pudgy => query
            .filter(players::pudgy_party_id.is_not_null())
            .filter(players::pudgy_party_id.ne(""))
            .order((players::score_pudgy.desc(), players::created_at.asc())),
    };
    Ok(query.limit(LEADERBOARD_LIMIT).load(conn)?)
}

/// Fetches every player, ordered by username.
pub fn fetch_all_players(conn: &mut SqliteConnection) -> Result<Vec<Player>, StoreError> {
    Ok(players::table
        .order(players::username.asc())
        .select(Player::as_select())
        .load(conn)?)
}

/// Resolves a player from an operator-typed query: exact username first,
/// then exact twitter (stored like "@handle"), then a loose substring
/// fallback across both columns where the first row wins.
pub fn resolve_player(conn: &mut SqliteConnection, query: &str) -> Result<Player, StoreError> {
    let q = normalize_handle(query);
    if q.is_empty() {
        return Err(StoreError::PlayerNotFound);
    }

    // 1) username exact (columns are NOCASE, so this is case-insensitive)
    let found: Option<Player> = players::table
        .filter(players::username.eq(&q))
        .select(Player::as_select())
        .first(conn)
        .optional()?;
    if let Some(player) = found {
        return Ok(player);
    }

    // 2) twitter exact
    let found: Option<Player> = players::table
        .filter(players::twitter.eq(format!("@{}", q)))
        .select(Player::as_select())
        .first(conn)
        .optional()?;
    if let Some(player) = found {
        return Ok(player);
    }

    // 3) loose fallback; grab one row if multiple
    let pattern = format!("%{}%", q);
    let twitter_pattern = format!("@%{}%", q);
    players::table
        .filter(
            players::username
                .like(pattern)
                .or(players::twitter.like(twitter_pattern)),
        )
        .order(players::id.asc())
        .select(Player::as_select())
        .first(conn)
        .optional()?
        .ok_or(StoreError::PlayerNotFound)
}

/// Applies a signed delta to one of a player's per-game scores and logs it.
/// The resolve, read-modify-write, and log insert all run in one transaction.
pub fn adjust_score(
    conn: &mut SqliteConnection,
    query: &str,
    game: Game,
    delta: i32,
) -> Result<(Player, ScoreAdjustment), StoreError> {
    if delta == 0 {
        return Err(StoreError::ZeroDelta);
    }

    conn.transaction(|conn| {
        let player = resolve_player(conn, query)?;
        let next = player.score_for(game) + delta;
        let now = Utc::now().naive_utc();

        let target = players::table.filter(players::id.eq(player.id));
        match game {
            Game::Smash => diesel::update(target)
                .set((players::score_smash.eq(next), players::updated_at.eq(Some(now))))
                .execute(conn)?,
            Game::Poker => diesel::update(target)
                .set((players::score_poker.eq(next), players::updated_at.eq(Some(now))))
                .execute(conn)?,
            Game::Pudgy => diesel::update(target)
                .set((players::score_pudgy.eq(next), players::updated_at.eq(Some(now))))
                .execute(conn)?,
        };

        let adjustment = diesel::insert_into(score_adjustments::table)
            .values(&NewScoreAdjustment {
                player_id: player.id,
                game: game.as_str(),
                delta,
            })
            .returning(ScoreAdjustment::as_returning())
            .get_result(conn)?;

        let updated: Player = players::table
            .filter(players::id.eq(player.id))
            .select(Player::as_select())
            .first(conn)?;

        Ok((updated, adjustment))
    })
}

/// Replacement values for a player's per-game IDs. `None` clears the column.
#[derive(Debug, Clone, Default, serde::Deserialize)]
pub struct GameIds {
    pub poker_id: Option<String>,
    pub smash_id: Option<String>,
    pub pudgy_party_id: Option<String>,
}

/// Overwrites all three game IDs for a player resolved from a handle query.
/// New IDs must not collide with another player's, case-insensitively.
pub fn update_game_ids(
    conn: &mut SqliteConnection,
    query: &str,
    ids: &GameIds,
) -> Result<Player, StoreError> {
    conn.transaction(|conn| {
        let player = resolve_player(conn, query)?;

        let poker_id = non_empty(ids.poker_id.as_deref());
        let smash_id = non_empty(ids.smash_id.as_deref());
        let pudgy_party_id = non_empty(ids.pudgy_party_id.as_deref());

        if let Some(v) = poker_id {
            let taken: i64 = players::table
                .filter(players::poker_id.eq(v))
                .filter(players::id.ne(player.id))
                .count()
                .get_result(conn)?;
            if taken > 0 {
                return Err(StoreError::Duplicate("Poker ID"));
            }
        }
        if let Some(v) = smash_id {
            let taken: i64 = players::table
                .filter(players::smash_id.eq(v))
                .filter(players::id.ne(player.id))
                .count()
                .get_result(conn)?;
            if taken > 0 {
                return Err(StoreError::Duplicate("Smash Karts ID"));
            }
        }
        if let Some(v) = pudgy_party_id {
            let taken: i64 = players::table
                .filter(players::pudgy_party_id.eq(v))
                .filter(players::id.ne(player.id))
                .count()
                .get_result(conn)?;
            if taken > 0 {
                return Err(StoreError::Duplicate("Pudgy Party ID"));
            }
        }

        diesel::update(players::table.filter(players::id.eq(player.id)))
            .set((
                players::poker_id.eq(poker_id),
                players::smash_id.eq(smash_id),
                players::pudgy_party_id.eq(pudgy_party_id),
                players::updated_at.eq(Some(Utc::now().naive_utc())),
            ))
            .execute(conn)?;

        let updated: Player = players::table
            .filter(players::id.eq(player.id))
            .select(Player::as_select())
            .first(conn)?;

        Ok(updated)
    })
}

/// Returns all score adjustments with the player's username, newest first.
pub fn adjustment_log(conn: &mut SqliteConnection) -> Result<Vec<AdjustmentLogEntry>, StoreError> {
    Ok(score_adjustments::table
        .inner_join(players::table)
        .select((
            score_adjustments::id,
            players::username,
            score_adjustments::game,
            score_adjustments::delta,
            score_adjustments::applied_at,
        ))
        .order(score_adjustments::applied_at.desc())
        .then_order_by(score_adjustments::id.desc())
        .load(conn)?)
}

/// Creates an admin session and returns the token.
pub fn create_admin_session(conn: &mut SqliteConnection) -> Result<String, StoreError> {
    let token = Uuid::new_v4().to_string();
    diesel::insert_into(admin_sessions::table)
        .values(&NewAdminSession {
            token: token.clone(),
        })
        .execute(conn)?;
    Ok(token)
}

/// Validates an admin token. Returns true if the provided token exists in the
/// admin_sessions table.
pub fn validate_admin_token(conn: &mut SqliteConnection, token: &str) -> Result<bool, StoreError> {
    if Uuid::parse_str(token).is_err() {
        return Ok(false);
    }
    let count: i64 = admin_sessions::table
        .filter(admin_sessions::token.eq(token))
        .count()
        .get_result(conn)?;
    Ok(count > 0)
}

/// Wipes players, score adjustments, and admin sessions.
pub fn reset_database(conn: &mut SqliteConnection) -> Result<(), StoreError> {
    conn.transaction(|conn| {
        diesel::delete(score_adjustments::table).execute(conn)?;
        diesel::delete(admin_sessions::table).execute(conn)?;
        diesel::delete(players::table).execute(conn)?;
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    // Each test gets its own in-memory database with the schema applied.
    fn test_conn() -> SqliteConnection {
        let mut conn =
            SqliteConnection::establish(":memory:").expect("Failed to open in-memory SQLite");
        conn.batch_execute("PRAGMA foreign_keys = ON;")
            .expect("Failed to set PRAGMAs");
        initialize_schema(&mut conn).expect("Failed to initialize schema");
        conn
    }

    fn registration(username: &str) -> Registration {
        Registration {
            username: username.to_string(),
            twitter: None,
            poker_id: None,
            smash_id: Some(format!("{}_sk", username)),
            pudgy_party_id: None,
        }
    }

    #[test]
    fn test_normalize_handle() {
        assert_eq!(normalize_handle("  @Kings_webx "), "Kings_webx");
        assert_eq!(normalize_handle("@@web3degen"), "web3degen");
        assert_eq!(normalize_handle("plain"), "plain");
        assert_eq!(normalize_handle("  @  "), "");
        assert_eq!(normalize_handle(""), "");
    }

    #[test]
    fn test_register_player() {
        let mut conn = test_conn();

        let player = register_player(
            &mut conn,
            &Registration {
                username: " @Kings_webx ".to_string(),
                twitter: None,
                poker_id: Some("KingsPoker".to_string()),
                smash_id: None,
                pudgy_party_id: None,
            },
        )
        .expect("Failed to register");

        assert_eq!(player.username, "Kings_webx");
        assert_eq!(player.twitter, "@Kings_webx");
        assert_eq!(player.poker_id.as_deref(), Some("KingsPoker"));
        assert_eq!(player.smash_id, None);
        assert_eq!(player.score_smash, 0);
        assert_eq!(player.score_poker, 0);
        assert_eq!(player.score_pudgy, 0);
        assert!(player.updated_at.is_none());
        assert!(player.created_at.and_utc().timestamp() > 0);
    }

    #[test]
    fn test_register_player_custom_twitter() {
        let mut conn = test_conn();

        let player = register_player(
            &mut conn,
            &Registration {
                username: "maria".to_string(),
                twitter: Some("@mariaplays".to_string()),
                poker_id: None,
                smash_id: Some("MariaSK".to_string()),
                pudgy_party_id: None,
            },
        )
        .expect("Failed to register");
        assert_eq!(player.twitter, "@mariaplays");

        // Display handle without the '@' is rejected.
        let err = register_player(
            &mut conn,
            &Registration {
                username: "other".to_string(),
                twitter: Some("otherplays".to_string()),
                poker_id: None,
                smash_id: Some("OtherSK".to_string()),
                pudgy_party_id: None,
            },
        )
        .expect_err("Should reject twitter without @");
        assert!(matches!(err, StoreError::BadTwitter));
    }

    #[test]
    fn test_register_validation() {
        let mut conn = test_conn();

        let err = register_player(&mut conn, &registration("  @ ")).expect_err("Should fail");
        assert!(matches!(err, StoreError::EmptyHandle));

        // No game ID at all, and whitespace-only IDs count as missing.
        let err = register_player(
            &mut conn,
            &Registration {
                username: "noid".to_string(),
                twitter: None,
                poker_id: Some("   ".to_string()),
                smash_id: None,
                pudgy_party_id: None,
            },
        )
        .expect_err("Should fail");
        assert!(matches!(err, StoreError::MissingGameId));
    }

    #[test]
    fn test_register_rejects_duplicates_case_insensitively() {
        let mut conn = test_conn();
        register_player(
            &mut conn,
            &Registration {
                username: "Kings_webx".to_string(),
                twitter: None,
                poker_id: Some("KingsPoker".to_string()),
                smash_id: Some("KingsSK".to_string()),
                pudgy_party_id: None,
            },
        )
        .expect("Failed to register");

        // Same username, different case.
        let err =
            register_player(&mut conn, &registration("KINGS_WEBX")).expect_err("Should fail");
        assert!(matches!(err, StoreError::Duplicate("username")));

        // Different username, colliding twitter display handle.
        let err = register_player(
            &mut conn,
            &Registration {
                username: "someone".to_string(),
                twitter: Some("@kings_WEBX".to_string()),
                poker_id: None,
                smash_id: Some("SomeoneSK".to_string()),
                pudgy_party_id: None,
            },
        )
        .expect_err("Should fail");
        assert!(matches!(err, StoreError::Duplicate("twitter handle")));

        // Colliding game ID, different case.
        let err = register_player(
            &mut conn,
            &Registration {
                username: "someone".to_string(),
                twitter: None,
                poker_id: Some("kingspoker".to_string()),
                smash_id: None,
                pudgy_party_id: None,
            },
        )
        .expect_err("Should fail");
        assert!(matches!(err, StoreError::Duplicate("Poker ID")));

        // Nothing was inserted by the failed attempts.
        let all = fetch_all_players(&mut conn).expect("Failed to list");
        assert_eq!(all.len(), 1);
    }

    #[test]
    fn test_leaderboard_filters_and_orders() {
        let mut conn = test_conn();
        register_player(&mut conn, &registration("alice")).expect("register alice");
        register_player(&mut conn, &registration("bob")).expect("register bob");
        register_player(
            &mut conn,
            &Registration {
                username: "carol".to_string(),
                twitter: None,
                poker_id: Some("CarolPoker".to_string()),
                smash_id: None,
                pudgy_party_id: None,
            },
        )
        .expect("register carol");

        adjust_score(&mut conn, "alice", Game::Smash, 50).expect("adjust alice");
        adjust_score(&mut conn, "bob", Game::Smash, 120).expect("adjust bob");
        adjust_score(&mut conn, "carol", Game::Poker, 75).expect("adjust carol");

        // Smash board: only smash-registered players, highest first.
        let smash = fetch_leaderboard(&mut conn, Game::Smash).expect("leaderboard");
        let names: Vec<&str> = smash.iter().map(|p| p.username.as_str()).collect();
        assert_eq!(names, vec!["bob", "alice"]);
        assert!(smash.iter().all(|p| p.game_id_for(Game::Smash).is_some()));

        let poker = fetch_leaderboard(&mut conn, Game::Poker).expect("leaderboard");
        assert_eq!(poker.len(), 1);
        assert_eq!(poker[0].username, "carol");
        assert_eq!(poker[0].score_poker, 75);

        let pudgy = fetch_leaderboard(&mut conn, Game::Pudgy).expect("leaderboard");
        assert!(pudgy.is_empty());
    }

    #[test]
    fn test_leaderboard_breaks_ties_by_registration_time() {
        let mut conn = test_conn();
        let first = register_player(&mut conn, &registration("early")).expect("register");
        let second = register_player(&mut conn, &registration("late")).expect("register");

        // Force distinct registration times; CURRENT_TIMESTAMP has second
        // granularity, so both rows usually share one.
        let base = chrono::NaiveDate::from_ymd_opt(2026, 1, 1)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap();
        diesel::update(players::table.filter(players::id.eq(first.id)))
            .set(players::created_at.eq(base))
            .execute(&mut conn)
            .expect("set created_at");
        diesel::update(players::table.filter(players::id.eq(second.id)))
            .set(players::created_at.eq(base + chrono::Duration::seconds(30)))
            .execute(&mut conn)
            .expect("set created_at");

        adjust_score(&mut conn, "early", Game::Smash, 10).expect("adjust");
        adjust_score(&mut conn, "late", Game::Smash, 10).expect("adjust");

        let board = fetch_leaderboard(&mut conn, Game::Smash).expect("leaderboard");
        let names: Vec<&str> = board.iter().map(|p| p.username.as_str()).collect();
        assert_eq!(names, vec!["early", "late"]);
    }

    #[test]
    fn test_resolve_player_cascade() {
        let mut conn = test_conn();
        register_player(
            &mut conn,
            &Registration {
                username: "maria".to_string(),
                twitter: Some("@mariaplays".to_string()),
                poker_id: None,
                smash_id: Some("MariaSK".to_string()),
                pudgy_party_id: None,
            },
        )
        .expect("register");

        // Exact username, with and without '@', any case.
        assert_eq!(resolve_player(&mut conn, "maria").expect("resolve").username, "maria");
        assert_eq!(resolve_player(&mut conn, "@maria").expect("resolve").username, "maria");
        assert_eq!(resolve_player(&mut conn, "MARIA").expect("resolve").username, "maria");

        // Exact twitter: "mariaplays" is not a username, but "@mariaplays" is stored.
        assert_eq!(
            resolve_player(&mut conn, "mariaplays").expect("resolve").username,
            "maria"
        );

        // Loose substring fallback.
        assert_eq!(resolve_player(&mut conn, "aria").expect("resolve").username, "maria");

        let err = resolve_player(&mut conn, "zzz").expect_err("Should fail");
        assert!(matches!(err, StoreError::PlayerNotFound));
        let err = resolve_player(&mut conn, "  @  ").expect_err("Should fail");
        assert!(matches!(err, StoreError::PlayerNotFound));
    }

    #[test]
    fn test_resolve_player_prefers_exact_username() {
        let mut conn = test_conn();
        register_player(&mut conn, &registration("kings")).expect("register");
        register_player(&mut conn, &registration("kings_webx")).expect("register");

        // "kings" is a substring of "kings_webx" but the exact match wins.
        let player = resolve_player(&mut conn, "kings").expect("resolve");
        assert_eq!(player.username, "kings");
    }

    #[test]
    fn test_adjust_score() {
        let mut conn = test_conn();
        register_player(&mut conn, &registration("alice")).expect("register");

        let (player, adjustment) =
            adjust_score(&mut conn, "alice", Game::Smash, 50).expect("adjust");
        assert_eq!(player.score_smash, 50);
        assert_eq!(adjustment.game, "smash");
        assert_eq!(adjustment.delta, 50);
        assert!(player.updated_at.is_some());

        // Negative delta deducts.
        let (player, _) = adjust_score(&mut conn, "alice", Game::Smash, -20).expect("adjust");
        assert_eq!(player.score_smash, 30);

        // Other columns untouched.
        assert_eq!(player.score_poker, 0);
        assert_eq!(player.score_pudgy, 0);

        // Per-game columns are independent.
        let (player, _) = adjust_score(&mut conn, "alice", Game::Poker, 200).expect("adjust");
        assert_eq!(player.score_poker, 200);
        assert_eq!(player.score_smash, 30);
    }

    #[test]
    fn test_adjust_score_rejects_zero_and_unknown() {
        let mut conn = test_conn();
        register_player(&mut conn, &registration("alice")).expect("register");

        let err = adjust_score(&mut conn, "alice", Game::Smash, 0).expect_err("Should fail");
        assert!(matches!(err, StoreError::ZeroDelta));

        let err = adjust_score(&mut conn, "nobody", Game::Smash, 10).expect_err("Should fail");
        assert!(matches!(err, StoreError::PlayerNotFound));

        // Neither failure logged anything.
        assert!(adjustment_log(&mut conn).expect("log").is_empty());
    }

    #[test]
    fn test_update_game_ids() {
        let mut conn = test_conn();
        register_player(&mut conn, &registration("alice")).expect("register");

        let player = update_game_ids(
            &mut conn,
            "alice",
            &GameIds {
                poker_id: Some("AlicePoker".to_string()),
                smash_id: Some("AliceSK".to_string()),
                pudgy_party_id: Some("AlicePudgy".to_string()),
            },
        )
        .expect("update ids");
        assert_eq!(player.poker_id.as_deref(), Some("AlicePoker"));
        assert_eq!(player.smash_id.as_deref(), Some("AliceSK"));
        assert_eq!(player.pudgy_party_id.as_deref(), Some("AlicePudgy"));
        assert!(player.updated_at.is_some());

        // Omitted and empty values clear the columns.
        let player = update_game_ids(
            &mut conn,
            "alice",
            &GameIds {
                poker_id: None,
                smash_id: Some("AliceSK".to_string()),
                pudgy_party_id: Some("  ".to_string()),
            },
        )
        .expect("update ids");
        assert_eq!(player.poker_id, None);
        assert_eq!(player.smash_id.as_deref(), Some("AliceSK"));
        assert_eq!(player.pudgy_party_id, None);
    }

    #[test]
    fn test_update_game_ids_uniqueness() {
        let mut conn = test_conn();
        register_player(&mut conn, &registration("alice")).expect("register");
        register_player(&mut conn, &registration("bob")).expect("register");

        // bob cannot take alice's smash ID, in any case.
        let err = update_game_ids(
            &mut conn,
            "bob",
            &GameIds {
                smash_id: Some("ALICE_SK".to_string()),
                ..GameIds::default()
            },
        )
        .expect_err("Should fail");
        assert!(matches!(err, StoreError::Duplicate("Smash Karts ID")));

        // Re-saving a player's own ID is fine.
        let player = update_game_ids(
            &mut conn,
            "alice",
            &GameIds {
                smash_id: Some("alice_sk".to_string()),
                ..GameIds::default()
            },
        )
        .expect("update ids");
        assert_eq!(player.smash_id.as_deref(), Some("alice_sk"));
    }

    #[test]
    fn test_admin_sessions() {
        let mut conn = test_conn();

        let token = create_admin_session(&mut conn).expect("create session");
        assert!(Uuid::parse_str(&token).is_ok());
        assert!(validate_admin_token(&mut conn, &token).expect("validate"));

        // Malformed and unknown tokens are both rejected.
        assert!(!validate_admin_token(&mut conn, "not-a-uuid").expect("validate"));
        let stranger = Uuid::new_v4().to_string();
        assert!(!validate_admin_token(&mut conn, &stranger).expect("validate"));
    }

    #[test]
    fn test_adjustment_log_newest_first() {
        let mut conn = test_conn();
        register_player(&mut conn, &registration("alice")).expect("register");
        register_player(&mut conn, &registration("bob")).expect("register");

        adjust_score(&mut conn, "alice", Game::Smash, 10).expect("adjust");
        adjust_score(&mut conn, "bob", Game::Smash, 20).expect("adjust");
        adjust_score(&mut conn, "alice", Game::Poker, -5).expect("adjust");

        let log = adjustment_log(&mut conn).expect("log");
        assert_eq!(log.len(), 3);
        assert_eq!(log[0].username, "alice");
        assert_eq!(log[0].game, "poker");
        assert_eq!(log[0].delta, -5);
        assert_eq!(log[2].username, "alice");
        assert_eq!(log[2].game, "smash");
        assert_eq!(log[2].delta, 10);
    }

    #[test]
    fn test_reset_database() {
        let mut conn = test_conn();
        register_player(&mut conn, &registration("alice")).expect("register");
        adjust_score(&mut conn, "alice", Game::Smash, 10).expect("adjust");
        create_admin_session(&mut conn).expect("session");

        reset_database(&mut conn).expect("reset");

        assert!(fetch_all_players(&mut conn).expect("players").is_empty());
        assert!(adjustment_log(&mut conn).expect("log").is_empty());
        let sessions: i64 = admin_sessions::table
            .count()
            .get_result(&mut conn)
            .expect("count");
        assert_eq!(sessions, 0);
    }
}
