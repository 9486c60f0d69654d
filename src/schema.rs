// Hand-written Diesel schema for the SQLite database. The matching DDL lives
// in initialize_schema in lib.rs.

diesel::table! {
    players (id) {
        id -> Integer,
        username -> Text,
        twitter -> Text,
        poker_id -> Nullable<Text>,
        smash_id -> Nullable<Text>,
        pudgy_party_id -> Nullable<Text>,
        score_smash -> Integer,
        score_poker -> Integer,
        score_pudgy -> Integer,
        created_at -> Timestamp,
        updated_at -> Nullable<Timestamp>,
    }
}

diesel::table! {
    score_adjustments (id) {
        id -> Integer,
        player_id -> Integer,
        game -> Text,
        delta -> Integer,
        applied_at -> Timestamp,
    }
}

diesel::table! {
    admin_sessions (id) {
        id -> Integer,
        token -> Text,
        created_at -> Timestamp,
        expires_at -> Nullable<Timestamp>,
    }
}

diesel::joinable!(score_adjustments -> players (player_id));

diesel::allow_tables_to_appear_in_same_query!(admin_sessions, players, score_adjustments);
