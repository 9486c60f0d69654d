use gauge_gamers::{establish_connection, reset_database};

fn main() {
    let mut conn = establish_connection();
    reset_database(&mut conn).expect("Failed to reset database");
    println!("All players, score adjustments, and admin sessions cleared.");
}
