use gauge_gamers::{establish_connection, initialize_schema};

fn main() {
    let mut conn = establish_connection();
    initialize_schema(&mut conn).expect("Failed to initialize schema");
    println!("Schema applied.");
}
