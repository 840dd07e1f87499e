pub mod health;
pub mod relays;
