pub mod memory;
pub mod migrations;
pub mod sqlite;
