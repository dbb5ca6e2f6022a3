pub mod decision;
pub mod health;
pub mod opinion;
pub mod snapshot;
