pub mod documents;
pub mod execute;
pub mod health;
pub mod help;
