pub mod analytics;
pub mod profile;
pub mod tier;
pub mod token;
