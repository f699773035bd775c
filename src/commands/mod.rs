pub mod compare;
pub mod db;
pub mod export;
pub mod settings;
