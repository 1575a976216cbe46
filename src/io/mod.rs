// Data export: CSV for spreadsheets, JSON for archiving

pub mod export;

pub use export::*;
