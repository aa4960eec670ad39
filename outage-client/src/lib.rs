pub mod db;
pub mod domain;

pub use db::OutageTable;
pub use domain::OutageRecord;
