pub mod outage_record;

pub use outage_record::OutageRecord;
