pub mod eia_outages;

pub use eia_outages::EiaOutageSource;
