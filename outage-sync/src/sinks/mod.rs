pub mod postgres;

pub use postgres::PgOutageStore;
