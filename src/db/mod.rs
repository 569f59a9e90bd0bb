//! Database boundary: connections and the SQL execution capability set.

pub mod connection;
pub mod executor;

pub use connection::{connect_and_ensure_database, connect_to_database, mask_url_password};
pub use executor::{MySqlExecutor, Row, SqlExecutor, SqlValue, Statement};
