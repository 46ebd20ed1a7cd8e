//! The SQL function layer that lets `docql`-translated SQL see into
//! Binary-Doc document bodies: scalar `fl_*` functions, the `fl_each`
//! table-valued function backing quantifiers/`UNNEST`, and the FTS `rank()`
//! scorer.
//!
//! This crate has no knowledge of the document store's on-disk layout
//! beyond the `body`/`root_data` bytes it's handed as function arguments;
//! `dbengine` is the layer that opens connections and calls [`register`].

mod each;
pub mod error;
mod rank;
mod scalar;
pub mod values;

pub use error::{Error, Result};

use rusqlite::Connection;

/// Registers every `fl_*` scalar function, the `fl_each` virtual table
/// module, and `rank()` on `conn`. Call once per connection, right after
/// opening it, before the connection is handed out.
pub fn register(conn: &Connection) -> rusqlite::Result<()> {
    scalar::register(conn)?;
    each::register(conn)?;
    rank::register(conn)?;
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use bindoc::Encoder;

    #[test]
    fn registers_without_error() {
        let conn = Connection::open_in_memory().unwrap();
        register(&conn).unwrap();
    }

    #[test]
    fn fl_each_flattens_an_array() {
        let conn = Connection::open_in_memory().unwrap();
        register(&conn).unwrap();

        let mut enc = Encoder::new();
        enc.array_header(3);
        enc.string("red");
        enc.string("green");
        enc.string("blue");
        let body = enc.into_bytes();

        let mut stmt = conn
            .prepare("SELECT key, value, type FROM fl_each(?1, NULL) ORDER BY key")
            .unwrap();
        let rows: Vec<(i64, String, i64)> = stmt
            .query_map([body], |row| {
                Ok((row.get(0)?, row.get(1)?, row.get(2)?))
            })
            .unwrap()
            .collect::<rusqlite::Result<Vec<_>>>()
            .unwrap();

        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].1, "green");
        assert_eq!(rows[1].2, 3); // string kind tag
    }

    #[test]
    fn fl_each_flattens_a_nested_path() {
        let conn = Connection::open_in_memory().unwrap();
        register(&conn).unwrap();

        let mut enc = Encoder::new();
        enc.dict_header(1);
        enc.plain_key("tags");
        enc.array_header(2);
        enc.int(1);
        enc.int(2);
        let body = enc.into_bytes();

        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM fl_each(?1, 'tags')",
                [body],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn fl_each_exposes_data_and_body_columns() {
        let conn = Connection::open_in_memory().unwrap();
        register(&conn).unwrap();

        let mut enc = Encoder::new();
        enc.array_header(1);
        enc.string("hi");
        let body = enc.into_bytes();

        let data: Vec<u8> = conn
            .query_row(
                "SELECT data FROM fl_each(?1, NULL) WHERE key = 0",
                [body],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(bindoc::parse(&data, None).unwrap().as_string(), Some("hi"));
    }
}
