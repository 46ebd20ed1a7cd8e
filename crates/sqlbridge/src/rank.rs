//! `rank(matchinfo(table))`: an FTS3/4 relevancy scorer, ported from the
//! classic `matchinfo`-based recipe (`SQLiteFTSRankFunction.cc` in the
//! original implementation, itself adapted from the public-domain recipe at
//! <https://www.sqlite.org/fts3.html#appendix_a>).
//!
//! The overall score is the sum, over every reportable phrase and every FTS
//! column, of `(hits in this row / hits across the whole table)`. A column
//! weight hook exists in the original (commented out there too — the real
//! callers all pass implicit weight 1.0) and isn't reproduced here.

use rusqlite::functions::{Context, FunctionFlags};
use rusqlite::{Connection, Error as SqliteError};

pub fn register(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_scalar_function(
        "rank",
        1,
        FunctionFlags::SQLITE_UTF8 | FunctionFlags::SQLITE_DETERMINISTIC,
        rank,
    )
}

fn rank(ctx: &Context) -> rusqlite::Result<f64> {
    let matchinfo: Vec<u8> = ctx.get(0)?;
    if matchinfo.len() < 8 || matchinfo.len() % 4 != 0 {
        return Err(SqliteError::UserFunctionError(
            "nothing for rank() to match".into(),
        ));
    }

    // matchinfo() packs an array of native-endian i32s; 'x' requests
    // (phrase, column, hits-this-row, hits-this-column-all-rows, hits-this-column-all-docs)
    // triples per phrase/column, starting after a 2-word header.
    let words: Vec<i32> = matchinfo
        .chunks_exact(4)
        .map(|c| i32::from_ne_bytes([c[0], c[1], c[2], c[3]]))
        .collect();

    let n_phrase = words[0] as usize;
    let n_col = words[1] as usize;
    let expected_len = 2 + n_phrase * n_col * 3;
    if words.len() < expected_len {
        return Err(SqliteError::UserFunctionError(
            "malformed matchinfo() buffer passed to rank()".into(),
        ));
    }

    let mut score = 0.0;
    for phrase in 0..n_phrase {
        let base = 2 + phrase * n_col * 3;
        for col in 0..n_col {
            let hit_count = words[base + col * 3];
            let global_hit_count = words[base + col * 3 + 1];
            if hit_count > 0 && global_hit_count > 0 {
                score += hit_count as f64 / global_hit_count as f64;
            }
        }
    }

    Ok(score)
}

#[cfg(test)]
mod test {
    use super::*;

    fn matchinfo_bytes(n_phrase: i32, n_col: i32, triples: &[(i32, i32, i32)]) -> Vec<u8> {
        let mut words = vec![n_phrase, n_col];
        for &(hits, global, docs) in triples {
            words.push(hits);
            words.push(global);
            words.push(docs);
        }
        words.iter().flat_map(|w| w.to_ne_bytes()).collect()
    }

    #[test]
    fn scores_single_phrase_single_column() {
        let conn = Connection::open_in_memory().unwrap();
        register(&conn).unwrap();
        let bytes = matchinfo_bytes(1, 1, &[(2, 4, 10)]);
        let score: f64 = conn
            .query_row("SELECT rank(?1)", [bytes], |row| row.get(0))
            .unwrap();
        assert!((score - 0.5).abs() < 1e-9);
    }

    #[test]
    fn rejects_malformed_buffer() {
        let conn = Connection::open_in_memory().unwrap();
        register(&conn).unwrap();
        let err = conn.query_row("SELECT rank(X'0000')", [], |row: &rusqlite::Row| {
            row.get::<_, f64>(0)
        });
        assert!(err.is_err());
    }
}
