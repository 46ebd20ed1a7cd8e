//! `fl_each(body, path)`: a table-valued function that flattens a
//! Binary-Doc array or dict into rows, backing `ANY`/`EVERY`/`UNNEST`.
//!
//! Hidden columns `root_data`/`root_path` take the document body and an
//! optional property path to flatten (absent/empty means "the root value
//! itself is the array/dict"); visible columns are `key` (the array index
//! or dict key), `value`, `type` (an integer tag for the item's Binary-Doc
//! kind), `data` (the item re-encoded as standalone Binary-Doc bytes), and
//! `body` (the same bytes — callers reach the item through `fl_value`/
//! `fl_root` rather than a raw in-process pointer). The cursor owns a copy
//! of the body bytes so it isn't tied to the input row's lifetime —
//! `fl_each` is always called with a materialized BLOB argument, never a
//! streaming one, so the copy is cheap relative to the query itself.

use bindoc::Kind;
use rusqlite::types::Value as SqlValue;
use rusqlite::vtab::{
    eponymous_only_module, Context, IndexInfo, VTab, VTabConnection, VTabCursor, Values,
};
use rusqlite::{Connection, Error as SqliteError};
use std::marker::PhantomData;

pub fn register(conn: &Connection) -> rusqlite::Result<()> {
    conn.create_module("fl_each", eponymous_only_module::<EachTab>(), None)
}

#[repr(C)]
struct EachTab {
    base: rusqlite::vtab::sqlite3_vtab,
}

unsafe impl<'vtab> VTab<'vtab> for EachTab {
    type Aux = ();
    type Cursor = EachCursor;

    fn connect(
        _db: &mut VTabConnection,
        _aux: Option<&Self::Aux>,
        _args: &[&[u8]],
    ) -> rusqlite::Result<(String, Self)> {
        let vtab = EachTab {
            base: rusqlite::vtab::sqlite3_vtab::default(),
        };
        Ok((
            "CREATE TABLE x(key, value, type, data, body, root_data HIDDEN, root_path HIDDEN)".to_owned(),
            vtab,
        ))
    }

    fn best_index(&self, info: &mut IndexInfo) -> rusqlite::Result<()> {
        // Column indices 5/6 are the hidden root_data/root_path arguments;
        // require root_data as an equality constraint (root_path is optional).
        for (i, constraint) in info.constraints().enumerate() {
            if constraint.column() == 5 && constraint.is_usable() {
                info.constraint_mut(i).set_argv_index(1);
                info.constraint_mut(i).set_omit(true);
            }
            if constraint.column() == 6 && constraint.is_usable() {
                info.constraint_mut(i).set_argv_index(2);
                info.constraint_mut(i).set_omit(true);
            }
        }
        info.set_estimated_cost(1_000_000.0);
        Ok(())
    }

    fn open(&mut self) -> rusqlite::Result<Self::Cursor> {
        Ok(EachCursor::default())
    }
}

#[derive(Default)]
struct EachCursor {
    base: rusqlite::vtab::sqlite3_vtab_cursor,
    rows: Vec<Row>,
    index: usize,
}

struct Row {
    key: RowKey,
    value: SqlValue,
    data: Vec<u8>,
    kind: Kind,
}

enum RowKey {
    Index(i64),
    Name(String),
}

unsafe impl VTabCursor for EachCursor {
    fn filter(
        &mut self,
        _idx_num: std::os::raw::c_int,
        _idx_str: Option<&str>,
        args: &Values<'_>,
    ) -> rusqlite::Result<()> {
        self.rows.clear();
        self.index = 0;

        let root_data: Option<Vec<u8>> = args.get(0)?;
        let root_path: Option<String> = args.get(1).unwrap_or(None);

        let Some(root_data) = root_data else {
            return Ok(());
        };

        let target = match root_path.as_deref() {
            None | Some("") => bindoc::parse_record_body(&root_data, None)
                .map_err(|e| SqliteError::ModuleError(e.to_string()))?,
            Some(path) => match bindoc::eval_path(&root_data, path, None)
                .map_err(|e| SqliteError::ModuleError(e.to_string()))?
            {
                Some(v) => v,
                None => return Ok(()),
            },
        };

        if let Some(array) = target.as_array() {
            for (i, item) in array.iter().enumerate() {
                self.rows.push(Row {
                    key: RowKey::Index(i as i64),
                    value: crate::values::value_to_sql(&item),
                    data: crate::values::reencode(&item),
                    kind: item.kind(),
                });
            }
        } else if let Some(dict) = target.as_dict() {
            for pair in dict.iter() {
                let (k, v) = pair.map_err(|e| SqliteError::ModuleError(e.to_string()))?;
                self.rows.push(Row {
                    key: RowKey::Name(k.to_string()),
                    value: crate::values::value_to_sql(&v),
                    data: crate::values::reencode(&v),
                    kind: v.kind(),
                });
            }
        }

        Ok(())
    }

    fn next(&mut self) -> rusqlite::Result<()> {
        self.index += 1;
        Ok(())
    }

    fn eof(&self) -> bool {
        self.index >= self.rows.len()
    }

    fn column(&self, ctx: &mut Context, i: std::os::raw::c_int) -> rusqlite::Result<()> {
        let Some(row) = self.rows.get(self.index) else {
            return ctx.set_result(&SqlValue::Null);
        };
        match i {
            0 => match &row.key {
                RowKey::Index(n) => ctx.set_result(&SqlValue::Integer(*n)),
                RowKey::Name(s) => ctx.set_result(&SqlValue::Text(s.clone())),
            },
            1 => ctx.set_result(&row.value),
            2 => ctx.set_result(&SqlValue::Integer(kind_tag(row.kind))),
            3 => ctx.set_result(&SqlValue::Blob(row.data.clone())),
            4 => ctx.set_result(&SqlValue::Blob(row.data.clone())),
            _ => ctx.set_result(&SqlValue::Null),
        }
    }

    fn rowid(&self) -> rusqlite::Result<i64> {
        Ok(self.index as i64)
    }
}

/// Integer tag for a Binary-Doc kind, by its ordinal position in
/// [`Kind`] — this bridge's own convention for the `type` column, since
/// [`bindoc::Kind`] carries no assigned wire values of its own.
fn kind_tag(kind: Kind) -> i64 {
    match kind {
        Kind::Null => 0,
        Kind::Bool => 1,
        Kind::Number => 2,
        Kind::String => 3,
        Kind::Data => 4,
        Kind::Array => 5,
        Kind::Dict => 6,
    }
}

// Silences an "unused" warning on platforms where PhantomData isn't
// otherwise referenced; kept to document that EachTab intentionally carries
// no per-connection auxiliary data.
#[allow(dead_code)]
type _AuxMarker = PhantomData<()>;
