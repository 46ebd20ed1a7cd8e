//! Legacy revision-tree fallback: old collections may still
//! hold rows whose `body` is a revision-tree blob rather than a bare
//! Binary-Doc document. The accessor transparently unwraps these so the
//! rest of the bridge never has to know the difference.
//!
//! The revision-tree container used by pre-4.0-schema databases (see
//! `PRAGMA user_version` generation 400 "new document
//! format") stores every revision of a document concatenated together, with
//! a small header pointing at the current one:
//!
//! ```text
//! magic: b"RVTR"
//! current_index: varint-free u32 LE
//! count: u32 LE
//! repeated `count` times: length: u32 LE, bytes: [u8; length]
//! ```
//!
//! A real Binary-Doc document never starts with this magic (tag byte 0 is
//! `null`, and `b'R'` is not a valid top-level tag), so detection is
//! unambiguous.

const MAGIC: &[u8; 4] = b"RVTR";

pub fn is_legacy_revision_tree(body: &[u8]) -> bool {
    body.starts_with(MAGIC)
}

#[derive(thiserror::Error, Debug, PartialEq, Eq)]
pub enum Error {
    #[error("truncated legacy revision-tree body")]
    Truncated,
    #[error("legacy revision-tree current_index {index} is out of range (count {count})")]
    IndexOutOfRange { index: u32, count: u32 },
}

/// Extracts the current revision's embedded Binary-Doc bytes from a legacy
/// revision-tree `body`. Returns a borrowed slice whenever the bytes are a
/// contiguous sub-range of `body` (always true for this container format —
/// Rust byte slices carry no alignment requirement, so there's no "copy
/// when misaligned" branch to speak of; see DESIGN.md).
pub fn extract_current_revision(body: &[u8]) -> Result<&[u8], Error> {
    let rest = body.strip_prefix(MAGIC).ok_or(Error::Truncated)?;
    let current_index = read_u32(rest, 0)?;
    let count = read_u32(rest, 4)?;
    if current_index >= count {
        return Err(Error::IndexOutOfRange {
            index: current_index,
            count,
        });
    }

    let mut pos = 8;
    for i in 0..count {
        let len = read_u32(rest, pos)? as usize;
        pos += 4;
        let end = pos + len;
        let slice = rest.get(pos..end).ok_or(Error::Truncated)?;
        if i == current_index {
            return Ok(slice);
        }
        pos = end;
    }
    unreachable!("current_index checked against count above")
}

fn read_u32(bytes: &[u8], at: usize) -> Result<u32, Error> {
    let slice = bytes.get(at..at + 4).ok_or(Error::Truncated)?;
    Ok(u32::from_le_bytes(slice.try_into().unwrap()))
}

#[cfg(test)]
mod test {
    use super::*;

    fn build(current_index: u32, revisions: &[&[u8]]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(MAGIC);
        out.extend_from_slice(&current_index.to_le_bytes());
        out.extend_from_slice(&(revisions.len() as u32).to_le_bytes());
        for rev in revisions {
            out.extend_from_slice(&(rev.len() as u32).to_le_bytes());
            out.extend_from_slice(rev);
        }
        out
    }

    #[test]
    fn detects_and_extracts_current_revision() {
        let body = build(1, &[b"old-rev", b"current-rev", b"even-older"]);
        assert!(is_legacy_revision_tree(&body));
        assert_eq!(extract_current_revision(&body).unwrap(), b"current-rev");
    }

    #[test]
    fn plain_binary_doc_is_not_legacy() {
        let body = crate::value::Encoder::new().string("hi").into_bytes();
        assert!(!is_legacy_revision_tree(&body));
    }

    #[test]
    fn rejects_out_of_range_index() {
        let body = build(5, &[b"only-one"]);
        assert_eq!(
            extract_current_revision(&body).unwrap_err(),
            Error::IndexOutOfRange { index: 5, count: 1 }
        );
    }
}
