//! Lenient decoding of the attribute shapes EMD writers have produced.
//!
//! Writers disagree on whether a single value is a scalar or a length-1
//! array, and on whether text is UTF-8 or a raw byte string. Both forms are
//! accepted everywhere a single value is expected.

use pureemd_store::AttrValue;

/// Integer held by a scalar or length-1 integer attribute.
pub(crate) fn single_int(value: &AttrValue) -> Option<i64> {
    match value {
        AttrValue::I64Array(v) if v.len() == 1 => Some(v[0]),
        other => other.as_i64(),
    }
}

/// Text held by a scalar or length-1 string/byte-string attribute.
pub(crate) fn single_text(value: &AttrValue) -> Option<String> {
    match value {
        AttrValue::StringArray(v) if v.len() == 1 => Some(v[0].clone()),
        AttrValue::BytesArray(v) if v.len() == 1 => AttrValue::Bytes(v[0].clone()).as_text(),
        other => other.as_text(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ints() {
        assert_eq!(single_int(&AttrValue::I64(5)), Some(5));
        assert_eq!(single_int(&AttrValue::U64(1)), Some(1));
        assert_eq!(single_int(&AttrValue::I64Array(vec![2])), Some(2));
        assert_eq!(single_int(&AttrValue::I64Array(vec![1, 2])), None);
        assert_eq!(single_int(&AttrValue::I64Array(vec![])), None);
        assert_eq!(single_int(&AttrValue::F64(1.0)), None);
        assert_eq!(single_int(&AttrValue::from("1")), None);
    }

    #[test]
    fn texts() {
        assert_eq!(single_text(&AttrValue::from("nm")), Some("nm".into()));
        assert_eq!(single_text(&AttrValue::Bytes(b"nm\0\0".to_vec())), Some("nm".into()));
        assert_eq!(
            single_text(&AttrValue::StringArray(vec!["x".into()])),
            Some("x".into())
        );
        assert_eq!(
            single_text(&AttrValue::BytesArray(vec![b"y".to_vec()])),
            Some("y".into())
        );
        assert_eq!(
            single_text(&AttrValue::BytesArray(vec![b"a".to_vec(), b"b".to_vec()])),
            None
        );
        assert_eq!(single_text(&AttrValue::Bytes(vec![0xff, 0xfe])), None);
        assert_eq!(single_text(&AttrValue::I64(1)), None);
    }
}
