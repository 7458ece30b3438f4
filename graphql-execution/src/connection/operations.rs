//! Built-in connection operations and cursors.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;

use super::Item;
use crate::context::ExecutionContext;
use crate::error::FieldError;
use crate::error::INVALID_VALUE;
use crate::json_ext::Value;

const CURSOR_PREFIX: &str = "cursor:";

/// Opaque cursor of the element at `position` in the backing sequence.
pub fn encode_cursor(position: usize) -> String {
    STANDARD.encode(format!("{CURSOR_PREFIX}{position}"))
}

pub fn decode_cursor(cursor: &str) -> Result<usize, FieldError> {
    let invalid = || FieldError::new(format!("invalid cursor '{cursor}'")).with_code(INVALID_VALUE);
    let decoded = STANDARD.decode(cursor).map_err(|_| invalid())?;
    let decoded = String::from_utf8(decoded).map_err(|_| invalid())?;
    decoded
        .strip_prefix(CURSOR_PREFIX)
        .and_then(|position| position.parse().ok())
        .ok_or_else(invalid)
}

fn count(argument: &str, value: &Value) -> Result<usize, FieldError> {
    value
        .as_u64()
        .and_then(|count| usize::try_from(count).ok())
        .ok_or_else(|| {
            FieldError::new(format!("'{argument}' must be a non-negative integer"))
                .with_code(INVALID_VALUE)
        })
}

fn cursor(argument: &str, value: &Value) -> Result<usize, FieldError> {
    match value.as_str() {
        Some(cursor) => decode_cursor(cursor),
        None => Err(FieldError::new(format!("'{argument}' must be a cursor")).with_code(INVALID_VALUE)),
    }
}

/// Keeps the leading `first` items.
pub(crate) fn first(
    mut items: Vec<Item>,
    value: &Value,
    _context: &ExecutionContext,
) -> Result<Vec<Item>, FieldError> {
    items.truncate(count("first", value)?);
    Ok(items)
}

/// Keeps the trailing `last` items.
pub(crate) fn last(
    mut items: Vec<Item>,
    value: &Value,
    _context: &ExecutionContext,
) -> Result<Vec<Item>, FieldError> {
    let keep = count("last", value)?;
    let skip = items.len().saturating_sub(keep);
    items.drain(..skip);
    Ok(items)
}

/// Keeps the items positioned after the cursor.
pub(crate) fn after(
    mut items: Vec<Item>,
    value: &Value,
    _context: &ExecutionContext,
) -> Result<Vec<Item>, FieldError> {
    let position = cursor("after", value)?;
    items.retain(|item| item.position > position);
    Ok(items)
}

/// Keeps the items positioned before the cursor.
pub(crate) fn before(
    mut items: Vec<Item>,
    value: &Value,
    _context: &ExecutionContext,
) -> Result<Vec<Item>, FieldError> {
    let position = cursor("before", value)?;
    items.retain(|item| item.position < position);
    Ok(items)
}

#[cfg(test)]
mod tests {
    use serde_json_bytes::json;

    use super::*;
    use crate::field::Element;

    fn items(count: usize) -> Vec<Item> {
        (0..count)
            .map(|position| Item {
                position,
                element: Element::Value(json!(position)),
            })
            .collect()
    }

    fn positions(items: &[Item]) -> Vec<usize> {
        items.iter().map(|item| item.position).collect()
    }

    #[test]
    fn cursor_round_trip() {
        insta::assert_snapshot!(encode_cursor(3), @"Y3Vyc29yOjM=");
        assert_eq!(decode_cursor(&encode_cursor(42)).unwrap(), 42);
        let error = decode_cursor("not a cursor").unwrap_err();
        assert_eq!(error.extensions().get("code"), Some(&json!("INVALID_VALUE")));
        assert!(decode_cursor(&STANDARD.encode("offset:1")).is_err());
    }

    #[test]
    fn slicing() {
        let context = ExecutionContext::default();
        assert_eq!(positions(&first(items(5), &json!(2), &context).unwrap()), vec![0, 1]);
        assert_eq!(positions(&first(items(1), &json!(3), &context).unwrap()), vec![0]);
        assert_eq!(positions(&last(items(5), &json!(2), &context).unwrap()), vec![3, 4]);
        assert_eq!(positions(&last(items(1), &json!(3), &context).unwrap()), vec![0]);
        assert!(first(items(5), &json!(-1), &context).is_err());
    }

    #[test]
    fn cursors_use_backing_positions() {
        let context = ExecutionContext::default();
        let sliced = after(items(5), &json!(encode_cursor(1)), &context).unwrap();
        assert_eq!(positions(&sliced), vec![2, 3, 4]);
        let sliced = before(sliced, &json!(encode_cursor(4)), &context).unwrap();
        assert_eq!(positions(&sliced), vec![2, 3]);
        assert!(after(items(5), &json!(3), &context).is_err());
    }
}
