//! `{"return": [...]}` response envelope.

use saltapi_core::ApiError;
use serde_json::Value;

/// Take the `return` array out of a response body.
///
/// # Errors
/// Returns `ProtocolViolation` if the body is not an object with a
/// `return` array.
pub fn returns(body: Value) -> Result<Vec<Value>, ApiError> {
    let Value::Object(mut map) = body else {
        return Err(ApiError::ProtocolViolation(
            "response body is not an object".to_owned(),
        ));
    };
    match map.remove("return") {
        Some(Value::Array(items)) => Ok(items),
        Some(other) => Err(ApiError::ProtocolViolation(format!(
            "`return` is not an array: {other}"
        ))),
        None => Err(ApiError::ProtocolViolation(
            "response has no `return` key".to_owned(),
        )),
    }
}

/// The first element of the `return` array.
///
/// # Errors
/// Returns `ProtocolViolation` if the envelope is malformed or empty.
pub fn first_return(body: Value) -> Result<Value, ApiError> {
    returns(body)?
        .into_iter()
        .next()
        .ok_or_else(|| ApiError::ProtocolViolation("`return` array is empty".to_owned()))
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_first_return() {
        let body = json!({"return": [{"ms-0": true, "ms-1": true}]});
        assert_eq!(first_return(body).unwrap(), json!({"ms-0": true, "ms-1": true}));
    }

    #[test]
    fn test_violations() {
        for body in [
            json!({"return": []}),
            json!({"return": {"ms-0": true}}),
            json!({"data": []}),
            json!([1, 2]),
            Value::Null,
        ] {
            assert!(
                matches!(first_return(body.clone()), Err(ApiError::ProtocolViolation(_))),
                "{body} should be a protocol violation"
            );
        }
    }

    #[test]
    fn test_returns_keeps_order() {
        let items = returns(json!({"return": [1, 2, 3]})).unwrap();
        assert_eq!(items, vec![json!(1), json!(2), json!(3)]);
    }
}
