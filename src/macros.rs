//! Accessor macros for untyped CBOR values. Callers re-map the generic
//! type error to a position-specific one where it matters.

macro_rules! cbor_try_map {
    ($v:expr) => {
        match $v {
            serde_cbor::Value::Map(m) => Ok(m),
            _ => Err($crate::error::WebauthnError::CBORValueIncorrectType),
        }
    };
}

macro_rules! cbor_try_array {
    ($v:expr) => {
        match $v {
            serde_cbor::Value::Array(a) => Ok(a),
            _ => Err($crate::error::WebauthnError::CBORValueIncorrectType),
        }
    };
}

macro_rules! cbor_try_bytes {
    ($v:expr) => {
        match $v {
            serde_cbor::Value::Bytes(b) => Ok(b),
            _ => Err($crate::error::WebauthnError::CBORValueIncorrectType),
        }
    };
}

macro_rules! cbor_try_i128 {
    ($v:expr) => {
        match $v {
            serde_cbor::Value::Integer(i) => Ok(*i),
            _ => Err($crate::error::WebauthnError::CBORValueIncorrectType),
        }
    };
}

macro_rules! cbor_try_string {
    ($v:expr) => {
        match $v {
            serde_cbor::Value::Text(s) => Ok(s.as_str()),
            _ => Err($crate::error::WebauthnError::CBORValueIncorrectType),
        }
    };
}
