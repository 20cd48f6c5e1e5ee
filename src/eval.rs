//! Printing the result of `--remote-expr`.

use std::fmt;

use rmpv::Value;

/// An evaluated expression, classified for printing.
#[derive(Debug, Clone, PartialEq)]
pub enum EvalResult {
    /// Strings and blobs, decoded lossily as UTF-8.
    Text(String),
    Sequence(Vec<EvalResult>),
    Mapping(Vec<(EvalResult, EvalResult)>),
    /// Numbers, floats, booleans and null, in their Vim spelling.
    Scalar(String),
}

impl From<Value> for EvalResult {
    fn from(value: Value) -> Self {
        match value {
            Value::String(s) => Self::Text(String::from_utf8_lossy(s.as_bytes()).into_owned()),
            Value::Binary(bytes) => Self::Text(String::from_utf8_lossy(&bytes).into_owned()),
            Value::Array(items) => Self::Sequence(items.into_iter().map(Self::from).collect()),
            Value::Map(pairs) => Self::Mapping(
                pairs
                    .into_iter()
                    .map(|(k, v)| (Self::from(k), Self::from(v)))
                    .collect(),
            ),
            Value::Nil => Self::Scalar("v:null".to_string()),
            Value::Boolean(b) => Self::Scalar(if b { "v:true" } else { "v:false" }.to_string()),
            Value::Integer(n) => Self::Scalar(n.to_string()),
            Value::F32(f) => Self::Scalar(f.to_string()),
            Value::F64(f) => Self::Scalar(f.to_string()),
            // Buffer, window and tabpage handles.
            Value::Ext(_, data) => Self::Scalar(ext_handle(&data)),
        }
    }
}

/// Decode a msgpack-encoded integer handle; falls back to hex.
fn ext_handle(data: &[u8]) -> String {
    match rmpv::decode::read_value(&mut &data[..]) {
        Ok(Value::Integer(n)) => n.to_string(),
        _ => data.iter().map(|b| format!("{b:02x}")).collect(),
    }
}

impl EvalResult {
    /// The text printed to stdout, always newline terminated.
    pub fn to_output(&self) -> String {
        let mut out = self.to_string();
        if !out.ends_with('\n') {
            out.push('\n');
        }
        out
    }

    /// Nested rendering: text is quoted inside containers.
    fn fmt_nested(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) => write!(f, "'{}'", s.replace('\'', "''")),
            other => write!(f, "{other}"),
        }
    }
}

impl fmt::Display for EvalResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Text(s) | Self::Scalar(s) => f.write_str(s),
            Self::Sequence(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    item.fmt_nested(f)?;
                }
                f.write_str("]")
            }
            Self::Mapping(pairs) => {
                f.write_str("{")?;
                for (i, (key, value)) in pairs.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    key.fmt_nested(f)?;
                    f.write_str(": ")?;
                    value.fmt_nested(f)?;
                }
                f.write_str("}")
            }
        }
    }
}
