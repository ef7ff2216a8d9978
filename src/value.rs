/// A value crossing the boundary between the launcher and the runtime.
#[derive(Clone, PartialEq)]
pub enum Value {
    Nil,
    Boolean(bool),
    Integer(i64),
    Number(f64),
    String(String),
    /// A string that is not valid UTF-8, kept byte for byte.
    Bytes(Vec<u8>),
    /// Installed as a sequence starting at index 1.
    List(Vec<Value>),
    /// Record installed in insertion order.
    Table(Vec<(Value, Value)>),
    /// Tables, functions and the like, passed to host functions by type name only.
    Opaque(&'static str),
}

impl Value {
    /// `String` when `bytes` is valid UTF-8, `Bytes` otherwise.
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        match String::from_utf8(bytes) {
            Ok(s) => Self::String(s),
            Err(err) => Self::Bytes(err.into_bytes()),
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Self::String(s) => Some(s.as_bytes()),
            Self::Bytes(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }

    /// Everything except `nil` and `false`.
    pub fn is_truthy(&self) -> bool {
        !matches!(self, Self::Nil | Self::Boolean(false))
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Boolean(_) => "boolean",
            Self::Integer(_) | Self::Number(_) => "number",
            Self::String(_) | Self::Bytes(_) => "string",
            Self::List(_) | Self::Table(_) => "table",
            Self::Opaque(name) => *name,
        }
    }

    /// Field lookup on a `Table` value.
    pub fn get(&self, key: &str) -> Option<&Value> {
        match self {
            Self::Table(fields) => fields
                .iter()
                .find(|(k, _)| k.as_str() == Some(key))
                .map(|(_, v)| v),
            _ => None,
        }
    }
}

impl std::fmt::Debug for Value {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Nil => write!(f, "nil"),
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Integer(i) => write!(f, "{i}"),
            Self::Number(n) => write!(f, "{n:?}"),
            Self::String(s) => write!(f, "{s:?}"),
            Self::Bytes(b) => write!(f, "\"{}\"", b.escape_ascii()),
            Self::List(items) => f.debug_list().entries(items).finish(),
            Self::Table(fields) => f
                .debug_map()
                .entries(fields.iter().map(|(k, v)| (k, v)))
                .finish(),
            Self::Opaque(name) => write!(f, "<{name}>"),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Boolean(b)
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Integer(n)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_owned())
    }
}
