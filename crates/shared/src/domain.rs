use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use serde_json::Number;

/// A single state value. Only JSON numbers and strings are carried in the URL.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Number(Number),
    Text(String),
}

impl Scalar {
    /// Non-finite floats have no JSON form and yield `None`.
    pub fn float(value: f64) -> Option<Self> {
        Number::from_f64(value).map(Self::Number)
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Number(n) => n.as_i64(),
            Self::Text(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Number(_) => None,
            Self::Text(s) => Some(s),
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Number(n) => write!(f, "{n}"),
            Self::Text(s) => f.write_str(s),
        }
    }
}

macro_rules! scalar_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Scalar {
                fn from(value: $ty) -> Self {
                    Self::Number(Number::from(value))
                }
            }
        )*
    };
}

scalar_from_int!(i32, i64, u32, u64);

impl From<&str> for Scalar {
    fn from(value: &str) -> Self {
        Self::Text(value.to_string())
    }
}

impl From<String> for Scalar {
    fn from(value: String) -> Self {
        Self::Text(value)
    }
}

/// Open mapping from field name to scalar value, kept in key order so that
/// serialization is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct QueryState(BTreeMap<String, Scalar>);

impl QueryState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&Scalar> {
        self.0.get(key)
    }

    pub fn get_i64(&self, key: &str) -> Option<i64> {
        self.get(key).and_then(Scalar::as_i64)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(Scalar::as_str)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Scalar)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Option<Scalar> {
        self.0.insert(key.into(), value.into())
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Scalar>) -> Self {
        self.insert(key, value);
        self
    }

    /// Shallow merge: every field of `partial` overrides the same field here.
    pub fn merged(&self, partial: &QueryState) -> QueryState {
        let mut next = self.clone();
        for (key, value) in &partial.0 {
            next.0.insert(key.clone(), value.clone());
        }
        next
    }

    /// Copy with the named fields deleted. Names that are not present are ignored.
    pub fn without<I, S>(&self, keys: I) -> QueryState
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut next = self.clone();
        for key in keys {
            next.0.remove(key.as_ref());
        }
        next
    }
}

impl<K, V> FromIterator<(K, V)> for QueryState
where
    K: Into<String>,
    V: Into<Scalar>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

pub const FLYOUT_FIELD: &str = "flyout";
pub const PAGE_FIELD: &str = "page";
/// The flyout flag travels as a string-typed boolean.
pub const FLYOUT_OPEN: &str = "true";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FilterKey {
    Color,
    Size,
    Brand,
}

impl FilterKey {
    pub const ALL: [FilterKey; 3] = [FilterKey::Color, FilterKey::Size, FilterKey::Brand];

    pub fn field(self) -> &'static str {
        match self {
            Self::Color => "color",
            Self::Size => "size",
            Self::Brand => "brand",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::Color => "Color",
            Self::Size => "Size",
            Self::Brand => "Brand",
        }
    }

    pub fn sample_value(self) -> &'static str {
        match self {
            Self::Color => "Blue",
            Self::Size => "M",
            Self::Brand => "Acme",
        }
    }

    pub fn from_field(field: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|key| key.field() == field)
    }
}

/// Typed view of the demo page's state, used where the page renders on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageQuery {
    #[serde(default = "PageQuery::first_page")]
    pub page: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub flyout: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: Self::first_page(),
            flyout: None,
            color: None,
            size: None,
            brand: None,
        }
    }
}

impl PageQuery {
    fn first_page() -> i64 {
        1
    }

    pub fn flyout_open(&self) -> bool {
        self.flyout.as_deref() == Some(FLYOUT_OPEN)
    }

    pub fn filter(&self, key: FilterKey) -> Option<&str> {
        match key {
            FilterKey::Color => self.color.as_deref(),
            FilterKey::Size => self.size.as_deref(),
            FilterKey::Brand => self.brand.as_deref(),
        }
    }

    /// Lenient display view of an open state. Fields of the wrong type read as
    /// absent, and `page` falls back to the first page.
    pub fn from_state(state: &QueryState) -> Self {
        let text = |field: &str| state.get_str(field).map(str::to_string);
        Self {
            page: state.get_i64(PAGE_FIELD).unwrap_or_else(Self::first_page),
            flyout: text(FLYOUT_FIELD),
            color: text(FilterKey::Color.field()),
            size: text(FilterKey::Size.field()),
            brand: text(FilterKey::Brand.field()),
        }
    }

    pub fn to_state(&self) -> QueryState {
        let mut state = QueryState::new().with(PAGE_FIELD, self.page);
        if let Some(flyout) = &self.flyout {
            state.insert(FLYOUT_FIELD, flyout.as_str());
        }
        for key in FilterKey::ALL {
            if let Some(value) = self.filter(key) {
                state.insert(key.field(), value);
            }
        }
        state
    }
}

/// State used by the demo page whenever the URL carries no usable token.
pub fn default_query_state() -> QueryState {
    PageQuery::default().to_state()
}
