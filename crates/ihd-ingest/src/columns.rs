//! Case-insensitive column access on string frames.

use std::collections::HashMap;

use polars::prelude::*;

use crate::error::Result;

/// Maps configured column names to the names actually present in a frame.
#[derive(Debug, Clone)]
pub struct ColumnLookup {
    map: HashMap<String, String>,
}

impl ColumnLookup {
    pub fn new<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut map = HashMap::new();
        for name in names {
            let name = name.as_ref();
            let key = name.trim().to_ascii_lowercase();
            map.entry(key).or_insert_with(|| name.to_string());
        }
        Self { map }
    }

    pub fn for_frame(df: &DataFrame) -> Self {
        Self::new(df.get_column_names().iter().map(|name| name.as_str()))
    }

    pub fn get(&self, name: &str) -> Option<&str> {
        self.map
            .get(&name.trim().to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }
}

/// Fetch a column by case-insensitive name as strings.
///
/// Returns `Ok(None)` when the column is absent. Non-string columns are
/// cast, so frames built outside the CSV reader work too.
pub fn string_column(df: &DataFrame, name: &str) -> Result<Option<StringChunked>> {
    let lookup = ColumnLookup::for_frame(df);
    let Some(actual) = lookup.get(name) else {
        return Ok(None);
    };
    let column = df.column(actual)?;
    let values = if column.dtype() == &DataType::String {
        column.str()?.clone()
    } else {
        column.cast(&DataType::String)?.str()?.clone()
    };
    Ok(Some(values))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_ignores_case_and_padding() {
        let lookup = ColumnLookup::new(["Patient_ID", "index_date"]);
        assert_eq!(lookup.get("patient_id"), Some("Patient_ID"));
        assert_eq!(lookup.get(" INDEX_DATE "), Some("index_date"));
        assert!(!lookup.contains("age"));
    }

    #[test]
    fn string_column_casts_numbers() {
        let df = DataFrame::new(vec![
            Series::new("Age".into(), vec![61i64, 74]).into_column(),
        ])
        .unwrap();
        let ages = string_column(&df, "age").unwrap().unwrap();
        assert_eq!(ages.get(1), Some("74"));
        assert!(string_column(&df, "gender").unwrap().is_none());
    }
}
