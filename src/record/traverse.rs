//! Field lookup along a `/`-separated path.

use super::{Record, Value};
use crate::error::{Error, Result};

impl Record {
    /// Resolve `field_path` (e.g. `"living_room/temp"`) against this record.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidPath`] if a leaf is reached before the path ends.
    /// - [`Error::NotFound`] if a segment names a missing key.
    pub fn field(&self, field_path: &str) -> Result<&Value> {
        let mut segments = field_path.split('/');
        // split always yields at least one segment
        let first = segments.next().unwrap_or_default();
        let mut value = self
            .fields
            .get(first)
            .ok_or_else(|| Error::field_not_found(field_path))?;

        for segment in segments {
            let Value::Node(fields) = value else {
                return Err(Error::invalid_path(field_path));
            };
            value = fields
                .get(segment)
                .ok_or_else(|| Error::field_not_found(field_path))?;
        }

        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> Record {
        Record::from_json(br#"{"a":"scalar","n":{"m":{"leaf":"deep"}},"t":"x"}"#).unwrap()
    }

    #[test]
    fn test_top_level_field() {
        assert_eq!(record().field("a").unwrap(), &Value::from("scalar"));
    }

    #[test]
    fn test_nested_field() {
        assert_eq!(record().field("n/m/leaf").unwrap(), &Value::from("deep"));
        assert!(record().field("n/m").unwrap().as_node().is_some());
    }

    #[test]
    fn test_missing_field_is_not_found() {
        assert!(matches!(record().field("missing"), Err(Error::NotFound(_))));
        assert!(matches!(record().field("n/nope"), Err(Error::NotFound(_))));
        assert!(matches!(record().field(""), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_leaf_in_the_way_is_invalid_path() {
        assert!(matches!(
            record().field("a/invalid"),
            Err(Error::InvalidPath { .. })
        ));
        assert!(matches!(
            record().field("n/m/leaf/more"),
            Err(Error::InvalidPath { .. })
        ));
    }
}
