//! Submitted form fields
//!
//! Fields arrive from the URL query string and from an
//! `application/x-www-form-urlencoded` body. Body fields come first, so a
//! single-value lookup prefers the body over the query string.

/// Ordered multi-map of submitted form fields
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormFields {
    pairs: Vec<(String, String)>,
}

impl FormFields {
    /// Create an empty field set
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a field set from body pairs followed by query pairs
    pub fn from_parts(body: Vec<(String, String)>, query: Vec<(String, String)>) -> Self {
        let mut pairs = body;
        pairs.extend(query);
        Self { pairs }
    }

    /// Append a field
    pub fn push(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.pairs.push((name.into(), value.into()));
    }

    /// First value submitted for `name`
    pub fn get(&self, name: &str) -> Option<&str> {
        self.pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, value)| value.as_str())
    }

    /// First value for `name`, or `None` when absent or empty
    pub fn non_empty(&self, name: &str) -> Option<&str> {
        self.get(name).filter(|value| !value.is_empty())
    }

    /// Iterate over all fields in submission order
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for FormFields {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self {
            pairs: iter
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_body_takes_precedence_over_query() {
        let fields = FormFields::from_parts(
            vec![("url".into(), "http://body.example".into())],
            vec![("url".into(), "http://query.example".into())],
        );
        assert_eq!(fields.get("url"), Some("http://body.example"));
        assert_eq!(fields.len(), 2);
    }

    #[test]
    fn test_non_empty_filters_blank_values() {
        let fields: FormFields = [("html", ""), ("url", "http://example.com")]
            .into_iter()
            .collect();
        assert_eq!(fields.non_empty("html"), None);
        assert_eq!(fields.get("html"), Some(""));
        assert_eq!(fields.non_empty("url"), Some("http://example.com"));
        assert_eq!(fields.non_empty("missing"), None);
    }

    #[test]
    fn test_push_and_iter() {
        let mut fields = FormFields::new();
        assert!(fields.is_empty());
        fields.push("options[grayscale]", "");
        fields.push("url", "http://example.com");
        let names: Vec<_> = fields.iter().map(|(k, _)| k).collect();
        assert_eq!(names, vec!["options[grayscale]", "url"]);
    }
}
