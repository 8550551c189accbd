use crate::amf::amf0::Amf0Value;
use std::collections::HashMap;

/// Look up an object property: literal key match first, then a
/// case-insensitive fallback. Command objects arrive with whatever casing
/// the encoder felt like (`tcUrl`, `tcurl`, `TcUrl` are all seen in the
/// wild).
pub fn object_field<'a>(
    obj: &'a HashMap<String, Amf0Value>,
    key: &str,
) -> Option<&'a Amf0Value> {
    if let Some(value) = obj.get(key) {
        return Some(value);
    }
    obj.iter()
        .find(|(k, _)| k.eq_ignore_ascii_case(key))
        .map(|(_, v)| v)
}

/// String property, owned
pub fn field_string(obj: &HashMap<String, Amf0Value>, key: &str) -> Option<String> {
    object_field(obj, key)
        .and_then(|v| v.as_str())
        .map(String::from)
}

/// Number property coerced to u32 by truncation; Number is the only numeric
/// representation AMF0 has.
pub fn field_u32(obj: &HashMap<String, Amf0Value>, key: &str) -> Option<u32> {
    object_field(obj, key).and_then(|v| v.as_number()).map(|n| n as u32)
}

/// Boolean property
pub fn field_bool(obj: &HashMap<String, Amf0Value>, key: &str) -> Option<bool> {
    object_field(obj, key).and_then(|v| v.as_boolean())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> HashMap<String, Amf0Value> {
        let mut obj = HashMap::new();
        obj.insert("app".to_string(), Amf0Value::String("live".into()));
        obj.insert("tcUrl".to_string(), Amf0Value::String("rtmp://host/live".into()));
        obj.insert("objectEncoding".to_string(), Amf0Value::Number(3.9));
        obj
    }

    #[test]
    fn test_literal_match() {
        let obj = sample();
        assert_eq!(field_string(&obj, "app").as_deref(), Some("live"));
    }

    #[test]
    fn test_case_insensitive_fallback() {
        let obj = sample();
        assert_eq!(
            field_string(&obj, "tcurl").as_deref(),
            Some("rtmp://host/live")
        );
        assert_eq!(field_string(&obj, "TCURL").as_deref(), Some("rtmp://host/live"));
    }

    #[test]
    fn test_literal_wins_over_case_fold() {
        let mut obj = sample();
        obj.insert("App".to_string(), Amf0Value::String("other".into()));
        // the literal "app" entry takes precedence over the folded "App"
        assert_eq!(field_string(&obj, "app").as_deref(), Some("live"));
    }

    #[test]
    fn test_integer_coercion_truncates() {
        let obj = sample();
        assert_eq!(field_u32(&obj, "objectEncoding"), Some(3));
    }

    #[test]
    fn test_missing_field() {
        let obj = sample();
        assert_eq!(field_string(&obj, "pageUrl"), None);
    }
}
