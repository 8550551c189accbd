use crate::amf::amf0::{markers, Amf0Value};
use crate::{ByteBuffer, Error, Result};
use std::collections::HashMap;

/// Encode a value sequence into one AMF0 payload.
pub fn encode_all(values: &[Amf0Value]) -> Result<Vec<u8>> {
    let mut encoder = Amf0Encoder::new();
    for value in values {
        encoder.encode(value)?;
    }
    Ok(encoder.into_bytes())
}

pub struct Amf0Encoder {
    buffer: ByteBuffer,
}

impl Amf0Encoder {
    pub fn new() -> Self {
        Amf0Encoder {
            buffer: ByteBuffer::with_capacity(256),
        }
    }

    pub fn encode(&mut self, value: &Amf0Value) -> Result<()> {
        match value {
            Amf0Value::Number(n) => self.encode_number(*n),
            Amf0Value::Boolean(b) => self.encode_boolean(*b),
            Amf0Value::String(s) => self.encode_string(s),
            Amf0Value::Object(obj) => self.encode_object(obj),
            Amf0Value::Null => self.put_marker(markers::NULL),
            Amf0Value::Undefined => self.put_marker(markers::UNDEFINED),
            Amf0Value::EcmaArray(obj) => self.encode_ecma_array(obj),
            Amf0Value::StrictArray(arr) => self.encode_strict_array(arr),
        }
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer.into_vec()
    }

    fn put_marker(&mut self, marker: u8) -> Result<()> {
        self.buffer.write_u8(marker)?;
        Ok(())
    }

    fn encode_number(&mut self, value: f64) -> Result<()> {
        self.put_marker(markers::NUMBER)?;
        self.buffer.write_f64_be(value)?;
        Ok(())
    }

    fn encode_boolean(&mut self, value: bool) -> Result<()> {
        self.put_marker(markers::BOOLEAN)?;
        self.buffer.write_u8(if value { 1 } else { 0 })?;
        Ok(())
    }

    /// Strings at or below 65535 bytes use the short form, longer ones the
    /// long-string marker with a 32-bit length.
    fn encode_string(&mut self, value: &str) -> Result<()> {
        let bytes = value.as_bytes();
        if bytes.len() <= u16::MAX as usize {
            self.put_marker(markers::STRING)?;
            self.buffer.write_u16_be(bytes.len() as u16)?;
        } else if bytes.len() <= u32::MAX as usize {
            self.put_marker(markers::LONG_STRING)?;
            self.buffer.write_u32_be(bytes.len() as u32)?;
        } else {
            return Err(Error::amf_encode("string exceeds u32 length"));
        }
        self.buffer.write_bytes(bytes)?;
        Ok(())
    }

    fn encode_properties(&mut self, obj: &HashMap<String, Amf0Value>) -> Result<()> {
        for (key, value) in obj {
            self.write_key(key)?;
            self.encode(value)?;
        }
        // terminator 00 00 09
        self.buffer.write_u16_be(0)?;
        self.buffer.write_u8(markers::OBJECT_END)?;
        Ok(())
    }

    fn encode_object(&mut self, obj: &HashMap<String, Amf0Value>) -> Result<()> {
        self.put_marker(markers::OBJECT)?;
        self.encode_properties(obj)
    }

    fn encode_ecma_array(&mut self, obj: &HashMap<String, Amf0Value>) -> Result<()> {
        self.put_marker(markers::ECMA_ARRAY)?;
        self.buffer.write_u32_be(obj.len() as u32)?;
        self.encode_properties(obj)
    }

    fn encode_strict_array(&mut self, arr: &[Amf0Value]) -> Result<()> {
        self.put_marker(markers::STRICT_ARRAY)?;
        self.buffer.write_u32_be(arr.len() as u32)?;
        for value in arr {
            self.encode(value)?;
        }
        Ok(())
    }

    /// Object keys carry no type marker, just a u16 length
    fn write_key(&mut self, key: &str) -> Result<()> {
        let bytes = key.as_bytes();
        if bytes.len() > u16::MAX as usize {
            return Err(Error::amf_encode("object key exceeds u16 length"));
        }
        self.buffer.write_u16_be(bytes.len() as u16)?;
        self.buffer.write_bytes(bytes)?;
        Ok(())
    }
}

impl Default for Amf0Encoder {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::amf::decoder::decode_all;

    fn round_trip(values: Vec<Amf0Value>) {
        let bytes = encode_all(&values).unwrap();
        let decoded = decode_all(&bytes).unwrap();
        assert_eq!(values, decoded);
    }

    #[test]
    fn test_round_trip_scalars() {
        round_trip(vec![
            Amf0Value::Number(0.0),
            Amf0Value::Number(-12.75),
            Amf0Value::Boolean(true),
            Amf0Value::Boolean(false),
            Amf0Value::String("".into()),
            Amf0Value::String("mystream".into()),
            Amf0Value::Null,
            Amf0Value::Undefined,
        ]);
    }

    #[test]
    fn test_round_trip_object() {
        let mut obj = HashMap::new();
        obj.insert("app".to_string(), Amf0Value::String("live".into()));
        obj.insert("capabilities".to_string(), Amf0Value::Number(15.0));
        obj.insert("secure".to_string(), Amf0Value::Boolean(false));
        round_trip(vec![Amf0Value::Object(obj)]);
    }

    #[test]
    fn test_round_trip_ecma_and_strict_arrays() {
        let mut map = HashMap::new();
        map.insert("duration".to_string(), Amf0Value::Number(0.0));
        map.insert("encoder".to_string(), Amf0Value::String("obs".into()));
        round_trip(vec![
            Amf0Value::EcmaArray(map),
            Amf0Value::StrictArray(vec![
                Amf0Value::Number(1.0),
                Amf0Value::String("two".into()),
                Amf0Value::Null,
            ]),
        ]);
    }

    #[test]
    fn test_number_wire_format() {
        // numbers are marker + IEEE-754 big endian
        let bytes = encode_all(&[Amf0Value::Number(1.0)]).unwrap();
        assert_eq!(bytes, vec![0x00, 0x3F, 0xF0, 0, 0, 0, 0, 0, 0]);
    }

    #[test]
    fn test_empty_object_terminator() {
        let bytes = encode_all(&[Amf0Value::Object(HashMap::new())]).unwrap();
        assert_eq!(bytes, vec![markers::OBJECT, 0x00, 0x00, 0x09]);
    }
}
