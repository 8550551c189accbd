use crate::amf::amf0::{markers, Amf0Value};
use crate::{ByteBuffer, Error, Result};
use std::collections::HashMap;

/// Decode an entire AMF0 payload into the ordered value sequence it carries.
/// A short read inside any value reports the index of that value.
pub fn decode_all(data: &[u8]) -> Result<Vec<Amf0Value>> {
    let mut buffer = ByteBuffer::new(data.to_vec());
    let mut decoder = Amf0Decoder::new(&mut buffer);
    let mut values = Vec::new();
    while decoder.has_remaining() {
        values.push(decoder.decode_next()?);
    }
    Ok(values)
}

pub struct Amf0Decoder<'a> {
    buffer: &'a mut ByteBuffer,
    /// Index of the top-level value currently being decoded.
    index: usize,
}

impl<'a> Amf0Decoder<'a> {
    pub fn new(buffer: &'a mut ByteBuffer) -> Self {
        Amf0Decoder { buffer, index: 0 }
    }

    /// Check if the decoder has remaining data
    pub fn has_remaining(&self) -> bool {
        self.buffer.remaining() > 0
    }

    /// Decode the next top-level value
    pub fn decode_next(&mut self) -> Result<Amf0Value> {
        let value = self.decode_value()?;
        self.index += 1;
        Ok(value)
    }

    fn decode_value(&mut self) -> Result<Amf0Value> {
        let marker = self.read_u8()?;
        match marker {
            markers::NUMBER => self.decode_number(),
            markers::BOOLEAN => self.decode_boolean(),
            markers::STRING => self.decode_string(),
            markers::OBJECT => self.decode_object().map(Amf0Value::Object),
            markers::NULL => Ok(Amf0Value::Null),
            markers::UNDEFINED => Ok(Amf0Value::Undefined),
            markers::ECMA_ARRAY => self.decode_ecma_array(),
            markers::STRICT_ARRAY => self.decode_strict_array(),
            markers::LONG_STRING => self.decode_long_string(),
            markers::MOVIE_CLIP
            | markers::REFERENCE
            | markers::DATE
            | markers::UNSUPPORTED
            | markers::RECORDSET
            | markers::XML_DOCUMENT
            | markers::TYPED_OBJECT
            | markers::AVMPLUS_OBJECT => Err(Error::unsupported(format!(
                "amf0 marker 0x{:02x} at value {}",
                marker, self.index
            ))),
            _ => Err(Error::amf_decode(
                self.index,
                format!("unknown amf0 marker 0x{:02x}", marker),
            )),
        }
    }

    fn decode_number(&mut self) -> Result<Amf0Value> {
        let value = self.read_f64()?;
        Ok(Amf0Value::Number(value))
    }

    fn decode_boolean(&mut self) -> Result<Amf0Value> {
        let value = self.read_u8()? != 0;
        Ok(Amf0Value::Boolean(value))
    }

    fn decode_string(&mut self) -> Result<Amf0Value> {
        let len = self.read_u16()? as usize;
        self.read_utf8(len).map(Amf0Value::String)
    }

    fn decode_long_string(&mut self) -> Result<Amf0Value> {
        let len = self.read_u32()? as usize;
        self.read_utf8(len).map(Amf0Value::String)
    }

    fn decode_object(&mut self) -> Result<HashMap<String, Amf0Value>> {
        let mut object = HashMap::new();
        loop {
            let name_len = self.read_u16()? as usize;
            if name_len == 0 {
                // terminator is 00 00 09
                let end = self.read_u8()?;
                if end != markers::OBJECT_END {
                    return Err(Error::amf_decode(
                        self.index,
                        format!("bad object end marker 0x{:02x}", end),
                    ));
                }
                break;
            }
            let name = self.read_utf8(name_len)?;
            let value = self.decode_value()?;
            object.insert(name, value);
        }
        Ok(object)
    }

    fn decode_ecma_array(&mut self) -> Result<Amf0Value> {
        // size hint is approximate; the terminator is authoritative
        let _count = self.read_u32()?;
        self.decode_object().map(Amf0Value::EcmaArray)
    }

    fn decode_strict_array(&mut self) -> Result<Amf0Value> {
        let count = self.read_u32()? as usize;
        let mut array = Vec::with_capacity(count.min(1024));
        for _ in 0..count {
            array.push(self.decode_value()?);
        }
        Ok(Amf0Value::StrictArray(array))
    }

    fn read_utf8(&mut self, len: usize) -> Result<String> {
        let bytes = self
            .buffer
            .read_bytes(len)
            .map_err(|e| Error::amf_decode(self.index, e.to_string()))?;
        String::from_utf8(bytes)
            .map_err(|e| Error::amf_decode(self.index, format!("invalid utf-8: {}", e)))
    }

    fn read_u8(&mut self) -> Result<u8> {
        self.buffer
            .read_u8()
            .map_err(|e| Error::amf_decode(self.index, e.to_string()))
    }

    fn read_u16(&mut self) -> Result<u16> {
        self.buffer
            .read_u16_be()
            .map_err(|e| Error::amf_decode(self.index, e.to_string()))
    }

    fn read_u32(&mut self) -> Result<u32> {
        self.buffer
            .read_u32_be()
            .map_err(|e| Error::amf_decode(self.index, e.to_string()))
    }

    fn read_f64(&mut self) -> Result<f64> {
        self.buffer
            .read_f64_be()
            .map_err(|e| Error::amf_decode(self.index, e.to_string()))
    }
}
