use crate::amf::{decode_all, encode_all, field_string, Amf0Value};
use crate::protocol::constants::*;
use crate::protocol::message::Messager;
use crate::{Error, Result};
use std::collections::HashMap;

/// An AMF0 command message: name, transaction id, then whatever values the
/// command carries (command object, arguments, info objects).
#[derive(Debug, Clone, PartialEq)]
pub struct CommandMessage {
    pub name: String,
    pub transaction_id: f64,
    pub values: Vec<Amf0Value>,
}

impl CommandMessage {
    pub fn new(name: impl Into<String>, transaction_id: f64, values: Vec<Amf0Value>) -> Self {
        CommandMessage {
            name: name.into(),
            transaction_id,
            values,
        }
    }

    /// `_result` response with the server-properties and info objects the
    /// connect flow sends.
    pub fn connect_result(transaction_id: f64, info: Amf0Value) -> Self {
        let mut props = HashMap::new();
        props.insert("fmsVer".to_string(), Amf0Value::String("FMS/3,0,1,123".into()));
        props.insert("capabilities".to_string(), Amf0Value::Number(15.0));

        CommandMessage::new(
            RSP_RESULT,
            transaction_id,
            vec![Amf0Value::Object(props), info],
        )
    }

    /// `onStatus` with the standard level/code/description info object.
    pub fn on_status(level: &str, code: &str, description: &str) -> Self {
        CommandMessage::new(
            RSP_ON_STATUS,
            0.0,
            vec![Amf0Value::Null, status_info(level, code, description)],
        )
    }

    /// Decode a command payload. The payload must start with a string name
    /// and a number transaction id.
    pub fn decode(payload: &[u8]) -> Result<Self> {
        let mut values = decode_all(payload)?.into_iter();

        let name = match values.next() {
            Some(Amf0Value::String(s)) => s,
            _ => return Err(Error::amf_decode(0, "command name must be a string")),
        };
        let transaction_id = match values.next() {
            Some(Amf0Value::Number(n)) => n,
            _ => return Err(Error::amf_decode(1, "transaction id must be a number")),
        };

        Ok(CommandMessage {
            name,
            transaction_id,
            values: values.collect(),
        })
    }
}

impl Messager for CommandMessage {
    fn type_id(&self) -> u8 {
        MSG_TYPE_COMMAND_AMF0
    }

    fn timestamp(&self) -> u32 {
        0
    }

    fn marshal(&self) -> Result<Vec<u8>> {
        let mut sequence = Vec::with_capacity(2 + self.values.len());
        sequence.push(Amf0Value::String(self.name.clone()));
        sequence.push(Amf0Value::Number(self.transaction_id));
        sequence.extend(self.values.iter().cloned());
        encode_all(&sequence)
    }
}

/// level/code/description object used by `_result` and `onStatus`
pub fn status_info(level: &str, code: &str, description: &str) -> Amf0Value {
    let mut info = HashMap::new();
    info.insert("level".to_string(), Amf0Value::String(level.into()));
    info.insert("code".to_string(), Amf0Value::String(code.into()));
    info.insert("description".to_string(), Amf0Value::String(description.into()));
    Amf0Value::Object(info)
}

/// The connect command object, bound from its AMF0 form.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConnectArgs {
    pub app: String,
    pub flashver: String,
    pub swf_url: String,
    pub tc_url: String,
}

impl ConnectArgs {
    pub fn from_value(value: &Amf0Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| Error::protocol("connect command object missing"))?;

        Ok(ConnectArgs {
            app: field_string(obj, "app").unwrap_or_default(),
            flashver: field_string(obj, "flashver").unwrap_or_default(),
            swf_url: field_string(obj, "swfUrl").unwrap_or_default(),
            tc_url: field_string(obj, "tcUrl").unwrap_or_default(),
        })
    }
}
