use serde_json::{Map, Value, json};

use crate::error::RpcError;

/// Transformer
///
/// The serialization wrapper applied to every input, result and error shape on
/// the wire. `Envelope` speaks the superjson layout (`{ "json": <value> }`) used by
/// TypeScript clients configured with a rich-type transformer; Rust values are
/// already plain JSON after serde, so no `meta` block is emitted.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Transformer {
    #[default]
    Identity,
    Envelope,
}

impl Transformer {
    pub fn serialize(&self, value: Value) -> Value {
        match self {
            Transformer::Identity => value,
            Transformer::Envelope => json!({ "json": value }),
        }
    }

    /// Unwraps a client input. A missing input (`null`) stays `null`.
    pub fn deserialize(&self, value: Value) -> Result<Value, RpcError> {
        match (self, value) {
            (Transformer::Identity, value) => Ok(value),
            (Transformer::Envelope, Value::Null) => Ok(Value::Null),
            (Transformer::Envelope, Value::Object(mut map)) if map.contains_key("json") => {
                Ok(take_json(&mut map))
            }
            (Transformer::Envelope, _) => Err(RpcError::bad_request(
                "Input is not wrapped in a transformer envelope",
            )),
        }
    }
}

fn take_json(map: &mut Map<String, Value>) -> Value {
    map.remove("json").unwrap_or(Value::Null)
}
