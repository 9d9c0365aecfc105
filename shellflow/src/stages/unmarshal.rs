//! Decoding stage.

use super::{BoxStage, Captured, Stage};
use crate::context::RunContext;
use crate::errors::{ParseError, Result};
use crate::parser::{Decoder, FieldTags, Parser};
use crate::value::Value;
use async_trait::async_trait;
use serde::de::DeserializeOwned;

type DecodeFn<T> = fn(&Decoder, serde_json::Value) -> std::result::Result<T, ParseError>;

struct UnmarshalStage<P, T> {
    parser: P,
    slot: Captured<T>,
    decode: DecodeFn<T>,
}

#[async_trait]
impl<P, T> Stage for UnmarshalStage<P, T>
where
    P: Parser + 'static,
    T: Send + 'static,
{
    fn name(&self) -> &str {
        "unmarshal"
    }

    async fn handle(&self, ctx: &mut RunContext, input: Value) -> Result<Value> {
        let bytes = input.into_bytes().await?;
        ctx.tracer().trace(
            "unmarshal",
            &[self.parser.tag().to_string(), std::any::type_name::<T>().to_string()],
        );

        let generic = self.parser.parse(&bytes)?;
        let decoded = (self.decode)(&Decoder::new(self.parser.tag()), generic.clone())?;
        self.slot.set(decoded);
        Ok(Value::Structured(generic))
    }
}

/// Parses the input with `parser` and decodes it into `slot`.
///
/// The typed result lands in the slot; the generic parsed value continues
/// down the chain as [`Value::Structured`].
pub fn unmarshal<P, T>(parser: P, slot: Captured<T>) -> BoxStage
where
    P: Parser + 'static,
    T: DeserializeOwned + Send + 'static,
{
    Box::new(UnmarshalStage {
        parser,
        slot,
        decode: Decoder::decode::<T>,
    })
}

/// Like [`unmarshal`], renaming keys with `T`'s [`FieldTags`] first.
pub fn unmarshal_tagged<P, T>(parser: P, slot: Captured<T>) -> BoxStage
where
    P: Parser + 'static,
    T: DeserializeOwned + FieldTags + Send + 'static,
{
    Box::new(UnmarshalStage {
        parser,
        slot,
        decode: Decoder::decode_tagged::<T>,
    })
}
