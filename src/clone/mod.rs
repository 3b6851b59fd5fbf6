//! Structured clone codec.
//!
//! Record values in the backing store are JavaScript values serialized in
//! two layers: V8's structured clone format for plain values and Blink's
//! format for DOM objects (blobs, files, images, geometry) embedded in it.
//!
//! - [`deserializer`] and [`serializer`] implement the V8 layer.
//! - [`host`] implements the Blink DOM objects, plugged in through a
//!   [`CloneDelegate`](delegate::CloneDelegate).
//! - [`blink`] handles the Blink envelope and byte-swapped payloads, and
//!   is what record values should be decoded with.

pub mod blink;
pub mod delegate;
pub mod deserializer;
pub mod host;
pub mod serializer;
pub mod tags;
pub mod value;
pub mod version;

pub use blink::{decode_ssv, encode_ssv, DecodedValue};
pub use value::{JsString, ObjectId, Value};
