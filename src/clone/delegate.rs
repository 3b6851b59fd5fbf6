//! Hooks for objects the V8 layer cannot decode on its own.
//!
//! Host objects (Blink DOM types), shared array buffers, transferred array
//! buffers and transferred Wasm modules all refer to state outside the
//! payload. The deserializer and serializer call out to a [`CloneDelegate`]
//! for these. Every method has a default that rejects the object, so a
//! delegate only implements what it supports.

use crate::clone::host::HostObject;
use crate::clone::version::FormatGates;
use crate::indexeddb::coding::Reader;
use crate::IdbError;

pub trait CloneDelegate {
    /// Decode a host object. The reader is positioned just after the host
    /// object tag, or at the unknown tag itself for payloads older than
    /// [`FormatGates::explicit_host_object_tag`].
    fn read_host_object(
        &mut self,
        reader: &mut Reader<'_>,
        gates: &FormatGates,
    ) -> Result<HostObject, IdbError> {
        let _ = gates;
        Err(IdbError::MalformedTag {
            tag: reader.peek_u8().unwrap_or(0),
            offset: reader.position(),
            context: "host object without a delegate",
        })
    }

    /// Encode a host object's body (everything after the host object tag).
    fn write_host_object(
        &mut self,
        object: &HostObject,
        out: &mut Vec<u8>,
        gates: &FormatGates,
    ) -> Result<(), IdbError> {
        let _ = (out, gates);
        Err(IdbError::Argument(format!(
            "cannot serialize host object {} without a delegate",
            object.kind()
        )))
    }

    /// Contents of the shared array buffer with the given clone id.
    fn shared_array_buffer(&mut self, clone_id: u32) -> Result<Vec<u8>, IdbError> {
        Err(IdbError::UnresolvedReference {
            kind: "shared array buffer",
            id: u64::from(clone_id),
        })
    }

    /// Contents of the array buffer at `transfer_id` in the transfer list.
    fn transferred_array_buffer(&mut self, transfer_id: u32) -> Result<Vec<u8>, IdbError> {
        Err(IdbError::UnresolvedReference {
            kind: "transferred array buffer",
            id: u64::from(transfer_id),
        })
    }

    /// Wire bytes and compiled bytes of a transferred Wasm module.
    fn wasm_module(&mut self, transfer_id: u32) -> Result<(Vec<u8>, Vec<u8>), IdbError> {
        Err(IdbError::UnresolvedReference {
            kind: "wasm module",
            id: u64::from(transfer_id),
        })
    }
}

/// Delegate that supports nothing beyond plain V8 values.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoDelegate;

impl CloneDelegate for NoDelegate {}
