//! Format version gates.
//!
//! Both layers of a record value carry a version: the V8 serializer version
//! and the Blink wire version. Behavior that changed between versions is
//! decided once per decode from the table below instead of being re-checked
//! ad hoc in every reader.

use serde::Serialize;

/// Newest V8 serializer version this crate reads and writes by default.
pub const LATEST_V8_VERSION: u32 = 15;
/// Newest Blink wire format version this crate reads and writes by default.
pub const LATEST_WIRE_VERSION: u32 = 21;
/// Blink versions from here on carry their own envelope ahead of the V8 header.
pub const MIN_VERSION_FOR_SEPARATE_ENVELOPE: u32 = 16;

/// V8 version thresholds.
pub const V8_HOLE_TAG_VERSION: u32 = 11;
pub const V8_STRING_OBJECT_PAYLOAD_VERSION: u32 = 12;
pub const V8_HOST_OBJECT_TAG_VERSION: u32 = 13;
pub const V8_VIEW_FLAGS_VERSION: u32 = 14;

/// Blink wire version thresholds.
pub const WIRE_BLOB_VERSION: u32 = 3;
pub const WIRE_FILE_NAME_VERSION: u32 = 4;
pub const WIRE_BLOB_INDEX_VERSION: u32 = 6;
pub const WIRE_FILE_VISIBILITY_VERSION: u32 = 7;
pub const WIRE_FILE_MILLIS_VERSION: u32 = 8;
pub const WIRE_IMAGE_TAG_LIST_VERSION: u32 = 18;
pub const WIRE_TRAILER_OFFSET_VERSION: u32 = 21;

/// Version-dependent behavior of one decode or encode call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FormatGates {
    pub v8_version: u32,
    pub wire_version: u32,
    /// Version 0 payloads carry no header and use the whole-buffer stack layout.
    pub legacy_whole_buffer: bool,
    /// `undefined` in a dense array is a real element, not a hole.
    pub distinguishes_hole: bool,
    /// String objects and regexp sources are full string values, not raw UTF-8.
    pub string_payload_is_object: bool,
    /// Host objects are introduced by an explicit tag; older payloads hand
    /// every unknown tag to the host.
    pub explicit_host_object_tag: bool,
    /// Array buffer views carry a trailing flags varint.
    pub view_flags: bool,
    pub blob_objects: bool,
    pub file_names: bool,
    pub blob_indices: bool,
    pub file_visibility: bool,
    /// File modification times are stored in milliseconds rather than seconds.
    pub file_millis: bool,
    pub image_tag_lists: bool,
    pub trailer_offset: bool,
}

impl FormatGates {
    pub fn new(v8_version: u32, wire_version: u32) -> Self {
        FormatGates {
            v8_version,
            wire_version,
            legacy_whole_buffer: v8_version == 0,
            distinguishes_hole: v8_version >= V8_HOLE_TAG_VERSION,
            string_payload_is_object: v8_version >= V8_STRING_OBJECT_PAYLOAD_VERSION,
            explicit_host_object_tag: v8_version >= V8_HOST_OBJECT_TAG_VERSION,
            view_flags: v8_version >= V8_VIEW_FLAGS_VERSION,
            blob_objects: wire_version >= WIRE_BLOB_VERSION,
            file_names: wire_version >= WIRE_FILE_NAME_VERSION,
            blob_indices: wire_version >= WIRE_BLOB_INDEX_VERSION,
            file_visibility: wire_version >= WIRE_FILE_VISIBILITY_VERSION,
            file_millis: wire_version >= WIRE_FILE_MILLIS_VERSION,
            image_tag_lists: wire_version >= WIRE_IMAGE_TAG_LIST_VERSION,
            trailer_offset: wire_version >= WIRE_TRAILER_OFFSET_VERSION,
        }
    }

    /// Gates for a bare V8 payload whose wire version equals its V8 version.
    pub fn v8(version: u32) -> Self {
        Self::new(version, version)
    }

    pub fn with_wire_version(self, wire_version: u32) -> Self {
        Self::new(self.v8_version, wire_version)
    }
}

impl Default for FormatGates {
    fn default() -> Self {
        Self::new(LATEST_V8_VERSION, LATEST_WIRE_VERSION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_legacy_gates() {
        let g = FormatGates::v8(0);
        assert!(g.legacy_whole_buffer);
        assert!(!g.distinguishes_hole);
        assert!(!g.explicit_host_object_tag);
        assert!(!g.blob_objects);
    }

    #[test]
    fn test_threshold_boundaries() {
        assert!(!FormatGates::v8(10).distinguishes_hole);
        assert!(FormatGates::v8(11).distinguishes_hole);
        assert!(!FormatGates::v8(11).string_payload_is_object);
        assert!(FormatGates::v8(12).string_payload_is_object);
        assert!(!FormatGates::v8(13).view_flags);
        assert!(FormatGates::v8(14).view_flags);

        let g = FormatGates::new(13, 17);
        assert!(g.file_millis);
        assert!(!g.image_tag_lists);
        assert!(!g.trailer_offset);
        assert!(g.with_wire_version(21).trailer_offset);
    }

    #[test]
    fn test_default_is_latest() {
        let g = FormatGates::default();
        assert_eq!(g.v8_version, LATEST_V8_VERSION);
        assert_eq!(g.wire_version, LATEST_WIRE_VERSION);
        assert!(!g.legacy_whole_buffer);
    }
}
