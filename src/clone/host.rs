//! Blink host objects embedded in V8 payloads.
//!
//! After a host object tag, Blink writes its own one-byte tag followed by
//! the object's fields. Unsigned integers are varints, doubles are 8 bytes in
//! host order and strings are a varint byte length followed by UTF-8.
//!
//! | Tag | Object | Fields |
//! |-----|--------|--------|
//! | `b` | Blob | uuid, type, size |
//! | `i` | Blob (by index) | index |
//! | `f` | File | see [`FileInfo`] |
//! | `e` | File (by index) | index |
//! | `l` | FileList | count, files |
//! | `L` | FileList (by index) | count, indices |
//! | `#` | ImageData | [tags], width, height, pixels |
//! | `g` | ImageBitmap | [tags] or flags, width, height, pixels |
//! | `G` | ImageBitmap transfer | index |
//! | `H` | OffscreenCanvas transfer | width, height, canvas, client, sink |
//! | `M` | MessagePort | index |
//! | `Q` `W` | DOMPoint (read-only) | x, y, z, w |
//! | `E` `R` | DOMRect (read-only) | x, y, width, height |
//! | `T` | DOMQuad | 4 points |
//! | `I` `O` | DOMMatrix 2D (read-only) | 6 doubles |
//! | `Y` `U` | DOMMatrix (read-only) | 16 doubles |

use std::fmt;

use serde::Serialize;

use crate::clone::version::FormatGates;
use crate::indexeddb::coding::{encode_double, encode_varint, Endianness, Reader};
use crate::IdbError;

pub mod dom_tag {
    pub const PADDING: u8 = 0x00;
    pub const BLOB: u8 = b'b';
    pub const BLOB_INDEX: u8 = b'i';
    pub const FILE: u8 = b'f';
    pub const FILE_INDEX: u8 = b'e';
    pub const FILE_LIST: u8 = b'l';
    pub const FILE_LIST_INDEX: u8 = b'L';
    pub const IMAGE_DATA: u8 = b'#';
    pub const IMAGE_BITMAP: u8 = b'g';
    pub const IMAGE_BITMAP_TRANSFER: u8 = b'G';
    pub const OFFSCREEN_CANVAS_TRANSFER: u8 = b'H';
    pub const MESSAGE_PORT: u8 = b'M';
    pub const DOM_POINT: u8 = b'Q';
    pub const DOM_POINT_READ_ONLY: u8 = b'W';
    pub const DOM_RECT: u8 = b'E';
    pub const DOM_RECT_READ_ONLY: u8 = b'R';
    pub const DOM_QUAD: u8 = b'T';
    pub const DOM_MATRIX_2D: u8 = b'I';
    pub const DOM_MATRIX_2D_READ_ONLY: u8 = b'O';
    pub const DOM_MATRIX: u8 = b'Y';
    pub const DOM_MATRIX_READ_ONLY: u8 = b'U';
}

/// Sub-tags of the ImageData / ImageBitmap property lists.
mod image_tag {
    pub const END: u32 = 0;
    pub const COLOR_SPACE: u32 = 1;
    pub const STORAGE_FORMAT: u32 = 3;
    pub const CANVAS_PIXEL_FORMAT: u32 = 2;
    pub const ORIGIN_CLEAN: u32 = 4;
    pub const IS_PREMULTIPLIED: u32 = 5;
    pub const CANVAS_OPACITY_MODE: u32 = 6;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileInfo {
    pub path: String,
    pub name: Option<String>,
    pub relative_path: Option<String>,
    pub uuid: String,
    pub content_type: String,
    /// Size and modification time are only known when a snapshot was taken.
    pub snapshot: Option<FileSnapshot>,
    pub is_user_visible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct FileSnapshot {
    pub size: u64,
    pub last_modified_ms: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageDataInfo {
    pub color_space: u32,
    pub storage_format: u32,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImageBitmapInfo {
    pub color_space: u32,
    pub pixel_format: u32,
    pub opacity_mode: u32,
    pub origin_clean: bool,
    pub premultiplied: bool,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

/// A decoded Blink DOM object.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "fields", rename_all = "snake_case")]
pub enum HostObject {
    Blob {
        uuid: String,
        content_type: String,
        size: u64,
    },
    /// Blob stored outside the value; the index points into the record's blob list.
    BlobIndex {
        index: u32,
    },
    File(FileInfo),
    FileIndex {
        index: u32,
    },
    FileList(Vec<FileInfo>),
    FileListIndex(Vec<u32>),
    ImageData(ImageDataInfo),
    ImageBitmap(ImageBitmapInfo),
    ImageBitmapTransfer {
        index: u32,
    },
    OffscreenCanvasTransfer {
        width: u32,
        height: u32,
        canvas_id: u32,
        client_id: u32,
        sink_id: u64,
    },
    MessagePort {
        index: u32,
    },
    DomPoint {
        read_only: bool,
        x: f64,
        y: f64,
        z: f64,
        w: f64,
    },
    DomRect {
        read_only: bool,
        x: f64,
        y: f64,
        width: f64,
        height: f64,
    },
    DomQuad {
        points: [[f64; 4]; 4],
    },
    /// 6 values for a 2D matrix, 16 otherwise.
    DomMatrix {
        read_only: bool,
        values: Vec<f64>,
    },
}

impl HostObject {
    pub fn kind(&self) -> &'static str {
        match self {
            HostObject::Blob { .. } => "Blob",
            HostObject::BlobIndex { .. } => "BlobIndex",
            HostObject::File(_) => "File",
            HostObject::FileIndex { .. } => "FileIndex",
            HostObject::FileList(_) => "FileList",
            HostObject::FileListIndex(_) => "FileListIndex",
            HostObject::ImageData(_) => "ImageData",
            HostObject::ImageBitmap(_) => "ImageBitmap",
            HostObject::ImageBitmapTransfer { .. } => "ImageBitmapTransfer",
            HostObject::OffscreenCanvasTransfer { .. } => "OffscreenCanvasTransfer",
            HostObject::MessagePort { .. } => "MessagePort",
            HostObject::DomPoint { .. } => "DOMPoint",
            HostObject::DomRect { .. } => "DOMRect",
            HostObject::DomQuad { .. } => "DOMQuad",
            HostObject::DomMatrix { .. } => "DOMMatrix",
        }
    }
}

impl fmt::Display for HostObject {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HostObject::Blob {
                uuid,
                content_type,
                size,
            } => write!(f, "Blob({}, {:?}, {} bytes)", uuid, content_type, size),
            HostObject::BlobIndex { index } => write!(f, "Blob(#{})", index),
            HostObject::File(info) => write!(f, "File({:?})", info.path),
            HostObject::FileIndex { index } => write!(f, "File(#{})", index),
            HostObject::FileList(files) => write!(f, "FileList({} files)", files.len()),
            HostObject::FileListIndex(ix) => write!(f, "FileList({} files)", ix.len()),
            HostObject::ImageData(d) => write!(f, "ImageData({}x{})", d.width, d.height),
            HostObject::ImageBitmap(b) => write!(f, "ImageBitmap({}x{})", b.width, b.height),
            HostObject::ImageBitmapTransfer { index } => write!(f, "ImageBitmap(transfer #{})", index),
            HostObject::OffscreenCanvasTransfer { width, height, .. } => {
                write!(f, "OffscreenCanvas({}x{})", width, height)
            }
            HostObject::MessagePort { index } => write!(f, "MessagePort(#{})", index),
            HostObject::DomPoint { x, y, z, w, .. } => write!(f, "DOMPoint({}, {}, {}, {})", x, y, z, w),
            HostObject::DomRect {
                x,
                y,
                width,
                height,
                ..
            } => write!(f, "DOMRect({}, {}, {}, {})", x, y, width, height),
            HostObject::DomQuad { .. } => write!(f, "DOMQuad"),
            HostObject::DomMatrix { values, .. } => write!(f, "DOMMatrix({:?})", values),
        }
    }
}

fn read_utf8(r: &mut Reader<'_>) -> Result<String, IdbError> {
    let len = r.read_varint_u32()? as usize;
    let bytes = r.read_bytes(len)?;
    Ok(String::from_utf8_lossy(bytes).into_owned())
}

fn read_flag(r: &mut Reader<'_>, what: &str) -> Result<bool, IdbError> {
    let offset = r.position();
    match r.read_varint_u32()? {
        0 => Ok(false),
        1 => Ok(true),
        v => Err(IdbError::Parse(format!(
            "{} flag {} at offset {} is not 0 or 1",
            what, v, offset
        ))),
    }
}

fn read_doubles<const N: usize>(r: &mut Reader<'_>) -> Result<[f64; N], IdbError> {
    let mut out = [0f64; N];
    for v in out.iter_mut() {
        *v = r.read_double()?;
    }
    Ok(out)
}

fn read_pixels(r: &mut Reader<'_>) -> Result<Vec<u8>, IdbError> {
    let len = r.read_varint()?;
    let len = usize::try_from(len).map_err(|_| IdbError::LengthMismatch {
        context: "image pixels",
        declared: len,
        actual: r.remaining() as u64,
    })?;
    Ok(r.read_bytes(len)?.to_vec())
}

fn require(gate: bool, tag: u8, offset: usize, context: &'static str) -> Result<(), IdbError> {
    if gate {
        Ok(())
    } else {
        Err(IdbError::MalformedTag {
            tag,
            offset,
            context,
        })
    }
}

fn read_file(r: &mut Reader<'_>, gates: &FormatGates) -> Result<FileInfo, IdbError> {
    let path = read_utf8(r)?;
    let (name, relative_path) = if gates.file_names {
        (Some(read_utf8(r)?), Some(read_utf8(r)?))
    } else {
        (None, None)
    };
    let uuid = read_utf8(r)?;
    let content_type = read_utf8(r)?;
    let has_snapshot = if gates.file_names {
        r.read_varint_u32()? != 0
    } else {
        false
    };
    let snapshot = if has_snapshot {
        let size = r.read_varint()?;
        let raw = r.read_double()?;
        let last_modified_ms = if gates.file_millis { raw } else { raw * 1000.0 };
        Some(FileSnapshot {
            size,
            last_modified_ms,
        })
    } else {
        None
    };
    let is_user_visible = if gates.file_visibility {
        r.read_varint_u32()? != 0
    } else {
        true
    };
    Ok(FileInfo {
        path,
        name,
        relative_path,
        uuid,
        content_type,
        snapshot,
        is_user_visible,
    })
}

fn read_image_data(r: &mut Reader<'_>, gates: &FormatGates) -> Result<ImageDataInfo, IdbError> {
    let mut color_space = 0;
    let mut storage_format = 0;
    if gates.image_tag_lists {
        loop {
            let offset = r.position();
            match r.read_varint_u32()? {
                image_tag::END => break,
                image_tag::COLOR_SPACE => color_space = r.read_varint_u32()?,
                image_tag::STORAGE_FORMAT => storage_format = r.read_varint_u32()?,
                other => {
                    return Err(IdbError::MalformedTag {
                        tag: other as u8,
                        offset,
                        context: "image data property",
                    })
                }
            }
        }
    }
    let width = r.read_varint_u32()?;
    let height = r.read_varint_u32()?;
    let pixels = read_pixels(r)?;
    Ok(ImageDataInfo {
        color_space,
        storage_format,
        width,
        height,
        pixels,
    })
}

fn read_image_bitmap(r: &mut Reader<'_>, gates: &FormatGates) -> Result<ImageBitmapInfo, IdbError> {
    let mut info = ImageBitmapInfo {
        color_space: 0,
        pixel_format: 0,
        opacity_mode: 0,
        origin_clean: false,
        premultiplied: false,
        width: 0,
        height: 0,
        pixels: Vec::new(),
    };
    if gates.image_tag_lists {
        loop {
            let offset = r.position();
            match r.read_varint_u32()? {
                image_tag::END => break,
                image_tag::COLOR_SPACE => info.color_space = r.read_varint_u32()?,
                image_tag::CANVAS_PIXEL_FORMAT => info.pixel_format = r.read_varint_u32()?,
                image_tag::ORIGIN_CLEAN => info.origin_clean = read_flag(r, "origin clean")?,
                image_tag::IS_PREMULTIPLIED => {
                    info.premultiplied = read_flag(r, "premultiplied")?
                }
                image_tag::CANVAS_OPACITY_MODE => info.opacity_mode = r.read_varint_u32()?,
                other => {
                    return Err(IdbError::MalformedTag {
                        tag: other as u8,
                        offset,
                        context: "image bitmap property",
                    })
                }
            }
        }
    } else {
        info.origin_clean = read_flag(r, "origin clean")?;
        info.premultiplied = read_flag(r, "premultiplied")?;
    }
    info.width = r.read_varint_u32()?;
    info.height = r.read_varint_u32()?;
    info.pixels = read_pixels(r)?;
    Ok(info)
}

/// Decode one Blink DOM object, starting at its Blink tag.
pub fn read_dom_object(r: &mut Reader<'_>, gates: &FormatGates) -> Result<HostObject, IdbError> {
    let mut tag = r.read_u8()?;
    while tag == dom_tag::PADDING {
        tag = r.read_u8()?;
    }
    let offset = r.position() - 1;
    let object = match tag {
        dom_tag::BLOB => {
            require(gates.blob_objects, tag, offset, "blob before wire version 3")?;
            HostObject::Blob {
                uuid: read_utf8(r)?,
                content_type: read_utf8(r)?,
                size: r.read_varint()?,
            }
        }
        dom_tag::BLOB_INDEX => {
            require(gates.blob_indices, tag, offset, "blob index before wire version 6")?;
            HostObject::BlobIndex {
                index: r.read_varint_u32()?,
            }
        }
        dom_tag::FILE => {
            require(gates.blob_objects, tag, offset, "file before wire version 3")?;
            HostObject::File(read_file(r, gates)?)
        }
        dom_tag::FILE_INDEX => {
            require(gates.blob_indices, tag, offset, "file index before wire version 6")?;
            HostObject::FileIndex {
                index: r.read_varint_u32()?,
            }
        }
        dom_tag::FILE_LIST => {
            let count = r.read_varint_u32()?;
            let mut files = Vec::new();
            for _ in 0..count {
                files.push(read_file(r, gates)?);
            }
            HostObject::FileList(files)
        }
        dom_tag::FILE_LIST_INDEX => {
            require(gates.blob_indices, tag, offset, "file list index before wire version 6")?;
            let count = r.read_varint_u32()?;
            let mut indices = Vec::new();
            for _ in 0..count {
                indices.push(r.read_varint_u32()?);
            }
            HostObject::FileListIndex(indices)
        }
        dom_tag::IMAGE_DATA => HostObject::ImageData(read_image_data(r, gates)?),
        dom_tag::IMAGE_BITMAP => HostObject::ImageBitmap(read_image_bitmap(r, gates)?),
        dom_tag::IMAGE_BITMAP_TRANSFER => HostObject::ImageBitmapTransfer {
            index: r.read_varint_u32()?,
        },
        dom_tag::OFFSCREEN_CANVAS_TRANSFER => HostObject::OffscreenCanvasTransfer {
            width: r.read_varint_u32()?,
            height: r.read_varint_u32()?,
            canvas_id: r.read_varint_u32()?,
            client_id: r.read_varint_u32()?,
            sink_id: r.read_varint()?,
        },
        dom_tag::MESSAGE_PORT => HostObject::MessagePort {
            index: r.read_varint_u32()?,
        },
        dom_tag::DOM_POINT | dom_tag::DOM_POINT_READ_ONLY => {
            let [x, y, z, w] = read_doubles::<4>(r)?;
            HostObject::DomPoint {
                read_only: tag == dom_tag::DOM_POINT_READ_ONLY,
                x,
                y,
                z,
                w,
            }
        }
        dom_tag::DOM_RECT | dom_tag::DOM_RECT_READ_ONLY => {
            let [x, y, width, height] = read_doubles::<4>(r)?;
            HostObject::DomRect {
                read_only: tag == dom_tag::DOM_RECT_READ_ONLY,
                x,
                y,
                width,
                height,
            }
        }
        dom_tag::DOM_QUAD => {
            let mut points = [[0f64; 4]; 4];
            for p in points.iter_mut() {
                *p = read_doubles::<4>(r)?;
            }
            HostObject::DomQuad { points }
        }
        dom_tag::DOM_MATRIX_2D | dom_tag::DOM_MATRIX_2D_READ_ONLY => HostObject::DomMatrix {
            read_only: tag == dom_tag::DOM_MATRIX_2D_READ_ONLY,
            values: read_doubles::<6>(r)?.to_vec(),
        },
        dom_tag::DOM_MATRIX | dom_tag::DOM_MATRIX_READ_ONLY => HostObject::DomMatrix {
            read_only: tag == dom_tag::DOM_MATRIX_READ_ONLY,
            values: read_doubles::<16>(r)?.to_vec(),
        },
        _ => {
            return Err(IdbError::MalformedTag {
                tag,
                offset,
                context: "unknown Blink host object",
            })
        }
    };
    Ok(object)
}

fn write_utf8(value: &str, out: &mut Vec<u8>) {
    encode_varint(value.len() as u64, out);
    out.extend_from_slice(value.as_bytes());
}

fn write_file(info: &FileInfo, gates: &FormatGates, order: Endianness, out: &mut Vec<u8>) {
    write_utf8(&info.path, out);
    if gates.file_names {
        write_utf8(info.name.as_deref().unwrap_or(""), out);
        write_utf8(info.relative_path.as_deref().unwrap_or(""), out);
    }
    write_utf8(&info.uuid, out);
    write_utf8(&info.content_type, out);
    if gates.file_names {
        match &info.snapshot {
            Some(s) => {
                encode_varint(1, out);
                encode_varint(s.size, out);
                let raw = if gates.file_millis {
                    s.last_modified_ms
                } else {
                    s.last_modified_ms / 1000.0
                };
                encode_double(raw, order, out);
            }
            None => encode_varint(0, out),
        }
    }
    if gates.file_visibility {
        encode_varint(u64::from(info.is_user_visible), out);
    }
}

/// Encode a Blink DOM object, starting with its Blink tag.
pub fn write_dom_object(
    object: &HostObject,
    gates: &FormatGates,
    order: Endianness,
    out: &mut Vec<u8>,
) -> Result<(), IdbError> {
    let varint = |v: u64, out: &mut Vec<u8>| encode_varint(v, out);
    match object {
        HostObject::Blob {
            uuid,
            content_type,
            size,
        } => {
            out.push(dom_tag::BLOB);
            write_utf8(uuid, out);
            write_utf8(content_type, out);
            varint(*size, out);
        }
        HostObject::BlobIndex { index } => {
            out.push(dom_tag::BLOB_INDEX);
            varint(u64::from(*index), out);
        }
        HostObject::File(info) => {
            out.push(dom_tag::FILE);
            write_file(info, gates, order, out);
        }
        HostObject::FileIndex { index } => {
            out.push(dom_tag::FILE_INDEX);
            varint(u64::from(*index), out);
        }
        HostObject::FileList(files) => {
            out.push(dom_tag::FILE_LIST);
            varint(files.len() as u64, out);
            for f in files {
                write_file(f, gates, order, out);
            }
        }
        HostObject::FileListIndex(indices) => {
            out.push(dom_tag::FILE_LIST_INDEX);
            varint(indices.len() as u64, out);
            for i in indices {
                varint(u64::from(*i), out);
            }
        }
        HostObject::ImageData(d) => {
            out.push(dom_tag::IMAGE_DATA);
            if gates.image_tag_lists {
                varint(u64::from(image_tag::COLOR_SPACE), out);
                varint(u64::from(d.color_space), out);
                varint(u64::from(image_tag::STORAGE_FORMAT), out);
                varint(u64::from(d.storage_format), out);
                varint(u64::from(image_tag::END), out);
            }
            varint(u64::from(d.width), out);
            varint(u64::from(d.height), out);
            varint(d.pixels.len() as u64, out);
            out.extend_from_slice(&d.pixels);
        }
        HostObject::ImageBitmap(b) => {
            out.push(dom_tag::IMAGE_BITMAP);
            if gates.image_tag_lists {
                for (tag, v) in [
                    (image_tag::COLOR_SPACE, b.color_space),
                    (image_tag::CANVAS_PIXEL_FORMAT, b.pixel_format),
                    (image_tag::ORIGIN_CLEAN, u32::from(b.origin_clean)),
                    (image_tag::IS_PREMULTIPLIED, u32::from(b.premultiplied)),
                    (image_tag::CANVAS_OPACITY_MODE, b.opacity_mode),
                ] {
                    varint(u64::from(tag), out);
                    varint(u64::from(v), out);
                }
                varint(u64::from(image_tag::END), out);
            } else {
                varint(u64::from(b.origin_clean), out);
                varint(u64::from(b.premultiplied), out);
            }
            varint(u64::from(b.width), out);
            varint(u64::from(b.height), out);
            varint(b.pixels.len() as u64, out);
            out.extend_from_slice(&b.pixels);
        }
        HostObject::ImageBitmapTransfer { index } => {
            out.push(dom_tag::IMAGE_BITMAP_TRANSFER);
            varint(u64::from(*index), out);
        }
        HostObject::OffscreenCanvasTransfer {
            width,
            height,
            canvas_id,
            client_id,
            sink_id,
        } => {
            out.push(dom_tag::OFFSCREEN_CANVAS_TRANSFER);
            for v in [*width, *height, *canvas_id, *client_id] {
                varint(u64::from(v), out);
            }
            varint(*sink_id, out);
        }
        HostObject::MessagePort { index } => {
            out.push(dom_tag::MESSAGE_PORT);
            varint(u64::from(*index), out);
        }
        HostObject::DomPoint {
            read_only,
            x,
            y,
            z,
            w,
        } => {
            out.push(if *read_only {
                dom_tag::DOM_POINT_READ_ONLY
            } else {
                dom_tag::DOM_POINT
            });
            for v in [x, y, z, w] {
                encode_double(*v, order, out);
            }
        }
        HostObject::DomRect {
            read_only,
            x,
            y,
            width,
            height,
        } => {
            out.push(if *read_only {
                dom_tag::DOM_RECT_READ_ONLY
            } else {
                dom_tag::DOM_RECT
            });
            for v in [x, y, width, height] {
                encode_double(*v, order, out);
            }
        }
        HostObject::DomQuad { points } => {
            out.push(dom_tag::DOM_QUAD);
            for v in points.iter().flatten() {
                encode_double(*v, order, out);
            }
        }
        HostObject::DomMatrix { read_only, values } => {
            let tag = match (values.len(), *read_only) {
                (6, false) => dom_tag::DOM_MATRIX_2D,
                (6, true) => dom_tag::DOM_MATRIX_2D_READ_ONLY,
                (16, false) => dom_tag::DOM_MATRIX,
                (16, true) => dom_tag::DOM_MATRIX_READ_ONLY,
                (n, _) => {
                    return Err(IdbError::Argument(format!(
                        "DOMMatrix needs 6 or 16 values, got {}",
                        n
                    )))
                }
            };
            out.push(tag);
            for v in values {
                encode_double(*v, order, out);
            }
        }
    }
    Ok(())
}
