//! Minimal 2-D MetaImage (`.mhd` header + `.raw` payload) reader and writer.
//!
//! This is the interchange format of the external registration tool. Pixels are
//! written in native byte order with the matching `ElementByteOrderMSB` flag.

use crate::data::{buffer, DynImage, ElementType, ImageData};
use crate::error::{Error, Result};
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};

const NATIVE_MSB: bool = cfg!(target_endian = "big");

fn header_text(image: &dyn ImageData, data_file: &str) -> String {
    let msb = if NATIVE_MSB { "True" } else { "False" };
    format!(
        "ObjectType = Image\n\
         NDims = 2\n\
         BinaryData = True\n\
         ElementByteOrderMSB = {msb}\n\
         CompressedData = False\n\
         DimSize = {} {}\n\
         ElementSpacing = 1 1\n\
         Offset = 0 0\n\
         ElementType = {}\n\
         ElementDataFile = {data_file}\n",
        image.width(),
        image.height(),
        image.element_type().meta_name(),
    )
}

/// Write `image` as `<stem>.mhd` + `<stem>.raw` next to each other, returning
/// the header path
pub fn write(header_path: &Path, image: &dyn ImageData) -> Result<PathBuf> {
    let raw_path = header_path.with_extension("raw");
    let raw_name = raw_path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::InvalidArgument(format!("bad MetaImage path {}", header_path.display())))?;

    fs::write(&raw_path, image.as_bytes())?;
    fs::write(header_path, header_text(image, raw_name))?;
    Ok(header_path.to_path_buf())
}

fn parse_header(text: &str) -> HashMap<String, String> {
    text.lines()
        .filter_map(|line| line.split_once('='))
        .map(|(key, value)| (key.trim().to_string(), value.trim().to_string()))
        .collect()
}

fn field<'a>(fields: &'a HashMap<String, String>, key: &str) -> Result<&'a str> {
    fields
        .get(key)
        .map(String::as_str)
        .ok_or_else(|| Error::InvalidArgument(format!("MetaImage header lacks {key}")))
}

/// Read a 2-D, uncompressed, single-channel MetaImage
pub fn read(header_path: &Path) -> Result<DynImage> {
    let fields = parse_header(&fs::read_to_string(header_path)?);

    if field(&fields, "NDims")? != "2" {
        return Err(Error::InvalidArgument("only 2-D MetaImages are supported".into()));
    }
    if fields
        .get("CompressedData")
        .is_some_and(|v| v.eq_ignore_ascii_case("true"))
    {
        return Err(Error::InvalidArgument("compressed MetaImage data is not supported".into()));
    }

    let dims: Vec<usize> = field(&fields, "DimSize")?
        .split_whitespace()
        .map(|v| v.parse::<usize>())
        .collect::<std::result::Result<_, _>>()
        .map_err(|e| Error::InvalidArgument(format!("bad DimSize: {e}")))?;
    let &[width, height] = dims.as_slice() else {
        return Err(Error::InvalidArgument(format!("DimSize must have 2 entries, got {}", dims.len())));
    };

    let type_name = field(&fields, "ElementType")?;
    let element_type = ElementType::ALL
        .into_iter()
        .find(|t| t.meta_name() == type_name)
        .ok_or_else(|| Error::InvalidArgument(format!("unsupported ElementType {type_name}")))?;

    let msb = fields
        .get("ElementByteOrderMSB")
        .or_else(|| fields.get("BinaryDataByteOrderMSB"))
        .is_some_and(|v| v.eq_ignore_ascii_case("true"));
    if msb != NATIVE_MSB && element_type.byte_size() > 1 {
        return Err(Error::InvalidArgument("MetaImage byte order differs from host".into()));
    }

    let data_file = field(&fields, "ElementDataFile")?;
    if data_file.eq_ignore_ascii_case("LOCAL") {
        return Err(Error::InvalidArgument("inline MetaImage data is not supported".into()));
    }
    let raw_path = header_path
        .parent()
        .map(|dir| dir.join(data_file))
        .unwrap_or_else(|| PathBuf::from(data_file));
    let bytes = fs::read(raw_path)?;

    buffer::build(width, height, element_type, &bytes)
}
