use dllup_model::VersionTag;

use crate::PeError;

/// DOS header magic.
const DOS_MAGIC: &[u8; 2] = b"MZ";
/// Offset of `e_lfanew` in the DOS header.
const DOS_LFANEW_OFFSET: usize = 0x3C;
const PE_SIGNATURE: &[u8; 4] = b"PE\0\0";
const COFF_HEADER_SIZE: usize = 20;

const OPTIONAL_MAGIC_PE32: u16 = 0x10B;
const OPTIONAL_MAGIC_PE32_PLUS: u16 = 0x20B;

const SECTION_HEADER_SIZE: usize = 40;
/// Upper bound accepted for the section count; the loader caps it at 96.
const MAX_SECTIONS: usize = 96;

/// Index of the resource table in the optional header data directories.
const RESOURCE_DIRECTORY_INDEX: usize = 2;
const DATA_DIRECTORY_SIZE: usize = 8;

const RESOURCE_DIRECTORY_HEADER_SIZE: usize = 16;
const RESOURCE_ENTRY_SIZE: usize = 8;
const RESOURCE_SUBDIRECTORY_FLAG: u32 = 0x8000_0000;
const RT_VERSION: u32 = 16;

const VERSION_INFO_KEY: &str = "VS_VERSION_INFO";
const FIXED_FILE_INFO_SIGNATURE: u32 = 0xFEEF_04BD;
const FIXED_FILE_INFO_SIZE: usize = 52;

/// Extracts the file version from the `VS_FIXEDFILEINFO` of a PE image.
pub fn parse_fixed_version(data: &[u8]) -> Result<VersionTag, PeError> {
    let image = PeImage::parse(data)?;
    let (rsrc_rva, _) = image.resource_directory()?;
    let rsrc_base = image.rva_to_offset(rsrc_rva)?;

    let (blob_rva, blob_size) = find_version_resource(data, rsrc_base)?;
    let blob_offset = image.rva_to_offset(blob_rva)?;
    let blob = slice(data, blob_offset, blob_size as usize)?;

    parse_version_info(blob)
}

#[derive(Debug, Clone, Copy)]
struct Section {
    virtual_address: u32,
    virtual_size: u32,
    raw_size: u32,
    raw_pointer: u32,
}

struct PeImage {
    resource_dir: Option<(u32, u32)>,
    sections: Vec<Section>,
}

impl PeImage {
    fn parse(data: &[u8]) -> Result<Self, PeError> {
        if data.len() < DOS_LFANEW_OFFSET + 4 || &data[..2] != DOS_MAGIC {
            return Err(PeError::NotPe("missing DOS header".into()));
        }

        let pe_offset = read_u32(data, DOS_LFANEW_OFFSET)? as usize;
        if slice(data, pe_offset, 4)? != PE_SIGNATURE {
            return Err(PeError::NotPe(format!(
                "missing PE signature at 0x{pe_offset:x}"
            )));
        }

        let coff = pe_offset + 4;
        let section_count = read_u16(data, coff + 2)? as usize;
        let optional_size = read_u16(data, coff + 16)? as usize;
        if section_count > MAX_SECTIONS {
            return Err(PeError::Malformed(format!(
                "{section_count} sections exceeds limit"
            )));
        }

        let optional = coff + COFF_HEADER_SIZE;
        let (count_offset, dirs_offset) = match read_u16(data, optional)? {
            OPTIONAL_MAGIC_PE32 => (92, 96),
            OPTIONAL_MAGIC_PE32_PLUS => (108, 112),
            other => {
                return Err(PeError::NotPe(format!(
                    "unknown optional header magic 0x{other:x}"
                )));
            }
        };

        let dir_count = read_u32(data, optional + count_offset)? as usize;
        let resource_entry = dirs_offset + RESOURCE_DIRECTORY_INDEX * DATA_DIRECTORY_SIZE;
        let resource_dir = if dir_count > RESOURCE_DIRECTORY_INDEX
            && resource_entry + DATA_DIRECTORY_SIZE <= optional_size
        {
            let rva = read_u32(data, optional + resource_entry)?;
            let size = read_u32(data, optional + resource_entry + 4)?;
            (rva != 0 && size != 0).then_some((rva, size))
        } else {
            None
        };

        let table = optional + optional_size;
        let mut sections = Vec::with_capacity(section_count);
        for i in 0..section_count {
            let header = table + i * SECTION_HEADER_SIZE;
            sections.push(Section {
                virtual_size: read_u32(data, header + 8)?,
                virtual_address: read_u32(data, header + 12)?,
                raw_size: read_u32(data, header + 16)?,
                raw_pointer: read_u32(data, header + 20)?,
            });
        }

        Ok(Self {
            resource_dir,
            sections,
        })
    }

    fn resource_directory(&self) -> Result<(u32, u32), PeError> {
        self.resource_dir.ok_or(PeError::NoVersionResource)
    }

    /// Maps a relative virtual address to a file offset.
    fn rva_to_offset(&self, rva: u32) -> Result<usize, PeError> {
        for s in &self.sections {
            let span = s.virtual_size.max(s.raw_size) as u64;
            let start = s.virtual_address as u64;
            let rva = rva as u64;
            if rva >= start && rva < start + span {
                let delta = rva - start;
                if delta >= s.raw_size as u64 {
                    return Err(PeError::Malformed(format!(
                        "rva 0x{rva:x} has no file backing"
                    )));
                }
                return Ok((s.raw_pointer as u64 + delta) as usize);
            }
        }
        Err(PeError::Malformed(format!(
            "rva 0x{rva:x} outside every section"
        )))
    }
}

/// Walks type → name → language and returns the `(rva, size)` of the
/// version resource data.
fn find_version_resource(data: &[u8], rsrc_base: usize) -> Result<(u32, u32), PeError> {
    let type_entry = find_entry(data, rsrc_base, 0, Some(RT_VERSION))?;
    let name_dir = subdirectory(type_entry)?;

    let name_entry = find_entry(data, rsrc_base, name_dir, None)?;
    let lang_dir = subdirectory(name_entry)?;

    let lang_entry = find_entry(data, rsrc_base, lang_dir, None)?;
    if lang_entry & RESOURCE_SUBDIRECTORY_FLAG != 0 {
        return Err(PeError::Malformed(
            "language entry points at a directory".into(),
        ));
    }

    let data_entry = rsrc_base + lang_entry as usize;
    let rva = read_u32(data, data_entry)?;
    let size = read_u32(data, data_entry + 4)?;
    Ok((rva, size))
}

/// Returns the raw `OffsetToData` of the first entry matching `id`
/// (or simply the first entry when `id` is `None`).
fn find_entry(
    data: &[u8],
    rsrc_base: usize,
    dir_offset: usize,
    id: Option<u32>,
) -> Result<u32, PeError> {
    let dir = rsrc_base + dir_offset;
    let named = read_u16(data, dir + 12)? as usize;
    let ids = read_u16(data, dir + 14)? as usize;

    for i in 0..named + ids {
        let entry = dir + RESOURCE_DIRECTORY_HEADER_SIZE + i * RESOURCE_ENTRY_SIZE;
        let name = read_u32(data, entry)?;
        let offset = read_u32(data, entry + 4)?;
        match id {
            None => return Ok(offset),
            Some(wanted) if name & RESOURCE_SUBDIRECTORY_FLAG == 0 && name == wanted => {
                return Ok(offset);
            }
            Some(_) => {}
        }
    }

    Err(PeError::NoVersionResource)
}

fn subdirectory(offset: u32) -> Result<usize, PeError> {
    if offset & RESOURCE_SUBDIRECTORY_FLAG == 0 {
        return Err(PeError::Malformed(
            "expected a resource subdirectory".into(),
        ));
    }
    Ok((offset & !RESOURCE_SUBDIRECTORY_FLAG) as usize)
}

/// Parses a `VS_VERSIONINFO` block and returns its fixed file version.
fn parse_version_info(blob: &[u8]) -> Result<VersionTag, PeError> {
    let value_length = read_u16(blob, 2)? as usize;

    let (key, key_end) = read_utf16z(blob, 6)?;
    if key != VERSION_INFO_KEY {
        return Err(PeError::Malformed(format!(
            "unexpected version block key '{key}'"
        )));
    }

    if value_length < FIXED_FILE_INFO_SIZE {
        return Err(PeError::NoVersionResource);
    }

    let value = align4(key_end);
    let signature = read_u32(blob, value)?;
    if signature != FIXED_FILE_INFO_SIGNATURE {
        return Err(PeError::Malformed(format!(
            "bad fixed file info signature 0x{signature:08x}"
        )));
    }

    let ms = read_u32(blob, value + 8)?;
    let ls = read_u32(blob, value + 12)?;
    Ok(VersionTag::from_ms_ls(ms, ls))
}

/// Reads a NUL-terminated UTF-16LE string, returning it and the offset
/// just past the terminator.
fn read_utf16z(data: &[u8], start: usize) -> Result<(String, usize), PeError> {
    let mut units = Vec::new();
    let mut pos = start;
    loop {
        let unit = read_u16(data, pos)?;
        pos += 2;
        if unit == 0 {
            break;
        }
        units.push(unit);
    }
    Ok((String::from_utf16_lossy(&units), pos))
}

fn align4(offset: usize) -> usize {
    (offset + 3) & !3
}

fn slice(data: &[u8], offset: usize, len: usize) -> Result<&[u8], PeError> {
    offset
        .checked_add(len)
        .and_then(|end| data.get(offset..end))
        .ok_or(PeError::Truncated {
            offset,
            needed: len,
        })
}

fn read_u16(data: &[u8], offset: usize) -> Result<u16, PeError> {
    let b = slice(data, offset, 2)?;
    Ok(u16::from_le_bytes([b[0], b[1]]))
}

fn read_u32(data: &[u8], offset: usize) -> Result<u32, PeError> {
    let b = slice(data, offset, 4)?;
    Ok(u32::from_le_bytes([b[0], b[1], b[2], b[3]]))
}
