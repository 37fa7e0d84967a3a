//! Minimal PE image builder for tests.
//!
//! The images carry exactly what the version reader walks: DOS header,
//! PE headers, one `.rsrc` section and a single `RT_VERSION` resource.
//! The version block is the last thing in the file.

use dllup_model::VersionTag;

const PE_OFFSET: usize = 0x80;
const RSRC_FILE_OFFSET: usize = 0x200;
const RSRC_RVA: u32 = 0x1000;
/// Offset of the version block inside the resource section.
const BLOB_OFFSET: usize = 0x58;

/// Builds a PE32+ module. `None` yields an image without resources.
pub fn synthesize_module(version: Option<VersionTag>) -> Vec<u8> {
    build(true, version)
}

/// Builds a 32-bit PE module carrying `version`.
pub fn synthesize_pe32_module(version: VersionTag) -> Vec<u8> {
    build(false, Some(version))
}

fn build(pe32_plus: bool, version: Option<VersionTag>) -> Vec<u8> {
    let rsrc = version.map(resource_section).unwrap_or_default();
    let mut image = vec![0u8; RSRC_FILE_OFFSET];

    image[..2].copy_from_slice(b"MZ");
    put_u32(&mut image, 0x3C, PE_OFFSET as u32);
    image[PE_OFFSET..PE_OFFSET + 4].copy_from_slice(b"PE\0\0");

    let coff = PE_OFFSET + 4;
    let optional_size: u16 = if pe32_plus { 240 } else { 224 };
    put_u16(&mut image, coff, if pe32_plus { 0x8664 } else { 0x014C });
    put_u16(&mut image, coff + 2, u16::from(!rsrc.is_empty()));
    put_u16(&mut image, coff + 16, optional_size);
    put_u16(&mut image, coff + 18, 0x2022);

    let optional = coff + 20;
    let (magic, count_offset, dirs_offset) = if pe32_plus {
        (0x20Bu16, 108, 112)
    } else {
        (0x10Bu16, 92, 96)
    };
    put_u16(&mut image, optional, magic);
    put_u32(&mut image, optional + count_offset, 16);

    if !rsrc.is_empty() {
        let resource_dir = optional + dirs_offset + 2 * 8;
        put_u32(&mut image, resource_dir, RSRC_RVA);
        put_u32(&mut image, resource_dir + 4, rsrc.len() as u32);

        let section = optional + optional_size as usize;
        image[section..section + 5].copy_from_slice(b".rsrc");
        put_u32(&mut image, section + 8, rsrc.len() as u32);
        put_u32(&mut image, section + 12, RSRC_RVA);
        put_u32(&mut image, section + 16, rsrc.len() as u32);
        put_u32(&mut image, section + 20, RSRC_FILE_OFFSET as u32);
        put_u32(&mut image, section + 36, 0x4000_0040);
    }

    image.extend_from_slice(&rsrc);
    image
}

fn resource_section(version: VersionTag) -> Vec<u8> {
    let blob = version_block(version);
    let mut rsrc = vec![0u8; BLOB_OFFSET];

    // type directory → RT_VERSION
    put_u16(&mut rsrc, 0x0E, 1);
    put_u32(&mut rsrc, 0x10, 16);
    put_u32(&mut rsrc, 0x14, 0x8000_0000 | 0x18);
    // name directory → id 1
    put_u16(&mut rsrc, 0x18 + 0x0E, 1);
    put_u32(&mut rsrc, 0x28, 1);
    put_u32(&mut rsrc, 0x2C, 0x8000_0000 | 0x30);
    // language directory → en-US data entry
    put_u16(&mut rsrc, 0x30 + 0x0E, 1);
    put_u32(&mut rsrc, 0x40, 0x409);
    put_u32(&mut rsrc, 0x44, 0x48);
    // data entry
    put_u32(&mut rsrc, 0x48, RSRC_RVA + BLOB_OFFSET as u32);
    put_u32(&mut rsrc, 0x4C, blob.len() as u32);

    rsrc.extend_from_slice(&blob);
    rsrc
}

fn version_block(version: VersionTag) -> Vec<u8> {
    let mut block = vec![0u8; 6];
    for unit in "VS_VERSION_INFO".encode_utf16().chain(std::iter::once(0)) {
        block.extend_from_slice(&unit.to_le_bytes());
    }
    while block.len() % 4 != 0 {
        block.push(0);
    }

    let (ms, ls) = version.to_ms_ls();
    let fixed: [u32; 13] = [
        0xFEEF_04BD,
        0x0001_0000,
        ms,
        ls,
        ms,
        ls,
        0x3F,
        0,
        0x0004_0004,
        2,
        0,
        0,
        0,
    ];
    for value in fixed {
        block.extend_from_slice(&value.to_le_bytes());
    }

    let len = block.len() as u16;
    put_u16(&mut block, 0, len);
    put_u16(&mut block, 2, 52);
    block
}

fn put_u16(buf: &mut [u8], offset: usize, value: u16) {
    buf[offset..offset + 2].copy_from_slice(&value.to_le_bytes());
}

fn put_u32(buf: &mut [u8], offset: usize, value: u32) {
    buf[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
}
