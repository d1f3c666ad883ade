//! PNG output of decoded images.

use std::path::{Path, PathBuf};

use romscope_lib::{Bitmap, ImageKind, RomHandle};

use crate::error::CliError;

pub(crate) fn image_file_name(stem: &str, kind: ImageKind) -> String {
    format!("{stem}.{}.png", kind.name())
}

fn save_png(bmp: &Bitmap, path: &Path) -> Result<(), CliError> {
    let img = romscope_texture::to_rgba_image(bmp)
        .ok_or_else(|| std::io::Error::other("bitmap buffer too small"))?;
    img.save_with_format(path, image::ImageFormat::Png)?;
    Ok(())
}

/// Write every internal image of `handle` into `dir`, plus each frame of
/// its animated icon. Images that fail to decode are logged and skipped.
pub(crate) fn dump_images(
    handle: &mut RomHandle,
    stem: &str,
    dir: &Path,
) -> Result<Vec<PathBuf>, CliError> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();

    for kind in handle.supported_image_kinds().kinds() {
        let bmp = match handle.image(kind) {
            Ok(Some(bmp)) => bmp,
            Ok(None) => continue,
            Err(e) => {
                log::warn!("{stem}: couldn't decode {}: {e}", kind.name());
                continue;
            }
        };
        let path = dir.join(image_file_name(stem, kind));
        save_png(bmp, &path)?;
        written.push(path);
    }

    match handle.animated_icon() {
        Ok(Some(icon)) => {
            for (i, frame) in icon.frames().iter().enumerate() {
                let path = dir.join(format!("{stem}.anim{i:02}.png"));
                save_png(frame, &path)?;
                written.push(path);
            }
        }
        Ok(None) => {}
        Err(e) => log::warn!("{stem}: couldn't decode animated icon: {e}"),
    }

    Ok(written)
}

#[cfg(test)]
mod tests {
    use super::*;
    use romscope_lib::{MemStream, ParseContext};

    fn dds_red() -> Vec<u8> {
        let mut tex = vec![0u8; 128];
        tex[..4].copy_from_slice(b"DDS ");
        tex[0x04..0x08].copy_from_slice(&124u32.to_le_bytes());
        tex[0x08..0x0C].copy_from_slice(&0x1007u32.to_le_bytes());
        tex[0x0C..0x10].copy_from_slice(&4u32.to_le_bytes());
        tex[0x10..0x14].copy_from_slice(&4u32.to_le_bytes());
        tex[0x4C..0x50].copy_from_slice(&32u32.to_le_bytes());
        tex[0x50..0x54].copy_from_slice(&4u32.to_le_bytes());
        tex[0x54..0x58].copy_from_slice(b"DXT1");
        tex.extend_from_slice(&[0x00, 0xF8, 0x00, 0xF8, 0, 0, 0, 0]);
        tex
    }

    #[test]
    fn test_image_file_name() {
        assert_eq!(image_file_name("game", ImageKind::IntIcon), "game.icon.png");
    }

    #[test]
    fn test_dump_texture() {
        let dir = tempfile::tempdir().unwrap();
        let stream = MemStream::new(dds_red());
        let mut handle = RomHandle::new(&stream, Some("dds"), ParseContext::default());
        let written = dump_images(&mut handle, "red", dir.path()).unwrap();
        assert_eq!(written, vec![dir.path().join("red.image.png")]);

        let img = image::open(&written[0]).unwrap().to_rgba8();
        assert_eq!(img.dimensions(), (4, 4));
        assert_eq!(img.get_pixel(2, 2).0, [0xFF, 0, 0, 0xFF]);
    }
}
