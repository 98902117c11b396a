use std::path::Path;

use crate::{
    config::CubemapSource,
    data_structures::{model::TextureImage, terrain::Heightmap},
    error::{Result, SceneError},
    resources::load_binary,
};

/// Decodes any format the `image` crate understands into RGBA8.
pub fn decode_image(path: &Path, bytes: &[u8]) -> Result<image::DynamicImage> {
    image::load_from_memory(bytes).map_err(|source| SceneError::Image {
        path: path.to_path_buf(),
        source,
    })
}

pub fn to_texture_image(label: &str, image: &image::DynamicImage) -> TextureImage {
    let rgba = image.to_rgba8();
    TextureImage {
        label: label.to_string(),
        width: rgba.width(),
        height: rgba.height(),
        rgba: rgba.into_raw(),
    }
}

pub async fn load_image(root: &Path, file_name: &Path) -> Result<TextureImage> {
    let data = load_binary(root, file_name).await?;
    let image = decode_image(file_name, &data)?;
    Ok(to_texture_image(&file_name.to_string_lossy(), &image))
}

/// Reads a greyscale heightmap; each texel's luma times `scale` is a height.
pub async fn load_heightmap(root: &Path, file_name: &Path, scale: f32) -> Result<Heightmap> {
    let data = load_binary(root, file_name).await?;
    let image = decode_image(file_name, &data)?;
    Heightmap::from_luma(&image.to_luma8(), scale)
}

/// Loads the six skybox faces and stacks them vertically, `+X` on top.
pub async fn load_cubemap(root: &Path, source: &CubemapSource) -> Result<TextureImage> {
    match source {
        CubemapSource::Strip(file_name) => {
            let strip = load_image(root, file_name).await?;
            strip_to_stack(&strip)
        }
        CubemapSource::Faces(files) => {
            let mut faces = Vec::with_capacity(6);
            for file_name in files {
                faces.push(load_image(root, file_name).await?);
            }
            stack_faces("skybox cubemap", &faces)
        }
    }
}

/// Rearranges a horizontal strip of six square faces into a vertical stack.
pub fn strip_to_stack(strip: &TextureImage) -> Result<TextureImage> {
    let face = strip.height;
    if face == 0 || strip.width != face * 6 {
        return Err(SceneError::creation(
            &strip.label,
            format!(
                "cubemap strip must be six square faces wide, got {}x{}",
                strip.width, strip.height
            ),
        ));
    }
    let row_bytes = face as usize * 4;
    let strip_row = strip.width as usize * 4;
    let mut rgba = Vec::with_capacity(strip.rgba.len());
    for f in 0..6 {
        for y in 0..face as usize {
            let start = y * strip_row + f * row_bytes;
            rgba.extend_from_slice(&strip.rgba[start..start + row_bytes]);
        }
    }
    Ok(TextureImage {
        label: strip.label.clone(),
        width: face,
        height: face * 6,
        rgba,
    })
}

pub fn stack_faces(label: &str, faces: &[TextureImage]) -> Result<TextureImage> {
    let Some(first) = faces.first() else {
        return Err(SceneError::creation(label, "no cubemap faces"));
    };
    let size = first.width;
    if faces.len() != 6 || faces.iter().any(|f| f.width != size || f.height != size) {
        return Err(SceneError::creation(label, "cubemap needs six square faces of equal size"));
    }
    Ok(TextureImage {
        label: label.to_string(),
        width: size,
        height: size * 6,
        rgba: faces.iter().flat_map(|f| f.rgba.iter().copied()).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strip(face: u32) -> TextureImage {
        let width = face * 6;
        let mut rgba = Vec::new();
        for _y in 0..face {
            for x in 0..width {
                // red channel holds the face index
                rgba.extend_from_slice(&[(x / face) as u8, 0, 0, 255]);
            }
        }
        TextureImage {
            label: "strip".into(),
            width,
            height: face,
            rgba,
        }
    }

    #[test]
    fn strip_faces_are_stacked_in_order() {
        let stacked = strip_to_stack(&strip(2)).unwrap();
        assert_eq!((stacked.width, stacked.height), (2, 12));
        let face_bytes = 2 * 2 * 4;
        for f in 0..6 {
            let face = &stacked.rgba[f * face_bytes..(f + 1) * face_bytes];
            assert!(face.chunks(4).all(|px| px[0] == f as u8));
        }
    }

    #[test]
    fn malformed_strips_are_rejected() {
        let mut bad = strip(2);
        bad.width = 10;
        assert!(strip_to_stack(&bad).is_err());
    }

    #[test]
    fn faces_must_match() {
        let faces: Vec<_> = (0..6).map(|_| TextureImage::solid("face", [0, 0, 255, 255])).collect();
        let stacked = stack_faces("sky", &faces).unwrap();
        assert_eq!((stacked.width, stacked.height, stacked.rgba.len()), (1, 6, 24));
        assert!(stack_faces("sky", &faces[..5]).is_err());
    }

    #[test]
    fn png_bytes_decode_to_rgba() {
        let mut png = Vec::new();
        let img = image::RgbaImage::from_pixel(3, 2, image::Rgba([10, 20, 30, 255]));
        img.write_to(&mut std::io::Cursor::new(&mut png), image::ImageFormat::Png)
            .unwrap();
        let decoded = decode_image(Path::new("tiny.png"), &png).unwrap();
        let tex = to_texture_image("tiny", &decoded);
        assert_eq!((tex.width, tex.height), (3, 2));
        assert_eq!(&tex.rgba[..4], &[10, 20, 30, 255]);
        assert!(decode_image(Path::new("junk.png"), b"not an image").is_err());
    }
}
