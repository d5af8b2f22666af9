//! Bundling the original page images into a single PDF.
//!
//! Each input file becomes one page, sized to fit the image exactly. JPEGs
//! are copied into the PDF byte-for-byte, so there's no generation loss.
//! Anything else is decoded and stored as raw 8- or 16-bit samples, which
//! [`Document::compress`] then deflates.

use std::{fs, io::Cursor};

use image::ImageReader;
use lopdf::{
    Document, Object, ObjectId, Stream,
    content::{Content, Operation},
    dictionary,
};

use crate::prelude::*;

use super::output_path;

/// Resolution assumed for images, used to turn pixels into page size.
const DEFAULT_DPI: f32 = 96.0;

/// PDF user space units per inch.
const POINTS_PER_INCH: f32 = 72.0;

/// Name of the image XObject in each page's resources.
const IMAGE_NAME: &[u8] = b"Im0";

/// An image ready to be placed on a page.
struct PageImage {
    /// Width in pixels.
    width: u32,
    /// Height in pixels.
    height: u32,
    /// The image XObject.
    stream: Stream,
}

/// Write `<stem>.pdf` with one page per file in `paths`, in order.
///
/// Returns the path written, or `None` if `paths` was empty, since a PDF
/// needs at least one page to be useful.
#[instrument(level = "debug", skip_all, fields(pages = paths.len(), stem = %stem.display()))]
pub fn write_pdf(paths: &[PathBuf], stem: &Path) -> Result<Option<PathBuf>> {
    if paths.is_empty() {
        warn!("No pages found, so no PDF written");
        return Ok(None);
    }

    let mut doc = build_pdf(paths)?;
    let path = output_path(stem, "pdf");
    doc.save(&path)
        .with_context(|| format!("failed to write {:?}", path.display()))?;
    debug!(path = %path.display(), "Wrote PDF");
    Ok(Some(path))
}

/// Build an in-memory PDF with one page per image file.
fn build_pdf(paths: &[PathBuf]) -> Result<Document> {
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut kids = Vec::with_capacity(paths.len());
    for path in paths {
        let image = read_page_image(path)?;
        let page_id = add_page(&mut doc, pages_id, image)
            .with_context(|| format!("failed to add {:?} to PDF", path.display()))?;
        kids.push(Object::from(page_id));
    }

    let pages = dictionary! {
        "Type" => "Pages",
        "Count" => kids.len() as i64,
        "Kids" => kids,
    };
    doc.objects.insert(pages_id, Object::Dictionary(pages));
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();
    Ok(doc)
}

/// Add a page showing `image` at full size.
fn add_page(doc: &mut Document, pages_id: ObjectId, image: PageImage) -> Result<ObjectId> {
    let scale = POINTS_PER_INCH / DEFAULT_DPI;
    let width = image.width as f32 * scale;
    let height = image.height as f32 * scale;

    let image_id = doc.add_object(image.stream);
    let content = Content {
        operations: vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    width.into(),
                    0_i64.into(),
                    0_i64.into(),
                    height.into(),
                    0_i64.into(),
                    0_i64.into(),
                ],
            ),
            Operation::new("Do", vec![Object::Name(IMAGE_NAME.to_vec())]),
            Operation::new("Q", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().context("failed to encode page content")?,
    ));

    let mut xobjects = lopdf::Dictionary::new();
    xobjects.set(IMAGE_NAME, image_id);
    let media_box: Vec<Object> =
        vec![0.0_f32.into(), 0.0_f32.into(), width.into(), height.into()];
    Ok(doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "MediaBox" => media_box,
        "Contents" => content_id,
        "Resources" => dictionary! { "XObject" => xobjects },
    }))
}

/// Read an image file and turn it into an image XObject.
fn read_page_image(path: &Path) -> Result<PageImage> {
    let data =
        fs::read(path).with_context(|| format!("failed to read {:?}", path.display()))?;
    let is_jpeg = infer::get(&data).is_some_and(|kind| kind.mime_type() == "image/jpeg");
    let image = if is_jpeg {
        jpeg_image(data)
    } else {
        raster_image(&data)
    };
    image.with_context(|| format!("failed to embed {:?} in PDF", path.display()))
}

/// The parts of a JPEG's headers that the PDF image dictionary needs.
#[derive(Debug, PartialEq, Eq)]
struct JpegHeader {
    width: u32,
    height: u32,
    /// 1 for grayscale, 3 for YCbCr/RGB, 4 for CMYK/YCCK.
    components: u8,
    /// Whether there's an Adobe `APP14` segment. Adobe writes CMYK JPEGs with
    /// inverted samples.
    adobe: bool,
}

/// Scan the marker segments of a JPEG up to its frame header.
///
/// We read the component count from the file itself, because decoders
/// convert CMYK to RGB and would tell us the wrong colour space.
fn read_jpeg_header(data: &[u8]) -> Result<JpegHeader> {
    if !data.starts_with(&[0xFF, 0xD8]) {
        return Err(anyhow!("missing JPEG start-of-image marker"));
    }
    let mut pos = 2;
    let mut adobe = false;
    loop {
        // Markers may be preceded by any number of 0xFF fill bytes.
        while data.get(pos) == Some(&0xFF) && data.get(pos + 1) == Some(&0xFF) {
            pos += 1;
        }
        let marker = match (data.get(pos), data.get(pos + 1)) {
            (Some(0xFF), Some(&marker)) => marker,
            _ => return Err(anyhow!("malformed JPEG marker at byte {}", pos)),
        };
        pos += 2;

        // Standalone markers have no length or payload.
        if marker == 0x01 || (0xD0..=0xD7).contains(&marker) {
            continue;
        }
        if marker == 0xD9 || marker == 0xDA {
            return Err(anyhow!("JPEG has no frame header"));
        }

        let len = match data.get(pos..pos + 2) {
            Some(&[hi, lo]) => usize::from(u16::from_be_bytes([hi, lo])),
            _ => return Err(anyhow!("truncated JPEG segment at byte {}", pos)),
        };
        let segment = (len >= 2)
            .then(|| data.get(pos + 2..pos + len))
            .flatten()
            .ok_or_else(|| anyhow!("truncated JPEG segment at byte {}", pos))?;

        match marker {
            0xEE if segment.starts_with(b"Adobe") => adobe = true,
            // SOF0-SOF15, except DHT (C4), JPG (C8) and DAC (CC).
            0xC0..=0xCF if !matches!(marker, 0xC4 | 0xC8 | 0xCC) => {
                return match *segment {
                    [_precision, h_hi, h_lo, w_hi, w_lo, components, ..] => Ok(JpegHeader {
                        width: u32::from(u16::from_be_bytes([w_hi, w_lo])),
                        height: u32::from(u16::from_be_bytes([h_hi, h_lo])),
                        components,
                        adobe,
                    }),
                    _ => Err(anyhow!("truncated JPEG frame header")),
                };
            }
            _ => {}
        }
        pos += len;
    }
}

/// Embed a JPEG as-is, using the PDF's built-in `DCTDecode` filter.
fn jpeg_image(data: Vec<u8>) -> Result<PageImage> {
    let header = read_jpeg_header(&data)?;
    let color_space = match header.components {
        1 => "DeviceGray",
        3 => "DeviceRGB",
        4 => "DeviceCMYK",
        other => return Err(anyhow!("unsupported JPEG component count {}", other)),
    };
    let mut dict = dictionary! {
        "Type" => "XObject",
        "Subtype" => "Image",
        "Width" => i64::from(header.width),
        "Height" => i64::from(header.height),
        "ColorSpace" => color_space,
        "BitsPerComponent" => 8_i64,
        "Filter" => "DCTDecode",
    };
    if header.components == 4 && header.adobe {
        let decode: Vec<Object> = [1_i64, 0, 1, 0, 1, 0, 1, 0]
            .into_iter()
            .map(Object::from)
            .collect();
        dict.set("Decode", decode);
    }
    let stream = Stream::new(dict, data).with_compression(false);
    Ok(PageImage {
        width: header.width,
        height: header.height,
        stream,
    })
}

/// Decode any other image and embed its raw samples. Grayscale stays
/// grayscale; everything else becomes RGB, dropping any alpha channel.
/// 16-bit images keep 16 bits per sample.
fn raster_image(data: &[u8]) -> Result<PageImage> {
    let image = ImageReader::new(Cursor::new(data))
        .with_guessed_format()?
        .decode()?;
    let (width, height) = (image.width(), image.height());
    let color = image.color();
    let sixteen_bit = color.bytes_per_pixel() / color.channel_count() == 2;
    let (color_space, bits, samples) = match (color.has_color(), sixteen_bit) {
        (true, false) => ("DeviceRGB", 8_i64, image.to_rgb8().into_raw()),
        (false, false) => ("DeviceGray", 8, image.to_luma8().into_raw()),
        (true, true) => ("DeviceRGB", 16, big_endian(image.to_rgb16().into_raw())),
        (false, true) => ("DeviceGray", 16, big_endian(image.to_luma16().into_raw())),
    };
    let stream = Stream::new(
        dictionary! {
            "Type" => "XObject",
            "Subtype" => "Image",
            "Width" => i64::from(width),
            "Height" => i64::from(height),
            "ColorSpace" => color_space,
            "BitsPerComponent" => bits,
        },
        samples,
    );
    Ok(PageImage {
        width,
        height,
        stream,
    })
}

/// PDF wants 16-bit samples in big-endian byte order.
fn big_endian(samples: Vec<u16>) -> Vec<u8> {
    samples.into_iter().flat_map(u16::to_be_bytes).collect()
}

#[cfg(test)]
mod tests {
    use image::{GrayImage, ImageBuffer, Luma, Rgb, RgbImage};

    use super::*;

    /// Find the image XObject drawn on a page.
    fn page_image<'a>(doc: &'a Document, page_id: ObjectId) -> Result<&'a Stream> {
        let page = doc.get_object(page_id)?.as_dict()?;
        let xobjects = page
            .get(b"Resources")?
            .as_dict()?
            .get(b"XObject")?
            .as_dict()?;
        let image_id = xobjects.get(IMAGE_NAME)?.as_reference()?;
        Ok(doc.get_object(image_id)?.as_stream()?)
    }

    #[test]
    fn pages_follow_input_order_and_keep_jpeg_bytes() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let a = tmp.path().join("a.jpg");
        let b = tmp.path().join("b.jpg");
        RgbImage::from_pixel(32, 16, Rgb([200, 10, 10])).save(&a)?;
        RgbImage::from_pixel(8, 40, Rgb([10, 10, 200])).save(&b)?;

        let path = write_pdf(&[a.clone(), b.clone()], &tmp.path().join("output"))?
            .expect("should write");
        assert_eq!(path, tmp.path().join("output.pdf"));

        let doc = Document::load(&path)?;
        let pages = doc.get_pages();
        assert_eq!(pages.len(), 2);

        for (page_num, (source, width)) in [(&a, 32), (&b, 8)].into_iter().enumerate() {
            let page_id = pages[&(page_num as u32 + 1)];
            let image = page_image(&doc, page_id)?;
            assert_eq!(image.dict.get(b"Width")?.as_i64()?, width);
            assert_eq!(image.dict.get(b"Filter")?.as_name()?, b"DCTDecode");
            assert_eq!(image.content, fs::read(source)?);
        }
        Ok(())
    }

    #[test]
    fn page_size_comes_from_pixels() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let a = tmp.path().join("a.png");
        RgbImage::from_pixel(96, 192, Rgb([0, 0, 0])).save(&a)?;

        let doc = build_pdf(&[a])?;
        let page_id = doc.get_pages()[&1];
        let media_box = doc
            .get_object(page_id)?
            .as_dict()?
            .get(b"MediaBox")?
            .as_array()?
            .iter()
            .map(|v| v.as_float())
            .collect::<Result<Vec<_>, _>>()?;
        assert_eq!(media_box, [0.0, 0.0, 72.0, 144.0]);
        Ok(())
    }

    #[test]
    fn grayscale_png_stays_grayscale() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("gray.png");
        GrayImage::from_pixel(64, 64, Luma([90])).save(&path)?;

        let doc = build_pdf(&[path])?;
        let page_id = doc.get_pages()[&1];
        let image = page_image(&doc, page_id)?;
        assert_eq!(image.dict.get(b"ColorSpace")?.as_name()?, b"DeviceGray");
        assert_eq!(image.dict.get(b"Height")?.as_i64()?, 64);
        Ok(())
    }

    /// A minimal Adobe CMYK JPEG: SOI, APP14 "Adobe", SOF0 with 4 components,
    /// EOI. There's no scan data, but we never decode it.
    fn adobe_cmyk_jpeg() -> Vec<u8> {
        let mut data = vec![0xFF, 0xD8];
        data.extend_from_slice(&[0xFF, 0xEE, 0x00, 0x0E]);
        data.extend_from_slice(b"Adobe");
        data.extend_from_slice(&[0x00, 0x64, 0x00, 0x00, 0x00, 0x00, 0x02]);
        data.extend_from_slice(&[0xFF, 0xC0, 0x00, 0x14, 0x08, 0x00, 0x10, 0x00, 0x20, 0x04]);
        for id in 1..=4 {
            data.extend_from_slice(&[id, 0x11, 0x00]);
        }
        data.extend_from_slice(&[0xFF, 0xD9]);
        data
    }

    #[test]
    fn cmyk_jpeg_is_embedded_as_cmyk() -> Result<()> {
        let data = adobe_cmyk_jpeg();
        assert_eq!(
            read_jpeg_header(&data)?,
            JpegHeader {
                width: 32,
                height: 16,
                components: 4,
                adobe: true,
            }
        );

        let image = jpeg_image(data.clone())?;
        assert_eq!((image.width, image.height), (32, 16));
        let dict = &image.stream.dict;
        assert_eq!(dict.get(b"ColorSpace")?.as_name()?, b"DeviceCMYK");
        assert_eq!(dict.get(b"Decode")?.as_array()?.len(), 8);
        assert_eq!(image.stream.content, data);
        Ok(())
    }

    #[test]
    fn grayscale_jpeg_is_embedded_as_gray() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("gray.jpg");
        GrayImage::from_pixel(12, 6, Luma([40])).save(&path)?;

        let image = jpeg_image(fs::read(&path)?)?;
        assert_eq!((image.width, image.height), (12, 6));
        let dict = &image.stream.dict;
        assert_eq!(dict.get(b"ColorSpace")?.as_name()?, b"DeviceGray");
        assert!(dict.get(b"Decode").is_err());
        Ok(())
    }

    #[test]
    fn jpeg_without_frame_header_is_an_error() {
        assert!(read_jpeg_header(&[0xFF, 0xD8, 0xFF, 0xD9]).is_err());
        assert!(read_jpeg_header(&[0xFF, 0xD8, 0xFF, 0xC0, 0x00]).is_err());
    }

    #[test]
    fn sixteen_bit_png_keeps_sixteen_bits() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("deep.png");
        ImageBuffer::<Luma<u16>, Vec<u16>>::from_pixel(2, 2, Luma([0x1234])).save(&path)?;

        let image = raster_image(&fs::read(&path)?)?;
        let dict = &image.stream.dict;
        assert_eq!(dict.get(b"BitsPerComponent")?.as_i64()?, 16);
        assert_eq!(dict.get(b"ColorSpace")?.as_name()?, b"DeviceGray");
        assert_eq!(image.stream.content, [0x12, 0x34].repeat(4));
        Ok(())
    }

    #[test]
    fn empty_page_list_writes_nothing() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        assert_eq!(write_pdf(&[], &tmp.path().join("output"))?, None);
        assert!(!tmp.path().join("output.pdf").exists());
        Ok(())
    }

    #[test]
    fn undecodable_file_is_an_error() -> Result<()> {
        let tmp = tempfile::tempdir()?;
        let path = tmp.path().join("broken.jpg");
        fs::write(&path, b"definitely not a jpeg")?;

        let err = build_pdf(&[path]).unwrap_err();
        assert!(format!("{err:#}").contains("broken.jpg"));
        Ok(())
    }
}
