use crate::encoding::to_win_ansi_bytes;
use crate::error::CvPdfError;
use crate::font::OutputFace;
use crate::reconcile::{DrawInstruction, DrawMode, Origin};
use crate::surface::PageImage;
use crate::types::Size;
use image::GenericImageView;
use lopdf::content::{Content, Operation};
use lopdf::{Dictionary, Document as LoDocument, Object, ObjectId, Stream, StringFormat, dictionary};
use std::io::Write;

const TEXT_FACES: [OutputFace; 2] = [OutputFace::Helvetica, OutputFace::HelveticaBold];
const DEBUG_GSTATE: &str = "GS1";

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ComposeSummary {
    pub pages_written: usize,
    pub text_lines: usize,
    pub ignored_instructions: usize,
    pub image_bytes: usize,
}

struct ImageData {
    width: u32,
    height: u32,
    color_space: &'static str,
    filter: &'static str,
    data: Vec<u8>,
}

pub fn compose_pdf(
    pages: &[PageImage],
    page_size: Size,
    instructions: &[DrawInstruction],
    draw_mode: DrawMode,
    origin: Origin,
) -> Result<(Vec<u8>, ComposeSummary), CvPdfError> {
    if pages.is_empty() {
        return Err(CvPdfError::Pdf("no page images to compose".to_string()));
    }
    let page_w = page_size.width.to_f32();
    let page_h = page_size.height.to_f32();

    let mut doc = LoDocument::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut fonts = Dictionary::new();
    for face in TEXT_FACES {
        let font_id = doc.add_object(dictionary! {
            "Type" => "Font",
            "Subtype" => "Type1",
            "BaseFont" => face.base_font(),
            "Encoding" => "WinAnsiEncoding",
        });
        fonts.set(face.resource_name(), Object::Reference(font_id));
    }

    let gstate_id = match draw_mode {
        DrawMode::Debug { opacity, .. } => Some(doc.add_object(dictionary! {
            "Type" => "ExtGState",
            "ca" => Object::Real(opacity.clamp(0.0, 1.0)),
        })),
        DrawMode::Invisible => None,
    };

    let mut per_page: Vec<Vec<&DrawInstruction>> = vec![Vec::new(); pages.len()];
    let mut summary = ComposeSummary::default();
    for instruction in instructions {
        match per_page.get_mut(instruction.page_index) {
            Some(list) => list.push(instruction),
            None => summary.ignored_instructions += 1,
        }
    }

    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());
    for (index, page_image) in pages.iter().enumerate() {
        let image = decode_page_image(page_image)?;
        summary.image_bytes += image.data.len();
        let image_id = doc.add_object(
            Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => Object::Integer(image.width as i64),
                    "Height" => Object::Integer(image.height as i64),
                    "ColorSpace" => image.color_space,
                    "BitsPerComponent" => Object::Integer(8),
                    "Filter" => image.filter,
                },
                image.data,
            )
            .with_compression(false),
        );

        let mut operations = vec![
            Operation::new("q", vec![]),
            Operation::new(
                "cm",
                vec![
                    Object::Real(page_w),
                    Object::Real(0.0),
                    Object::Real(0.0),
                    Object::Real(page_h),
                    Object::Real(0.0),
                    Object::Real(0.0),
                ],
            ),
            Operation::new("Do", vec![Object::Name(b"Im1".to_vec())]),
            Operation::new("Q", vec![]),
        ];
        let lines = &per_page[index];
        if !lines.is_empty() {
            push_text_layer(&mut operations, lines, draw_mode, origin, page_h);
            summary.text_lines += lines.len();
        }
        let content = Content { operations }.encode()?;
        let content_id = doc.add_object(Stream::new(Dictionary::new(), content));

        let mut resources = dictionary! {
            "Font" => fonts.clone(),
            "XObject" => dictionary! { "Im1" => image_id },
        };
        if let Some(gstate_id) = gstate_id {
            resources.set("ExtGState", dictionary! { DEBUG_GSTATE => gstate_id });
        }

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![
                Object::Integer(0),
                Object::Integer(0),
                Object::Real(page_w),
                Object::Real(page_h),
            ],
            "Resources" => resources,
            "Contents" => content_id,
        });
        kids.push(Object::Reference(page_id));
        summary.pages_written += 1;
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => Object::Integer(count),
        }),
    );
    let catalog_id: ObjectId = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", Object::Reference(catalog_id));

    let mut out = Vec::new();
    doc.save_to(&mut out)?;
    Ok((out, summary))
}

fn push_text_layer(
    operations: &mut Vec<Operation>,
    lines: &[&DrawInstruction],
    draw_mode: DrawMode,
    origin: Origin,
    page_h: f32,
) {
    operations.push(Operation::new("q", vec![]));
    match draw_mode {
        DrawMode::Invisible => {}
        DrawMode::Debug { color, .. } => {
            operations.push(Operation::new(
                "gs",
                vec![Object::Name(DEBUG_GSTATE.as_bytes().to_vec())],
            ));
            operations.push(Operation::new(
                "rg",
                vec![
                    Object::Real(color.r),
                    Object::Real(color.g),
                    Object::Real(color.b),
                ],
            ));
        }
    }
    operations.push(Operation::new("BT", vec![]));
    if draw_mode == DrawMode::Invisible {
        // Render mode 3: neither fill nor stroke, text stays selectable.
        operations.push(Operation::new("Tr", vec![Object::Integer(3)]));
    }
    for line in lines {
        let y = match origin {
            Origin::BottomLeft => line.y.to_f32(),
            Origin::TopLeft => page_h - line.y.to_f32(),
        };
        operations.push(Operation::new(
            "Tf",
            vec![
                Object::Name(line.face.resource_name().as_bytes().to_vec()),
                Object::Real(line.font_size.to_f32()),
            ],
        ));
        operations.push(Operation::new(
            "Tm",
            vec![
                Object::Real(1.0),
                Object::Real(0.0),
                Object::Real(0.0),
                Object::Real(1.0),
                Object::Real(line.x.to_f32()),
                Object::Real(y),
            ],
        ));
        operations.push(Operation::new(
            "Tj",
            vec![Object::String(
                to_win_ansi_bytes(&line.text),
                StringFormat::Literal,
            )],
        ));
    }
    operations.push(Operation::new("ET", vec![]));
    operations.push(Operation::new("Q", vec![]));
}

fn decode_page_image(page: &PageImage) -> Result<ImageData, CvPdfError> {
    match page {
        PageImage::Rgb {
            width,
            height,
            pixels,
        } => {
            let expected = (*width as usize) * (*height as usize) * 3;
            if *width == 0 || *height == 0 || pixels.len() != expected {
                return Err(CvPdfError::Image(format!(
                    "raw page is {}x{} but carries {} bytes",
                    width,
                    height,
                    pixels.len()
                )));
            }
            Ok(ImageData {
                width: *width,
                height: *height,
                color_space: "DeviceRGB",
                filter: "FlateDecode",
                data: flate_compress(pixels)?,
            })
        }
        PageImage::Encoded(bytes) => decode_image_bytes(bytes),
    }
}

fn decode_image_bytes(data: &[u8]) -> Result<ImageData, CvPdfError> {
    let format = image::guess_format(data).ok();
    let decoded = image::load_from_memory(data)?;
    let (width, height) = decoded.dimensions();

    if matches!(format, Some(image::ImageFormat::Jpeg)) {
        let color_space = match decoded.color() {
            image::ColorType::L8 | image::ColorType::La8 => "DeviceGray",
            _ => "DeviceRGB",
        };
        return Ok(ImageData {
            width,
            height,
            color_space,
            filter: "DCTDecode",
            data: data.to_vec(),
        });
    }

    // Screenshots are opaque; any alpha is flattened onto white.
    let rgba = decoded.to_rgba8();
    let mut rgb = Vec::with_capacity((width as usize) * (height as usize) * 3);
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        let blend = |c: u8| ((c as u32 * a as u32 + 255 * (255 - a as u32)) / 255) as u8;
        rgb.extend_from_slice(&[blend(r), blend(g), blend(b)]);
    }
    Ok(ImageData {
        width,
        height,
        color_space: "DeviceRGB",
        filter: "FlateDecode",
        data: flate_compress(&rgb)?,
    })
}

fn flate_compress(data: &[u8]) -> Result<Vec<u8>, CvPdfError> {
    use flate2::Compression;
    use flate2::write::ZlibEncoder;

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(data)?;
    Ok(encoder.finish()?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Color, Pt};
    use image::{ImageFormat, Rgb, RgbImage};
    use std::io::Cursor;

    fn gray_page(w: u32, h: u32) -> PageImage {
        PageImage::from_rgb(RgbImage::from_pixel(w, h, Rgb([200, 200, 200])))
    }

    fn line(page_index: usize, text: &str) -> DrawInstruction {
        DrawInstruction {
            page_index,
            x: Pt::from_f32(30.0),
            y: Pt::from_f32(800.0),
            font_size: Pt::from_f32(10.5),
            text: text.to_string(),
            face: OutputFace::Helvetica,
        }
    }

    fn operators(doc: &LoDocument, page_id: ObjectId) -> Vec<Operation> {
        let raw = doc.get_page_content(page_id).unwrap();
        Content::decode(&raw).unwrap().operations
    }

    #[test]
    fn writes_one_page_per_image_with_invisible_text() {
        let pages = vec![gray_page(8, 12), gray_page(8, 12)];
        let instructions = vec![line(0, "Jane Doe"), line(1, "Experience"), line(5, "lost")];
        let (pdf, summary) = compose_pdf(
            &pages,
            Size::a4(),
            &instructions,
            DrawMode::Invisible,
            Origin::BottomLeft,
        )
        .unwrap();
        assert_eq!(summary.pages_written, 2);
        assert_eq!(summary.text_lines, 2);
        assert_eq!(summary.ignored_instructions, 1);

        let doc = LoDocument::load_mem(&pdf).unwrap();
        let page_ids: Vec<ObjectId> = doc.get_pages().values().copied().collect();
        assert_eq!(page_ids.len(), 2);

        let ops = operators(&doc, page_ids[0]);
        assert!(ops.iter().any(|op| op.operator == "Do"));
        let tr = ops.iter().find(|op| op.operator == "Tr").unwrap();
        assert_eq!(tr.operands, vec![Object::Integer(3)]);
        let tj = ops.iter().find(|op| op.operator == "Tj").unwrap();
        assert_eq!(
            tj.operands[0],
            Object::String(b"Jane Doe".to_vec(), StringFormat::Literal)
        );
    }

    #[test]
    fn debug_mode_uses_visible_translucent_text() {
        let pages = vec![gray_page(4, 4)];
        let mode = DrawMode::Debug {
            color: Color::rgb(1.0, 0.0, 0.0),
            opacity: 0.4,
        };
        let (pdf, _) = compose_pdf(
            &pages,
            Size::a4(),
            &[line(0, "Skills")],
            mode,
            Origin::BottomLeft,
        )
        .unwrap();
        let doc = LoDocument::load_mem(&pdf).unwrap();
        let page_id = *doc.get_pages().values().next().unwrap();
        let ops = operators(&doc, page_id);
        assert!(ops.iter().all(|op| op.operator != "Tr"));
        assert!(ops.iter().any(|op| op.operator == "gs"));
        assert!(ops.iter().any(|op| op.operator == "rg"));
    }

    #[test]
    fn top_left_instructions_are_flipped() {
        let pages = vec![gray_page(4, 4)];
        let mut instruction = line(0, "x");
        instruction.y = Pt::from_f32(100.0);
        let size = Size::a4();
        let (pdf, _) =
            compose_pdf(&pages, size, &[instruction], DrawMode::Invisible, Origin::TopLeft).unwrap();
        let doc = LoDocument::load_mem(&pdf).unwrap();
        let page_id = *doc.get_pages().values().next().unwrap();
        let ops = operators(&doc, page_id);
        let tm = ops.iter().find(|op| op.operator == "Tm").unwrap();
        let y = tm.operands[5].as_float().unwrap();
        assert!((y - (size.height.to_f32() - 100.0)).abs() < 0.01);
    }

    #[test]
    fn raw_pixels_are_zlib_compressed() {
        use std::io::Read;

        let pixels: Vec<u8> = (0..4 * 3 * 3).map(|v| v as u8).collect();
        let page = PageImage::Rgb {
            width: 4,
            height: 3,
            pixels: pixels.clone(),
        };
        let image = decode_page_image(&page).unwrap();
        assert_eq!(image.filter, "FlateDecode");
        assert!(!image.data.is_empty());
        let mut inflated = Vec::new();
        flate2::read::ZlibDecoder::new(image.data.as_slice())
            .read_to_end(&mut inflated)
            .unwrap();
        assert_eq!(inflated, pixels);
    }

    #[test]
    fn png_and_jpeg_inputs_are_embedded() {
        let img = RgbImage::from_pixel(6, 6, Rgb([10, 120, 200]));
        let mut png = Vec::new();
        img.write_to(&mut Cursor::new(&mut png), ImageFormat::Png).unwrap();
        let mut jpeg = Vec::new();
        img.write_to(&mut Cursor::new(&mut jpeg), ImageFormat::Jpeg).unwrap();

        let png_data = decode_image_bytes(&png).unwrap();
        assert_eq!(png_data.filter, "FlateDecode");
        assert_eq!((png_data.width, png_data.height), (6, 6));
        let jpeg_data = decode_image_bytes(&jpeg).unwrap();
        assert_eq!(jpeg_data.filter, "DCTDecode");
        assert_eq!(jpeg_data.data, jpeg);

        let pages = vec![PageImage::Encoded(png), PageImage::Encoded(jpeg)];
        let (pdf, summary) =
            compose_pdf(&pages, Size::a4(), &[], DrawMode::Invisible, Origin::BottomLeft).unwrap();
        assert_eq!(summary.pages_written, 2);
        assert_eq!(LoDocument::load_mem(&pdf).unwrap().get_pages().len(), 2);
    }

    #[test]
    fn rejects_empty_and_malformed_pages() {
        assert!(compose_pdf(&[], Size::a4(), &[], DrawMode::Invisible, Origin::BottomLeft).is_err());
        let bad = PageImage::Rgb {
            width: 4,
            height: 4,
            pixels: vec![0; 5],
        };
        assert!(matches!(
            compose_pdf(&[bad], Size::a4(), &[], DrawMode::Invisible, Origin::BottomLeft),
            Err(CvPdfError::Image(_))
        ));
    }
}
