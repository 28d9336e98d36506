use super::*;
use crate::ErrorKind;

fn png_bytes(w: u32, h: u32) -> Vec<u8> {
    let img = image::RgbaImage::from_fn(w, h, |x, y| {
        image::Rgba([(x * 40) as u8, (y * 40) as u8, 200, 255])
    });
    let mut out = std::io::Cursor::new(Vec::new());
    image::DynamicImage::ImageRgba8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .unwrap();
    out.into_inner()
}

#[test]
fn decode_png_keeps_dimensions() {
    let img = SourceImage::decode(&png_bytes(5, 3)).unwrap();
    assert_eq!((img.width(), img.height()), (5, 3));
    assert_eq!(img.rgba8_premul().len(), 5 * 3 * 4);
    assert_eq!(&img.rgba8_premul()[0..4], &[0, 0, 200, 255]);
}

#[test]
fn garbage_and_empty_bytes_are_invalid_input() {
    assert_eq!(
        SourceImage::decode(b"not an image").unwrap_err().kind(),
        ErrorKind::InvalidInput
    );
    assert_eq!(
        SourceImage::decode(&[]).unwrap_err().kind(),
        ErrorKind::InvalidInput
    );
}

#[test]
fn from_rgba8_premultiplies_and_validates_len() {
    let img = SourceImage::from_rgba8(1, 1, vec![255, 0, 0, 128]).unwrap();
    assert_eq!(img.rgba8_premul(), &[128, 0, 0, 128]);
    assert!(SourceImage::from_rgba8(2, 2, vec![0; 15]).is_err());
    assert!(SourceImage::from_rgba8(0, 2, vec![]).is_err());
}

#[test]
fn absent_input_is_rejected() {
    let none: Option<SourceImage> = None;
    let err = ImageInput::from(none).into_source().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::InvalidInput);

    let some = ImageInput::from(Some(png_bytes(2, 2)));
    assert_eq!(some.into_source().unwrap().width(), 2);
}
