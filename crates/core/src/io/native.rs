//! Native GeoTIFF reading/writing
//!
//! Uses the `tiff` crate. Georeferencing is limited to the
//! ModelPixelScale / ModelTiepoint pair (north-up grids), which is what the
//! coregistration toolchain produces for terrain-corrected stacks.

use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Mask, Raster, RasterElement};
use std::fs::File;
use std::io::Cursor;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{Gray32Float, Gray8};
use tiff::encoder::{colortype::ColorType, TiffEncoder, TiffValue};
use tiff::tags::Tag;

const MODEL_PIXEL_SCALE: u16 = 33550;
const MODEL_TIEPOINT: u16 = 33922;
const GEO_KEY_DIRECTORY: u16 = 34735;
const GDAL_NODATA: u16 = 42113;

/// Options for writing GeoTIFF files
#[derive(Debug, Clone, Default)]
pub struct GeoTiffOptions {
    /// Skip the GDAL_NODATA tag even when the raster has a no-data value
    pub omit_nodata_tag: bool,
}

/// Read the first band of a GeoTIFF file into a Raster
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    decode_geotiff(file)
}

/// Read a GeoTIFF from an in-memory buffer into a Raster
pub fn read_geotiff_from_buffer<T>(data: &[u8]) -> Result<Raster<T>>
where
    T: RasterElement,
{
    decode_geotiff(Cursor::new(data))
}

fn cast_all<S, T>(buf: Vec<S>) -> Vec<T>
where
    S: num_traits::NumCast + Copy,
    T: RasterElement,
{
    buf.into_iter()
        .map(|v| num_traits::cast(v).unwrap_or(T::default_nodata()))
        .collect()
}

fn decode_geotiff<T, R>(reader: R) -> Result<Raster<T>>
where
    T: RasterElement,
    R: std::io::Read + std::io::Seek,
{
    let mut decoder =
        Decoder::new(reader).map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;

    let rows = height as usize;
    let cols = width as usize;

    let result = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;

    let data: Vec<T> = match result {
        DecodingResult::F32(buf) => cast_all(buf),
        DecodingResult::F64(buf) => cast_all(buf),
        DecodingResult::U8(buf) => cast_all(buf),
        DecodingResult::U16(buf) => cast_all(buf),
        DecodingResult::U32(buf) => cast_all(buf),
        DecodingResult::I16(buf) => cast_all(buf),
        DecodingResult::I32(buf) => cast_all(buf),
        _ => return Err(Error::UnsupportedDataType("Unsupported TIFF pixel format".to_string())),
    };

    // multi-sample images carry more values than cells; only single-band input is supported
    if data.len() != rows * cols {
        return Err(Error::InvalidDimensions {
            width: cols,
            height: rows,
        });
    }

    let mut raster = Raster::from_vec(data, rows, cols)?;

    if let Ok(transform) = read_geotransform(&mut decoder) {
        raster.set_transform(transform);
    }

    if let Ok(text) = decoder.get_tag_ascii_string(Tag::from_u16_exhaustive(GDAL_NODATA)) {
        let nodata = text
            .trim_matches(char::from(0))
            .trim()
            .parse::<f64>()
            .ok()
            .and_then(num_traits::cast::<f64, T>);
        raster.set_nodata(nodata);
    }

    Ok(raster)
}

fn read_geotransform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Result<GeoTransform> {
    let scale = decoder
        .get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE))
        .map_err(|_| Error::Other("No pixel scale tag".into()))?;

    let tiepoint = decoder
        .get_tag_f64_vec(Tag::from_u16_exhaustive(MODEL_TIEPOINT))
        .map_err(|_| Error::Other("No tiepoint tag".into()))?;

    if scale.len() >= 2 && tiepoint.len() >= 6 {
        // tiepoint: [I, J, K, X, Y, Z], scale: [ScaleX, ScaleY, ScaleZ]
        let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
        let origin_y = tiepoint[4] + tiepoint[1] * scale[1];
        return Ok(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
    }

    Err(Error::Other("Cannot determine geotransform".into()))
}

/// Write a float raster (change scores, probabilities) as a 32-bit float GeoTIFF
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P, options: Option<GeoTiffOptions>) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    encode_float(raster, file, &options.unwrap_or_default())
}

/// Write a float raster to an in-memory GeoTIFF buffer
pub fn write_geotiff_to_buffer<T>(raster: &Raster<T>, options: Option<GeoTiffOptions>) -> Result<Vec<u8>>
where
    T: RasterElement,
{
    let mut buf = Vec::new();
    encode_float(raster, Cursor::new(&mut buf), &options.unwrap_or_default())?;
    Ok(buf)
}

/// Write a mask (bimodality mask, flood mask) as an 8-bit GeoTIFF
pub fn write_mask_geotiff<P: AsRef<Path>>(mask: &Mask, path: P) -> Result<()> {
    let file = File::create(path.as_ref())?;
    encode_mask(mask, file)
}

/// Write a mask to an in-memory 8-bit GeoTIFF buffer
pub fn write_mask_geotiff_to_buffer(mask: &Mask) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    encode_mask(mask, Cursor::new(&mut buf))?;
    Ok(buf)
}

fn encode_float<T, W>(raster: &Raster<T>, writer: W, options: &GeoTiffOptions) -> Result<()>
where
    T: RasterElement,
    W: std::io::Write + std::io::Seek,
{
    let data: Vec<f32> = raster
        .data()
        .iter()
        .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
        .collect();

    let nodata = if options.omit_nodata_tag {
        None
    } else {
        raster.nodata().and_then(|v| v.to_f64())
    };

    encode::<Gray32Float, W>(raster.transform(), raster.shape(), &data, nodata, writer)
}

fn encode_mask<W>(mask: &Mask, writer: W) -> Result<()>
where
    W: std::io::Write + std::io::Seek,
{
    let data: Vec<u8> = mask.data().iter().copied().collect();
    encode::<Gray8, W>(mask.transform(), mask.shape(), &data, None, writer)
}

fn encode<C, W>(
    gt: &GeoTransform,
    (rows, cols): (usize, usize),
    data: &[C::Inner],
    nodata: Option<f64>,
    writer: W,
) -> Result<()>
where
    C: ColorType,
    [C::Inner]: TiffValue,
    W: std::io::Write + std::io::Seek,
{
    let mut encoder =
        TiffEncoder::new(writer).map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    let mut image = encoder
        .new_image::<C>(cols as u32, rows as u32)
        .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;

    let scale = [gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(MODEL_PIXEL_SCALE), &scale[..])
        .map_err(|e| Error::Other(format!("Cannot write scale tag: {}", e)))?;

    let tiepoint = [0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(MODEL_TIEPOINT), &tiepoint[..])
        .map_err(|e| Error::Other(format!("Cannot write tiepoint tag: {}", e)))?;

    // GTModelTypeGeoKey = Projected, GTRasterTypeGeoKey = PixelIsArea
    let geokeys: [u16; 12] = [1, 1, 0, 2, 1024, 0, 1, 1, 1025, 0, 1, 1];
    image
        .encoder()
        .write_tag(Tag::from_u16_exhaustive(GEO_KEY_DIRECTORY), &geokeys[..])
        .map_err(|e| Error::Other(format!("Cannot write geokey tag: {}", e)))?;

    if let Some(nd) = nodata {
        let text = if nd.is_nan() { "nan".to_string() } else { nd.to_string() };
        image
            .encoder()
            .write_tag(Tag::from_u16_exhaustive(GDAL_NODATA), text.as_str())
            .map_err(|e| Error::Other(format!("Cannot write nodata tag: {}", e)))?;
    }

    image
        .write_data(data)
        .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_float_roundtrip_keeps_georeference() {
        let mut raster: Raster<f32> = Raster::filled(4, 5, -15.0);
        raster.set(1, 2, -22.5).unwrap();
        raster.set(3, 4, f32::NAN).unwrap();
        raster.set_transform(GeoTransform::new(500_000.0, 4_200_000.0, 10.0, -10.0));
        raster.set_nodata(Some(f32::NAN));

        let bytes = write_geotiff_to_buffer(&raster, None).unwrap();
        let back: Raster<f32> = read_geotiff_from_buffer(&bytes).unwrap();

        assert_eq!(back.shape(), (4, 5));
        assert_eq!(back.get(1, 2).unwrap(), -22.5);
        assert!(back.get(3, 4).unwrap().is_nan());
        assert!(back.transform().same_grid(raster.transform()));
    }

    #[test]
    fn test_mask_roundtrip() {
        let mut mask: Mask = Raster::new(3, 3);
        mask.set(0, 0, 1).unwrap();
        mask.set(2, 1, 1).unwrap();

        let bytes = write_mask_geotiff_to_buffer(&mask).unwrap();
        let back: Mask = read_geotiff_from_buffer(&bytes).unwrap();

        assert_eq!(back.count_set(), 2);
        assert!(back.is_set(2, 1));
    }

    #[test]
    fn test_file_roundtrip_with_sentinel_nodata() {
        let mut raster: Raster<f32> = Raster::filled(2, 2, 30.0);
        raster.set(0, 1, -9999.0).unwrap();
        raster.set_nodata(Some(-9999.0));

        let tmp = tempfile::NamedTempFile::new().unwrap();
        write_geotiff(&raster, tmp.path(), None).unwrap();
        let back: Raster<f32> = read_geotiff(tmp.path()).unwrap();

        assert_eq!(back.nodata(), Some(-9999.0));
        assert!(!back.is_valid_at(0, 1));
        assert!(back.is_valid_at(1, 1));
    }
}
