//! Native GeoTIFF reading/writing
//!
//! Uses the `tiff` crate for single-band TIFF I/O with minimal GeoTIFF
//! metadata: pixel scale and tiepoint tags for the geotransform, and the
//! GeoKey directory for the CRS. Multi-band imagery is handled as one file
//! per band by the callers.

use crate::crs::Crs;
use crate::error::{Error, Result};
use crate::raster::{GeoTransform, Raster, RasterElement};
use std::fs::File;
use std::path::Path;
use tiff::decoder::{Decoder, DecodingResult};
use tiff::encoder::colortype::{Gray32Float, Gray8};
use tiff::encoder::TiffEncoder;
use tiff::tags::Tag;

// GeoAsciiParams tag id, referenced by the `location` field of GeoKey entries
const GEO_ASCII_PARAMS: u16 = 34737;

// GeoKey ids within the key directory
const GT_CITATION: u16 = 1026;
const GEOGRAPHIC_TYPE: u16 = 2048;
const PROJECTED_CS_TYPE: u16 = 3072;

/// Read a GeoTIFF file into a Raster
pub fn read_geotiff<T, P>(path: P) -> Result<Raster<T>>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::open(path.as_ref())?;
    let mut decoder = Decoder::new(file)
        .map_err(|e| Error::Other(format!("TIFF decode error: {}", e)))?;

    let (width, height) = decoder
        .dimensions()
        .map_err(|e| Error::Other(format!("Cannot read dimensions: {}", e)))?;

    let rows = height as usize;
    let cols = width as usize;

    let result = decoder
        .read_image()
        .map_err(|e| Error::Other(format!("Cannot read image data: {}", e)))?;

    let data: Vec<T> = match result {
        DecodingResult::U8(buf) => cast_buffer(&buf),
        DecodingResult::U16(buf) => cast_buffer(&buf),
        DecodingResult::U32(buf) => cast_buffer(&buf),
        DecodingResult::I16(buf) => cast_buffer(&buf),
        DecodingResult::I32(buf) => cast_buffer(&buf),
        DecodingResult::F32(buf) => cast_buffer(&buf),
        DecodingResult::F64(buf) => cast_buffer(&buf),
        _ => {
            return Err(Error::UnsupportedDataType(
                "Unsupported TIFF pixel format".to_string(),
            ))
        }
    };

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
    if let Some(crs) = read_crs(&mut decoder) {
        raster.set_crs(Some(crs));
    }

    Ok(raster)
}

fn cast_buffer<S, T>(buf: &[S]) -> Vec<T>
where
    S: num_traits::NumCast + Copy,
    T: RasterElement,
{
    buf.iter()
        .map(|&v| num_traits::cast(v).unwrap_or(T::default_nodata()))
        .collect()
}

/// Attempt to read a GeoTransform from the pixel scale and tiepoint tags
fn read_geotransform<R: std::io::Read + std::io::Seek>(
    decoder: &mut Decoder<R>,
) -> Result<GeoTransform> {
    let scale = decoder
        .get_tag_f64_vec(Tag::ModelPixelScaleTag)
        .map_err(|_| Error::Other("No pixel scale tag".into()))?;

    let tiepoint = decoder
        .get_tag_f64_vec(Tag::ModelTiepointTag)
        .map_err(|_| Error::Other("No tiepoint tag".into()))?;

    if scale.len() >= 2 && tiepoint.len() >= 6 {
        // tiepoint: [I, J, K, X, Y, Z]; scale: [ScaleX, ScaleY, ScaleZ]
        let origin_x = tiepoint[3] - tiepoint[0] * scale[0];
        let origin_y = tiepoint[4] + tiepoint[1] * scale[1];

        return Ok(GeoTransform::new(origin_x, origin_y, scale[0], -scale[1]));
    }

    Err(Error::Other("Cannot determine geotransform".into()))
}

/// Recover the CRS from the GeoKey directory, if one is present.
///
/// Prefers a projected EPSG code (key 3072), then a geographic one (2048);
/// when neither is recorded, falls back to the citation text held in
/// GeoAsciiParams.
fn read_crs<R: std::io::Read + std::io::Seek>(decoder: &mut Decoder<R>) -> Option<Crs> {
    let keys = decoder
        .get_tag_u16_vec(Tag::GeoKeyDirectoryTag)
        .ok()?;
    // Directory header: [version, revision, minor, key count], then one
    // [id, location, count, value] entry per key
    let count = (*keys.get(3)?) as usize;

    let mut geographic = None;
    let mut citation = None;
    for entry in keys.get(4..)?.chunks_exact(4).take(count) {
        let (id, location, len, value) = (entry[0], entry[1], entry[2], entry[3]);
        match id {
            PROJECTED_CS_TYPE if location == 0 && is_epsg(value) => {
                return Some(Crs::from_epsg(value as u32));
            }
            GEOGRAPHIC_TYPE if location == 0 && is_epsg(value) => {
                geographic = Some(value as u32);
            }
            GT_CITATION if location == GEO_ASCII_PARAMS => {
                citation = Some((value as usize, len as usize));
            }
            _ => {}
        }
    }
    if let Some(code) = geographic {
        return Some(Crs::from_epsg(code));
    }

    let (offset, len) = citation?;
    let ascii = decoder
        .get_tag_ascii_string(Tag::GeoAsciiParamsTag)
        .ok()?;
    let text = ascii
        .get(offset..offset + len)?
        .trim_end_matches(['|', '\0'])
        .trim();
    (!text.is_empty()).then(|| Crs::from_wkt(text))
}

// 0 is undefined and 32767 is user-defined; neither is an EPSG code
fn is_epsg(value: u16) -> bool {
    value != 0 && value != 32767
}

/// Write a Raster to a GeoTIFF file.
///
/// Integer rasters (class labels, masks) are written as 8-bit grayscale,
/// floating point rasters as 32-bit float.
pub fn write_geotiff<T, P>(raster: &Raster<T>, path: P) -> Result<()>
where
    T: RasterElement,
    P: AsRef<Path>,
{
    let file = File::create(path.as_ref())?;
    let mut encoder = TiffEncoder::new(file)
        .map_err(|e| Error::Other(format!("TIFF encoder error: {}", e)))?;

    let (rows, cols) = raster.shape();

    if T::is_float() {
        let data: Vec<f32> = raster
            .data()
            .iter()
            .map(|&v| num_traits::cast(v).unwrap_or(f32::NAN))
            .collect();
        let mut image = encoder
            .new_image::<Gray32Float>(cols as u32, rows as u32)
            .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;
        write_geo_tags(&mut image, raster.transform(), raster.crs())?;
        image
            .write_data(&data)
            .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;
    } else {
        let data: Vec<u8> = raster
            .data()
            .iter()
            .map(|&v| num_traits::cast(v).unwrap_or(0u8))
            .collect();
        let mut image = encoder
            .new_image::<Gray8>(cols as u32, rows as u32)
            .map_err(|e| Error::Other(format!("Cannot create TIFF image: {}", e)))?;
        write_geo_tags(&mut image, raster.transform(), raster.crs())?;
        image
            .write_data(&data)
            .map_err(|e| Error::Other(format!("Cannot write image data: {}", e)))?;
    }

    Ok(())
}

fn write_geo_tags<W, C, K>(
    image: &mut tiff::encoder::ImageEncoder<W, C, K>,
    gt: &GeoTransform,
    crs: Option<&Crs>,
) -> Result<()>
where
    W: std::io::Write + std::io::Seek,
    C: tiff::encoder::colortype::ColorType,
    K: tiff::encoder::TiffKind,
{
    let scale = vec![gt.pixel_width, gt.pixel_height.abs(), 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelPixelScaleTag, scale.as_slice())
        .map_err(|e| Error::Other(format!("Cannot write scale tag: {}", e)))?;

    let tiepoint = vec![0.0, 0.0, 0.0, gt.origin_x, gt.origin_y, 0.0];
    image
        .encoder()
        .write_tag(Tag::ModelTiepointTag, tiepoint.as_slice())
        .map_err(|e| Error::Other(format!("Cannot write tiepoint tag: {}", e)))?;

    // GeoKey directory: GTModelTypeGeoKey=Projected,
    // GTRasterTypeGeoKey=PixelIsArea, plus the EPSG code when the raster
    // carries one. Keys must stay sorted by id.
    let mut geokeys: Vec<u16> = vec![
        1, 1, 0, 2,
        1024, 0, 1, 1,
        1025, 0, 1, 1,
    ];
    if let Some(code) = crs.and_then(|c| c.epsg()) {
        if let Ok(code) = u16::try_from(code) {
            geokeys[3] += 1;
            geokeys.extend_from_slice(&[PROJECTED_CS_TYPE, 0, 1, code]);
        }
    }
    image
        .encoder()
        .write_tag(Tag::GeoKeyDirectoryTag, geokeys.as_slice())
        .map_err(|e| Error::Other(format!("Cannot write geokey tag: {}", e)))?;

    Ok(())
}
