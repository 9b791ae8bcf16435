//! PNG row predictors used by FlateDecode's `/Predictor` values 10 to 15.

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterType {
    None = 0,
    Sub = 1,
    Up = 2,
    Avg = 3,
    Paeth = 4,
}

impl FilterType {
    pub fn from_u8(n: u8) -> Option<FilterType> {
        match n {
            0 => Some(FilterType::None),
            1 => Some(FilterType::Sub),
            2 => Some(FilterType::Up),
            3 => Some(FilterType::Avg),
            4 => Some(FilterType::Paeth),
            _ => None,
        }
    }
}

fn paeth_predict(left: u8, above: u8, upper_left: u8) -> u8 {
    let initial = i16::from(left) + i16::from(above) - i16::from(upper_left);
    let dist_left = (initial - i16::from(left)).abs();
    let dist_above = (initial - i16::from(above)).abs();
    let dist_upper_left = (initial - i16::from(upper_left)).abs();

    if dist_left <= dist_above && dist_left <= dist_upper_left {
        left
    } else if dist_above <= dist_upper_left {
        above
    } else {
        upper_left
    }
}

pub fn decode_row(filter: FilterType, bpp: usize, previous: &[u8], current: &mut [u8]) {
    use self::FilterType::*;
    let len = current.len();

    match filter {
        None => (),
        Sub => {
            for i in bpp..len {
                current[i] = current[i].wrapping_add(current[i - bpp]);
            }
        }
        Up => {
            for i in 0..len {
                current[i] = current[i].wrapping_add(previous[i]);
            }
        }
        Avg => {
            for i in 0..bpp {
                current[i] = current[i].wrapping_add(previous[i] / 2);
            }
            for i in bpp..len {
                current[i] =
                    current[i].wrapping_add(((i16::from(current[i - bpp]) + i16::from(previous[i])) / 2) as u8);
            }
        }
        Paeth => {
            for i in 0..bpp {
                current[i] = current[i].wrapping_add(paeth_predict(0, previous[i], 0));
            }
            for i in bpp..len {
                current[i] =
                    current[i].wrapping_add(paeth_predict(current[i - bpp], previous[i], previous[i - bpp]));
            }
        }
    }
}

pub fn encode_row(filter: FilterType, bpp: usize, previous: &[u8], current: &mut [u8]) {
    use self::FilterType::*;
    let len = current.len();

    match filter {
        None => (),
        Sub => {
            for i in (bpp..len).rev() {
                current[i] = current[i].wrapping_sub(current[i - bpp]);
            }
        }
        Up => {
            for i in 0..len {
                current[i] = current[i].wrapping_sub(previous[i]);
            }
        }
        Avg => {
            for i in (bpp..len).rev() {
                current[i] = current[i].wrapping_sub(current[i - bpp].wrapping_add(previous[i]) / 2);
            }
            for i in 0..bpp {
                current[i] = current[i].wrapping_sub(previous[i] / 2);
            }
        }
        Paeth => {
            for i in (bpp..len).rev() {
                current[i] =
                    current[i].wrapping_sub(paeth_predict(current[i - bpp], previous[i], previous[i - bpp]));
            }
            for i in 0..bpp {
                current[i] = current[i].wrapping_sub(paeth_predict(0, previous[i], 0));
            }
        }
    }
}

/// Undoes per-row PNG filtering. Each input row is a filter-type byte
/// followed by `bytes_per_pixel * pixels_per_row` filtered bytes.
pub fn decode_frame(content: &[u8], bytes_per_pixel: usize, pixels_per_row: usize) -> Result<Vec<u8>> {
    let bytes_per_row = bytes_per_pixel * pixels_per_row;
    let mut previous = vec![0_u8; bytes_per_row];
    let mut current = vec![0_u8; bytes_per_row];
    let mut decoded = Vec::with_capacity(content.len());
    let mut pos = 0;
    while pos < content.len() {
        let Some(filter) = FilterType::from_u8(content[pos]) else {
            return Err(Error::UnsupportedPredictor(i64::from(content[pos])));
        };
        pos += 1;
        let end = pos + bytes_per_row;
        if end > content.len() {
            return Err(Error::StreamLength);
        }
        current.copy_from_slice(&content[pos..end]);
        pos = end;

        decode_row(filter, bytes_per_pixel, previous.as_slice(), current.as_mut_slice());
        decoded.extend_from_slice(current.as_slice());
        std::mem::swap(&mut previous, &mut current);
    }
    Ok(decoded)
}

/// Applies the Up filter to every row, producing the byte layout
/// `decode_frame` expects. This is the `/Predictor 12` form cross-reference
/// streams are written with.
pub fn encode_frame(content: &[u8], bytes_per_pixel: usize, pixels_per_row: usize) -> Vec<u8> {
    let bytes_per_row = bytes_per_pixel * pixels_per_row;
    let mut previous = vec![0_u8; bytes_per_row];
    let mut encoded = Vec::with_capacity(content.len() + content.len() / bytes_per_row.max(1) + 1);
    for row in content.chunks(bytes_per_row) {
        let plain = row.to_vec();
        let mut current = row.to_vec();
        encode_row(FilterType::Up, bytes_per_pixel, &previous, &mut current);
        encoded.push(FilterType::Up as u8);
        encoded.extend_from_slice(&current);
        previous = plain;
    }
    encoded
}
