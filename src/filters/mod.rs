pub mod png;

use crate::{Dictionary, Error, Object, Result};

/// Undoes the whole filter chain named by `/Filter`, honoring the matching
/// `/DecodeParms` entries. Unknown chain elements are unsupported features.
pub fn decode(content: &[u8], dict: &Dictionary) -> Result<Vec<u8>> {
    let filters = match dict.get(b"Filter") {
        Ok(Object::Name(name)) => vec![name.as_slice()],
        Ok(Object::Array(names)) => names
            .iter()
            .map(|n| n.as_name())
            .collect::<Result<Vec<_>>>()?,
        Ok(other) => {
            return Err(Error::ObjectType {
                expected: "Name",
                found: other.enum_variant(),
            })
        }
        Err(_) => return Ok(content.to_vec()),
    };

    let mut data = content.to_vec();
    for (index, filter) in filters.iter().enumerate() {
        let parms = decode_parms(dict, index)?;
        data = match *filter {
            b"FlateDecode" => flate_decode(&data, parms)?,
            other => return Err(Error::UnsupportedFilter(String::from_utf8_lossy(other).into_owned())),
        };
    }
    Ok(data)
}

/// `/DecodeParms` holds either one dictionary or an array parallel to the
/// `/Filter` array; `null` stands for "no parameters".
fn decode_parms(dict: &Dictionary, index: usize) -> Result<Option<&Dictionary>> {
    let parms = match dict.get(b"DecodeParms").or_else(|_| dict.get(b"DP")) {
        Ok(parms) => parms,
        Err(_) => return Ok(None),
    };
    match parms {
        Object::Dictionary(parms) if index == 0 => Ok(Some(parms)),
        Object::Dictionary(_) => Ok(None),
        Object::Array(list) => match list.get(index) {
            Some(Object::Dictionary(parms)) => Ok(Some(parms)),
            Some(Object::Null) | None => Ok(None),
            Some(other) => Err(Error::ObjectType {
                expected: "Dictionary",
                found: other.enum_variant(),
            }),
        },
        Object::Null => Ok(None),
        other => Err(Error::ObjectType {
            expected: "Dictionary",
            found: other.enum_variant(),
        }),
    }
}

fn flate_decode(data: &[u8], parms: Option<&Dictionary>) -> Result<Vec<u8>> {
    use flate2::read::ZlibDecoder;
    use std::io::Read;

    let mut out = Vec::new();
    if !data.is_empty() {
        ZlibDecoder::new(data).read_to_end(&mut out)?;
    }

    let Some(parms) = parms else {
        return Ok(out);
    };
    let predictor = parms.get_integer(b"Predictor").unwrap_or(1);
    match predictor {
        0 | 1 => Ok(out),
        10..=15 => {
            let columns = parms.get_integer(b"Columns").unwrap_or(1) as usize;
            let colors = parms.get_integer(b"Colors").unwrap_or(1) as usize;
            let bits = parms.get_integer(b"BitsPerComponent").unwrap_or(8) as usize;
            let bytes_per_pixel = (colors * bits).div_ceil(8);
            png::decode_frame(&out, bytes_per_pixel, columns)
        }
        other => Err(Error::UnsupportedPredictor(other)),
    }
}
