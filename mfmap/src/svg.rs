//! Rognage du fond de carte SVG
//!
//! Seuls les attributs `width`, `height` et `viewBox` de l'élément racine
//! sont réécrits ; le reste du document est recopié tel quel.

use std::sync::OnceLock;

use memchr::memmem;
use regex::{Captures, Regex};

use crate::geography::{CROP_BOTTOM, CROP_LEFT, CROP_RIGHT, CROP_TOP};
use crate::MfError;

/// Dimensions de l'élément racine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SvgSize {
    pub width: i64,
    pub height: i64,
    /// x, y, largeur, hauteur
    pub viewbox: [i64; 4],
}

impl SvgSize {
    /// Rogne la viewBox ; largeur et hauteur suivent la nouvelle viewBox
    pub fn crop(&self, left: f64, right: f64, top: f64, bottom: f64) -> SvgSize {
        let [x, y, w, h] = self.viewbox;
        let new_w = (w as f64 * (1.0 - left - right)) as i64;
        let new_h = (h as f64 * (1.0 - top - bottom)) as i64;
        SvgSize {
            width: new_w,
            height: new_h,
            viewbox: [
                x + (w as f64 * left) as i64,
                y + (h as f64 * top) as i64,
                new_w,
                new_h,
            ],
        }
    }
}

fn attr_regex() -> &'static Regex {
    static ATTR_RE: OnceLock<Regex> = OnceLock::new();
    ATTR_RE.get_or_init(|| {
        Regex::new(r#"(\s)(width|height|viewBox)(\s*=\s*)"([^"]*)""#).expect("svg attr regex compiles")
    })
}

/// Position de la balise ouvrante `<svg ...>` : (début, fin exclue)
fn root_tag(svg: &[u8]) -> Result<(usize, usize), MfError> {
    for start in memmem::find_iter(svg, b"<svg") {
        let next = svg.get(start + 4).copied();
        if !matches!(next, Some(b' ' | b'\t' | b'\r' | b'\n' | b'>')) {
            continue;
        }
        let len = memchr::memchr(b'>', &svg[start..])
            .ok_or_else(|| MfError::Svg("unterminated <svg> tag".into()))?;
        return Ok((start, start + len + 1));
    }
    Err(MfError::Svg("<svg> root element not found".into()))
}

fn parse_px(value: &str) -> Result<i64, MfError> {
    value
        .strip_suffix("px")
        .and_then(|n| n.parse().ok())
        .ok_or_else(|| MfError::Svg(format!("'{value}' is not a NNNpx length")))
}

fn parse_viewbox(value: &str) -> Result<[i64; 4], MfError> {
    let parts = value
        .split(' ')
        .map(|n| n.parse::<u32>().map(i64::from))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|_| MfError::Svg(format!("'{value}' is not a 4-integer viewBox")))?;
    <[i64; 4]>::try_from(parts)
        .map_err(|_| MfError::Svg(format!("'{value}' is not a 4-integer viewBox")))
}

/// Lit la taille déclarée par l'élément racine
pub fn svg_size(svg: &[u8]) -> Result<SvgSize, MfError> {
    let (start, end) = root_tag(svg)?;
    let tag = simdutf8::basic::from_utf8(&svg[start..end]).map_err(|_| MfError::Utf8("svg"))?;

    let (mut width, mut height, mut viewbox) = (None, None, None);
    for caps in attr_regex().captures_iter(tag) {
        let value = &caps[4];
        match &caps[2] {
            "width" => width = Some(parse_px(value)?),
            "height" => height = Some(parse_px(value)?),
            _ => viewbox = Some(parse_viewbox(value)?),
        }
    }

    match (width, height, viewbox) {
        (Some(width), Some(height), Some(viewbox)) => Ok(SvgSize {
            width,
            height,
            viewbox,
        }),
        _ => Err(MfError::Svg("root lacks width, height or viewBox".into())),
    }
}

/// Rogne le fond de carte avec les mêmes ratios que l'emprise géographique
pub fn crop_svg(svg: &[u8]) -> Result<Vec<u8>, MfError> {
    let size = svg_size(svg)?.crop(CROP_LEFT, CROP_RIGHT, CROP_TOP, CROP_BOTTOM);
    let (start, end) = root_tag(svg)?;
    let tag = simdutf8::basic::from_utf8(&svg[start..end]).map_err(|_| MfError::Utf8("svg"))?;

    let rewritten = attr_regex().replace_all(tag, |caps: &Captures| {
        let value = match &caps[2] {
            "width" => format!("{}px", size.width),
            "height" => format!("{}px", size.height),
            _ => {
                let [x, y, w, h] = size.viewbox;
                format!("{x} {y} {w} {h}")
            }
        };
        format!("{}{}{}\"{}\"", &caps[1], &caps[2], &caps[3], value)
    });

    let mut out = Vec::with_capacity(svg.len());
    out.extend_from_slice(&svg[..start]);
    out.extend_from_slice(rewritten.as_bytes());
    out.extend_from_slice(&svg[end..]);
    Ok(out)
}
