//! Pre-rendered SVG sprites for powerup orbs and bumpers

use std::collections::HashMap;

use base64::{engine::general_purpose::STANDARD, Engine};

use crate::render::frame::SpriteId;
use crate::ws::protocol::PowerupKind;

const DATA_URI_PREFIX: &str = "data:image/svg+xml;base64,";

/// Icon paths drawn over the orb: (d, fill, stroke, stroke width)
fn icon_paths(kind: PowerupKind) -> Vec<(&'static str, &'static str, &'static str, u8)> {
    match kind {
        PowerupKind::Invert => vec![(
            "M25 15 A10 10 0 1 1 25 35 M25 35 L20 30 M25 35 L30 30",
            "none",
            "white",
            3,
        )],
        PowerupKind::Shrink => vec![(
            "M25 25 L35 15 M33 15 L35 15 L35 17 M25 25 L15 15 M17 15 L15 15 L15 17 \
             M25 25 L35 35 M33 35 L35 35 L35 33 M25 25 L15 35 M17 35 L15 35 L15 33",
            "none",
            "white",
            3,
        )],
        PowerupKind::Ice => vec![
            ("M25 10 L25 40 M18 14 L32 36 M32 14 L18 36 M20 25 L30 25", "none", "white", 3),
            ("M25 25 m-3,0 a3,3 0 1,0 6,0 a3,3 0 1,0 -6,0", "white", "none", 0),
        ],
        PowerupKind::Flash => vec![
            ("M25 10 m-8,0 a8,8 0 1,0 16,0 a8,8 0 1,0 -16,0", "white", "none", 0),
            (
                "M25 10 L25 17 M25 33 L25 40 M35 25 L42 25 M8 25 L15 25 \
                 M32 18 L37 13 M13 37 L18 32 M32 32 L37 37 M13 13 L18 18",
                "none",
                "white",
                3,
            ),
        ],
        PowerupKind::Sticky => vec![(
            "M25 10 C15 10 15 20 25 20 C35 20 35 10 25 10 M17 20 C17 40 33 40 33 20",
            "white",
            "white",
            3,
        )],
        PowerupKind::Speed | PowerupKind::Other => vec![(
            "M30 10 L20 25 L27 25 L17 40 L32 25 L25 25 L35 10",
            "white",
            "white",
            3,
        )],
    }
}

/// SVG document for a powerup orb; unknown kinds draw as `speed`
pub fn powerup_svg(kind: PowerupKind) -> String {
    let kind = if kind == PowerupKind::Other {
        PowerupKind::Speed
    } else {
        kind
    };
    let id = format!("{}Glow", kind.as_str());
    let mut svg = format!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 50 50" width="30" height="30"><radialGradient id="{id}"><stop offset="0%" stop-color="{main}" stop-opacity="1"/><stop offset="100%" stop-color="{glow}" stop-opacity="0.6"/></radialGradient><circle cx="25" cy="25" r="20" fill="url(#{id})"/>"#,
        main = kind.color(),
        glow = kind.glow_color(),
    );
    for (d, fill, stroke, width) in icon_paths(kind) {
        svg.push_str(&format!(
            r#"<path d="{d}" stroke="{stroke}" stroke-width="{width}" fill="{fill}"/>"#
        ));
    }
    svg.push_str("</svg>");
    svg
}

/// SVG document for a bumper: blue ring, white orb, soft highlight
pub fn bumper_svg() -> String {
    concat!(
        r#"<svg xmlns="http://www.w3.org/2000/svg" viewBox="0 0 100 100"><defs>"#,
        r#"<radialGradient id="whiteOrbGradient" cx="40%" cy="40%" r="60%">"#,
        r#"<stop offset="0%" stop-color="white" stop-opacity="1"/>"#,
        r##"<stop offset="90%" stop-color="#e0e0e0" stop-opacity="1"/></radialGradient>"##,
        r#"<radialGradient id="blueRingGradient" cx="50%" cy="50%" r="50%">"#,
        r##"<stop offset="0%" stop-color="#4169E1" stop-opacity="1"/>"##,
        r##"<stop offset="100%" stop-color="#1E90FF" stop-opacity="1"/></radialGradient></defs>"##,
        r#"<circle cx="50" cy="50" r="45" fill="none" stroke="url(#blueRingGradient)" stroke-width="8"/>"#,
        r#"<circle cx="50" cy="50" r="35" fill="url(#whiteOrbGradient)"/>"#,
        r#"<circle cx="50" cy="50" r="15" fill="white" opacity="0.3"/>"#,
        "</svg>"
    )
    .to_string()
}

pub fn to_data_uri(svg: &str) -> String {
    format!("{DATA_URI_PREFIX}{}", STANDARD.encode(svg.as_bytes()))
}

/// Sprite images, built once when a match starts
#[derive(Debug, Clone)]
pub struct SpriteAtlas {
    uris: HashMap<SpriteId, String>,
}

impl SpriteAtlas {
    pub fn load() -> Self {
        let mut uris: HashMap<SpriteId, String> = PowerupKind::ALL
            .iter()
            .map(|kind| (SpriteId::Powerup(*kind), to_data_uri(&powerup_svg(*kind))))
            .collect();
        uris.insert(SpriteId::Bumper, to_data_uri(&bumper_svg()));
        Self { uris }
    }

    /// Sprite for an orb; tags without an image fall back to `speed`
    pub fn powerup_sprite(&self, kind: PowerupKind) -> SpriteId {
        let id = SpriteId::Powerup(kind);
        if self.uris.contains_key(&id) {
            id
        } else {
            SpriteId::Powerup(PowerupKind::Speed)
        }
    }

    pub fn uri(&self, id: SpriteId) -> Option<&str> {
        self.uris.get(&id).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.uris.len()
    }

    pub fn is_empty(&self) -> bool {
        self.uris.is_empty()
    }
}
