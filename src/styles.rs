//! Built-in style catalog.

use serde::Serialize;

/// A named style with the prompt that seeds the editor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StyleEntry {
    /// Stable identifier.
    pub id: &'static str,
    /// Display name.
    pub name: &'static str,
    /// Prompt copied into the editor when the style is picked.
    pub prompt_text: &'static str,
}

const CATALOG: &[StyleEntry] = &[
    StyleEntry {
        id: "watercolor",
        name: "Watercolor",
        prompt_text: "Repaint this portrait as a delicate watercolor painting with soft \
            bleeding edges, visible paper texture and a muted pastel palette. Keep the \
            person's facial features and expression recognizable.",
    },
    StyleEntry {
        id: "oil-painting",
        name: "Oil Painting",
        prompt_text: "Transform this portrait into a classical oil painting in the style of \
            the Dutch masters, with rich chiaroscuro lighting, thick brush strokes and a dark \
            background. Preserve the subject's likeness.",
    },
    StyleEntry {
        id: "anime",
        name: "Anime",
        prompt_text: "Redraw this person as a hand-drawn anime character with clean line \
            art, cel shading, large expressive eyes and a soft gradient background. Keep \
            their hairstyle and clothing.",
    },
    StyleEntry {
        id: "pop-art",
        name: "Pop Art",
        prompt_text: "Turn this portrait into bold 1960s pop art with flat saturated colors, \
            Ben-Day dots and thick black outlines, like a silkscreen print.",
    },
    StyleEntry {
        id: "pencil-sketch",
        name: "Pencil Sketch",
        prompt_text: "Convert this photo into a detailed graphite pencil sketch on textured \
            paper with careful cross-hatching and realistic shading. Black and white only.",
    },
    StyleEntry {
        id: "cyberpunk",
        name: "Cyberpunk",
        prompt_text: "Reimagine this person in a neon-lit cyberpunk city at night, with \
            glowing magenta and cyan rim lighting, rain reflections and subtle cybernetic \
            details. Keep the face recognizable.",
    },
    StyleEntry {
        id: "pixel-art",
        name: "Pixel Art",
        prompt_text: "Render this portrait as 16-bit pixel art with a limited retro palette \
            and crisp, visible pixels, like a character portrait from a classic RPG.",
    },
    StyleEntry {
        id: "claymation",
        name: "Claymation",
        prompt_text: "Recreate this person as a stop-motion claymation figure with a \
            handmade plasticine look, fingerprint texture and warm studio lighting.",
    },
];

/// Returns every built-in style, in display order.
pub fn catalog() -> &'static [StyleEntry] {
    CATALOG
}

/// Looks up a style by id.
pub fn find(id: &str) -> Option<&'static StyleEntry> {
    CATALOG.iter().find(|s| s.id == id)
}

/// The style selected when a session starts.
pub fn default_style() -> &'static StyleEntry {
    &CATALOG[0]
}
