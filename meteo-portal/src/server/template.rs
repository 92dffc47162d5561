//! Page HTML d'une zone

use crate::config::{CacheId, VueBuild};

const TEMPLATE: &str = include_str!("template.html");

/// Valeurs fixées au démarrage et injectées dans chaque page
#[derive(Debug, Clone)]
pub struct RenderContext {
    pub cache_id: CacheId,
    pub vue: VueBuild,
}

impl RenderContext {
    pub fn new(cache_id: CacheId, vue: VueBuild) -> Self {
        Self { cache_id, vue }
    }
}

impl Default for RenderContext {
    fn default() -> Self {
        Self::new(CacheId::generate(), VueBuild::default())
    }
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

/// Rend la page de la zone `name` publiée sous `path`
pub fn render_page(name: &str, path: &str, ctx: &RenderContext) -> String {
    let title = format!("Météo {name}");
    let description = format!("Météo pour la zone {name} sur une page grande et unique");

    TEMPLATE
        .replace("{{title}}", &escape(&title))
        .replace("{{description}}", &escape(&description))
        .replace("{{path}}", &escape(path))
        .replace("{{cache_id}}", ctx.cache_id.as_str())
        .replace("{{vue}}", ctx.vue.script())
}
