//! Rendering-engine view over the resolved themes.

use crate::cache::ThemeRecord;
use crate::engine::{ThemeEngine, SIZE_META};
use crate::key::CanonicalKey;
use serde::Serialize;
use std::sync::Arc;

/// A named slide size declared by a theme.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SizePreset {
    pub name: String,
    pub width: String,
    pub height: String,
}

/// A freshly built engine instance holding the registered themes.
#[derive(Debug)]
pub struct ThemeSetHandle<E> {
    engine: E,
    registered: Vec<(CanonicalKey, String)>,
}

impl<E: ThemeEngine> ThemeSetHandle<E> {
    pub fn engine(&self) -> &E {
        &self.engine
    }

    /// Canonical keys that made it into the set, paired with the theme name each declares.
    pub fn registered(&self) -> &[(CanonicalKey, String)] {
        &self.registered
    }

    pub fn size_presets(&self, theme_name: Option<&str>) -> Vec<SizePreset> {
        get_size_presets(self, theme_name)
    }
}

/// Builds a theme set from the registered styles, in the given order.
///
/// A stylesheet rejected by the engine is skipped, the rest of the set is still built.
pub fn build_theme_set<E, F>(styles: &[Arc<ThemeRecord>], engine_factory: F) -> ThemeSetHandle<E>
where
    E: ThemeEngine,
    F: FnOnce() -> E,
{
    let mut engine = engine_factory();
    let mut registered = Vec::with_capacity(styles.len());

    for record in styles {
        match engine.add_theme(&record.css) {
            Ok(name) => registered.push((record.key.clone(), name)),
            Err(err) => {
                tracing::warn!(key = %record.key, ?err, "Skipped invalid theme css");
            }
        }
    }

    ThemeSetHandle { engine, registered }
}

/// Size presets of `theme_name`, or of the default theme if the name is missing or unknown.
pub fn get_size_presets<E: ThemeEngine>(
    theme_set: &ThemeSetHandle<E>,
    theme_name: Option<&str>,
) -> Vec<SizePreset> {
    let engine = &theme_set.engine;
    let theme = theme_name
        .filter(|name| engine.has_theme(name))
        .unwrap_or_else(|| engine.default_theme());

    apply_size_declarations(engine.theme_meta(theme, SIZE_META).iter().map(String::as_str))
}

/// Applies size declarations in order.
///
/// `name width height` defines or overwrites the preset `name` in place,
/// `name false` removes it. Anything else is ignored.
pub fn apply_size_declarations<'a>(
    declarations: impl IntoIterator<Item = &'a str>,
) -> Vec<SizePreset> {
    let mut presets: Vec<SizePreset> = Vec::new();

    for declaration in declarations {
        let args: Vec<&str> = declaration.split_whitespace().collect();
        match args.as_slice() {
            [name, width, height] => {
                let preset = SizePreset {
                    name: name.to_string(),
                    width: width.to_string(),
                    height: height.to_string(),
                };
                match presets.iter_mut().find(|p| p.name == *name) {
                    Some(existing) => *existing = preset,
                    None => presets.push(preset),
                }
            }
            [name, "false"] => presets.retain(|p| p.name != *name),
            _ => {
                tracing::debug!(declaration, "Ignored malformed size declaration");
            }
        }
    }

    presets
}
