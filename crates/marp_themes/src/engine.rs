//! Boundary to the slide rendering engine.
//!
//! The engine consumes registered theme css and answers metadata queries about
//! its themes. [`MarpitEngine`] understands the metadata conventions of Marpit
//! themes:
//!
//! ```css
//! /*
//!  * @theme my-theme
//!  * @size 16:9 1280px 720px
//!  * @size 4:3 false
//!  */
//! @import 'default';
//! ```

use crate::error::EngineError;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

/// Metadata key holding the size declarations of a theme.
pub const SIZE_META: &str = "size";

pub trait ThemeEngine {
    /// Registers a stylesheet, returns the name of the theme it declares.
    ///
    /// Registering a theme with an already known name replaces the previous one.
    fn add_theme(&mut self, css: &str) -> Result<String, EngineError>;

    fn has_theme(&self, name: &str) -> bool;

    /// Name of the theme used when none or an unknown one is requested.
    fn default_theme(&self) -> &str;

    /// Values of the metadata `key` of theme `name` in declaration order,
    /// including the values inherited from imported themes first.
    fn theme_meta(&self, name: &str, key: &str) -> Vec<String>;

    fn theme_names(&self) -> Vec<String>;
}

static COMMENT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)/\*(.*?)\*/").expect("valid regex"));

static META_LINE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[*!\s]*@([\w-]+)\s+(.+?)\s*$").expect("valid regex"));

static IMPORT_RULE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"@import(?:-theme)?\s+(?:url\(\s*)?["']([^"']+)["']"#).expect("valid regex")
});

#[derive(Debug, Clone, PartialEq, Eq)]
struct Theme {
    name: String,
    /// Metadata in declaration order.
    meta: Vec<(String, String)>,
    /// Names given to `@import` and `@import-theme` rules.
    imports: Vec<String>,
}

impl Theme {
    fn parse(css: &str) -> Result<Self, EngineError> {
        if css.trim().is_empty() {
            return Err(EngineError::EmptyCss);
        }

        let meta: Vec<(String, String)> = COMMENT
            .captures_iter(css)
            .filter_map(|comment| comment.get(1))
            .flat_map(|body| body.as_str().lines())
            .filter_map(|line| {
                let caps = META_LINE.captures(line)?;
                Some((caps[1].to_string(), caps[2].to_string()))
            })
            .collect();

        // The last `@theme` wins, like any other single-valued meta.
        let name = meta
            .iter()
            .rev()
            .find(|(key, _)| key == "theme")
            .map(|(_, value)| value.clone())
            .ok_or(EngineError::MissingThemeName)?;

        let without_comments = COMMENT.replace_all(css, "");
        let imports = IMPORT_RULE
            .captures_iter(&without_comments)
            .map(|caps| caps[1].to_string())
            .collect();

        Ok(Self {
            name,
            meta,
            imports,
        })
    }

    fn values<'a>(&'a self, key: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.meta
            .iter()
            .filter(move |(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

const BUILTIN_SIZES: &str = "
 * @size 16:9 1280px 720px
 * @size 4:3 960px 720px";

fn builtin_css(name: &str) -> String {
    format!("/*\n * @theme {name}{BUILTIN_SIZES}\n */\nsection {{ width: 1280px; height: 720px; }}\n")
}

/// Theme set of the Marpit-flavored engine, preloaded with the built-in themes.
#[derive(Debug, Clone)]
pub struct MarpitEngine {
    themes: Vec<Theme>,
}

impl MarpitEngine {
    pub const DEFAULT_THEME: &'static str = "default";
    pub const BUILTIN_THEMES: [&'static str; 3] = ["default", "gaia", "uncover"];

    pub fn new() -> Self {
        let themes = Self::BUILTIN_THEMES
            .iter()
            .filter_map(|name| Theme::parse(&builtin_css(name)).ok())
            .collect();
        Self { themes }
    }

    fn get(&self, name: &str) -> Option<&Theme> {
        self.themes.iter().find(|theme| theme.name == name)
    }

    fn collect_meta(
        &self,
        theme: &Theme,
        key: &str,
        visited: &mut HashSet<String>,
        out: &mut Vec<String>,
    ) {
        for import in &theme.imports {
            if let Some(imported) = self.get(import) {
                if visited.insert(imported.name.clone()) {
                    self.collect_meta(imported, key, visited, out);
                }
            }
        }
        out.extend(theme.values(key).map(String::from));
    }
}

impl Default for MarpitEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ThemeEngine for MarpitEngine {
    fn add_theme(&mut self, css: &str) -> Result<String, EngineError> {
        let theme = Theme::parse(css)?;
        let name = theme.name.clone();
        match self.themes.iter_mut().find(|t| t.name == name) {
            Some(existing) => *existing = theme,
            None => self.themes.push(theme),
        }
        Ok(name)
    }

    fn has_theme(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    fn default_theme(&self) -> &str {
        Self::DEFAULT_THEME
    }

    fn theme_meta(&self, name: &str, key: &str) -> Vec<String> {
        let Some(theme) = self.get(name) else {
            return Vec::new();
        };
        let mut visited = HashSet::from([theme.name.clone()]);
        let mut out = Vec::new();
        self.collect_meta(theme, key, &mut visited, &mut out);
        out
    }

    fn theme_names(&self) -> Vec<String> {
        self.themes.iter().map(|theme| theme.name.clone()).collect()
    }
}
