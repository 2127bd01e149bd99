//! Turns configured theme references into canonical cache keys.

use crate::key::{Base, CanonicalKey, SourceKind};
use itertools::Itertools;
use once_cell::sync::Lazy;
use url::Url;

/// Root used to parse a reference into a URL path for virtual bases.
static SYNTHETIC_ROOT: Lazy<Url> =
    Lazy::new(|| Url::parse("https://marp.invalid/").expect("valid synthetic root"));

/// Normalizes raw theme references against `base`.
///
/// Remote references are kept verbatim. Every other reference needs a base
/// and is dropped without one. References escaping a filesystem base, failing
/// to parse against a virtual base, or that are not strings are dropped too.
/// The result holds each key once, in the order of its first occurrence.
pub fn normalize(references: &[serde_json::Value], base: Option<&Base>) -> Vec<CanonicalKey> {
    references
        .iter()
        .filter_map(|value| match value.as_str() {
            Some(reference) => normalize_one(reference, base),
            None => {
                tracing::debug!(?value, "Ignored non-string theme reference");
                None
            }
        })
        .unique()
        .collect()
}

fn normalize_one(reference: &str, base: Option<&Base>) -> Option<CanonicalKey> {
    if SourceKind::is_remote_reference(reference) {
        return Some(CanonicalKey::remote(reference));
    }

    let Some(base) = base else {
        tracing::debug!(reference, "Dropped theme reference without base directory");
        return None;
    };

    match base {
        Base::FileSystem { root, .. } => {
            let Some(path) = paths::resolve_within(root, reference) else {
                tracing::warn!(
                    reference,
                    base = %root.display(),
                    "Dropped theme reference outside of the base directory"
                );
                return None;
            };
            CanonicalKey::local(&path)
        }
        Base::Virtual(url) => match SYNTHETIC_ROOT.join(reference) {
            Ok(parsed) => {
                let mut uri = url.clone();
                let joined = format!("{}{}", url.path().trim_end_matches('/'), parsed.path());
                uri.set_path(&joined);
                uri.set_query(None);
                uri.set_fragment(None);
                Some(CanonicalKey::from_uri(&uri))
            }
            Err(err) => {
                tracing::debug!(reference, ?err, "Dropped unparsable theme reference");
                None
            }
        },
    }
}
