//! The ordered list of filenames attached to a product.
//!
//! The `image` column has carried three encodings over time: null, a single
//! bare filename, and a JSON array of filenames. [`ImageSet::from_stored`]
//! accepts all of them; [`ImageSet::to_stored`] always writes the JSON array.

use std::collections::HashSet;
use tracing::warn;

pub const MAX_PRODUCT_IMAGES: usize = 4;

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ImageSet(Vec<String>);

/// Outcome of [`ImageSet::reconcile`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Reconciliation {
    /// The list to persist.
    pub images: ImageSet,
    /// Previously stored names dropped by the removal set; their files can go.
    pub removed: Vec<String>,
    /// New names cut off by the cap; never written to disk.
    pub discarded: Vec<String>,
}

impl ImageSet {
    pub fn from_stored(stored: Option<&str>) -> Self {
        let raw = match stored.map(str::trim) {
            Some(raw) if !raw.is_empty() => raw,
            _ => return Self::default(),
        };

        if raw.starts_with('[') {
            match serde_json::from_str::<Vec<String>>(raw) {
                Ok(names) => Self(names),
                Err(err) => {
                    warn!(error = %err, stored = raw, "Unreadable product image list");
                    Self::default()
                }
            }
        } else {
            Self(vec![raw.to_string()])
        }
    }

    pub fn to_stored(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_else(|_| "[]".to_string())
    }

    /// Drops every name in `removals`, appends `added` in order and keeps the
    /// first [`MAX_PRODUCT_IMAGES`] entries.
    pub fn reconcile(&self, removals: &[String], added: Vec<String>) -> Reconciliation {
        let removals: HashSet<&str> = removals.iter().map(String::as_str).collect();

        let (removed, kept): (Vec<String>, Vec<String>) = self
            .0
            .iter()
            .cloned()
            .partition(|name| removals.contains(name.as_str()));

        let mut images = kept;
        images.extend(
            added
                .into_iter()
                .filter(|name| !removals.contains(name.as_str())),
        );

        let discarded = if images.len() > MAX_PRODUCT_IMAGES {
            images.split_off(MAX_PRODUCT_IMAGES)
        } else {
            Vec::new()
        };

        Reconciliation {
            images: Self(images),
            removed,
            discarded,
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.iter().any(|image| image == name)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<String> {
        self.0
    }
}

impl From<Vec<String>> for ImageSet {
    fn from(names: Vec<String>) -> Self {
        Self(names)
    }
}

impl<'a> IntoIterator for &'a ImageSet {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(values: &[&str]) -> Vec<String> {
        values.iter().map(|value| value.to_string()).collect()
    }

    #[test]
    fn reads_every_stored_shape() {
        assert!(ImageSet::from_stored(None).is_empty());
        assert!(ImageSet::from_stored(Some("  ")).is_empty());
        assert_eq!(
            ImageSet::from_stored(Some("a.jpg")).as_slice(),
            names(&["a.jpg"]).as_slice()
        );
        assert_eq!(
            ImageSet::from_stored(Some(r#"["a.jpg","b.png"]"#)).as_slice(),
            names(&["a.jpg", "b.png"]).as_slice()
        );
        assert_eq!(
            ImageSet::from(names(&["c.gif"])).as_slice(),
            names(&["c.gif"]).as_slice()
        );
    }

    #[test]
    fn broken_json_reads_as_empty() {
        assert!(ImageSet::from_stored(Some("[\"a.jpg\"")).is_empty());
        assert!(ImageSet::from_stored(Some("[1, 2]")).is_empty());
    }

    #[test]
    fn stores_as_json_array() {
        let set = ImageSet::from(names(&["a.jpg", "b.png"]));
        assert_eq!(set.to_stored(), r#"["a.jpg","b.png"]"#);
        assert_eq!(ImageSet::default().to_stored(), "[]");
        assert_eq!(ImageSet::from_stored(Some(&set.to_stored())), set);
    }

    #[test]
    fn removes_then_appends_in_order() {
        let current = ImageSet::from(names(&["a", "b", "c"]));
        let result = current.reconcile(&names(&["b", "zzz"]), names(&["d"]));

        assert_eq!(result.images.as_slice(), names(&["a", "c", "d"]).as_slice());
        assert_eq!(result.removed, names(&["b"]));
        assert!(result.discarded.is_empty());
    }

    #[test]
    fn caps_at_four_and_discards_newest() {
        let current = ImageSet::from(names(&["a", "b", "c"]));
        let result = current.reconcile(&[], names(&["d", "e", "f"]));

        assert_eq!(result.images.len(), MAX_PRODUCT_IMAGES);
        assert_eq!(
            result.images.as_slice(),
            names(&["a", "b", "c", "d"]).as_slice()
        );
        assert_eq!(result.discarded, names(&["e", "f"]));
    }

    #[test]
    fn legacy_single_filename_can_be_removed() {
        let current = ImageSet::from_stored(Some("legacy.jpg"));
        let result = current.reconcile(&names(&["legacy.jpg"]), names(&["new.png"]));

        assert_eq!(result.images.as_slice(), names(&["new.png"]).as_slice());
        assert_eq!(result.removed, names(&["legacy.jpg"]));
    }

    #[test]
    fn duplicates_are_kept() {
        let current = ImageSet::from(names(&["a"]));
        let result = current.reconcile(&[], names(&["a"]));
        assert_eq!(result.images.as_slice(), names(&["a", "a"]).as_slice());
    }

    #[test]
    fn never_exceeds_cap_nor_keeps_removed_names() {
        // Deterministic walk over a mix of adds and removals.
        let mut stored: Option<String> = None;
        let mut counter = 0usize;

        for step in 0..200usize {
            let current = ImageSet::from_stored(stored.as_deref());

            let removals: Vec<String> = current
                .iter()
                .enumerate()
                .filter(|(index, _)| (step + index) % 3 == 0)
                .map(|(_, name)| name.clone())
                .collect();

            let mut added = Vec::new();
            for _ in 0..(step % 6) {
                counter += 1;
                added.push(format!("img-{counter}.png"));
            }
            if step % 7 == 0 {
                // Re-uploading a name that is being removed must not keep it.
                added.extend(removals.iter().cloned());
            }

            let result = current.reconcile(&removals, added);

            assert!(result.images.len() <= MAX_PRODUCT_IMAGES);
            for name in &removals {
                assert!(!result.images.contains(name));
            }

            stored = Some(result.images.to_stored());
        }
    }
}
