//! Built-in string catalog.

use ahash::AHashMap as HashMap;
use once_cell::sync::Lazy;
use tracing::warn;

use crate::collaborators::Localizer;

pub mod keys {
    pub const PLACEHOLDER: &str = "search.placeholder";
    pub const LOADING: &str = "search.loading";
    pub const NO_RESULTS: &str = "search.no_results";
    pub const RESULTS_TITLE: &str = "search.results_title";
    pub const COORDINATES: &str = "search.coordinates";
}

pub const DEFAULT_LOCALE: &str = "en";

type Strings = HashMap<&'static str, &'static str>;

static CATALOG: Lazy<HashMap<&'static str, Strings>> = Lazy::new(|| {
    let en: Strings = [
        (keys::PLACEHOLDER, "Holder name, FSC id or coordinates"),
        (keys::LOADING, "Searching…"),
        (keys::NO_RESULTS, "Nothing found"),
        (keys::RESULTS_TITLE, "Search results"),
        (keys::COORDINATES, "Coordinates"),
    ]
    .into_iter()
    .collect();

    let ru: Strings = [
        (keys::PLACEHOLDER, "Владелец, FSC id или координаты"),
        (keys::LOADING, "Поиск…"),
        (keys::NO_RESULTS, "Ничего не найдено"),
        (keys::RESULTS_TITLE, "Результаты поиска"),
        (keys::COORDINATES, "Координаты"),
    ]
    .into_iter()
    .collect();

    [("en", en), ("ru", ru)].into_iter().collect()
});

/// [`Localizer`] backed by the built-in catalog.
///
/// Missing keys fall back to English, then to the key itself.
#[derive(Debug, Clone)]
pub struct Catalog {
    locale: &'static str,
}

impl Catalog {
    /// Unknown locales fall back to English.
    pub fn new(locale: &str) -> Self {
        let locale = CATALOG.get_key_value(locale).map_or_else(
            || {
                warn!(locale, "Unknown locale, using {DEFAULT_LOCALE}");
                DEFAULT_LOCALE
            },
            |(name, _)| *name,
        );
        Self { locale }
    }

    pub fn locale(&self) -> &str {
        self.locale
    }

    pub fn available_locales() -> Vec<&'static str> {
        let mut locales: Vec<_> = CATALOG.keys().copied().collect();
        locales.sort_unstable();
        locales
    }
}

impl Default for Catalog {
    fn default() -> Self {
        Self::new(DEFAULT_LOCALE)
    }
}

impl Localizer for Catalog {
    fn text(&self, key: &str) -> String {
        [self.locale, DEFAULT_LOCALE]
            .iter()
            .find_map(|locale| CATALOG.get(locale).and_then(|strings| strings.get(key)))
            .map_or_else(|| key.to_string(), |text| (*text).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_locales() {
        assert_eq!(Catalog::available_locales(), vec!["en", "ru"]);
    }

    #[test]
    fn test_lookup_per_locale() {
        assert_eq!(Catalog::new("en").text(keys::NO_RESULTS), "Nothing found");
        assert_eq!(Catalog::new("ru").text(keys::NO_RESULTS), "Ничего не найдено");
    }

    #[test]
    fn test_every_key_in_every_locale() {
        for locale in Catalog::available_locales() {
            let catalog = Catalog::new(locale);
            for key in [
                keys::PLACEHOLDER,
                keys::LOADING,
                keys::NO_RESULTS,
                keys::RESULTS_TITLE,
                keys::COORDINATES,
            ] {
                assert_ne!(catalog.text(key), key, "{locale} misses {key}");
            }
        }
    }

    #[test]
    fn test_unknown_locale_falls_back() {
        let catalog = Catalog::new("de");
        assert_eq!(catalog.locale(), "en");
        assert_eq!(catalog.text(keys::LOADING), "Searching…");
    }

    #[test]
    fn test_unknown_key_returns_key() {
        assert_eq!(Catalog::default().text("search.nope"), "search.nope");
    }
}
