use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Convert a district display name to a URL-safe slug.
///
/// Lowercases, strips diacritics by NFD decomposition, collapses every run
/// of characters outside [a-z0-9] into a single hyphen, and trims hyphens
/// from both ends. Idempotent: `to_slug(to_slug(s)) == to_slug(s)`.
pub fn to_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    let mut pending_hyphen = false;
    for ch in name.to_lowercase().nfd() {
        if is_combining_mark(ch) {
            continue;
        }
        if ch.is_ascii_alphanumeric() {
            if pending_hyphen && !slug.is_empty() {
                slug.push('-');
            }
            slug.push(ch);
            pending_hyphen = false;
        } else {
            pending_hyphen = true;
        }
    }
    slug
}

/// Resolve a slug back to its canonical district name by scanning the
/// level's name list. Linear, but each level holds at most a few hundred
/// districts.
pub fn resolve_slug<'a, I>(slug: &str, names: I) -> Option<&'a str>
where
    I: IntoIterator<Item = &'a str>,
{
    names.into_iter().find(|name| to_slug(name) == slug)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugifies_simple_names() {
        assert_eq!(to_slug("Ville-Marie"), "ville-marie");
        assert_eq!(to_slug("Outremont"), "outremont");
    }

    #[test]
    fn strips_diacritics() {
        assert_eq!(to_slug("Côte-des-Neiges"), "cote-des-neiges");
        assert_eq!(to_slug("Rivière-des-Prairies"), "riviere-des-prairies");
        assert_eq!(to_slug("Saint-Léonard"), "saint-leonard");
    }

    #[test]
    fn collapses_punctuation_runs_to_one_hyphen() {
        // Riding names carry apostrophes and em dashes.
        assert_eq!(to_slug("Toronto—Danforth"), "toronto-danforth");
        assert_eq!(
            to_slug("L'Île-Bizard—Sainte-Geneviève"),
            "l-ile-bizard-sainte-genevieve"
        );
        assert_eq!(to_slug("Mont-Royal — Outremont"), "mont-royal-outremont");
    }

    #[test]
    fn trims_leading_and_trailing_separators() {
        assert_eq!(to_slug("  Ahuntsic-Cartierville  "), "ahuntsic-cartierville");
        assert_eq!(to_slug("--x--"), "x");
        assert_eq!(to_slug("!!!"), "");
        assert_eq!(to_slug(""), "");
    }

    #[test]
    fn is_idempotent() {
        for name in [
            "Ville-Marie",
            "Côte-des-Neiges",
            "L'Île-Bizard—Sainte-Geneviève",
            "Notre-Dame-de-Grâce",
            "  spaced  out  ",
            "already-a-slug",
            "",
        ] {
            let once = to_slug(name);
            assert_eq!(to_slug(&once), once, "not idempotent for {:?}", name);
        }
    }

    #[test]
    fn resolves_slug_to_first_matching_name() {
        let names = ["Ville-Marie", "Côte-des-Neiges", "Outremont"];
        assert_eq!(
            resolve_slug("cote-des-neiges", names),
            Some("Côte-des-Neiges")
        );
        assert_eq!(resolve_slug("ville-marie", names), Some("Ville-Marie"));
        assert_eq!(resolve_slug("rosemont", names), None);
    }

    #[test]
    fn resolves_against_empty_list() {
        assert_eq!(resolve_slug("anything", []), None);
    }
}
